//! The `{status, message, data}` wrapper every backend reply is decoded into.
//!
//! `decode` is the only place that looks at response shapes. Anything that is
//! not a canonical envelope is reported as `ApiError::ContractViolation`.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;

use crate::errors::ApiError;
use crate::transport::RawResponse;

/// Fallback text when an error message cannot be extracted.
pub const GENERIC_ERROR: &str = "An error occurred. Please try again.";

const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Field name to ordered error strings, in the order the backend sent them.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct ErrorMap(Vec<(String, Vec<String>)>);

impl ErrorMap {
    pub fn new(entries: Vec<(String, Vec<String>)>) -> Self {
        Self(entries)
    }

    /// Accepts objects whose values are string lists (or single strings).
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, String> {
        let mut entries = Vec::with_capacity(map.len());

        for (field, value) in map {
            let messages = match value {
                Value::String(message) => vec![message.clone()],
                Value::Array(items) => items
                    .iter()
                    .map(|item| match item {
                        Value::String(message) => Ok(message.clone()),
                        other => Err(format!("`{}` holds a non-string error: {}", field, other)),
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                other => return Err(format!("`{}` is not an error list: {}", field, other)),
            };
            entries.push((field.clone(), messages));
        }

        Ok(Self(entries))
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(name, messages)| (name.as_str(), messages.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `non_field_errors[0]` first, then the first entry of the first non-empty list.
    pub fn first_message(&self) -> Option<&str> {
        if let Some(message) = self.get(NON_FIELD_ERRORS).and_then(|m| m.first()) {
            return Some(message);
        }

        self.0
            .iter()
            .find_map(|(_, messages)| messages.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Fields(ErrorMap),
}

impl Message {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(Message::Text(String::new())),
            Value::String(text) => Ok(Message::Text(text)),
            Value::Object(map) => ErrorMap::from_map(&map).map(Message::Fields),
            other => Err(format!("`message` is neither text nor an error map: {}", other)),
        }
    }

    /// The single line shown to the user.
    pub fn display(&self) -> String {
        match self {
            Message::Text(text) if !text.trim().is_empty() => text.clone(),
            Message::Text(_) => GENERIC_ERROR.to_string(),
            Message::Fields(fields) => fields
                .first_message()
                .unwrap_or(GENERIC_ERROR)
                .to_string(),
        }
    }

    /// The raw text, empty for error maps.
    pub fn text(&self) -> &str {
        match self {
            Message::Text(text) => text,
            Message::Fields(_) => "",
        }
    }

    pub fn field_errors(&self, field: &str) -> &[String] {
        match self {
            Message::Fields(fields) => fields.get(field).unwrap_or(&[]),
            Message::Text(_) => &[],
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<&str> for Message {
    fn from(value: &str) -> Self {
        Message::Text(value.to_string())
    }
}

impl From<String> for Message {
    fn from(value: String) -> Self {
        Message::Text(value)
    }
}

/// Uniform reply. `status == false` is a caller-correctable or server failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T> {
    pub status: bool,
    pub message: Message,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<Message>, data: Option<T>) -> Self {
        Self {
            status: true,
            message: message.into(),
            data,
        }
    }

    pub fn failure(message: impl Into<Message>) -> Self {
        Self {
            status: false,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Envelope<U> {
        Envelope {
            status: self.status,
            message: self.message,
            data: self.data.map(f),
        }
    }

    /// Drops the payload, keeping status and message.
    pub fn discard(self) -> Envelope<()> {
        Envelope {
            status: self.status,
            message: self.message,
            data: None,
        }
    }

    pub fn into_result(self) -> Result<Option<T>, Message> {
        if self.status {
            Ok(self.data)
        } else {
            Err(self.message)
        }
    }
}

/// Where a successful reply keeps its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Under the `data` key.
    Data,
    /// Next to `status` and `message` (login tokens, checkout URLs).
    Inline,
    /// Nothing worth reading; a 204 or empty 2xx body is a success.
    Empty,
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn parse_status(value: &Value) -> Result<bool, ApiError> {
    match value {
        Value::Bool(status) => Ok(*status),
        // Payment verification answers with a verdict string
        Value::String(verdict) => Ok(verdict == "success"),
        other => Err(ApiError::ContractViolation(format!(
            "`status` is {}",
            kind(other)
        ))),
    }
}

/// Decodes a raw reply into an envelope. A non-2xx reply is always a failure;
/// its body only supplies the message.
pub fn decode<T: DeserializeOwned>(
    response: &RawResponse,
    payload: Payload,
) -> Result<Envelope<T>, ApiError> {
    let blank = response.body.iter().all(u8::is_ascii_whitespace);

    // No body to parse
    if response.status == 204 || (payload == Payload::Empty && response.is_success() && blank) {
        return Ok(Envelope::success(String::new(), None));
    }

    let value: Value =
        serde_json::from_slice(&response.body).or(Err(ApiError::FailedToDecode))?;

    let mut object = match value {
        Value::Object(object) => object,
        other => {
            return Err(ApiError::ContractViolation(format!(
                "expected an envelope object, got {}",
                kind(&other)
            )))
        }
    };

    let status = match object.remove("status") {
        Some(status) => parse_status(&status)?,
        None => {
            // Framework validation errors arrive as a bare field map
            if !response.is_success() {
                if let Ok(fields) = ErrorMap::from_map(&object) {
                    if !fields.is_empty() {
                        return Ok(Envelope::failure(Message::Fields(fields)));
                    }
                }
            }
            return Err(ApiError::ContractViolation(
                "missing `status` field".to_string(),
            ));
        }
    };

    let message = match object.remove("message") {
        Some(message) => Message::from_value(message).map_err(ApiError::ContractViolation)?,
        None => Message::Text(String::new()),
    };

    // The HTTP status wins over whatever the body claims
    if !status || !response.is_success() {
        return Ok(Envelope::failure(message));
    }

    let data = match payload {
        Payload::Empty => None,
        Payload::Data => match object.remove("data") {
            None | Some(Value::Null) => None,
            Some(data) => Some(serde_json::from_value(data).map_err(|err| {
                ApiError::ContractViolation(format!("`data` has an unexpected shape: {}", err))
            })?),
        },
        Payload::Inline => Some(serde_json::from_value(Value::Object(object)).map_err(|err| {
            ApiError::ContractViolation(format!("payload has an unexpected shape: {}", err))
        })?),
    };

    Ok(Envelope {
        status,
        message,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn reply(status: u16, body: Value) -> RawResponse {
        RawResponse {
            status,
            body: serde_json::to_vec(&body).unwrap(),
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn reads_payload_from_data() {
        let envelope: Envelope<Vec<Item>> = decode(
            &reply(200, json!({ "status": true, "message": "Success", "data": [{ "id": 1 }] })),
            Payload::Data,
        )
        .unwrap();

        assert!(envelope.status);
        assert_eq!(envelope.message.text(), "Success");
        assert_eq!(envelope.data, Some(vec![Item { id: 1 }]));
    }

    #[test]
    fn bare_array_is_a_contract_violation() {
        let result: Result<Envelope<Vec<Item>>, _> =
            decode(&reply(200, json!([{ "id": 1 }])), Payload::Data);
        assert!(matches!(result, Err(ApiError::ContractViolation(_))));
    }

    #[test]
    fn bare_object_with_id_is_a_contract_violation() {
        let result: Result<Envelope<Item>, _> = decode(&reply(200, json!({ "id": 1 })), Payload::Data);
        assert!(matches!(result, Err(ApiError::ContractViolation(_))));
    }

    #[test]
    fn malformed_json_fails_to_decode() {
        let response = RawResponse {
            status: 500,
            body: b"<html>Server Error</html>".to_vec(),
        };
        let result: Result<Envelope<Item>, _> = decode(&response, Payload::Data);
        assert!(matches!(result, Err(ApiError::FailedToDecode)));
    }

    #[test]
    fn no_content_skips_parsing() {
        let response = RawResponse {
            status: 204,
            body: Vec::new(),
        };
        let envelope: Envelope<()> = decode(&response, Payload::Empty).unwrap();
        assert!(envelope.status);
        assert!(envelope.data.is_none());
    }

    #[test]
    fn bare_field_errors_on_failure_become_error_map() {
        let envelope: Envelope<Item> = decode(
            &reply(400, json!({ "email": ["user with this email already exists."] })),
            Payload::Data,
        )
        .unwrap();

        assert!(!envelope.status);
        assert_eq!(
            envelope.message.field_errors("email"),
            &["user with this email already exists.".to_string()]
        );
    }

    #[test]
    fn failure_envelope_ignores_payload_shape() {
        let envelope: Envelope<Item> = decode(
            &reply(401, json!({ "status": false, "message": "Invalid credentials", "data": "x" })),
            Payload::Data,
        )
        .unwrap();

        assert!(!envelope.status);
        assert_eq!(envelope.message.display(), "Invalid credentials");
    }

    #[test]
    fn non_success_status_code_overrides_body_status() {
        let envelope: Envelope<Vec<Item>> = decode(
            &reply(500, json!({ "status": true, "message": "ok", "data": [{ "id": 1 }] })),
            Payload::Data,
        )
        .unwrap();

        assert!(!envelope.status);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.message.display(), "ok");
    }

    #[test]
    fn inline_payload_reads_sibling_fields() {
        #[derive(Debug, Deserialize)]
        struct Tokens {
            access: String,
        }

        let envelope: Envelope<Tokens> = decode(
            &reply(200, json!({ "status": true, "message": "ok", "access": "A" })),
            Payload::Inline,
        )
        .unwrap();

        assert_eq!(envelope.data.unwrap().access, "A");
    }

    #[test]
    fn verdict_strings_map_to_status() {
        let ok: Envelope<()> =
            decode(&reply(200, json!({ "status": "success" })), Payload::Empty).unwrap();
        let failed: Envelope<()> =
            decode(&reply(400, json!({ "status": "error", "message": "Invalid" })), Payload::Empty)
                .unwrap();

        assert!(ok.status);
        assert!(!failed.status);
    }

    #[test]
    fn display_prefers_non_field_errors() {
        let message = Message::Fields(ErrorMap::new(vec![
            ("otp".to_string(), vec!["Invalid OTP".to_string()]),
            (
                "non_field_errors".to_string(),
                vec!["OTP expired".to_string()],
            ),
        ]));
        assert_eq!(message.display(), "OTP expired");
    }

    #[test]
    fn display_falls_back_to_first_field_then_generic() {
        let first_field = Message::Fields(ErrorMap::new(vec![
            ("email".to_string(), Vec::new()),
            ("password".to_string(), vec!["Too short".to_string()]),
        ]));
        assert_eq!(first_field.display(), "Too short");

        assert_eq!(Message::Fields(ErrorMap::default()).display(), GENERIC_ERROR);
        assert_eq!(Message::Text(String::new()).display(), GENERIC_ERROR);
    }
}
