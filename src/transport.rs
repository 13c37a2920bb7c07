use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::blocking::multipart::Form;
use reqwest::Url;
use serde_json::Value;

use crate::errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    /// Local file, read when the request is sent.
    File(PathBuf),
}

/// Multipart body, kept as plain data until the transport sends it.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    fields: Vec<(String, FormValue)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .push((key.into(), FormValue::Text(value.into())));
        self
    }

    pub fn file(mut self, key: impl Into<String>, path: impl AsRef<Path>) -> Self {
        self.fields
            .push((key.into(), FormValue::File(path.as_ref().to_path_buf())));
        self
    }

    pub fn fields(&self) -> &[(String, FormValue)] {
        &self.fields
    }

    fn into_reqwest(self) -> Result<Form, ApiError> {
        let mut form = Form::new();
        for (key, value) in self.fields {
            form = match value {
                FormValue::Text(text) => form.text(key, text),
                FormValue::File(path) => {
                    form.file(key, &path)
                        .map_err(|err| ApiError::AttachmentFailed {
                            path: path.display().to_string(),
                            reason: err.to_string(),
                        })?
                }
            };
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Sent without an explicit content type so the boundary is filled in.
    Multipart(MultipartForm),
}

/// One backend call, described independently of the HTTP library.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, e.g. `auth/login/`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

/// Status code and raw body of a backend reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends a request and returns whatever came back, whatever the status code.
/// Only failures to get a reply at all are errors.
pub trait Transport: Send + Sync + fmt::Debug {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse, ApiError>;
}

/// `Transport` backed by a blocking reqwest client. One attempt per call.
#[derive(Debug)]
pub struct HttpTransport {
    base_url: Url,
    http: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str, user_agent: &str) -> Result<Self, ApiError> {
        // A trailing slash keeps any path prefix when joining endpoint paths
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };

        let base_url =
            Url::parse(&normalized).map_err(|err| ApiError::InvalidBaseUrl(err.to_string()))?;

        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(normalized));
        }

        let http = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()
            .or(Err(ApiError::ClientBuildFailed))?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::InvalidBaseUrl(err.to_string()))
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        let url = self.url(&request.path)?;

        let mut builder = match request.method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
            Method::Put => self.http.put(url),
            Method::Delete => self.http.delete(url),
        };

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(form) => builder.multipart(form.clone().into_reqwest()?),
        };

        let response = builder
            .send()
            .map_err(|err| ApiError::RequestFailed(err.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|err| ApiError::RequestFailed(err.to_string()))?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}
