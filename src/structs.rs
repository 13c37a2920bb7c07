use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::PathBuf;

use crate::transport::MultipartForm;

pub mod client;
pub mod session;

/// Identifier of a backend object.
///
/// The backend mixes integer keys (users, lookups) with UUIDs (contributions,
/// enrollments), so both are normalized to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(Self(s)),
            Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(de::Error::custom(format!(
                "expected a string or integer id, got {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for ObjectId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

// Decimal fields arrive either as JSON numbers or as strings like "200.00".
fn optional_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.trim().parse().map(Some).map_err(de::Error::custom),
        Some(other) => Err(de::Error::custom(format!(
            "expected a decimal, got {}",
            other
        ))),
    }
}

fn decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    optional_decimal(deserializer).map(Option::unwrap_or_default)
}

/// Minimal user record stored with the session and embedded in contributions.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSummary {
    #[serde(default)]
    pub id: Option<ObjectId>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// University, department or major subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupItem {
    pub id: ObjectId,
    #[serde(default)]
    pub name: String,
}

/// A lookup reference that is either expanded or just the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupRef {
    Item(LookupItem),
    Id(ObjectId),
}

impl LookupRef {
    pub fn id(&self) -> &ObjectId {
        match self {
            LookupRef::Item(item) => &item.id,
            LookupRef::Id(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: Option<ObjectId>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub title: String,
    /// URL of the uploaded video.
    #[serde(default)]
    pub video_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default)]
    pub id: Option<ObjectId>,
    /// URL of the downloadable notes file.
    #[serde(default)]
    pub note_file: Option<String>,
}

/// A paid course-like item. Owned, updated and deleted only by its creator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: ObjectId,
    /// The owner. Present on public listings.
    #[serde(default)]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "decimal")]
    pub price: f64,
    #[serde(default)]
    pub thumbnail_image: Option<String>,
    /// Average rating; absent until someone rates it.
    #[serde(default, deserialize_with = "optional_decimal")]
    pub rating: Option<f64>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub videos: Vec<Video>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default, rename = "related_University")]
    pub related_university: Option<LookupRef>,
    #[serde(default, rename = "related_Department")]
    pub related_department: Option<LookupRef>,
    #[serde(default, rename = "related_Major_Subject")]
    pub related_major_subject: Option<LookupRef>,
    #[serde(default)]
    pub is_enrolled: Option<bool>,
}

impl Contribution {
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|tag| tag.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

/// The record that a user has access to a contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: ObjectId,
    pub contribution: Contribution,
    #[serde(default, deserialize_with = "decimal")]
    pub amount_paid: f64,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub enrolled_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    #[serde(default)]
    pub id: Option<ObjectId>,
    #[serde(default)]
    pub user: Option<UserSummary>,
    #[serde(deserialize_with = "decimal")]
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Full profile returned by `/api/user-info/`.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub id: Option<ObjectId>,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<String>,
    #[serde(default)]
    pub university: Option<LookupRef>,
    #[serde(default)]
    pub department: Option<LookupRef>,
    #[serde(default)]
    pub major_subject: Option<LookupRef>,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub is_profile_verified: bool,
}

/// Body of a successful login. The backend puts these next to `status`.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub user: UserSummary,
    pub access: String,
    pub refresh: String,
}

/// Result of starting an enrollment. A paid contribution carries a payment URL.
#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct Checkout {
    #[serde(default)]
    pub payment_url: Option<String>,
    #[serde(default)]
    pub enrollment_id: Option<ObjectId>,
}

/// Result of verifying a gateway transaction.
#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentVerification {
    #[serde(default)]
    pub contribution_id: Option<ObjectId>,
    #[serde(default)]
    pub redirect_url: Option<String>,
}

/// Signup payload.
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password2: String,
}

/// Password reset payload, sent after the OTP arrives by email.
#[derive(Debug, Clone, Serialize)]
pub struct PasswordReset {
    pub email: String,
    pub otp: String,
    pub password: String,
    pub password2: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingInput {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Profile edit. Lookup fields hold ids; empty strings clear them.
#[derive(Default, Debug, Clone, Serialize)]
pub struct ProfileUpdate {
    pub phone_number: String,
    pub date_of_birth: String,
    pub university: String,
    pub department: String,
    pub major_subject: String,
    /// New picture, uploaded in a separate multipart request.
    #[serde(skip)]
    pub profile_picture: Option<PathBuf>,
}

#[derive(Default, Debug, Clone)]
pub struct VideoUpload {
    /// Set when updating an existing video.
    pub id: Option<ObjectId>,
    pub title: String,
    pub file: Option<PathBuf>,
}

#[derive(Default, Debug, Clone)]
pub struct NoteUpload {
    pub id: Option<ObjectId>,
    pub file: Option<PathBuf>,
}

/// Create/update form for a contribution, sent as multipart.
#[derive(Default, Debug, Clone)]
pub struct ContributionForm {
    pub title: String,
    pub description: String,
    pub price: String,
    pub related_university: String,
    pub related_department: String,
    pub related_major_subject: String,
    pub thumbnail_image: Option<PathBuf>,
    pub tags: Vec<String>,
    pub videos: Vec<VideoUpload>,
    pub notes: Vec<NoteUpload>,
}

impl ContributionForm {
    /// Flattens the form into indexed multipart keys (`tags[0][name]`, ...).
    /// Blank tags and untitled, fileless videos are skipped.
    pub fn to_multipart(&self) -> MultipartForm {
        let mut form = MultipartForm::new()
            .text("title", &self.title)
            .text("description", &self.description)
            .text("price", &self.price)
            .text("related_University", &self.related_university)
            .text("related_Department", &self.related_department)
            .text("related_Major_Subject", &self.related_major_subject);

        if let Some(path) = &self.thumbnail_image {
            form = form.file("thumbnail_image", path);
        }

        let tags = self.tags.iter().filter(|name| !name.trim().is_empty());
        for (index, name) in tags.enumerate() {
            form = form.text(format!("tags[{}][name]", index), name.trim());
        }

        let videos = self
            .videos
            .iter()
            .filter(|video| !video.title.trim().is_empty() || video.file.is_some());
        for (index, video) in videos.enumerate() {
            form = form.text(format!("videos[{}][title]", index), &video.title);
            if let Some(path) = &video.file {
                form = form.file(format!("videos[{}][video_file]", index), path);
            }
            if let Some(id) = &video.id {
                form = form.text(format!("videos[{}][id]", index), id.to_string());
            }
        }

        let notes = self
            .notes
            .iter()
            .filter(|note| note.file.is_some() || note.id.is_some());
        for (index, note) in notes.enumerate() {
            if let Some(path) = &note.file {
                form = form.file(format!("notes[{}][note_file]", index), path);
            }
            if let Some(id) = &note.id {
                form = form.text(format!("notes[{}][id]", index), id.to_string());
            }
        }

        form
    }
}

/// Server-side filters and pagination for contribution listings.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct ContributionQuery {
    pub university: Option<String>,
    pub department: Option<String>,
    pub major_subject: Option<String>,
    pub user: Option<String>,
    pub tags: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ContributionQuery {
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let text = [
            ("university", &self.university),
            ("department", &self.department),
            ("major_subject", &self.major_subject),
            ("user", &self.user),
            ("tags", &self.tags),
            ("search", &self.search),
        ];
        let numbers = [("page", self.page), ("page_size", self.page_size)];

        text.into_iter()
            .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
            .chain(
                numbers
                    .into_iter()
                    .filter_map(|(key, value)| value.map(|v| (key.to_string(), v.to_string()))),
            )
            .collect()
    }
}
