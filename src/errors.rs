use thiserror::Error;

/// Client errors.
///
/// These never leave the gateway functions on `Client`; they are logged and
/// folded into a failure `Envelope` at the API boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The base URL in `ClientOptions` could not be parsed.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Failed to build the underlying HTTP client.
    #[error("Failed to build the HTTP client.")]
    ClientBuildFailed,

    /// Failed to send a request to the backend, or to read its body.
    #[error("Failed to send a request to the backend: {0}")]
    RequestFailed(String),

    /// A file referenced by a multipart form could not be read.
    #[error("Failed to attach file {path}: {reason}")]
    AttachmentFailed { path: String, reason: String },

    /// The response body was not valid JSON.
    #[error("Failed to decode backend response.")]
    FailedToDecode,

    /// The response was JSON but not in the canonical envelope shape.
    #[error("Backend response violates the envelope contract: {0}")]
    ContractViolation(String),

    /// The endpoint requires a session and none is stored.
    #[error("Please log in to continue.")]
    NotLoggedIn,

    /// The local persisted state could not be read or written.
    #[error("Session storage failure: {0}")]
    Storage(#[from] std::io::Error),

    /// The local persisted state exists but could not be parsed.
    #[error("Stored session data is corrupted.")]
    SessionCorrupted,

    /// The system browser could not be opened for a redirect.
    #[error("Failed to open {0} in the browser.")]
    BrowserFailed(String),
}

/// Client-side form validation failures.
///
/// Raised before any network call; the backend still validates everything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill in the {0} field.")]
    MissingField(&'static str),

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("Passwords do not match.")]
    PasswordMismatch,

    #[error("Password must be at least {0} characters long.")]
    PasswordTooShort(usize),

    #[error("Please enter the OTP.")]
    MissingOtp,

    #[error("Price must be a non-negative number.")]
    InvalidPrice,

    #[error("Rating must be between 1 and 5.")]
    InvalidRating,
}
