use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::session::{default_session_path, FileStorage, Session, SessionStore, Storage};
use super::{
    Checkout, Contribution, ContributionForm, ContributionQuery, Enrollment, LoginData,
    LookupItem, ObjectId, PasswordReset, PaymentVerification, ProfileUpdate, Rating, RatingInput,
    Registration, UserInfo, UserSummary,
};
use crate::envelope::{self, Envelope, Payload};
use crate::errors::ApiError;
use crate::transport::{
    ApiRequest, HttpTransport, Method, MultipartForm, RequestBody, Transport,
};

/// Backend used when no other base URL is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

/// Client options. Pass this into `Client::new()`.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Root of the backend API, e.g. `http://127.0.0.1:8000`.
    pub base_url: String,
    /// Whether the client should print debug statements.
    pub debug: bool,
    /// File holding the persisted session. Defaults to the user config dir.
    pub session_path: Option<PathBuf>,
    /// How long success screens stay up before redirecting.
    pub redirect_delay: Duration,
    /// Minimum time between two OTP resend requests.
    pub resend_cooldown: Duration,
    pub user_agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            debug: false,
            session_path: None,
            redirect_delay: Duration::from_secs(2),
            resend_cooldown: Duration::from_secs(60),
            user_agent: "edusphere-client".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// Never send a token.
    None,
    /// Send the token when logged in.
    Optional,
    /// Refuse to call without a session.
    Required,
}

/// Static description of one backend operation.
#[derive(Debug, Clone, Copy)]
struct Endpoint {
    method: Method,
    auth: Auth,
    payload: Payload,
    /// Message returned when the call fails before an envelope is decoded.
    failure: &'static str,
}

const REGISTER: Endpoint = Endpoint {
    method: Method::Post,
    auth: Auth::None,
    payload: Payload::Data,
    failure: "An error occurred during registration",
};

const VERIFY_OTP: Endpoint = Endpoint {
    method: Method::Post,
    auth: Auth::None,
    payload: Payload::Empty,
    failure: "An error occurred during verification",
};

const RESEND_OTP: Endpoint = Endpoint {
    method: Method::Post,
    auth: Auth::None,
    payload: Payload::Empty,
    failure: "An error occurred while resending OTP",
};

const LOGIN: Endpoint = Endpoint {
    method: Method::Post,
    auth: Auth::None,
    payload: Payload::Inline,
    failure: "An error occurred during login",
};

const LOGOUT: Endpoint = Endpoint {
    method: Method::Post,
    auth: Auth::Required,
    payload: Payload::Empty,
    failure: "An error occurred during logout",
};

const FORGOT_PASSWORD: Endpoint = Endpoint {
    method: Method::Post,
    auth: Auth::None,
    payload: Payload::Empty,
    failure: "An error occurred while requesting password reset",
};

const RESET_PASSWORD: Endpoint = Endpoint {
    method: Method::Post,
    auth: Auth::None,
    payload: Payload::Empty,
    failure: "An error occurred while resetting password",
};

const LIST_ALL_CONTRIBUTIONS: Endpoint = Endpoint {
    method: Method::Get,
    auth: Auth::Optional,
    payload: Payload::Data,
    failure: "An error occurred while fetching contributions",
};

const LIST_USER_CONTRIBUTIONS: Endpoint = Endpoint {
    method: Method::Get,
    auth: Auth::Required,
    payload: Payload::Data,
    failure: "An error occurred while fetching your contributions",
};

const GET_CONTRIBUTION: Endpoint = Endpoint {
    method: Method::Get,
    auth: Auth::Optional,
    payload: Payload::Data,
    failure: "An error occurred while fetching the contribution",
};

const CREATE_CONTRIBUTION: Endpoint = Endpoint {
    method: Method::Post,
    auth: Auth::Required,
    payload: Payload::Data,
    failure: "An error occurred while creating the contribution",
};

const UPDATE_CONTRIBUTION: Endpoint = Endpoint {
    method: Method::Put,
    auth: Auth::Required,
    payload: Payload::Data,
    failure: "An error occurred while updating the contribution",
};

const DELETE_CONTRIBUTION: Endpoint = Endpoint {
    method: Method::Delete,
    auth: Auth::Required,
    payload: Payload::Empty,
    failure: "An error occurred while deleting the contribution",
};

const LIST_ENROLLMENTS: Endpoint = Endpoint {
    method: Method::Get,
    auth: Auth::Required,
    payload: Payload::Data,
    failure: "An error occurred while fetching enrollments",
};

const CREATE_ENROLLMENT: Endpoint = Endpoint {
    method: Method::Post,
    auth: Auth::Required,
    payload: Payload::Inline,
    failure: "An error occurred while trying to enroll",
};

const LIST_RATINGS: Endpoint = Endpoint {
    method: Method::Get,
    auth: Auth::Optional,
    payload: Payload::Data,
    failure: "An error occurred while fetching ratings",
};

const SUBMIT_RATING: Endpoint = Endpoint {
    method: Method::Post,
    auth: Auth::Required,
    payload: Payload::Data,
    failure: "An error occurred while submitting your rating",
};

const LOOKUP: Endpoint = Endpoint {
    method: Method::Get,
    auth: Auth::None,
    payload: Payload::Data,
    failure: "An error occurred while fetching options",
};

const USER_INFO: Endpoint = Endpoint {
    method: Method::Get,
    auth: Auth::Required,
    payload: Payload::Data,
    failure: "An error occurred while fetching your profile",
};

const UPDATE_USER_INFO: Endpoint = Endpoint {
    method: Method::Put,
    auth: Auth::Required,
    payload: Payload::Data,
    failure: "An error occurred while updating your profile",
};

const VERIFY_PAYMENT: Endpoint = Endpoint {
    method: Method::Post,
    auth: Auth::Required,
    payload: Payload::Inline,
    failure: "An error occurred while verifying your payment",
};

/// Marketplace client. Every gateway function returns an `Envelope` and
/// never an error: failures become `status == false` with a message.
#[derive(Debug, Clone)]
pub struct Client {
    options: ClientOptions,
    transport: Arc<dyn Transport>,
    session: SessionStore,
}

impl Client {
    /// Creates a client talking HTTP to `options.base_url`, with the session
    /// persisted to `options.session_path`.
    pub fn new(options: ClientOptions) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(&options.base_url, &options.user_agent)?;
        let path = options
            .session_path
            .clone()
            .unwrap_or_else(default_session_path);

        debug_log!(
            options.debug,
            "Using {} with session file {}",
            transport.base_url(),
            path.display()
        );

        Ok(Self::with_parts(
            options,
            Arc::new(transport),
            Arc::new(FileStorage::new(path)),
        ))
    }

    /// Creates a client from an explicit transport and storage.
    pub fn with_parts(
        options: ClientOptions,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            options,
            transport,
            session: SessionStore::new(storage),
        }
    }

    /// The options this client was created with.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The persisted session shared by every page.
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Whether a user record is stored.
    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    /// The logged-in user, if any.
    pub fn current_user(&self) -> Option<UserSummary> {
        self.session.current_user()
    }

    /// Creates an account. The backend then emails an OTP to verify it.
    pub fn register(&self, registration: &Registration) -> Envelope<UserSummary> {
        self.call(&REGISTER, "auth/register/", Vec::new(), json_body(registration))
    }

    /// Confirms the email address with the emailed OTP.
    pub fn verify_otp(&self, email: &str, otp: &str) -> Envelope<()> {
        let body = RequestBody::Json(json!({ "email": email, "otp": otp }));
        self.call(&VERIFY_OTP, "auth/verify-email/", Vec::new(), body)
    }

    /// Asks for a new verification OTP.
    pub fn resend_otp(&self, email: &str) -> Envelope<()> {
        let body = RequestBody::Json(json!({ "email": email }));
        self.call(&RESEND_OTP, "auth/resend-otp/", Vec::new(), body)
    }

    /// Logs in and, on success, replaces the stored session.
    pub fn login(&self, username: &str, password: &str) -> Envelope<Session> {
        let body = RequestBody::Json(json!({ "username": username, "password": password }));
        let envelope: Envelope<LoginData> = self.call(&LOGIN, "auth/login/", Vec::new(), body);

        if !envelope.status {
            return Envelope::failure(envelope.message);
        }

        let Some(login) = envelope.data else {
            warn_log!(self.options.debug, "Login succeeded without tokens.");
            return Envelope::failure(LOGIN.failure);
        };

        let session = Session {
            user: login.user,
            access_token: login.access,
            refresh_token: login.refresh,
        };

        if let Err(err) = self.session.persist(&session) {
            warn_log!(self.options.debug, "Failed to store session: {}", err);
            return Envelope::failure(LOGIN.failure);
        }

        debug_log!(
            self.options.debug,
            "Logged in as {}.",
            session.user.username
        );

        Envelope::success(envelope.message, Some(session))
    }

    /// Tells the backend to revoke the refresh token, then clears the local
    /// session no matter how that went.
    pub fn logout(&self) -> Envelope<()> {
        let envelope = match self.session.refresh_token() {
            Some(refresh) if self.session.access_token().is_some() => {
                let body = RequestBody::Json(json!({ "refresh": refresh }));
                self.call(&LOGOUT, "auth/logout/", Vec::new(), body)
            }
            _ => Envelope::success("Logged out", None),
        };

        if !envelope.status {
            warn_log!(
                self.options.debug,
                "Server logout failed, proceeding with local logout: {}",
                envelope.message
            );
        }

        if let Err(err) = self.session.clear() {
            warn_log!(self.options.debug, "Failed to clear session: {}", err);
        }

        envelope
    }

    /// Emails a password reset OTP.
    pub fn forgot_password(&self, email: &str) -> Envelope<()> {
        let body = RequestBody::Json(json!({ "email": email }));
        self.call(&FORGOT_PASSWORD, "auth/forgot-password/", Vec::new(), body)
    }

    /// Sets a new password using the reset OTP.
    pub fn reset_password(&self, reset: &PasswordReset) -> Envelope<()> {
        self.call(&RESET_PASSWORD, "auth/reset-password/", Vec::new(), json_body(reset))
    }

    /// Public listing, filtered and paginated by `query`. Sends the token
    /// when logged in so `is_enrolled` is filled in.
    pub fn list_all_contributions(&self, query: &ContributionQuery) -> Envelope<Vec<Contribution>> {
        self.call(
            &LIST_ALL_CONTRIBUTIONS,
            "api/all-contributions/",
            query.to_pairs(),
            RequestBody::Empty,
        )
    }

    /// The logged-in user's own contributions.
    pub fn list_user_contributions(
        &self,
        query: &ContributionQuery,
    ) -> Envelope<Vec<Contribution>> {
        self.call(
            &LIST_USER_CONTRIBUTIONS,
            "api/user-contributions/",
            query.to_pairs(),
            RequestBody::Empty,
        )
    }

    /// One contribution with its videos, notes and tags.
    pub fn get_contribution(&self, id: &ObjectId) -> Envelope<Contribution> {
        self.call(
            &GET_CONTRIBUTION,
            &format!("api/user-contributions/{}/", id),
            Vec::new(),
            RequestBody::Empty,
        )
    }

    /// Uploads a new contribution as multipart.
    pub fn create_contribution(&self, form: &ContributionForm) -> Envelope<Contribution> {
        self.call(
            &CREATE_CONTRIBUTION,
            "api/user-contributions/",
            Vec::new(),
            RequestBody::Multipart(form.to_multipart()),
        )
    }

    /// Replaces an owned contribution. Videos and notes are matched by id.
    pub fn update_contribution(
        &self,
        id: &ObjectId,
        form: &ContributionForm,
    ) -> Envelope<Contribution> {
        self.call(
            &UPDATE_CONTRIBUTION,
            &format!("api/user-contributions/{}/", id),
            Vec::new(),
            RequestBody::Multipart(form.to_multipart()),
        )
    }

    /// A 204 reply counts as success.
    pub fn delete_contribution(&self, id: &ObjectId) -> Envelope<()> {
        self.call(
            &DELETE_CONTRIBUTION,
            &format!("api/user-contributions/{}/", id),
            Vec::new(),
            RequestBody::Empty,
        )
    }

    /// Enrollments of the logged-in user, paid or pending.
    pub fn list_enrollments(&self) -> Envelope<Vec<Enrollment>> {
        self.call(
            &LIST_ENROLLMENTS,
            "api/enrollments/",
            Vec::new(),
            RequestBody::Empty,
        )
    }

    /// Starts an enrollment. Paid contributions come back with a `payment_url`
    /// the user has to be sent to.
    pub fn create_enrollment(&self, contribution_id: &ObjectId) -> Envelope<Checkout> {
        self.call(
            &CREATE_ENROLLMENT,
            &format!("api/create-enrollments/{}/", contribution_id),
            Vec::new(),
            RequestBody::Empty,
        )
    }

    /// Confirms a gateway transaction after the payment processor redirects back.
    pub fn verify_payment(
        &self,
        val_id: Option<&str>,
        tran_id: Option<&str>,
    ) -> Envelope<PaymentVerification> {
        let body = RequestBody::Json(json!({ "val_id": val_id, "tran_id": tran_id }));
        self.call(&VERIFY_PAYMENT, "api/verify-payment/", Vec::new(), body)
    }

    /// Sends the user to the payment processor in their default browser.
    pub fn open_payment_page(&self, payment_url: &str) -> Result<(), ApiError> {
        debug_log!(self.options.debug, "Opening payment page {}", payment_url);
        open::that(payment_url).or(Err(ApiError::BrowserFailed(payment_url.to_string())))
    }

    /// Ratings left on a contribution.
    pub fn list_ratings(&self, contribution_id: &ObjectId) -> Envelope<Vec<Rating>> {
        self.call(
            &LIST_RATINGS,
            &format!("api/ratings/{}/", contribution_id),
            Vec::new(),
            RequestBody::Empty,
        )
    }

    /// Rates a contribution from 1 to 5, with an optional comment.
    pub fn submit_rating(&self, contribution_id: &ObjectId, input: &RatingInput) -> Envelope<Rating> {
        self.call(
            &SUBMIT_RATING,
            &format!("api/ratings/{}/", contribution_id),
            Vec::new(),
            json_body(input),
        )
    }

    /// Universities for the profile and contribution pickers.
    pub fn universities(&self) -> Envelope<Vec<LookupItem>> {
        self.call(&LOOKUP, "api/universities/", Vec::new(), RequestBody::Empty)
    }

    /// Departments for the profile and contribution pickers.
    pub fn departments(&self) -> Envelope<Vec<LookupItem>> {
        self.call(&LOOKUP, "api/departments/", Vec::new(), RequestBody::Empty)
    }

    /// Major subjects for the profile and contribution pickers.
    pub fn major_subjects(&self) -> Envelope<Vec<LookupItem>> {
        self.call(&LOOKUP, "api/major-subjects/", Vec::new(), RequestBody::Empty)
    }

    /// Full profile of the logged-in user.
    pub fn user_info(&self) -> Envelope<UserInfo> {
        self.call(&USER_INFO, "api/user-info/", Vec::new(), RequestBody::Empty)
    }

    /// Uploads a new picture first (if any), then the rest of the profile.
    pub fn update_user_info(&self, update: &ProfileUpdate) -> Envelope<UserInfo> {
        if let Some(picture) = &update.profile_picture {
            let form = MultipartForm::new().file("profile_picture", picture);
            let upload: Envelope<UserInfo> = self.call(
                &UPDATE_USER_INFO,
                "api/user-info/",
                Vec::new(),
                RequestBody::Multipart(form),
            );
            if !upload.status {
                return upload;
            }
        }

        self.call(&UPDATE_USER_INFO, "api/user-info/", Vec::new(), json_body(update))
    }

    /// Issues one request and folds every failure into a failure envelope.
    fn call<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        path: &str,
        query: Vec<(String, String)>,
        body: RequestBody,
    ) -> Envelope<T> {
        match self.try_call(endpoint, path, query, body) {
            Ok(envelope) => envelope,
            Err(ApiError::NotLoggedIn) => {
                debug_log!(
                    self.options.debug,
                    "{} /{} skipped: not logged in.",
                    endpoint.method,
                    path
                );
                Envelope::failure(ApiError::NotLoggedIn.to_string())
            }
            Err(err) => {
                warn_log!(
                    self.options.debug,
                    "{} /{} failed: {}",
                    endpoint.method,
                    path,
                    err
                );
                Envelope::failure(endpoint.failure)
            }
        }
    }

    fn try_call<T: DeserializeOwned>(
        &self,
        endpoint: &Endpoint,
        path: &str,
        query: Vec<(String, String)>,
        body: RequestBody,
    ) -> Result<Envelope<T>, ApiError> {
        let bearer = match endpoint.auth {
            Auth::None => None,
            Auth::Optional => self.session.access_token(),
            Auth::Required => Some(self.session.access_token().ok_or(ApiError::NotLoggedIn)?),
        };

        let request = ApiRequest {
            method: endpoint.method,
            path: path.to_string(),
            query,
            bearer,
            body,
        };

        debug_log!(self.options.debug, "{} /{}", request.method, request.path);

        let response = self.transport.send(&request)?;

        debug_log!(
            self.options.debug,
            "{} /{} -> {}",
            request.method,
            request.path,
            response.status
        );

        envelope::decode(&response, endpoint.payload)
    }
}

fn json_body<T: serde::Serialize>(value: &T) -> RequestBody {
    // Plain structs with string fields always serialize
    RequestBody::Json(serde_json::to_value(value).unwrap_or_default())
}
