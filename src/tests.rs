use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::nav::Route;
use crate::pages::account::{ContributionEditor, MyContributionsPage, ProfilePage};
use crate::pages::auth::{self, LoginPage, OtpPage, SignupPage};
use crate::pages::browse::{
    BrowsePage, ContributionDetailPage, EnrollOutcome, PaymentReturnPage, PaymentState, RatingForm,
};
use crate::pages::{FormState, Loadable, Redirect};
use crate::structs::{ContributionQuery, ObjectId, UserSummary};
use crate::transport::{ApiRequest, RawResponse, RequestBody};
use crate::{
    ApiError, Client, ClientOptions, FileStorage, MemoryStorage, Session, Storage, Transport,
};

/// Replays scripted replies in order and records every request.
#[derive(Debug, Default)]
struct FakeTransport {
    replies: Mutex<VecDeque<Result<RawResponse, ApiError>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn reply(&self, status: u16, body: Value) -> &Self {
        self.push(Ok(RawResponse {
            status,
            body: serde_json::to_vec(&body).unwrap(),
        }))
    }

    fn push(&self, reply: Result<RawResponse, ApiError>) -> &Self {
        self.replies.lock().unwrap().push_back(reply);
        self
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> ApiRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

impl Transport for FakeTransport {
    fn send(&self, request: &ApiRequest) -> Result<RawResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::RequestFailed("no scripted reply".to_string())))
    }
}

/// Storage that reads as empty and refuses every write.
#[derive(Debug)]
struct ReadOnlyStorage;

impl ReadOnlyStorage {
    fn refuse() -> ApiError {
        ApiError::Storage(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }
}

impl Storage for ReadOnlyStorage {
    fn get(&self, _key: &str) -> Result<Option<String>, ApiError> {
        Ok(None)
    }

    fn set_all(&self, _entries: &[(&str, String)]) -> Result<(), ApiError> {
        Err(Self::refuse())
    }

    fn remove_all(&self, _keys: &[&str]) -> Result<(), ApiError> {
        Err(Self::refuse())
    }
}

fn client(transport: &Arc<FakeTransport>) -> Client {
    Client::with_parts(
        ClientOptions::default(),
        transport.clone(),
        Arc::new(MemoryStorage::new()),
    )
}

fn logged_in(transport: &Arc<FakeTransport>) -> Client {
    let client = client(transport);
    client
        .session()
        .persist(&Session {
            user: UserSummary {
                username: "rafi".to_string(),
                ..Default::default()
            },
            access_token: "A".to_string(),
            refresh_token: "R".to_string(),
        })
        .unwrap();
    client
}

fn contribution(id: &str, tags: &[&str]) -> Value {
    let tags: Vec<Value> = tags.iter().map(|name| json!({ "name": name })).collect();
    json!({
        "id": id,
        "user": { "id": 1, "username": "rafi" },
        "title": format!("Course {}", id),
        "description": "Notes and videos",
        "price": "150.00",
        "tags": tags,
    })
}

#[test]
fn gateway_calls_fold_bad_replies_into_failures() {
    let transport = FakeTransport::new();
    transport
        .push(Ok(RawResponse {
            status: 500,
            body: b"<h1>Server Error</h1>".to_vec(),
        }))
        .reply(200, json!([contribution("1", &[])]))
        .reply(404, json!({ "detail": "Not found." }))
        .push(Err(ApiError::RequestFailed("connection refused".to_string())));
    let client = client(&transport);

    let query = ContributionQuery::default();
    let html = client.list_all_contributions(&query);
    let bare = client.list_all_contributions(&query);
    let missing = client.get_contribution(&ObjectId::from("9"));
    let offline = client.list_all_contributions(&query);

    for envelope in [&html, &bare, &offline] {
        assert!(!envelope.status);
        assert_eq!(
            envelope.message.display(),
            "An error occurred while fetching contributions"
        );
    }
    assert!(!missing.status);
    assert_eq!(missing.message.display(), "Not found.");
    assert_eq!(transport.calls(), 4);
}

#[test]
fn login_stores_session_and_redirects_home() {
    let transport = FakeTransport::new();
    transport.reply(
        200,
        json!({
            "status": true,
            "message": "Login successful",
            "user": { "username": "a" },
            "access": "A",
            "refresh": "R"
        }),
    );
    let client = client(&transport);

    let mut page = LoginPage {
        username: "a@b.com".to_string(),
        password: "x".to_string(),
        ..Default::default()
    };
    let state = page.submit(&client).clone();

    assert_eq!(
        state,
        FormState::Success {
            message: "Login successful".to_string(),
            redirect: Some(Redirect::route(Route::Home, Duration::from_secs(2))),
        }
    );
    assert!(client.is_logged_in());
    assert_eq!(client.current_user().unwrap().username, "a");
    assert_eq!(client.session().access_token().as_deref(), Some("A"));
    assert_eq!(client.session().refresh_token().as_deref(), Some("R"));

    let request = transport.request(0);
    assert_eq!(request.path, "auth/login/");
    assert_eq!(request.bearer, None);
    assert_eq!(
        request.body,
        RequestBody::Json(json!({ "username": "a@b.com", "password": "x" }))
    );
}

#[test]
fn failed_login_keeps_session_empty() {
    let transport = FakeTransport::new();
    transport.reply(
        401,
        json!({ "status": false, "message": "Invalid username or password" }),
    );
    let client = client(&transport);

    let envelope = client.login("a", "wrong");

    assert!(!envelope.status);
    assert_eq!(envelope.message.display(), "Invalid username or password");
    assert!(!client.is_logged_in());
}

#[test]
fn error_status_code_fails_even_when_body_claims_success() {
    let transport = FakeTransport::new();
    transport
        .reply(500, json!({ "status": true, "message": "ok", "data": [] }))
        .reply(
            401,
            json!({ "status": true, "user": { "username": "a" }, "access": "A", "refresh": "R" }),
        );
    let client = client(&transport);

    let list = client.list_all_contributions(&ContributionQuery::default());
    assert!(!list.status);
    assert!(list.data.is_none());
    assert_eq!(list.message.display(), "ok");

    let login = client.login("a", "x");
    assert!(!login.status);
    assert!(login.data.is_none());
    assert!(!client.is_logged_in());
    assert_eq!(client.session().access_token(), None);
}

#[test]
fn logout_clears_session_even_when_backend_fails() {
    let transport = FakeTransport::new();
    transport.push(Err(ApiError::RequestFailed("timed out".to_string())));
    let client = logged_in(&transport);

    let redirect = auth::logout(&client);

    assert_eq!(redirect, Redirect::now(Route::Home));
    assert!(!client.is_logged_in());
    assert!(client.session().current_session().is_none());

    let request = transport.request(0);
    assert_eq!(request.bearer.as_deref(), Some("A"));
    assert_eq!(request.body, RequestBody::Json(json!({ "refresh": "R" })));
}

#[test]
fn logout_without_session_sends_nothing() {
    let transport = FakeTransport::new();
    let client = client(&transport);

    assert!(client.logout().status);
    assert_eq!(transport.calls(), 0);
}

#[test]
fn signup_with_mismatched_passwords_never_calls_backend() {
    let transport = FakeTransport::new();
    let client = client(&transport);

    let mut page = SignupPage {
        name: "rafi".to_string(),
        email: "rafi@example.com".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret2".to_string(),
        ..Default::default()
    };

    assert_eq!(page.submit(&client).error(), Some("Passwords do not match."));
    assert_eq!(transport.calls(), 0);
}

#[test]
fn signup_then_otp_page_picks_up_pending_email() {
    let transport = FakeTransport::new();
    transport
        .reply(
            201,
            json!({
                "status": true,
                "message": "User registered successfully",
                "data": { "id": 4, "username": "rafi", "email": "rafi@example.com" }
            }),
        )
        .reply(200, json!({ "status": true, "message": "Email verified successfully" }));
    let client = client(&transport);

    let mut signup = SignupPage {
        name: "rafi".to_string(),
        email: "rafi@example.com".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
        ..Default::default()
    };
    let redirect = signup.submit(&client).redirect().cloned().unwrap();
    assert_eq!(redirect.to, crate::pages::Target::Route(Route::ConfirmOtp));

    let mut otp = OtpPage::open(&client, None).unwrap();
    assert_eq!(otp.email, "rafi@example.com");

    otp.otp = "123456".to_string();
    assert!(otp.submit(&client).is_success());
    assert_eq!(client.session().pending_verification(), None);
    assert!(matches!(OtpPage::open(&client, None), Err(Route::Signup)));
}

#[test]
fn otp_resend_is_throttled() {
    let transport = FakeTransport::new();
    transport
        .reply(200, json!({ "status": true, "message": "OTP resent" }))
        .reply(200, json!({ "status": true, "message": "OTP resent" }));
    let client = client(&transport);
    let mut page = OtpPage::open(&client, Some("a@b.com")).unwrap();
    let start = Instant::now();

    assert!(page.resend(&client, start));
    assert!(!page.resend(&client, start + Duration::from_secs(10)));
    assert_eq!(transport.calls(), 1);
    assert_eq!(page.resend_countdown(start + Duration::from_secs(10)), 50);

    assert!(page.resend(&client, start + Duration::from_secs(60)));
    assert_eq!(transport.calls(), 2);
}

#[test]
fn failed_otp_clears_the_code() {
    let transport = FakeTransport::new();
    transport.reply(
        400,
        json!({ "status": false, "message": { "otp": ["Invalid OTP"] } }),
    );
    let client = client(&transport);
    let mut page = OtpPage::open(&client, Some("a@b.com")).unwrap();
    page.otp = "000000".to_string();

    assert_eq!(page.submit(&client).error(), Some("Invalid OTP"));
    assert!(page.otp.is_empty());
}

#[test]
fn required_auth_short_circuits_without_a_request() {
    let transport = FakeTransport::new();
    let client = client(&transport);

    let envelope = client.list_enrollments();

    assert!(!envelope.status);
    assert_eq!(envelope.message.display(), "Please log in to continue.");
    assert_eq!(transport.calls(), 0);
}

#[test]
fn optional_auth_sends_token_only_when_logged_in() {
    let transport = FakeTransport::new();
    transport
        .reply(200, json!({ "status": true, "data": [] }))
        .reply(200, json!({ "status": true, "data": [] }));

    let anonymous = client(&transport);
    anonymous.list_all_contributions(&ContributionQuery::default());
    assert_eq!(transport.request(0).bearer, None);

    let member = Client::with_parts(
        ClientOptions::default(),
        transport.clone(),
        Arc::new(MemoryStorage::new()),
    );
    member
        .session()
        .persist(&Session {
            user: UserSummary::default(),
            access_token: "T".to_string(),
            refresh_token: "R".to_string(),
        })
        .unwrap();
    member.list_all_contributions(&ContributionQuery {
        search: Some("graph".to_string()),
        ..Default::default()
    });

    let request = transport.request(1);
    assert_eq!(request.bearer.as_deref(), Some("T"));
    assert_eq!(
        request.query,
        vec![("search".to_string(), "graph".to_string())]
    );
}

#[test]
fn browse_filters_by_exact_tag() {
    let transport = FakeTransport::new();
    transport.reply(
        200,
        json!({
            "status": true,
            "message": "Success",
            "data": [
                contribution("1", &["DSA"]),
                contribution("2", &["DSA-advanced"]),
                contribution("3", &["english", "DSA"])
            ]
        }),
    );
    let client = client(&transport);
    let mut page = BrowsePage::load(&client, &ContributionQuery::default());

    assert_eq!(page.visible().len(), 3);

    page.active_tag = "DSA".to_string();
    let ids: Vec<&str> = page.visible().iter().map(|c| c.id.0.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);

    page.search = "course 3".to_string();
    assert_eq!(page.visible().len(), 1);
}

#[test]
fn delete_with_no_content_removes_row() {
    let transport = FakeTransport::new();
    transport
        .reply(
            200,
            json!({ "status": true, "data": [contribution("1", &[]), contribution("2", &[])] }),
        )
        .push(Ok(RawResponse {
            status: 204,
            body: Vec::new(),
        }));
    let client = logged_in(&transport);
    let mut page = MyContributionsPage::load(&client);

    assert!(page.delete(&client, &ObjectId::from("1")).is_success());

    let remaining = page.contributions.loaded().unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, ObjectId::from("2"));
    assert_eq!(transport.request(1).path, "api/user-contributions/1/");
}

#[test]
fn editor_validates_then_sends_multipart() {
    let transport = FakeTransport::new();
    transport.reply(
        201,
        json!({ "status": true, "message": "", "data": contribution("7", &["DSA"]) }),
    );
    let client = logged_in(&transport);

    let mut editor = ContributionEditor::new();
    editor.form.title = "Graphs".to_string();
    editor.form.description = "BFS and DFS".to_string();
    editor.form.price = "-5".to_string();
    editor.form.tags = vec!["DSA".to_string()];

    assert!(editor.submit(&client).error().is_some());
    assert_eq!(transport.calls(), 0);

    editor.form.price = "150".to_string();
    let state = editor.submit(&client).clone();

    assert_eq!(
        state,
        FormState::Success {
            message: "Contribution created successfully".to_string(),
            redirect: Some(Redirect::route(
                Route::MyContributions,
                Duration::from_secs(2)
            )),
        }
    );

    let RequestBody::Multipart(form) = transport.request(0).body else {
        panic!("expected a multipart body");
    };
    assert!(form.fields().iter().any(|(key, _)| key == "tags[0][name]"));
}

#[test]
fn enrolling_needs_login_then_redirects_to_payment() {
    let transport = FakeTransport::new();
    transport
        .reply(200, json!({ "status": true, "data": contribution("5", &[]) }))
        .reply(200, json!({ "status": true, "data": [] }));
    let anonymous = client(&transport);

    let mut page = ContributionDetailPage::load(&anonymous, &ObjectId::from("5"));
    assert!(!page.enrolled);
    assert_eq!(page.ratings, Loadable::Empty);
    assert_eq!(
        anonymous.session().last_viewed_contribution(),
        Some(ObjectId::from("5"))
    );
    assert_eq!(
        page.enroll(&anonymous),
        EnrollOutcome::LoginRequired(Redirect::now(Route::Login))
    );
    assert_eq!(page.return_route(), Route::ContributionDetail(ObjectId::from("5")));
    assert_eq!(transport.calls(), 2);

    transport.reply(
        200,
        json!({
            "status": true,
            "message": "Redirecting to payment",
            "payment_url": "https://sandbox.pay.example/checkout/abc"
        }),
    );
    let member = logged_in(&transport);

    assert_eq!(
        page.enroll(&member),
        EnrollOutcome::Payment(Redirect::external(
            "https://sandbox.pay.example/checkout/abc"
        ))
    );
    assert_eq!(transport.request(2).path, "api/create-enrollments/5/");
}

#[test]
fn payment_return_verifies_once() {
    let transport = FakeTransport::new();
    transport.reply(
        200,
        json!({ "status": "success", "message": "Payment verified", "contribution_id": "c1" }),
    );
    let client = logged_in(&transport);

    let mut page = PaymentReturnPage::open("/payment/success?val_id=V1&tran_id=T1").unwrap();
    let first = page.resolve(&client).clone();
    let second = page.resolve(&client).clone();

    assert_eq!(first, second);
    assert_eq!(
        first,
        PaymentState::Succeeded {
            contribution_id: Some(ObjectId::from("c1")),
            redirect_url: None,
        }
    );
    assert_eq!(transport.calls(), 1);
    assert_eq!(
        page.continue_to(),
        Redirect::now(Route::ContributionView(ObjectId::from("c1")))
    );
}

#[test]
fn cancelled_payment_skips_verification() {
    let transport = FakeTransport::new();
    let client = logged_in(&transport);

    let mut page = PaymentReturnPage::open("/payment/cancel").unwrap();

    assert_eq!(page.resolve(&client), &PaymentState::Cancelled);
    assert_eq!(transport.calls(), 0);
    assert_eq!(page.continue_to(), Redirect::now(Route::Contributions));
}

#[test]
fn session_survives_client_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");
    let transport = FakeTransport::new();
    transport.reply(
        200,
        json!({ "status": true, "user": { "username": "a" }, "access": "A", "refresh": "R" }),
    );

    let first = Client::with_parts(
        ClientOptions::default(),
        transport.clone(),
        Arc::new(FileStorage::new(&path)),
    );
    assert!(first.login("a", "x").status);

    let second = Client::with_parts(
        ClientOptions::default(),
        transport.clone(),
        Arc::new(FileStorage::new(&path)),
    );
    assert!(second.is_logged_in());
    assert_eq!(second.current_user().unwrap().username, "a");
}

#[test]
fn rating_form_checks_range_before_submitting() {
    let transport = FakeTransport::new();
    transport.reply(
        201,
        json!({ "status": true, "message": "Rating submitted", "data": { "rating": 4, "comment": "Clear" } }),
    );
    let client = logged_in(&transport);
    let id = ObjectId::from("5");

    let mut form = RatingForm {
        rating: 0,
        ..Default::default()
    };
    assert_eq!(form.submit(&client, &id).error(), Some("Rating must be between 1 and 5."));
    assert_eq!(transport.calls(), 0);

    form.rating = 4;
    form.comment = " Clear ".to_string();
    assert!(form.submit(&client, &id).is_success());
    assert!(form.comment.is_empty());

    let request = transport.request(0);
    assert_eq!(request.path, "api/ratings/5/");
    assert_eq!(
        request.body,
        RequestBody::Json(json!({ "rating": 4, "comment": "Clear" }))
    );
}

#[test]
fn profile_page_prefills_lookup_ids() {
    let transport = FakeTransport::new();
    transport
        .reply(
            200,
            json!({
                "status": true,
                "data": {
                    "username": "rafi",
                    "email": "rafi@example.com",
                    "phone_number": "01700000000",
                    "university": { "id": 2, "name": "BUET" },
                    "department": 3
                }
            }),
        )
        .reply(200, json!({ "status": true, "data": [{ "id": 2, "name": "BUET" }] }))
        .reply(500, json!({ "status": false, "message": "Lookup unavailable" }))
        .reply(200, json!({ "status": true, "data": [] }));
    let client = logged_in(&transport);

    let page = ProfilePage::load(&client);

    assert_eq!(page.form.university, "2");
    assert_eq!(page.form.department, "3");
    assert_eq!(page.form.major_subject, "");
    assert_eq!(page.form.phone_number, "01700000000");
    assert_eq!(page.universities.len(), 1);
    assert!(page.departments.is_empty());
    assert_eq!(transport.calls(), 4);
}

#[test]
fn pages_carry_on_when_transient_writes_fail() {
    let transport = FakeTransport::new();
    transport
        .reply(
            201,
            json!({ "status": true, "message": "User registered successfully", "data": { "username": "rafi" } }),
        )
        .reply(200, json!({ "status": true, "message": "Email verified successfully" }))
        .reply(200, json!({ "status": true, "data": contribution("5", &[]) }))
        .reply(200, json!({ "status": true, "data": [] }));
    let client = Client::with_parts(
        ClientOptions {
            debug: true,
            ..Default::default()
        },
        transport.clone(),
        Arc::new(ReadOnlyStorage),
    );

    let mut signup = SignupPage {
        name: "rafi".to_string(),
        email: "rafi@example.com".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
        ..Default::default()
    };
    assert!(signup.submit(&client).is_success());
    assert_eq!(client.session().pending_verification(), None);
    assert!(matches!(OtpPage::open(&client, None), Err(Route::Signup)));

    let mut otp = OtpPage::open(&client, Some("rafi@example.com")).unwrap();
    otp.otp = "123456".to_string();
    assert!(otp.submit(&client).is_success());

    let detail = ContributionDetailPage::load(&client, &ObjectId::from("5"));
    assert!(detail.contribution.loaded().is_some());
    assert_eq!(client.session().last_viewed_contribution(), None);
    assert_eq!(transport.calls(), 4);
}
