//! Route table and the top navigation bar.

use std::fmt;

use crate::structs::session::SessionStore;
use crate::structs::ObjectId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Login,
    Signup,
    ConfirmOtp,
    ForgotPassword,
    ResetPassword,
    Contributions,
    /// Public detail page with the enroll button.
    ContributionDetail(ObjectId),
    /// Course player for enrolled users.
    ContributionView(ObjectId),
    Contributors,
    MyContributions,
    AddContribution,
    UpdateContribution(ObjectId),
    Profile,
    PaymentSuccess,
    PaymentFail,
    PaymentCancel,
}

impl Route {
    pub fn path(&self) -> String {
        match self {
            Route::Home => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Signup => "/signup".to_string(),
            Route::ConfirmOtp => "/confirm-otp".to_string(),
            Route::ForgotPassword => "/forgot-password".to_string(),
            Route::ResetPassword => "/reset-password".to_string(),
            Route::Contributions => "/contributions".to_string(),
            Route::ContributionDetail(id) => format!("/contributions/{}", id),
            Route::ContributionView(id) => format!("/contributions/{}/view", id),
            Route::Contributors => "/contributors".to_string(),
            Route::MyContributions => "/my-contributions".to_string(),
            Route::AddContribution => "/add-contributions".to_string(),
            Route::UpdateContribution(id) => format!("/update-contributions/{}", id),
            Route::Profile => "/profile".to_string(),
            Route::PaymentSuccess => "/payment/success".to_string(),
            Route::PaymentFail => "/payment/fail".to_string(),
            Route::PaymentCancel => "/payment/cancel".to_string(),
        }
    }

    /// Resolves a path (query string and trailing slash ignored).
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(&['?', '#'][..]).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        let route = match segments.as_slice() {
            [] => Route::Home,
            ["login"] => Route::Login,
            ["signup"] => Route::Signup,
            ["confirm-otp"] => Route::ConfirmOtp,
            ["forgot-password"] => Route::ForgotPassword,
            ["reset-password"] => Route::ResetPassword,
            ["contributions"] => Route::Contributions,
            ["contributions", id] => Route::ContributionDetail(ObjectId::from(*id)),
            ["contributions", id, "view"] => Route::ContributionView(ObjectId::from(*id)),
            ["contributors"] => Route::Contributors,
            ["my-contributions"] => Route::MyContributions,
            ["add-contributions"] => Route::AddContribution,
            ["update-contributions", id] => Route::UpdateContribution(ObjectId::from(*id)),
            ["profile"] => Route::Profile,
            ["payment", "success"] => Route::PaymentSuccess,
            ["payment", "fail"] => Route::PaymentFail,
            ["payment", "cancel"] => Route::PaymentCancel,
            _ => return None,
        };

        Some(route)
    }

    /// Pages that bounce anonymous users to the login page.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Route::ContributionView(_)
                | Route::MyContributions
                | Route::AddContribution
                | Route::UpdateContribution(_)
                | Route::Profile
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    Go(Route),
    Logout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavItem {
    pub label: String,
    pub action: NavAction,
}

impl NavItem {
    fn go(label: &str, route: Route) -> Self {
        Self {
            label: label.to_string(),
            action: NavAction::Go(route),
        }
    }
}

/// Navigation bar entries for whoever is (or isn't) logged in.
pub fn nav_items(session: &SessionStore) -> Vec<NavItem> {
    let mut items = vec![
        NavItem::go("Home", Route::Home),
        NavItem::go("Contributions", Route::Contributions),
        NavItem::go("Contributors", Route::Contributors),
    ];

    if session.is_logged_in() {
        let name = session
            .current_user()
            .map(|user| user.username)
            .unwrap_or_else(|| "Profile".to_string());
        items.push(NavItem::go("My Contributions", Route::MyContributions));
        items.push(NavItem::go(&name, Route::Profile));
        items.push(NavItem {
            label: "Logout".to_string(),
            action: NavAction::Logout,
        });
    } else {
        items.push(NavItem::go("Login", Route::Login));
        items.push(NavItem::go("Sign up", Route::Signup));
    }

    items
}

/// Where navigating to `route` actually lands.
pub fn guard(route: Route, session: &SessionStore) -> Route {
    if route.requires_login() && !session.is_logged_in() {
        return Route::Login;
    }
    route
}
