//! Page controllers: per-page form/async state driven by gateway calls.
//!
//! A controller owns its inputs and a `FormState`. Submitting validates
//! locally first; a validation failure never reaches the network.

use std::time::{Duration, Instant};

use crate::envelope::Envelope;
use crate::errors::ApiError;
use crate::nav::Route;
use crate::structs::client::Client;

pub mod account;
pub mod auth;
pub mod browse;

/// Where to go after a page finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Route(Route),
    /// Full-page redirect off-site, e.g. the payment processor.
    External(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub to: Target,
    pub after: Duration,
}

impl Redirect {
    pub fn route(route: Route, after: Duration) -> Self {
        Self {
            to: Target::Route(route),
            after,
        }
    }

    pub fn now(route: Route) -> Self {
        Self::route(route, Duration::ZERO)
    }

    pub fn external(url: impl Into<String>) -> Self {
        Self {
            to: Target::External(url.into()),
            after: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormState {
    #[default]
    Idle,
    Submitting,
    Success {
        message: String,
        redirect: Option<Redirect>,
    },
    Error(String),
}

impl FormState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, FormState::Submitting)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FormState::Success { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            FormState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn redirect(&self) -> Option<&Redirect> {
        match self {
            FormState::Success { redirect, .. } => redirect.as_ref(),
            _ => None,
        }
    }

    /// Success text, or the backend message when it sent one.
    fn from_envelope<T>(
        envelope: &Envelope<T>,
        success: &str,
        redirect: Option<Redirect>,
    ) -> Self {
        if envelope.status {
            let text = envelope.message.text().trim();
            FormState::Success {
                message: (if text.is_empty() { success } else { text }).to_string(),
                redirect,
            }
        } else {
            FormState::Error(envelope.message.display())
        }
    }
}

// Transient entries only help a flow survive a restart, so a failed write
// is logged and the page carries on.
fn log_storage_failure(client: &Client, action: &str, result: Result<(), ApiError>) {
    if let Err(err) = result {
        warn_log!(client.options().debug, "Failed to {}: {}", action, err);
    }
}

/// Data a page fetched on mount.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Loadable<T> {
    #[default]
    Loading,
    Loaded(T),
    /// The request worked but there is nothing to show.
    Empty,
    Failed(String),
}

impl<T> Loadable<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Loadable::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> Loadable<Vec<T>> {
    fn from_list(envelope: Envelope<Vec<T>>) -> Self {
        match envelope.into_result() {
            Ok(Some(items)) if !items.is_empty() => Loadable::Loaded(items),
            Ok(_) => Loadable::Empty,
            Err(message) => Loadable::Failed(message.display()),
        }
    }
}

/// Client-side throttle for "resend code" buttons.
#[derive(Debug, Clone)]
pub struct ResendCooldown {
    window: Duration,
    last: Option<Instant>,
}

impl ResendCooldown {
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Time left before the button is active again.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last?;
        let left = self.window.checked_sub(now.saturating_duration_since(last))?;
        (!left.is_zero()).then_some(left)
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        self.remaining(now).is_none()
    }

    /// Starts a new window if the previous one has elapsed.
    pub fn try_start(&mut self, now: Instant) -> bool {
        if !self.is_ready(now) {
            return false;
        }
        self.last = Some(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldown_blocks_inside_window() {
        let start = Instant::now();
        let mut cooldown = ResendCooldown::new(Duration::from_secs(60));

        assert!(cooldown.try_start(start));
        assert!(!cooldown.try_start(start + Duration::from_secs(59)));
        assert_eq!(
            cooldown.remaining(start + Duration::from_secs(45)),
            Some(Duration::from_secs(15))
        );
        assert!(cooldown.try_start(start + Duration::from_secs(60)));
    }

    #[test]
    fn form_state_prefers_backend_text() {
        let ok: Envelope<()> = Envelope::success("Email verified successfully", None);
        let silent: Envelope<()> = Envelope::success("", None);

        assert_eq!(
            FormState::from_envelope(&ok, "Done", None),
            FormState::Success {
                message: "Email verified successfully".to_string(),
                redirect: None
            }
        );
        assert_eq!(
            FormState::from_envelope(&silent, "Done", None),
            FormState::Success {
                message: "Done".to_string(),
                redirect: None
            }
        );
    }

    #[test]
    fn empty_list_is_not_an_error() {
        let envelope: Envelope<Vec<u8>> = Envelope::success("Success", Some(Vec::new()));
        assert_eq!(Loadable::from_list(envelope), Loadable::Empty);

        let failed: Envelope<Vec<u8>> = Envelope::failure("Nope");
        assert_eq!(Loadable::from_list(failed), Loadable::Failed("Nope".to_string()));
    }
}
