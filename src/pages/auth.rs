use std::time::Instant;

use super::{log_storage_failure, FormState, Redirect, ResendCooldown};
use crate::errors::ValidationError;
use crate::nav::Route;
use crate::structs::client::Client;
use crate::structs::{PasswordReset, Registration};
use crate::validation;

#[derive(Debug, Clone, Default)]
pub struct SignupPage {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub state: FormState,
}

impl SignupPage {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::require("name", &self.name)?;
        validation::email(&self.email)?;
        validation::password_confirmation(&self.password, &self.confirm_password)
    }

    /// Registers and, on success, sends the user to enter the emailed OTP.
    pub fn submit(&mut self, client: &Client) -> &FormState {
        if let Err(err) = self.validate() {
            self.state = FormState::Error(err.to_string());
            return &self.state;
        }

        self.state = FormState::Submitting;
        let envelope = client.register(&Registration {
            username: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            password2: self.confirm_password.clone(),
        });

        if envelope.status {
            // Lets the OTP page survive a restart
            log_storage_failure(
                client,
                "remember the email awaiting verification",
                client.session().set_pending_verification(self.email.trim()),
            );
        }

        let redirect = Redirect::route(Route::ConfirmOtp, client.options().redirect_delay);
        self.state = FormState::from_envelope(
            &envelope,
            "Registration successful. Please check your email for the OTP.",
            Some(redirect),
        );
        &self.state
    }
}

#[derive(Debug, Clone)]
pub struct OtpPage {
    pub email: String,
    pub otp: String,
    pub state: FormState,
    cooldown: ResendCooldown,
}

impl OtpPage {
    /// Opens the page for the email waiting on verification, or names the
    /// page to go to instead when there is none.
    pub fn open(client: &Client, email: Option<&str>) -> Result<Self, Route> {
        let email = email
            .map(str::to_string)
            .or_else(|| client.session().pending_verification())
            .filter(|email| !email.trim().is_empty())
            .ok_or(Route::Signup)?;

        log_storage_failure(
            client,
            "remember the email awaiting verification",
            client.session().set_pending_verification(&email),
        );

        Ok(Self {
            email,
            otp: String::new(),
            state: FormState::Idle,
            cooldown: ResendCooldown::new(client.options().resend_cooldown),
        })
    }

    pub fn submit(&mut self, client: &Client) -> &FormState {
        if let Err(err) = validation::otp(&self.otp) {
            self.state = FormState::Error(err.to_string());
            return &self.state;
        }

        self.state = FormState::Submitting;
        let envelope = client.verify_otp(&self.email, self.otp.trim());

        if envelope.status {
            log_storage_failure(
                client,
                "forget the verified email",
                client.session().clear_pending_verification(),
            );
        } else {
            // Let the user type a fresh code
            self.otp.clear();
        }

        let redirect = Redirect::route(Route::Login, client.options().redirect_delay);
        self.state =
            FormState::from_envelope(&envelope, "Email verified successfully", Some(redirect));
        &self.state
    }

    pub fn can_resend(&self, now: Instant) -> bool {
        self.cooldown.is_ready(now)
    }

    /// Seconds shown on the disabled button.
    pub fn resend_countdown(&self, now: Instant) -> u64 {
        self.cooldown
            .remaining(now)
            .map(|left| left.as_secs() + u64::from(left.subsec_nanos() > 0))
            .unwrap_or_default()
    }

    /// Requests a new code. Returns false, without calling the backend, while
    /// the cooldown from the previous request is running.
    pub fn resend(&mut self, client: &Client, now: Instant) -> bool {
        if !self.cooldown.try_start(now) {
            return false;
        }

        let envelope = client.resend_otp(&self.email);
        self.state = FormState::from_envelope(
            &envelope,
            "OTP resent successfully. Please check your email.",
            None,
        );
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoginPage {
    /// Username (the backend looks users up by username).
    pub username: String,
    pub password: String,
    /// Page that sent the user here, if any.
    pub return_to: Option<Route>,
    pub state: FormState,
}

impl LoginPage {
    pub fn submit(&mut self, client: &Client) -> &FormState {
        let checked = validation::require("username", &self.username)
            .and_then(|_| validation::require("password", &self.password));
        if let Err(err) = checked {
            self.state = FormState::Error(err.to_string());
            return &self.state;
        }

        self.state = FormState::Submitting;
        let envelope = client.login(self.username.trim(), &self.password);

        let target = self.return_to.clone().unwrap_or(Route::Home);
        let redirect = Redirect::route(target, client.options().redirect_delay);
        self.state = FormState::from_envelope(&envelope, "Login successful", Some(redirect));
        &self.state
    }
}

/// Logs out and says where to land. Local state is cleared even when the
/// backend call fails.
pub fn logout(client: &Client) -> Redirect {
    client.logout();
    Redirect::now(Route::Home)
}

#[derive(Debug, Clone, Default)]
pub struct ForgotPasswordPage {
    pub email: String,
    pub state: FormState,
}

impl ForgotPasswordPage {
    pub fn submit(&mut self, client: &Client) -> &FormState {
        if let Err(err) = validation::email(&self.email) {
            self.state = FormState::Error(err.to_string());
            return &self.state;
        }

        self.state = FormState::Submitting;
        let email = self.email.trim();
        let envelope = client.forgot_password(email);

        if envelope.status {
            log_storage_failure(
                client,
                "remember the email awaiting a reset",
                client.session().set_pending_reset(email),
            );
        }

        let redirect = Redirect::route(Route::ResetPassword, client.options().redirect_delay);
        self.state = FormState::from_envelope(
            &envelope,
            "OTP sent to your email. Please check your inbox.",
            Some(redirect),
        );
        &self.state
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResetPasswordPage {
    pub email: String,
    pub otp: String,
    pub password: String,
    pub confirm_password: String,
    pub state: FormState,
}

impl ResetPasswordPage {
    /// Opens the page for the email that requested a reset.
    pub fn open(client: &Client) -> Result<Self, Route> {
        let email = client
            .session()
            .pending_reset()
            .ok_or(Route::ForgotPassword)?;

        Ok(Self {
            email,
            ..Default::default()
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validation::otp(&self.otp)?;
        validation::require("password", &self.password)?;
        validation::min_length(&self.password, validation::MIN_RESET_PASSWORD_LEN)?;
        validation::password_confirmation(&self.password, &self.confirm_password)
    }

    pub fn submit(&mut self, client: &Client) -> &FormState {
        if let Err(err) = self.validate() {
            self.state = FormState::Error(err.to_string());
            return &self.state;
        }

        self.state = FormState::Submitting;
        let envelope = client.reset_password(&PasswordReset {
            email: self.email.clone(),
            otp: self.otp.trim().to_string(),
            password: self.password.clone(),
            password2: self.confirm_password.clone(),
        });

        if envelope.status {
            log_storage_failure(
                client,
                "forget the reset email",
                client.session().clear_pending_reset(),
            );
        }

        let redirect = Redirect::route(Route::Login, client.options().redirect_delay);
        self.state = FormState::from_envelope(
            &envelope,
            "Password reset successfully. Please log in.",
            Some(redirect),
        );
        &self.state
    }
}
