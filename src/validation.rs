//! Client-side form checks. A fast-fail convenience, not a security boundary.

use regex::Regex;
use std::sync::OnceLock;

use crate::errors::ValidationError;

pub const MIN_RESET_PASSWORD_LEN: usize = 6;

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

pub fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

pub fn email(value: &str) -> Result<(), ValidationError> {
    require("email", value)?;
    if !email_pattern().is_some_and(|pattern| pattern.is_match(value.trim())) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}

pub fn password_confirmation(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    require("password", password)?;
    require("confirm password", confirmation)?;
    if password != confirmation {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

pub fn min_length(password: &str, min: usize) -> Result<(), ValidationError> {
    if password.chars().count() < min {
        return Err(ValidationError::PasswordTooShort(min));
    }
    Ok(())
}

pub fn otp(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingOtp);
    }
    Ok(())
}

pub fn price(value: &str) -> Result<f64, ValidationError> {
    require("price", value)?;
    match value.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(ValidationError::InvalidPrice),
    }
}

pub fn rating(value: u8) -> Result<(), ValidationError> {
    if !(1..=5).contains(&value) {
        return Err(ValidationError::InvalidRating);
    }
    Ok(())
}
