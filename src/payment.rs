//! Payment redirect contract.
//!
//! Enrolling in a paid contribution returns a `payment_url`. The payment
//! processor later sends the browser back to one of the fixed return routes,
//! optionally with a transaction id that has to be verified once.

use reqwest::Url;

use crate::nav::Route;
use crate::structs::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success,
    Fail,
    Cancel,
}

impl PaymentOutcome {
    pub fn route(self) -> Route {
        match self {
            PaymentOutcome::Success => Route::PaymentSuccess,
            PaymentOutcome::Fail => Route::PaymentFail,
            PaymentOutcome::Cancel => Route::PaymentCancel,
        }
    }
}

/// Where the payment processor sent the user back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReturn {
    pub outcome: PaymentOutcome,
    pub val_id: Option<String>,
    pub tran_id: Option<String>,
    /// Present on the backend's own return URLs (`/api/payment/success/<id>/`).
    pub enrollment_id: Option<ObjectId>,
}

impl PaymentReturn {
    /// Parses an absolute URL or a bare path with query string.
    pub fn parse(location: &str) -> Option<Self> {
        let base = Url::parse("http://localhost/").ok()?;
        let url = base.join(location).ok()?;

        let segments: Vec<&str> = url
            .path_segments()?
            .filter(|segment| !segment.is_empty())
            .collect();

        let (outcome, rest) = match segments.as_slice() {
            ["payment", outcome, rest @ ..] | ["api", "payment", outcome, rest @ ..] => {
                (parse_outcome(outcome)?, rest)
            }
            _ => return None,
        };

        let enrollment_id = match rest {
            [] => None,
            [id] => Some(ObjectId::from(*id)),
            _ => return None,
        };

        let param = |name: &str| {
            url.query_pairs()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.into_owned())
                .filter(|value| !value.is_empty())
        };

        Some(Self {
            outcome,
            val_id: param("val_id"),
            tran_id: param("tran_id"),
            enrollment_id,
        })
    }

    /// A success return carrying a transaction reference triggers one
    /// verification call. Without one there is nothing to verify.
    pub fn needs_verification(&self) -> bool {
        self.outcome == PaymentOutcome::Success && (self.val_id.is_some() || self.tran_id.is_some())
    }
}

fn parse_outcome(segment: &str) -> Option<PaymentOutcome> {
    match segment {
        "success" => Some(PaymentOutcome::Success),
        "fail" => Some(PaymentOutcome::Fail),
        "cancel" => Some(PaymentOutcome::Cancel),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frontend_success_with_transaction() {
        let ret = PaymentReturn::parse("/payment/success?val_id=V1&tran_id=T1").unwrap();
        assert_eq!(ret.outcome, PaymentOutcome::Success);
        assert_eq!(ret.val_id.as_deref(), Some("V1"));
        assert_eq!(ret.tran_id.as_deref(), Some("T1"));
        assert!(ret.needs_verification());
        assert_eq!(ret.outcome.route(), Route::PaymentSuccess);
    }

    #[test]
    fn parses_backend_return_url() {
        let ret = PaymentReturn::parse(
            "http://127.0.0.1:8000/api/payment/fail/2c0f6a8e-0a4b-4d2a-9d8e-5b8a7c1e3f20/",
        )
        .unwrap();
        assert_eq!(ret.outcome, PaymentOutcome::Fail);
        assert_eq!(
            ret.enrollment_id,
            Some(ObjectId::from("2c0f6a8e-0a4b-4d2a-9d8e-5b8a7c1e3f20"))
        );
        assert!(!ret.needs_verification());
    }

    #[test]
    fn success_without_transaction_needs_no_verification() {
        let ret = PaymentReturn::parse("/payment/success?tran_id=").unwrap();
        assert!(!ret.needs_verification());
    }

    #[test]
    fn rejects_unrelated_routes() {
        assert!(PaymentReturn::parse("/payment/refund").is_none());
        assert!(PaymentReturn::parse("/contributions/1").is_none());
    }
}
