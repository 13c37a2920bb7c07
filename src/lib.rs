//! Blocking client for the Edusphere contribution marketplace.
//!
//! `Client` wraps every backend operation in an `Envelope`, keeps the login
//! session on disk and exposes page controllers (`pages`) that drive the
//! signup, login, browsing, enrollment and payment flows.

#[macro_use]
mod log;

pub mod catalog;
pub mod envelope;
pub mod errors;
pub mod nav;
pub mod pages;
pub mod payment;
pub mod structs;
pub mod transport;
pub mod validation;

pub use envelope::{Envelope, ErrorMap, Message};
pub use errors::{ApiError, ValidationError};
pub use structs::client::{Client, ClientOptions, DEFAULT_BASE_URL};
pub use structs::session::{FileStorage, MemoryStorage, Session, SessionStore, Storage};
pub use transport::{HttpTransport, Transport};

#[cfg(test)]
mod tests;
