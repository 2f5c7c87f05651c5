//! Domain types for the registration component.
//!
//! - [`RegistrationRecord`]: a persisted user candidate
//! - [`NewRegistration`]: a candidate waiting to be persisted
//! - [`RecordId`] / [`ObjectId`]: backend-specific identifiers
//! - [`RegistrationSubmission`] / [`FieldErrors`]: form input and its errors
//! - [`OutgoingEmail`]: a confirmation message

mod email;
mod form;
mod identifier;
mod record;

pub use email::*;
pub use form::*;
pub use identifier::*;
pub use record::*;
