//! # Registration Core
//!
//! Core types, errors, and traits shared by every registration crate.
//!
//! - **Types**: registration records, identifiers, form submissions
//! - **Errors**: a single error enum with classification helpers
//! - **Constants**: table/collection names, field limits, well-known keys
//! - **Traits**: the data-access, mailer and form capability sets
//!
//! ## Example
//!
//! ```rust
//! use registration_core::{NewRegistration, RecordId};
//!
//! let user = NewRegistration::new("alice", "alice@example.com", "pw")
//!     .with_display_name("Alice");
//! assert!(user.validate().is_ok());
//!
//! let id: RecordId = "42".parse().unwrap();
//! assert_eq!(id, RecordId::Integer(42));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{RegistrationError, Result, UniqueField};
pub use traits::*;
pub use types::*;
