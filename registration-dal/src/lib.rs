//! # Registration DAL
//!
//! Data-access adapters for registration records.
//!
//! Two interchangeable backends implement [`RegistrationDal`]:
//!
//! - **Relational**: a `tg_user` table reached through a libSQL connection
//! - **Document**: a `tg_user` collection with unique indexes on
//!   `user_name` and `email_address`
//!
//! Both wrap a session owned by the host application.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use registration_dal::{RelationalRegistration, RelationalSession, RegistrationDal};
//!
//! let session = Arc::new(RelationalSession::in_memory().await?);
//! let dal = RelationalRegistration::new(session);
//!
//! let id = dal.create(NewRegistration::new("alice", "alice@example.com", "pw")).await?;
//! assert!(dal.exists_user_name("alice").await?);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod document;
mod relational;
mod store;

pub use document::DocumentRegistration;
pub use relational::{RelationalRegistration, RelationalSession};
pub use store::{Document, DocumentError, DocumentSession, IndexSpec};

// Re-export the trait from core
pub use registration_core::traits::RegistrationDal;
