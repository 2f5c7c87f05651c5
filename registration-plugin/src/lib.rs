//! # Registration Plugin
//!
//! Plugs user registration into a host application.
//!
//! - **Host**: boot-time [`AppConfig`] with hooks, frozen into an [`Application`]
//! - **Registrar**: [`plug`] stores options and binds a data-access adapter
//!   when the host finishes configuring
//! - **Form**: [`DefaultRegistrationForm`] with uniqueness and password checks
//! - **Mailers**: [`MemoryMailer`] and [`LogMailer`]
//! - **Service**: [`RegistrationService`] validates, stores and confirms
//!
//! ## Example
//!
//! ```rust,ignore
//! use registration_plugin::{plug, AppConfig, PluginOptions, RegistrationService};
//!
//! let mut config = AppConfig::new()
//!     .with_setting("registration.email_sender", "reg@email.it")
//!     .with_document_session(session);
//! plug(&mut config, PluginOptions::new().with_dal_name("ming"))?;
//!
//! let app = config.finalize()?;
//! let service = RegistrationService::from_application(&app)?;
//! service.register(submission).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod form;
mod host;
mod mailer;
mod options;
mod registrar;
mod service;

pub use form::{
    DefaultRegistrationForm, INVALID_EMAIL_MESSAGE, MISMATCH_MESSAGE, REQUIRED_MESSAGE,
};
pub use host::{AppConfig, Application, Hook, HookEvent};
pub use mailer::{LogMailer, MemoryMailer};
pub use options::{PluginOptions, ENV_DAL, ENV_EMAIL_SENDER};
pub use registrar::{plug, register_dal_interface, PlugInfo, RegistrarState};
pub use service::{RegistrationOutcome, RegistrationService};
