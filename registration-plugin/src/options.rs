//! Plugin options.
//!
//! Options come from the host when it plugs the component, from host
//! settings prefixed with `registration.`, or from the environment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use registration_core::constants::{DEFAULT_DAL, SETTINGS_PREFIX};
use registration_core::error::{RegistrationError, Result};
use registration_core::traits::RegistrationForm;
use registration_core::types::DalBackend;

/// Environment variable naming the backend.
pub const ENV_DAL: &str = "REGISTRATION_DAL";

/// Environment variable naming the confirmation sender.
pub const ENV_EMAIL_SENDER: &str = "REGISTRATION_EMAIL_SENDER";

/// Options handed to [`plug`](crate::plug).
///
/// `dal` keeps the raw option value; it is resolved to a [`DalBackend`]
/// exactly once, when the registrar binds.
#[derive(Clone, Default)]
pub struct PluginOptions {
    /// Raw `dal` option (`"sqla"` when absent)
    pub dal: Option<String>,
    /// Replacement for the default registration form
    pub form_instance: Option<Arc<dyn RegistrationForm>>,
    /// Sender address for confirmation emails
    pub email_sender: Option<String>,
}

impl PluginOptions {
    /// Options with every value defaulted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects a backend.
    pub fn with_dal(mut self, backend: DalBackend) -> Self {
        self.dal = Some(backend.as_str().to_string());
        self
    }

    /// Sets the raw `dal` option, validated when the registrar binds.
    pub fn with_dal_name(mut self, name: impl Into<String>) -> Self {
        self.dal = Some(name.into());
        self
    }

    /// Replaces the registration form.
    pub fn with_form(mut self, form: Arc<dyn RegistrationForm>) -> Self {
        self.form_instance = Some(form);
        self
    }

    /// Sets the confirmation sender.
    pub fn with_email_sender(mut self, sender: impl Into<String>) -> Self {
        self.email_sender = Some(sender.into());
        self
    }

    /// Resolves the `dal` option to one of the supported backends.
    pub fn dal_backend(&self) -> Result<DalBackend> {
        self.dal.as_deref().unwrap_or(DEFAULT_DAL).parse()
    }

    /// Reads `registration.dal` and `registration.email_sender` from host settings.
    ///
    /// An unsupported `dal` is rejected here rather than at bind time.
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| settings.get(&format!("{SETTINGS_PREFIX}{key}")).cloned();

        let options = Self {
            dal: get("dal"),
            form_instance: None,
            email_sender: get("email_sender"),
        };
        options.dal_backend()?;
        Ok(options)
    }

    /// Reads options from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let options = Self {
            dal: std::env::var(ENV_DAL).ok().filter(|v| !v.trim().is_empty()),
            form_instance: None,
            email_sender: std::env::var(ENV_EMAIL_SENDER)
                .ok()
                .filter(|v| !v.trim().is_empty()),
        };
        options.dal_backend().map_err(|e| {
            RegistrationError::ConfigurationError(format!("{ENV_DAL}: {e}"))
        })?;
        Ok(options)
    }
}

impl fmt::Debug for PluginOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginOptions")
            .field("dal", &self.dal)
            .field(
                "form_instance",
                &self.form_instance.as_ref().map(|_| "custom").unwrap_or("default"),
            )
            .field("email_sender", &self.email_sender)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_is_relational() {
        assert_eq!(PluginOptions::new().dal_backend().unwrap(), DalBackend::Sqla);
    }

    #[test]
    fn test_raw_dal_resolved_late() {
        let options = PluginOptions::new().with_dal_name("unsupported");
        // Building the options never fails; resolving does
        assert!(matches!(
            options.dal_backend(),
            Err(RegistrationError::ConfigurationError(_))
        ));

        let ming = PluginOptions::new().with_dal(DalBackend::Ming);
        assert_eq!(ming.dal_backend().unwrap(), DalBackend::Ming);
    }

    #[test]
    fn test_from_settings() {
        let mut settings = HashMap::new();
        settings.insert("registration.dal".to_string(), "ming".to_string());
        settings.insert("registration.email_sender".to_string(), "reg@email.it".to_string());
        settings.insert("mail.debugmailer".to_string(), "dummy".to_string());

        let options = PluginOptions::from_settings(&settings).unwrap();
        assert_eq!(options.dal_backend().unwrap(), DalBackend::Ming);
        assert_eq!(options.email_sender.as_deref(), Some("reg@email.it"));
    }

    #[test]
    fn test_from_settings_rejects_unknown_dal() {
        let mut settings = HashMap::new();
        settings.insert("registration.dal".to_string(), "mongo".to_string());
        assert!(PluginOptions::from_settings(&settings).is_err());
    }

    #[test]
    fn test_debug_names_form_kind() {
        let rendered = format!("{:?}", PluginOptions::new());
        assert!(rendered.contains("default"));
    }
}
