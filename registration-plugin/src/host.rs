//! Host configuration container.
//!
//! [`AppConfig`] is the mutable configuration a host assembles while it
//! boots. Components hook into it, and [`AppConfig::finalize`] fires the
//! hooks and freezes everything into an [`Application`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use registration_core::constants::SETTINGS_PREFIX;
use registration_core::error::{RegistrationError, Result};
use registration_core::traits::{Mailer, RegistrationDal, RegistrationForm};
use registration_dal::{DocumentSession, RelationalSession};

use crate::form::DefaultRegistrationForm;
use crate::mailer::LogMailer;
use crate::options::PluginOptions;
use crate::registrar::RegistrarState;

/// Points in the boot sequence where hooks run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before components read the configuration
    BeforeConfig,
    /// After every setting and session has been provided
    AfterConfig,
}

/// Deferred configuration callback. Runs at most once.
pub type Hook = Box<dyn FnOnce(&mut AppConfig) -> Result<()> + Send>;

/// Boot-time host configuration.
pub struct AppConfig {
    settings: HashMap<String, String>,
    relational: Option<Arc<RelationalSession>>,
    documents: Option<Arc<DocumentSession>>,
    mailer: Option<Arc<dyn Mailer>>,
    hooks: Vec<(HookEvent, Hook)>,
    registration_options: Option<PluginOptions>,
    registration_dal: Option<Arc<dyn RegistrationDal>>,
    pub(crate) registrar: RegistrarState,
}

impl AppConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self {
            settings: HashMap::new(),
            relational: None,
            documents: None,
            mailer: None,
            hooks: Vec::new(),
            registration_options: None,
            registration_dal: None,
            registrar: RegistrarState::Unregistered,
        }
    }

    /// Sets a raw setting.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Provides the relational session adapters may use.
    pub fn with_relational_session(mut self, session: Arc<RelationalSession>) -> Self {
        self.relational = Some(session);
        self
    }

    /// Provides the document session adapters may use.
    pub fn with_document_session(mut self, session: Arc<DocumentSession>) -> Self {
        self.documents = Some(session);
        self
    }

    /// Provides the mailer.
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Returns a raw setting.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Returns every raw setting.
    pub fn settings(&self) -> &HashMap<String, String> {
        &self.settings
    }

    /// Returns the relational session, if the host provided one.
    pub fn relational_session(&self) -> Option<&Arc<RelationalSession>> {
        self.relational.as_ref()
    }

    /// Returns the document session, if the host provided one.
    pub fn document_session(&self) -> Option<&Arc<DocumentSession>> {
        self.documents.as_ref()
    }

    /// Schedules `hook` to run when `event` fires.
    pub fn register_hook(&mut self, event: HookEvent, hook: Hook) {
        debug!(?event, "Hook registered");
        self.hooks.push((event, hook));
    }

    /// Number of hooks still waiting to run.
    pub fn pending_hooks(&self) -> usize {
        self.hooks.len()
    }

    /// Options stored when the registration component was plugged.
    pub fn registration_options(&self) -> Option<&PluginOptions> {
        self.registration_options.as_ref()
    }

    pub(crate) fn set_registration_options(&mut self, options: PluginOptions) {
        self.registration_options = Some(options);
    }

    /// The published data-access adapter, once bound.
    pub fn registration_dal(&self) -> Option<&Arc<dyn RegistrationDal>> {
        self.registration_dal.as_ref()
    }

    pub(crate) fn publish_registration_dal(&mut self, dal: Arc<dyn RegistrationDal>) {
        self.registration_dal = Some(dal);
    }

    /// Current registrar state.
    pub fn registrar_state(&self) -> RegistrarState {
        self.registrar
    }

    /// Fires `event`, running each hook registered for it once, in
    /// registration order. Hooks added while firing run in the same pass.
    pub fn fire(&mut self, event: HookEvent) -> Result<()> {
        loop {
            let Some(pos) = self.hooks.iter().position(|(e, _)| *e == event) else {
                return Ok(());
            };
            // Removed before it runs so it can never be re-entered
            let (_, hook) = self.hooks.remove(pos);
            hook(self)?;
        }
    }

    /// Runs the boot hooks and freezes the configuration.
    ///
    /// A failing hook aborts startup and its error is returned.
    pub fn finalize(mut self) -> Result<Arc<Application>> {
        self.fire(HookEvent::BeforeConfig)?;
        self.fire(HookEvent::AfterConfig)?;

        let mailer: Arc<dyn Mailer> = match self.mailer.take() {
            Some(mailer) => mailer,
            None => Arc::new(LogMailer::new()),
        };

        info!(
            settings = self.settings.len(),
            registration = self.registration_dal.is_some(),
            "Application configured"
        );

        Ok(Arc::new(Application {
            settings: self.settings,
            relational: self.relational,
            documents: self.documents,
            mailer,
            registration_options: self.registration_options,
            registration_dal: self.registration_dal,
            registrar: self.registrar,
        }))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("settings", &self.settings)
            .field("relational", &self.relational.is_some())
            .field("documents", &self.documents.is_some())
            .field("pending_hooks", &self.hooks.len())
            .field("registration_options", &self.registration_options)
            .field("registrar", &self.registrar)
            .finish_non_exhaustive()
    }
}

/// Finalized host configuration, shared by everything serving requests.
pub struct Application {
    settings: HashMap<String, String>,
    relational: Option<Arc<RelationalSession>>,
    documents: Option<Arc<DocumentSession>>,
    mailer: Arc<dyn Mailer>,
    registration_options: Option<PluginOptions>,
    registration_dal: Option<Arc<dyn RegistrationDal>>,
    registrar: RegistrarState,
}

impl Application {
    /// Returns a raw setting.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Returns the relational session, if any.
    pub fn relational_session(&self) -> Option<&Arc<RelationalSession>> {
        self.relational.as_ref()
    }

    /// Returns the document session, if any.
    pub fn document_session(&self) -> Option<&Arc<DocumentSession>> {
        self.documents.as_ref()
    }

    /// Returns the mailer. Defaults to a [`LogMailer`].
    pub fn mailer(&self) -> Arc<dyn Mailer> {
        Arc::clone(&self.mailer)
    }

    /// Registrar state at the time the configuration was frozen.
    pub fn registrar_state(&self) -> RegistrarState {
        self.registrar
    }

    /// Options the registration component was plugged with.
    pub fn registration_options(&self) -> Option<&PluginOptions> {
        self.registration_options.as_ref()
    }

    /// The published data-access adapter.
    pub fn registration_dal(&self) -> Option<Arc<dyn RegistrationDal>> {
        self.registration_dal.clone()
    }

    /// The published data-access adapter, or a configuration error if the
    /// component was never bound.
    pub fn require_registration_dal(&self) -> Result<Arc<dyn RegistrationDal>> {
        self.registration_dal().ok_or_else(|| {
            RegistrationError::ConfigurationError(
                "registration data-access adapter is not configured".to_string(),
            )
        })
    }

    /// The form in use: the `form_instance` option or the default form.
    pub fn registration_form(&self) -> Arc<dyn RegistrationForm> {
        match self
            .registration_options
            .as_ref()
            .and_then(|o| o.form_instance.clone())
        {
            Some(form) => form,
            None => Arc::new(DefaultRegistrationForm::new()),
        }
    }

    /// Confirmation sender: the `email_sender` option, then the
    /// `registration.email_sender` setting.
    pub fn email_sender(&self) -> Option<String> {
        self.registration_options
            .as_ref()
            .and_then(|o| o.email_sender.clone())
            .or_else(|| self.setting(&format!("{SETTINGS_PREFIX}email_sender")).map(str::to_string))
            .filter(|s| !s.trim().is_empty())
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("settings", &self.settings)
            .field("registration_options", &self.registration_options)
            .field(
                "registration_dal",
                &self.registration_dal.as_ref().map(|d| d.backend()),
            )
            .field("registrar", &self.registrar)
            .finish_non_exhaustive()
    }
}
