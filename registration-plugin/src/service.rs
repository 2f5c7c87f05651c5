//! Registration workflow: validate, persist, confirm.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use registration_core::constants::CONFIRMATION_SUBJECT;
use registration_core::error::{RegistrationError, Result};
use registration_core::traits::{Mailer, RegistrationDal, RegistrationForm};
use registration_core::types::{
    FieldErrors, OutgoingEmail, RecordId, RegistrationRecord, RegistrationSubmission,
};

use crate::host::Application;

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    /// The stored record
    pub record: RegistrationRecord,
    /// Whether the confirmation email was handed to the mailer
    pub confirmation_sent: bool,
}

/// Drives registrations through the configured form, adapter and mailer.
#[derive(Clone)]
pub struct RegistrationService {
    dal: Arc<dyn RegistrationDal>,
    form: Arc<dyn RegistrationForm>,
    mailer: Arc<dyn Mailer>,
    sender: String,
}

impl RegistrationService {
    /// Builds a service from explicit collaborators.
    pub fn new(
        dal: Arc<dyn RegistrationDal>,
        form: Arc<dyn RegistrationForm>,
        mailer: Arc<dyn Mailer>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            dal,
            form,
            mailer,
            sender: sender.into(),
        }
    }

    /// Builds a service from a finalized application.
    ///
    /// Fails with `ConfigurationError` if the component was never bound or
    /// no confirmation sender is configured.
    pub fn from_application(app: &Application) -> Result<Self> {
        let dal = app.require_registration_dal()?;
        let sender = app.email_sender().ok_or_else(|| {
            RegistrationError::ConfigurationError(
                "registration.email_sender is not configured".to_string(),
            )
        })?;
        Ok(Self::new(dal, app.registration_form(), app.mailer(), sender))
    }

    /// The adapter in use.
    pub fn dal(&self) -> &Arc<dyn RegistrationDal> {
        &self.dal
    }

    /// The form in use.
    pub fn form(&self) -> &Arc<dyn RegistrationForm> {
        &self.form
    }

    /// Confirmation sender address.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Registers a new user.
    ///
    /// Validation failures come back as `InvalidForm`. A uniqueness
    /// violation raised by the store after validation passed is reported the
    /// same way, against the offending field. A mail failure does not undo
    /// the registration; it is logged and reflected in the outcome.
    #[instrument(skip_all, fields(user_name = %submission.user_name))]
    pub async fn register(&self, submission: RegistrationSubmission) -> Result<RegistrationOutcome> {
        let registration = self.form.validate(submission, self.dal.as_ref()).await?;

        let id = match self.dal.create(registration).await {
            Ok(id) => id,
            Err(RegistrationError::UniquenessViolation { field, value }) => {
                warn!(%field, %value, "Lost a registration race");
                return Err(RegistrationError::InvalidForm(FieldErrors::taken(field)));
            }
            Err(e) => return Err(e),
        };

        let record = self.lookup(&id).await?;
        info!(%id, backend = %self.dal.backend(), "User registered");

        let confirmation_sent = match self.mailer.send(self.confirmation(&record)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(%id, error = %e, "Confirmation email not sent");
                false
            }
        };

        Ok(RegistrationOutcome {
            record,
            confirmation_sent,
        })
    }

    /// Looks up a stored record.
    pub async fn find(&self, id: &RecordId) -> Result<Option<RegistrationRecord>> {
        self.dal.get_by_identifier(id).await
    }

    async fn lookup(&self, id: &RecordId) -> Result<RegistrationRecord> {
        self.find(id).await?.ok_or_else(|| {
            RegistrationError::storage(
                self.dal.backend().as_str(),
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("record {id} vanished after create"),
                ),
            )
        })
    }

    fn confirmation(&self, record: &RegistrationRecord) -> OutgoingEmail {
        let body = format!(
            "Hello {},\n\nyour registration as {} is complete.\n",
            record.name_for_display(),
            record.user_name
        );
        OutgoingEmail::new(
            self.sender.clone(),
            record.email_address.clone(),
            CONFIRMATION_SUBJECT,
            body,
        )
    }
}

impl std::fmt::Debug for RegistrationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationService")
            .field("backend", &self.dal.backend())
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use test_case::test_case;

    use registration_core::types::{DalBackend, FormField, NewRegistration};
    use registration_dal::{DocumentSession, RelationalSession};

    use crate::host::AppConfig;
    use crate::mailer::MemoryMailer;
    use crate::options::PluginOptions;
    use crate::registrar::plug;

    async fn boot(backend: DalBackend, mailer: Arc<MemoryMailer>) -> Arc<Application> {
        let mut config = AppConfig::new()
            .with_setting("mail.debugmailer", "dummy")
            .with_setting("registration.email_sender", "reg@email.it")
            .with_relational_session(Arc::new(RelationalSession::in_memory().await.unwrap()))
            .with_document_session(Arc::new(DocumentSession::in_memory()))
            .with_mailer(mailer);
        plug(&mut config, PluginOptions::new().with_dal(backend)).unwrap();
        config.finalize().unwrap()
    }

    fn alice() -> RegistrationSubmission {
        RegistrationSubmission::new("alice", "alice@example.com", "pw").with_display_name("Alice")
    }

    #[test_case(DalBackend::Sqla ; "relational")]
    #[test_case(DalBackend::Ming ; "document")]
    #[tokio::test]
    async fn test_register_sends_one_confirmation(backend: DalBackend) {
        let mailer = Arc::new(MemoryMailer::new());
        let app = boot(backend, mailer.clone()).await;
        let service = RegistrationService::from_application(&app).unwrap();

        let outcome = service.register(alice()).await.unwrap();
        assert!(outcome.confirmation_sent);
        assert_eq!(outcome.record.user_name, "alice");

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
        assert_eq!(sent[0].from, "reg@email.it");
        assert_eq!(sent[0].subject, CONFIRMATION_SUBJECT);
        assert!(sent[0].body.contains("Alice"));
    }

    #[test_case(DalBackend::Sqla ; "relational")]
    #[test_case(DalBackend::Ming ; "document")]
    #[tokio::test]
    async fn test_taken_user_name_is_form_error(backend: DalBackend) {
        let mailer = Arc::new(MemoryMailer::new());
        let app = boot(backend, mailer.clone()).await;
        let service = RegistrationService::from_application(&app).unwrap();

        service.register(alice()).await.unwrap();
        let err = service
            .register(RegistrationSubmission::new("alice", "other@example.com", "pw"))
            .await
            .unwrap_err();

        match err {
            RegistrationError::InvalidForm(errors) => {
                assert!(errors.contains("user_name"));
                assert!(!errors.contains("email_address"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mailer.len(), 1);
        assert_eq!(service.dal().count().await.unwrap(), 1);
    }

    #[test_case(DalBackend::Sqla ; "relational")]
    #[test_case(DalBackend::Ming ; "document")]
    #[tokio::test]
    async fn test_mail_failure_keeps_record(backend: DalBackend) {
        let mailer = Arc::new(MemoryMailer::new());
        mailer.set_failing(true);
        let app = boot(backend, mailer.clone()).await;
        let service = RegistrationService::from_application(&app).unwrap();

        let outcome = service.register(alice()).await.unwrap();
        assert!(!outcome.confirmation_sent);
        assert!(service.find(&outcome.record.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_sender_is_configuration_error() {
        let mut config = AppConfig::new()
            .with_relational_session(Arc::new(RelationalSession::in_memory().await.unwrap()));
        plug(&mut config, PluginOptions::new()).unwrap();
        let app = config.finalize().unwrap();

        let err = RegistrationService::from_application(&app).unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_option_sender_wins_over_setting() {
        let mut config = AppConfig::new()
            .with_setting("registration.email_sender", "reg@email.it")
            .with_relational_session(Arc::new(RelationalSession::in_memory().await.unwrap()));
        plug(
            &mut config,
            PluginOptions::new().with_email_sender("welcome@example.com"),
        )
        .unwrap();
        let app = config.finalize().unwrap();

        let service = RegistrationService::from_application(&app).unwrap();
        assert_eq!(service.sender(), "welcome@example.com");
    }

    /// Accepts anything, so the store is the only uniqueness guard.
    struct PermissiveForm;

    #[async_trait]
    impl RegistrationForm for PermissiveForm {
        fn fields(&self) -> &[FormField] {
            &[]
        }

        async fn validate(
            &self,
            submission: RegistrationSubmission,
            _dal: &dyn RegistrationDal,
        ) -> Result<NewRegistration> {
            Ok(submission.into_registration())
        }
    }

    #[test_case(DalBackend::Sqla ; "relational")]
    #[test_case(DalBackend::Ming ; "document")]
    #[tokio::test]
    async fn test_store_violation_surfaces_as_field_error(backend: DalBackend) {
        let mut config = AppConfig::new()
            .with_setting("registration.email_sender", "reg@email.it")
            .with_relational_session(Arc::new(RelationalSession::in_memory().await.unwrap()))
            .with_document_session(Arc::new(DocumentSession::in_memory()))
            .with_mailer(Arc::new(MemoryMailer::new()));
        plug(
            &mut config,
            PluginOptions::new()
                .with_dal(backend)
                .with_form(Arc::new(PermissiveForm)),
        )
        .unwrap();
        let app = config.finalize().unwrap();
        let service = RegistrationService::from_application(&app).unwrap();

        service.register(alice()).await.unwrap();
        let err = service
            .register(RegistrationSubmission::new("bob", "alice@example.com", "pw"))
            .await
            .unwrap_err();

        match err {
            RegistrationError::InvalidForm(errors) => {
                assert_eq!(
                    errors.get("email_address"),
                    Some("Email address is already in use.")
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
