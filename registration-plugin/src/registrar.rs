//! Plugin registrar.
//!
//! [`plug`] records the options and schedules [`register_dal_interface`]
//! for the host's `AfterConfig` event. The registrar moves
//! `Unregistered -> Registered -> Bound` and binds exactly once.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use registration_core::constants::APP_ID;
use registration_core::error::{RegistrationError, Result};
use registration_core::traits::RegistrationDal;
use registration_core::types::DalBackend;
use registration_dal::{DocumentRegistration, RelationalRegistration};

use crate::host::{AppConfig, HookEvent};
use crate::options::PluginOptions;

/// Where the registrar is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RegistrarState {
    /// Not plugged into the host
    #[default]
    Unregistered,
    /// Options stored, waiting for the host to finish configuring
    Registered,
    /// Adapter published for this backend
    Bound(DalBackend),
}

impl fmt::Display for RegistrarState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrarState::Unregistered => write!(f, "unregistered"),
            RegistrarState::Registered => write!(f, "registered"),
            RegistrarState::Bound(dal) => write!(f, "bound ({dal})"),
        }
    }
}

/// What the host learns about a plugged component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct PlugInfo {
    /// Application id
    pub appid: &'static str,
    /// Whether the component adds template helpers globally
    pub global_helpers: bool,
}

/// Plugs the registration component into `config`.
///
/// Stores `options` in the host configuration and schedules the adapter
/// binding for [`HookEvent::AfterConfig`]. Plugging twice is an error.
pub fn plug(config: &mut AppConfig, options: PluginOptions) -> Result<PlugInfo> {
    if config.registrar != RegistrarState::Unregistered {
        return Err(RegistrationError::ConfigurationError(format!(
            "{APP_ID} is already plugged ({})",
            config.registrar
        )));
    }

    debug!(?options, "Plugging registration");
    config.set_registration_options(options);
    config.registrar = RegistrarState::Registered;
    config.register_hook(
        HookEvent::AfterConfig,
        Box::new(|config| register_dal_interface(config).map(|_| ())),
    );

    Ok(PlugInfo {
        appid: APP_ID,
        global_helpers: false,
    })
}

/// Resolves the `dal` option and publishes the matching adapter.
///
/// Fails with `ConfigurationError` when the option names an unsupported
/// backend or the host did not provide the session that backend needs.
/// On failure nothing is published.
pub fn register_dal_interface(config: &mut AppConfig) -> Result<DalBackend> {
    match config.registrar {
        RegistrarState::Registered => {}
        RegistrarState::Unregistered => {
            return Err(RegistrationError::ConfigurationError(format!(
                "{APP_ID} was never plugged"
            )))
        }
        RegistrarState::Bound(dal) => {
            return Err(RegistrationError::ConfigurationError(format!(
                "{APP_ID} is already bound to {dal}"
            )))
        }
    }

    let backend = config
        .registration_options()
        .map(PluginOptions::dal_backend)
        .unwrap_or_else(|| Ok(DalBackend::default()))?;

    info!("initializing registration with {backend}");
    let dal = instantiate(config, backend)?;

    config.publish_registration_dal(dal);
    config.registrar = RegistrarState::Bound(backend);
    Ok(backend)
}

fn instantiate(config: &AppConfig, backend: DalBackend) -> Result<Arc<dyn RegistrationDal>> {
    let missing = |what: &str| {
        RegistrationError::ConfigurationError(format!(
            "{APP_ID} with dal={backend} needs a {what} session"
        ))
    };

    match backend {
        DalBackend::Sqla => {
            let session = config
                .relational_session()
                .ok_or_else(|| missing("relational"))?;
            Ok(Arc::new(RelationalRegistration::new(Arc::clone(session))))
        }
        DalBackend::Ming => {
            let session = config
                .document_session()
                .ok_or_else(|| missing("document"))?;
            Ok(Arc::new(DocumentRegistration::new(Arc::clone(session))?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registration_core::types::{NewRegistration, RecordId};
    use registration_core::UniqueField;
    use registration_dal::{DocumentSession, RelationalSession};

    async fn host() -> AppConfig {
        AppConfig::new()
            .with_relational_session(Arc::new(RelationalSession::in_memory().await.unwrap()))
            .with_document_session(Arc::new(DocumentSession::in_memory()))
    }

    #[tokio::test]
    async fn test_plug_defers_binding() {
        let mut config = host().await;
        let info = plug(&mut config, PluginOptions::new()).unwrap();

        assert_eq!(info, PlugInfo { appid: "registration", global_helpers: false });
        assert_eq!(config.registrar_state(), RegistrarState::Registered);
        assert!(config.registration_dal().is_none());
        assert_eq!(config.pending_hooks(), 1);
    }

    #[tokio::test]
    async fn test_plug_twice_fails() {
        let mut config = host().await;
        plug(&mut config, PluginOptions::new()).unwrap();
        assert!(matches!(
            plug(&mut config, PluginOptions::new()),
            Err(RegistrationError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_sqla_scenario() {
        let mut config = host().await;
        plug(&mut config, PluginOptions::new().with_dal_name("sqla")).unwrap();
        let app = config.finalize().unwrap();

        assert_eq!(app.registrar_state(), RegistrarState::Bound(DalBackend::Sqla));
        let dal = app.require_registration_dal().unwrap();
        assert_eq!(dal.backend(), DalBackend::Sqla);

        let id = dal
            .create(
                NewRegistration::new("alice", "alice@example.com", "pw").with_display_name("Alice"),
            )
            .await
            .unwrap();
        assert!(matches!(id, RecordId::Integer(_)));

        let err = dal
            .create(NewRegistration::new("alice", "other@example.com", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::UniquenessViolation { field: UniqueField::UserName, .. }
        ));
    }

    #[tokio::test]
    async fn test_ming_scenario() {
        let mut config = host().await;
        plug(&mut config, PluginOptions::new().with_dal(DalBackend::Ming)).unwrap();
        let app = config.finalize().unwrap();

        let dal = app.require_registration_dal().unwrap();
        assert_eq!(dal.backend(), DalBackend::Ming);

        let id = dal
            .create(
                NewRegistration::new("alice", "alice@example.com", "pw").with_display_name("Alice"),
            )
            .await
            .unwrap();
        assert!(id.as_object_id().is_some());
        assert!(dal.get_by_identifier(&id).await.unwrap().is_some());

        let err = dal
            .create(NewRegistration::new("alice", "other@example.com", "pw"))
            .await
            .unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(dal.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unsupported_dal_fails_startup() {
        let mut config = host().await;
        plug(&mut config, PluginOptions::new().with_dal_name("unsupported")).unwrap();

        let err = register_dal_interface(&mut config).unwrap_err();
        assert!(matches!(err, RegistrationError::ConfigurationError(_)));
        assert!(config.registration_dal().is_none());
        assert_eq!(config.registrar_state(), RegistrarState::Registered);
    }

    #[tokio::test]
    async fn test_unsupported_dal_aborts_finalize() {
        let mut config = host().await;
        plug(&mut config, PluginOptions::new().with_dal_name("unsupported")).unwrap();
        assert!(config.finalize().unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_duplicate_documents_abort_startup() {
        let documents = Arc::new(DocumentSession::in_memory());
        for email in ["a@x.io", "b@x.io"] {
            documents
                .insert_one(
                    "tg_user",
                    serde_json::json!({ "user_name": "a", "email_address": email }),
                )
                .await
                .unwrap();
        }

        let mut config = AppConfig::new().with_document_session(documents);
        plug(&mut config, PluginOptions::new().with_dal(DalBackend::Ming)).unwrap();

        let err = config.finalize().unwrap_err();
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_missing_session_is_configuration_error() {
        let mut config = AppConfig::new();
        plug(&mut config, PluginOptions::new().with_dal(DalBackend::Ming)).unwrap();

        let err = register_dal_interface(&mut config).unwrap_err();
        assert!(err.to_string().contains("document session"));
        assert!(config.registration_dal().is_none());
    }

    #[tokio::test]
    async fn test_binds_only_once() {
        let mut config = host().await;
        plug(&mut config, PluginOptions::new()).unwrap();
        assert_eq!(register_dal_interface(&mut config).unwrap(), DalBackend::Sqla);
        assert!(register_dal_interface(&mut config).is_err());
    }

    #[test]
    fn test_unplugged_bind_fails() {
        let mut config = AppConfig::new();
        assert!(register_dal_interface(&mut config).is_err());
    }
}
