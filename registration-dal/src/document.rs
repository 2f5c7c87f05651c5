//! Document-store registration adapter.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use registration_core::constants::USER_TABLE;
use registration_core::error::{RegistrationError, Result, UniqueField};
use registration_core::traits::RegistrationDal;
use registration_core::types::{
    DalBackend, NewRegistration, ObjectId, RecordId, RegistrationRecord,
};

use crate::store::{DocumentError, DocumentSession};

/// Backend label used in storage errors.
const BACKEND: &str = "document";

/// Unique indexes declared on the user collection.
const UNIQUE_INDEXES: [UniqueField; 2] = [UniqueField::UserName, UniqueField::EmailAddress];

/// Shape of a user document.
#[derive(Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    user_name: String,
    email_address: String,
    #[serde(default)]
    display_name: Option<String>,
    password: String,
}

/// Registration records stored as documents in the `tg_user` collection.
///
/// Uniqueness is backed by unique indexes on `user_name` and
/// `email_address`, declared when the adapter is built.
#[derive(Debug, Clone)]
pub struct DocumentRegistration {
    session: Arc<DocumentSession>,
}

impl DocumentRegistration {
    /// Wraps a host-owned session and ensures the unique indexes exist.
    ///
    /// Fails with `ConfigurationError` when an index cannot be built, e.g.
    /// because the collection already holds duplicates.
    pub fn new(session: Arc<DocumentSession>) -> Result<Self> {
        for field in UNIQUE_INDEXES {
            session
                .ensure_index(USER_TABLE, field.as_str(), true)
                .map_err(|e| {
                    RegistrationError::ConfigurationError(format!(
                        "cannot build unique index {USER_TABLE}.{field}: {e}"
                    ))
                })?;
        }
        Ok(Self { session })
    }

    /// Returns the underlying session.
    pub fn session(&self) -> &Arc<DocumentSession> {
        &self.session
    }

    fn exists(&self, field: UniqueField, value: &str) -> bool {
        self.session
            .find_one(USER_TABLE, field.as_str(), &Value::String(value.to_string()))
            .is_some()
    }
}

/// Maps session errors, turning index violations into `UniquenessViolation`.
fn translate(err: DocumentError) -> RegistrationError {
    match err {
        DocumentError::DuplicateKey { field, value, .. } => match UniqueField::from_column(&field) {
            Some(field) => RegistrationError::UniquenessViolation { field, value },
            None => RegistrationError::storage(
                BACKEND,
                DocumentError::DuplicateKey {
                    collection: USER_TABLE.to_string(),
                    field,
                    value,
                },
            ),
        },
        other => RegistrationError::storage(BACKEND, other),
    }
}

#[async_trait]
impl RegistrationDal for DocumentRegistration {
    fn backend(&self) -> DalBackend {
        DalBackend::Ming
    }

    #[instrument(skip(self, registration), fields(user_name = %registration.user_name))]
    async fn create(&self, registration: NewRegistration) -> Result<RecordId> {
        registration.validate()?;

        if self.exists(UniqueField::UserName, &registration.user_name) {
            return Err(RegistrationError::UniquenessViolation {
                field: UniqueField::UserName,
                value: registration.user_name,
            });
        }
        if self.exists(UniqueField::EmailAddress, &registration.email_address) {
            return Err(RegistrationError::UniquenessViolation {
                field: UniqueField::EmailAddress,
                value: registration.email_address,
            });
        }

        let id = ObjectId::new();
        let document = serde_json::to_value(UserDocument {
            id,
            user_name: registration.user_name,
            email_address: registration.email_address,
            display_name: registration.display_name,
            password: registration.password,
        })?;

        // The unique indexes still guard against a racing insert
        self.session
            .insert_one(USER_TABLE, document)
            .await
            .map_err(translate)?;

        debug!(%id, "Created registration document");
        Ok(RecordId::Document(id))
    }

    #[instrument(skip(self))]
    async fn get_by_identifier(&self, id: &RecordId) -> Result<Option<RegistrationRecord>> {
        let Some(oid) = id.as_object_id() else {
            debug!("Non-document identifier, nothing to look up");
            return Ok(None);
        };

        let Some(document) = self.session.find_by_id(USER_TABLE, &oid.to_hex()) else {
            return Ok(None);
        };

        let user: UserDocument = serde_json::from_value(Value::Object(document))?;
        Ok(Some(RegistrationRecord {
            id: RecordId::Document(user.id),
            user_name: user.user_name,
            email_address: user.email_address,
            display_name: user.display_name,
            password: user.password,
        }))
    }

    async fn exists_user_name(&self, user_name: &str) -> Result<bool> {
        Ok(self.exists(UniqueField::UserName, user_name))
    }

    async fn exists_email(&self, email_address: &str) -> Result<bool> {
        Ok(self.exists(UniqueField::EmailAddress, email_address))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.session.count(USER_TABLE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn alice() -> NewRegistration {
        NewRegistration::new("alice", "alice@example.com", "pw").with_display_name("Alice")
    }

    #[tokio::test]
    async fn test_indexes_declared_on_construction() {
        let session = Arc::new(DocumentSession::in_memory());
        let _dal = DocumentRegistration::new(session.clone()).unwrap();

        let indexes = session.indexes(USER_TABLE);
        assert_eq!(indexes.len(), 2);
        assert!(indexes.iter().all(|i| i.unique));
    }

    #[tokio::test]
    async fn test_existing_duplicates_fail_construction() {
        let session = Arc::new(DocumentSession::in_memory());
        session
            .insert_one(USER_TABLE, json!({ "user_name": "alice", "email_address": "a@x.io" }))
            .await
            .unwrap();
        session
            .insert_one(USER_TABLE, json!({ "user_name": "alice", "email_address": "b@x.io" }))
            .await
            .unwrap();

        let err = DocumentRegistration::new(session).unwrap_err();
        assert!(matches!(err, RegistrationError::ConfigurationError(_)));
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
        assert!(err.to_string().contains("tg_user.user_name"));
    }

    #[tokio::test]
    async fn test_create_returns_document_id() {
        let dal = DocumentRegistration::new(Arc::new(DocumentSession::in_memory())).unwrap();
        let id = dal.create(alice()).await.unwrap();

        assert!(id.as_object_id().is_some());
        let record = dal.get_by_identifier(&id).await.unwrap().unwrap();
        assert_eq!(record.display_name.as_deref(), Some("Alice"));
        assert_eq!(record.id, id);
    }

    #[tokio::test]
    async fn test_index_violation_is_translated() {
        let session = Arc::new(DocumentSession::in_memory());
        let dal = DocumentRegistration::new(session.clone()).unwrap();
        dal.create(alice()).await.unwrap();

        // Bypass the pre-check to exercise the index path
        let err = translate(
            session
                .insert_one(
                    USER_TABLE,
                    json!({ "user_name": "bob", "email_address": "alice@example.com" }),
                )
                .await
                .unwrap_err(),
        );
        assert!(matches!(
            err,
            RegistrationError::UniquenessViolation { field: UniqueField::EmailAddress, .. }
        ));
    }

    #[tokio::test]
    async fn test_integer_identifier_resolves_to_none() {
        let dal = DocumentRegistration::new(Arc::new(DocumentSession::in_memory())).unwrap();
        dal.create(alice()).await.unwrap();
        assert!(dal.get_by_identifier(&RecordId::Integer(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_record_rejected() {
        let dal = DocumentRegistration::new(Arc::new(DocumentSession::in_memory())).unwrap();
        let err = dal
            .create(NewRegistration::new("alice", "nope", "pw"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::ValidationError(_)));
        assert_eq!(dal.count().await.unwrap(), 0);
    }
}
