//! Capability sets consumed and exposed by the registration component.
//!
//! The registrar picks one [`RegistrationDal`] implementation at startup;
//! everything downstream only talks to these traits.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{
    DalBackend, FormField, NewRegistration, OutgoingEmail, RecordId, RegistrationRecord,
    RegistrationSubmission,
};

// ═══════════════════════════════════════════════════════════════════════════════
// DATA ACCESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Uniform access to registration records, whatever stores them.
///
/// Implementations:
/// - a relational table behind a libSQL connection
/// - a document collection with unique indexes
#[async_trait]
pub trait RegistrationDal: Send + Sync {
    /// Storage technology behind this adapter.
    fn backend(&self) -> DalBackend;

    /// Persists a new record and returns its identifier.
    ///
    /// Fails with `UniquenessViolation` when the user name or email address
    /// is already registered; nothing is written in that case.
    async fn create(&self, registration: NewRegistration) -> Result<RecordId>;

    /// Looks up a record by identifier.
    async fn get_by_identifier(&self, id: &RecordId) -> Result<Option<RegistrationRecord>>;

    /// Returns true if a record with this user name exists.
    async fn exists_user_name(&self, user_name: &str) -> Result<bool>;

    /// Returns true if a record with this email address exists.
    async fn exists_email(&self, email_address: &str) -> Result<bool>;

    /// Returns the number of stored records.
    async fn count(&self) -> Result<u64>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// MAILER
// ═══════════════════════════════════════════════════════════════════════════════

/// Outgoing mail delivery, owned by the host.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends a message.
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// FORM
// ═══════════════════════════════════════════════════════════════════════════════

/// The registration form: which fields it shows and how a submission is validated.
///
/// Hosts may replace the default form through the `form_instance` option.
#[async_trait]
pub trait RegistrationForm: Send + Sync {
    /// Fields in display order.
    fn fields(&self) -> &[FormField];

    /// Validates a submission, consulting `dal` for uniqueness.
    ///
    /// Fails with `InvalidForm` carrying every field error found.
    async fn validate(
        &self,
        submission: RegistrationSubmission,
        dal: &dyn RegistrationDal,
    ) -> Result<NewRegistration>;
}
