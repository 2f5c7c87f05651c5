//! Mailers a host can provide.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{info, instrument};

use registration_core::error::{RegistrationError, Result};
use registration_core::traits::Mailer;
use registration_core::types::OutgoingEmail;

/// Keeps every message in memory instead of delivering it.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    outbox: RwLock<Vec<OutgoingEmail>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    /// Creates an empty mailer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `send` fail, or succeed again.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.outbox.read().clone()
    }

    /// The most recent message.
    pub fn last(&self) -> Option<OutgoingEmail> {
        self.outbox.read().last().cloned()
    }

    /// Number of messages sent.
    pub fn len(&self) -> usize {
        self.outbox.read().len()
    }

    /// Returns true if nothing was sent.
    pub fn is_empty(&self) -> bool {
        self.outbox.read().is_empty()
    }

    /// Empties the outbox.
    pub fn clear(&self) {
        self.outbox.write().clear();
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RegistrationError::MailerError(format!(
                "delivery to {} refused",
                email.to
            )));
        }
        self.outbox.write().push(email);
        Ok(())
    }
}

/// Writes messages to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl LogMailer {
    /// Creates the mailer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Mailer for LogMailer {
    #[instrument(skip_all, fields(to = %email.to))]
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        info!(
            from = %email.from,
            subject = %email.subject,
            body = %email.body,
            "Outgoing email"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> OutgoingEmail {
        OutgoingEmail::new("reg@email.it", to, "Hi", "Body")
    }

    #[tokio::test]
    async fn test_memory_mailer_records() {
        let mailer = MemoryMailer::new();
        mailer.send(message("a@x.io")).await.unwrap();
        mailer.send(message("b@x.io")).await.unwrap();

        assert_eq!(mailer.len(), 2);
        assert_eq!(mailer.last().unwrap().to, "b@x.io");

        mailer.clear();
        assert!(mailer.is_empty());
    }

    #[tokio::test]
    async fn test_memory_mailer_failure() {
        let mailer = MemoryMailer::new();
        mailer.set_failing(true);

        let err = mailer.send(message("a@x.io")).await.unwrap_err();
        assert!(matches!(err, RegistrationError::MailerError(_)));
        assert!(mailer.is_empty());
    }

    #[tokio::test]
    async fn test_log_mailer_accepts() {
        assert!(LogMailer::new().send(message("a@x.io")).await.is_ok());
    }
}
