//! Outgoing email messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message handed to a [`Mailer`](crate::traits::Mailer).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEmail {
    /// Sender address
    pub from: String,
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
    /// When the message was composed
    pub created_at: DateTime<Utc>,
}

impl OutgoingEmail {
    /// Composes a message stamped with the current time.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}
