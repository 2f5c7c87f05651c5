//! Form submissions and field-level errors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UniqueField;
use crate::types::NewRegistration;

/// Kind of input a form field renders as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Plain text input.
    Text,
    /// Masked password input.
    Password,
}

/// Description of one form field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    /// Submission key
    pub name: &'static str,
    /// Human readable label
    pub label: &'static str,
    /// Input kind
    pub kind: FieldKind,
    /// Whether an empty value is rejected
    pub required: bool,
}

/// Raw values posted by the registration form.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSubmission {
    /// Requested user name
    #[serde(default)]
    pub user_name: String,
    /// Requested email address
    #[serde(default)]
    pub email_address: String,
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Password
    #[serde(default)]
    pub password: String,
    /// Password repeated
    #[serde(default)]
    pub password_confirm: String,
}

impl RegistrationSubmission {
    /// Creates a submission with matching password fields.
    pub fn new(
        user_name: impl Into<String>,
        email_address: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let password = password.into();
        Self {
            user_name: user_name.into(),
            email_address: email_address.into(),
            display_name: None,
            password_confirm: password.clone(),
            password,
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Sets the confirmation field independently of the password.
    pub fn with_password_confirm(mut self, confirm: impl Into<String>) -> Self {
        self.password_confirm = confirm.into();
        self
    }

    /// Converts into a candidate record, trimming identifiers and dropping
    /// a blank display name.
    pub fn into_registration(self) -> NewRegistration {
        NewRegistration {
            user_name: self.user_name.trim().to_string(),
            email_address: self.email_address.trim().to_string(),
            display_name: self
                .display_name
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            password: self.password,
        }
    }
}

impl fmt::Debug for RegistrationSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationSubmission")
            .field("user_name", &self.user_name)
            .field("email_address", &self.email_address)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

/// Validation messages keyed by field name.
///
/// A field keeps only its first message, matching how validators short-circuit
/// per field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    /// Creates an empty error set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for `field` unless it already has one.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Error set with a single "already taken" message for a unique field.
    pub fn taken(field: UniqueField) -> Self {
        let mut errors = Self::new();
        errors.add(field.as_str(), taken_message(field));
        errors
    }

    /// Message recorded for `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    /// Returns true if `field` has a message.
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Returns true if no field failed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failing fields.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over `(field, message)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.iter() {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

/// Message shown when a unique value is already registered.
pub fn taken_message(field: UniqueField) -> &'static str {
    match field {
        UniqueField::UserName => "Username already in use.",
        UniqueField::EmailAddress => "Email address is already in use.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_message_wins() {
        let mut errors = FieldErrors::new();
        errors.add("password", "Please enter a value");
        errors.add("password", "Passwords do not match");
        assert_eq!(errors.get("password"), Some("Please enter a value"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_display_lists_fields_in_order() {
        let mut errors = FieldErrors::new();
        errors.add("user_name", "Please enter a value");
        errors.add("email_address", "Please enter a value");
        assert_eq!(
            errors.to_string(),
            "email_address: Please enter a value; user_name: Please enter a value"
        );
    }

    #[test]
    fn test_into_registration_trims() {
        let new = RegistrationSubmission::new(" alice ", " alice@example.com", "pw")
            .with_display_name("   ")
            .into_registration();
        assert_eq!(new.user_name, "alice");
        assert_eq!(new.email_address, "alice@example.com");
        assert!(new.display_name.is_none());
        assert_eq!(new.password, "pw");
    }

    #[test]
    fn test_submission_debug_hides_passwords() {
        let submission = RegistrationSubmission::new("alice", "alice@example.com", "hunter2");
        assert!(!format!("{submission:?}").contains("hunter2"));
    }
}
