//! Registration records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DAL_MING, DAL_SQLA, MAX_DISPLAY_NAME_LEN, MAX_EMAIL_LEN, MAX_PASSWORD_LEN, MAX_USER_NAME_LEN,
};
use crate::error::{RegistrationError, Result};
use crate::types::RecordId;

/// Storage technology behind a data-access adapter.
///
/// Parsed once from the `dal` option; every other part of the system only
/// ever sees this closed set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DalBackend {
    /// Relational backend.
    #[default]
    Sqla,
    /// Document-store backend.
    Ming,
}

impl DalBackend {
    /// Every supported backend.
    pub const ALL: [DalBackend; 2] = [DalBackend::Sqla, DalBackend::Ming];

    /// Option value naming this backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            DalBackend::Sqla => DAL_SQLA,
            DalBackend::Ming => DAL_MING,
        }
    }
}

impl fmt::Display for DalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DalBackend {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            DAL_SQLA => Ok(DalBackend::Sqla),
            DAL_MING => Ok(DalBackend::Ming),
            other => Err(RegistrationError::ConfigurationError(format!(
                "not a valid registration dal interface: {other}"
            ))),
        }
    }
}

/// A user candidate that has not been persisted yet.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRegistration {
    /// Unique login name
    pub user_name: String,
    /// Unique email address
    pub email_address: String,
    /// Optional name shown in the UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Password, stored as provided
    pub password: String,
}

impl NewRegistration {
    /// Creates a candidate without display name.
    pub fn new(
        user_name: impl Into<String>,
        email_address: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            email_address: email_address.into(),
            display_name: None,
            password: password.into(),
        }
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    /// Validates field presence, lengths and email shape.
    pub fn validate(&self) -> Result<()> {
        check_required("user_name", &self.user_name, MAX_USER_NAME_LEN)?;
        check_required("email_address", &self.email_address, MAX_EMAIL_LEN)?;
        check_required("password", &self.password, MAX_PASSWORD_LEN)?;

        if let Some(display_name) = &self.display_name {
            if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
                return Err(RegistrationError::ValidationError(format!(
                    "display_name longer than {MAX_DISPLAY_NAME_LEN} characters"
                )));
            }
        }

        if !is_valid_email(&self.email_address) {
            return Err(RegistrationError::ValidationError(format!(
                "email_address is not a valid address: {}",
                self.email_address
            )));
        }

        Ok(())
    }
}

impl fmt::Debug for NewRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewRegistration")
            .field("user_name", &self.user_name)
            .field("email_address", &self.email_address)
            .field("display_name", &self.display_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A persisted registration record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    /// Identifier assigned by the storage backend
    pub id: RecordId,
    /// Unique login name
    pub user_name: String,
    /// Unique email address
    pub email_address: String,
    /// Optional name shown in the UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Password, as stored
    pub password: String,
}

impl RegistrationRecord {
    /// Builds a record from a candidate and the identifier it was stored under.
    pub fn from_new(id: RecordId, new: NewRegistration) -> Self {
        Self {
            id,
            user_name: new.user_name,
            email_address: new.email_address,
            display_name: new.display_name,
            password: new.password,
        }
    }

    /// Display name, falling back to the user name.
    pub fn name_for_display(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_name)
    }
}

impl fmt::Debug for RegistrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRecord")
            .field("id", &self.id)
            .field("user_name", &self.user_name)
            .field("email_address", &self.email_address)
            .field("display_name", &self.display_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn check_required(field: &str, value: &str, max_len: usize) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RegistrationError::ValidationError(format!(
            "{field} cannot be empty"
        )));
    }
    if value.chars().count() > max_len {
        return Err(RegistrationError::ValidationError(format!(
            "{field} longer than {max_len} characters"
        )));
    }
    Ok(())
}

/// Checks the `local@domain` shape: one `@`, both sides non-empty, no whitespace.
pub fn is_valid_email(address: &str) -> bool {
    if address.chars().any(char::is_whitespace) {
        return false;
    }
    match address.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_dal_backend_parse() {
        assert_eq!("sqla".parse::<DalBackend>().unwrap(), DalBackend::Sqla);
        assert_eq!("ming".parse::<DalBackend>().unwrap(), DalBackend::Ming);
        assert_eq!(DalBackend::default(), DalBackend::Sqla);

        let err = "unsupported".parse::<DalBackend>().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("unsupported"));
    }

    #[test_case(" ming " ; "padded")]
    #[test_case("MING" ; "upper case")]
    #[test_case("" ; "empty")]
    fn test_dal_backend_parse_is_exact(value: &str) {
        assert!(value.parse::<DalBackend>().unwrap_err().is_fatal());
    }

    #[test]
    fn test_valid_registration() {
        let user = NewRegistration::new("alice", "alice@example.com", "pw").with_display_name("Alice");
        assert!(user.validate().is_ok());
    }

    #[test_case("", "alice@example.com", "pw"; "empty user name")]
    #[test_case("alice", "", "pw"; "empty email")]
    #[test_case("alice", "alice@example.com", ""; "empty password")]
    #[test_case("a_very_long_user_name", "alice@example.com", "pw"; "user name too long")]
    #[test_case("alice", "not-an-email", "pw"; "email without at")]
    fn test_invalid_registration(user_name: &str, email: &str, password: &str) {
        let user = NewRegistration::new(user_name, email, password);
        assert!(matches!(
            user.validate(),
            Err(RegistrationError::ValidationError(_))
        ));
    }

    #[test_case("alice@example.com", true)]
    #[test_case("a@b", true)]
    #[test_case("@example.com", false)]
    #[test_case("alice@", false)]
    #[test_case("alice@@example.com", false)]
    #[test_case("al ice@example.com", false)]
    #[test_case("alice@.example.com", false)]
    fn test_email_shape(address: &str, expected: bool) {
        assert_eq!(is_valid_email(address), expected);
    }

    #[test]
    fn test_debug_redacts_password() {
        let user = NewRegistration::new("alice", "alice@example.com", "hunter2");
        let rendered = format!("{user:?}");
        assert!(!rendered.contains("hunter2"));

        let record = RegistrationRecord::from_new(RecordId::Integer(1), user);
        assert!(!format!("{record:?}").contains("hunter2"));
        assert_eq!(record.name_for_display(), "alice");
    }

    proptest::proptest! {
        #[test]
        fn prop_email_validation_never_panics(address in ".*") {
            let _ = is_valid_email(&address);
        }

        #[test]
        fn prop_overlong_user_names_rejected(name in "[a-z]{17,40}") {
            let user = NewRegistration::new(name, "a@example.com", "pw");
            proptest::prop_assert!(user.validate().is_err());
        }
    }
}
