//! Default registration form.

use async_trait::async_trait;
use tracing::debug;

use registration_core::constants::{
    MAX_DISPLAY_NAME_LEN, MAX_EMAIL_LEN, MAX_PASSWORD_LEN, MAX_USER_NAME_LEN,
};
use registration_core::error::{RegistrationError, Result, UniqueField};
use registration_core::traits::{RegistrationDal, RegistrationForm};
use registration_core::types::{
    is_valid_email, taken_message, FieldErrors, FieldKind, FormField, NewRegistration,
    RegistrationSubmission,
};

/// Message for a required field left empty.
pub const REQUIRED_MESSAGE: &str = "Please enter a value";

/// Message when the password confirmation differs.
pub const MISMATCH_MESSAGE: &str = "Fields do not match";

/// Message for a malformed email address.
pub const INVALID_EMAIL_MESSAGE: &str = "An email address must contain a single @";

static FIELDS: [FormField; 5] = [
    FormField {
        name: "user_name",
        label: "User Name",
        kind: FieldKind::Text,
        required: true,
    },
    FormField {
        name: "email_address",
        label: "Email",
        kind: FieldKind::Text,
        required: true,
    },
    FormField {
        name: "display_name",
        label: "Display Name",
        kind: FieldKind::Text,
        required: false,
    },
    FormField {
        name: "password",
        label: "Password",
        kind: FieldKind::Password,
        required: true,
    },
    FormField {
        name: "password_confirm",
        label: "Confirm Password",
        kind: FieldKind::Password,
        required: true,
    },
];

fn too_long(max: usize) -> String {
    format!("Enter a value not more than {max} characters long")
}

/// The stock form: required fields, unique user name and email, and a
/// repeated password that must match.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRegistrationForm;

impl DefaultRegistrationForm {
    /// Creates the form.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RegistrationForm for DefaultRegistrationForm {
    fn fields(&self) -> &[FormField] {
        &FIELDS
    }

    async fn validate(
        &self,
        submission: RegistrationSubmission,
        dal: &dyn RegistrationDal,
    ) -> Result<NewRegistration> {
        let confirm = submission.password_confirm.clone();
        let candidate = submission.into_registration();
        let mut errors = FieldErrors::new();

        let values = [
            ("user_name", candidate.user_name.as_str()),
            ("email_address", candidate.email_address.as_str()),
            ("password", candidate.password.as_str()),
            ("password_confirm", confirm.as_str()),
        ];
        for (field, value) in values {
            if value.trim().is_empty() {
                errors.add(field, REQUIRED_MESSAGE);
            }
        }

        if !candidate.user_name.is_empty() {
            if candidate.user_name.chars().count() > MAX_USER_NAME_LEN {
                errors.add("user_name", too_long(MAX_USER_NAME_LEN));
            } else if dal.exists_user_name(&candidate.user_name).await? {
                errors.add("user_name", taken_message(UniqueField::UserName));
            }
        }

        if !candidate.email_address.is_empty() {
            if !is_valid_email(&candidate.email_address) {
                errors.add("email_address", INVALID_EMAIL_MESSAGE);
            } else if candidate.email_address.chars().count() > MAX_EMAIL_LEN {
                errors.add("email_address", too_long(MAX_EMAIL_LEN));
            } else if dal.exists_email(&candidate.email_address).await? {
                errors.add("email_address", taken_message(UniqueField::EmailAddress));
            }
        }

        if let Some(display_name) = &candidate.display_name {
            if display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
                errors.add("display_name", too_long(MAX_DISPLAY_NAME_LEN));
            }
        }

        if candidate.password.chars().count() > MAX_PASSWORD_LEN {
            errors.add("password", too_long(MAX_PASSWORD_LEN));
        }

        if !confirm.is_empty() && confirm != candidate.password {
            errors.add("password_confirm", MISMATCH_MESSAGE);
        }

        if errors.is_empty() {
            Ok(candidate)
        } else {
            debug!(%errors, "Registration form rejected");
            Err(RegistrationError::InvalidForm(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use registration_dal::{DocumentRegistration, DocumentSession};

    fn dal() -> DocumentRegistration {
        DocumentRegistration::new(Arc::new(DocumentSession::in_memory())).unwrap()
    }

    fn field_errors(err: RegistrationError) -> FieldErrors {
        match err {
            RegistrationError::InvalidForm(errors) => errors,
            other => panic!("expected InvalidForm, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_valid_submission() {
        let form = DefaultRegistrationForm::new();
        let registration = form
            .validate(
                RegistrationSubmission::new(" alice ", "alice@example.com", "pw")
                    .with_display_name("Alice"),
                &dal(),
            )
            .await
            .unwrap();

        assert_eq!(registration.user_name, "alice");
        assert_eq!(registration.display_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_empty_fields_collect_errors() {
        let form = DefaultRegistrationForm::new();
        let errors = field_errors(
            form.validate(RegistrationSubmission::default(), &dal())
                .await
                .unwrap_err(),
        );

        assert_eq!(errors.len(), 4);
        assert_eq!(errors.get("user_name"), Some(REQUIRED_MESSAGE));
        assert!(!errors.contains("display_name"));
    }

    #[tokio::test]
    async fn test_password_mismatch() {
        let form = DefaultRegistrationForm::new();
        let errors = field_errors(
            form.validate(
                RegistrationSubmission::new("alice", "alice@example.com", "pw")
                    .with_password_confirm("other"),
                &dal(),
            )
            .await
            .unwrap_err(),
        );

        assert_eq!(errors.get("password_confirm"), Some(MISMATCH_MESSAGE));
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn test_taken_values() {
        let dal = dal();
        dal.create(NewRegistration::new("alice", "alice@example.com", "pw"))
            .await
            .unwrap();

        let errors = field_errors(
            DefaultRegistrationForm::new()
                .validate(
                    RegistrationSubmission::new("alice", "alice@example.com", "pw"),
                    &dal,
                )
                .await
                .unwrap_err(),
        );

        assert_eq!(errors.get("user_name"), Some("Username already in use."));
        assert_eq!(
            errors.get("email_address"),
            Some("Email address is already in use.")
        );
    }

    #[tokio::test]
    async fn test_shape_and_length() {
        let errors = field_errors(
            DefaultRegistrationForm::new()
                .validate(
                    RegistrationSubmission::new("a_very_long_user_name", "nope", "pw"),
                    &dal(),
                )
                .await
                .unwrap_err(),
        );

        assert_eq!(errors.get("email_address"), Some(INVALID_EMAIL_MESSAGE));
        assert!(errors.get("user_name").unwrap().contains("16"));
    }

    #[test]
    fn test_field_order() {
        let form = DefaultRegistrationForm::new();
        let names: Vec<_> = form.fields().iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            ["user_name", "email_address", "display_name", "password", "password_confirm"]
        );
    }
}
