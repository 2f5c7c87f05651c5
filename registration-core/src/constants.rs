//! Constants shared by the registration crates.
//!
//! Field limits mirror the host application's `tg_user` table so that a
//! record accepted here never fails a column-width check further down.

// ═══════════════════════════════════════════════════════════════════════════════
// PLUGIN IDENTITY
// ═══════════════════════════════════════════════════════════════════════════════

/// Application id reported to the host when the component is plugged.
pub const APP_ID: &str = "registration";

/// Host configuration key under which the active data-access adapter lives.
pub const REGISTRATION_DAL_KEY: &str = "registration_dal";

/// Host configuration key under which the plugin options are stored.
pub const PLUGIN_OPTIONS_KEY: &str = "_pluggable_registration_config";

/// Prefix of host settings that belong to this component.
pub const SETTINGS_PREFIX: &str = "registration.";

// ═══════════════════════════════════════════════════════════════════════════════
// BACKEND NAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// Option value selecting the relational backend.
pub const DAL_SQLA: &str = "sqla";

/// Option value selecting the document-store backend.
pub const DAL_MING: &str = "ming";

/// Backend used when the `dal` option is absent.
pub const DEFAULT_DAL: &str = DAL_SQLA;

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE LAYOUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Table (relational) and collection (document) holding user records.
pub const USER_TABLE: &str = "tg_user";

/// Document primary-key field.
pub const DOCUMENT_ID_FIELD: &str = "_id";

/// Size of a document identifier in bytes.
pub const OBJECT_ID_SIZE: usize = 12;

// ═══════════════════════════════════════════════════════════════════════════════
// FIELD LIMITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum user name length, in characters.
pub const MAX_USER_NAME_LEN: usize = 16;

/// Maximum email address length, in characters.
pub const MAX_EMAIL_LEN: usize = 255;

/// Maximum display name length, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 255;

/// Maximum password length, in characters.
pub const MAX_PASSWORD_LEN: usize = 255;

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIRMATION EMAIL
// ═══════════════════════════════════════════════════════════════════════════════

/// Subject line of the confirmation email.
pub const CONFIRMATION_SUBJECT: &str = "Registration confirmation";
