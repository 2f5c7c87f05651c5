//! Relational registration adapter over libSQL.
//!
//! Records live in the `tg_user` table. Uniqueness is checked up front and
//! enforced by `UNIQUE` columns; constraint failures come back as
//! `UniquenessViolation`, every other libSQL error is passed through as-is.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{params, Builder, Connection, Database, Row, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use registration_core::constants::USER_TABLE;
use registration_core::error::{RegistrationError, Result, UniqueField};
use registration_core::traits::RegistrationDal;
use registration_core::types::{DalBackend, NewRegistration, RecordId, RegistrationRecord};

/// Backend label used in storage errors.
const BACKEND: &str = "sqlite";

const CREATE_USER_TABLE: &str = "CREATE TABLE IF NOT EXISTS tg_user (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_name TEXT NOT NULL UNIQUE,
    email_address TEXT NOT NULL UNIQUE,
    display_name TEXT,
    password TEXT NOT NULL
)";

const INSERT_USER: &str = "INSERT INTO tg_user (user_name, email_address, display_name, password)
    VALUES (?1, ?2, ?3, ?4) RETURNING user_id";

const SELECT_USER: &str = "SELECT user_id, user_name, email_address, display_name, password
    FROM tg_user WHERE user_id = ?1";

const USER_NAME_EXISTS: &str = "SELECT 1 FROM tg_user WHERE user_name = ?1 LIMIT 1";

const EMAIL_EXISTS: &str = "SELECT 1 FROM tg_user WHERE email_address = ?1 LIMIT 1";

const COUNT_USERS: &str = "SELECT COUNT(*) FROM tg_user";

/// Marker SQLite puts in front of the offending columns.
const UNIQUE_FAILED: &str = "UNIQUE constraint failed: ";

fn storage(err: libsql::Error) -> RegistrationError {
    RegistrationError::storage(BACKEND, err)
}

/// Host-owned relational session: a database handle plus the connection
/// every adapter call goes through.
pub struct RelationalSession {
    _database: Database,
    connection: Connection,
}

impl RelationalSession {
    /// Opens (or creates) a local database file.
    pub async fn open_local(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let database = Builder::new_local(path).build().await.map_err(storage)?;
        info!(path = ?path, "Opened local database");
        Self::from_database(database)
    }

    /// Opens a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::open_local(":memory:").await
    }

    /// Connects to a remote libSQL / Turso database.
    #[cfg(feature = "remote")]
    pub async fn open_remote(url: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let database = Builder::new_remote(url.clone(), auth_token.into())
            .build()
            .await
            .map_err(storage)?;
        info!(%url, "Connected to remote database");
        Self::from_database(database)
    }

    fn from_database(database: Database) -> Result<Self> {
        let connection = database.connect().map_err(storage)?;
        Ok(Self {
            _database: database,
            connection,
        })
    }

    /// Returns the shared connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Creates the `tg_user` table if it does not exist.
    pub async fn ensure_user_table(&self) -> Result<()> {
        self.connection
            .execute(CREATE_USER_TABLE, ())
            .await
            .map_err(storage)?;
        debug!(table = USER_TABLE, "User table ensured");
        Ok(())
    }
}

impl std::fmt::Debug for RelationalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationalSession").finish_non_exhaustive()
    }
}

/// Registration records stored as rows of the `tg_user` table.
///
/// The table is created on first use if the host has not created it.
#[derive(Debug, Clone)]
pub struct RelationalRegistration {
    session: Arc<RelationalSession>,
    schema: Arc<OnceCell<()>>,
}

impl RelationalRegistration {
    /// Wraps a host-owned session.
    pub fn new(session: Arc<RelationalSession>) -> Self {
        Self {
            session,
            schema: Arc::new(OnceCell::new()),
        }
    }

    /// Returns the underlying session.
    pub fn session(&self) -> &Arc<RelationalSession> {
        &self.session
    }

    async fn connection(&self) -> Result<&Connection> {
        self.schema
            .get_or_try_init(|| self.session.ensure_user_table())
            .await?;
        Ok(self.session.connection())
    }

    async fn exists(&self, sql: &str, value: &str) -> Result<bool> {
        let conn = self.connection().await?;
        let mut rows = conn
            .query(sql, params![value.to_string()])
            .await
            .map_err(storage)?;
        Ok(rows.next().await.map_err(storage)?.is_some())
    }
}

/// Translates a constraint failure into `UniquenessViolation`.
fn translate(err: libsql::Error, registration: &NewRegistration) -> RegistrationError {
    match unique_violation(&err.to_string()) {
        Some(UniqueField::UserName) => RegistrationError::UniquenessViolation {
            field: UniqueField::UserName,
            value: registration.user_name.clone(),
        },
        Some(UniqueField::EmailAddress) => RegistrationError::UniquenessViolation {
            field: UniqueField::EmailAddress,
            value: registration.email_address.clone(),
        },
        None => storage(err),
    }
}

/// Extracts the field from a `UNIQUE constraint failed: tg_user.<column>` message.
fn unique_violation(message: &str) -> Option<UniqueField> {
    let start = message.find(UNIQUE_FAILED)? + UNIQUE_FAILED.len();
    let qualified: String = message[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect();
    let column = qualified.rsplit('.').next()?;
    UniqueField::from_column(column)
}

fn text(row: &Row, idx: i32) -> Result<String> {
    row.get::<String>(idx).map_err(storage)
}

fn record_from_row(row: &Row) -> Result<RegistrationRecord> {
    let display_name = match row.get_value(3).map_err(storage)? {
        Value::Text(s) => Some(s),
        _ => None,
    };
    Ok(RegistrationRecord {
        id: RecordId::Integer(row.get::<i64>(0).map_err(storage)?),
        user_name: text(row, 1)?,
        email_address: text(row, 2)?,
        display_name,
        password: text(row, 4)?,
    })
}

#[async_trait]
impl RegistrationDal for RelationalRegistration {
    fn backend(&self) -> DalBackend {
        DalBackend::Sqla
    }

    #[instrument(skip(self, registration), fields(user_name = %registration.user_name))]
    async fn create(&self, registration: NewRegistration) -> Result<RecordId> {
        registration.validate()?;

        if self.exists(USER_NAME_EXISTS, &registration.user_name).await? {
            return Err(RegistrationError::UniquenessViolation {
                field: UniqueField::UserName,
                value: registration.user_name,
            });
        }
        if self.exists(EMAIL_EXISTS, &registration.email_address).await? {
            return Err(RegistrationError::UniquenessViolation {
                field: UniqueField::EmailAddress,
                value: registration.email_address,
            });
        }

        let display_name = match &registration.display_name {
            Some(name) => Value::Text(name.clone()),
            None => Value::Null,
        };

        let conn = self.connection().await?;
        let mut rows = conn
            .query(
                INSERT_USER,
                params![
                    registration.user_name.clone(),
                    registration.email_address.clone(),
                    display_name,
                    registration.password.clone()
                ],
            )
            .await
            .map_err(|e| translate(e, &registration))?;

        let row = rows
            .next()
            .await
            .map_err(|e| translate(e, &registration))?
            .ok_or_else(|| {
                RegistrationError::storage(
                    BACKEND,
                    std::io::Error::other("INSERT ... RETURNING produced no row"),
                )
            })?;
        let id = row.get::<i64>(0).map_err(storage)?;

        debug!(id, "Created registration row");
        Ok(RecordId::Integer(id))
    }

    #[instrument(skip(self))]
    async fn get_by_identifier(&self, id: &RecordId) -> Result<Option<RegistrationRecord>> {
        let Some(user_id) = id.as_integer() else {
            debug!("Non-integer identifier, nothing to look up");
            return Ok(None);
        };

        let conn = self.connection().await?;
        let mut rows = conn
            .query(SELECT_USER, params![user_id])
            .await
            .map_err(storage)?;

        match rows.next().await.map_err(storage)? {
            Some(row) => record_from_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn exists_user_name(&self, user_name: &str) -> Result<bool> {
        self.exists(USER_NAME_EXISTS, user_name).await
    }

    async fn exists_email(&self, email_address: &str) -> Result<bool> {
        self.exists(EMAIL_EXISTS, email_address).await
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.connection().await?;
        let mut rows = conn.query(COUNT_USERS, ()).await.map_err(storage)?;
        let count = match rows.next().await.map_err(storage)? {
            Some(row) => row.get::<i64>(0).map_err(storage)?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }
}
