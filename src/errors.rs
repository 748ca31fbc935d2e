use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::error::{DbErr, RuntimeErr};
use sea_orm::sqlx;
use serde::Serialize;
use std::fmt;

use crate::config::AppConfigError;
use crate::sql_script::ScriptError;

/// Numeric server error codes that the tools treat specially.
///
/// See the MySQL server error reference; only codes with a concrete
/// handler are named, everything else lands in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MySqlErrorCode {
    /// ER_ACCESS_DENIED_ERROR
    AccessDenied,
    /// ER_BAD_DB_ERROR
    UnknownDatabase,
    /// ER_DUP_FIELDNAME
    DuplicateColumn,
    /// ER_CANT_DROP_FIELD_OR_KEY
    CantDropFieldOrKey,
    /// ER_NO_SUCH_TABLE
    NoSuchTable,
    Other(u16),
}

impl MySqlErrorCode {
    pub fn from_number(number: u16) -> Self {
        match number {
            1045 => Self::AccessDenied,
            1049 => Self::UnknownDatabase,
            1060 => Self::DuplicateColumn,
            1091 => Self::CantDropFieldOrKey,
            1146 => Self::NoSuchTable,
            n => Self::Other(n),
        }
    }

    pub fn number(&self) -> u16 {
        match self {
            Self::AccessDenied => 1045,
            Self::UnknownDatabase => 1049,
            Self::DuplicateColumn => 1060,
            Self::CantDropFieldOrKey => 1091,
            Self::NoSuchTable => 1146,
            Self::Other(n) => *n,
        }
    }

    /// Classifies a sea-orm error, `None` when it did not come from the server.
    pub fn from_db_err(err: &DbErr) -> Option<Self> {
        mysql_error_number(err).map(Self::from_number)
    }
}

impl fmt::Display for MySqlErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AccessDenied => f.write_str("access_denied"),
            Self::UnknownDatabase => f.write_str("unknown_database"),
            Self::DuplicateColumn => f.write_str("duplicate_column"),
            Self::CantDropFieldOrKey => f.write_str("cant_drop_field_or_key"),
            Self::NoSuchTable => f.write_str("no_such_table"),
            Self::Other(n) => write!(f, "mysql_{}", n),
        }
    }
}

// "error returned from database: 1060 (42S21): Duplicate column name 'image_path'"
static SERVER_CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4,5}) \(([0-9A-Z]{5})\)").expect("valid regex"));

/// Extracts the server's numeric error code from a sea-orm error.
///
/// The sqlx error is downcast when present; otherwise the code is parsed from
/// the rendered message, which keeps errors that were stringified on the way
/// (pool wrappers, mocks) classifiable.
pub fn mysql_error_number(err: &DbErr) -> Option<u16> {
    let runtime = match err {
        DbErr::Conn(e) | DbErr::Exec(e) | DbErr::Query(e) => Some(e),
        _ => None,
    };

    if let Some(RuntimeErr::SqlxError(sqlx::Error::Database(db_err))) = runtime {
        if let Some(mysql) = db_err.try_downcast_ref::<sqlx::mysql::MySqlDatabaseError>() {
            return Some(mysql.number());
        }
    }

    let message = err.to_string();
    SERVER_CODE_PATTERN
        .captures(&message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error(transparent)]
    Config(#[from] AppConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQL script error: {0}")]
    Script(#[from] ScriptError),

    #[error("Could not connect to the database with any of the {tried} candidate passwords")]
    NoWorkingCredential { tried: usize },

    #[error("Statement {index} (line {line}) failed: {source}")]
    StatementFailed {
        index: usize,
        line: usize,
        #[source]
        source: DbErr,
    },

    #[error("Verification failed: {0}")]
    Verification(String),
}

impl AdminError {
    /// Server error code carried by this error, if any
    pub fn mysql_code(&self) -> Option<MySqlErrorCode> {
        match self {
            Self::DatabaseError(e) | Self::StatementFailed { source: e, .. } => {
                MySqlErrorCode::from_db_err(e)
            }
            _ => None,
        }
    }
}

pub type AdminResult<T> = Result<T, AdminError>;
