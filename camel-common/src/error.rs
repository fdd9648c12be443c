//! Error type shared by the camel classifier crates
//!
//! Storage, configuration and credential code return [`Error`]; the HTTP
//! layer maps each variant to a status code.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Filesystem access (data folder, config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed config file or out-of-range setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// Row absent or owned by another user
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uniqueness constraint violated (e.g. username already taken)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the underlying database error is a UNIQUE constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}
