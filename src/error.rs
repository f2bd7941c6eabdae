//! Errors surfaced by fleet operations.

use crate::db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BatteryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("{0}")]
    Conflict(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] DbError),
}

impl BatteryError {
    /// Convert a store error for a lookup of `entity` by `id`.
    pub fn from_db(err: DbError, entity: &'static str, id: i64) -> Self {
        match err {
            DbError::NotFound => BatteryError::NotFound { entity, id },
            other => other.into(),
        }
    }
}

impl From<DbError> for BatteryError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict(msg) => BatteryError::Conflict(msg),
            other => BatteryError::StoreUnavailable(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, BatteryError>;
