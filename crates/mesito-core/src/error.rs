//! # Error Module
//!
//! Errors reported to the outside world and errors of the storage layer.
//!
//! A [`Rejection`] is the client's fault and serializes as
//! `{"what": <kind>, "why": <detail>}`. A [`StoreError`] is ours.

use crate::model::{MachineCondition, MachineId, Timestamp};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for mesito-core operations.
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// REJECTION
// =============================================================================

/// A request that breaks a schema, a local constraint or a stored-data rule.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "what", content = "why")]
pub enum Rejection {
    /// The JSON input does not match the expected schema.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// The input is well-formed but breaks a local constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("machine {machine_id} does not exist")]
    MachineNotFound { machine_id: MachineId },

    #[error("machine name {name:?} is already taken")]
    MachineNameTaken { name: String },

    /// The state overlaps the stored state described by the fields.
    #[error("machine state overlaps [{start}, {stop}] of machine {machine_id}")]
    MachineStateOverlap {
        start: Timestamp,
        stop: Timestamp,
        machine_id: MachineId,
    },

    #[error("machine state condition cannot change from {old} to {new}")]
    MachineStateConditionChanged {
        old: MachineCondition,
        new: MachineCondition,
    },
}

impl Rejection {
    /// Indicate that the JSON schema of the input has been violated.
    pub fn schema_violation(why: impl Into<String>) -> Self {
        Rejection::SchemaViolation(why.into())
    }

    /// Indicate that a local constraint of the input has been violated.
    pub fn constraint_violation(why: impl Into<String>) -> Self {
        Rejection::ConstraintViolation(why.into())
    }
}

// =============================================================================
// STORE ERROR
// =============================================================================

/// Failures of the redb-backed store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database not initialized at {0}; run `mesito setup` first")]
    NotInitialized(String),

    #[error("database already exists at {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("codec error: {0}")]
    Codec(#[from] postcard::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sequence {0} exhausted")]
    SequenceExhausted(&'static str),
}

// =============================================================================
// ERROR
// =============================================================================

/// Any error of a mesito-core operation.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Rejected(#[from] Rejection),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Error {
    /// The rejection, if the error is the client's fault.
    #[must_use]
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Error::Rejected(rejection) => Some(rejection),
            Error::Store(_) => None,
        }
    }
}

macro_rules! store_error_into_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for Error {
                fn from(err: $source) -> Self {
                    Error::Store(StoreError::from(err))
                }
            }
        )*
    };
}

store_error_into_error!(
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    postcard::Error,
);

// =============================================================================
// TESTS
// =============================================================================
