//! Error taxonomy for the DHT core.
//!
//! Every fallible core operation returns [`CoreError`]. Transport failures
//! and missing-value lookups are everyday outcomes, not bugs, and are
//! represented as ordinary variants rather than panics.

use crate::key::KeyInt;

/// Error kinds produced by the DHT core.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("node {0} attempted to observe itself")]
    SelfReference(KeyInt),

    #[error("transport could not reach the destination")]
    Unreachable,

    #[error("bounded random permutation exhausted its entropy")]
    Exhausted,

    #[error("no peer holds key {0}")]
    NotFound(KeyInt),

    #[error("entry store is full")]
    StorageFull,
}

/// Result alias used throughout the core crate.
pub type CoreResult<T> = Result<T, CoreError>;
