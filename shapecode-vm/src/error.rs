use shapecode_bytecode::types::Addr;
use std::io;
use thiserror::Error;

/// Reasons an encode call is aborted
///
/// Output produced before the failure is discarded.
#[derive(Error, Debug)]
pub enum RunError {
    /// The memory at `addr` does not hold a valid value for the shape
    #[error("Invalid value at {addr}: {reason}")]
    InvalidValue { addr: Addr, reason: String },

    /// A read of `len` bytes at `addr` leaves the heap
    #[error("Out of bounds: {len} bytes at {addr}")]
    OutOfBounds { addr: Addr, len: usize },

    #[error("Nesting exceeds {limit} levels")]
    TooDeep { limit: usize },

    #[error("{what} size {actual} exceeds limit {limit}")]
    TooLarge {
        what: &'static str,
        limit: usize,
        actual: usize,
    },

    #[error("Sink write failed: {0}")]
    Io(#[from] io::Error),
}

impl RunError {
    pub(crate) fn invalid(addr: Addr, reason: impl Into<String>) -> Self {
        RunError::InvalidValue {
            addr,
            reason: reason.into(),
        }
    }
}

/// Reasons a value cannot be laid out for a shape
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Cannot place {value} as `{shape}`")]
    Mismatch { shape: String, value: &'static str },

    #[error("Value {value} is out of range for `{shape}`")]
    OutOfRange { shape: String, value: String },

    #[error("Record `{shape}` has {expected} fields, got {actual}")]
    FieldCount {
        shape: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unresolved shape: `{name}` is not registered")]
    Unresolved { name: String },

    #[error("Shape `{shape}` cannot be stored")]
    Unsupported { shape: String },

    #[error("Write of {len} bytes at {addr} leaves the heap")]
    OutOfBounds { addr: Addr, len: usize },
}
