//! Error types for bytecode operations

use thiserror::Error;

/// Main error type for bytecode operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BytecodeError {
    #[error("Invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("Invalid layout for record `{record}`: {message}")]
    Layout { record: String, message: String },
}

/// Convenient Result type
pub type Result<T> = std::result::Result<T, BytecodeError>;
