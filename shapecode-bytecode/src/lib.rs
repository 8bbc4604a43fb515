//! Shape-compiled encoder bytecode
//!
//! Instruction taxonomy, instruction records and the chain model shared by
//! the compiler (shape to chain) and the vm (chain plus memory to JSON).

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use crate::core::{Chain, ChainBuilder, ChainView, Instruction, Opcode};
pub use crate::error::{BytecodeError, Result};
pub use crate::types::{Addr, OpId, Primitive, RecordShape, Shape, ShapeRegistry};
