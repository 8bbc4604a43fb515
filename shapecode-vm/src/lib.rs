//! Runner for compiled shape chains
//!
//! Walks a [`Chain`](shapecode_bytecode::Chain) against a value laid out in a
//! [`Heap`] and writes compact JSON. Chains are read-only; all working state
//! lives in the encode call.

mod error;
mod execute;
mod heap;
mod limits;
mod trace;
mod value;
mod vm;

pub use crate::error::{LayoutError, RunError};
pub use crate::heap::Heap;
pub use crate::limits::EncodeLimits;
pub use crate::trace::{NoTrace, TraceRecorder, TraceSink, TraceStep};
pub use crate::value::Value;
pub use crate::vm::Runner;

// Re-export a lightweight API for users
pub mod api {
    pub use crate::heap::Heap;
    pub use crate::limits::EncodeLimits;
    pub use crate::value::Value;
    pub use crate::vm::Runner;
    pub use shapecode_bytecode::core::{Chain, ChainView, Instruction, Opcode};
    pub use shapecode_bytecode::types::{Addr, RecordShape, Shape, ShapeRegistry};
}
