pub mod chain;
pub mod instructions;
pub mod opcodes;

// Re-export core types
pub use self::chain::{Chain, ChainBuilder, ChainView, Walk};
pub use self::instructions::{
    FieldKey, Header, Instruction, Recursive, SliceCursor, SliceElem, SliceHead, StructField,
};
pub use self::opcodes::{FastPath, Opcode, OpcodeFlags, RecordLayout};
