//! Opcode definitions for compiled shape encoders

use crate::error::{BytecodeError, Result};
use bitflags::bitflags;
use std::fmt;

/// Instruction kind (8 bits)
///
/// Numbering is stable: dumps and disassembly listings depend on it, so new
/// kinds are appended and existing values are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(non_camel_case_types)] // Opcodes follow assembly/bytecode naming convention
pub enum Opcode {
    // Terminal sentinel
    END = 0x00,

    // Primitive emitters (0x01 - 0x0E)
    INT = 0x01,
    INT8 = 0x02,
    INT16 = 0x03,
    INT32 = 0x04,
    INT64 = 0x05,
    UINT = 0x06,
    UINT8 = 0x07,
    UINT16 = 0x08,
    UINT32 = 0x09,
    UINT64 = 0x0A,
    FLOAT32 = 0x0B,
    FLOAT64 = 0x0C,
    STRING = 0x0D,
    BOOL = 0x0E,

    // Indirection
    PTR = 0x0F,

    // Collections (0x10 - 0x12)
    SLICE_HEAD = 0x10,
    SLICE_ELEM = 0x11,
    SLICE_END = 0x12,

    // Record heads (0x13 - 0x18)
    STRUCT_FIELD_HEAD = 0x13,
    STRUCT_FIELD_HEAD_INT = 0x14,
    STRUCT_FIELD_HEAD_STRING = 0x15,
    STRUCT_FIELD_PTR_HEAD = 0x16,
    STRUCT_FIELD_PTR_HEAD_INT = 0x17,
    STRUCT_FIELD_PTR_HEAD_STRING = 0x18,

    // Record fields (0x19 - 0x1C)
    STRUCT_FIELD = 0x19,
    STRUCT_FIELD_INT = 0x1A,
    STRUCT_FIELD_STRING = 0x1B,
    STRUCT_END = 0x1C,

    // Late-bound shapes
    RECURSIVE = 0x1D,
}

/// Which record shape an opcode's instruction carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    Plain,
    SliceHead,
    SliceElem,
    StructField,
    Recursive,
}

impl Opcode {
    /// Every opcode, in numbering order
    pub const ALL: [Opcode; 30] = [
        Opcode::END,
        Opcode::INT,
        Opcode::INT8,
        Opcode::INT16,
        Opcode::INT32,
        Opcode::INT64,
        Opcode::UINT,
        Opcode::UINT8,
        Opcode::UINT16,
        Opcode::UINT32,
        Opcode::UINT64,
        Opcode::FLOAT32,
        Opcode::FLOAT64,
        Opcode::STRING,
        Opcode::BOOL,
        Opcode::PTR,
        Opcode::SLICE_HEAD,
        Opcode::SLICE_ELEM,
        Opcode::SLICE_END,
        Opcode::STRUCT_FIELD_HEAD,
        Opcode::STRUCT_FIELD_HEAD_INT,
        Opcode::STRUCT_FIELD_HEAD_STRING,
        Opcode::STRUCT_FIELD_PTR_HEAD,
        Opcode::STRUCT_FIELD_PTR_HEAD_INT,
        Opcode::STRUCT_FIELD_PTR_HEAD_STRING,
        Opcode::STRUCT_FIELD,
        Opcode::STRUCT_FIELD_INT,
        Opcode::STRUCT_FIELD_STRING,
        Opcode::STRUCT_END,
        Opcode::RECURSIVE,
    ];

    /// Parse opcode from byte
    pub fn from_byte(byte: u8) -> Result<Self> {
        Self::ALL
            .get(byte as usize)
            .copied()
            .ok_or(BytecodeError::InvalidOpcode(byte))
    }

    /// Stable display name used by dumps
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::END => "END",
            Opcode::INT => "INT",
            Opcode::INT8 => "INT8",
            Opcode::INT16 => "INT16",
            Opcode::INT32 => "INT32",
            Opcode::INT64 => "INT64",
            Opcode::UINT => "UINT",
            Opcode::UINT8 => "UINT8",
            Opcode::UINT16 => "UINT16",
            Opcode::UINT32 => "UINT32",
            Opcode::UINT64 => "UINT64",
            Opcode::FLOAT32 => "FLOAT32",
            Opcode::FLOAT64 => "FLOAT64",
            Opcode::STRING => "STRING",
            Opcode::BOOL => "BOOL",
            Opcode::PTR => "PTR",
            Opcode::SLICE_HEAD => "SLICE_HEAD",
            Opcode::SLICE_ELEM => "SLICE_ELEM",
            Opcode::SLICE_END => "SLICE_END",
            Opcode::STRUCT_FIELD_HEAD => "STRUCT_FIELD_HEAD",
            Opcode::STRUCT_FIELD_HEAD_INT => "STRUCT_FIELD_HEAD_INT",
            Opcode::STRUCT_FIELD_HEAD_STRING => "STRUCT_FIELD_HEAD_STRING",
            Opcode::STRUCT_FIELD_PTR_HEAD => "STRUCT_FIELD_PTR_HEAD",
            Opcode::STRUCT_FIELD_PTR_HEAD_INT => "STRUCT_FIELD_PTR_HEAD_INT",
            Opcode::STRUCT_FIELD_PTR_HEAD_STRING => "STRUCT_FIELD_PTR_HEAD_STRING",
            Opcode::STRUCT_FIELD => "STRUCT_FIELD",
            Opcode::STRUCT_FIELD_INT => "STRUCT_FIELD_INT",
            Opcode::STRUCT_FIELD_STRING => "STRUCT_FIELD_STRING",
            Opcode::STRUCT_END => "STRUCT_END",
            Opcode::RECURSIVE => "RECURSIVE",
        }
    }

    /// The record shape an instruction of this kind must carry
    pub fn layout(&self) -> RecordLayout {
        match self {
            Opcode::SLICE_HEAD => RecordLayout::SliceHead,
            Opcode::SLICE_ELEM => RecordLayout::SliceElem,
            Opcode::RECURSIVE => RecordLayout::Recursive,
            op if op.is_record_head() || op.is_record_field() => RecordLayout::StructField,
            _ => RecordLayout::Plain,
        }
    }

    pub fn flags(&self) -> OpcodeFlags {
        match self {
            Opcode::END | Opcode::RECURSIVE | Opcode::SLICE_ELEM => OpcodeFlags::empty(),

            Opcode::INT
            | Opcode::INT8
            | Opcode::INT16
            | Opcode::INT32
            | Opcode::INT64
            | Opcode::UINT
            | Opcode::UINT8
            | Opcode::UINT16
            | Opcode::UINT32
            | Opcode::UINT64
            | Opcode::FLOAT32
            | Opcode::FLOAT64
            | Opcode::STRING
            | Opcode::BOOL => OpcodeFlags::PRIMITIVE,

            Opcode::PTR => OpcodeFlags::VIA_POINTER,

            Opcode::SLICE_HEAD => OpcodeFlags::OPENS_CONSTRUCT,
            Opcode::SLICE_END => OpcodeFlags::CLOSES_CONSTRUCT,

            Opcode::STRUCT_FIELD_HEAD => OpcodeFlags::RECORD_HEAD | OpcodeFlags::OPENS_CONSTRUCT,
            Opcode::STRUCT_FIELD_HEAD_INT => {
                OpcodeFlags::RECORD_HEAD | OpcodeFlags::OPENS_CONSTRUCT | OpcodeFlags::FAST_INT
            }
            Opcode::STRUCT_FIELD_HEAD_STRING => {
                OpcodeFlags::RECORD_HEAD | OpcodeFlags::OPENS_CONSTRUCT | OpcodeFlags::FAST_STRING
            }
            Opcode::STRUCT_FIELD_PTR_HEAD => {
                OpcodeFlags::RECORD_HEAD | OpcodeFlags::OPENS_CONSTRUCT | OpcodeFlags::VIA_POINTER
            }
            Opcode::STRUCT_FIELD_PTR_HEAD_INT => {
                OpcodeFlags::RECORD_HEAD
                    | OpcodeFlags::OPENS_CONSTRUCT
                    | OpcodeFlags::VIA_POINTER
                    | OpcodeFlags::FAST_INT
            }
            Opcode::STRUCT_FIELD_PTR_HEAD_STRING => {
                OpcodeFlags::RECORD_HEAD
                    | OpcodeFlags::OPENS_CONSTRUCT
                    | OpcodeFlags::VIA_POINTER
                    | OpcodeFlags::FAST_STRING
            }

            Opcode::STRUCT_FIELD => OpcodeFlags::RECORD_FIELD,
            Opcode::STRUCT_FIELD_INT => OpcodeFlags::RECORD_FIELD | OpcodeFlags::FAST_INT,
            Opcode::STRUCT_FIELD_STRING => OpcodeFlags::RECORD_FIELD | OpcodeFlags::FAST_STRING,
            Opcode::STRUCT_END => OpcodeFlags::CLOSES_CONSTRUCT,
        }
    }

    pub fn is_primitive(&self) -> bool {
        self.flags().contains(OpcodeFlags::PRIMITIVE)
    }

    pub fn is_record_head(&self) -> bool {
        self.flags().contains(OpcodeFlags::RECORD_HEAD)
    }

    pub fn is_record_field(&self) -> bool {
        self.flags().contains(OpcodeFlags::RECORD_FIELD)
    }

    /// Begins a collection or record; paired with a closing kind
    pub fn opens_construct(&self) -> bool {
        self.flags().contains(OpcodeFlags::OPENS_CONSTRUCT)
    }

    pub fn closes_construct(&self) -> bool {
        self.flags().contains(OpcodeFlags::CLOSES_CONSTRUCT)
    }

    /// Check if this opcode encodes its field value inline
    pub fn is_fast_path(&self) -> bool {
        self.flags()
            .intersects(OpcodeFlags::FAST_INT | OpcodeFlags::FAST_STRING)
    }

    /// Record head for a record reached directly or through a pointer
    pub fn record_head(via_pointer: bool, fast: FastPath) -> Self {
        match (via_pointer, fast) {
            (false, FastPath::None) => Opcode::STRUCT_FIELD_HEAD,
            (false, FastPath::Int) => Opcode::STRUCT_FIELD_HEAD_INT,
            (false, FastPath::String) => Opcode::STRUCT_FIELD_HEAD_STRING,
            (true, FastPath::None) => Opcode::STRUCT_FIELD_PTR_HEAD,
            (true, FastPath::Int) => Opcode::STRUCT_FIELD_PTR_HEAD_INT,
            (true, FastPath::String) => Opcode::STRUCT_FIELD_PTR_HEAD_STRING,
        }
    }

    /// Non-leading record field
    pub fn record_field(fast: FastPath) -> Self {
        match fast {
            FastPath::None => Opcode::STRUCT_FIELD,
            FastPath::Int => Opcode::STRUCT_FIELD_INT,
            FastPath::String => Opcode::STRUCT_FIELD_STRING,
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inline encoding used by a record head or field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FastPath {
    None,
    Int,
    String,
}

bitflags! {
    /// Static classification of an opcode
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpcodeFlags: u16 {
        /// Emits one primitive value
        const PRIMITIVE = 0b0000_0000_0001;

        /// Begins a record
        const RECORD_HEAD = 0b0000_0000_0010;

        /// Non-leading record field
        const RECORD_FIELD = 0b0000_0000_0100;

        /// Reads a pointer before touching the value
        const VIA_POINTER = 0b0000_0000_1000;

        /// Encodes an integer field inline
        const FAST_INT = 0b0000_0001_0000;

        /// Encodes a string field inline
        const FAST_STRING = 0b0000_0010_0000;

        /// Opens a collection or record
        const OPENS_CONSTRUCT = 0b0000_0100_0000;

        /// Closes a collection or record
        const CLOSES_CONSTRUCT = 0b0000_1000_0000;
    }
}
