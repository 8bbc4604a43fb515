//! Instruction records for compiled chains
//!
//! Every instruction carries a [`Header`]. Collection and record kinds extend
//! it with a payload; the [`Instruction`] variant, checked by the type system,
//! decides which payload may be read. A generic view of any instruction is
//! always available through [`Instruction::header`].

use crate::core::opcodes::{Opcode, RecordLayout};
use crate::types::{Addr, OpId, Shape};
use std::fmt;
use std::sync::Arc;

/// Fields shared by every instruction
///
/// `next` is `None` only for the terminal `END` instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    opcode: Opcode,
    shape: Option<Arc<Shape>>,
    next: Option<OpId>,
}

impl Header {
    pub fn new(opcode: Opcode, shape: Option<Arc<Shape>>, next: Option<OpId>) -> Self {
        Self {
            opcode,
            shape,
            next,
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Shape this instruction was compiled for
    pub fn shape(&self) -> Option<&Arc<Shape>> {
        self.shape.as_ref()
    }

    pub fn next(&self) -> Option<OpId> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: OpId) {
        self.next = Some(next);
    }
}

/// Record key with its JSON encoding (`"name":`) computed once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldKey {
    name: Arc<str>,
    encoded: Arc<[u8]>,
}

impl FieldKey {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        let name = name.into();
        let mut encoded = serde_json::Value::from(name.as_ref())
            .to_string()
            .into_bytes();
        encoded.push(b':');
        Self {
            name,
            encoded: encoded.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }
}

/// Collection header: opens a sequence
#[derive(Debug, Clone, PartialEq)]
pub struct SliceHead {
    header: Header,
    /// Paired element instruction
    pub elem: OpId,
    /// Closing `SLICE_END`
    pub end: OpId,
}

impl SliceHead {
    pub fn new(shape: Option<Arc<Shape>>, next: OpId, elem: OpId, end: OpId) -> Self {
        Self {
            header: Header::new(Opcode::SLICE_HEAD, shape, Some(next)),
            elem,
            end,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }
}

/// Collection element: advances iteration and loops back to `first`
///
/// Index, length and data base are per-call state and live in a
/// [`SliceCursor`] owned by the runner, never in the shared chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceElem {
    header: Header,
    /// Element stride in bytes
    pub size: usize,
    /// First instruction of the element body
    pub first: OpId,
    /// Closing `SLICE_END`, shared with the header
    pub end: OpId,
}

impl SliceElem {
    pub fn new(shape: Option<Arc<Shape>>, next: OpId, size: usize, first: OpId, end: OpId) -> Self {
        Self {
            header: Header::new(Opcode::SLICE_ELEM, shape, Some(next)),
            size,
            first,
            end,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }
}

/// Record head or field
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    header: Header,
    /// `None` only for the head of a record without fields
    pub key: Option<FieldKey>,
    /// Byte offset of the field inside the record
    pub offset: usize,
    /// Next field, or the closing `STRUCT_END`
    pub next_field: OpId,
    /// Closing `STRUCT_END`
    pub end: OpId,
}

impl StructField {
    pub fn new(
        opcode: Opcode,
        shape: Option<Arc<Shape>>,
        next: OpId,
        key: Option<FieldKey>,
        offset: usize,
        next_field: OpId,
        end: OpId,
    ) -> Self {
        debug_assert_eq!(opcode.layout(), RecordLayout::StructField, "{opcode} is not a field kind");
        Self {
            header: Header::new(opcode, shape, Some(next)),
            key,
            offset,
            next_field,
            end,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }
}

/// Call into the subroutine compiled for a late-bound shape
#[derive(Debug, Clone, PartialEq)]
pub struct Recursive {
    header: Header,
    pub name: Arc<str>,
    /// Head of the subroutine chain
    pub target: OpId,
}

impl Recursive {
    pub fn new(shape: Option<Arc<Shape>>, next: OpId, name: Arc<str>, target: OpId) -> Self {
        Self {
            header: Header::new(Opcode::RECURSIVE, shape, Some(next)),
            name,
            target,
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }
}

/// One step of a compiled encode program
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Plain(Header),
    SliceHead(SliceHead),
    SliceElem(SliceElem),
    StructField(StructField),
    Recursive(Recursive),
}

impl Instruction {
    /// Instruction with no payload
    pub fn plain(opcode: Opcode, shape: Option<Arc<Shape>>, next: Option<OpId>) -> Self {
        debug_assert_eq!(opcode.layout(), RecordLayout::Plain, "{opcode} needs a payload");
        Instruction::Plain(Header::new(opcode, shape, next))
    }

    /// Generic view shared by every variant
    pub fn header(&self) -> &Header {
        match self {
            Instruction::Plain(h) => h,
            Instruction::SliceHead(i) => &i.header,
            Instruction::SliceElem(i) => &i.header,
            Instruction::StructField(i) => &i.header,
            Instruction::Recursive(i) => &i.header,
        }
    }

    pub(crate) fn header_mut(&mut self) -> &mut Header {
        match self {
            Instruction::Plain(h) => h,
            Instruction::SliceHead(i) => &mut i.header,
            Instruction::SliceElem(i) => &mut i.header,
            Instruction::StructField(i) => &mut i.header,
            Instruction::Recursive(i) => &mut i.header,
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.header().opcode()
    }

    pub fn next(&self) -> Option<OpId> {
        self.header().next()
    }

    /// Closing instruction of the construct this instruction belongs to
    pub fn end(&self) -> Option<OpId> {
        match self {
            Instruction::SliceHead(i) => Some(i.end),
            Instruction::SliceElem(i) => Some(i.end),
            Instruction::StructField(i) => Some(i.end),
            Instruction::Plain(_) | Instruction::Recursive(_) => None,
        }
    }

    pub fn as_slice_head(&self) -> Option<&SliceHead> {
        match self {
            Instruction::SliceHead(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_slice_elem(&self) -> Option<&SliceElem> {
        match self {
            Instruction::SliceElem(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_struct_field(&self) -> Option<&StructField> {
        match self {
            Instruction::StructField(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_recursive(&self) -> Option<&Recursive> {
        match self {
            Instruction::Recursive(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn as_slice_head_mut(&mut self) -> Option<&mut SliceHead> {
        match self {
            Instruction::SliceHead(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn as_slice_elem_mut(&mut self) -> Option<&mut SliceElem> {
        match self {
            Instruction::SliceElem(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn as_struct_field_mut(&mut self) -> Option<&mut StructField> {
        match self {
            Instruction::StructField(i) => Some(i),
            _ => None,
        }
    }

    pub(crate) fn as_recursive_mut(&mut self) -> Option<&mut Recursive> {
        match self {
            Instruction::Recursive(i) => Some(i),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode())?;
        match self {
            Instruction::Plain(_) => Ok(()),
            Instruction::SliceHead(i) => write!(f, " elem={} end={}", i.elem, i.end),
            Instruction::SliceElem(i) => {
                write!(f, " size={} first={} end={}", i.size, i.first, i.end)
            }
            Instruction::StructField(i) => {
                if let Some(key) = &i.key {
                    write!(f, " {:?}", key.name())?;
                }
                write!(
                    f,
                    " offset={} next_field={} end={}",
                    i.offset, i.next_field, i.end
                )
            }
            Instruction::Recursive(i) => write!(f, " {} target={}", i.name, i.target),
        }
    }
}

/// Per-call iteration state of one collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceCursor {
    pub idx: usize,
    pub len: usize,
    pub data: Addr,
}

impl SliceCursor {
    pub fn start(len: usize, data: Addr) -> Self {
        Self { idx: 0, len, data }
    }

    /// Move to the next element; `false` once iteration is finished
    pub fn advance(&mut self) -> bool {
        self.idx += 1;
        self.idx < self.len
    }

    /// Address of the current element
    pub fn element(&self, stride: usize) -> Option<Addr> {
        self.idx
            .checked_mul(stride)
            .and_then(|bytes| self.data.offset(bytes))
    }
}
