//! Instruction chains: construction and traversal
//!
//! A chain is an arena of [`Instruction`]s linked by [`OpId`]. Traversal
//! follows each instruction's successor, except on `SLICE_ELEM`, where it
//! follows the element's `end` jump: the loop body is revisited by the runner,
//! never by the navigator. Every well-formed chain reaches the unique `END`
//! terminal.

use std::sync::Arc;

use crate::core::instructions::{FieldKey, Instruction, Recursive, SliceElem, SliceHead, StructField};
use crate::core::opcodes::Opcode;
use crate::types::{OpId, Shape};

#[cold]
#[track_caller]
fn malformed(head: OpId, detail: &str) -> ! {
    panic!("malformed chain from {head}: {detail}")
}

/// Read access shared by [`Chain`] and [`ChainBuilder`]
pub trait ChainView {
    fn instructions(&self) -> &[Instruction];

    fn get(&self, id: OpId) -> &Instruction {
        &self.instructions()[id.index()]
    }

    /// The edge the navigator takes out of `id`
    fn step(&self, id: OpId) -> Option<OpId> {
        let inst = self.get(id);
        match inst.as_slice_elem() {
            Some(elem) => Some(elem.end),
            None => inst.next(),
        }
    }

    /// Instructions from `head` up to, but excluding, the terminal
    fn walk(&self, head: OpId) -> Walk<'_, Self>
    where
        Self: Sized,
    {
        Walk {
            view: self,
            head,
            current: Some(head),
            remaining: self.instructions().len(),
        }
    }

    /// Instruction immediately preceding the terminal
    ///
    /// # Panics
    ///
    /// Panics if the chain never reaches `END`; compiled chains always do.
    fn last_before_terminal(&self, head: OpId) -> OpId {
        let mut code = head;
        for _ in 0..self.instructions().len() {
            let Some(next) = self.step(code) else {
                malformed(head, &format!("{code} has no successor"));
            };
            if self.get(next).opcode() == Opcode::END {
                return code;
            }
            code = next;
        }
        malformed(head, "never reaches END")
    }

    /// Kind names in traversal order, one per line
    fn dump(&self, head: OpId) -> String
    where
        Self: Sized,
    {
        self.walk(head)
            .map(|id| self.get(id).opcode().name())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Last instruction of the construct starting at `id`
    fn construct_end(&self, id: OpId) -> OpId {
        let mut code = id;
        for _ in 0..self.instructions().len() {
            let inst = self.get(code);
            match inst.opcode() {
                Opcode::PTR => match inst.next() {
                    Some(next) => code = next,
                    None => malformed(id, &format!("{code} has no pointee")),
                },
                op if op.opens_construct() => return inst.end().unwrap_or(code),
                _ => return code,
            }
        }
        malformed(id, "pointer cycle")
    }
}

/// Iterator produced by [`ChainView::walk`]
pub struct Walk<'a, V: ChainView> {
    view: &'a V,
    head: OpId,
    current: Option<OpId>,
    remaining: usize,
}

impl<V: ChainView> Iterator for Walk<'_, V> {
    type Item = OpId;

    fn next(&mut self) -> Option<OpId> {
        let id = self.current?;
        if self.view.get(id).opcode() == Opcode::END {
            self.current = None;
            return None;
        }
        if self.remaining == 0 {
            malformed(self.head, "never reaches END");
        }
        self.remaining -= 1;
        match self.view.step(id) {
            Some(next) => self.current = Some(next),
            None => malformed(self.head, &format!("{id} has no successor")),
        }
        Some(id)
    }
}

/// Mutable arena used while compiling
///
/// Constructors never fail. Links are patched with the `link`/`set_*`
/// methods until [`ChainBuilder::finish`] freezes the arena.
#[derive(Debug, Default)]
pub struct ChainBuilder {
    ops: Vec<Instruction>,
    terminal: Option<OpId>,
    subroutines: Vec<(Arc<str>, OpId)>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, inst: Instruction) -> OpId {
        let id = OpId::new(self.ops.len());
        self.ops.push(inst);
        id
    }

    /// The unique `END` sentinel, allocated on first use
    pub fn new_terminal(&mut self) -> OpId {
        if let Some(term) = self.terminal {
            return term;
        }
        let term = self.push(Instruction::plain(Opcode::END, None, None));
        self.terminal = Some(term);
        term
    }

    pub fn new_instruction(&mut self, opcode: Opcode, shape: Option<Arc<Shape>>, next: OpId) -> OpId {
        self.push(Instruction::plain(opcode, shape, Some(next)))
    }

    /// Collection header; `next`, `elem` and `end` start at the terminal
    pub fn new_slice_head(&mut self, shape: Option<Arc<Shape>>) -> OpId {
        let term = self.new_terminal();
        self.push(Instruction::SliceHead(SliceHead::new(shape, term, term, term)))
    }

    /// Collection element with stride `size`; links start at the terminal
    pub fn new_slice_elem(&mut self, shape: Option<Arc<Shape>>, size: usize) -> OpId {
        let term = self.new_terminal();
        self.push(Instruction::SliceElem(SliceElem::new(shape, term, size, term, term)))
    }

    /// Record head or field; links start at the terminal
    pub fn new_struct_field(
        &mut self,
        opcode: Opcode,
        shape: Option<Arc<Shape>>,
        key: Option<FieldKey>,
        offset: usize,
    ) -> OpId {
        let term = self.new_terminal();
        self.push(Instruction::StructField(StructField::new(
            opcode, shape, term, key, offset, term, term,
        )))
    }

    /// Call into the subroutine of late-bound shape `name`
    pub fn new_recursive(&mut self, shape: Option<Arc<Shape>>, name: Arc<str>) -> OpId {
        let term = self.new_terminal();
        self.push(Instruction::Recursive(Recursive::new(shape, term, name, term)))
    }

    pub fn link(&mut self, id: OpId, next: OpId) {
        self.ops[id.index()].header_mut().set_next(next);
    }

    pub fn set_slice_head(&mut self, id: OpId, elem: OpId, end: OpId) {
        let Some(head) = self.ops[id.index()].as_slice_head_mut() else {
            panic!("{id} is not a SLICE_HEAD");
        };
        head.elem = elem;
        head.end = end;
    }

    pub fn set_slice_elem(&mut self, id: OpId, first: OpId, end: OpId) {
        let Some(elem) = self.ops[id.index()].as_slice_elem_mut() else {
            panic!("{id} is not a SLICE_ELEM");
        };
        elem.first = first;
        elem.end = end;
    }

    pub fn set_struct_field(&mut self, id: OpId, next_field: OpId, end: OpId) {
        let Some(field) = self.ops[id.index()].as_struct_field_mut() else {
            panic!("{id} is not a record field");
        };
        field.next_field = next_field;
        field.end = end;
    }

    pub fn set_recursive_target(&mut self, id: OpId, target: OpId) {
        let Some(call) = self.ops[id.index()].as_recursive_mut() else {
            panic!("{id} is not RECURSIVE");
        };
        call.target = target;
    }

    /// Record the head of the subroutine compiled for `name`
    pub fn add_subroutine(&mut self, name: Arc<str>, head: OpId) {
        self.subroutines.push((name, head));
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Freeze the arena into an immutable chain starting at `head`
    pub fn finish(mut self, head: OpId) -> Chain {
        let terminal = self.new_terminal();
        tracing::trace!(
            instructions = self.ops.len(),
            subroutines = self.subroutines.len(),
            "chain finished"
        );
        Chain {
            ops: self.ops.into_boxed_slice(),
            head,
            terminal,
            subroutines: self.subroutines,
        }
    }
}

impl ChainView for ChainBuilder {
    fn instructions(&self) -> &[Instruction] {
        &self.ops
    }
}

/// Immutable compiled program for one shape
///
/// Safe to share between any number of concurrent encodes; it holds no
/// per-call state.
#[derive(Debug, Clone)]
pub struct Chain {
    ops: Box<[Instruction]>,
    head: OpId,
    terminal: OpId,
    subroutines: Vec<(Arc<str>, OpId)>,
}

impl Chain {
    pub fn head(&self) -> OpId {
        self.head
    }

    pub fn terminal(&self) -> OpId {
        self.terminal
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Heads of the subroutines compiled for late-bound shapes
    pub fn subroutines(&self) -> &[(Arc<str>, OpId)] {
        &self.subroutines
    }

    /// Dump of the main program
    pub fn dump_main(&self) -> String {
        self.dump(self.head)
    }
}

impl ChainView for Chain {
    fn instructions(&self) -> &[Instruction] {
        &self.ops
    }
}
