//! Observation hooks for encode runs

use shapecode_bytecode::core::Opcode;
use shapecode_bytecode::types::{Addr, OpId};

/// Receives every instruction the runner executes, in order
pub trait TraceSink {
    fn step(&mut self, id: OpId, opcode: Opcode, addr: Addr);
}

/// Discards all steps
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    #[inline(always)]
    fn step(&mut self, _id: OpId, _opcode: Opcode, _addr: Addr) {}
}

/// One executed instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceStep {
    pub id: OpId,
    pub opcode: Opcode,
    /// Working address the instruction ran with
    pub addr: Addr,
}

/// Keeps every step for later inspection
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    steps: Vec<TraceStep>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> &[TraceStep] {
        &self.steps
    }

    pub fn opcodes(&self) -> Vec<Opcode> {
        self.steps.iter().map(|s| s.opcode).collect()
    }

    /// How many times `opcode` ran
    pub fn count(&self, opcode: Opcode) -> usize {
        self.steps.iter().filter(|s| s.opcode == opcode).count()
    }

    pub fn visited(&self, id: OpId) -> bool {
        self.steps.iter().any(|s| s.id == id)
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }
}

impl TraceSink for TraceRecorder {
    fn step(&mut self, id: OpId, opcode: Opcode, addr: Addr) {
        self.steps.push(TraceStep { id, opcode, addr });
    }
}
