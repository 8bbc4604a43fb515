use shapecode_bytecode::core::{Chain, ChainView, SliceCursor};
use shapecode_bytecode::types::{Addr, OpId};
use std::fmt::Display;
use std::io::Write;
use std::mem;
use tracing::{debug, trace};

use crate::error::RunError;
use crate::execute::{self, StepResult};
use crate::heap::Heap;
use crate::limits::EncodeLimits;
use crate::trace::{NoTrace, TraceSink};

/// Encodes values by running compiled chains
///
/// A runner holds only its limits; every encode call allocates its own
/// working state, so one runner and one chain may serve any number of
/// threads at once.
#[derive(Debug, Clone, Default)]
pub struct Runner {
    limits: EncodeLimits,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: EncodeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &EncodeLimits {
        &self.limits
    }

    /// Encode the value at `root` as JSON
    ///
    /// `root` must hold a value of the shape `chain` was compiled for.
    pub fn encode(&self, chain: &Chain, heap: &Heap, root: Addr) -> Result<Vec<u8>, RunError> {
        self.encode_traced(chain, heap, root, &mut NoTrace)
    }

    /// Encode into `sink`, returning the number of bytes written
    ///
    /// Nothing reaches the sink unless the whole encode succeeds.
    pub fn encode_to<W: Write + ?Sized>(
        &self,
        chain: &Chain,
        heap: &Heap,
        root: Addr,
        sink: &mut W,
    ) -> Result<usize, RunError> {
        let out = self.encode(chain, heap, root)?;
        sink.write_all(&out)?;
        sink.flush()?;
        Ok(out.len())
    }

    /// Encode while reporting every executed instruction to `trace`
    pub fn encode_traced<T: TraceSink + ?Sized>(
        &self,
        chain: &Chain,
        heap: &Heap,
        root: Addr,
        trace: &mut T,
    ) -> Result<Vec<u8>, RunError> {
        let mut machine = Machine::new(chain, heap, &self.limits);
        match machine.run(root, trace) {
            Ok(()) => Ok(machine.out),
            Err(err) => {
                debug!(root = %root, error = %err, "encode aborted");
                Err(err)
            }
        }
    }
}

/// Working state of one subroutine activation
struct Frame {
    /// Working address of every instruction
    ptrs: Vec<Addr>,
    /// Iteration state, indexed by `SLICE_ELEM` id
    cursors: Vec<SliceCursor>,
    /// Where the caller resumes
    ret: Option<OpId>,
}

impl Frame {
    fn new(len: usize, ret: Option<OpId>) -> Self {
        Self {
            ptrs: vec![Addr::NULL; len],
            cursors: vec![SliceCursor::default(); len],
            ret,
        }
    }
}

/// Per-call interpreter state
pub(crate) struct Machine<'a> {
    pub(crate) chain: &'a Chain,
    pub(crate) heap: &'a Heap,
    pub(crate) limits: &'a EncodeLimits,
    current: Frame,
    callers: Vec<Frame>,
    spare: Vec<Frame>,
    depth: usize,
    out: Vec<u8>,
}

impl<'a> Machine<'a> {
    fn new(chain: &'a Chain, heap: &'a Heap, limits: &'a EncodeLimits) -> Self {
        Self {
            chain,
            heap,
            limits,
            current: Frame::new(chain.len(), None),
            callers: Vec::new(),
            spare: Vec::new(),
            depth: 0,
            out: Vec::new(),
        }
    }

    fn run<T: TraceSink + ?Sized>(&mut self, root: Addr, trace: &mut T) -> Result<(), RunError> {
        let chain = self.chain;
        let mut pc = chain.head();
        self.set_ptr(pc, root);

        loop {
            let inst = chain.get(pc);
            trace.step(pc, inst.opcode(), self.ptr(pc));
            pc = match execute::step(self, pc, inst)? {
                StepResult::Jump(next) => next,
                StepResult::Call { target, addr, ret } => {
                    self.call(target, addr, ret)?;
                    target
                }
                StepResult::Return => match self.ret() {
                    Some(next) => next,
                    None => return Ok(()),
                },
            };
        }
    }

    pub(crate) fn ptr(&self, id: OpId) -> Addr {
        self.current.ptrs[id.index()]
    }

    pub(crate) fn set_ptr(&mut self, id: OpId, addr: Addr) {
        self.current.ptrs[id.index()] = addr;
    }

    pub(crate) fn cursor_mut(&mut self, id: OpId) -> &mut SliceCursor {
        &mut self.current.cursors[id.index()]
    }

    /// Enter a collection or record
    pub(crate) fn open(&mut self) -> Result<(), RunError> {
        if self.depth >= self.limits.max_depth {
            return Err(RunError::TooDeep {
                limit: self.limits.max_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn call(&mut self, target: OpId, addr: Addr, ret: OpId) -> Result<(), RunError> {
        self.open()?;
        let mut frame = match self.spare.pop() {
            Some(mut frame) => {
                frame.ret = Some(ret);
                frame
            }
            None => Frame::new(self.chain.len(), Some(ret)),
        };
        frame.ptrs[target.index()] = addr;
        self.callers.push(mem::replace(&mut self.current, frame));
        trace!(target = %target, addr = %addr, depth = self.depth, "recursive call");
        Ok(())
    }

    /// Leave the current frame; `None` once the root frame finishes
    fn ret(&mut self) -> Option<OpId> {
        let caller = self.callers.pop()?;
        let done = mem::replace(&mut self.current, caller);
        let resume = done.ret;
        self.spare.push(done);
        self.close();
        resume
    }

    pub(crate) fn emit(&mut self, bytes: &[u8]) -> Result<(), RunError> {
        let actual = self.out.len() + bytes.len();
        if actual > self.limits.max_output_bytes {
            return Err(RunError::TooLarge {
                what: "output",
                limit: self.limits.max_output_bytes,
                actual,
            });
        }
        self.out.extend_from_slice(bytes);
        Ok(())
    }

    pub(crate) fn emit_display(&mut self, value: impl Display) -> Result<(), RunError> {
        let start = self.out.len();
        write!(self.out, "{value}")?;
        self.check_output(start)
    }

    /// Write `s` as an escaped JSON string
    pub(crate) fn emit_str(&mut self, s: &str) -> Result<(), RunError> {
        let start = self.out.len();
        serde_json::to_writer(&mut self.out, s).map_err(std::io::Error::from)?;
        self.check_output(start)
    }

    fn check_output(&mut self, start: usize) -> Result<(), RunError> {
        let actual = self.out.len();
        if actual > self.limits.max_output_bytes {
            self.out.truncate(start);
            return Err(RunError::TooLarge {
                what: "output",
                limit: self.limits.max_output_bytes,
                actual,
            });
        }
        Ok(())
    }
}
