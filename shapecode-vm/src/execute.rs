use shapecode_bytecode::core::{
    ChainView, Instruction, Opcode, OpcodeFlags, SliceCursor, SliceElem, SliceHead, StructField,
};
use shapecode_bytecode::types::{Addr, OpId};

use crate::error::RunError;
use crate::heap::offset;
use crate::vm::Machine;

pub(crate) enum StepResult {
    Jump(OpId),
    Call { target: OpId, addr: Addr, ret: OpId },
    Return,
}

#[cold]
#[track_caller]
fn malformed(pc: OpId, detail: &str) -> ! {
    panic!("malformed chain at {pc}: {detail}")
}

fn successor(pc: OpId, next: Option<OpId>) -> OpId {
    next.unwrap_or_else(|| malformed(pc, "no successor"))
}

/// Instruction after the construct closed by `end`
fn past(m: &Machine<'_>, end: OpId) -> OpId {
    successor(end, m.chain.get(end).next())
}

pub(crate) fn step(m: &mut Machine<'_>, pc: OpId, inst: &Instruction) -> Result<StepResult, RunError> {
    let addr = m.ptr(pc);
    match inst {
        Instruction::Plain(header) if header.opcode() == Opcode::END => Ok(StepResult::Return),
        Instruction::Plain(header) => plain(m, pc, header.opcode(), addr, successor(pc, header.next())),
        Instruction::SliceHead(head) => slice_head(m, pc, addr, head),
        Instruction::SliceElem(elem) => slice_elem(m, pc, elem),
        Instruction::StructField(field) => struct_field(m, pc, addr, field),
        Instruction::Recursive(call) => Ok(StepResult::Call {
            target: call.target,
            addr,
            ret: successor(pc, call.header().next()),
        }),
    }
}

fn plain(
    m: &mut Machine<'_>,
    pc: OpId,
    opcode: Opcode,
    addr: Addr,
    next: OpId,
) -> Result<StepResult, RunError> {
    let heap = m.heap;
    match opcode {
        Opcode::INT | Opcode::INT64 => m.emit_display(heap.read_i64(addr)?)?,
        Opcode::INT8 => m.emit_display(heap.read_i8(addr)?)?,
        Opcode::INT16 => m.emit_display(heap.read_i16(addr)?)?,
        Opcode::INT32 => m.emit_display(heap.read_i32(addr)?)?,
        Opcode::UINT | Opcode::UINT64 => m.emit_display(heap.read_u64(addr)?)?,
        Opcode::UINT8 => m.emit_display(heap.read_u8(addr)?)?,
        Opcode::UINT16 => m.emit_display(heap.read_u16(addr)?)?,
        Opcode::UINT32 => m.emit_display(heap.read_u32(addr)?)?,
        Opcode::FLOAT32 => {
            let x = heap.read_f32(addr)?;
            if !x.is_finite() {
                return Err(RunError::invalid(addr, format!("non-finite float {x}")));
            }
            m.emit_display(x)?;
        }
        Opcode::FLOAT64 => {
            let x = heap.read_f64(addr)?;
            let number = serde_json::Number::from_f64(x)
                .ok_or_else(|| RunError::invalid(addr, format!("non-finite float {x}")))?;
            m.emit_display(number)?;
        }
        Opcode::STRING => m.emit_str(heap.read_str(addr)?)?,
        Opcode::BOOL => {
            let text: &[u8] = if heap.read_bool(addr)? { b"true" } else { b"false" };
            m.emit(text)?;
        }
        Opcode::PTR => {
            let target = heap.read_addr(addr)?;
            if target.is_null() {
                m.emit(b"null")?;
                let end = m.chain.construct_end(next);
                return Ok(StepResult::Jump(past(m, end)));
            }
            m.set_ptr(next, target);
        }
        Opcode::SLICE_END => m.emit(b"]")?,
        Opcode::STRUCT_END => m.emit(b"}")?,
        other => malformed(pc, &format!("{other} has no payload")),
    }
    if opcode.closes_construct() {
        m.close();
    }
    Ok(StepResult::Jump(next))
}

fn slice_head(
    m: &mut Machine<'_>,
    pc: OpId,
    addr: Addr,
    head: &SliceHead,
) -> Result<StepResult, RunError> {
    let (data, len) = m.heap.read_header(addr)?;
    if data.is_null() {
        if len != 0 {
            return Err(RunError::invalid(addr, format!("null data with length {len}")));
        }
        m.emit(b"null")?;
        return Ok(StepResult::Jump(past(m, head.end)));
    }
    if len > m.limits.max_collection_len {
        return Err(RunError::TooLarge {
            what: "collection",
            limit: m.limits.max_collection_len,
            actual: len,
        });
    }

    m.emit(b"[")?;
    m.open()?;
    if len == 0 {
        return Ok(StepResult::Jump(head.end));
    }
    let body = successor(pc, head.header().next());
    *m.cursor_mut(head.elem) = SliceCursor::start(len, data);
    m.set_ptr(body, data);
    Ok(StepResult::Jump(body))
}

fn slice_elem(m: &mut Machine<'_>, pc: OpId, elem: &SliceElem) -> Result<StepResult, RunError> {
    let cursor = m.cursor_mut(pc);
    if !cursor.advance() {
        return Ok(StepResult::Jump(elem.end));
    }
    let data = cursor.data;
    let at = cursor
        .element(elem.size)
        .ok_or(RunError::OutOfBounds {
            addr: data,
            len: elem.size,
        })?;
    m.emit(b",")?;
    m.set_ptr(elem.first, at);
    Ok(StepResult::Jump(elem.first))
}

fn struct_field(
    m: &mut Machine<'_>,
    pc: OpId,
    addr: Addr,
    field: &StructField,
) -> Result<StepResult, RunError> {
    let heap = m.heap;
    let flags = field.header().opcode().flags();

    let mut base = addr;
    if flags.contains(OpcodeFlags::RECORD_HEAD) {
        if flags.contains(OpcodeFlags::VIA_POINTER) {
            base = heap.read_addr(addr)?;
            if base.is_null() {
                m.emit(b"null")?;
                return Ok(StepResult::Jump(past(m, field.end)));
            }
        }
        m.emit(b"{")?;
    } else {
        m.emit(b",")?;
    }
    if flags.contains(OpcodeFlags::OPENS_CONSTRUCT) {
        m.open()?;
    }

    let next = successor(pc, field.header().next());
    if let Some(key) = &field.key {
        m.emit(key.encoded())?;
        let at = offset(base, field.offset)?;
        if flags.contains(OpcodeFlags::FAST_INT) {
            m.emit_display(heap.read_i64(at)?)?;
        } else if flags.contains(OpcodeFlags::FAST_STRING) {
            m.emit_str(heap.read_str(at)?)?;
        } else {
            m.set_ptr(next, at);
        }
    }
    m.set_ptr(field.next_field, base);
    Ok(StepResult::Jump(next))
}
