//! Byte memory image holding the values being encoded
//!
//! All multi-byte values are little-endian. The first bytes of every heap are
//! a reserved guard so that address zero, and anything near it, is never a
//! valid allocation; reads there fail like any other out-of-bounds read.

use byteorder::{ByteOrder, LittleEndian};
use shapecode_bytecode::types::{Addr, Primitive, Shape, ShapeRegistry, POINTER_SIZE};
use std::fmt::Display;

use crate::error::{LayoutError, RunError};
use crate::value::Value;

const NULL_GUARD: usize = 8;

#[derive(Debug, Clone)]
pub struct Heap {
    bytes: Vec<u8>,
}

impl Default for Heap {
    fn default() -> Self {
        Self {
            bytes: vec![0; NULL_GUARD],
        }
    }
}

impl Heap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes in use, including the null guard
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len() == NULL_GUARD
    }

    /// Reserve `size` zeroed bytes aligned to `align`
    pub fn alloc(&mut self, size: usize, align: usize) -> Addr {
        let start = self.bytes.len().next_multiple_of(align.max(1));
        self.bytes.resize(start + size, 0);
        Addr::new(start)
    }

    /// Copy `data` into a fresh unaligned allocation
    pub fn alloc_bytes(&mut self, data: &[u8]) -> Addr {
        let addr = self.alloc(data.len(), 1);
        self.bytes[addr.get()..].copy_from_slice(data);
        addr
    }

    // --- reads -------------------------------------------------------------

    /// `len` bytes starting at `addr`
    pub fn bytes(&self, addr: Addr, len: usize) -> Result<&[u8], RunError> {
        let start = addr.get();
        if start < NULL_GUARD {
            return Err(RunError::OutOfBounds { addr, len });
        }
        start
            .checked_add(len)
            .and_then(|end| self.bytes.get(start..end))
            .ok_or(RunError::OutOfBounds { addr, len })
    }

    pub fn read_u8(&self, addr: Addr) -> Result<u8, RunError> {
        Ok(self.bytes(addr, 1)?[0])
    }

    pub fn read_u16(&self, addr: Addr) -> Result<u16, RunError> {
        Ok(LittleEndian::read_u16(self.bytes(addr, 2)?))
    }

    pub fn read_u32(&self, addr: Addr) -> Result<u32, RunError> {
        Ok(LittleEndian::read_u32(self.bytes(addr, 4)?))
    }

    pub fn read_u64(&self, addr: Addr) -> Result<u64, RunError> {
        Ok(LittleEndian::read_u64(self.bytes(addr, 8)?))
    }

    pub fn read_i8(&self, addr: Addr) -> Result<i8, RunError> {
        Ok(self.read_u8(addr)? as i8)
    }

    pub fn read_i16(&self, addr: Addr) -> Result<i16, RunError> {
        Ok(LittleEndian::read_i16(self.bytes(addr, 2)?))
    }

    pub fn read_i32(&self, addr: Addr) -> Result<i32, RunError> {
        Ok(LittleEndian::read_i32(self.bytes(addr, 4)?))
    }

    pub fn read_i64(&self, addr: Addr) -> Result<i64, RunError> {
        Ok(LittleEndian::read_i64(self.bytes(addr, 8)?))
    }

    pub fn read_f32(&self, addr: Addr) -> Result<f32, RunError> {
        Ok(LittleEndian::read_f32(self.bytes(addr, 4)?))
    }

    pub fn read_f64(&self, addr: Addr) -> Result<f64, RunError> {
        Ok(LittleEndian::read_f64(self.bytes(addr, 8)?))
    }

    pub fn read_bool(&self, addr: Addr) -> Result<bool, RunError> {
        match self.read_u8(addr)? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(RunError::invalid(addr, format!("bool byte {b:#04x}"))),
        }
    }

    pub fn read_addr(&self, addr: Addr) -> Result<Addr, RunError> {
        let raw = self.read_u64(addr)?;
        usize::try_from(raw)
            .map(Addr::new)
            .map_err(|_| RunError::invalid(addr, format!("pointer {raw:#x} exceeds address space")))
    }

    /// `(data, len)` header of a string or sequence
    pub fn read_header(&self, addr: Addr) -> Result<(Addr, usize), RunError> {
        let data = self.read_addr(addr)?;
        let len_at = offset(addr, POINTER_SIZE)?;
        let raw = self.read_u64(len_at)?;
        let len = usize::try_from(raw)
            .map_err(|_| RunError::invalid(len_at, format!("length {raw} exceeds address space")))?;
        Ok((data, len))
    }

    pub fn read_str(&self, addr: Addr) -> Result<&str, RunError> {
        let (data, len) = self.read_header(addr)?;
        if len == 0 {
            return Ok("");
        }
        if data.is_null() {
            return Err(RunError::invalid(addr, format!("null data with length {len}")));
        }
        std::str::from_utf8(self.bytes(data, len)?)
            .map_err(|err| RunError::invalid(data, format!("invalid UTF-8: {err}")))
    }

    // --- writes ------------------------------------------------------------

    fn slot_mut(&mut self, addr: Addr, len: usize) -> Result<&mut [u8], LayoutError> {
        let start = addr.get();
        if start < NULL_GUARD {
            return Err(LayoutError::OutOfBounds { addr, len });
        }
        start
            .checked_add(len)
            .and_then(|end| self.bytes.get_mut(start..end))
            .ok_or(LayoutError::OutOfBounds { addr, len })
    }

    pub fn write_bytes(&mut self, addr: Addr, data: &[u8]) -> Result<(), LayoutError> {
        self.slot_mut(addr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    pub fn write_u8(&mut self, addr: Addr, v: u8) -> Result<(), LayoutError> {
        self.slot_mut(addr, 1)?[0] = v;
        Ok(())
    }

    pub fn write_u16(&mut self, addr: Addr, v: u16) -> Result<(), LayoutError> {
        LittleEndian::write_u16(self.slot_mut(addr, 2)?, v);
        Ok(())
    }

    pub fn write_u32(&mut self, addr: Addr, v: u32) -> Result<(), LayoutError> {
        LittleEndian::write_u32(self.slot_mut(addr, 4)?, v);
        Ok(())
    }

    pub fn write_u64(&mut self, addr: Addr, v: u64) -> Result<(), LayoutError> {
        LittleEndian::write_u64(self.slot_mut(addr, 8)?, v);
        Ok(())
    }

    pub fn write_f32(&mut self, addr: Addr, v: f32) -> Result<(), LayoutError> {
        LittleEndian::write_f32(self.slot_mut(addr, 4)?, v);
        Ok(())
    }

    pub fn write_f64(&mut self, addr: Addr, v: f64) -> Result<(), LayoutError> {
        LittleEndian::write_f64(self.slot_mut(addr, 8)?, v);
        Ok(())
    }

    pub fn write_addr(&mut self, addr: Addr, target: Addr) -> Result<(), LayoutError> {
        self.write_u64(addr, target.get() as u64)
    }

    /// Write a `(data, len)` header at `addr`
    pub fn write_header(&mut self, addr: Addr, data: Addr, len: usize) -> Result<(), LayoutError> {
        self.write_addr(addr, data)?;
        let len_at = addr
            .offset(POINTER_SIZE)
            .ok_or(LayoutError::OutOfBounds { addr, len: 16 })?;
        self.write_u64(len_at, len as u64)
    }

    /// Copy `s` into the heap and write its header at `addr`
    pub fn write_str(&mut self, addr: Addr, s: &str) -> Result<(), LayoutError> {
        if s.is_empty() {
            return self.write_header(addr, Addr::NULL, 0);
        }
        let data = self.alloc_bytes(s.as_bytes());
        self.write_header(addr, data, s.len())
    }

    // --- placement ---------------------------------------------------------

    /// Lay out `value` as `shape` and return the root address
    pub fn place(&mut self, shape: &Shape, value: &Value) -> Result<Addr, LayoutError> {
        self.place_in(&ShapeRegistry::new(), shape, value)
    }

    /// Like [`Heap::place`], resolving late-bound names through `registry`
    pub fn place_in(
        &mut self,
        registry: &ShapeRegistry,
        shape: &Shape,
        value: &Value,
    ) -> Result<Addr, LayoutError> {
        let (size, align) = layout_of(registry, shape)?;
        let addr = self.alloc(size, align);
        self.store(registry, shape, addr, value)?;
        Ok(addr)
    }

    fn store(
        &mut self,
        registry: &ShapeRegistry,
        shape: &Shape,
        addr: Addr,
        value: &Value,
    ) -> Result<(), LayoutError> {
        match (shape, value) {
            (Shape::Named(name), _) => {
                let resolved = resolve(registry, name)?;
                self.store(registry, resolved, addr, value)
            }
            (Shape::Primitive(p), _) => self.store_primitive(*p, shape, addr, value),
            (Shape::Pointer(_), Value::Null) => self.write_addr(addr, Addr::NULL),
            (Shape::Pointer(to), _) => {
                let pointee = match value {
                    Value::Ref(inner) => inner.as_ref(),
                    other => other,
                };
                let target = self.place_in(registry, to, pointee)?;
                self.write_addr(addr, target)
            }
            (Shape::Sequence(_), Value::Null) => self.write_header(addr, Addr::NULL, 0),
            (Shape::Sequence(elem), Value::List(items)) => {
                let (stride, align) = layout_of(registry, elem)?;
                let total = stride
                    .checked_mul(items.len())
                    .ok_or_else(|| out_of_range(shape, items.len()))?;
                let data = self.alloc(total, align);
                for (i, item) in items.iter().enumerate() {
                    self.store(registry, elem, Addr::new(data.get() + i * stride), item)?;
                }
                self.write_header(addr, data, items.len())
            }
            (Shape::Record(record), Value::Record(values)) => {
                if values.len() != record.fields().len() {
                    return Err(LayoutError::FieldCount {
                        shape: shape.to_string(),
                        expected: record.fields().len(),
                        actual: values.len(),
                    });
                }
                for (field, value) in record.fields().iter().zip(values) {
                    let at = Addr::new(addr.get() + field.offset());
                    self.store(registry, field.shape(), at, value)?;
                }
                Ok(())
            }
            (Shape::Map { .. } | Shape::Opaque { .. }, _) => Err(LayoutError::Unsupported {
                shape: shape.to_string(),
            }),
            _ => Err(mismatch(shape, value)),
        }
    }

    fn store_primitive(
        &mut self,
        p: Primitive,
        shape: &Shape,
        addr: Addr,
        value: &Value,
    ) -> Result<(), LayoutError> {
        match p {
            Primitive::Int | Primitive::Int64 => {
                self.write_u64(addr, signed(shape, value)? as u64)
            }
            Primitive::Int8 => self.write_u8(addr, fit::<i8, _>(shape, signed(shape, value)?)? as u8),
            Primitive::Int16 => {
                self.write_u16(addr, fit::<i16, _>(shape, signed(shape, value)?)? as u16)
            }
            Primitive::Int32 => {
                self.write_u32(addr, fit::<i32, _>(shape, signed(shape, value)?)? as u32)
            }
            Primitive::Uint | Primitive::Uint64 => self.write_u64(addr, unsigned(shape, value)?),
            Primitive::Uint8 => self.write_u8(addr, fit(shape, unsigned(shape, value)?)?),
            Primitive::Uint16 => self.write_u16(addr, fit(shape, unsigned(shape, value)?)?),
            Primitive::Uint32 => self.write_u32(addr, fit(shape, unsigned(shape, value)?)?),
            Primitive::Float32 => {
                let x = float(shape, value)?;
                let narrow = x as f32;
                if x.is_finite() && !narrow.is_finite() {
                    return Err(out_of_range(shape, x));
                }
                self.write_f32(addr, narrow)
            }
            Primitive::Float64 => self.write_f64(addr, float(shape, value)?),
            Primitive::String => match value {
                Value::Str(s) => self.write_str(addr, s),
                other => Err(mismatch(shape, other)),
            },
            Primitive::Bool => match value {
                Value::Bool(b) => self.write_u8(addr, u8::from(*b)),
                other => Err(mismatch(shape, other)),
            },
        }
    }
}

/// Checked `addr + bytes`
pub(crate) fn offset(addr: Addr, bytes: usize) -> Result<Addr, RunError> {
    addr.offset(bytes)
        .ok_or(RunError::OutOfBounds { addr, len: bytes })
}

fn resolve<'r>(registry: &'r ShapeRegistry, name: &str) -> Result<&'r Shape, LayoutError> {
    registry
        .resolve(name)
        .map(|shape| shape.as_ref())
        .ok_or_else(|| LayoutError::Unresolved {
            name: name.to_string(),
        })
}

fn layout_of(registry: &ShapeRegistry, shape: &Shape) -> Result<(usize, usize), LayoutError> {
    let shape = match shape {
        Shape::Named(name) => resolve(registry, name)?,
        other => other,
    };
    match (shape.size(), shape.align()) {
        (Some(size), Some(align)) => Ok((size, align)),
        _ => Err(LayoutError::Unsupported {
            shape: shape.to_string(),
        }),
    }
}

fn mismatch(shape: &Shape, value: &Value) -> LayoutError {
    LayoutError::Mismatch {
        shape: shape.to_string(),
        value: value.kind_name(),
    }
}

fn out_of_range(shape: &Shape, value: impl Display) -> LayoutError {
    LayoutError::OutOfRange {
        shape: shape.to_string(),
        value: value.to_string(),
    }
}

fn fit<T, U>(shape: &Shape, n: U) -> Result<T, LayoutError>
where
    T: TryFrom<U>,
    U: Copy + Display,
{
    T::try_from(n).map_err(|_| out_of_range(shape, n))
}

fn signed(shape: &Shape, value: &Value) -> Result<i64, LayoutError> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Uint(n) => fit(shape, *n),
        other => Err(mismatch(shape, other)),
    }
}

fn unsigned(shape: &Shape, value: &Value) -> Result<u64, LayoutError> {
    match value {
        Value::Uint(n) => Ok(*n),
        Value::Int(n) => fit(shape, *n),
        other => Err(mismatch(shape, other)),
    }
}

fn float(shape: &Shape, value: &Value) -> Result<f64, LayoutError> {
    match value {
        Value::Float(x) => Ok(*x),
        Value::Int(n) => {
            let x = *n as f64;
            // 2^63 saturates back to i64::MAX
            if x >= i64::MAX as f64 || x as i64 != *n {
                return Err(out_of_range(shape, n));
            }
            Ok(x)
        }
        other => Err(mismatch(shape, other)),
    }
}
