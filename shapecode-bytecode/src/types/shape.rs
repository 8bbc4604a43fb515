//! Shape descriptions consumed by the compiler
//!
//! A shape is the static structure of a value: a primitive, a pointer to
//! another shape, a sequence of another shape, or a record with named fields
//! at fixed byte offsets. Layouts are little-endian and C-like:
//!
//! - pointers are 8-byte addresses, zero meaning null
//! - strings and sequences are a 16-byte `(data address, length)` header
//! - record fields are placed at their declared offsets

use ahash::AHashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::opcodes::{FastPath, Opcode};
use crate::error::{BytecodeError, Result};

pub const POINTER_SIZE: usize = 8;
pub const STRING_HEADER_SIZE: usize = 16;
pub const SEQUENCE_HEADER_SIZE: usize = 16;
pub const MAP_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    Bool,
}

impl Primitive {
    pub fn size(&self) -> usize {
        match self {
            Primitive::Int
            | Primitive::Int64
            | Primitive::Uint
            | Primitive::Uint64
            | Primitive::Float64 => 8,
            Primitive::Int32 | Primitive::Uint32 | Primitive::Float32 => 4,
            Primitive::Int16 | Primitive::Uint16 => 2,
            Primitive::Int8 | Primitive::Uint8 | Primitive::Bool => 1,
            Primitive::String => STRING_HEADER_SIZE,
        }
    }

    pub fn align(&self) -> usize {
        match self {
            Primitive::String => 8,
            other => other.size(),
        }
    }

    /// Emit instruction for this primitive
    pub fn opcode(&self) -> Opcode {
        match self {
            Primitive::Int => Opcode::INT,
            Primitive::Int8 => Opcode::INT8,
            Primitive::Int16 => Opcode::INT16,
            Primitive::Int32 => Opcode::INT32,
            Primitive::Int64 => Opcode::INT64,
            Primitive::Uint => Opcode::UINT,
            Primitive::Uint8 => Opcode::UINT8,
            Primitive::Uint16 => Opcode::UINT16,
            Primitive::Uint32 => Opcode::UINT32,
            Primitive::Uint64 => Opcode::UINT64,
            Primitive::Float32 => Opcode::FLOAT32,
            Primitive::Float64 => Opcode::FLOAT64,
            Primitive::String => Opcode::STRING,
            Primitive::Bool => Opcode::BOOL,
        }
    }

    /// Inline record encoding available for fields of this primitive
    pub fn fast_path(&self) -> FastPath {
        match self {
            Primitive::Int => FastPath::Int,
            Primitive::String => FastPath::String,
            _ => FastPath::None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Int8 => "int8",
            Primitive::Int16 => "int16",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Uint => "uint",
            Primitive::Uint8 => "uint8",
            Primitive::Uint16 => "uint16",
            Primitive::Uint32 => "uint32",
            Primitive::Uint64 => "uint64",
            Primitive::Float32 => "float32",
            Primitive::Float64 => "float64",
            Primitive::String => "string",
            Primitive::Bool => "bool",
        }
    }
}

/// Static structure of a value
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Primitive(Primitive),
    Pointer(Arc<Shape>),
    Sequence(Arc<Shape>),
    Record(RecordShape),
    /// Late-bound reference resolved through a [`ShapeRegistry`]
    Named(Arc<str>),
    /// Describable, but has no encode instructions
    Map { key: Arc<Shape>, value: Arc<Shape> },
    /// Describable, but has no encode instructions
    Opaque { name: Arc<str>, size: usize },
}

impl Shape {
    pub fn primitive(p: Primitive) -> Arc<Shape> {
        Arc::new(Shape::Primitive(p))
    }

    pub fn int() -> Arc<Shape> {
        Self::primitive(Primitive::Int)
    }

    pub fn string() -> Arc<Shape> {
        Self::primitive(Primitive::String)
    }

    pub fn bool() -> Arc<Shape> {
        Self::primitive(Primitive::Bool)
    }

    pub fn pointer(to: Arc<Shape>) -> Arc<Shape> {
        Arc::new(Shape::Pointer(to))
    }

    pub fn sequence(of: Arc<Shape>) -> Arc<Shape> {
        Arc::new(Shape::Sequence(of))
    }

    pub fn named(name: impl Into<Arc<str>>) -> Arc<Shape> {
        Arc::new(Shape::Named(name.into()))
    }

    pub fn map(key: Arc<Shape>, value: Arc<Shape>) -> Arc<Shape> {
        Arc::new(Shape::Map { key, value })
    }

    pub fn opaque(name: impl Into<Arc<str>>, size: usize) -> Arc<Shape> {
        Arc::new(Shape::Opaque {
            name: name.into(),
            size,
        })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Primitive(_) => "primitive",
            Shape::Pointer(_) => "pointer",
            Shape::Sequence(_) => "sequence",
            Shape::Record(_) => "record",
            Shape::Named(_) => "named",
            Shape::Map { .. } => "map",
            Shape::Opaque { .. } => "opaque",
        }
    }

    /// Size in bytes, `None` for late-bound shapes
    pub fn size(&self) -> Option<usize> {
        match self {
            Shape::Primitive(p) => Some(p.size()),
            Shape::Pointer(_) => Some(POINTER_SIZE),
            Shape::Sequence(_) => Some(SEQUENCE_HEADER_SIZE),
            Shape::Record(r) => Some(r.size()),
            Shape::Named(_) => None,
            Shape::Map { .. } => Some(MAP_SIZE),
            Shape::Opaque { size, .. } => Some(*size),
        }
    }

    pub fn align(&self) -> Option<usize> {
        match self {
            Shape::Primitive(p) => Some(p.align()),
            Shape::Record(r) => Some(r.align()),
            Shape::Named(_) => None,
            Shape::Opaque { .. } => Some(1),
            Shape::Pointer(_) | Shape::Sequence(_) | Shape::Map { .. } => Some(8),
        }
    }

    /// Size in bytes, resolving late-bound names through `registry`
    pub fn size_in(&self, registry: &ShapeRegistry) -> Option<usize> {
        match self {
            Shape::Named(name) => registry.resolve(name)?.size(),
            other => other.size(),
        }
    }

    pub fn as_record(&self) -> Option<&RecordShape> {
        match self {
            Shape::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Primitive(p) => f.write_str(p.name()),
            Shape::Pointer(to) => write!(f, "*{to}"),
            Shape::Sequence(of) => write!(f, "[]{of}"),
            Shape::Record(r) => f.write_str(r.name()),
            Shape::Named(name) => f.write_str(name),
            Shape::Map { key, value } => write!(f, "map[{key}]{value}"),
            Shape::Opaque { name, .. } => write!(f, "opaque {name}"),
        }
    }
}

/// One field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldShape {
    name: Arc<str>,
    offset: usize,
    shape: Arc<Shape>,
}

impl FieldShape {
    pub fn new(name: impl Into<Arc<str>>, offset: usize, shape: Arc<Shape>) -> Self {
        Self {
            name: name.into(),
            offset,
            shape,
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }
}

/// Record with named fields at fixed offsets, in declared order
#[derive(Debug, Clone, PartialEq)]
pub struct RecordShape {
    name: Arc<str>,
    fields: Vec<FieldShape>,
    size: usize,
    align: usize,
}

impl RecordShape {
    /// Record with an explicit layout
    ///
    /// Every field must have a static size, fit inside `size`, and have a
    /// unique name.
    pub fn new(name: impl Into<Arc<str>>, size: usize, fields: Vec<FieldShape>) -> Result<Self> {
        let name = name.into();
        let layout_err = |message: String| BytecodeError::Layout {
            record: name.to_string(),
            message,
        };

        let mut align = 1;
        for (i, field) in fields.iter().enumerate() {
            let field_size = field.shape.size().ok_or_else(|| {
                layout_err(format!(
                    "field `{}` has late-bound shape `{}` with no static layout; use a pointer",
                    field.name, field.shape
                ))
            })?;
            let fits = matches!(field.offset.checked_add(field_size), Some(end) if end <= size);
            if !fits {
                return Err(layout_err(format!(
                    "field `{}` at offset {} (size {}) overflows record size {}",
                    field.name, field.offset, field_size, size
                )));
            }
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(layout_err(format!("duplicate field `{}`", field.name)));
            }
            align = align.max(field.shape.align().unwrap_or(1));
        }

        Ok(Self {
            name,
            fields,
            size,
            align,
        })
    }

    /// Builder computing a C-like layout from field order
    pub fn builder(name: impl Into<Arc<str>>) -> RecordBuilder {
        RecordBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldShape] {
        &self.fields
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn align(&self) -> usize {
        self.align
    }
}

pub struct RecordBuilder {
    name: Arc<str>,
    fields: Vec<(Arc<str>, Arc<Shape>)>,
}

impl RecordBuilder {
    pub fn field(mut self, name: impl Into<Arc<str>>, shape: Arc<Shape>) -> Self {
        self.fields.push((name.into(), shape));
        self
    }

    pub fn build(self) -> Result<Arc<Shape>> {
        let mut offset = 0usize;
        let mut align = 1usize;
        let mut fields = Vec::with_capacity(self.fields.len());

        for (name, shape) in self.fields {
            let (Some(size), Some(field_align)) = (shape.size(), shape.align()) else {
                return Err(BytecodeError::Layout {
                    record: self.name.to_string(),
                    message: format!(
                        "field `{name}` has late-bound shape `{shape}` with no static layout; use a pointer"
                    ),
                });
            };
            offset = offset.next_multiple_of(field_align);
            fields.push(FieldShape::new(name, offset, shape));
            offset += size;
            align = align.max(field_align);
        }

        let size = offset.next_multiple_of(align);
        Ok(Arc::new(Shape::Record(RecordShape::new(
            self.name, size, fields,
        )?)))
    }
}

/// Named shapes available for late binding
#[derive(Debug, Clone, Default)]
pub struct ShapeRegistry {
    shapes: AHashMap<Arc<str>, Arc<Shape>>,
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `shape` under `name`, returning the shape it replaces
    pub fn register(&mut self, name: impl Into<Arc<str>>, shape: Arc<Shape>) -> Option<Arc<Shape>> {
        self.shapes.insert(name.into(), shape)
    }

    /// Resolve `name`, following aliases that are themselves named
    pub fn resolve(&self, name: &str) -> Option<&Arc<Shape>> {
        let mut current = self.shapes.get(name)?;
        for _ in 0..self.shapes.len() {
            match current.as_ref() {
                Shape::Named(next) => current = self.shapes.get(next.as_ref())?,
                _ => return Some(current),
            }
        }
        // alias cycle
        None
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_layout() {
        let shape = RecordShape::builder("Mixed")
            .field("flag", Shape::bool())
            .field("count", Shape::int())
            .field("small", Shape::primitive(Primitive::Int16))
            .build()
            .unwrap();
        let record = shape.as_record().unwrap();

        let offsets: Vec<_> = record.fields().iter().map(|f| f.offset()).collect();
        assert_eq!(offsets, vec![0, 8, 16]);
        assert_eq!(record.size(), 24);
        assert_eq!(record.align(), 8);
    }

    #[test]
    fn test_builder_rejects_late_bound_field() {
        let err = RecordShape::builder("Node")
            .field("next", Shape::named("Node"))
            .build()
            .unwrap_err();
        assert!(matches!(err, BytecodeError::Layout { .. }));

        // behind a pointer it is fine
        assert!(RecordShape::builder("Node")
            .field("next", Shape::pointer(Shape::named("Node")))
            .build()
            .is_ok());
    }

    #[test]
    fn test_explicit_layout_validation() {
        let overflow = RecordShape::new("R", 4, vec![FieldShape::new("a", 0, Shape::int())]);
        assert!(overflow.is_err());

        let dup = RecordShape::new(
            "R",
            16,
            vec![
                FieldShape::new("a", 0, Shape::int()),
                FieldShape::new("a", 8, Shape::int()),
            ],
        );
        assert!(dup.is_err());
    }

    #[test]
    fn test_registry_resolves_aliases() {
        let mut registry = ShapeRegistry::new();
        registry.register("Id", Shape::int());
        registry.register("UserId", Shape::named("Id"));
        registry.register("Loop", Shape::named("Loop"));

        assert_eq!(registry.resolve("UserId"), Some(&Shape::int()));
        assert_eq!(registry.resolve("Loop"), None);
        assert_eq!(registry.resolve("Missing"), None);
        assert_eq!(Shape::named("UserId").size_in(&registry), Some(8));
    }

    #[test]
    fn test_display() {
        let shape = Shape::sequence(Shape::pointer(Shape::string()));
        assert_eq!(shape.to_string(), "[]*string");
        assert_eq!(Shape::map(Shape::string(), Shape::int()).to_string(), "map[string]int");
    }
}
