//! Code generation context and compilation logic
//!
//! This module turns a shape description into a linked instruction chain.
//! Every subtree is compiled front to back into its own sequence ending at
//! the shared terminal, then spliced onto whatever follows it by relinking
//! its last instruction.

use ahash::AHashMap;
use shapecode_bytecode::core::{Chain, ChainBuilder, ChainView, FastPath, FieldKey, Opcode};
use shapecode_bytecode::types::{OpId, RecordShape, Shape, ShapeRegistry};
use std::sync::Arc;
use tracing::trace;

use crate::error::CompileError;
use crate::CompilerConfig;

type Result<T> = std::result::Result<T, CompileError>;

/// Compilation context for generating one chain
pub struct CodegenContext<'a> {
    registry: &'a ShapeRegistry,
    config: &'a CompilerConfig,

    /// The arena being filled
    builder: ChainBuilder,

    /// Late-bound names currently being inlined
    in_progress: Vec<Arc<str>>,

    /// RECURSIVE instructions waiting for their subroutine head
    pending_calls: Vec<(OpId, Arc<str>)>,

    /// Current shape nesting
    depth: usize,
}

impl<'a> CodegenContext<'a> {
    pub fn new(registry: &'a ShapeRegistry, config: &'a CompilerConfig) -> Self {
        Self {
            registry,
            config,
            builder: ChainBuilder::new(),
            in_progress: Vec::new(),
            pending_calls: Vec::new(),
            depth: 0,
        }
    }

    /// Compile `shape` and every subroutine it needs into one chain
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A map or opaque shape is reachable
    /// - A late-bound name is not registered or has no static size
    /// - Nesting exceeds the configured depth
    pub fn compile_root(mut self, shape: &Arc<Shape>) -> Result<Chain> {
        let head = self.compile_shape(shape)?;
        self.compile_subroutines()?;
        Ok(self.builder.finish(head))
    }

    fn compile_shape(&mut self, shape: &Arc<Shape>) -> Result<OpId> {
        if self.depth >= self.config.max_depth {
            return Err(CompileError::TooDeep {
                limit: self.config.max_depth,
            });
        }
        self.depth += 1;
        let result = match shape.as_ref() {
            Shape::Primitive(p) => {
                let term = self.builder.new_terminal();
                Ok(self
                    .builder
                    .new_instruction(p.opcode(), Some(shape.clone()), term))
            }
            Shape::Pointer(pointee) => self.compile_pointer(shape, pointee),
            Shape::Sequence(elem) => self.compile_sequence(shape, elem),
            Shape::Record(record) => self.compile_record(shape, record, false),
            Shape::Named(name) => self.compile_named(shape, name),
            Shape::Map { .. } | Shape::Opaque { .. } => Err(CompileError::UnsupportedShape {
                kind: shape.kind_name(),
                shape: shape.to_string(),
            }),
        };
        self.depth -= 1;
        result
    }

    fn compile_pointer(&mut self, shape: &Arc<Shape>, pointee: &Arc<Shape>) -> Result<OpId> {
        match pointee.as_ref() {
            // Records fold the dereference into their head
            Shape::Record(record) => self.compile_record(pointee, record, true),
            Shape::Named(name) if !self.is_in_progress(name) => {
                let resolved = self.resolve(name)?;
                match resolved.as_ref() {
                    Shape::Record(record) => {
                        self.in_progress.push(name.clone());
                        let head = self.compile_record(&resolved, record, true);
                        self.in_progress.pop();
                        head
                    }
                    _ => self.compile_indirection(shape, pointee),
                }
            }
            _ => self.compile_indirection(shape, pointee),
        }
    }

    fn compile_indirection(&mut self, shape: &Arc<Shape>, pointee: &Arc<Shape>) -> Result<OpId> {
        let term = self.builder.new_terminal();
        let ptr = self
            .builder
            .new_instruction(Opcode::PTR, Some(shape.clone()), term);
        let target = self.compile_shape(pointee)?;
        self.builder.link(ptr, target);
        Ok(ptr)
    }

    fn compile_sequence(&mut self, shape: &Arc<Shape>, elem: &Arc<Shape>) -> Result<OpId> {
        let stride = elem
            .size_in(self.registry)
            .ok_or_else(|| CompileError::MissingLayout {
                shape: elem.to_string(),
            })?;

        let head = self.builder.new_slice_head(Some(shape.clone()));
        let body = self.compile_shape(elem)?;
        let elem_op = self.builder.new_slice_elem(Some(shape.clone()), stride);
        let term = self.builder.new_terminal();
        let end = self
            .builder
            .new_instruction(Opcode::SLICE_END, Some(shape.clone()), term);

        let last = self.builder.last_before_terminal(body);
        self.builder.link(last, elem_op);
        self.builder.link(elem_op, body);
        self.builder.link(head, body);
        self.builder.set_slice_head(head, elem_op, end);
        self.builder.set_slice_elem(elem_op, body, end);
        Ok(head)
    }

    fn compile_record(
        &mut self,
        shape: &Arc<Shape>,
        record: &RecordShape,
        via_pointer: bool,
    ) -> Result<OpId> {
        let term = self.builder.new_terminal();

        if record.fields().is_empty() {
            let head = self.builder.new_struct_field(
                Opcode::record_head(via_pointer, FastPath::None),
                Some(shape.clone()),
                None,
                0,
            );
            let end = self
                .builder
                .new_instruction(Opcode::STRUCT_END, Some(shape.clone()), term);
            self.builder.link(head, end);
            self.builder.set_struct_field(head, end, end);
            return Ok(head);
        }

        // (field instruction, compiled value chain for non-inline fields)
        let mut fields: Vec<(OpId, Option<OpId>)> = Vec::with_capacity(record.fields().len());
        for (i, field) in record.fields().iter().enumerate() {
            let fast = self.fast_path(field.shape());
            let opcode = if i == 0 {
                Opcode::record_head(via_pointer, fast)
            } else {
                Opcode::record_field(fast)
            };
            let id = self.builder.new_struct_field(
                opcode,
                Some(shape.clone()),
                Some(FieldKey::new(field.name().clone())),
                field.offset(),
            );
            let value = match fast {
                FastPath::None => Some(self.compile_shape(field.shape())?),
                FastPath::Int | FastPath::String => None,
            };
            fields.push((id, value));
        }
        let end = self
            .builder
            .new_instruction(Opcode::STRUCT_END, Some(shape.clone()), term);

        for (i, &(id, value)) in fields.iter().enumerate() {
            let next_field = fields.get(i + 1).map_or(end, |&(next, _)| next);
            self.builder.set_struct_field(id, next_field, end);
            match value {
                Some(value) => {
                    self.builder.link(id, value);
                    let last = self.builder.last_before_terminal(value);
                    self.builder.link(last, next_field);
                }
                None => self.builder.link(id, next_field),
            }
        }
        Ok(fields[0].0)
    }

    fn compile_named(&mut self, shape: &Arc<Shape>, name: &Arc<str>) -> Result<OpId> {
        if self.is_in_progress(name) {
            let call = self.builder.new_recursive(Some(shape.clone()), name.clone());
            self.pending_calls.push((call, name.clone()));
            trace!(name = %name, "recursive reference");
            return Ok(call);
        }

        let resolved = self.resolve(name)?;
        self.in_progress.push(name.clone());
        let head = self.compile_shape(&resolved);
        self.in_progress.pop();
        head
    }

    /// Compile one subroutine per late-bound name referenced recursively
    fn compile_subroutines(&mut self) -> Result<()> {
        let mut heads: AHashMap<Arc<str>, OpId> = AHashMap::new();

        while let Some((call, name)) = self.pending_calls.pop() {
            let target = match heads.get(&name) {
                Some(&head) => head,
                None => {
                    let resolved = self.resolve(&name)?;
                    self.in_progress.push(name.clone());
                    let head = self.compile_shape(&resolved);
                    self.in_progress.pop();
                    let head = head?;

                    self.builder.add_subroutine(name.clone(), head);
                    heads.insert(name.clone(), head);
                    head
                }
            };
            self.builder.set_recursive_target(call, target);
        }
        Ok(())
    }

    fn fast_path(&self, shape: &Shape) -> FastPath {
        match shape {
            Shape::Primitive(p) if self.config.fast_paths => p.fast_path(),
            _ => FastPath::None,
        }
    }

    fn is_in_progress(&self, name: &str) -> bool {
        self.in_progress.iter().any(|n| n.as_ref() == name)
    }

    fn resolve(&self, name: &str) -> Result<Arc<Shape>> {
        self.registry
            .resolve(name)
            .cloned()
            .ok_or_else(|| CompileError::UnresolvedShape {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shapecode_bytecode::types::Primitive;

    fn compile(shape: &Arc<Shape>) -> Chain {
        let registry = ShapeRegistry::new();
        let config = CompilerConfig::default();
        CodegenContext::new(&registry, &config)
            .compile_root(shape)
            .unwrap()
    }

    #[test]
    fn test_primitive_is_one_instruction() {
        let chain = compile(&Shape::primitive(Primitive::Uint16));
        assert_eq!(chain.dump_main(), "UINT16");
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_pointer_to_primitive() {
        let chain = compile(&Shape::pointer(Shape::bool()));
        assert_eq!(chain.dump_main(), "PTR\nBOOL");
    }

    #[test]
    fn test_sequence_links_loop() {
        let chain = compile(&Shape::sequence(Shape::string()));
        let head = chain.get(chain.head()).as_slice_head().unwrap();
        let elem = chain.get(head.elem).as_slice_elem().unwrap();

        assert_eq!(elem.size, 16);
        assert_eq!(elem.first, chain.get(chain.head()).next().unwrap());
        assert_eq!(elem.header().next(), Some(elem.first));
        assert_eq!(elem.end, head.end);
        assert_eq!(chain.get(head.end).opcode(), Opcode::SLICE_END);
        // body loops back into the element instruction
        assert_eq!(chain.get(elem.first).next(), Some(head.elem));
    }

    #[test]
    fn test_record_field_offsets() {
        let shape = RecordShape::builder("R")
            .field("flag", Shape::bool())
            .field("n", Shape::int())
            .build()
            .unwrap();
        let chain = compile(&shape);

        let offsets: Vec<_> = chain
            .walk(chain.head())
            .filter_map(|id| chain.get(id).as_struct_field())
            .map(|f| (f.key.as_ref().unwrap().name().to_string(), f.offset))
            .collect();
        assert_eq!(offsets, vec![("flag".to_string(), 0), ("n".to_string(), 8)]);
    }

    #[test]
    fn test_depth_limit() {
        let mut shape = Shape::int();
        for _ in 0..10 {
            shape = Shape::pointer(shape);
        }
        let registry = ShapeRegistry::new();
        let config = CompilerConfig::default().max_depth(5);
        let err = CodegenContext::new(&registry, &config)
            .compile_root(&shape)
            .unwrap_err();
        assert_eq!(err, CompileError::TooDeep { limit: 5 });
    }
}
