//! Tests for:
//! - Shapes without instruction mappings
//! - Unresolved and layout-less late-bound names
//! - Failures staying local to the offending shape

mod common;

use anyhow::Result;
use common::*;
use rstest::rstest;
use shapecode_bytecode::types::{RecordShape, Shape, ShapeRegistry};
use shapecode_compiler::{CompileError, Compiler, CompilerConfig};
use std::sync::Arc;

fn handle_record() -> Arc<Shape> {
    RecordShape::builder("Conn")
        .field("id", Shape::int())
        .field("fd", Shape::opaque("Handle", 8))
        .build()
        .unwrap()
}

#[rstest]
#[case::map(
    Shape::map(Shape::string(), Shape::int()),
    CompileError::UnsupportedShape { kind: "map", shape: "map[string]int".into() }
)]
#[case::nested_opaque(
    Shape::sequence(handle_record()),
    CompileError::UnsupportedShape { kind: "opaque", shape: "opaque Handle".into() }
)]
#[case::unresolved(
    Shape::pointer(Shape::named("Missing")),
    CompileError::UnresolvedShape { name: "Missing".into() }
)]
#[case::no_layout(
    Shape::sequence(Shape::named("Missing")),
    CompileError::MissingLayout { shape: "Missing".into() }
)]
fn test_rejected_shapes(#[case] shape: Arc<Shape>, #[case] expected: CompileError) {
    let err = Compiler::new().compile(&shape).unwrap_err();
    assert_eq!(err, expected);
}

#[test]
fn test_alias_cycle_is_unresolved() {
    let mut registry = ShapeRegistry::new();
    registry.register("A", Shape::named("B"));
    registry.register("B", Shape::named("A"));

    let err = Compiler::with_registry(registry)
        .compile(&Shape::named("A"))
        .unwrap_err();
    assert_eq!(err, CompileError::UnresolvedShape { name: "A".into() });
}

#[test]
fn test_depth_limit() {
    let mut shape = Shape::int();
    for _ in 0..8 {
        shape = Shape::sequence(shape);
    }
    let compiler = Compiler::new().config(CompilerConfig::default().max_depth(4));
    assert_eq!(
        compiler.compile(&shape).unwrap_err(),
        CompileError::TooDeep { limit: 4 }
    );
}

#[test]
fn test_failure_does_not_affect_other_shapes() -> Result<()> {
    let compiler = Compiler::new();
    assert!(compiler.compile(&handle_record()).is_err());
    assert_eq!(
        compiler.compile(&sample_record()?)?.dump_main().lines().count(),
        7
    );
    Ok(())
}

#[test]
fn test_error_messages() {
    let err = CompileError::UnsupportedShape {
        kind: "map",
        shape: "map[string]int".into(),
    };
    assert_eq!(
        err.to_string(),
        "Unsupported shape: map `map[string]int` has no encode instructions"
    );
    assert_eq!(
        CompileError::TooDeep { limit: 3 }.to_string(),
        "Shape nesting exceeds 3 levels"
    );
}
