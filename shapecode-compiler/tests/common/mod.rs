use anyhow::Result;
use shapecode_bytecode::core::Chain;
use shapecode_bytecode::types::{RecordShape, Shape, ShapeRegistry};
use shapecode_compiler::{Compiler, CompilerConfig};
use std::sync::Arc;

/// Compile `shape` with an empty registry and return its main dump
#[allow(dead_code)]
pub fn dump_of(shape: &Arc<Shape>) -> Result<String> {
    Ok(Compiler::new().compile(shape)?.dump_main())
}

/// Compile `shape` with fast paths toggled
#[allow(dead_code)]
pub fn compile_with(shape: &Arc<Shape>, fast_paths: bool) -> Result<Chain> {
    let compiler = Compiler::new().config(CompilerConfig::default().fast_paths(fast_paths));
    Ok(compiler.compile(shape)?)
}

/// `{a: int, b: []string}`
#[allow(dead_code)]
pub fn sample_record() -> Result<Arc<Shape>> {
    Ok(RecordShape::builder("Sample")
        .field("a", Shape::int())
        .field("b", Shape::sequence(Shape::string()))
        .build()?)
}

/// Registry with a singly linked `Node` and a `Tree` with child sequences
#[allow(dead_code)]
pub fn recursive_registry() -> Result<ShapeRegistry> {
    let mut registry = ShapeRegistry::new();
    registry.register(
        "Node",
        RecordShape::builder("Node")
            .field("value", Shape::int())
            .field("next", Shape::pointer(Shape::named("Node")))
            .build()?,
    );
    registry.register(
        "Tree",
        RecordShape::builder("Tree")
            .field("label", Shape::string())
            .field("children", Shape::sequence(Shape::named("Tree")))
            .build()?,
    );
    Ok(registry)
}
