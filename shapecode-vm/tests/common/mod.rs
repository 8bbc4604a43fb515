use anyhow::Result;
use shapecode_bytecode::core::Chain;
use shapecode_bytecode::types::{RecordShape, Shape, ShapeRegistry};
use shapecode_compiler::{Compiler, CompilerConfig};
use shapecode_vm::{Heap, Runner, Value};
use std::sync::Arc;

/// Compile `shape`, lay out `value` and encode it with default limits
#[allow(dead_code)]
pub fn encode(shape: &Arc<Shape>, value: &Value) -> Result<String> {
    encode_in(&ShapeRegistry::new(), shape, value)
}

/// Like [`encode`], resolving late-bound names through `registry`
#[allow(dead_code)]
pub fn encode_in(registry: &ShapeRegistry, shape: &Arc<Shape>, value: &Value) -> Result<String> {
    let chain = Compiler::with_registry(registry.clone()).compile(shape)?;
    let mut heap = Heap::new();
    let root = heap.place_in(registry, shape, value)?;
    let out = Runner::new().encode(&chain, &heap, root)?;
    Ok(String::from_utf8(out)?)
}

/// Compile with fast paths toggled
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

#[allow(dead_code)]
pub fn sample_value(a: i64, b: &[&str]) -> Value {
    Value::record([Value::Int(a), Value::list(b.iter().map(|s| Value::str(*s)))])
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

/// Linked list value `1 -> 2 -> ... -> n`
#[allow(dead_code)]
pub fn linked_list(n: i64) -> Value {
    (1..=n)
        .rev()
        .fold(Value::Null, |next, value| Value::record([Value::Int(value), next]))
}
