use shapecode_bytecode::core::Chain;
use shapecode_bytecode::types::{Addr, RecordShape, Shape, ShapeRegistry};
use shapecode_compiler::Compiler;
use shapecode_vm::{Heap, Runner, Value};
use std::sync::Arc;

fn main() {
    divan::main();
}

struct Fixture {
    chain: Chain,
    heap: Heap,
    root: Addr,
}

impl Fixture {
    fn new(registry: ShapeRegistry, shape: Arc<Shape>, value: &Value) -> Self {
        let chain = Compiler::with_registry(registry.clone())
            .compile(&shape)
            .expect("shape compiles");
        let mut heap = Heap::new();
        let root = heap
            .place_in(&registry, &shape, value)
            .expect("value fits shape");
        Self { chain, heap, root }
    }

    fn run(&self, bencher: divan::Bencher) {
        let runner = Runner::new();
        bencher.bench_local(|| {
            divan::black_box_drop(runner.encode(&self.chain, &self.heap, self.root));
        });
    }
}

fn person() -> Arc<Shape> {
    RecordShape::builder("Person")
        .field("name", Shape::string())
        .field("age", Shape::int())
        .field("tags", Shape::sequence(Shape::string()))
        .build()
        .expect("valid record")
}

fn person_value(i: i64) -> Value {
    Value::record([
        Value::str(format!("person-{i}")),
        Value::Int(i),
        Value::list([Value::str("a"), Value::str("b\"c")]),
    ])
}

#[divan::bench]
fn record(bencher: divan::Bencher) {
    Fixture::new(ShapeRegistry::new(), person(), &person_value(42)).run(bencher);
}

#[divan::bench(args = [16, 256, 4096])]
fn int_sequence(bencher: divan::Bencher, len: i64) {
    let value = Value::list((0..len).map(Value::Int));
    Fixture::new(ShapeRegistry::new(), Shape::sequence(Shape::int()), &value).run(bencher);
}

#[divan::bench(args = [16, 256])]
fn record_sequence(bencher: divan::Bencher, len: i64) {
    let value = Value::list((0..len).map(person_value));
    Fixture::new(ShapeRegistry::new(), Shape::sequence(person()), &value).run(bencher);
}

#[divan::bench(args = [8, 24])]
fn linked_list(bencher: divan::Bencher, len: i64) {
    let mut registry = ShapeRegistry::new();
    registry.register(
        "Node",
        RecordShape::builder("Node")
            .field("value", Shape::int())
            .field("next", Shape::pointer(Shape::named("Node")))
            .build()
            .expect("valid record"),
    );
    let value = (1..=len)
        .rev()
        .fold(Value::Null, |next, v| Value::record([Value::Int(v), next]));
    Fixture::new(registry, Shape::pointer(Shape::named("Node")), &value).run(bencher);
}

#[divan::bench]
fn compile_record(bencher: divan::Bencher) {
    let shape = person();
    let compiler = Compiler::new();
    bencher.bench_local(|| divan::black_box_drop(compiler.compile(&shape)));
}
