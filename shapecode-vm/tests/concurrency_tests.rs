//! One compiled chain shared by many concurrent encodes

mod common;

use anyhow::Result;
use common::*;
use shapecode_bytecode::types::Shape;
use shapecode_compiler::{CompileCache, Compiler};
use shapecode_vm::{Heap, Runner};
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_shared_chain_independent_outputs() -> Result<()> {
    let shape = sample_record()?;
    let chain = Arc::new(Compiler::new().compile(&shape)?);
    let runner = Runner::new();

    let inputs = [
        (sample_value(7, &["x", "y"]), r#"{"a":7,"b":["x","y"]}"#),
        (sample_value(-1, &[]), r#"{"a":-1,"b":[]}"#),
    ];
    let heaps = inputs
        .iter()
        .map(|(value, _)| {
            let mut heap = Heap::new();
            let root = heap.place(&shape, value)?;
            Ok((heap, root))
        })
        .collect::<Result<Vec<_>>>()?;

    let barrier = Barrier::new(heaps.len() * 4);
    thread::scope(|s| {
        for ((heap, root), (_, expected)) in heaps.iter().zip(&inputs) {
            for _ in 0..4 {
                let chain = Arc::clone(&chain);
                let runner = &runner;
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    for _ in 0..200 {
                        let out = runner.encode(&chain, heap, *root).expect("encode");
                        assert_eq!(out, expected.as_bytes());
                    }
                });
            }
        }
    });
    Ok(())
}

#[test]
fn test_cache_and_runner_across_threads() -> Result<()> {
    let registry = recursive_registry()?;
    let cache = CompileCache::new(Compiler::with_registry(registry.clone()));
    let shape = Shape::pointer(Shape::named("Node"));

    let outputs: Vec<String> = thread::scope(|s| {
        let handles: Vec<_> = (1..=6)
            .map(|n| {
                let (cache, registry, shape) = (&cache, &registry, &shape);
                s.spawn(move || -> Result<String> {
                    let chain = cache.get_or_compile(shape)?;
                    let mut heap = Heap::new();
                    let root = heap.place_in(registry, shape, &linked_list(n))?;
                    Ok(String::from_utf8(Runner::new().encode(&chain, &heap, root)?)?)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("encode thread panicked"))
            .collect::<Result<Vec<_>>>()
    })?;

    for (n, out) in (1..=6usize).zip(&outputs) {
        assert_eq!(out.matches("\"value\"").count(), n);
        assert!(out.ends_with(&format!("\"value\":{n},\"next\":null{}", "}".repeat(n))));
    }
    assert_eq!(cache.stats().compiles, 1);
    Ok(())
}
