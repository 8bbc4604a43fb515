//! Compile-once behaviour of the shared cache

mod common;

use anyhow::Result;
use common::*;
use rstest::rstest;
use shapecode_bytecode::types::Shape;
use shapecode_compiler::{CacheStats, CompileCache, Compiler};
use std::sync::{Arc, Barrier};
use std::thread;

#[rstest]
#[case(2)]
#[case(8)]
#[case(32)]
fn test_single_flight(#[case] threads: usize) -> Result<()> {
    let cache = CompileCache::new(Compiler::new());
    let shape = Shape::pointer(sample_record()?);
    let barrier = Barrier::new(threads);

    let chains: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache.get_or_compile(&shape)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("compile thread panicked"))
            .collect()
    });

    let first = chains[0].clone()?;
    for chain in chains {
        assert!(Arc::ptr_eq(&first, &chain?));
    }
    assert_eq!(
        cache.stats(),
        CacheStats {
            entries: 1,
            compiles: 1,
            hits: threads - 1,
        }
    );
    Ok(())
}

#[test]
fn test_distinct_shapes_compile_separately() -> Result<()> {
    let cache = CompileCache::new(Compiler::new());
    let shapes = [Shape::int(), Shape::sequence(Shape::string()), sample_record()?];

    for shape in &shapes {
        cache.get_or_compile(shape)?;
        cache.get_or_compile(shape)?;
    }
    let stats = cache.stats();
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.compiles, 3);
    assert_eq!(stats.hits, 3);
    Ok(())
}

#[test]
fn test_cached_chain_outlives_request_shape() -> Result<()> {
    let cache = CompileCache::new(Compiler::new());
    let chain = {
        let shape = Shape::sequence(Shape::int());
        cache.get_or_compile(&shape)?
    };
    assert_eq!(chain.dump_main(), "SLICE_HEAD\nINT\nSLICE_ELEM\nSLICE_END");
    assert_eq!(cache.stats().entries, 1);
    Ok(())
}
