//! Compile-once cache keyed by shape identity

use ahash::AHashMap;
use parking_lot::Mutex;
use shapecode_bytecode::core::Chain;
use shapecode_bytecode::types::Shape;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

use crate::error::CompileError;
use crate::Compiler;

type Slot = Arc<OnceLock<Result<Arc<Chain>, CompileError>>>;

/// Cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub compiles: usize,
    pub hits: usize,
}

/// Shares one compiled chain per shape
///
/// Shapes are identified by their `Arc` allocation. Each entry keeps its
/// shape alive so the address cannot be reused by another shape. Concurrent
/// first requests for the same shape wait on a single compilation; failures
/// are cached as well.
pub struct CompileCache {
    compiler: Compiler,
    entries: Mutex<AHashMap<usize, (Arc<Shape>, Slot)>>,
    compiles: AtomicUsize,
    hits: AtomicUsize,
}

impl CompileCache {
    pub fn new(compiler: Compiler) -> Self {
        Self {
            compiler,
            entries: Mutex::new(AHashMap::new()),
            compiles: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
        }
    }

    /// Chain for `shape`, compiling it on first request
    pub fn get_or_compile(&self, shape: &Arc<Shape>) -> Result<Arc<Chain>, CompileError> {
        let key = Arc::as_ptr(shape) as usize;
        let slot = {
            let mut entries = self.entries.lock();
            entries
                .entry(key)
                .or_insert_with(|| (Arc::clone(shape), Arc::new(OnceLock::new())))
                .1
                .clone()
        };

        let mut compiled_here = false;
        let result = slot.get_or_init(|| {
            compiled_here = true;
            self.compiles.fetch_add(1, Ordering::Relaxed);
            debug!(shape = %shape, "cache miss");
            self.compiler.compile(shape).map(Arc::new)
        });
        if !compiled_here {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(shape = %shape, "cache hit");
        }
        result.clone()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.lock().len(),
            compiles: self.compiles.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }
}
