//! Shape compiler
//!
//! ## Usage
//! ```ignore
//! use shapecode_bytecode::{RecordShape, Shape};
//! use shapecode_compiler::{CompileCache, Compiler};
//!
//! let user = RecordShape::builder("User")
//!     .field("id", Shape::int())
//!     .field("tags", Shape::sequence(Shape::string()))
//!     .build()?;
//!
//! let chain = Compiler::new().compile(&user)?;
//! println!("{}", chain.dump_main());
//!
//! // Or compile once per shape and share the result
//! let cache = CompileCache::new(Compiler::new());
//! let shared = cache.get_or_compile(&user)?;
//! ```

mod cache;
mod codegen;
mod disassembler;
mod error;

use shapecode_bytecode::core::Chain;
use shapecode_bytecode::types::{Shape, ShapeRegistry};
use std::sync::Arc;
use tracing::debug;

pub use cache::{CacheStats, CompileCache};
pub use codegen::CodegenContext;
pub use disassembler::{Disassembler, DisassemblerConfig, DisassemblyFormat};
pub use error::CompileError;

/// Compiler settings
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Use the inline int/string record variants
    pub fast_paths: bool,

    /// Maximum shape nesting
    pub max_depth: usize,
}

impl CompilerConfig {
    pub const DEFAULT_MAX_DEPTH: usize = 128;

    pub fn fast_paths(mut self, enabled: bool) -> Self {
        self.fast_paths = enabled;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            fast_paths: true,
            max_depth: Self::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Transforms shape descriptions into instruction chains
///
/// The compiler is stateless between calls; late-bound names are resolved
/// through its registry.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    registry: ShapeRegistry,
    config: CompilerConfig,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: ShapeRegistry) -> Self {
        Self {
            registry,
            config: CompilerConfig::default(),
        }
    }

    pub fn config(mut self, config: CompilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Compile `shape` into a chain
    ///
    /// # Errors
    ///
    /// Returns an error if the shape, or anything it reaches, has no
    /// instruction mapping (see [`CompileError`]).
    pub fn compile(&self, shape: &Arc<Shape>) -> Result<Chain, CompileError> {
        match CodegenContext::new(&self.registry, &self.config).compile_root(shape) {
            Ok(chain) => {
                debug!(
                    shape = %shape,
                    instructions = chain.len(),
                    subroutines = chain.subroutines().len(),
                    "compiled shape"
                );
                Ok(chain)
            }
            Err(err) => {
                debug!(shape = %shape, error = %err, "shape rejected");
                Err(err)
            }
        }
    }
}
