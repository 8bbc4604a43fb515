/// Bounds on the work a single encode call may do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeLimits {
    /// Open collections and records plus recursive frames
    pub max_depth: usize,

    /// Elements in any one collection
    pub max_collection_len: usize,

    /// Bytes of output
    pub max_output_bytes: usize,
}

impl EncodeLimits {
    pub const DEFAULT_MAX_DEPTH: usize = 64;
    pub const DEFAULT_MAX_COLLECTION_LEN: usize = 1 << 20;
    pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 64 * 1024 * 1024;

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn max_collection_len(mut self, len: usize) -> Self {
        self.max_collection_len = len;
        self
    }

    pub fn max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }
}

impl Default for EncodeLimits {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            max_collection_len: Self::DEFAULT_MAX_COLLECTION_LEN,
            max_output_bytes: Self::DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}
