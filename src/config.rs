//! Parser configuration.

/// Minimum trailing padding the parser keeps past the logical end of its
/// internal copy of the input, the slack block-at-a-time reads and the
/// `true`/`false`/`null` literal checks rely on.
pub const PAD: usize = 64;

/// Default maximum container nesting depth.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Default scratch capacity, in input bytes, a freshly constructed parser
/// is sized for.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Largest capacity a parser may be asked to allocate. Structural offsets
/// and tape payloads are stored in fewer than 64 bits, so documents must
/// stay well under the 32-bit offset space.
pub const MAX_CAPACITY: usize = (1 << 32) - PAD;

/// Names a specific backend implementation, for deterministic testing or
/// to work around a broken CPU-feature report in the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendChoice {
    /// Probe CPU features and pick the best available backend.
    #[default]
    Auto,
    /// Force the portable scalar backend.
    Fallback,
    /// Force SSE4.2 (x86_64 only).
    Sse42,
    /// Force AVX2 (x86_64 only).
    Avx2,
    /// Force AVX-512 (x86_64 only).
    Avx512,
    /// Force NEON (aarch64 only).
    Neon,
}

impl BackendChoice {
    /// Parses the user-facing names accepted by [`crate::simd::dispatch::select`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "auto" => Some(Self::Auto),
            "fallback" | "scalar" => Some(Self::Fallback),
            "sse4.2" | "sse42" | "westmere" => Some(Self::Sse42),
            "avx2" | "haswell" => Some(Self::Avx2),
            "avx512" | "icelake" => Some(Self::Avx512),
            "neon" => Some(Self::Neon),
            _ => None,
        }
    }
}

/// Tunables for a [`crate::parser::Parser`].
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    /// Number of input bytes the parser's scratch buffers are sized for.
    pub capacity: usize,
    /// Maximum container nesting depth before `DEPTH_ERROR`.
    pub max_depth: usize,
    /// Backend selection override.
    pub backend: BackendChoice,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_depth: DEFAULT_MAX_DEPTH,
            backend: BackendChoice::Auto,
        }
    }
}

impl ParserConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn backend(mut self, backend: BackendChoice) -> Self {
        self.backend = backend;
        self
    }
}
