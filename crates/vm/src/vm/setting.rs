/// User-configurable settings for the slot runtime.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Settings {
    /// Distinct builtins a call site calls directly before it goes megamorphic.
    pub inline_cache_limit: usize,

    /// Validate results of native slots: an object result with a pending exception becomes a
    /// `SystemError`, and `nb_bool` must return 0 or 1.
    pub check_native_results: bool,

    /// Log every dispatch decision at trace level
    pub trace_dispatch: bool,

    /// Seed of the str hash; a fixed seed when `None`.
    pub hash_seed: Option<u32>,
}

impl Settings {
    pub fn with_inline_cache_limit(mut self, limit: usize) -> Self {
        self.inline_cache_limit = limit;
        self
    }

    pub fn with_trace_dispatch(mut self, trace: bool) -> Self {
        self.trace_dispatch = trace;
        self
    }

    pub fn with_hash_seed(mut self, seed: u32) -> Self {
        self.hash_seed = Some(seed);
        self
    }
}

/// Sensible default settings.
impl Default for Settings {
    fn default() -> Self {
        Self {
            inline_cache_limit: 3,
            check_native_results: true,
            trace_dispatch: false,
            hash_seed: None,
        }
    }
}
