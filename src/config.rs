//! Centralized configuration for the snap engine.
//!
//! Goals:
//! - Single place to collect tunables instead of scattering env lookups.
//! - EngineConfig::from_env() reads SR_* env vars; Default gives sane limits.
//!
//! All tunables here are decode-hardening bounds: a snap message whose
//! declared counts exceed them is treated as malformed and dropped before
//! any engine state is touched.

/// Top-level configuration for a [`crate::SnapEngine`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Maximum trace records accepted in one message.
    /// Env: SR_MAX_TRACE_RECORDS (default 4096)
    pub max_trace_records: usize,

    /// Maximum snap ids accepted per trace record (own + prior-parent each).
    /// Env: SR_MAX_SNAPS_PER_RECORD (default 65536)
    pub max_snaps_per_record: usize,

    /// Maximum split inode ids / split realm ids accepted per message.
    /// Env: SR_MAX_SPLIT_INOS (default 65536)
    pub max_split_inos: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_trace_records: 4096,
            max_snaps_per_record: 65536,
            max_split_inos: 65536,
        }
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.trim().parse::<usize>().ok()
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(n) = env_usize("SR_MAX_TRACE_RECORDS") {
            cfg.max_trace_records = n;
        }
        if let Some(n) = env_usize("SR_MAX_SNAPS_PER_RECORD") {
            cfg.max_snaps_per_record = n;
        }
        if let Some(n) = env_usize("SR_MAX_SPLIT_INOS") {
            cfg.max_split_inos = n;
        }
        cfg
    }

    pub fn with_max_trace_records(mut self, n: usize) -> Self {
        self.max_trace_records = n;
        self
    }

    pub fn with_max_snaps_per_record(mut self, n: usize) -> Self {
        self.max_snaps_per_record = n;
        self
    }

    pub fn with_max_split_inos(mut self, n: usize) -> Self {
        self.max_split_inos = n;
        self
    }
}
