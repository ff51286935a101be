//! Engine configuration.
//!
//! Loading a project's own settings file is a host-level concern; this
//! module only owns the typed defaults and a narrow set of environment
//! overrides for knobs operators need to flip without touching a config
//! file.

use serde::{Deserialize, Serialize};

/// Tunable knobs for the checkpoint engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Prefix shared by shadow refs and the metadata ref, e.g. `"refs/checkpoint/"`.
    pub shadow_prefix: String,
    /// Top-level directory name grafted into shadow-ref trees to hold
    /// per-session bookkeeping, e.g. `".checkpoint-engine"`. Always a single
    /// path component, so it can be stripped from a tree with one
    /// non-recursive listing when comparing against the user's HEAD tree.
    pub metadata_root: String,
    /// Suffix appended to `shadow_prefix` to name the metadata ref.
    pub metadata_ref_suffix: String,
    /// Trailer key used for checkpoint ids, e.g. `"Checkpoint-Checkpoint"`.
    pub checkpoint_trailer: String,
    /// Trailer key used for session ids.
    pub session_trailer: String,
    /// Trailer key used for the strategy name.
    pub strategy_trailer: String,
    /// Trailer key used for the grafted metadata subdirectory.
    pub metadata_trailer: String,
    /// Ended sessions older than this many days are reaped on next load/list.
    pub stale_session_days: i64,
    /// Maximum size in bytes of a single transcript chunk.
    pub chunk_size_bytes: usize,
    /// Timeout, in seconds, for most object-store operations.
    pub op_timeout_secs: u64,
    /// Timeout, in seconds, for the push operation.
    pub push_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shadow_prefix: "refs/checkpoint/".to_string(),
            metadata_root: ".checkpoint-engine".to_string(),
            metadata_ref_suffix: "checkpoints/v1".to_string(),
            checkpoint_trailer: "Checkpoint-Checkpoint".to_string(),
            session_trailer: "Checkpoint-Session".to_string(),
            strategy_trailer: "Checkpoint-Strategy".to_string(),
            metadata_trailer: "Checkpoint-Metadata".to_string(),
            stale_session_days: 7,
            chunk_size_bytes: 50 * 1024 * 1024,
            op_timeout_secs: 30,
            push_timeout_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Build the default configuration, then apply any recognized
    /// environment-variable overrides on top of it.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("CHECKPOINT_ENGINE_STALE_DAYS") {
            if let Ok(days) = v.parse() {
                config.stale_session_days = days;
            }
        }
        if let Ok(v) = std::env::var("CHECKPOINT_ENGINE_CHUNK_SIZE_BYTES") {
            if let Ok(bytes) = v.parse() {
                config.chunk_size_bytes = bytes;
            }
        }
        if let Ok(v) = std::env::var("CHECKPOINT_ENGINE_SHADOW_PREFIX") {
            config.shadow_prefix = v;
        }
        config
    }

    /// Full ref name of the metadata ref, optionally namespaced to a project.
    pub fn metadata_ref(&self, project_namespace: Option<&str>) -> String {
        match project_namespace {
            Some(ns) => format!("{}{}-{ns}", self.shadow_prefix, self.metadata_ref_suffix),
            None => format!("{}{}", self.shadow_prefix, self.metadata_ref_suffix),
        }
    }
}
