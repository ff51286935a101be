//! Checkpoint store: writes and reads temporary checkpoints (shadow-ref
//! commits) and committed checkpoints (sharded metadata-ref subtrees).

pub mod chunk;
pub mod committed;
pub mod temporary;

use serde::{Deserialize, Serialize};

/// Record grafted into a shadow-ref commit's tree at `checkpoint.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemporaryCheckpointMetadata {
    pub session_id: String,
    pub base_commit: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub modified_files: Vec<String>,
    pub new_files: Vec<String>,
    pub deleted_files: Vec<String>,
}

/// Top-level summary for a committed checkpoint, stored at
/// `<shard>/metadata.json` on the metadata ref.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointSummary {
    pub checkpoint_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub checkpoints_count: u32,
    pub files_touched: Vec<String>,
    pub session_ids: Vec<String>,
}

/// Per-session metadata stored at `<shard>/<sessionIndex>/metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedMetadata {
    pub session_id: String,
    pub strategy: String,
    pub agent: String,
    #[serde(default)]
    pub turn_id: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub transcript_identifier_at_start: Option<String>,
    pub checkpoint_transcript_start: u64,
    #[serde(default)]
    pub token_usage: Option<u64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub initial_attribution: Option<String>,
    pub files_touched: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Number of chunks the transcript was split into (see `checkpoint::chunk`).
    /// Always at least 1. Older documents without this field are treated as
    /// single-chunk.
    #[serde(default = "one")]
    pub transcript_chunk_count: usize,
}

fn one() -> usize {
    1
}

/// Input to a committed-checkpoint write. See `committed::write`.
pub struct PromotionRequest<'a> {
    pub checkpoint_id: &'a str,
    pub session_id: &'a str,
    pub strategy: &'a str,
    pub agent: &'a str,
    pub branch: Option<&'a str>,
    pub transcript: &'a [u8],
    pub prompts: &'a [String],
    pub context: &'a [u8],
    pub files_touched: &'a [String],
    pub checkpoints_count: u32,
    pub turn_id: Option<&'a str>,
    pub transcript_identifier_at_start: Option<&'a str>,
    pub checkpoint_transcript_start: u64,
    pub token_usage: Option<u64>,
    pub summary: Option<&'a str>,
    pub initial_attribution: Option<&'a str>,
}
