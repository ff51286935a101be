//! The `SessionState` record (see data model).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Active,
    Idle,
    Ended,
}

/// Durable per-session state, one JSON document per session id.
///
/// Accepts both camelCase and snake_case field names on load (repositories
/// may migrate across tool versions); unknown fields are ignored rather
/// than rejected and missing fields default to zero/empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(alias = "session_id")]
    pub session_id: String,
    #[serde(alias = "base_commit")]
    pub base_commit: String,
    #[serde(alias = "attribution_base_commit")]
    pub attribution_base_commit: String,
    #[serde(default, alias = "worktree_id")]
    pub worktree_id: Option<String>,
    #[serde(alias = "started_at")]
    pub started_at: DateTime<Utc>,
    #[serde(default, alias = "ended_at")]
    pub ended_at: Option<DateTime<Utc>>,
    pub phase: Phase,
    #[serde(default, alias = "step_count")]
    pub step_count: u64,
    #[serde(default, alias = "files_touched")]
    pub files_touched: Vec<String>,
    #[serde(default, alias = "untracked_files_at_start")]
    pub untracked_files_at_start: Vec<String>,
    #[serde(default, alias = "last_checkpoint_id")]
    pub last_checkpoint_id: Option<String>,
    #[serde(default, alias = "first_prompt")]
    pub first_prompt: Option<String>,
    #[serde(default, alias = "token_usage")]
    pub token_usage: u64,
    #[serde(default, alias = "transcript_identifier_at_start")]
    pub transcript_identifier_at_start: Option<String>,
}

impl SessionState {
    /// Build the initial record for a freshly-started session.
    pub fn new(session_id: String, base_commit: String, worktree_id: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id,
            base_commit: base_commit.clone(),
            attribution_base_commit: base_commit,
            worktree_id,
            started_at: now,
            ended_at: None,
            phase: Phase::Active,
            step_count: 0,
            files_touched: Vec::new(),
            untracked_files_at_start: Vec::new(),
            last_checkpoint_id: None,
            first_prompt: None,
            token_usage: 0,
            transcript_identifier_at_start: None,
        }
    }

    /// Merge newly-touched paths into `files_touched`, keeping it sorted and unique.
    pub fn merge_files_touched<I: IntoIterator<Item = String>>(&mut self, paths: I) {
        for path in paths {
            if let Err(index) = self.files_touched.binary_search(&path) {
                self.files_touched.insert(index, path);
            }
        }
    }

    /// Reset the parts of the state that describe accumulated, not-yet-promoted
    /// agent work, anchoring the session at a new base commit. Used both when
    /// a promotion fully consumes the tracked files and when the base migrates
    /// because of a history rewrite.
    pub fn rebase_onto(&mut self, new_base: String, remaining_files: Vec<String>, checkpoint_id: Option<String>) {
        self.base_commit = new_base;
        self.files_touched = remaining_files;
        self.step_count = 0;
        if let Some(id) = checkpoint_id {
            self.last_checkpoint_id = Some(id);
        }
    }

    /// `true` if the session is past its stale threshold and should be reaped.
    pub fn is_stale(&self, now: DateTime<Utc>, stale_days: i64) -> bool {
        match (self.phase, self.ended_at) {
            (Phase::Ended, Some(ended_at)) => (now - ended_at).num_days() >= stale_days,
            _ => false,
        }
    }
}
