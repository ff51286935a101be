//! Filesystem-backed session store: one `<sessionId>.json` per session,
//! written via a temp-file-then-rename so readers never observe a partial
//! document.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};

use super::state::{Phase, SessionState};

/// A directory of per-session JSON documents.
pub struct SessionStore {
    root: PathBuf,
    stale_days: i64,
}

impl SessionStore {
    pub fn new(root: PathBuf, stale_days: i64) -> Self {
        Self { root, stale_days }
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("{session_id}.json"))
    }

    /// Write `bytes` to `path` via a sibling temp file then rename.
    async fn atomic_write(path: &Path, bytes: &[u8]) -> EngineResult<()> {
        let parent = path
            .parent()
            .ok_or_else(|| EngineError::invalid("session path has no parent directory"))?;
        tokio::fs::create_dir_all(parent).await?;

        let file_name = path
            .file_name()
            .ok_or_else(|| EngineError::invalid("session path has no filename"))?
            .to_string_lossy();
        let temp_path = parent.join(format!("{file_name}.tmp.{}", Uuid::new_v4()));

        let write_result = tokio::fs::write(&temp_path, bytes).await;
        if write_result.is_err() {
            let _ = tokio::fs::remove_file(&temp_path).await;
            write_result?;
        }
        if let Err(err) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(EngineError::from(err));
        }
        Ok(())
    }

    /// Persist a session record atomically.
    pub async fn save(&self, state: &SessionState) -> EngineResult<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        self.atomic_write(&self.path_for(&state.session_id), &bytes).await
    }

    /// Load a session by id. A stale, ended session is deleted and reported
    /// as absent rather than returned.
    pub async fn load(&self, session_id: &str) -> EngineResult<Option<SessionState>> {
        let path = self.path_for(session_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(EngineError::from(err)),
        };
        let state: SessionState = match serde_json::from_slice(&bytes) {
            Ok(state) => state,
            Err(err) => {
                warn!(session_id, error = %err, "session record failed to parse; treating as absent");
                return Ok(None);
            }
        };
        if state.is_stale(Utc::now(), self.stale_days) {
            debug!(session_id, "reaping stale session on load");
            let _ = tokio::fs::remove_file(&path).await;
            return Ok(None);
        }
        Ok(Some(state))
    }

    /// List all non-stale sessions, sorted by session id (date-prefixed, so
    /// this also orders by creation time).
    pub async fn list(&self) -> EngineResult<Vec<SessionState>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();

        let mut sessions = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(state) = self.load(&id).await? {
                sessions.push(state);
            }
        }
        Ok(sessions)
    }

    /// Delete a session record. Not an error if it does not exist.
    pub async fn delete(&self, session_id: &str) -> EngineResult<()> {
        match tokio::fs::remove_file(self.path_for(session_id)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(EngineError::from(err)),
        }
    }

    /// `true` if a (non-stale) record exists for `session_id`.
    pub async fn exists(&self, session_id: &str) -> EngineResult<bool> {
        Ok(self.load(session_id).await?.is_some())
    }

    /// Sessions whose `base_commit` matches `commit`, restricted to ones
    /// that have tracked work (`step_count > 0` and non-empty `files_touched`).
    pub async fn active_at_base(&self, commit: &str) -> EngineResult<Vec<SessionState>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|s| s.phase != Phase::Ended && s.base_commit == commit && s.step_count > 0 && !s.files_touched.is_empty())
            .collect())
    }
}
