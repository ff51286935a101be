//! Temporary checkpoint write/read/list (shadow-ref commits).

use chrono::Utc;
use tracing::debug;

use crate::config::EngineConfig;
use crate::errors::EngineResult;
use crate::ident;
use crate::objectstore::{graft_path, strip_top_level, CommitRequest, EntryKind, ObjectStore, Signature};

use super::TemporaryCheckpointMetadata;

/// Inputs to a temporary-checkpoint write.
pub struct TemporaryWriteRequest<'a> {
    pub session_id: &'a str,
    pub base_commit: &'a str,
    pub head_commit: &'a str,
    pub worktree_id: Option<&'a str>,
    pub modified_files: &'a [String],
    pub new_files: &'a [String],
    pub deleted_files: &'a [String],
    /// Path, relative to the tree root, to graft this session's
    /// `checkpoint.json` under. Must start with `config.metadata_root`.
    pub metadata_dir: &'a str,
    pub commit_message: &'a str,
    pub author: &'a Signature,
}

/// Result of a temporary-checkpoint write.
pub struct TemporaryWriteResult {
    pub commit_id: String,
    pub skipped: bool,
}

/// A resolved shadow-ref tip.
pub struct TemporaryCheckpointHandle {
    pub commit_id: String,
    pub tree_id: String,
    pub session_id: Option<String>,
}

/// Write a new temporary checkpoint to the session's shadow ref, or return
/// the existing tip unchanged if its tree already matches the candidate
/// (the dedup invariant).
pub fn write(
    store: &dyn ObjectStore,
    config: &EngineConfig,
    request: &TemporaryWriteRequest<'_>,
) -> EngineResult<TemporaryWriteResult> {
    let ref_name = ident::shadow_ref_name(config, request.base_commit, request.worktree_id);
    let existing_tip = store.resolve_ref(&ref_name)?;
    let head_tree = store.commit_tree_id(request.head_commit)?;

    if let Some(tip) = &existing_tip {
        let tip_tree = store.commit_tree_id(tip)?;
        let tip_content_tree = strip_top_level(store, &tip_tree, &config.metadata_root)?;
        if tip_content_tree == head_tree {
            debug!(session_id = request.session_id, %ref_name, "shadow tip unchanged; skipping write");
            return Ok(TemporaryWriteResult {
                commit_id: tip.clone(),
                skipped: true,
            });
        }
    }

    let metadata = TemporaryCheckpointMetadata {
        session_id: request.session_id.to_string(),
        base_commit: request.base_commit.to_string(),
        timestamp: Utc::now(),
        modified_files: request.modified_files.to_vec(),
        new_files: request.new_files.to_vec(),
        deleted_files: request.deleted_files.to_vec(),
    };
    let metadata_bytes = serde_json::to_vec_pretty(&metadata)?;
    let metadata_blob_id = store.write_blob(&metadata_bytes)?;

    let metadata_file_path = format!("{}/checkpoint.json", request.metadata_dir);
    let grafted_tree = graft_path(store, &head_tree, &metadata_file_path, EntryKind::Blob, &metadata_blob_id)?;

    let parents = match &existing_tip {
        Some(tip) => vec![tip.clone()],
        None => vec![request.base_commit.to_string()],
    };
    let commit_id = store.create_commit(CommitRequest {
        tree_id: &grafted_tree,
        parents: &parents,
        message: request.commit_message,
        author: request.author,
        committer: request.author,
    })?;

    store.update_ref(&ref_name, &commit_id, existing_tip.as_deref())?;

    Ok(TemporaryWriteResult {
        commit_id,
        skipped: false,
    })
}

/// Read the current shadow-ref tip for `(base_commit, worktree_id)`, if any.
pub fn read(
    store: &dyn ObjectStore,
    config: &EngineConfig,
    base_commit: &str,
    worktree_id: Option<&str>,
) -> EngineResult<Option<TemporaryCheckpointHandle>> {
    let ref_name = ident::shadow_ref_name(config, base_commit, worktree_id);
    let Some(commit_id) = store.resolve_ref(&ref_name)? else {
        return Ok(None);
    };
    let tree_id = store.commit_tree_id(&commit_id)?;
    let message = store.commit_message(&commit_id)?;
    let session_id = crate::trailer::parse_trailer(&message, &config.session_trailer);
    Ok(Some(TemporaryCheckpointHandle {
        commit_id,
        tree_id,
        session_id,
    }))
}

/// Enumerate every shadow ref along with the session id recorded in its tip
/// commit's trailer, for use by cleanup/carry-forward tooling.
pub fn list(store: &dyn ObjectStore, config: &EngineConfig) -> EngineResult<Vec<(String, Option<String>)>> {
    let names = store.list_refs(&config.shadow_prefix)?;
    let mut results = Vec::new();
    for name in names {
        if !ident::is_shadow_ref(config, &name) {
            continue;
        }
        let Some(commit_id) = store.resolve_ref(&name)? else {
            continue;
        };
        let message = store.commit_message(&commit_id)?;
        let session_id = crate::trailer::parse_trailer(&message, &config.session_trailer);
        results.push((name, session_id));
    }
    Ok(results)
}
