//! Identifier & path scheme: shadow ref naming, checkpoint ids, project ids.

use sha2::{Digest, Sha256};

use crate::config::EngineConfig;

/// Name the shadow ref for a given base commit and (optional) worktree.
///
/// Deterministic: the same `(base_commit, worktree_id)` pair always yields
/// the same name, satisfying the ref-naming invariant relied on by the
/// session store's migration logic.
pub fn shadow_ref_name(config: &EngineConfig, base_commit: &str, worktree_id: Option<&str>) -> String {
    let base_prefix = &base_commit[..base_commit.len().min(7)];
    match worktree_id {
        Some(id) if !id.is_empty() => {
            let digest = Sha256::digest(id.as_bytes());
            let worktree_suffix = hex::encode(&digest[..3]);
            format!("{}{base_prefix}-{worktree_suffix}", config.shadow_prefix)
        }
        _ => format!("{}{base_prefix}", config.shadow_prefix),
    }
}

/// True if `ref_name` matches the shadow-ref shape and is not the metadata ref.
pub fn is_shadow_ref(config: &EngineConfig, ref_name: &str) -> bool {
    if ref_name == config.metadata_ref(None) || ref_name.starts_with(&config.metadata_ref(None)) {
        return false;
    }
    let Some(rest) = ref_name.strip_prefix(&config.shadow_prefix) else {
        return false;
    };
    let (base, worktree) = match rest.split_once('-') {
        Some((b, w)) => (b, Some(w)),
        None => (rest, None),
    };
    if base.len() < 7 || !base.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    match worktree {
        Some(w) => w.len() >= 6 && w.chars().all(|c| c.is_ascii_hexdigit()),
        None => true,
    }
}

/// Generate a fresh 12-hex-character checkpoint id.
pub fn new_checkpoint_id() -> String {
    let bytes = uuid::Uuid::new_v4();
    hex::encode(&bytes.as_bytes()[..6])
}

/// `true` if `id` matches `^[0-9a-f]{12}$`.
pub fn is_valid_checkpoint_id(id: &str) -> bool {
    id.len() == 12 && id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}

/// Split a checkpoint id into its two-char shard prefix and remainder,
/// matching the sharded tree layout `<id[0:2]>/<id[2:]>`.
pub fn checkpoint_shard_path(id: &str) -> (String, String) {
    (id[..2].to_string(), id[2..].to_string())
}

/// Deterministic project namespace for a repository root, used to suffix
/// the metadata ref when multiple projects share a session repository.
pub fn project_namespace(root_basename: &str, absolute_path: &str) -> String {
    let sanitized: String = root_basename
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    let digest = Sha256::digest(absolute_path.as_bytes());
    let suffix = hex::encode(&digest[..4]);
    format!("{sanitized}-{suffix}")
}
