//! Overlap analyzer: does the user's staged/committed work intersect what
//! the agent touched, at byte-content level rather than just by filename?

use std::collections::HashSet;

use crate::errors::EngineResult;
use crate::objectstore::{DiffEntry, ObjectStore};

/// Paths in `files_touched` that are both staged and whose staged content
/// differs from what the shadow tip records at that path (a pure filename
/// match is not enough — the user may have reverted the agent's edit).
pub fn staged_overlap(
    store: &dyn ObjectStore,
    files_touched: &[String],
    shadow_tip_tree: &str,
) -> EngineResult<Vec<String>> {
    let staged: HashSet<String> = store.staged_paths()?.into_iter().collect();
    let mut overlap = Vec::new();
    for path in files_touched {
        if !staged.contains(path) {
            continue;
        }
        let staged_content = store.staged_content(path)?;
        let shadow_content = store.read_blob(shadow_tip_tree, path)?;
        if staged_content != shadow_content {
            overlap.push(path.clone());
        }
    }
    Ok(overlap)
}

/// Paths in `files_touched` that are present in `diff` (the add/modify/delete
/// set between a commit and its parent) and whose committed content matches
/// what the shadow tip records at that path.
pub fn committed_overlap(
    store: &dyn ObjectStore,
    files_touched: &[String],
    diff: &[DiffEntry],
    committed_tree: &str,
    shadow_tip_tree: &str,
) -> EngineResult<Vec<String>> {
    let diffed: HashSet<&str> = diff.iter().map(|e| e.path.as_str()).collect();
    let mut overlap = Vec::new();
    for path in files_touched {
        if !diffed.contains(path.as_str()) {
            continue;
        }
        let committed_content = store.read_blob(committed_tree, path)?;
        let shadow_content = store.read_blob(shadow_tip_tree, path)?;
        if committed_content == shadow_content {
            overlap.push(path.clone());
        }
    }
    Ok(overlap)
}

/// Of `files_touched` minus `committed_files`, the subset whose content
/// still differs between the shadow tip and the new HEAD tree — i.e. still
/// needs to be carried forward to the next base.
pub fn remaining_agent_work(
    store: &dyn ObjectStore,
    files_touched: &[String],
    committed_files: &[String],
    shadow_tip_tree: &str,
    new_head_tree: &str,
) -> EngineResult<Vec<String>> {
    let committed: HashSet<&str> = committed_files.iter().map(String::as_str).collect();
    let mut remaining = Vec::new();
    for path in files_touched {
        if committed.contains(path.as_str()) {
            continue;
        }
        let shadow_content = store.read_blob(shadow_tip_tree, path)?;
        let head_content = store.read_blob(new_head_tree, path)?;
        if shadow_content != head_content {
            remaining.push(path.clone());
        }
    }
    Ok(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectstore::{EntryKind, TreeEntry};
    use crate::testutil::MemStore;

    #[test]
    fn committed_overlap_requires_path_in_diff_and_matching_content() {
        let store = MemStore::new();
        let blob_a = store.write_blob(b"agent content").unwrap();
        let blob_b = store.write_blob(b"different content").unwrap();
        let shadow_tree = store
            .compose_tree(&[TreeEntry {
                name: "a.txt".into(),
                kind: EntryKind::Blob,
                id: blob_a.clone(),
            }])
            .unwrap();
        let committed_tree_matching = store
            .compose_tree(&[TreeEntry {
                name: "a.txt".into(),
                kind: EntryKind::Blob,
                id: blob_a,
            }])
            .unwrap();
        let committed_tree_diverged = store
            .compose_tree(&[TreeEntry {
                name: "a.txt".into(),
                kind: EntryKind::Blob,
                id: blob_b,
            }])
            .unwrap();
        let diff = vec![DiffEntry {
            path: "a.txt".to_string(),
            status: crate::objectstore::DiffStatus::Modified,
        }];
        let files_touched = vec!["a.txt".to_string()];

        let overlap = committed_overlap(&store, &files_touched, &diff, &committed_tree_matching, &shadow_tree).unwrap();
        assert_eq!(overlap, vec!["a.txt".to_string()]);

        let no_overlap = committed_overlap(&store, &files_touched, &diff, &committed_tree_diverged, &shadow_tree).unwrap();
        assert!(no_overlap.is_empty());
    }

    #[test]
    fn remaining_agent_work_skips_committed_and_unchanged() {
        let store = MemStore::new();
        let blob_agent = store.write_blob(b"agent").unwrap();
        let blob_head_same = store.write_blob(b"agent").unwrap();
        let shadow_tree = store
            .compose_tree(&[
                TreeEntry {
                    name: "a.txt".into(),
                    kind: EntryKind::Blob,
                    id: blob_agent.clone(),
                },
                TreeEntry {
                    name: "b.txt".into(),
                    kind: EntryKind::Blob,
                    id: blob_agent.clone(),
                },
            ])
            .unwrap();
        let head_tree = store
            .compose_tree(&[
                TreeEntry {
                    name: "a.txt".into(),
                    kind: EntryKind::Blob,
                    id: blob_agent,
                },
                TreeEntry {
                    name: "b.txt".into(),
                    kind: EntryKind::Blob,
                    id: blob_head_same,
                },
            ])
            .unwrap();

        let files_touched = vec!["a.txt".to_string(), "b.txt".to_string()];
        let committed = vec!["a.txt".to_string()];
        let remaining = remaining_agent_work(&store, &files_touched, &committed, &shadow_tree, &head_tree).unwrap();
        assert!(remaining.is_empty());
    }
}
