//! Object-store adapter: the minimal surface the engine needs from an
//! underlying content-addressed history store.
//!
//! Mirrors the split used by the git wrapper this module is grounded on:
//! object/tree/commit/ref primitives go through a pure object-database
//! binding, while the handful of operations that read live worktree/index
//! state (staged paths, porcelain status, push) shell out to the `git`
//! plumbing binary.

pub mod gix_store;

use crate::errors::EngineResult;

/// Kind of a tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Blob,
    Tree,
}

/// One entry of a tree, as composed or listed.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    pub name: String,
    pub kind: EntryKind,
    pub id: String,
}

/// Author or committer identity, supplied by the caller so that
/// engine-generated commits are never mis-attributed to the user.
#[derive(Debug, Clone)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Unix seconds.
    pub timestamp: i64,
}

/// Inputs to commit creation.
pub struct CommitRequest<'a> {
    pub tree_id: &'a str,
    pub parents: &'a [String],
    pub message: &'a str,
    pub author: &'a Signature,
    pub committer: &'a Signature,
}

/// Status of a path between two commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    Added,
    Modified,
    Deleted,
}

/// One entry of a name-status diff.
#[derive(Debug, Clone)]
pub struct DiffEntry {
    pub path: String,
    pub status: DiffStatus,
}

/// The object-store adapter surface.
///
/// Every mutating operation is atomic at the ref level; no operation is
/// required to be transactional across multiple refs. All failures map
/// onto [`crate::errors::EngineError`]'s closed taxonomy.
pub trait ObjectStore: Send + Sync {
    /// Resolve a symbolic ref to the hex id of the object it points at.
    /// Returns `Ok(None)` if the ref does not exist.
    fn resolve_ref(&self, name: &str) -> EngineResult<Option<String>>;

    /// The tree id of a commit.
    fn commit_tree_id(&self, commit_id: &str) -> EngineResult<String>;

    /// The parent commit ids of a commit, in order.
    fn commit_parents(&self, commit_id: &str) -> EngineResult<Vec<String>>;

    /// The full message of a commit.
    fn commit_message(&self, commit_id: &str) -> EngineResult<String>;

    /// Read a blob at `path` inside `tree_id`. `Ok(None)` if absent or not a blob.
    fn read_blob(&self, tree_id: &str, path: &str) -> EngineResult<Option<Vec<u8>>>;

    /// List the direct entries of a tree (non-recursive).
    fn list_tree(&self, tree_id: &str) -> EngineResult<Vec<TreeEntry>>;

    /// Write `bytes` as a blob, returning its id.
    fn write_blob(&self, bytes: &[u8]) -> EngineResult<String>;

    /// Compose a tree from a flat entry list, returning its id.
    fn compose_tree(&self, entries: &[TreeEntry]) -> EngineResult<String>;

    /// Create a commit, returning its id.
    fn create_commit(&self, request: CommitRequest<'_>) -> EngineResult<String>;

    /// Atomically create or update `name` to `new_id`, failing with
    /// [`crate::errors::EngineError::Conflict`] if the ref's current value
    /// does not match `expected_old` (`None` means "must not exist").
    fn update_ref(&self, name: &str, new_id: &str, expected_old: Option<&str>) -> EngineResult<()>;

    /// Delete a ref. Not an error if it does not exist.
    fn delete_ref(&self, name: &str) -> EngineResult<()>;

    /// Rename a ref, preserving its current value. Fails with `Conflict`
    /// if `to` already exists.
    fn rename_ref(&self, from: &str, to: &str) -> EngineResult<()>;

    /// List ref names starting with `prefix`.
    fn list_refs(&self, prefix: &str) -> EngineResult<Vec<String>>;

    /// Name-status diff between two commits.
    fn diff_name_status(&self, from: &str, to: &str) -> EngineResult<Vec<DiffEntry>>;

    /// Paths currently staged in the index.
    fn staged_paths(&self) -> EngineResult<Vec<String>>;

    /// Read the staged (index) content of a path, if any.
    fn staged_content(&self, path: &str) -> EngineResult<Option<Vec<u8>>>;

    /// Push `ref_name` to `remote`.
    fn push_ref(&self, remote: &str, ref_name: &str) -> EngineResult<()>;

    /// The hex id HEAD currently resolves to, if the repository has a commit.
    fn head_commit(&self) -> EngineResult<Option<String>>;
}

/// Graft `entry` into `base_tree` at the slash-separated `path`, creating
/// any intermediate subtrees as needed and replacing whatever previously
/// lived at that path. Used to compose the metadata subtree into a shadow
/// commit's tree, and to rebuild the sharded checkpoint tree on promotion.
pub fn graft_path(
    store: &dyn ObjectStore,
    base_tree: &str,
    path: &str,
    entry_kind: EntryKind,
    entry_id: &str,
) -> EngineResult<String> {
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    graft_components(store, base_tree, &components, entry_kind, entry_id)
}

/// Remove a single top-level entry from a tree (non-recursive). Used to
/// strip the engine's own metadata root before comparing a shadow commit's
/// tree against the user's HEAD tree.
pub fn strip_top_level(store: &dyn ObjectStore, tree_id: &str, name: &str) -> EngineResult<String> {
    let entries = store.list_tree(tree_id)?;
    let filtered: Vec<TreeEntry> = entries.into_iter().filter(|e| e.name != name).collect();
    store.compose_tree(&filtered)
}

fn graft_components(
    store: &dyn ObjectStore,
    tree_id: &str,
    components: &[&str],
    entry_kind: EntryKind,
    entry_id: &str,
) -> EngineResult<String> {
    let entries = store.list_tree(tree_id)?;
    if components.len() == 1 {
        let mut new_entries: Vec<TreeEntry> = entries.into_iter().filter(|e| e.name != components[0]).collect();
        new_entries.push(TreeEntry {
            name: components[0].to_string(),
            kind: entry_kind,
            id: entry_id.to_string(),
        });
        store.compose_tree(&new_entries)
    } else {
        let child_name = components[0];
        let child_tree_id = match entries.iter().find(|e| e.name == child_name && e.kind == EntryKind::Tree) {
            Some(entry) => entry.id.clone(),
            None => store.compose_tree(&[])?,
        };
        let new_child_id = graft_components(store, &child_tree_id, &components[1..], entry_kind, entry_id)?;
        let mut new_entries: Vec<TreeEntry> = entries.into_iter().filter(|e| e.name != child_name).collect();
        new_entries.push(TreeEntry {
            name: child_name.to_string(),
            kind: EntryKind::Tree,
            id: new_child_id,
        });
        store.compose_tree(&new_entries)
    }
}
