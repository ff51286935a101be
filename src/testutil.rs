//! Shared in-memory `ObjectStore` used by unit tests across modules.
//! Not part of the public API; compiled only under `#[cfg(test)]`.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::errors::{EngineError, EngineResult};
use crate::objectstore::{CommitRequest, DiffEntry, ObjectStore, Signature, TreeEntry};

pub struct MemStore {
    blobs: RefCell<HashMap<String, Vec<u8>>>,
    trees: RefCell<HashMap<String, Vec<TreeEntry>>>,
    commits: RefCell<HashMap<String, (String, Vec<String>, String)>>,
    refs: RefCell<HashMap<String, String>>,
    head: RefCell<Option<String>>,
    diffs: RefCell<HashMap<(String, String), Vec<DiffEntry>>>,
    staged: RefCell<HashMap<String, Vec<u8>>>,
    next_id: RefCell<u64>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            blobs: RefCell::new(HashMap::new()),
            trees: RefCell::new(HashMap::new()),
            commits: RefCell::new(HashMap::new()),
            refs: RefCell::new(HashMap::new()),
            head: RefCell::new(None),
            diffs: RefCell::new(HashMap::new()),
            staged: RefCell::new(HashMap::new()),
            next_id: RefCell::new(0),
        }
    }

    /// Point HEAD at `commit_id`, for tests that exercise HEAD-relative logic.
    pub fn set_head(&self, commit_id: &str) {
        *self.head.borrow_mut() = Some(commit_id.to_string());
    }

    /// Stub the name-status diff returned between two commits.
    pub fn set_diff(&self, from: &str, to: &str, entries: Vec<DiffEntry>) {
        self.diffs.borrow_mut().insert((from.to_string(), to.to_string()), entries);
    }

    /// Stub a staged (index) path's content.
    pub fn set_staged(&self, path: &str, content: &[u8]) {
        self.staged.borrow_mut().insert(path.to_string(), content.to_vec());
    }

    fn fresh_id(&self, prefix: &str) -> String {
        let mut next = self.next_id.borrow_mut();
        *next += 1;
        format!("{prefix}{:08x}", *next)
    }

    /// Seed a commit pointing at an empty tree, for use as a test fixture base.
    pub fn seed_commit(&self, message: &str, parent: Option<&str>) -> String {
        let tree_id = self.compose_tree(&[]).unwrap();
        self.create_commit(CommitRequest {
            tree_id: &tree_id,
            parents: &parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
            message,
            author: &test_signature(),
            committer: &test_signature(),
        })
        .unwrap()
    }
}

/// A throwaway author/committer identity for tests.
pub fn test_signature() -> Signature {
    Signature {
        name: "Test".into(),
        email: "test@example.com".into(),
        timestamp: 0,
    }
}

impl ObjectStore for MemStore {
    fn resolve_ref(&self, name: &str) -> EngineResult<Option<String>> {
        Ok(self.refs.borrow().get(name).cloned())
    }
    fn commit_tree_id(&self, commit_id: &str) -> EngineResult<String> {
        Ok(self.commits.borrow()[commit_id].0.clone())
    }
    fn commit_parents(&self, commit_id: &str) -> EngineResult<Vec<String>> {
        Ok(self.commits.borrow()[commit_id].1.clone())
    }
    fn commit_message(&self, commit_id: &str) -> EngineResult<String> {
        Ok(self.commits.borrow()[commit_id].2.clone())
    }
    fn read_blob(&self, tree_id: &str, path: &str) -> EngineResult<Option<Vec<u8>>> {
        let mut components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
        let mut current = tree_id.to_string();
        let leaf = components.pop().unwrap_or("");
        for component in components {
            let entries = self.trees.borrow()[&current].clone();
            match entries.into_iter().find(|e| e.name == component) {
                Some(e) => current = e.id,
                None => return Ok(None),
            }
        }
        let entries = self.trees.borrow()[&current].clone();
        Ok(entries
            .into_iter()
            .find(|e| e.name == leaf)
            .and_then(|e| self.blobs.borrow().get(&e.id).cloned()))
    }
    fn list_tree(&self, tree_id: &str) -> EngineResult<Vec<TreeEntry>> {
        Ok(self.trees.borrow().get(tree_id).cloned().unwrap_or_default())
    }
    fn write_blob(&self, bytes: &[u8]) -> EngineResult<String> {
        let id = self.fresh_id("blob");
        self.blobs.borrow_mut().insert(id.clone(), bytes.to_vec());
        Ok(id)
    }
    fn compose_tree(&self, entries: &[TreeEntry]) -> EngineResult<String> {
        let id = self.fresh_id("tree");
        self.trees.borrow_mut().insert(id.clone(), entries.to_vec());
        Ok(id)
    }
    fn create_commit(&self, request: CommitRequest<'_>) -> EngineResult<String> {
        let id = self.fresh_id("commit");
        self.commits.borrow_mut().insert(
            id.clone(),
            (
                request.tree_id.to_string(),
                request.parents.to_vec(),
                request.message.to_string(),
            ),
        );
        Ok(id)
    }
    fn update_ref(&self, name: &str, new_id: &str, expected_old: Option<&str>) -> EngineResult<()> {
        let mut refs = self.refs.borrow_mut();
        let current = refs.get(name).cloned();
        if current.as_deref() != expected_old {
            return Err(EngineError::ref_conflict(name));
        }
        refs.insert(name.to_string(), new_id.to_string());
        Ok(())
    }
    fn delete_ref(&self, name: &str) -> EngineResult<()> {
        self.refs.borrow_mut().remove(name);
        Ok(())
    }
    fn rename_ref(&self, from: &str, to: &str) -> EngineResult<()> {
        if let Some(id) = self.refs.borrow_mut().remove(from) {
            self.refs.borrow_mut().insert(to.to_string(), id);
        }
        Ok(())
    }
    fn list_refs(&self, prefix: &str) -> EngineResult<Vec<String>> {
        Ok(self
            .refs
            .borrow()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
    fn diff_name_status(&self, from: &str, to: &str) -> EngineResult<Vec<DiffEntry>> {
        Ok(self
            .diffs
            .borrow()
            .get(&(from.to_string(), to.to_string()))
            .cloned()
            .unwrap_or_default())
    }
    fn staged_paths(&self) -> EngineResult<Vec<String>> {
        Ok(self.staged.borrow().keys().cloned().collect())
    }
    fn staged_content(&self, path: &str) -> EngineResult<Option<Vec<u8>>> {
        Ok(self.staged.borrow().get(path).cloned())
    }
    fn push_ref(&self, _remote: &str, _ref_name: &str) -> EngineResult<()> {
        Ok(())
    }
    fn head_commit(&self) -> EngineResult<Option<String>> {
        Ok(self.head.borrow().clone())
    }
}
