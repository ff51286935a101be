//! `gix`-backed implementation of [`ObjectStore`], with a handful of
//! operations shelled out to the `git` plumbing binary where the object
//! database alone doesn't expose live worktree/index state.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use gix::refs::transaction::PreviousValue;
use gix::ObjectId;

use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};

use super::{CommitRequest, DiffEntry, DiffStatus, EntryKind, ObjectStore, TreeEntry};

/// A repository opened via `gix`, with `git` available on `PATH` for the
/// worktree-state operations `gix` does not cover.
pub struct GixStore {
    repo: gix::Repository,
    worktree_root: PathBuf,
    op_timeout: Duration,
    push_timeout: Duration,
}

impl GixStore {
    /// Open an existing repository rooted at `path`, bounding every shelled-out
    /// `git` invocation by `config`'s timeouts.
    pub fn open(path: &Path, config: &EngineConfig) -> EngineResult<Self> {
        let repo = gix::open(path)
            .map_err(|err| EngineError::Invalid(format!("failed to open repository: {err}")))?;
        let worktree_root = repo
            .work_dir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.to_path_buf());
        Ok(Self {
            repo,
            worktree_root,
            op_timeout: Duration::from_secs(config.op_timeout_secs),
            push_timeout: Duration::from_secs(config.push_timeout_secs),
        })
    }

    fn parse_id(hex: &str) -> EngineResult<ObjectId> {
        ObjectId::from_hex(hex.as_bytes())
            .map_err(|err| EngineError::Invalid(format!("malformed object id {hex}: {err}")))
    }

    fn run_git(&self, args: &[&str]) -> EngineResult<std::process::Output> {
        self.run_git_bounded(args, self.op_timeout)
    }

    /// Spawn `git` and wait for it to finish, killing it and returning
    /// [`EngineError::Timeout`] if it runs past `timeout`.
    fn run_git_bounded(&self, args: &[&str], timeout: Duration) -> EngineResult<std::process::Output> {
        let mut child = Command::new("git")
            .args(args)
            .current_dir(&self.worktree_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(EngineError::from)?;

        let deadline = Instant::now() + timeout;
        loop {
            if child.try_wait().map_err(EngineError::from)?.is_some() {
                break;
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                return Err(EngineError::Timeout(format!(
                    "git {} timed out after {timeout:?}",
                    args.join(" ")
                )));
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        child.wait_with_output().map_err(EngineError::from)
    }
}

impl ObjectStore for GixStore {
    fn resolve_ref(&self, name: &str) -> EngineResult<Option<String>> {
        match self.repo.find_reference(name) {
            Ok(mut reference) => {
                let id = reference
                    .peel_to_id_in_place()
                    .map_err(|err| EngineError::Invalid(format!("failed to peel {name}: {err}")))?;
                Ok(Some(id.to_hex().to_string()))
            }
            Err(gix::reference::find::existing::Error::NotFound { .. }) => Ok(None),
            Err(err) => Err(EngineError::Invalid(format!("failed to resolve {name}: {err}"))),
        }
    }

    fn commit_tree_id(&self, commit_id: &str) -> EngineResult<String> {
        let id = Self::parse_id(commit_id)?;
        let commit = self
            .repo
            .find_commit(id)
            .map_err(|err| EngineError::NotFound(format!("commit {commit_id}: {err}")))?;
        let tree_id = commit
            .tree_id()
            .map_err(|err| EngineError::Invalid(format!("commit {commit_id} has no tree: {err}")))?;
        Ok(tree_id.to_hex().to_string())
    }

    fn commit_parents(&self, commit_id: &str) -> EngineResult<Vec<String>> {
        let id = Self::parse_id(commit_id)?;
        let commit = self
            .repo
            .find_commit(id)
            .map_err(|err| EngineError::NotFound(format!("commit {commit_id}: {err}")))?;
        Ok(commit.parent_ids().map(|p| p.to_hex().to_string()).collect())
    }

    fn commit_message(&self, commit_id: &str) -> EngineResult<String> {
        let id = Self::parse_id(commit_id)?;
        let commit = self
            .repo
            .find_commit(id)
            .map_err(|err| EngineError::NotFound(format!("commit {commit_id}: {err}")))?;
        let message = commit
            .message()
            .map_err(|err| EngineError::Invalid(format!("malformed commit message: {err}")))?;
        Ok(message.title.to_string() + &message.body.map(|b| format!("\n\n{b}")).unwrap_or_default())
    }

    fn read_blob(&self, tree_id: &str, path: &str) -> EngineResult<Option<Vec<u8>>> {
        let id = Self::parse_id(tree_id)?;
        let tree = self
            .repo
            .find_tree(id)
            .map_err(|err| EngineError::NotFound(format!("tree {tree_id}: {err}")))?;
        let Some(entry) = tree
            .lookup_entry_by_path(path)
            .map_err(|err| EngineError::Invalid(format!("tree lookup failed for {path}: {err}")))?
        else {
            return Ok(None);
        };
        if entry.mode().is_tree() {
            return Ok(None);
        }
        let object = entry
            .object()
            .map_err(|err| EngineError::Invalid(format!("failed to load blob at {path}: {err}")))?;
        Ok(Some(object.data.to_vec()))
    }

    fn list_tree(&self, tree_id: &str) -> EngineResult<Vec<TreeEntry>> {
        let id = Self::parse_id(tree_id)?;
        let tree = self
            .repo
            .find_tree(id)
            .map_err(|err| EngineError::NotFound(format!("tree {tree_id}: {err}")))?;
        let mut entries = Vec::new();
        for entry in tree.iter() {
            let entry = entry.map_err(|err| EngineError::Invalid(format!("corrupt tree entry: {err}")))?;
            let kind = if entry.mode().is_tree() {
                EntryKind::Tree
            } else {
                EntryKind::Blob
            };
            entries.push(TreeEntry {
                name: entry.filename().to_string(),
                kind,
                id: entry.oid().to_hex().to_string(),
            });
        }
        Ok(entries)
    }

    fn write_blob(&self, bytes: &[u8]) -> EngineResult<String> {
        let id = self
            .repo
            .write_blob(bytes)
            .map_err(|err| EngineError::Io(std::io::Error::other(err.to_string())))?;
        Ok(id.detach().to_hex().to_string())
    }

    fn compose_tree(&self, entries: &[TreeEntry]) -> EngineResult<String> {
        let empty_tree = self
            .repo
            .empty_tree()
            .id()
            .detach();
        let mut editor = self
            .repo
            .edit_tree(empty_tree)
            .map_err(|err| EngineError::Invalid(format!("failed to start tree edit: {err}")))?;
        for entry in entries {
            let id = Self::parse_id(&entry.id)?;
            let mode = match entry.kind {
                EntryKind::Blob => gix::object::tree::EntryKind::Blob,
                EntryKind::Tree => gix::object::tree::EntryKind::Tree,
            };
            editor
                .upsert(entry.name.as_str(), mode, id)
                .map_err(|err| EngineError::Invalid(format!("failed to upsert {}: {err}", entry.name)))?;
        }
        let tree_id = editor
            .write()
            .map_err(|err| EngineError::Invalid(format!("failed to write tree: {err}")))?;
        Ok(tree_id.detach().to_hex().to_string())
    }

    fn create_commit(&self, request: CommitRequest<'_>) -> EngineResult<String> {
        let tree_id = Self::parse_id(request.tree_id)?;
        let parents: EngineResult<Vec<ObjectId>> = request.parents.iter().map(|p| Self::parse_id(p)).collect();
        let parents = parents?;

        let to_signature = |sig: &super::Signature| gix::actor::Signature {
            name: sig.name.clone().into(),
            email: sig.email.clone().into(),
            time: gix::date::Time::new(sig.timestamp, 0),
        };
        let author = to_signature(request.author);
        let committer = to_signature(request.committer);

        let commit_id = self
            .repo
            .commit_as(
                committer.to_ref(&mut Vec::new().into()),
                author.to_ref(&mut Vec::new().into()),
                "HEAD",
                request.message,
                tree_id,
                parents,
            )
            .map_err(|err| EngineError::Invalid(format!("failed to create commit: {err}")))?;
        Ok(commit_id.detach().to_hex().to_string())
    }

    fn update_ref(&self, name: &str, new_id: &str, expected_old: Option<&str>) -> EngineResult<()> {
        let new_id = Self::parse_id(new_id)?;
        let previous = match expected_old {
            Some(old) => PreviousValue::MustExistAndMatch(Self::parse_id(old)?.into()),
            None => PreviousValue::MustNotExist,
        };
        self.repo
            .edit_reference(gix::refs::transaction::RefEdit {
                change: gix::refs::transaction::Change::Update {
                    log: Default::default(),
                    expected: previous,
                    new: gix::refs::Target::Object(new_id),
                },
                name: name
                    .try_into()
                    .map_err(|err| EngineError::Invalid(format!("invalid ref name {name}: {err}")))?,
                deref: false,
            })
            .map_err(|_| EngineError::ref_conflict(name))?;
        Ok(())
    }

    fn delete_ref(&self, name: &str) -> EngineResult<()> {
        match self.repo.find_reference(name) {
            Ok(reference) => {
                reference
                    .delete()
                    .map_err(|err| EngineError::Invalid(format!("failed to delete {name}: {err}")))?;
                Ok(())
            }
            Err(_) => Ok(()),
        }
    }

    fn rename_ref(&self, from: &str, to: &str) -> EngineResult<()> {
        let Some(current) = self.resolve_ref(from)? else {
            return Ok(());
        };
        if self.resolve_ref(to)?.is_some() {
            return Err(EngineError::ref_conflict(to));
        }
        self.update_ref(to, &current, None)?;
        self.delete_ref(from)
    }

    fn list_refs(&self, prefix: &str) -> EngineResult<Vec<String>> {
        let platform = self
            .repo
            .references()
            .map_err(|err| EngineError::Invalid(format!("failed to list refs: {err}")))?;
        let mut names = Vec::new();
        for reference in platform
            .prefixed(prefix)
            .map_err(|err| EngineError::Invalid(format!("failed to list refs under {prefix}: {err}")))?
        {
            let reference = reference.map_err(|err| EngineError::Invalid(format!("corrupt ref entry: {err}")))?;
            names.push(reference.name().as_bstr().to_string());
        }
        Ok(names)
    }

    fn diff_name_status(&self, from: &str, to: &str) -> EngineResult<Vec<DiffEntry>> {
        let output = self.run_git(&["diff", "--name-status", from, to])?;
        let text = String::from_utf8_lossy(&output.stdout);
        let mut entries = Vec::new();
        for line in text.lines() {
            let mut parts = line.splitn(2, '\t');
            let (Some(code), Some(path)) = (parts.next(), parts.next()) else {
                continue;
            };
            let status = match code.chars().next() {
                Some('A') => DiffStatus::Added,
                Some('D') => DiffStatus::Deleted,
                _ => DiffStatus::Modified,
            };
            entries.push(DiffEntry {
                path: path.to_string(),
                status,
            });
        }
        Ok(entries)
    }

    fn staged_paths(&self) -> EngineResult<Vec<String>> {
        let output = self.run_git(&["diff", "--name-only", "--cached"])?;
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(text.lines().map(str::to_string).collect())
    }

    fn staged_content(&self, path: &str) -> EngineResult<Option<Vec<u8>>> {
        let output = self.run_git(&["show", &format!(":{path}")])?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(output.stdout))
    }

    fn push_ref(&self, remote: &str, ref_name: &str) -> EngineResult<()> {
        let output = self.run_git_bounded(&["push", remote, ref_name], self.push_timeout)?;
        if !output.status.success() {
            return Err(EngineError::Invalid(format!(
                "push of {ref_name} to {remote} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }

    fn head_commit(&self) -> EngineResult<Option<String>> {
        let head = self
            .repo
            .head()
            .map_err(|err| EngineError::Invalid(format!("failed to read HEAD: {err}")))?;
        if head.is_unborn() {
            return Ok(None);
        }
        let id = head
            .into_peeled_id()
            .map_err(|err| EngineError::Invalid(format!("failed to peel HEAD: {err}")))?;
        Ok(Some(id.to_hex().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectstore::Signature;
    use std::process::Command;

    fn init_repo() -> (tempfile::TempDir, GixStore) {
        let dir = tempfile::tempdir().unwrap();
        gix::init(dir.path()).unwrap();
        Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "Test"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        let store = GixStore::open(dir.path(), &EngineConfig::default()).unwrap();
        (dir, store)
    }

    fn sig() -> Signature {
        Signature {
            name: "Test".into(),
            email: "test@example.com".into(),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn unborn_head_has_no_commit() {
        let (_dir, store) = init_repo();
        assert!(store.head_commit().unwrap().is_none());
    }

    #[test]
    fn write_compose_commit_and_update_ref_round_trip() {
        let (_dir, store) = init_repo();

        let blob_id = store.write_blob(b"hello").unwrap();
        let tree_id = store
            .compose_tree(&[TreeEntry {
                name: "a.txt".to_string(),
                kind: EntryKind::Blob,
                id: blob_id,
            }])
            .unwrap();
        let commit_id = store
            .create_commit(CommitRequest {
                tree_id: &tree_id,
                parents: &[],
                message: "initial",
                author: &sig(),
                committer: &sig(),
            })
            .unwrap();

        store.update_ref("refs/heads/main", &commit_id, None).unwrap();
        assert_eq!(store.resolve_ref("refs/heads/main").unwrap(), Some(commit_id.clone()));
        assert_eq!(store.commit_tree_id(&commit_id).unwrap(), tree_id);

        let entries = store.list_tree(&tree_id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a.txt");

        let content = store.read_blob(&tree_id, "a.txt").unwrap().unwrap();
        assert_eq!(content, b"hello");
    }

    #[test]
    fn rename_ref_moves_value_and_fails_on_existing_target() {
        let (_dir, store) = init_repo();
        let tree_id = store.compose_tree(&[]).unwrap();
        let commit_id = store
            .create_commit(CommitRequest {
                tree_id: &tree_id,
                parents: &[],
                message: "initial",
                author: &sig(),
                committer: &sig(),
            })
            .unwrap();
        store.update_ref("refs/checkpoint/base1", &commit_id, None).unwrap();

        store.rename_ref("refs/checkpoint/base1", "refs/checkpoint/base2").unwrap();
        assert!(store.resolve_ref("refs/checkpoint/base1").unwrap().is_none());
        assert_eq!(store.resolve_ref("refs/checkpoint/base2").unwrap(), Some(commit_id.clone()));

        store.update_ref("refs/checkpoint/base1", &commit_id, None).unwrap();
        assert!(store.rename_ref("refs/checkpoint/base1", "refs/checkpoint/base2").is_err());
    }

    #[test]
    fn list_refs_filters_by_prefix() {
        let (_dir, store) = init_repo();
        let tree_id = store.compose_tree(&[]).unwrap();
        let commit_id = store
            .create_commit(CommitRequest {
                tree_id: &tree_id,
                parents: &[],
                message: "initial",
                author: &sig(),
                committer: &sig(),
            })
            .unwrap();
        store.update_ref("refs/checkpoint/abc1234", &commit_id, None).unwrap();
        store.update_ref("refs/heads/main", &commit_id, None).unwrap();

        let names = store.list_refs("refs/checkpoint/").unwrap();
        assert_eq!(names, vec!["refs/checkpoint/abc1234".to_string()]);
    }

    #[test]
    fn diff_name_status_reports_worktree_level_changes() {
        let (dir, store) = init_repo();
        let blob_a = store.write_blob(b"one").unwrap();
        let tree_a = store
            .compose_tree(&[TreeEntry {
                name: "a.txt".to_string(),
                kind: EntryKind::Blob,
                id: blob_a,
            }])
            .unwrap();
        let commit_a = store
            .create_commit(CommitRequest {
                tree_id: &tree_a,
                parents: &[],
                message: "first",
                author: &sig(),
                committer: &sig(),
            })
            .unwrap();

        let blob_b = store.write_blob(b"two").unwrap();
        let tree_b = store
            .compose_tree(&[TreeEntry {
                name: "a.txt".to_string(),
                kind: EntryKind::Blob,
                id: blob_b,
            }])
            .unwrap();
        let commit_b = store
            .create_commit(CommitRequest {
                tree_id: &tree_b,
                parents: &[commit_a.clone()],
                message: "second",
                author: &sig(),
                committer: &sig(),
            })
            .unwrap();

        let _ = dir;
        let diff = store.diff_name_status(&commit_a, &commit_b).unwrap();
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].path, "a.txt");
        assert_eq!(diff[0].status, DiffStatus::Modified);
    }
}
