//! Strategy coordinator: the orchestrator invoked by external hook points.
//! Drives the state machine described in the component design: record step,
//! prepare/validate commit message, post-commit promotion and
//! carry-forward, pre-push.

use chrono::Utc;
use tracing::warn;

use crate::checkpoint::{committed, temporary, PromotionRequest};
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::ident;
use crate::objectstore::{ObjectStore, Signature};
use crate::overlap;
use crate::session::{Phase, SessionState, SessionStore};
use crate::trailer;

/// Where a pending commit message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitSource {
    Normal,
    Merge,
    Amend,
}

/// Outcome of message-validate.
pub enum ValidationOutcome {
    /// The user added real content; proceed with the commit unmodified.
    Proceed,
    /// The message had nothing but the engine's own trailer; the trailer
    /// has been stripped from the returned message and the host should
    /// abort the commit (non-zero exit) so the underlying tool treats it
    /// as empty.
    Abort(String),
}

/// Supplies transcript/prompt/context bytes for a session at promotion
/// time. Parsing agent-specific transcript formats is a host concern; the
/// default implementation here supplies nothing, matching the "or empty"
/// fallback the promotion algorithm allows.
pub trait TranscriptSource {
    fn transcript(&self, session_id: &str) -> Vec<u8>;
    fn prompts(&self, session_id: &str) -> Vec<String>;
    fn context(&self, session_id: &str) -> Vec<u8>;
}

/// The "(c) empty" fallback transcript source.
pub struct EmptyTranscriptSource;

impl TranscriptSource for EmptyTranscriptSource {
    fn transcript(&self, _session_id: &str) -> Vec<u8> {
        Vec::new()
    }
    fn prompts(&self, _session_id: &str) -> Vec<String> {
        Vec::new()
    }
    fn context(&self, _session_id: &str) -> Vec<u8> {
        Vec::new()
    }
}

/// Per-step input from the agent adapter.
pub struct StepInput {
    pub modified_files: Vec<String>,
    pub new_files: Vec<String>,
    pub deleted_files: Vec<String>,
    pub commit_subject: String,
    pub token_usage: u64,
    pub prompt: Option<String>,
    pub transcript_identifier: Option<String>,
}

/// Drives the engine's hook-invoked state machine for one worktree.
pub struct StrategyCoordinator<'a> {
    store: &'a dyn ObjectStore,
    sessions: &'a SessionStore,
    config: &'a EngineConfig,
    worktree_id: Option<String>,
    strategy_name: String,
    agent: String,
    project_namespace: Option<String>,
    author: Signature,
}

impl<'a> StrategyCoordinator<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        sessions: &'a SessionStore,
        config: &'a EngineConfig,
        worktree_id: Option<String>,
        strategy_name: String,
        agent: String,
        project_namespace: Option<String>,
        author: Signature,
    ) -> Self {
        Self {
            store,
            sessions,
            config,
            worktree_id,
            strategy_name,
            agent,
            project_namespace,
            author,
        }
    }

    /// Record a top-level agent step.
    pub async fn record_step(&self, session_id: &str, step: &StepInput) -> EngineResult<()> {
        let metadata_dir = format!("{}/sessions/{session_id}", self.config.metadata_root);
        self.record_step_inner(session_id, &metadata_dir, step).await
    }

    /// Record a sub-agent/task step under a nested metadata path.
    pub async fn record_task_step(&self, session_id: &str, tool_use_id: &str, step: &StepInput) -> EngineResult<()> {
        let metadata_dir = format!("{}/sessions/{session_id}/tasks/{tool_use_id}", self.config.metadata_root);
        self.record_step_inner(session_id, &metadata_dir, step).await
    }

    async fn record_step_inner(&self, session_id: &str, metadata_dir: &str, step: &StepInput) -> EngineResult<()> {
        let head = self
            .store
            .head_commit()?
            .ok_or_else(|| EngineError::NotFound("HEAD".to_string()))?;

        let mut session = match self.sessions.load(session_id).await? {
            Some(existing) => existing,
            None => SessionState::new(session_id.to_string(), head.clone(), self.worktree_id.clone(), Utc::now()),
        };

        if session.base_commit != head {
            let old_ref = ident::shadow_ref_name(self.config, &session.base_commit, session.worktree_id.as_deref());
            let new_ref = ident::shadow_ref_name(self.config, &head, session.worktree_id.as_deref());
            if let Err(err) = self.store.rename_ref(&old_ref, &new_ref) {
                warn!(session_id, error = %err, "shadow ref migration failed; continuing with updated base only");
            }
            session.base_commit = head.clone();
        }

        let commit_message = format!(
            "{}\n\n{}: {session_id}\n{}: {}\n{}: {metadata_dir}",
            step.commit_subject, self.config.session_trailer, self.config.strategy_trailer, self.strategy_name, self.config.metadata_trailer
        );

        let request = temporary::TemporaryWriteRequest {
            session_id,
            base_commit: &session.base_commit,
            head_commit: &head,
            worktree_id: session.worktree_id.as_deref(),
            modified_files: &step.modified_files,
            new_files: &step.new_files,
            deleted_files: &step.deleted_files,
            metadata_dir,
            commit_message: &commit_message,
            author: &self.author,
        };

        let result = match temporary::write(self.store, self.config, &request) {
            Ok(result) => result,
            Err(err) => {
                warn!(session_id, error = %err, "temporary checkpoint write failed; next step will retry");
                return Ok(());
            }
        };

        if !result.skipped {
            session.step_count += 1;
            session.merge_files_touched(step.modified_files.iter().cloned());
            session.merge_files_touched(step.new_files.iter().cloned());
            session.merge_files_touched(step.deleted_files.iter().cloned());
            session.token_usage += step.token_usage;
            if session.step_count == 1 {
                session.transcript_identifier_at_start = step.transcript_identifier.clone();
                session.first_prompt = step.prompt.clone();
            }
        }

        self.sessions.save(&session).await
    }

    /// Inject a checkpoint trailer into a pending commit message, if the
    /// user's staged changes overlap agent-tracked work. Idempotent: a
    /// message that already carries the trailer is returned unchanged
    /// regardless of `source`, so repeated calls (amend, or a hook firing
    /// twice) never produce more than one trailer line.
    pub async fn prepare_commit_message(&self, message: &str, source: CommitSource) -> EngineResult<String> {
        if source == CommitSource::Merge {
            return Ok(message.to_string());
        }
        if trailer::parse_trailer(message, &self.config.checkpoint_trailer).is_some() {
            return Ok(message.to_string());
        }

        let Some(head) = self.store.head_commit()? else {
            return Ok(message.to_string());
        };
        let candidates = self.sessions.active_at_base(&head).await?;

        for session in candidates {
            let shadow_ref = ident::shadow_ref_name(self.config, &session.base_commit, session.worktree_id.as_deref());
            let Some(shadow_tip) = self.store.resolve_ref(&shadow_ref)? else {
                continue;
            };
            let shadow_tree = self.store.commit_tree_id(&shadow_tip)?;
            let overlap = overlap::staged_overlap(self.store, &session.files_touched, &shadow_tree)?;
            if overlap.is_empty() {
                continue;
            }
            let id = session
                .last_checkpoint_id
                .clone()
                .filter(|id| ident::is_valid_checkpoint_id(id))
                .unwrap_or_else(ident::new_checkpoint_id);
            return Ok(trailer::inject_trailer(message, &self.config.checkpoint_trailer, &id));
        }
        Ok(message.to_string())
    }

    /// Strip the checkpoint trailer from an otherwise-untouched message.
    pub fn validate_commit_message(&self, message: &str) -> ValidationOutcome {
        if trailer::is_effectively_empty(message, &[self.config.checkpoint_trailer.as_str()]) {
            ValidationOutcome::Abort(trailer::strip_trailer(message, &self.config.checkpoint_trailer))
        } else {
            ValidationOutcome::Proceed
        }
    }

    /// Promote overlapping sessions and carry forward the remainder.
    pub async fn post_commit(&self, transcripts: &dyn TranscriptSource) -> EngineResult<()> {
        let Some(head) = self.store.head_commit()? else {
            return Ok(());
        };
        let parents = self.store.commit_parents(&head)?;
        let Some(parent) = parents.into_iter().next() else {
            return Ok(());
        };
        let message = self.store.commit_message(&head)?;
        let Some(checkpoint_id) = trailer::parse_trailer(&message, &self.config.checkpoint_trailer) else {
            return Ok(());
        };

        let diff = self.store.diff_name_status(&parent, &head)?;
        let head_tree = self.store.commit_tree_id(&head)?;
        let candidates = self.sessions.active_at_base(&parent).await?;

        for mut session in candidates {
            if let Err(err) = self
                .promote_session(&mut session, &checkpoint_id, &diff, &head, &head_tree, transcripts)
                .await
            {
                warn!(session_id = %session.session_id, error = %err, "checkpoint promotion failed; agent work preserved on shadow ref");
            }
        }
        Ok(())
    }

    async fn promote_session(
        &self,
        session: &mut SessionState,
        checkpoint_id: &str,
        diff: &[crate::objectstore::DiffEntry],
        head: &str,
        head_tree: &str,
        transcripts: &dyn TranscriptSource,
    ) -> EngineResult<()> {
        let shadow_ref = ident::shadow_ref_name(self.config, &session.base_commit, session.worktree_id.as_deref());
        let Some(shadow_tip) = self.store.resolve_ref(&shadow_ref)? else {
            return Ok(());
        };
        let shadow_tree = self.store.commit_tree_id(&shadow_tip)?;

        let committed_files = overlap::committed_overlap(self.store, &session.files_touched, diff, head_tree, &shadow_tree)?;
        if committed_files.is_empty() {
            return Ok(());
        }

        let request = PromotionRequest {
            checkpoint_id,
            session_id: &session.session_id,
            strategy: &self.strategy_name,
            agent: &self.agent,
            branch: None,
            transcript: &transcripts.transcript(&session.session_id),
            prompts: &transcripts.prompts(&session.session_id),
            context: &transcripts.context(&session.session_id),
            files_touched: &committed_files,
            checkpoints_count: session.step_count.max(1) as u32,
            turn_id: None,
            transcript_identifier_at_start: session.transcript_identifier_at_start.as_deref(),
            checkpoint_transcript_start: 0,
            token_usage: Some(session.token_usage),
            summary: None,
            initial_attribution: session.first_prompt.as_deref(),
        };
        committed::write(self.store, self.config, self.project_namespace.as_deref(), &self.author, &request)?;

        let remainder = overlap::remaining_agent_work(self.store, &session.files_touched, &committed_files, &shadow_tree, head_tree)?;

        if remainder.is_empty() {
            if let Err(err) = self.store.delete_ref(&shadow_ref) {
                warn!(session_id = %session.session_id, %shadow_ref, error = %err, "shadow ref delete failed; orphan cleanup will remove it later");
            }
            session.rebase_onto(head.to_string(), Vec::new(), Some(checkpoint_id.to_string()));
            session.phase = Phase::Idle;
        } else {
            session.rebase_onto(head.to_string(), remainder, Some(checkpoint_id.to_string()));
        }

        self.sessions.save(session).await
    }

    /// Best-effort push of the metadata ref.
    pub fn pre_push(&self, remote: &str) -> EngineResult<()> {
        let metadata_ref = self.config.metadata_ref(self.project_namespace.as_deref());
        match self.store.resolve_ref(&metadata_ref) {
            Ok(Some(_)) => {
                if let Err(err) = self.store.push_ref(remote, &metadata_ref) {
                    warn!(%remote, %metadata_ref, error = %err, "metadata ref push failed");
                }
            }
            Ok(None) => {}
            Err(err) => warn!(%metadata_ref, error = %err, "failed to resolve metadata ref before push"),
        }
        Ok(())
    }
}
