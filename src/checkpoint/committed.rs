//! Committed checkpoint write/read/list (sharded metadata-ref subtrees).

use chrono::Utc;

use crate::checkpoint::chunk;
use crate::config::EngineConfig;
use crate::errors::{EngineError, EngineResult};
use crate::ident;
use crate::objectstore::{graft_path, CommitRequest, EntryKind, ObjectStore, Signature};

use super::{CheckpointSummary, CommittedMetadata, PromotionRequest};

const SESSION_INDEX_FIRST: &str = "1";

/// Write a committed checkpoint, appending it to the metadata ref.
pub fn write(
    store: &dyn ObjectStore,
    config: &EngineConfig,
    project_namespace: Option<&str>,
    author: &Signature,
    request: &PromotionRequest<'_>,
) -> EngineResult<()> {
    let metadata_ref = config.metadata_ref(project_namespace);
    let current_tip = store.resolve_ref(&metadata_ref)?;
    let now = Utc::now();

    let root_tree = match &current_tip {
        Some(tip) => store.commit_tree_id(tip)?,
        None => store.compose_tree(&[])?,
    };

    let (shard, rest) = ident::checkpoint_shard_path(request.checkpoint_id);
    let checkpoint_path = format!("{shard}/{rest}");

    let transcript_chunks = chunk::split_lines(request.transcript, config.chunk_size_bytes);

    let committed_metadata = CommittedMetadata {
        session_id: request.session_id.to_string(),
        strategy: request.strategy.to_string(),
        agent: request.agent.to_string(),
        turn_id: request.turn_id.map(str::to_string),
        branch: request.branch.map(str::to_string),
        transcript_identifier_at_start: request.transcript_identifier_at_start.map(str::to_string),
        checkpoint_transcript_start: request.checkpoint_transcript_start,
        token_usage: request.token_usage,
        summary: request.summary.map(str::to_string),
        initial_attribution: request.initial_attribution.map(str::to_string),
        files_touched: request.files_touched.to_vec(),
        created_at: now,
        transcript_chunk_count: transcript_chunks.len(),
    };
    let summary = CheckpointSummary {
        checkpoint_id: request.checkpoint_id.to_string(),
        created_at: now,
        checkpoints_count: request.checkpoints_count,
        files_touched: request.files_touched.to_vec(),
        session_ids: vec![request.session_id.to_string()],
    };

    let metadata_blob = store.write_blob(&serde_json::to_vec_pretty(&committed_metadata)?)?;
    let summary_blob = store.write_blob(&serde_json::to_vec_pretty(&summary)?)?;
    let prompt_blob = store.write_blob(request.prompts.join("\n---\n").as_bytes())?;
    let context_blob = store.write_blob(request.context)?;

    let mut tree = graft_path(
        store,
        &root_tree,
        &format!("{checkpoint_path}/metadata.json"),
        EntryKind::Blob,
        &summary_blob,
    )?;
    tree = graft_path(
        store,
        &tree,
        &format!("{checkpoint_path}/{SESSION_INDEX_FIRST}/metadata.json"),
        EntryKind::Blob,
        &metadata_blob,
    )?;
    if transcript_chunks.len() == 1 {
        let transcript_blob = store.write_blob(&transcript_chunks[0])?;
        tree = graft_path(
            store,
            &tree,
            &format!("{checkpoint_path}/{SESSION_INDEX_FIRST}/full.jsonl"),
            EntryKind::Blob,
            &transcript_blob,
        )?;
    } else {
        for (index, piece) in transcript_chunks.iter().enumerate() {
            let chunk_blob = store.write_blob(piece)?;
            tree = graft_path(
                store,
                &tree,
                &format!("{checkpoint_path}/{SESSION_INDEX_FIRST}/full.jsonl/{index:04}"),
                EntryKind::Blob,
                &chunk_blob,
            )?;
        }
    }
    tree = graft_path(
        store,
        &tree,
        &format!("{checkpoint_path}/{SESSION_INDEX_FIRST}/prompt.txt"),
        EntryKind::Blob,
        &prompt_blob,
    )?;
    tree = graft_path(
        store,
        &tree,
        &format!("{checkpoint_path}/{SESSION_INDEX_FIRST}/context.md"),
        EntryKind::Blob,
        &context_blob,
    )?;

    let message = format!("Checkpoint-Checkpoint: {}\n\nSession: {}", request.checkpoint_id, request.session_id);
    let parents = current_tip.clone().into_iter().collect::<Vec<_>>();
    let commit_id = store.create_commit(CommitRequest {
        tree_id: &tree,
        parents: &parents,
        message: &message,
        author,
        committer: author,
    })?;

    store.update_ref(&metadata_ref, &commit_id, current_tip.as_deref())
}

/// Read a committed checkpoint's top-level summary.
pub fn read_summary(
    store: &dyn ObjectStore,
    config: &EngineConfig,
    project_namespace: Option<&str>,
    checkpoint_id: &str,
) -> EngineResult<Option<CheckpointSummary>> {
    let metadata_ref = config.metadata_ref(project_namespace);
    let Some(tip) = store.resolve_ref(&metadata_ref)? else {
        return Ok(None);
    };
    let tree_id = store.commit_tree_id(&tip)?;
    let (shard, rest) = ident::checkpoint_shard_path(checkpoint_id);
    let path = format!("{shard}/{rest}/metadata.json");
    let Some(bytes) = store.read_blob(&tree_id, &path)? else {
        return Ok(None);
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Full content of a session bundled into a committed checkpoint.
pub struct SessionContent {
    pub metadata: CommittedMetadata,
    pub transcript: Vec<u8>,
    pub prompts: String,
    pub context: Vec<u8>,
}

/// Read the full content bundle for one session within a checkpoint.
pub fn read_session_content(
    store: &dyn ObjectStore,
    config: &EngineConfig,
    project_namespace: Option<&str>,
    checkpoint_id: &str,
    session_index: &str,
) -> EngineResult<SessionContent> {
    let metadata_ref = config.metadata_ref(project_namespace);
    let tip = store
        .resolve_ref(&metadata_ref)?
        .ok_or_else(|| EngineError::NotFound(format!("metadata ref {metadata_ref}")))?;
    let tree_id = store.commit_tree_id(&tip)?;
    let (shard, rest) = ident::checkpoint_shard_path(checkpoint_id);
    let base = format!("{shard}/{rest}/{session_index}");

    let not_found = |what: &str| EngineError::NotFound(format!("{what} for checkpoint {checkpoint_id}"));

    let metadata_bytes = store
        .read_blob(&tree_id, &format!("{base}/metadata.json"))?
        .ok_or_else(|| not_found("metadata"))?;
    let metadata: CommittedMetadata = serde_json::from_slice(&metadata_bytes)?;

    let transcript = if metadata.transcript_chunk_count <= 1 {
        store
            .read_blob(&tree_id, &format!("{base}/full.jsonl"))?
            .ok_or_else(|| not_found("transcript"))?
    } else {
        let mut chunks = Vec::with_capacity(metadata.transcript_chunk_count);
        for index in 0..metadata.transcript_chunk_count {
            let piece = store
                .read_blob(&tree_id, &format!("{base}/full.jsonl/{index:04}"))?
                .ok_or_else(|| not_found("transcript chunk"))?;
            chunks.push(piece);
        }
        chunk::reassemble(&chunks)
    };
    let prompt_bytes = store
        .read_blob(&tree_id, &format!("{base}/prompt.txt"))?
        .ok_or_else(|| not_found("prompts"))?;
    let context = store
        .read_blob(&tree_id, &format!("{base}/context.md"))?
        .ok_or_else(|| not_found("context"))?;

    Ok(SessionContent {
        metadata,
        transcript,
        prompts: String::from_utf8_lossy(&prompt_bytes).to_string(),
        context,
    })
}

/// List committed checkpoints newest-first, by walking the metadata ref's
/// commit log and hydrating each checkpoint's summary.
pub fn list(
    store: &dyn ObjectStore,
    config: &EngineConfig,
    project_namespace: Option<&str>,
    limit: usize,
) -> EngineResult<Vec<CheckpointSummary>> {
    let metadata_ref = config.metadata_ref(project_namespace);
    let Some(mut cursor) = store.resolve_ref(&metadata_ref)? else {
        return Ok(Vec::new());
    };

    let mut summaries = Vec::new();
    loop {
        let message = store.commit_message(&cursor)?;
        if let Some(id) = message
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("Checkpoint-Checkpoint: "))
        {
            if let Some(summary) = read_summary(store, config, project_namespace, id)? {
                summaries.push(summary);
                if summaries.len() >= limit {
                    break;
                }
            }
        }
        let parents = store.commit_parents(&cursor)?;
        match parents.into_iter().next() {
            Some(parent) => cursor = parent,
            None => break,
        }
    }
    Ok(summaries)
}
