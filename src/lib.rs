//! Checkpoint engine - content-addressed staging for mid-session agent work.
//!
//! An agent coding session accumulates file edits between the user's own
//! commits. This crate stages that work on shadow git refs as the agent
//! steps, detects when the user's own commits overlap what the agent
//! touched, promotes the overlapping slice into durable sharded storage on
//! a metadata ref, and carries forward whatever the user hasn't committed
//! yet. It survives history rewrites (rebase, amend) by migrating the
//! affected session's shadow ref onto the new base commit.
//!
//! - **[`session`]** - per-session state: lifecycle, touched files, base commit
//! - **[`checkpoint`]** - temporary (shadow-ref) and committed (metadata-ref) storage
//! - **[`overlap`]** - byte-level overlap analysis between user and agent work
//! - **[`strategy`]** - the orchestrator invoked by hook points
//! - **[`objectstore`]** - the adapter trait onto the underlying git repository
//!
//! # Example
//!
//! ```no_run
//! use checkpoint_engine::config::EngineConfig;
//! use checkpoint_engine::objectstore::gix_store::GixStore;
//! use checkpoint_engine::session::SessionStore;
//! use checkpoint_engine::strategy::StrategyCoordinator;
//! use std::path::Path;
//!
//! # fn run() -> checkpoint_engine::errors::EngineResult<()> {
//! let config = EngineConfig::from_env();
//! let store = GixStore::open(Path::new("."), &config)?;
//! let sessions = SessionStore::new(Path::new(".git/checkpoint-sessions").to_path_buf(), config.stale_session_days);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

/// Closed error taxonomy.
pub mod errors;

/// Engine configuration and environment overrides.
pub mod config;

/// Shadow/metadata ref naming and checkpoint/project id schemes.
pub mod ident;

/// The object-store adapter trait and its `gix`-backed implementation.
pub mod objectstore;

/// Per-session state and its on-disk store.
pub mod session;

/// Temporary and committed checkpoint storage.
pub mod checkpoint;

/// Staged/committed/remaining overlap analysis.
pub mod overlap;

/// Commit-message trailer injection, parsing, and stripping.
pub mod trailer;

/// The `StrategyCoordinator` hook-driven state machine.
pub mod strategy;

#[cfg(test)]
mod testutil;

/// Convenient re-exports of the types most callers need.
pub mod prelude {
    pub use crate::checkpoint::{committed, temporary, CheckpointSummary, CommittedMetadata, PromotionRequest};
    pub use crate::config::EngineConfig;
    pub use crate::errors::{EngineError, EngineResult};
    pub use crate::objectstore::{ObjectStore, Signature};
    pub use crate::session::{Phase, SessionState, SessionStore};
    pub use crate::strategy::{CommitSource, StepInput, StrategyCoordinator, TranscriptSource, ValidationOutcome};
}
