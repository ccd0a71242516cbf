//! # Domain Traits
//!
//! Interfaces to the collaborators the engine drives (project store, sandbox,
//! search, preview) and to the caller's progress and approval hooks.
//! Implementations live in the Infrastructure layer or in the embedding app.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::domain::types::{
    Action, ActionResult, CommandOutput, FileNode, PreviewEvent, SearchResponse, SearchResult,
};

/// The in-memory project tree the UI renders.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Create or replace the file at `path`, creating parent directories.
    async fn upsert(&self, path: &str, content: &str) -> Result<()>;

    /// Remove the node at `path`. Removing a missing path is not an error.
    async fn remove(&self, path: &str) -> Result<()>;

    /// Content of the file at `path`, `None` if absent or not a file.
    async fn read(&self, path: &str) -> Result<Option<String>>;

    /// Snapshot of the whole tree.
    async fn tree(&self) -> Vec<FileNode>;
}

/// The execution environment that runs processes and serves the preview.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Whether the sandbox is booted and accepting work.
    fn is_running(&self) -> bool;

    async fn write_file(&self, path: &str, content: &str) -> Result<()>;

    async fn delete_file(&self, path: &str) -> Result<()>;

    async fn read_file(&self, path: &str) -> Result<String>;

    /// Run `argv` to completion. A non-zero exit is an `Ok` with that code.
    async fn run(&self, argv: &[String], timeout: Option<Duration>) -> Result<CommandOutput>;

    /// Recent terminal output, oldest first.
    fn terminal_output(&self) -> Vec<String>;

    fn append_terminal_output(&self, line: &str);

    /// Last environment-level failure, if any.
    fn last_error(&self) -> Option<String>;
}

/// Web search used by `web_search` and by the recovery controller.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResponse>;
}

/// The live preview surface.
pub trait PreviewSink: Send + Sync {
    fn emit(&self, event: PreviewEvent) -> Result<()>;

    /// Browser console lines captured from the preview, oldest first.
    fn console_output(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Answer from an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    Granted,
    Rejected,
    /// Nobody is listening for approvals; the engine proceeds (fail-open).
    Unhandled,
}

impl From<bool> for Approval {
    fn from(granted: bool) -> Self {
        if granted { Self::Granted } else { Self::Rejected }
    }
}

/// Failure details passed to `ExecutionHooks::on_action_error`.
#[derive(Debug, Clone)]
pub struct ActionFailure {
    pub action: Action,
    pub error: String,
    pub retry_count: u32,
    pub search_results: Option<Vec<SearchResult>>,
}

/// Progress and approval callbacks supplied by the caller.
/// Every method has a no-op default.
#[async_trait]
pub trait ExecutionHooks: Send + Sync {
    fn on_action_start(&self, _action: &Action) {}

    fn on_action_complete(&self, _result: &ActionResult) {}

    fn on_action_error(&self, _failure: &ActionFailure) {}

    async fn on_approval_required(&self, _action: &Action) -> Approval {
        Approval::Unhandled
    }
}

/// Progress callbacks for the recovery protocol.
pub trait RecoveryHooks: Send + Sync {
    fn on_retry(&self, _attempt: u32, _last_error: &str) {}

    fn on_searching(&self, _query: &str) {}

    fn on_rollback(&self) {}
}
