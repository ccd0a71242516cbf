//! # Action Handlers
//!
//! One handler per action family. Each handler owns the collaborators it
//! needs and decides the terminal outcome of the actions routed to it.
//! `ActionHandlers` is the routing table the engine dispatches through.

pub mod analysis;
pub mod browser;
pub mod command;
pub mod debug;
pub mod file;
pub mod git;
pub mod search;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::config::AppConfig;
use crate::domain::errors::ActionError;
use crate::domain::traits::{FileStore, PreviewSink, Sandbox, SearchProvider};
use crate::domain::types::{Action, ActionCategory, ActionResult};

pub use analysis::AnalysisHandler;
pub use browser::BrowserHandler;
pub use command::CommandHandler;
pub use debug::DebugHandler;
pub use file::FileHandler;
pub use git::GitHandler;
pub use search::SearchHandler;

/// Executes every action of one family.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    fn category(&self) -> ActionCategory;

    /// Runs `action`. A handled-but-unsuccessful outcome (e.g. a non-zero exit)
    /// is an `Ok` result with `success == false`.
    async fn handle(&self, action: &Action) -> Result<ActionResult, ActionError>;
}

/// The external systems handlers act upon.
#[derive(Clone)]
pub struct Collaborators {
    pub files: Arc<dyn FileStore>,
    pub sandbox: Arc<dyn Sandbox>,
    pub search: Arc<dyn SearchProvider>,
    pub preview: Arc<dyn PreviewSink>,
}

/// Routing table from action family to handler.
#[derive(Clone)]
pub struct ActionHandlers {
    handlers: HashMap<ActionCategory, Arc<dyn ActionHandler>>,
    git: Arc<GitHandler>,
}

impl ActionHandlers {
    pub fn new(collaborators: &Collaborators, config: &AppConfig) -> Self {
        let git = Arc::new(GitHandler::new(collaborators.sandbox.clone()));

        let mut table = Self {
            handlers: HashMap::new(),
            git: git.clone(),
        };
        table.register(Arc::new(FileHandler::new(
            collaborators.files.clone(),
            collaborators.sandbox.clone(),
        )));
        table.register(Arc::new(CommandHandler::new(
            collaborators.sandbox.clone(),
            config.commands.clone(),
        )));
        table.register(Arc::new(AnalysisHandler::new(collaborators.files.clone())));
        table.register(Arc::new(DebugHandler::new(
            collaborators.sandbox.clone(),
            collaborators.preview.clone(),
        )));
        table.register(Arc::new(BrowserHandler::new(collaborators.preview.clone())));
        table.register(Arc::new(SearchHandler::new(
            collaborators.search.clone(),
            config.search.max_results,
        )));
        table.register(git);
        table
    }

    /// Installs `handler` for its family, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(handler.category(), handler);
    }

    /// The git handler, also used by recovery for rollback.
    pub fn git(&self) -> Arc<GitHandler> {
        self.git.clone()
    }

    pub async fn dispatch(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let handler = action
            .kind
            .category()
            .and_then(|category| self.handlers.get(&category))
            .ok_or_else(|| ActionError::UnknownKind(action.kind.to_string()))?;
        handler.handle(action).await
    }
}

/// Required string field, trimmed; empty counts as missing.
pub(crate) fn required<'a>(
    value: Option<&'a str>,
    field: &'static str,
) -> Result<&'a str, ActionError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ActionError::MissingField(field))
}

/// At most `max` chars of `text`, cut on a char boundary.
pub(crate) fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ActionKind;
    use crate::test_support::Fixture;

    #[tokio::test]
    async fn test_unknown_kind_is_rejected() {
        let fixture = Fixture::new();
        let handlers = fixture.handlers();
        let err = handlers
            .dispatch(&Action::new(ActionKind::Unknown("teleport".into())))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown action type: teleport");
    }

    #[tokio::test]
    async fn test_routes_by_family() {
        let fixture = Fixture::new();
        let handlers = fixture.handlers();
        let result = handlers
            .dispatch(&Action::new(ActionKind::RefreshPreview))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(fixture.preview.events().len(), 1);
    }

    #[test]
    fn test_required_rejects_blank() {
        assert!(required(Some("  "), "path").is_err());
        assert_eq!(required(Some(" a.txt "), "path").unwrap(), "a.txt");
        assert!(matches!(
            required(None, "url"),
            Err(ActionError::MissingField("url"))
        ));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
