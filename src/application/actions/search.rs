//! Web search action.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{ActionHandler, required, truncate_chars};
use crate::domain::errors::ActionError;
use crate::domain::traits::SearchProvider;
use crate::domain::types::{Action, ActionCategory, ActionResult, SearchResult};

const EXCERPT_CHARS: usize = 200;

pub struct SearchHandler {
    search: Arc<dyn SearchProvider>,
    max_results: usize,
}

impl SearchHandler {
    pub fn new(search: Arc<dyn SearchProvider>, max_results: usize) -> Self {
        Self {
            search,
            max_results,
        }
    }
}

#[async_trait]
impl ActionHandler for SearchHandler {
    fn category(&self) -> ActionCategory {
        ActionCategory::Search
    }

    async fn handle(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let query = required(action.search_query(), "query")?;
        info!("Searching the web for `{}`", query);

        let response = self.search.search(query).await?;
        let output = format_results(&response.results, self.max_results);
        let data = serde_json::to_value(&response).map_err(|e| ActionError::Collaborator(e.into()))?;

        Ok(ActionResult::ok(action, output).with_data(data))
    }
}

/// Numbered list of the top `max` results with short excerpts.
pub fn format_results(results: &[SearchResult], max: usize) -> String {
    if results.is_empty() {
        return "No results found".to_string();
    }
    results
        .iter()
        .take(max)
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{}. {}\n   {}\n   {}...",
                i + 1,
                r.title,
                r.url,
                truncate_chars(&r.content, EXCERPT_CHARS)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
