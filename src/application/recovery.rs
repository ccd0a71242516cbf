//! # Recovery Controller
//!
//! Wraps a failed action in a bounded three-phase protocol, each phase only
//! entered when the previous one did not recover:
//! 1. retry with linear backoff (`attempt * base_delay` between attempts)
//! 2. web search on the error, then one more attempt if anything was found
//! 3. `git reset --hard HEAD~1` through the git handler; always terminal

use regex::Regex;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::application::actions::{ActionHandler, GitHandler, truncate_chars};
use crate::domain::config::RecoveryConfig;
use crate::domain::traits::{RecoveryHooks, SearchProvider};
use crate::domain::types::{Action, ActionKind, ActionResult, SearchResult};

const MAX_EXCERPT_CHARS: usize = 100;
const QUERY_SUFFIX: &str = "fix solution";

static STACK_FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*at\s.*$").unwrap());
static ERROR_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:[Ee]rror:|ERR!)").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone)]
pub struct RecoveryOptions {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub enable_web_search: bool,
    pub enable_git_rollback: bool,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self::from(&RecoveryConfig::default())
    }
}

impl From<&RecoveryConfig> for RecoveryOptions {
    fn from(config: &RecoveryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            enable_web_search: config.enable_web_search,
            enable_git_rollback: config.enable_git_rollback,
        }
    }
}

/// Outcome of one recovery run.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RecoveryResult {
    pub recovered: bool,
    /// Executions performed by the protocol itself.
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<SearchResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rolled_back: Option<bool>,
}

pub struct RecoveryController {
    search: Arc<dyn SearchProvider>,
    git: Arc<GitHandler>,
    hooks: Option<Arc<dyn RecoveryHooks>>,
}

impl RecoveryController {
    pub fn new(search: Arc<dyn SearchProvider>, git: Arc<GitHandler>) -> Self {
        Self {
            search,
            git,
            hooks: None,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn RecoveryHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Runs the protocol for `action`, calling `execute` for every attempt.
    pub async fn attempt_recovery<F, Fut>(
        &self,
        execute: F,
        action: &Action,
        options: &RecoveryOptions,
    ) -> RecoveryResult
    where
        F: Fn() -> Fut,
        Fut: Future<Output = ActionResult>,
    {
        let mut outcome = RecoveryResult::default();
        let mut last_error = String::new();

        // Phase 1: bounded retry
        for attempt in 1..=options.max_retries {
            if attempt > 1 {
                sleep(retry_delay(options.base_delay, attempt - 1)).await;
            }
            info!(
                "Retrying {} (attempt {}/{})",
                action.kind, attempt, options.max_retries
            );
            if let Some(hooks) = &self.hooks {
                hooks.on_retry(attempt, &last_error);
            }

            let result = execute().await;
            outcome.attempts += 1;
            if result.success {
                info!("{} recovered after {} attempt(s)", action.kind, attempt);
                outcome.recovered = true;
                return outcome;
            }

            last_error = failure_message(&result);
            if !result.retryable {
                warn!("{} failed with a non-retryable error: {}", action.kind, last_error);
                outcome.final_error = Some(last_error);
                return outcome;
            }
        }

        // Phase 2: search-assisted retry
        if options.enable_web_search {
            let query = build_search_query(action, &last_error);
            info!("Searching for a fix: {}", query);
            if let Some(hooks) = &self.hooks {
                hooks.on_searching(&query);
            }

            match self.search.search(&query).await {
                Ok(response) if !response.results.is_empty() => {
                    outcome.search_results = Some(response.results);
                    let result = execute().await;
                    outcome.attempts += 1;
                    if result.success {
                        info!("{} recovered after searching", action.kind);
                        outcome.recovered = true;
                        return outcome;
                    }
                    last_error = failure_message(&result);
                }
                Ok(_) => {
                    info!("Search returned no results");
                    outcome.search_results = Some(Vec::new());
                }
                Err(e) => warn!("Search failed during recovery: {:#}", e),
            }
        }

        // Phase 3: rollback
        if options.enable_git_rollback {
            warn!("Rolling back one checkpoint after {} failed", action.kind);
            if let Some(hooks) = &self.hooks {
                hooks.on_rollback();
            }
            let mut revert = Action::new(ActionKind::GitRevert);
            revert.steps = Some(1);
            let rolled_back = match self.git.handle(&revert).await {
                Ok(result) => result.success,
                Err(e) => {
                    warn!("Rollback failed: {}", e);
                    false
                }
            };
            outcome.rolled_back = Some(rolled_back);
        }

        outcome.final_error = Some(last_error);
        outcome
    }
}

fn failure_message(result: &ActionResult) -> String {
    result
        .error
        .clone()
        .unwrap_or_else(|| "Unknown error".to_string())
}

/// Wait before retry number `attempt + 1`.
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

/// `"<context> <cleaned error> fix solution"` for the search phase.
pub fn build_search_query(action: &Action, error: &str) -> String {
    let context = technology_context(action);
    let excerpt = clean_error_excerpt(error);
    if excerpt.is_empty() {
        format!("{} {}", context, QUERY_SUFFIX)
    } else {
        format!("{} {} {}", context, excerpt, QUERY_SUFFIX)
    }
}

fn technology_context(action: &Action) -> String {
    match action.kind {
        ActionKind::CreateFile | ActionKind::ModifyFile => {
            let ext = action
                .path
                .as_deref()
                .and_then(|p| p.rsplit_once('.'))
                .map(|(_, ext)| ext.to_lowercase())
                .unwrap_or_default();
            match ext.as_str() {
                "tsx" => "React TypeScript",
                "ts" => "TypeScript",
                "jsx" => "React",
                "js" => "JavaScript",
                "css" => "CSS",
                "html" => "HTML",
                "json" => "JSON",
                "py" => "Python",
                "rs" => "Rust",
                _ => "code",
            }
            .to_string()
        }
        ActionKind::RunCommand => {
            let program = action
                .command_line()
                .and_then(|c| c.split_whitespace().next())
                .unwrap_or_default();
            match program {
                "node" => "Node.js",
                "python" | "python3" => "Python",
                "cargo" => "Rust",
                "git" => "git",
                "npm" | "npx" => "npm",
                _ => "shell command",
            }
            .to_string()
        }
        _ => action.kind.to_string(),
    }
}

/// Error text without stack frames, labels or control characters,
/// collapsed to one line and capped.
pub fn clean_error_excerpt(error: &str) -> String {
    let without_frames = STACK_FRAME_RE.replace_all(error, "");
    let without_labels = ERROR_LABEL_RE.replace_all(&without_frames, "");
    let printable: String = without_labels
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let collapsed = WHITESPACE_RE.replace_all(printable.trim(), " ");
    truncate_chars(&collapsed, MAX_EXCERPT_CHARS).trim_end().to_string()
}
