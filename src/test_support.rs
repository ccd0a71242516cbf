//! Shared doubles for unit tests: recording collaborators and hooks.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::application::actions::{ActionHandlers, Collaborators};
use crate::application::engine::ActionExecutor;
use crate::domain::config::AppConfig;
use crate::domain::traits::{
    ActionFailure, Approval, ExecutionHooks, PreviewSink, RecoveryHooks, Sandbox, SearchProvider,
};
use crate::domain::types::{
    Action, ActionResult, CommandOutput, ExecutionMode, PreviewEvent, SearchResponse, SearchResult,
};
use crate::infrastructure::memory_store::MemoryFileStore;

type Responder = Box<dyn Fn(&[String]) -> Result<CommandOutput> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    pub argv: Vec<String>,
    pub timeout: Option<Duration>,
}

/// Sandbox that keeps files in a map and answers commands from a closure.
pub struct MockSandbox {
    running: Mutex<bool>,
    files: Mutex<HashMap<String, String>>,
    commands: Mutex<Vec<RecordedCommand>>,
    responder: Mutex<Responder>,
    terminal: Mutex<Vec<String>>,
    last_error: Mutex<Option<String>>,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self {
            running: Mutex::new(true),
            files: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            responder: Mutex::new(Box::new(|_| {
                Ok(CommandOutput {
                    exit_code: 0,
                    output: String::new(),
                })
            })),
            terminal: Mutex::new(Vec::new()),
            last_error: Mutex::new(None),
        }
    }

    pub fn set_running(&self, running: bool) {
        *self.running.lock().unwrap() = running;
    }

    pub fn put_file(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn respond<F>(&self, responder: F)
    where
        F: Fn(&[String]) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        *self.responder.lock().unwrap() = Box::new(responder);
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn set_last_error(&self, error: &str) {
        *self.last_error.lock().unwrap() = Some(error.to_string());
    }
}

#[async_trait]
impl Sandbox for MockSandbox {
    fn is_running(&self) -> bool {
        *self.running.lock().unwrap()
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.put_file(path, content);
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        self.file(path)
            .ok_or_else(|| anyhow::anyhow!("ENOENT: no such file: {}", path))
    }

    async fn run(&self, argv: &[String], timeout: Option<Duration>) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(RecordedCommand {
            argv: argv.to_vec(),
            timeout,
        });
        (self.responder.lock().unwrap())(argv)
    }

    fn terminal_output(&self) -> Vec<String> {
        self.terminal.lock().unwrap().clone()
    }

    fn append_terminal_output(&self, line: &str) {
        self.terminal.lock().unwrap().push(line.to_string());
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }
}

#[derive(Default)]
pub struct MockSearch {
    results: Mutex<Vec<SearchResult>>,
    queries: Mutex<Vec<String>>,
}

impl MockSearch {
    pub fn set_results(&self, results: Vec<SearchResult>) {
        *self.results.lock().unwrap() = results;
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for MockSearch {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(SearchResponse {
            query: query.to_string(),
            results: self.results.lock().unwrap().clone(),
        })
    }
}

#[derive(Default)]
pub struct MockPreview {
    events: Mutex<Vec<PreviewEvent>>,
    console: Mutex<Vec<String>>,
}

impl MockPreview {
    pub fn events(&self) -> Vec<PreviewEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn push_console(&self, line: &str) {
        self.console.lock().unwrap().push(line.to_string());
    }
}

impl PreviewSink for MockPreview {
    fn emit(&self, event: PreviewEvent) -> Result<()> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    fn console_output(&self) -> Vec<String> {
        self.console.lock().unwrap().clone()
    }
}

pub struct Fixture {
    pub files: Arc<MemoryFileStore>,
    pub sandbox: Arc<MockSandbox>,
    pub search: Arc<MockSearch>,
    pub preview: Arc<MockPreview>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            files: Arc::new(MemoryFileStore::new()),
            sandbox: Arc::new(MockSandbox::new()),
            search: Arc::new(MockSearch::default()),
            preview: Arc::new(MockPreview::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            files: self.files.clone(),
            sandbox: self.sandbox.clone(),
            search: self.search.clone(),
            preview: self.preview.clone(),
        }
    }

    pub fn handlers(&self) -> ActionHandlers {
        ActionHandlers::new(&self.collaborators(), &AppConfig::default())
    }

    /// Executor with no retry delay.
    pub fn executor(&self, mode: ExecutionMode) -> ActionExecutor {
        let mut config = AppConfig::default();
        config.executor.mode = mode;
        config.recovery.base_delay_ms = 0;
        ActionExecutor::new(&self.collaborators(), &config)
    }
}

/// Execution hooks that log every call as `"<event> <kind>"`.
pub struct RecordingHooks {
    answer: Approval,
    events: Mutex<Vec<String>>,
    failures: Mutex<Vec<ActionFailure>>,
}

impl Default for RecordingHooks {
    fn default() -> Self {
        Self::answering(Approval::Unhandled)
    }
}

impl RecordingHooks {
    pub fn answering(answer: Approval) -> Self {
        Self {
            answer,
            events: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn last_failure(&self) -> Option<ActionFailure> {
        self.failures.lock().unwrap().last().cloned()
    }

    fn record(&self, event: &str, action: &Action) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{} {}", event, action.kind));
    }
}

#[async_trait]
impl ExecutionHooks for RecordingHooks {
    fn on_action_start(&self, action: &Action) {
        self.record("start", action);
    }

    fn on_action_complete(&self, result: &ActionResult) {
        self.record("complete", &result.action);
    }

    fn on_action_error(&self, failure: &ActionFailure) {
        self.record("error", &failure.action);
        self.failures.lock().unwrap().push(failure.clone());
    }

    async fn on_approval_required(&self, action: &Action) -> Approval {
        self.record("approval", action);
        self.answer
    }
}

#[derive(Default)]
pub struct RecordingRecoveryHooks {
    events: Mutex<Vec<String>>,
}

impl RecordingRecoveryHooks {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl RecoveryHooks for RecordingRecoveryHooks {
    fn on_retry(&self, attempt: u32, _last_error: &str) {
        self.events.lock().unwrap().push(format!("retry {}", attempt));
    }

    fn on_searching(&self, _query: &str) {
        self.events.lock().unwrap().push("search".to_string());
    }

    fn on_rollback(&self) {
        self.events.lock().unwrap().push("rollback".to_string());
    }
}

pub fn search_result(title: &str) -> SearchResult {
    SearchResult {
        title: title.to_string(),
        url: format!("https://example.com/{}", title.to_lowercase().replace(' ', "-")),
        content: format!("{} content", title),
        score: 1.0,
    }
}
