//! Debug actions: recent logs and error detection over terminal history.

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, LazyLock};

use super::ActionHandler;
use crate::domain::errors::ActionError;
use crate::domain::traits::{PreviewSink, Sandbox};
use crate::domain::types::{Action, ActionCategory, ActionKind, ActionResult, LogSource};

const DEFAULT_LOG_LINES: usize = 50;

static ERROR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)error:",
        r"ERR!",
        r"(?i)failed",
        r"ENOENT",
        r"EACCES",
        r"SyntaxError",
        r"TypeError",
        r"ReferenceError",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

#[derive(Debug, Serialize)]
struct DetectedError {
    source: &'static str,
    message: String,
}

pub struct DebugHandler {
    sandbox: Arc<dyn Sandbox>,
    preview: Arc<dyn PreviewSink>,
}

impl DebugHandler {
    pub fn new(sandbox: Arc<dyn Sandbox>, preview: Arc<dyn PreviewSink>) -> Self {
        Self { sandbox, preview }
    }

    fn get_logs(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let lines = match action.lines.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_LOG_LINES,
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| ActionError::invalid("lines", raw))?,
        };
        let source = match action.source.as_deref() {
            None => LogSource::default(),
            Some(raw) => raw
                .parse()
                .map_err(|value: String| ActionError::invalid("source", value))?,
        };

        let logs = match source {
            LogSource::Terminal => self.sandbox.terminal_output(),
            LogSource::Console => self.preview.console_output(),
            LogSource::All => {
                let mut all = self.sandbox.terminal_output();
                all.extend(self.preview.console_output());
                all
            }
        };
        let tail = &logs[logs.len().saturating_sub(lines)..];

        Ok(ActionResult::ok(action, tail.concat())
            .with_data(json!({ "lines": tail.len(), "source": source })))
    }

    fn get_errors(&self, action: &Action) -> ActionResult {
        let mut errors = Vec::new();

        if let Some(message) = self.sandbox.last_error() {
            errors.push(DetectedError {
                source: "sandbox",
                message,
            });
        }
        for line in self.sandbox.terminal_output() {
            if ERROR_PATTERNS.iter().any(|p| p.is_match(&line)) {
                errors.push(DetectedError {
                    source: "terminal",
                    message: line.trim().to_string(),
                });
            }
        }

        let output = if errors.is_empty() {
            "No errors found".to_string()
        } else {
            errors
                .iter()
                .map(|e| format!("[{}] {}", e.source, e.message))
                .collect::<Vec<_>>()
                .join("\n")
        };
        ActionResult::ok(action, output).with_data(json!({ "errors": errors }))
    }
}

#[async_trait]
impl ActionHandler for DebugHandler {
    fn category(&self) -> ActionCategory {
        ActionCategory::Debug
    }

    async fn handle(&self, action: &Action) -> Result<ActionResult, ActionError> {
        match action.kind {
            ActionKind::GetLogs => self.get_logs(action),
            ActionKind::GetErrors => Ok(self.get_errors(action)),
            _ => Err(ActionError::UnknownKind(action.kind.to_string())),
        }
    }
}
