//! File actions: create, modify, delete and read against the project store,
//! mirrored into the sandbox while it is running.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ActionHandler, required};
use crate::domain::errors::ActionError;
use crate::domain::traits::{FileStore, Sandbox};
use crate::domain::types::{Action, ActionCategory, ActionKind, ActionResult};

pub struct FileHandler {
    files: Arc<dyn FileStore>,
    sandbox: Arc<dyn Sandbox>,
}

impl FileHandler {
    pub fn new(files: Arc<dyn FileStore>, sandbox: Arc<dyn Sandbox>) -> Self {
        Self { files, sandbox }
    }

    async fn write(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let path = required(action.path.as_deref(), "path")?;
        let content = action.content.as_deref().unwrap_or_default();
        let modify = action.kind == ActionKind::ModifyFile;

        if modify && self.files.read(path).await?.is_none() {
            debug!("{} does not exist yet, creating it", path);
        }

        self.files.upsert(path, content).await?;
        if self.sandbox.is_running() {
            self.sandbox.write_file(path, content).await?;
            debug!("Mirrored {} into the sandbox", path);
        }
        info!("Wrote {} ({} bytes)", path, content.len());

        let output = match (modify, action.lines.as_deref()) {
            (true, Some(lines)) => format!("Modified file: {} ({} lines)", path, lines),
            (true, None) => format!("Modified file: {}", path),
            (false, _) => format!("Created file: {}", path),
        };
        Ok(ActionResult::ok(action, output))
    }

    async fn delete(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let path = required(action.path.as_deref(), "path")?;

        self.files.remove(path).await?;
        if self.sandbox.is_running() {
            self.sandbox.delete_file(path).await?;
        }
        info!("Deleted {}", path);

        Ok(ActionResult::ok(action, format!("Deleted file: {}", path)))
    }

    async fn read(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let path = required(action.path.as_deref(), "path")?;

        if let Some(content) = self.files.read(path).await? {
            return Ok(ActionResult::ok(action, content).with_data(json!({ "source": "file_store" })));
        }

        if self.sandbox.is_running() {
            let content = self.sandbox.read_file(path).await?;
            return Ok(ActionResult::ok(action, content).with_data(json!({ "source": "sandbox" })));
        }

        Err(ActionError::NotFound(path.to_string()))
    }
}

#[async_trait]
impl ActionHandler for FileHandler {
    fn category(&self) -> ActionCategory {
        ActionCategory::File
    }

    async fn handle(&self, action: &Action) -> Result<ActionResult, ActionError> {
        match action.kind {
            ActionKind::CreateFile | ActionKind::ModifyFile => self.write(action).await,
            ActionKind::DeleteFile => self.delete(action).await,
            ActionKind::ReadFile => self.read(action).await,
            _ => Err(ActionError::UnknownKind(action.kind.to_string())),
        }
    }
}
