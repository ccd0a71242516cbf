//! # Domain Types
//!
//! The data model shared by the response interpreter and the action engine:
//! reasoning steps, actions and their lifecycle, execution results, and the
//! value types exchanged with collaborators.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Every action kind the interpreter can emit and the engine can route.
///
/// Unknown kinds are carried through verbatim as `Unknown` so a malformed
/// response never fails to parse; the engine rejects them at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    CreateFile,
    ModifyFile,
    DeleteFile,
    ReadFile,
    RunCommand,
    ListFiles,
    AnalyzeCode,
    GetLogs,
    GetErrors,
    RefreshPreview,
    NavigateTo,
    WebSearch,
    GitCheckpoint,
    GitRevert,
    GitStatus,
    GitDiff,
    Unknown(String),
}

/// Handler family an action kind is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    File,
    Command,
    Analysis,
    Debug,
    Browser,
    Search,
    Git,
}

impl ActionKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "create_file" => Self::CreateFile,
            "modify_file" => Self::ModifyFile,
            "delete_file" => Self::DeleteFile,
            "read_file" => Self::ReadFile,
            "run_command" => Self::RunCommand,
            "list_files" => Self::ListFiles,
            "analyze_code" => Self::AnalyzeCode,
            "get_logs" => Self::GetLogs,
            "get_errors" => Self::GetErrors,
            "refresh_preview" => Self::RefreshPreview,
            "navigate_to" => Self::NavigateTo,
            "web_search" => Self::WebSearch,
            "git_checkpoint" => Self::GitCheckpoint,
            "git_revert" => Self::GitRevert,
            "git_status" => Self::GitStatus,
            "git_diff" => Self::GitDiff,
            _ => Self::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateFile => "create_file",
            Self::ModifyFile => "modify_file",
            Self::DeleteFile => "delete_file",
            Self::ReadFile => "read_file",
            Self::RunCommand => "run_command",
            Self::ListFiles => "list_files",
            Self::AnalyzeCode => "analyze_code",
            Self::GetLogs => "get_logs",
            Self::GetErrors => "get_errors",
            Self::RefreshPreview => "refresh_preview",
            Self::NavigateTo => "navigate_to",
            Self::WebSearch => "web_search",
            Self::GitCheckpoint => "git_checkpoint",
            Self::GitRevert => "git_revert",
            Self::GitStatus => "git_status",
            Self::GitDiff => "git_diff",
            Self::Unknown(raw) => raw,
        }
    }

    /// The handler family for this kind, `None` for unknown kinds.
    pub fn category(&self) -> Option<ActionCategory> {
        match self {
            Self::CreateFile | Self::ModifyFile | Self::DeleteFile | Self::ReadFile => {
                Some(ActionCategory::File)
            }
            Self::RunCommand => Some(ActionCategory::Command),
            Self::ListFiles | Self::AnalyzeCode => Some(ActionCategory::Analysis),
            Self::GetLogs | Self::GetErrors => Some(ActionCategory::Debug),
            Self::RefreshPreview | Self::NavigateTo => Some(ActionCategory::Browser),
            Self::WebSearch => Some(ActionCategory::Search),
            Self::GitCheckpoint | Self::GitRevert | Self::GitStatus | Self::GitDiff => {
                Some(ActionCategory::Git)
            }
            Self::Unknown(_) => None,
        }
    }

    /// Kinds that need approval in supervised mode.
    pub fn is_dangerous(&self) -> bool {
        matches!(self, Self::RunCommand | Self::DeleteFile)
    }

    /// Kinds that never change the project or the sandbox.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            Self::ReadFile
                | Self::ListFiles
                | Self::AnalyzeCode
                | Self::GetLogs
                | Self::GetErrors
                | Self::WebSearch
                | Self::GitStatus
                | Self::GitDiff
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ActionKind {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Lifecycle of an action. The interpreter only ever produces `InProgress`
/// and `Completed`; the engine owns the remaining transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Pending,
    InProgress,
    WaitingApproval,
    Completed,
    Error,
}

/// One discrete effect requested by the model.
///
/// Fields are optional because the interpreter surfaces actions before their
/// attributes and body have fully arrived; handlers validate what they need.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Line delta such as `+45` for file kinds, line count for `get_logs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u32>,
}

impl Default for ActionKind {
    fn default() -> Self {
        Self::Unknown(String::new())
    }
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Command line for `run_command`: the `command` attribute, else the body.
    pub fn command_line(&self) -> Option<&str> {
        self.command
            .as_deref()
            .or(self.content.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    /// Query for `web_search`: the `query` attribute, else the body.
    pub fn search_query(&self) -> Option<&str> {
        self.query
            .as_deref()
            .or(self.content.as_deref())
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// A titled piece of model reasoning.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub title: String,
    pub content: String,
}

/// Everything the interpreter knows about a response so far.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StructuredResult {
    pub reasoning: Vec<ReasoningStep>,
    pub actions: Vec<Action>,
    pub message: String,
    pub is_complete: bool,
}

/// Supervised (`Spec`) or autonomous (`Fast`) execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Spec,
    Fast,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spec => f.write_str("spec"),
            Self::Fast => f.write_str("fast"),
        }
    }
}

/// Outcome of executing one action. Never an `Err`: failures are data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// False for policy rejections, which recovery must not retry.
    #[serde(default = "default_retryable")]
    pub retryable: bool,
}

fn default_retryable() -> bool {
    true
}

impl ActionResult {
    pub fn ok(action: &Action, output: impl Into<String>) -> Self {
        Self {
            success: true,
            action: action.clone(),
            output: Some(output.into()),
            data: None,
            error: None,
            retryable: true,
        }
    }

    pub fn failed(action: &Action, error: impl Into<String>) -> Self {
        Self {
            success: false,
            action: action.clone(),
            output: None,
            data: None,
            error: Some(error.into()),
            retryable: true,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn non_retryable(mut self) -> Self {
        self.retryable = false;
        self
    }
}

/// One hit returned by the search collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
    #[serde(default)]
    pub score: f64,
}

/// Wire shape of the search endpoint's response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// What `analyze_code` should look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzeTarget {
    Dependencies,
    Structure,
    Errors,
    Unused,
}

impl FromStr for AnalyzeTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dependencies" => Ok(Self::Dependencies),
            "structure" => Ok(Self::Structure),
            "errors" => Ok(Self::Errors),
            "unused" => Ok(Self::Unused),
            other => Err(other.to_string()),
        }
    }
}

/// Where `get_logs` reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSource {
    Terminal,
    Console,
    #[default]
    All,
}

impl FromStr for LogSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "terminal" => Ok(Self::Terminal),
            "console" => Ok(Self::Console),
            "all" => Ok(Self::All),
            other => Err(other.to_string()),
        }
    }
}

/// Exit code and combined output of a sandbox process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub output: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Directory,
}

/// A node of the in-memory project tree. Paths are `/`-separated and relative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl FileNode {
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }
}

/// Events consumed by the live preview surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewEvent {
    Refresh,
    Navigate { url: String },
}
