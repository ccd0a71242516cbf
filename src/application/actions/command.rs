//! # Command Actions
//!
//! Runs `run_command` actions in the sandbox. Package-manager invocations are
//! blocked up front: the generated projects are plain HTML/CSS/JS and have no
//! package manager available.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use super::{ActionHandler, required};
use crate::domain::config::CommandsConfig;
use crate::domain::errors::ActionError;
use crate::domain::traits::Sandbox;
use crate::domain::types::{Action, ActionCategory, ActionResult};

const BLOCKED_REASON: &str = "Package manager commands are blocked in vanilla environment";
const BLOCKED_GUIDANCE: &str =
    "Package managers are not available here. Write the code directly instead, e.g. put styles in styles.css.";

pub struct CommandHandler {
    sandbox: Arc<dyn Sandbox>,
    config: CommandsConfig,
}

impl CommandHandler {
    pub fn new(sandbox: Arc<dyn Sandbox>, config: CommandsConfig) -> Self {
        Self { sandbox, config }
    }

    /// Case-insensitive prefix match against the configured denylist.
    pub fn is_blocked(&self, command: &str) -> bool {
        let lower = command.trim().to_lowercase();
        self.config
            .blocked_prefixes
            .iter()
            .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
    }
}

#[async_trait]
impl ActionHandler for CommandHandler {
    fn category(&self) -> ActionCategory {
        ActionCategory::Command
    }

    async fn handle(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let command = required(action.command_line(), "command")?;

        if self.is_blocked(command) {
            warn!("Blocked command: {}", command);
            self.sandbox.append_terminal_output(&format!("$ {}\n", command));
            self.sandbox
                .append_terminal_output(&format!("Blocked: {}\n", BLOCKED_REASON));
            self.sandbox
                .append_terminal_output(&format!("{}\n\n", BLOCKED_GUIDANCE));
            return Err(ActionError::Blocked {
                reason: BLOCKED_REASON.to_string(),
                guidance: BLOCKED_GUIDANCE.to_string(),
            });
        }

        if !self.sandbox.is_running() {
            return Err(ActionError::SandboxNotRunning);
        }

        let argv = split_args(command);
        if argv.is_empty() {
            return Err(ActionError::MissingField("command"));
        }
        let timeout = self.config.timeout_for(action.timeout);

        self.sandbox.append_terminal_output(&format!("$ {}\n", command));
        info!("Running `{}` (timeout {:?})", command, timeout);
        let output = self.sandbox.run(&argv, Some(timeout)).await?;

        let data = json!({
            "exit_code": output.exit_code,
            "stdout": output.output,
            "stderr": "",
        });

        if output.success() {
            Ok(ActionResult::ok(action, output.output).with_data(data))
        } else {
            warn!("`{}` exited with {}", command, output.exit_code);
            Ok(ActionResult::failed(
                action,
                format!("Command failed with exit code {}", output.exit_code),
            )
            .with_output(output.output)
            .with_data(data))
        }
    }
}

/// Splits a command line into argv, honouring single and double quotes.
pub fn split_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut has_token = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' if !in_double => {
                in_single = !in_single;
                has_token = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                has_token = true;
            }
            '\\' if in_double => {
                // Only quote and backslash are escapable inside double quotes
                match chars.peek() {
                    Some(&next) if next == '"' || next == '\\' => {
                        current.push(next);
                        chars.next();
                    }
                    _ => current.push(c),
                }
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            _ => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if has_token {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ActionKind, CommandOutput};
    use crate::test_support::Fixture;
    use std::time::Duration;

    fn handler(fixture: &Fixture) -> CommandHandler {
        CommandHandler::new(fixture.sandbox.clone(), CommandsConfig::default())
    }

    #[test]
    fn test_split_args() {
        assert_eq!(split_args("node server.js"), vec!["node", "server.js"]);
        assert_eq!(
            split_args(r#"git commit -m "first commit""#),
            vec!["git", "commit", "-m", "first commit"]
        );
        assert_eq!(split_args("echo 'a  b' \"\""), vec!["echo", "a  b", ""]);
        assert_eq!(split_args(r#"echo "say \"hi\"""#), vec!["echo", r#"say "hi""#]);
        assert!(split_args("   ").is_empty());
    }

    #[test]
    fn test_blocked_prefixes() {
        let fixture = Fixture::new();
        let handler = handler(&fixture);
        assert!(handler.is_blocked("npm install left-pad"));
        assert!(handler.is_blocked("  NPM run dev"));
        assert!(handler.is_blocked("npx create-react-app x"));
        assert!(!handler.is_blocked("npx serve"));
        assert!(!handler.is_blocked("node server.js"));
    }

    #[tokio::test]
    async fn test_blocked_command_never_reaches_sandbox() {
        let fixture = Fixture::new();
        let action = Action::new(ActionKind::RunCommand).with_command("npm install left-pad");

        let err = handler(&fixture).handle(&action).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.guidance().is_some());
        assert!(fixture.sandbox.commands().is_empty());
        assert!(fixture.sandbox.terminal_output()[0].starts_with("$ npm install"));
    }

    #[tokio::test]
    async fn test_runs_command_with_clamped_timeout() {
        let fixture = Fixture::new();
        fixture
            .sandbox
            .respond(|_| Ok(CommandOutput { exit_code: 0, output: "listening".into() }));
        let mut action = Action::new(ActionKind::RunCommand).with_command("node server.js");
        action.timeout = Some(5_000);

        let result = handler(&fixture).handle(&action).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("listening"));
        assert_eq!(result.data.unwrap()["exit_code"], 0);

        let commands = fixture.sandbox.commands();
        assert_eq!(commands[0].argv, vec!["node", "server.js"]);
        assert_eq!(commands[0].timeout, Some(Duration::from_millis(5_000)));
    }

    #[tokio::test]
    async fn test_command_falls_back_to_body() {
        let fixture = Fixture::new();
        let action = Action::new(ActionKind::RunCommand).with_content("  ls -la\n");

        assert!(handler(&fixture).handle(&action).await.unwrap().success);
        assert_eq!(fixture.sandbox.commands()[0].argv, vec!["ls", "-la"]);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_a_failed_result() {
        let fixture = Fixture::new();
        fixture
            .sandbox
            .respond(|_| Ok(CommandOutput { exit_code: 2, output: "boom".into() }));
        let action = Action::new(ActionKind::RunCommand).with_command("node broken.js");

        let result = handler(&fixture).handle(&action).await.unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("Command failed with exit code 2")
        );
        assert_eq!(result.output.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_stopped_sandbox() {
        let fixture = Fixture::new();
        fixture.sandbox.set_running(false);
        let action = Action::new(ActionKind::RunCommand).with_command("ls");

        let err = handler(&fixture).handle(&action).await.unwrap_err();
        assert!(matches!(err, ActionError::SandboxNotRunning));
    }
}
