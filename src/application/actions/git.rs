//! # Git Actions
//!
//! Version-control checkpoints and rollback, run as `git` processes inside the
//! sandbox. Recovery uses `revert` as its terminal rollback phase.

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

use super::ActionHandler;
use crate::domain::errors::ActionError;
use crate::domain::traits::Sandbox;
use crate::domain::types::{Action, ActionCategory, ActionKind, ActionResult, CommandOutput};

const NOT_A_REPO: &str = "not a git repository";

// "[main 1a2b3c4] msg" or "[master (root-commit) 1a2b3c4] msg"
static COMMIT_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[\w./-]+(?:\s+\(root-commit\))?\s+([0-9a-f]+)\]").unwrap());

#[derive(Debug, Serialize)]
struct StatusEntry {
    status: String,
    path: String,
}

pub struct GitHandler {
    sandbox: Arc<dyn Sandbox>,
}

impl GitHandler {
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self { sandbox }
    }

    async fn git(&self, args: &[&str]) -> Result<CommandOutput, ActionError> {
        let argv: Vec<String> = std::iter::once("git")
            .chain(args.iter().copied())
            .map(String::from)
            .collect();
        Ok(self.sandbox.run(&argv, None).await?)
    }

    async fn checkpoint(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let added = self.git(&["add", "."]).await?;
        if !added.success() {
            if !added.output.contains(NOT_A_REPO) {
                return Err(anyhow::anyhow!("git add failed: {}", added.output.trim()).into());
            }
            info!("No repository yet, running git init");
            self.git(&["init"]).await?;
            self.git(&["add", "."]).await?;
        }

        let message = match action.message.as_deref().map(str::trim) {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => format!(
                "Checkpoint: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
        };
        let committed = self.git(&["commit", "-m", &message]).await?;

        if committed.output.contains("nothing to commit") {
            return Ok(ActionResult::ok(action, "No changes to commit")
                .with_data(json!({ "committed": false })));
        }
        if !committed.success() {
            return Err(anyhow::anyhow!("git commit failed: {}", committed.output.trim()).into());
        }

        let hash = COMMIT_HASH_RE
            .captures(&committed.output)
            .map_or_else(|| "unknown".to_string(), |caps| caps[1].to_string());
        info!("Checkpoint {} created", hash);

        Ok(
            ActionResult::ok(action, format!("Checkpoint created: {} - {}", hash, message))
                .with_data(json!({ "committed": true, "hash": hash, "message": message })),
        )
    }

    async fn revert(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let steps = action.steps.unwrap_or(1).max(1);

        let previous = self.short_head().await?;
        let reset = self.git(&["reset", "--hard", &format!("HEAD~{}", steps)]).await?;
        if !reset.success() {
            warn!("git reset failed: {}", reset.output.trim());
            return Err(anyhow::anyhow!("git reset failed: {}", reset.output.trim()).into());
        }
        let current = self.short_head().await?;
        info!("Reverted {} -> {}", previous, current);

        let plural = if steps > 1 { "s" } else { "" };
        Ok(ActionResult::ok(
            action,
            format!(
                "Reverted from {} to {} ({} step{} back)",
                previous, current, steps, plural
            ),
        )
        .with_data(json!({
            "previous_head": previous,
            "current_head": current,
            "steps": steps,
        })))
    }

    async fn short_head(&self) -> Result<String, ActionError> {
        let head = self.git(&["rev-parse", "HEAD"]).await?;
        Ok(head.output.trim().chars().take(7).collect())
    }

    async fn status(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let result = self.git(&["status", "--porcelain"]).await?;

        if !result.success() && result.output.contains(NOT_A_REPO) {
            return Ok(ActionResult::ok(action, "Not a git repository")
                .with_data(json!({ "files": [], "is_repo": false })));
        }

        let files: Vec<StatusEntry> = result
            .output
            .lines()
            .filter_map(|line| {
                // "XY path"; anything else (e.g. a localized warning) is skipped
                let status = line.get(..2)?;
                let path = line.get(3..).filter(|_| line.get(2..3) == Some(" "))?;
                (!path.is_empty()).then(|| StatusEntry {
                    status: status.trim().to_string(),
                    path: path.to_string(),
                })
            })
            .collect();

        let output = if files.is_empty() {
            "Working tree clean".to_string()
        } else {
            files
                .iter()
                .map(|f| format!("{} {}", f.status, f.path))
                .collect::<Vec<_>>()
                .join("\n")
        };
        Ok(ActionResult::ok(action, output).with_data(json!({ "files": files, "is_repo": true })))
    }

    async fn diff(&self, action: &Action) -> Result<ActionResult, ActionError> {
        let mut args = vec!["diff"];
        if let Some(path) = action.path.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            args.push(path);
        }
        let result = self.git(&args).await?;

        let has_changes = !result.output.trim().is_empty();
        let output = if has_changes {
            result.output
        } else {
            "No changes".to_string()
        };
        Ok(ActionResult::ok(action, output).with_data(json!({ "has_changes": has_changes })))
    }
}

#[async_trait]
impl ActionHandler for GitHandler {
    fn category(&self) -> ActionCategory {
        ActionCategory::Git
    }

    async fn handle(&self, action: &Action) -> Result<ActionResult, ActionError> {
        if !self.sandbox.is_running() {
            return Err(ActionError::SandboxNotRunning);
        }
        match action.kind {
            ActionKind::GitCheckpoint => self.checkpoint(action).await,
            ActionKind::GitRevert => self.revert(action).await,
            ActionKind::GitStatus => self.status(action).await,
            ActionKind::GitDiff => self.diff(action).await,
            _ => Err(ActionError::UnknownKind(action.kind.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Fixture;

    fn out(exit_code: i32, output: &str) -> anyhow::Result<CommandOutput> {
        Ok(CommandOutput {
            exit_code,
            output: output.to_string(),
        })
    }

    #[test]
    fn test_commit_hash_pattern() {
        let caps = COMMIT_HASH_RE.captures("[main 1a2b3c4] Checkpoint").unwrap();
        assert_eq!(&caps[1], "1a2b3c4");
        let caps = COMMIT_HASH_RE
            .captures("[master (root-commit) 9f8e7d6] first")
            .unwrap();
        assert_eq!(&caps[1], "9f8e7d6");
    }

    #[tokio::test]
    async fn test_checkpoint_initialises_repository() {
        let fixture = Fixture::new();
        fixture.sandbox.respond(|argv| match argv[1].as_str() {
            "add" if argv.len() == 3 => out(128, "fatal: not a git repository"),
            "commit" => out(0, "[master (root-commit) abc1234] save\n 1 file changed"),
            _ => out(0, ""),
        });
        let mut action = Action::new(ActionKind::GitCheckpoint);
        action.message = Some("save".into());

        let result = GitHandler::new(fixture.sandbox.clone())
            .handle(&action)
            .await
            .unwrap();
        assert_eq!(
            result.output.as_deref(),
            Some("Checkpoint created: abc1234 - save")
        );
        let verbs: Vec<String> = fixture
            .sandbox
            .commands()
            .iter()
            .map(|c| c.argv[1].clone())
            .collect();
        assert_eq!(verbs, vec!["add", "init", "add", "commit"]);
    }

    #[tokio::test]
    async fn test_checkpoint_nothing_to_commit() {
        let fixture = Fixture::new();
        fixture.sandbox.respond(|argv| match argv[1].as_str() {
            "commit" => out(1, "nothing to commit, working tree clean"),
            _ => out(0, ""),
        });

        let result = GitHandler::new(fixture.sandbox.clone())
            .handle(&Action::new(ActionKind::GitCheckpoint))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap()["committed"], false);
        let commit = &fixture.sandbox.commands()[1];
        assert!(commit.argv[3].starts_with("Checkpoint: "));
    }

    #[tokio::test]
    async fn test_revert_reports_heads() {
        let fixture = Fixture::new();
        let calls = std::sync::atomic::AtomicUsize::new(0);
        fixture.sandbox.respond(move |argv| match argv[1].as_str() {
            "rev-parse" => {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                out(0, if n == 0 { "bbbbbbbbbb\n" } else { "aaaaaaaaaa\n" })
            }
            _ => out(0, "HEAD is now at aaaaaaa"),
        });
        let mut action = Action::new(ActionKind::GitRevert);
        action.steps = Some(2);

        let result = GitHandler::new(fixture.sandbox.clone())
            .handle(&action)
            .await
            .unwrap();
        assert_eq!(
            result.output.as_deref(),
            Some("Reverted from bbbbbbb to aaaaaaa (2 steps back)")
        );
        assert_eq!(fixture.sandbox.commands()[1].argv[3], "HEAD~2");
    }

    #[tokio::test]
    async fn test_revert_failure_is_an_error() {
        let fixture = Fixture::new();
        fixture.sandbox.respond(|argv| match argv[1].as_str() {
            "reset" => out(128, "fatal: ambiguous argument 'HEAD~1'"),
            _ => out(0, "abc"),
        });

        let err = GitHandler::new(fixture.sandbox.clone())
            .handle(&Action::new(ActionKind::GitRevert))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("git reset failed"));
    }

    #[tokio::test]
    async fn test_status_parses_porcelain() {
        let fixture = Fixture::new();
        fixture
            .sandbox
            .respond(|_| out(0, " M index.html\n?? js/new.js\n"));

        let result = GitHandler::new(fixture.sandbox.clone())
            .handle(&Action::new(ActionKind::GitStatus))
            .await
            .unwrap();
        assert_eq!(result.output.as_deref(), Some("M index.html\n?? js/new.js"));
        let data = result.data.unwrap();
        assert_eq!(data["files"][1]["path"], "js/new.js");
        assert_eq!(data["is_repo"], true);
    }

    #[tokio::test]
    async fn test_status_skips_non_porcelain_lines() {
        let fixture = Fixture::new();
        fixture
            .sandbox
            .respond(|_| out(0, "xé avertissement: fin de ligne\n M index.html\nÄÖ\n"));

        let result = GitHandler::new(fixture.sandbox.clone())
            .handle(&Action::new(ActionKind::GitStatus))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("M index.html"));
    }

    #[tokio::test]
    async fn test_status_outside_repository() {
        let fixture = Fixture::new();
        fixture
            .sandbox
            .respond(|_| out(128, "fatal: not a git repository (or any parent)"));

        let result = GitHandler::new(fixture.sandbox.clone())
            .handle(&Action::new(ActionKind::GitStatus))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap()["is_repo"], false);
    }

    #[tokio::test]
    async fn test_diff_with_path() {
        let fixture = Fixture::new();
        let action = Action::new(ActionKind::GitDiff).with_path("index.html");

        let result = GitHandler::new(fixture.sandbox.clone())
            .handle(&action)
            .await
            .unwrap();
        assert_eq!(result.output.as_deref(), Some("No changes"));
        assert_eq!(
            fixture.sandbox.commands()[0].argv,
            vec!["git", "diff", "index.html"]
        );
    }

    #[tokio::test]
    async fn test_requires_running_sandbox() {
        let fixture = Fixture::new();
        fixture.sandbox.set_running(false);
        let err = GitHandler::new(fixture.sandbox.clone())
            .handle(&Action::new(ActionKind::GitStatus))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::SandboxNotRunning));
    }
}
