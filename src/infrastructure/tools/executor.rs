//! # Local Sandbox
//!
//! Runs processes and file operations inside one project directory on the
//! host. Every path is validated against the root before it is touched, and
//! process output is mirrored line by line into a bounded terminal buffer.

use anyhow::{Context as AnyhowContext, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::config::SandboxConfig;
use crate::domain::traits::Sandbox;
use crate::domain::types::CommandOutput;

/// Ceiling for commands run without an explicit timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug)]
pub struct LocalSandbox {
    root: PathBuf,
    running: AtomicBool,
    terminal: Arc<Mutex<VecDeque<String>>>,
    history: usize,
    last_error: Mutex<Option<String>>,
}

impl LocalSandbox {
    /// Sandbox rooted at `root`, created if missing. Starts stopped.
    pub fn new(root: impl AsRef<Path>, history: usize) -> Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create sandbox root {}", root.display()))?;
        let root = root
            .canonicalize()
            .with_context(|| format!("Failed to resolve sandbox root {}", root.display()))?;

        Ok(Self {
            root,
            running: AtomicBool::new(false),
            terminal: Arc::new(Mutex::new(VecDeque::new())),
            history: history.max(1),
            last_error: Mutex::new(None),
        })
    }

    /// Sandbox from configuration; falls back to the current directory.
    pub fn from_config(config: &SandboxConfig) -> Result<Self> {
        let root = match &config.root_dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().context("Failed to read current directory")?,
        };
        Self::new(root, config.terminal_history)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn start(&self) {
        info!("Sandbox started at {}", self.root.display());
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        info!("Sandbox stopped");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Resolves a project-relative path, refusing anything outside the root.
    pub fn validate_path(&self, path: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !resolved.pop() || !resolved.starts_with(&self.root) {
                        anyhow::bail!("Access denied: {:?} escapes the sandbox root", path);
                    }
                }
                Component::RootDir | Component::Prefix(_) => {}
            }
        }

        if !resolved.starts_with(&self.root) {
            anyhow::bail!("Access denied: {:?} escapes the sandbox root", path);
        }
        // Symlinks inside the tree may still point elsewhere
        if resolved.exists() {
            let canonical = resolved.canonicalize()?;
            if !canonical.starts_with(&self.root) {
                anyhow::bail!("Access denied: {:?} resolves outside the sandbox root", path);
            }
        }
        Ok(resolved)
    }

    fn record_error(&self, message: String) {
        warn!("{}", message);
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(message);
        }
    }
}

fn push_line(terminal: &Mutex<VecDeque<String>>, history: usize, line: String) {
    let Ok(mut terminal) = terminal.lock() else {
        return;
    };
    terminal.push_back(line);
    while terminal.len() > history {
        terminal.pop_front();
    }
}

/// Forwards each line of `reader` to `tx` as it arrives.
fn forward_lines<R>(reader: R, tx: mpsc::UnboundedSender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    })
}

#[async_trait]
impl Sandbox for LocalSandbox {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let target = self.validate_path(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, content)
            .await
            .with_context(|| format!("Failed to write {}", path))
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let target = self.validate_path(path)?;
        match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&target).await?,
            Ok(_) => tokio::fs::remove_file(&target).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("Failed to delete {}", path)),
        }
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let target = self.validate_path(path)?;
        tokio::fs::read_to_string(&target)
            .await
            .with_context(|| format!("Failed to read {}", path))
    }

    async fn run(&self, argv: &[String], timeout: Option<Duration>) -> Result<CommandOutput> {
        let (program, args) = argv.split_first().context("Empty command")?;
        debug!("Running {:?} in {}", argv, self.root.display());

        let mut child = tokio::process::Command::new(program)
            .args(args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                self.record_error(format!("Failed to spawn {}: {}", program, e));
                e
            })
            .with_context(|| format!("Failed to spawn {}", program))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut forwarders = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(forward_lines(stderr, tx));
        } else {
            drop(tx);
        }

        let terminal = Arc::clone(&self.terminal);
        let history = self.history;
        let mut collector = tokio::spawn(async move {
            let mut lines = Vec::new();
            while let Some(line) = rx.recv().await {
                push_line(&terminal, history, format!("{}\n", line));
                lines.push(line);
            }
            lines
        });

        // The budget covers draining the pipes too: a background process that
        // inherited them keeps them open after the direct child has exited.
        let limit = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let finished = tokio::time::timeout(limit, async {
            let status = child.wait().await.context("Failed to wait for command")?;
            let lines = (&mut collector).await.context("Output collector failed")?;
            anyhow::Ok((status, lines))
        })
        .await;

        let (status, lines) = match finished {
            Ok(finished) => finished?,
            Err(_) => {
                let _ = child.kill().await;
                collector.abort();
                for forwarder in &forwarders {
                    forwarder.abort();
                }
                let message = format!(
                    "Command timed out after {}ms: {}",
                    limit.as_millis(),
                    argv.join(" ")
                );
                self.record_error(message.clone());
                anyhow::bail!(message);
            }
        };
        let exit_code = status.code().unwrap_or(-1);
        debug!("{} exited with {}", program, exit_code);

        Ok(CommandOutput {
            exit_code,
            output: lines.join("\n"),
        })
    }

    fn terminal_output(&self) -> Vec<String> {
        self.terminal
            .lock()
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn append_terminal_output(&self, line: &str) {
        push_line(&self.terminal, self.history, line.to_string());
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, LocalSandbox) {
        let dir = TempDir::new().unwrap();
        let sandbox = LocalSandbox::new(dir.path(), 100).unwrap();
        sandbox.start();
        (dir, sandbox)
    }

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_validate_path_stays_inside_root() {
        let (_dir, sandbox) = sandbox();
        let inside = sandbox.validate_path("/src/../src/a.js").unwrap();
        assert!(inside.starts_with(sandbox.root()));
        assert!(inside.ends_with("src/a.js"));
        assert!(sandbox.validate_path("../outside.txt").is_err());
        assert!(sandbox.validate_path("a/../../x").is_err());
    }

    #[tokio::test]
    async fn test_file_operations() {
        let (_dir, sandbox) = sandbox();
        sandbox.write_file("nested/dir/a.txt", "hello").await.unwrap();
        assert_eq!(sandbox.read_file("nested/dir/a.txt").await.unwrap(), "hello");

        sandbox.delete_file("nested/dir/a.txt").await.unwrap();
        assert!(sandbox.read_file("nested/dir/a.txt").await.is_err());
        sandbox.delete_file("nested/dir/a.txt").await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_output_and_exit_code() {
        let (_dir, sandbox) = sandbox();
        let ok = sandbox.run(&argv(&["echo", "hi"]), None).await.unwrap();
        assert!(ok.success());
        assert_eq!(ok.output, "hi");
        assert_eq!(sandbox.terminal_output(), vec!["hi\n"]);

        let failed = sandbox
            .run(&argv(&["sh", "-c", "echo '  indented'; exit 3"]), None)
            .await
            .unwrap();
        assert_eq!(failed.exit_code, 3);
        assert_eq!(failed.output, "  indented");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let (_dir, sandbox) = sandbox();
        let err = sandbox
            .run(&argv(&["sleep", "5"]), Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(sandbox.last_error().unwrap().contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_covers_background_output_holders() {
        let (_dir, sandbox) = sandbox();
        let started = std::time::Instant::now();
        let err = sandbox
            .run(
                &argv(&["sh", "-c", "sleep 4 & echo started"]),
                Some(Duration::from_millis(300)),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_terminal_history_is_bounded() {
        let dir = TempDir::new().unwrap();
        let sandbox = LocalSandbox::new(dir.path(), 2).unwrap();
        for line in ["a", "b", "c"] {
            sandbox.append_terminal_output(line);
        }
        assert_eq!(sandbox.terminal_output(), vec!["b", "c"]);
        assert!(!sandbox.is_running());
    }
}
