//! tmux command layer
//!
//! Every session/window operation is a single tmux invocation. Arguments are
//! passed as a vector so names never pass through a shell.

use std::path::PathBuf;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::TmuxError;
use crate::models::{SessionSummary, WindowSummary};

const SESSION_FORMAT: &str = "#{session_name}";
const WINDOW_FORMAT: &str = "#{window_index}:#{window_name}";

/// Command line a PTY runs to attach to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl AttachCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

/// Session and window lifecycle, delegated to a terminal multiplexer.
#[async_trait]
pub trait Multiplexer: Send + Sync {
    /// Lists sessions. Yields an empty list when the multiplexer reports an
    /// error, which is what tmux does when no server is running.
    async fn list_sessions(&self) -> Vec<SessionSummary>;
    async fn create_session(&self, name: &str) -> Result<(), TmuxError>;
    async fn kill_session(&self, session: &str) -> Result<(), TmuxError>;
    async fn rename_session(&self, session: &str, name: &str) -> Result<(), TmuxError>;
    async fn list_windows(&self, session: &str) -> Result<Vec<WindowSummary>, TmuxError>;
    async fn create_window(&self, session: &str, name: Option<&str>) -> Result<(), TmuxError>;
    async fn kill_window(&self, session: &str, index: u32) -> Result<(), TmuxError>;
    async fn rename_window(&self, session: &str, index: u32, name: &str)
        -> Result<(), TmuxError>;
    async fn select_window(&self, session: &str, window: &str) -> Result<(), TmuxError>;
    /// Command that attaches to `session`, creating it when missing.
    fn attach_command(&self, session: &str) -> AttachCommand;
}

/// Exact-match session target, so `dev` never resolves to `dev-2`.
pub fn session_target(session: &str) -> String {
    format!("={session}")
}

pub fn window_target(session: &str, window: impl std::fmt::Display) -> String {
    format!("={session}:{window}")
}

pub fn parse_sessions(stdout: &str) -> Vec<SessionSummary> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .map(SessionSummary::named)
        .collect()
}

/// Parses `#{window_index}:#{window_name}` lines. The name keeps any further
/// colons; lines without a numeric index are dropped.
pub fn parse_windows(stdout: &str) -> Vec<WindowSummary> {
    stdout
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let (index, name) = line.split_once(':').unwrap_or((line, ""));
            let index = index.trim().parse::<u32>().ok()?;
            Some(WindowSummary {
                index,
                name: name.to_string(),
            })
        })
        .collect()
}

/// [`Multiplexer`] backed by the tmux CLI.
#[derive(Debug, Clone)]
pub struct TmuxCli {
    binary: PathBuf,
    socket_name: Option<String>,
}

impl Default for TmuxCli {
    fn default() -> Self {
        Self::new("tmux", None)
    }
}

impl TmuxCli {
    pub fn new(binary: impl Into<PathBuf>, socket_name: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            socket_name,
        }
    }

    /// Global arguments placed before every subcommand.
    fn global_args(&self) -> Vec<String> {
        match &self.socket_name {
            Some(name) => vec!["-L".to_string(), name.clone()],
            None => Vec::new(),
        }
    }

    fn full_args(&self, args: &[&str]) -> Vec<String> {
        let mut full = self.global_args();
        full.extend(args.iter().map(|arg| arg.to_string()));
        full
    }

    fn describe(&self, args: &[String]) -> String {
        let mut parts = vec![self.binary.display().to_string()];
        parts.extend(args.iter().cloned());
        parts.join(" ")
    }

    /// Runs tmux and returns trimmed stdout on success.
    async fn run(&self, args: &[&str]) -> Result<String, TmuxError> {
        let args = self.full_args(args);
        let command = self.describe(&args);
        debug!(%command, "running tmux");

        let output: Output = Command::new(&self.binary)
            .args(&args)
            .env_remove("TMUX")
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| TmuxError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(%command, status = %output.status, %stderr, "tmux command failed");
            return Err(TmuxError::Failed {
                command,
                status: output.status.to_string(),
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Multiplexer for TmuxCli {
    async fn list_sessions(&self) -> Vec<SessionSummary> {
        match self.run(&["ls", "-F", SESSION_FORMAT]).await {
            Ok(stdout) => parse_sessions(&stdout),
            Err(err) => {
                debug!(error = %err, "no tmux sessions");
                Vec::new()
            }
        }
    }

    async fn create_session(&self, name: &str) -> Result<(), TmuxError> {
        self.run(&["new-session", "-d", "-s", name]).await?;
        Ok(())
    }

    async fn kill_session(&self, session: &str) -> Result<(), TmuxError> {
        self.run(&["kill-session", "-t", &session_target(session)])
            .await?;
        Ok(())
    }

    async fn rename_session(&self, session: &str, name: &str) -> Result<(), TmuxError> {
        // `--` keeps names such as `-x` from being read as flags.
        self.run(&["rename-session", "-t", &session_target(session), "--", name])
            .await?;
        Ok(())
    }

    async fn list_windows(&self, session: &str) -> Result<Vec<WindowSummary>, TmuxError> {
        let stdout = self
            .run(&[
                "list-windows",
                "-t",
                &session_target(session),
                "-F",
                WINDOW_FORMAT,
            ])
            .await?;
        Ok(parse_windows(&stdout))
    }

    async fn create_window(&self, session: &str, name: Option<&str>) -> Result<(), TmuxError> {
        // Trailing colon: next free index in the session, not a window named `session`.
        let target = format!("{}:", session_target(session));
        let mut args = vec!["new-window", "-t", target.as_str()];
        if let Some(name) = name {
            args.extend(["-n", name]);
        }
        self.run(&args).await?;
        Ok(())
    }

    async fn kill_window(&self, session: &str, index: u32) -> Result<(), TmuxError> {
        self.run(&["kill-window", "-t", &window_target(session, index)])
            .await?;
        Ok(())
    }

    async fn rename_window(
        &self,
        session: &str,
        index: u32,
        name: &str,
    ) -> Result<(), TmuxError> {
        self.run(&[
            "rename-window",
            "-t",
            &window_target(session, index),
            "--",
            name,
        ])
        .await?;
        Ok(())
    }

    async fn select_window(&self, session: &str, window: &str) -> Result<(), TmuxError> {
        self.run(&["select-window", "-t", &window_target(session, window)])
            .await?;
        Ok(())
    }

    fn attach_command(&self, session: &str) -> AttachCommand {
        AttachCommand::new(self.binary.display().to_string())
            .args(self.full_args(&["new-session", "-A", "-s", session]))
    }
}
