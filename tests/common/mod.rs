//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tmux_web::errors::TmuxError;
use tmux_web::models::{SessionSummary, WindowSummary};
use tmux_web::tmux::{AttachCommand, Multiplexer};

/// In-memory stand-in for tmux that records every call.
pub struct FakeMultiplexer {
    sessions: Mutex<BTreeMap<String, Vec<WindowSummary>>>,
    calls: Mutex<Vec<String>>,
    fail: bool,
    attach: AttachCommand,
}

impl FakeMultiplexer {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            fail: false,
            attach: AttachCommand::new("cat"),
        }
    }

    /// Every mutating command fails like tmux without a server.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// PTYs run `program args...` instead of a tmux client.
    pub fn attaching_to(program: &str, args: &[&str]) -> Self {
        Self {
            attach: AttachCommand::new(program).args(args.iter().copied()),
            ..Self::new()
        }
    }

    pub fn with_session(self, name: &str, windows: &[(u32, &str)]) -> Self {
        self.sessions.lock().insert(
            name.to_string(),
            windows
                .iter()
                .map(|(index, name)| WindowSummary {
                    index: *index,
                    name: name.to_string(),
                })
                .collect(),
        );
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn session_names(&self) -> Vec<String> {
        self.sessions.lock().keys().cloned().collect()
    }

    pub fn windows(&self, session: &str) -> Vec<WindowSummary> {
        self.sessions.lock().get(session).cloned().unwrap_or_default()
    }

    fn record(&self, call: String) -> Result<(), TmuxError> {
        self.calls.lock().push(call.clone());
        if self.fail {
            return Err(TmuxError::Failed {
                command: format!("tmux {call}"),
                status: "exit status: 1".to_string(),
                stderr: "no server running".to_string(),
            });
        }
        Ok(())
    }

    fn missing(session: &str) -> TmuxError {
        TmuxError::Failed {
            command: "tmux".to_string(),
            status: "exit status: 1".to_string(),
            stderr: format!("can't find session: {session}"),
        }
    }
}

#[async_trait]
impl Multiplexer for FakeMultiplexer {
    async fn list_sessions(&self) -> Vec<SessionSummary> {
        if self.fail {
            return Vec::new();
        }
        self.session_names()
            .into_iter()
            .map(SessionSummary::named)
            .collect()
    }

    async fn create_session(&self, name: &str) -> Result<(), TmuxError> {
        self.record(format!("new-session {name}"))?;
        self.sessions.lock().insert(
            name.to_string(),
            vec![WindowSummary {
                index: 0,
                name: "bash".to_string(),
            }],
        );
        Ok(())
    }

    async fn kill_session(&self, session: &str) -> Result<(), TmuxError> {
        self.record(format!("kill-session {session}"))?;
        self.sessions
            .lock()
            .remove(session)
            .map(|_| ())
            .ok_or_else(|| Self::missing(session))
    }

    async fn rename_session(&self, session: &str, name: &str) -> Result<(), TmuxError> {
        self.record(format!("rename-session {session} {name}"))?;
        let mut sessions = self.sessions.lock();
        let windows = sessions
            .remove(session)
            .ok_or_else(|| Self::missing(session))?;
        sessions.insert(name.to_string(), windows);
        Ok(())
    }

    async fn list_windows(&self, session: &str) -> Result<Vec<WindowSummary>, TmuxError> {
        self.record(format!("list-windows {session}"))?;
        self.sessions
            .lock()
            .get(session)
            .cloned()
            .ok_or_else(|| Self::missing(session))
    }

    async fn create_window(&self, session: &str, name: Option<&str>) -> Result<(), TmuxError> {
        self.record(format!("new-window {session} {}", name.unwrap_or("-")))?;
        let mut sessions = self.sessions.lock();
        let windows = sessions
            .get_mut(session)
            .ok_or_else(|| Self::missing(session))?;
        let index = windows.iter().map(|w| w.index + 1).max().unwrap_or(0);
        windows.push(WindowSummary {
            index,
            name: name.unwrap_or("bash").to_string(),
        });
        Ok(())
    }

    async fn kill_window(&self, session: &str, index: u32) -> Result<(), TmuxError> {
        self.record(format!("kill-window {session}:{index}"))?;
        let mut sessions = self.sessions.lock();
        let windows = sessions
            .get_mut(session)
            .ok_or_else(|| Self::missing(session))?;
        windows.retain(|w| w.index != index);
        Ok(())
    }

    async fn rename_window(&self, session: &str, index: u32, name: &str) -> Result<(), TmuxError> {
        self.record(format!("rename-window {session}:{index} {name}"))?;
        let mut sessions = self.sessions.lock();
        let windows = sessions
            .get_mut(session)
            .ok_or_else(|| Self::missing(session))?;
        if let Some(window) = windows.iter_mut().find(|w| w.index == index) {
            window.name = name.to_string();
        }
        Ok(())
    }

    async fn select_window(&self, session: &str, window: &str) -> Result<(), TmuxError> {
        self.record(format!("select-window {session}:{window}"))
    }

    fn attach_command(&self, session: &str) -> AttachCommand {
        self.calls.lock().push(format!("attach {session}"));
        self.attach.clone()
    }
}

pub fn shared(fake: FakeMultiplexer) -> Arc<FakeMultiplexer> {
    Arc::new(fake)
}
