//! One WebSocket connection and the single PTY it owns.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::protocol::{ClientMessage, ServerMessage};
use super::BridgeConfig;
use crate::pty::{PtyOutput, PtySession, SpawnOptions};
use crate::tmux::Multiplexer;

const OUTPUT_CHANNEL_SIZE: usize = 256;

/// Per-connection state. Every attach bumps `generation`; PTY output is
/// tagged with the generation it was spawned under so output from a
/// replaced PTY can be recognised and dropped.
pub(crate) struct Connection {
    id: String,
    multiplexer: Arc<dyn Multiplexer>,
    config: Arc<BridgeConfig>,
    pty: Option<PtySession>,
    generation: u64,
    output_tx: mpsc::Sender<(u64, PtyOutput)>,
}

impl Connection {
    pub(crate) fn new(
        multiplexer: Arc<dyn Multiplexer>,
        config: Arc<BridgeConfig>,
        output_tx: mpsc::Sender<(u64, PtyOutput)>,
    ) -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self {
            id,
            multiplexer,
            config,
            pty: None,
            generation: 0,
            output_tx,
        }
    }

    /// Applies one client frame; returns a reply for the client, if any.
    pub(crate) async fn handle_text(&mut self, text: &str) -> Option<ServerMessage> {
        let Some(message) = ClientMessage::parse(text) else {
            debug!("[ws:{}] Ignoring unrecognised frame", self.id);
            return None;
        };

        match message {
            ClientMessage::Attach {
                session,
                window,
                cols,
                rows,
            } => self.attach(&session, window.as_deref(), cols, rows).await,
            ClientMessage::Input { data } => {
                if let Some(pty) = &self.pty {
                    if let Err(e) = pty.write_input(&data) {
                        warn!("[ws:{}] Failed to write input: {}", self.id, e);
                    }
                }
                None
            }
            ClientMessage::Resize { cols, rows } => {
                if let (Some(pty), Some(cols), Some(rows)) =
                    (&self.pty, nonzero(cols), nonzero(rows))
                {
                    if let Err(e) = pty.resize(cols, rows) {
                        warn!("[ws:{}] Failed to resize: {:#}", self.id, e);
                    }
                }
                None
            }
        }
    }

    async fn attach(
        &mut self,
        session: &str,
        window: Option<&str>,
        cols: Option<u16>,
        rows: Option<u16>,
    ) -> Option<ServerMessage> {
        self.detach();
        self.generation += 1;

        if session.is_empty() {
            return Some(ServerMessage::Error {
                message: "session is required".to_string(),
            });
        }

        // Select before attaching so the client comes up on the requested window.
        if let Some(window) = window.filter(|w| !w.is_empty() && *w != "0") {
            if let Err(e) = self.multiplexer.select_window(session, window).await {
                warn!(
                    "[ws:{}] Could not select window {} of {}: {}",
                    self.id, window, session, e
                );
            }
        }

        let options = SpawnOptions {
            command: self.multiplexer.attach_command(session),
            cols: nonzero(cols).unwrap_or(self.config.default_cols),
            rows: nonzero(rows).unwrap_or(self.config.default_rows),
            term: self.config.term.clone(),
        };
        let pty_id = format!("{}-{}", self.id, self.generation);

        match PtySession::spawn(pty_id, &options, self.generation, self.output_tx.clone()) {
            Ok(pty) => {
                info!(
                    "[ws:{}] Attached to {} (pid: {}, generation: {})",
                    self.id, session, pty.pid, self.generation
                );
                self.pty = Some(pty);
                None
            }
            Err(e) => {
                error!("[ws:{}] Failed to attach to {}: {:#}", self.id, session, e);
                Some(ServerMessage::Error {
                    message: format!("{e:#}"),
                })
            }
        }
    }

    /// Turns PTY output into a client message, dropping output from stale PTYs.
    pub(crate) fn accept_output(
        &mut self,
        generation: u64,
        output: PtyOutput,
    ) -> Option<ServerMessage> {
        if generation != self.generation || self.pty.is_none() {
            debug!(
                "[ws:{}] Dropping output of stale generation {} (current {})",
                self.id, generation, self.generation
            );
            return None;
        }

        match output {
            PtyOutput::Data(data) => Some(ServerMessage::Output { data }),
            PtyOutput::Exit(exit_code) => {
                self.pty = None;
                info!("[ws:{}] PTY exited (code: {:?})", self.id, exit_code);
                Some(ServerMessage::Exit { exit_code })
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn has_pty(&self) -> bool {
        self.pty.is_some()
    }

    /// Drops the current PTY, if any, which kills its process.
    pub(crate) fn detach(&mut self) {
        if let Some(pty) = self.pty.take() {
            debug!("[ws:{}] Killing PTY {}", self.id, pty.id);
        }
    }
}

fn nonzero(value: Option<u16>) -> Option<u16> {
    value.filter(|v| *v > 0)
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            error!("Failed to encode server message: {}", e);
            Ok(())
        }
    }
}

/// Runs a terminal WebSocket until either side goes away.
pub async fn handle_socket(
    socket: WebSocket,
    multiplexer: Arc<dyn Multiplexer>,
    config: Arc<BridgeConfig>,
) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (output_tx, mut output_rx) = mpsc::channel(OUTPUT_CHANNEL_SIZE);
    let mut connection = Connection::new(multiplexer, config, output_tx);

    info!("[ws:{}] Terminal WebSocket connected", connection.id);

    loop {
        let reply = tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => connection.handle_text(&text).await,
                Some(Ok(Message::Binary(data))) => {
                    connection.handle_text(&String::from_utf8_lossy(&data)).await
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("[ws:{}] Client closed connection", connection.id);
                    break;
                }
                Some(Err(e)) => {
                    warn!("[ws:{}] WebSocket error: {}", connection.id, e);
                    break;
                }
                Some(Ok(_)) => None,
            },
            Some((generation, output)) = output_rx.recv() => {
                connection.accept_output(generation, output)
            }
        };

        if let Some(message) = reply {
            if send_message(&mut ws_sender, &message).await.is_err() {
                debug!("[ws:{}] Send failed, closing", connection.id);
                break;
            }
        }
    }

    connection.detach();
    info!("[ws:{}] Terminal WebSocket disconnected", connection.id);
}
