//! PTY session implementation
//!
//! Owns one pseudo-terminal and the process running in it:
//! - input is queued to a dedicated writer thread
//! - output is read on the blocking pool and forwarded as UTF-8 chunks
//! - the child is reaped after EOF and its exit code reported

use std::io::{Read, Write as IoWrite};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::tmux::AttachCommand;

const PTY_WRITE_CHUNK_SIZE: usize = 512;
pub const PTY_INPUT_CHANNEL_SIZE: usize = 1024;
pub const PTY_READ_BUFFER_SIZE: usize = 4096;

/// Something the PTY produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyOutput {
    Data(String),
    /// The process exited; `None` when the exit status could not be read.
    Exit(Option<u32>),
}

/// Options for spawning a PTY session.
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    pub command: AttachCommand,
    pub cols: u16,
    pub rows: u16,
    pub term: String,
}

/// A running PTY with its child process.
pub struct PtySession {
    /// Identifier used in log lines
    pub id: String,
    master: Mutex<Box<dyn MasterPty + Send>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    input_tx: SyncSender<Vec<u8>>,
    alive: Arc<AtomicBool>,
    pub pid: u32,
}

impl PtySession {
    /// Spawns `options.command` in a fresh PTY.
    ///
    /// Output is delivered on `output_tx`, each item paired with `tag` so the
    /// receiver can tell sessions apart. The last item is always
    /// [`PtyOutput::Exit`].
    pub fn spawn<T>(
        id: String,
        options: &SpawnOptions,
        tag: T,
        output_tx: mpsc::Sender<(T, PtyOutput)>,
    ) -> Result<Self>
    where
        T: Clone + Send + 'static,
    {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(PtySize {
                rows: options.rows,
                cols: options.cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to open PTY")?;

        let mut cmd = CommandBuilder::new(&options.command.program);
        cmd.args(&options.command.args);
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }
        cmd.env("TERM", &options.term);
        // Attaching from inside another tmux client would be refused.
        cmd.env_remove("TMUX");
        for (key, value) in &options.command.env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .with_context(|| format!("Failed to spawn {}", options.command.program))?;
        // Release our copy of the slave so EOF arrives when the child exits.
        drop(pair.slave);
        let pid = child.process_id().unwrap_or(0);
        let killer = child.clone_killer();

        let reader = pair
            .master
            .try_clone_reader()
            .context("Failed to clone PTY reader")?;
        let writer = pair
            .master
            .take_writer()
            .context("Failed to take PTY writer")?;

        let (input_tx, input_rx) = std::sync::mpsc::sync_channel(PTY_INPUT_CHANNEL_SIZE);
        spawn_pty_writer_thread(id.clone(), writer, input_rx);

        let alive = Arc::new(AtomicBool::new(true));
        tokio::spawn(pump_pty_output(
            id.clone(),
            reader,
            child,
            Arc::clone(&alive),
            tag,
            output_tx,
        ));

        info!(
            "[pty:{}] Spawned {} (pid: {}, {}x{})",
            id, options.command.program, pid, options.cols, options.rows
        );

        Ok(Self {
            id,
            master: Mutex::new(pair.master),
            killer: Mutex::new(killer),
            input_tx,
            alive,
            pid,
        })
    }

    /// Check if the PTY process is still running
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Queue input for the PTY
    pub fn write_input(&self, data: &str) -> Result<()> {
        self.input_tx.send(data.as_bytes().to_vec()).map_err(|e| {
            error!("[pty:{}] Input channel send failed: {}", self.id, e);
            anyhow::anyhow!("PTY input channel closed")
        })?;
        Ok(())
    }

    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        self.master
            .lock()
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .context("Failed to resize PTY")?;
        debug!("[pty:{}] Resized to {}x{}", self.id, cols, rows);
        Ok(())
    }

    /// Kill the PTY process. Also done on drop.
    pub fn kill(&self) {
        if !self.is_alive() {
            return;
        }
        if let Err(e) = self.killer.lock().kill() {
            warn!("[pty:{}] Failed to kill PTY process: {}", self.id, e);
        }
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Spawns a dedicated thread for PTY writes
fn spawn_pty_writer_thread(
    session_id: String,
    mut writer: Box<dyn IoWrite + Send>,
    input_rx: std::sync::mpsc::Receiver<Vec<u8>>,
) {
    std::thread::spawn(move || {
        let mut total_bytes_written: usize = 0;

        while let Ok(data) = input_rx.recv() {
            for chunk in data.chunks(PTY_WRITE_CHUNK_SIZE) {
                if let Err(e) = writer.write_all(chunk).and_then(|_| writer.flush()) {
                    debug!(
                        "[writer:{}] Write error: {} (errno: {:?})",
                        session_id,
                        e,
                        e.raw_os_error()
                    );
                    return;
                }
            }
            total_bytes_written += data.len();
        }

        debug!(
            "[writer:{}] Writer thread finished after {} bytes",
            session_id, total_bytes_written
        );
    });
}

/// Reads PTY output until EOF, then reaps the child.
async fn pump_pty_output<T>(
    session_id: String,
    mut reader: Box<dyn Read + Send>,
    mut child: Box<dyn Child + Send + Sync>,
    alive: Arc<AtomicBool>,
    tag: T,
    output_tx: mpsc::Sender<(T, PtyOutput)>,
) where
    T: Clone + Send + 'static,
{
    let mut buf = [0u8; PTY_READ_BUFFER_SIZE];
    let mut utf8_buffer: Vec<u8> = Vec::new();
    let mut total_bytes_read: usize = 0;

    loop {
        let read_result = tokio::task::spawn_blocking(move || {
            let result = reader.read(&mut buf);
            (reader, buf, result)
        })
        .await;

        let (returned_reader, returned_buf, result) = match read_result {
            Ok(r) => r,
            Err(e) => {
                error!("[reader:{}] spawn_blocking panicked: {}", session_id, e);
                return;
            }
        };
        reader = returned_reader;
        buf = returned_buf;

        match result {
            Ok(0) => break,
            Ok(n) => {
                total_bytes_read += n;
                utf8_buffer.extend_from_slice(&buf[..n]);

                let valid_up_to = find_utf8_boundary(&utf8_buffer);
                if valid_up_to > 0 {
                    let data = String::from_utf8_lossy(&utf8_buffer[..valid_up_to]).to_string();
                    utf8_buffer.drain(..valid_up_to);
                    if output_tx
                        .send((tag.clone(), PtyOutput::Data(data)))
                        .await
                        .is_err()
                    {
                        debug!("[reader:{}] Receiver gone", session_id);
                        break;
                    }
                }
            }
            // Linux reports EIO on the master once the slave side is closed.
            Err(e) => {
                debug!("[reader:{}] Read ended: {}", session_id, e);
                break;
            }
        }
    }

    if !utf8_buffer.is_empty() {
        let data = String::from_utf8_lossy(&utf8_buffer).to_string();
        let _ = output_tx.send((tag.clone(), PtyOutput::Data(data))).await;
    }

    let exit_code = match tokio::task::spawn_blocking(move || child.wait()).await {
        Ok(Ok(status)) => Some(status.exit_code()),
        Ok(Err(e)) => {
            warn!("[reader:{}] Failed to reap child: {}", session_id, e);
            None
        }
        Err(e) => {
            error!("[reader:{}] spawn_blocking panicked: {}", session_id, e);
            None
        }
    };
    alive.store(false, Ordering::SeqCst);

    info!(
        "[reader:{}] PTY exited (code: {:?}). Total: {} bytes",
        session_id, exit_code, total_bytes_read
    );
    let _ = output_tx.send((tag, PtyOutput::Exit(exit_code))).await;
}

/// Find the last valid UTF-8 boundary in a byte slice
pub fn find_utf8_boundary(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Ok(_) => bytes.len(),
        // An incomplete trailing sequence has no `error_len`; anything else
        // is genuinely invalid and is passed through to the lossy decoder.
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => bytes.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_input_is_fully_valid() {
        assert_eq!(find_utf8_boundary(b""), 0);
        assert_eq!(find_utf8_boundary(b"hello"), 5);
        assert_eq!(find_utf8_boundary("héllo".as_bytes()), 6);
    }

    #[test]
    fn trailing_partial_sequence_is_held_back() {
        let euro = "€".as_bytes();
        let mut bytes = b"ab".to_vec();
        bytes.extend_from_slice(&euro[..2]);
        assert_eq!(find_utf8_boundary(&bytes), 2);
        assert_eq!(find_utf8_boundary(&euro[..1]), 0);
    }

    #[test]
    fn invalid_bytes_are_not_held_back() {
        assert_eq!(find_utf8_boundary(b"ab\xffcd"), 5);
    }
}
