//! PTY-to-WebSocket bridge
//!
//! Each WebSocket connection owns at most one PTY running a tmux client
//! attached to the session the browser asked for. See [`protocol`] for the
//! message format.

mod connection;
pub mod protocol;

pub use connection::handle_socket;
pub use protocol::{ClientMessage, ServerMessage};

pub const DEFAULT_COLS: u16 = 80;
pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_TERM: &str = "xterm-256color";

/// Settings applied to every PTY the bridge spawns.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Value of `TERM` inside the PTY
    pub term: String,
    /// Size used when the client does not send one
    pub default_cols: u16,
    pub default_rows: u16,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            term: DEFAULT_TERM.to_string(),
            default_cols: DEFAULT_COLS,
            default_rows: DEFAULT_ROWS,
        }
    }
}
