//! Browser front-end for tmux.
//!
//! HTTP endpoints translate into tmux commands ([`tmux`]); a WebSocket
//! bridges a PTY running a tmux client to a browser terminal ([`bridge`]).

pub mod api;
pub mod bridge;
pub mod config;
pub mod errors;
pub mod models;
pub mod pty;
pub mod state;
pub mod tmux;

pub use api::build_router;
pub use state::AppState;
