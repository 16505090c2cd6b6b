//! Pseudo-terminal sessions
//!
//! PTY allocation itself is delegated to `portable-pty`; this module only
//! wires a PTY's byte streams to async channels.

mod session;

pub use session::{find_utf8_boundary, PtyOutput, PtySession, SpawnOptions};
