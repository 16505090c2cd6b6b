use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::bridge::{BridgeConfig, DEFAULT_COLS, DEFAULT_ROWS, DEFAULT_TERM};
use crate::tmux::TmuxCli;

/// Serve tmux sessions to the browser.
#[derive(Parser, Debug, Clone)]
#[command(name = "tmux-web")]
#[command(about = "HTTP and WebSocket front-end for tmux")]
pub struct Config {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Directory with the browser client
    #[arg(long, env = "STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,

    /// tmux executable
    #[arg(long, env = "TMUX_BIN", default_value = "tmux")]
    pub tmux_bin: PathBuf,

    /// Dedicated tmux server socket name (`tmux -L`)
    #[arg(long, env = "TMUX_SOCKET")]
    pub tmux_socket: Option<String>,

    /// TERM value inside attached terminals
    #[arg(long, env = "TERM_NAME", default_value = DEFAULT_TERM)]
    pub term: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn tmux(&self) -> TmuxCli {
        TmuxCli::new(self.tmux_bin.clone(), self.tmux_socket.clone())
    }

    pub fn bridge(&self) -> BridgeConfig {
        BridgeConfig {
            term: self.term.clone(),
            default_cols: DEFAULT_COLS,
            default_rows: DEFAULT_ROWS,
        }
    }
}
