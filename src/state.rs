use std::path::PathBuf;
use std::sync::Arc;

use crate::bridge::BridgeConfig;
use crate::tmux::Multiplexer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub multiplexer: Arc<dyn Multiplexer>,
    pub bridge: Arc<BridgeConfig>,
    /// Directory holding the browser client
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(multiplexer: Arc<dyn Multiplexer>, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            multiplexer,
            bridge: Arc::new(BridgeConfig::default()),
            static_dir: static_dir.into(),
        }
    }

    pub fn with_bridge_config(mut self, config: BridgeConfig) -> Self {
        self.bridge = Arc::new(config);
        self
    }
}
