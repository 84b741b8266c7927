//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::MatchHandle;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The single authoritative match
    pub game: MatchHandle,
}

impl AppState {
    pub fn new(config: Config, game: MatchHandle) -> Self {
        Self {
            config: Arc::new(config),
            game,
        }
    }
}
