//! Application state shared across routes

use dashmap::DashMap;
use rand::Rng;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::game::{GameMatch, MatchHandle};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The single running match
    pub game: MatchHandle,
    /// Open WebSocket sessions and when they connected (Unix ms)
    pub sessions: Arc<DashMap<Uuid, u64>>,
}

impl AppState {
    /// Build the state and the match it points at. The caller spawns the
    /// returned match on the runtime.
    pub fn new(config: Config) -> (Self, GameMatch) {
        let config = Arc::new(config);

        let seed = config
            .match_seed
            .unwrap_or_else(|| rand::thread_rng().gen());
        info!(seed, min_players = config.min_players, "Creating match");
        let (game_match, game) = GameMatch::new(seed, config.min_players);

        let state = Self {
            config,
            game,
            sessions: Arc::new(DashMap::new()),
        };
        (state, game_match)
    }
}
