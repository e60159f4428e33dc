//! Game simulation modules

pub mod abilities;
pub mod ball;
pub mod characters;
pub mod combat;
pub mod entities;
pub mod geometry;
pub mod lobby;
pub mod map;
pub mod r#match;
pub mod registry;
pub mod snapshot;
pub mod tick;
pub mod visibility;
pub mod world;

pub use r#match::{GameMatch, MatchCommand, MatchHandle, MatchStatus, CLIENT_QUEUE_CAPACITY};
pub use world::{IntentError, World};
