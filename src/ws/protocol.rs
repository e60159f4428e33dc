//! WebSocket protocol message definitions
//! These are the wire types for client-server communication.
//!
//! Every frame is a JSON object `{"event": <name>, "data": {...}}` with
//! camelCase field names.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::game::entities::{GoalSide, PowerupType, ProjectileKind};

/// Playable characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Character {
    /// Heavy gunner, shrugs off part of every hit
    Vanguard,
    /// Chain lightning and storm fields
    Volt,
    /// Ice dash that refunds itself on hit
    Frost,
    /// Melee combo, contagious spin
    Cyclone,
}

impl Character {
    pub const ALL: [Character; 4] = [
        Character::Vanguard,
        Character::Volt,
        Character::Frost,
        Character::Cyclone,
    ];
}

impl Default for Character {
    fn default() -> Self {
        Self::Vanguard
    }
}

/// Match lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchPhase {
    /// Players join and ready up
    Lobby,
    /// Everyone is ready, waiting for a mode
    PickMode,
    /// Match in progress
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameMode {
    Deathmatch,
    /// Ball and goals
    Objective,
}

impl Default for GameMode {
    fn default() -> Self {
        Self::Deathmatch
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMsg {
    /// Enter the match with a character
    Join {
        character: Character,
        #[serde(default)]
        nickname: String,
    },

    ReadyUp {
        is_ready: bool,
    },

    SelectMode {
        mode: GameMode,
    },

    /// Client-predicted pose
    Update {
        x: f32,
        y: f32,
        angle: f32,
    },

    Shoot {
        #[serde(default)]
        is_super: bool,
        #[serde(default)]
        target_x: Option<f32>,
        #[serde(default)]
        target_y: Option<f32>,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMsg {
    /// Sent once on connect
    Init {
        id: Uuid,
        players: BTreeMap<Uuid, PlayerView>,
    },

    LobbyUpdate {
        players: Vec<LobbyPlayer>,
    },

    /// All players are ready, a mode must be chosen
    PickMode {},

    GameStart {
        mode: GameMode,
    },

    /// Per-viewer world snapshot (sent at the broadcast rate)
    State(StateSnapshot),

    Collision {
        x: f32,
        y: f32,
        #[serde(rename = "type")]
        kind: CollisionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        damage: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        victim: Option<Uuid>,
    },

    KillNotification {
        /// None when the death cannot be attributed (tethers)
        killer: Option<Uuid>,
        victim: Uuid,
    },

    LightningTether {
        p1: Uuid,
        p2: Uuid,
    },

    ShieldBreak {
        id: Uuid,
    },

    MatchResults {
        winner: Option<Uuid>,
        results: Vec<PlayerResult>,
        mode: GameMode,
    },
}

/// What a collision event hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollisionKind {
    Wall,
    Player,
    Ball,
    Goal,
}

/// Player entry in the lobby list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LobbyPlayer {
    pub id: Uuid,
    pub nickname: String,
    pub character: Character,
    pub ready: bool,
    pub is_waiting: bool,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: Uuid,
    pub nickname: String,
    pub character: Character,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    pub health: f32,
    pub max_health: f32,
    pub ammo: u32,
    pub max_ammo: u32,
    pub super_charge: f32,
    pub alive: bool,
    pub lives: u32,
    pub kills: u32,
    pub ready: bool,
    pub is_waiting: bool,
    pub frozen: bool,
    pub spinning: bool,
    pub dashing: bool,
    /// Respawn shield active
    pub respawn_shield: bool,
    /// One-time shield still armed
    pub shield_ready: bool,
    pub speed_multiplier: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_side: Option<GoalSide>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileView {
    pub id: u64,
    pub kind: ProjectileKind,
    pub owner: Uuid,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angle: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerupView {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "type")]
    pub kind: PowerupType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceTrailView {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub owner: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallView {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub radius: f32,
}

/// Full snapshot as seen by one viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub players: BTreeMap<Uuid, PlayerView>,
    pub projectiles: Vec<ProjectileView>,
    pub powerups: Vec<PowerupView>,
    pub ice_trails: Vec<IceTrailView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ball: Option<BallView>,
    pub mode: GameMode,
    pub state: MatchPhase,
    /// Server wall clock (Unix ms)
    pub timestamp: u64,
}

/// Per-player line of the results screen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResult {
    pub id: Uuid,
    pub nickname: String,
    pub character: Character,
    pub kills: u32,
    pub deaths: u32,
    pub lives: u32,
    pub placement: u32,
}
