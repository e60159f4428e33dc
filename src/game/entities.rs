//! Entity types owned by the registry

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::ws::protocol::Character;

use super::characters::{CharacterStats, Passive};
use super::map::world_center;

/// Super charge needed to fire a charged attack
pub const SUPER_CHARGE_MAX: f32 = 100.0;

/// Which goal a player defends in objective mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GoalSide {
    Left,
    Right,
}

/// Player state (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub id: Uuid,
    pub nickname: String,
    pub character: Character,
    pub stats: CharacterStats,

    // Transform
    pub x: f32,
    pub y: f32,
    pub angle: f32,

    // Combat
    pub health: f32,
    pub ammo: u32,
    /// Start of the current reload, 0 when idle
    pub reload_timer: u64,
    pub super_charge: f32,
    pub alive: bool,
    pub died_at: Option<u64>,
    pub lives: u32,
    pub shield_ready: bool,
    pub last_damage_at: u64,
    pub last_attacker: Option<Uuid>,
    /// Most recent attack, reveals the player inside foliage
    pub last_attack_at: Option<u64>,

    // Deadlines
    pub frozen_until: u64,
    pub spinning_until: u64,
    pub spin_immune_until: u64,
    pub spin_owner: Option<Uuid>,
    pub dashing_until: u64,
    pub dash_dir: (f32, f32),
    pub dash_ticks: u32,
    pub dash_hits: HashSet<Uuid>,
    pub respawn_shield_until: u64,
    pub speed_until: u64,
    pub unlimited_ammo_until: u64,

    /// Recomputed every tick from buffs and hazards
    pub speed_multiplier: f32,

    // Lobby
    pub ready: bool,
    pub is_waiting: bool,
    pub goal_side: Option<GoalSide>,

    // Stats
    pub kills: u32,
    pub deaths: u32,
}

impl Player {
    pub fn new(id: Uuid, character: Character, nickname: String, x: f32, y: f32, now: u64) -> Self {
        let stats = CharacterStats::for_character(character);
        Self {
            id,
            nickname,
            character,
            stats,
            x,
            y,
            angle: 0.0,
            health: stats.max_health,
            ammo: stats.max_ammo,
            reload_timer: 0,
            super_charge: 0.0,
            alive: true,
            died_at: None,
            lives: 0,
            shield_ready: stats.passive == Passive::OneTimeShield,
            last_damage_at: now,
            last_attacker: None,
            last_attack_at: None,
            frozen_until: 0,
            spinning_until: 0,
            spin_immune_until: 0,
            spin_owner: None,
            dashing_until: 0,
            dash_dir: (0.0, 0.0),
            dash_ticks: 0,
            dash_hits: HashSet::new(),
            respawn_shield_until: 0,
            speed_until: 0,
            unlimited_ammo_until: 0,
            speed_multiplier: 1.0,
            ready: false,
            is_waiting: false,
            goal_side: None,
            kills: 0,
            deaths: 0,
        }
    }

    /// Alive and taking part in the current match
    pub fn is_active(&self) -> bool {
        self.alive && !self.is_waiting
    }

    pub fn is_frozen(&self, now: u64) -> bool {
        now < self.frozen_until
    }

    pub fn is_spinning(&self, now: u64) -> bool {
        now < self.spinning_until
    }

    pub fn is_dashing(&self, now: u64) -> bool {
        now < self.dashing_until
    }

    pub fn has_respawn_shield(&self, now: u64) -> bool {
        now < self.respawn_shield_until
    }

    pub fn has_unlimited_ammo(&self, now: u64) -> bool {
        now < self.unlimited_ammo_until
    }

    /// Restore combat resources for a fresh life
    pub fn restore(&mut self, now: u64) {
        self.health = self.stats.max_health;
        self.ammo = self.stats.max_ammo;
        self.reload_timer = 0;
        self.super_charge = 0.0;
        self.alive = true;
        self.died_at = None;
        self.shield_ready = self.stats.passive == Passive::OneTimeShield;
        self.last_damage_at = now;
        self.last_attacker = None;
        self.frozen_until = 0;
        self.spinning_until = 0;
        self.spin_immune_until = 0;
        self.spin_owner = None;
        self.dashing_until = 0;
        self.dash_hits.clear();
        self.speed_multiplier = 1.0;
    }
}

/// Attack types with fixed stats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectileKind {
    Slug,
    Cannon,
    Bolt,
    Storm,
    Shard,
    Swing,
    Tornado,
}

/// Fixed per-kind constants
#[derive(Debug, Clone, Copy)]
pub struct KindStats {
    /// Hit radius against players
    pub radius: f32,
    pub damage: f32,
    /// Pixels per tick
    pub speed: f32,
    pub lifetime_ms: u64,
    /// Registers each victim once instead of dying on the first hit
    pub piercing: bool,
    pub ignores_walls: bool,
    /// Follows the owner's position and angle
    pub attached: bool,
    /// Survives touching the ball
    pub persistent_vs_ball: bool,
    /// Super charge granted to the owner per victim
    pub charge_gain: f32,
}

impl ProjectileKind {
    pub fn stats(self) -> KindStats {
        match self {
            ProjectileKind::Slug => KindStats {
                radius: 40.0,
                damage: 25.0,
                speed: 15.0,
                lifetime_ms: 1500,
                piercing: false,
                ignores_walls: false,
                attached: false,
                persistent_vs_ball: false,
                charge_gain: 25.0,
            },
            ProjectileKind::Cannon => KindStats {
                radius: 40.0,
                damage: 100.0,
                speed: 25.0,
                lifetime_ms: 1500,
                piercing: true,
                ignores_walls: true,
                attached: false,
                persistent_vs_ball: false,
                charge_gain: 0.0,
            },
            ProjectileKind::Bolt => KindStats {
                radius: 30.0,
                damage: 20.0,
                speed: 18.0,
                lifetime_ms: 1200,
                piercing: false,
                ignores_walls: false,
                attached: false,
                persistent_vs_ball: false,
                charge_gain: 20.0,
            },
            // Area damage is applied by the hazard pass, not on contact
            ProjectileKind::Storm => KindStats {
                radius: 160.0,
                damage: 0.0,
                speed: 0.0,
                lifetime_ms: 3000,
                piercing: true,
                ignores_walls: true,
                attached: false,
                persistent_vs_ball: true,
                charge_gain: 0.0,
            },
            ProjectileKind::Shard => KindStats {
                radius: 25.0,
                damage: 18.0,
                speed: 17.0,
                lifetime_ms: 1200,
                piercing: false,
                ignores_walls: false,
                attached: false,
                persistent_vs_ball: false,
                charge_gain: 20.0,
            },
            ProjectileKind::Swing => KindStats {
                radius: 70.0,
                damage: 20.0,
                speed: 0.0,
                lifetime_ms: 200,
                piercing: true,
                ignores_walls: true,
                attached: true,
                persistent_vs_ball: true,
                charge_gain: 15.0,
            },
            ProjectileKind::Tornado => KindStats {
                radius: 50.0,
                damage: 10.0,
                speed: 12.0,
                lifetime_ms: 1500,
                piercing: true,
                ignores_walls: false,
                attached: false,
                persistent_vs_ball: false,
                charge_gain: 0.0,
            },
        }
    }

    /// Area kinds deal damage through the hazard pass
    pub fn is_area(self) -> bool {
        matches!(self, ProjectileKind::Storm)
    }
}

/// Distance from the owner's centre to an attached swing
pub const SWING_REACH: f32 = 50.0;

/// Active projectile in the game
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: u64,
    pub kind: ProjectileKind,
    pub owner_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    /// Victims already damaged, for piercing kinds
    pub hit_set: Option<HashSet<Uuid>>,
    pub started_at: u64,
    pub duration_ms: u64,
    /// Tracking angle for attached swings
    pub target_angle: Option<f32>,
    /// Persistent kinds push the ball once
    pub touched_ball: bool,
}

/// Everything needed to create a projectile
#[derive(Debug, Clone)]
pub struct ProjectileSpec {
    pub kind: ProjectileKind,
    pub owner_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub direction: f32,
    pub now: u64,
}

impl Projectile {
    pub fn from_spec(id: u64, spec: &ProjectileSpec) -> Self {
        let stats = spec.kind.stats();
        Self {
            id,
            kind: spec.kind,
            owner_id: spec.owner_id,
            x: spec.x,
            y: spec.y,
            vel_x: spec.direction.cos() * stats.speed,
            vel_y: spec.direction.sin() * stats.speed,
            hit_set: stats.piercing.then(HashSet::new),
            started_at: spec.now,
            duration_ms: stats.lifetime_ms,
            target_angle: stats.attached.then_some(spec.direction),
            touched_ball: false,
        }
    }

    pub fn expired(&self, now: u64) -> bool {
        now.saturating_sub(self.started_at) >= self.duration_ms
    }

    /// Check collision with a target centre
    pub fn check_hit(&self, target_x: f32, target_y: f32) -> bool {
        let dx = self.x - target_x;
        let dy = self.y - target_y;
        let radius = self.kind.stats().radius;
        dx * dx + dy * dy < radius * radius
    }

    /// True when this projectile may still damage `victim`
    pub fn can_hit(&self, victim: Uuid) -> bool {
        victim != self.owner_id
            && self
                .hit_set
                .as_ref()
                .map_or(true, |hits| !hits.contains(&victim))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerupType {
    Speed,
    UnlimitedAmmo,
    Freeze,
}

impl PowerupType {
    /// Spawn weights (speed, unlimited ammo, freeze)
    pub const WEIGHTS: [(PowerupType, u32); 3] = [
        (PowerupType::Speed, 45),
        (PowerupType::UnlimitedAmmo, 35),
        (PowerupType::Freeze, 20),
    ];
}

#[derive(Debug, Clone)]
pub struct Powerup {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub kind: PowerupType,
}

/// Unordered pair of player ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey(pub Uuid, pub Uuid);

impl PairKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.0 == id || self.1 == id
    }
}

#[derive(Debug, Clone)]
pub struct IceTrail {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub owner_id: Uuid,
    pub expires_at: u64,
}

pub const BALL_RADIUS: f32 = 30.0;
pub const BALL_MASS: f32 = 1.0;
pub const BALL_FRICTION: f32 = 0.985;

/// Objective-mode ball
#[derive(Debug, Clone)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub radius: f32,
    pub mass: f32,
    pub friction: f32,
}

impl Ball {
    pub fn new() -> Self {
        let (x, y) = world_center();
        Self {
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            radius: BALL_RADIUS,
            mass: BALL_MASS,
            friction: BALL_FRICTION,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for Ball {
    fn default() -> Self {
        Self::new()
    }
}
