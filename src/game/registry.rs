//! Entity registry - owns every mutable collection in the world

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::Character;

use super::entities::{
    Ball, IceTrail, PairKey, Player, Powerup, PowerupType, Projectile, ProjectileSpec,
};
use super::geometry::collides_with_walls;
use super::map::{PLAYER_RADIUS, WORLD_HEIGHT, WORLD_WIDTH};

/// Sampling attempts before safe spawn falls back to the last sample
pub const SPAWN_ATTEMPTS: u32 = 100;
/// Margin kept from the world edge when sampling spawn points
const SPAWN_MARGIN: f32 = 100.0;

pub const POWERUP_CAP: usize = 4;
pub const POWERUP_RADIUS: f32 = 20.0;
const POWERUP_ATTEMPTS: u32 = 50;

/// Collections are ordered maps so that iteration order, and therefore the
/// outcome of a tick, only depends on the seed and the inputs.
pub struct EntityRegistry {
    pub players: BTreeMap<Uuid, Player>,
    pub projectiles: BTreeMap<u64, Projectile>,
    pub powerups: BTreeMap<u64, Powerup>,
    /// Pair -> expiry deadline
    pub tethers: BTreeMap<PairKey, u64>,
    pub ice_trails: Vec<IceTrail>,
    pub ball: Option<Ball>,
    pub rng: ChaCha8Rng,
    next_id: u64,
}

impl EntityRegistry {
    pub fn new(seed: u64) -> Self {
        Self {
            players: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            powerups: BTreeMap::new(),
            tethers: BTreeMap::new(),
            ice_trails: Vec::new(),
            ball: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_id: 1,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    /// Uniform rejection sampling against the walls.
    ///
    /// Gives up after `SPAWN_ATTEMPTS` samples and returns the last one, which
    /// may collide on a pathological map.
    pub fn safe_spawn(&mut self) -> (f32, f32) {
        let mut point = (WORLD_WIDTH / 2.0, WORLD_HEIGHT / 2.0);
        for _ in 0..SPAWN_ATTEMPTS {
            let x = self.rng.gen_range(SPAWN_MARGIN..WORLD_WIDTH - SPAWN_MARGIN).floor();
            let y = self.rng.gen_range(SPAWN_MARGIN..WORLD_HEIGHT - SPAWN_MARGIN).floor();
            point = (x, y);
            if !collides_with_walls(x, y, PLAYER_RADIUS) {
                return point;
            }
        }
        debug!(x = point.0, y = point.1, "Safe spawn exhausted attempts, using last sample");
        point
    }

    pub fn spawn_player(
        &mut self,
        id: Uuid,
        character: Character,
        nickname: String,
        now: u64,
    ) -> &mut Player {
        let (x, y) = self.safe_spawn();
        let player = Player::new(id, character, nickname, x, y, now);
        match self.players.entry(id) {
            Entry::Occupied(mut entry) => {
                entry.insert(player);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(player),
        }
    }

    /// Remove a player and everything that only makes sense while they exist
    pub fn remove_player(&mut self, id: Uuid) -> Option<Player> {
        let removed = self.players.remove(&id);
        if removed.is_some() {
            self.tethers.retain(|pair, _| !pair.contains(id));
            self.ice_trails.retain(|trail| trail.owner_id != id);
        }
        removed
    }

    pub fn spawn_projectile(&mut self, spec: ProjectileSpec) -> u64 {
        let id = self.next_id();
        self.projectiles.insert(id, Projectile::from_spec(id, &spec));
        id
    }

    pub fn remove_projectile(&mut self, id: u64) -> Option<Projectile> {
        self.projectiles.remove(&id)
    }

    fn roll_powerup_type(&mut self) -> PowerupType {
        let total: u32 = PowerupType::WEIGHTS.iter().map(|(_, w)| w).sum();
        let mut roll = self.rng.gen_range(0..total);
        for (kind, weight) in PowerupType::WEIGHTS {
            if roll < weight {
                return kind;
            }
            roll -= weight;
        }
        PowerupType::Speed
    }

    /// Spawn one powerup unless the cap is reached or no clear spot was found
    pub fn spawn_powerup(&mut self) -> Option<u64> {
        if self.powerups.len() >= POWERUP_CAP {
            return None;
        }
        let kind = self.roll_powerup_type();
        for _ in 0..POWERUP_ATTEMPTS {
            let x = self.rng.gen_range(SPAWN_MARGIN..WORLD_WIDTH - SPAWN_MARGIN);
            let y = self.rng.gen_range(SPAWN_MARGIN..WORLD_HEIGHT - SPAWN_MARGIN);
            if collides_with_walls(x, y, POWERUP_RADIUS) {
                continue;
            }
            let id = self.next_id();
            self.powerups.insert(id, Powerup { id, x, y, kind });
            return Some(id);
        }
        None
    }

    pub fn remove_powerup(&mut self, id: u64) -> Option<Powerup> {
        self.powerups.remove(&id)
    }

    /// Create or refresh the tether for an unordered pair.
    /// Returns true when the tether is new.
    pub fn upsert_tether(&mut self, pair: PairKey, expires_at: u64) -> bool {
        match self.tethers.get_mut(&pair) {
            Some(expiry) => {
                *expiry = (*expiry).max(expires_at);
                false
            }
            None => {
                self.tethers.insert(pair, expires_at);
                true
            }
        }
    }

    pub fn is_tethered(&self, id: Uuid) -> bool {
        self.tethers.keys().any(|pair| pair.contains(id))
    }

    pub fn add_ice_trail(&mut self, x: f32, y: f32, owner_id: Uuid, expires_at: u64) -> u64 {
        let id = self.next_id();
        self.ice_trails.push(IceTrail {
            id,
            x,
            y,
            owner_id,
            expires_at,
        });
        id
    }

    pub fn expire_ice_trails(&mut self, now: u64) {
        self.ice_trails.retain(|trail| now < trail.expires_at);
    }

    /// Drop everything that belongs to a single round
    pub fn clear_round(&mut self) {
        self.projectiles.clear();
        self.powerups.clear();
        self.tethers.clear();
        self.ice_trails.clear();
        self.ball = None;
    }
}
