//! Per-viewer state snapshots

use std::collections::BTreeMap;
use uuid::Uuid;

use crate::ws::protocol::{
    BallView, IceTrailView, PlayerView, PowerupView, ProjectileView, StateSnapshot,
};

use super::entities::Player;
use super::visibility::is_visible;
use super::world::World;

pub fn player_view(p: &Player, now: u64) -> PlayerView {
    PlayerView {
        id: p.id,
        nickname: p.nickname.clone(),
        character: p.character,
        x: p.x,
        y: p.y,
        angle: p.angle,
        health: p.health,
        max_health: p.stats.max_health,
        ammo: p.ammo,
        max_ammo: p.stats.max_ammo,
        super_charge: p.super_charge,
        alive: p.alive,
        lives: p.lives,
        kills: p.kills,
        ready: p.ready,
        is_waiting: p.is_waiting,
        frozen: p.is_frozen(now),
        spinning: p.is_spinning(now),
        dashing: p.is_dashing(now),
        respawn_shield: p.has_respawn_shield(now),
        shield_ready: p.shield_ready,
        speed_multiplier: p.speed_multiplier,
        goal_side: p.goal_side,
    }
}

/// Builds snapshots from the world. Entity lists other than players are
/// shared by all viewers, so they are built once per broadcast.
pub struct SnapshotBuilder<'a> {
    world: &'a World,
    now: u64,
    timestamp: u64,
    projectiles: Vec<ProjectileView>,
    powerups: Vec<PowerupView>,
    ice_trails: Vec<IceTrailView>,
    ball: Option<BallView>,
}

impl<'a> SnapshotBuilder<'a> {
    /// `now` is match time for status checks, `timestamp` the wall clock
    pub fn new(world: &'a World, now: u64, timestamp: u64) -> Self {
        let registry = &world.registry;
        let projectiles = registry
            .projectiles
            .values()
            .map(|p| ProjectileView {
                id: p.id,
                kind: p.kind,
                owner: p.owner_id,
                x: p.x,
                y: p.y,
                vx: p.vel_x,
                vy: p.vel_y,
                radius: p.kind.stats().radius,
                angle: p.target_angle,
            })
            .collect();
        let powerups = registry
            .powerups
            .values()
            .map(|p| PowerupView {
                id: p.id,
                x: p.x,
                y: p.y,
                kind: p.kind,
            })
            .collect();
        let ice_trails = registry
            .ice_trails
            .iter()
            .map(|t| IceTrailView {
                id: t.id,
                x: t.x,
                y: t.y,
                owner: t.owner_id,
            })
            .collect();
        let ball = registry.ball.as_ref().map(|b| BallView {
            x: b.x,
            y: b.y,
            vx: b.vel_x,
            vy: b.vel_y,
            radius: b.radius,
        });

        Self {
            world,
            now,
            timestamp,
            projectiles,
            powerups,
            ice_trails,
            ball,
        }
    }

    /// Players `viewer` is allowed to see
    pub fn visible_players(&self, viewer: Option<Uuid>) -> BTreeMap<Uuid, PlayerView> {
        let players = &self.world.registry.players;
        let viewer = viewer.and_then(|id| players.get(&id));
        players
            .values()
            .filter(|p| is_visible(viewer, p, self.now))
            .map(|p| (p.id, player_view(p, self.now)))
            .collect()
    }

    pub fn build(&self, viewer: Option<Uuid>) -> StateSnapshot {
        StateSnapshot {
            players: self.visible_players(viewer),
            projectiles: self.projectiles.clone(),
            powerups: self.powerups.clone(),
            ice_trails: self.ice_trails.clone(),
            ball: self.ball.clone(),
            mode: self.world.mode,
            state: self.world.phase,
            timestamp: self.timestamp,
        }
    }
}

/// Snapshot counters for the health endpoint and the shutdown log
#[derive(Debug, Default)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub dropped_snapshots: u64,
    pub avg_players_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, player_count: usize, delivered: bool) {
        self.total_snapshots += 1;
        if !delivered {
            self.dropped_snapshots += 1;
        }

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_players_per_snapshot =
            self.avg_players_per_snapshot * ((n - 1.0) / n) + (player_count as f32 / n);
    }
}
