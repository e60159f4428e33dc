//! The 60 Hz authoritative step
//!
//! Step order is fixed; changing it changes outcomes.

use std::collections::HashSet;
use uuid::Uuid;

use crate::util::time::{per_tick, TICK_MS};
use crate::ws::protocol::{CollisionKind, GameMode, MatchPhase, ServerMsg};

use super::abilities::DASH_PX_PER_MS;
use super::characters::{Kit, Passive};
use super::combat::DamageSource;
use super::entities::{PowerupType, Projectile, ProjectileKind, SUPER_CHARGE_MAX, SWING_REACH};
use super::geometry::{circle_circle_distance, collides_with_walls, direction_to};
use super::map::{out_of_bounds, PLAYER_RADIUS, PROJECTILE_WALL_RADIUS};
use super::world::World;

pub const RESPAWN_DELAY_MS: u64 = 3000;
pub const RESPAWN_SHIELD_MS: u64 = 2000;
pub const RESPAWN_SPEED_MS: u64 = 2000;

pub const DASH_HIT_RADIUS: f32 = 60.0;
pub const DASH_DAMAGE: f32 = 35.0;
/// Dash ticks between ice trail drops
pub const DASH_TRAIL_EVERY: u32 = 3;

pub const ICE_TRAIL_LIFETIME_MS: u64 = 4000;
pub const ICE_TRAIL_RADIUS: f32 = 40.0;
pub const ICE_OWN_MULTIPLIER: f32 = 1.3;
pub const ICE_FOREIGN_MULTIPLIER: f32 = 0.6;

/// Time without damage before regeneration starts (ms)
pub const REGEN_GRACE_MS: u64 = 2000;
/// Base regeneration rate (HP/s)
pub const REGEN_BASE: f32 = 2.5;
/// Quadratic ramp factor (HP/s per s²)
pub const REGEN_RAMP: f32 = 5.0;

pub const SPIN_DPS: f32 = 15.0;
pub const SPIN_SPREAD_RADIUS: f32 = 90.0;

pub const TETHER_DPS: f32 = 12.0;
pub const TETHER_BREAK_DISTANCE: f32 = 450.0;

pub const SPEED_BOOST_MULTIPLIER: f32 = 1.5;

pub const STORM_DPS: f32 = 30.0;
/// Pull toward the storm centre (px per tick)
pub const STORM_PULL: f32 = 1.5;

pub const POWERUP_INTERVAL_MS: u64 = 8000;
pub const PICKUP_RADIUS: f32 = 40.0;
pub const POWERUP_BUFF_MS: u64 = 5000;
pub const FREEZE_MS: u64 = 2000;

impl World {
    /// Run a single simulation tick. Only `PLAYING` simulates.
    pub fn run_tick(&mut self, now: u64) {
        self.tick += 1;
        if self.phase != MatchPhase::Playing {
            return;
        }

        self.respawn_sweep(now);
        self.update_dashes(now);
        self.regenerate_ammo(now);
        self.regenerate_health(now);
        self.update_spin(now);
        self.update_tethers(now);
        self.expire_buffs(now);
        self.apply_hazards(now);
        self.update_powerups(now);
        self.update_projectiles(now);

        if self.mode == GameMode::Objective {
            self.update_ball(now);
        }
        self.check_win_condition(now);
    }

    fn active_ids(&self) -> Vec<Uuid> {
        self.registry
            .players
            .values()
            .filter(|p| p.is_active())
            .map(|p| p.id)
            .collect()
    }

    /// Revive players whose death timer ran out and who still have lives.
    /// Does nothing to living players.
    pub fn respawn_sweep(&mut self, now: u64) {
        let due: Vec<Uuid> = self
            .registry
            .players
            .values()
            .filter(|p| {
                !p.alive
                    && !p.is_waiting
                    && p.lives > 0
                    && p
                        .died_at
                        .map_or(false, |t| now.saturating_sub(t) > RESPAWN_DELAY_MS)
            })
            .map(|p| p.id)
            .collect();

        for id in due {
            let (x, y) = self.registry.safe_spawn();
            if let Some(player) = self.registry.players.get_mut(&id) {
                player.restore(now);
                player.x = x;
                player.y = y;
                player.respawn_shield_until = now + RESPAWN_SHIELD_MS;
                player.speed_until = now + RESPAWN_SPEED_MS;
            }
        }
    }

    fn update_dashes(&mut self, now: u64) {
        let step = DASH_PX_PER_MS * TICK_MS;
        let dashers: Vec<Uuid> = self
            .registry
            .players
            .values()
            .filter(|p| p.is_active() && p.is_dashing(now))
            .map(|p| p.id)
            .collect();

        for id in dashers {
            let Some(dasher) = self.registry.players.get_mut(&id) else {
                continue;
            };
            let nx = dasher.x + dasher.dash_dir.0 * step;
            let ny = dasher.y + dasher.dash_dir.1 * step;
            if collides_with_walls(nx, ny, PLAYER_RADIUS) {
                dasher.dashing_until = 0;
                continue;
            }
            dasher.x = nx;
            dasher.y = ny;
            dasher.dash_ticks += 1;

            if Kit::for_character(dasher.character).dash_trail
                && dasher.dash_ticks % DASH_TRAIL_EVERY == 0
            {
                self.registry
                    .add_ice_trail(nx, ny, id, now + ICE_TRAIL_LIFETIME_MS);
            }

            let Some(dasher) = self.registry.players.get(&id) else {
                continue;
            };
            let victims: Vec<Uuid> = self
                .registry
                .players
                .values()
                .filter(|p| {
                    p.id != id
                        && p.is_active()
                        && !dasher.dash_hits.contains(&p.id)
                        && circle_circle_distance(nx, ny, p.x, p.y) < DASH_HIT_RADIUS
                })
                .map(|p| p.id)
                .collect();

            for victim in victims {
                let outcome =
                    self.apply_damage(victim, Some(id), DASH_DAMAGE, DamageSource::Direct, now);
                if let Some(dasher) = self.registry.players.get_mut(&id) {
                    dasher.dash_hits.insert(victim);
                    if !outcome.negated {
                        dasher.super_charge = SUPER_CHARGE_MAX;
                    }
                }
                self.emit(ServerMsg::Collision {
                    x: nx,
                    y: ny,
                    kind: CollisionKind::Player,
                    damage: Some(outcome.dealt),
                    victim: Some(victim),
                });
            }
        }
    }

    fn regenerate_ammo(&mut self, now: u64) {
        for player in self.registry.players.values_mut() {
            if !player.is_active() {
                continue;
            }
            if player.ammo >= player.stats.max_ammo {
                player.ammo = player.stats.max_ammo;
                player.reload_timer = 0;
                continue;
            }
            if player.reload_timer == 0 {
                player.reload_timer = now;
            }
            if now.saturating_sub(player.reload_timer) >= player.stats.reload_delay {
                player.ammo += 1;
                player.reload_timer = if player.ammo < player.stats.max_ammo {
                    now
                } else {
                    0
                };
            }
        }
    }

    fn regenerate_health(&mut self, now: u64) {
        let tethered: HashSet<Uuid> = self
            .registry
            .tethers
            .keys()
            .flat_map(|pair| [pair.0, pair.1])
            .collect();

        for player in self.registry.players.values_mut() {
            if !player.is_active()
                || player.health >= player.stats.max_health
                || player.is_spinning(now)
                || tethered.contains(&player.id)
            {
                continue;
            }
            let idle_ms = now.saturating_sub(player.last_damage_at);
            if idle_ms <= REGEN_GRACE_MS {
                continue;
            }
            let over = (idle_ms - REGEN_GRACE_MS) as f32 / 1000.0;
            let rate = REGEN_BASE + over * over * REGEN_RAMP;
            player.health = (player.health + per_tick(rate)).min(player.stats.max_health);
        }
    }

    fn update_spin(&mut self, now: u64) {
        // Sources are fixed before spreading so contagion moves one hop per tick
        let spinning: Vec<(Uuid, f32, f32, Option<Uuid>)> = self
            .registry
            .players
            .values()
            .filter(|p| p.is_active() && p.is_spinning(now))
            .map(|p| (p.id, p.x, p.y, p.spin_owner))
            .collect();

        for &(id, _, _, owner) in &spinning {
            self.apply_damage(id, owner, per_tick(SPIN_DPS), DamageSource::Periodic, now);
        }

        // A spinner killed by its own DOT does not spread
        let spreading: Vec<_> = spinning
            .into_iter()
            .filter(|(id, ..)| self.registry.players.get(id).map_or(false, |p| p.is_active()))
            .collect();

        for (source, sx, sy, owner) in spreading {
            let Some(owner) = owner else {
                continue;
            };
            let nearby: Vec<Uuid> = self
                .registry
                .players
                .values()
                .filter(|p| {
                    p.id != source
                        && p.is_active()
                        && circle_circle_distance(sx, sy, p.x, p.y) <= SPIN_SPREAD_RADIUS
                })
                .map(|p| p.id)
                .collect();
            for target in nearby {
                self.inflict_spin(target, owner, now);
            }
        }

        for player in self.registry.players.values_mut() {
            if !player.is_spinning(now) {
                player.spin_owner = None;
            }
        }
    }

    fn update_tethers(&mut self, now: u64) {
        let tethers: Vec<_> = self
            .registry
            .tethers
            .iter()
            .map(|(pair, expiry)| (*pair, *expiry))
            .collect();

        let damage = per_tick(TETHER_DPS);
        for (pair, expiry) in tethers {
            let a = self.registry.players.get(&pair.0).filter(|p| p.is_active());
            let b = self.registry.players.get(&pair.1).filter(|p| p.is_active());
            let intact = match (a, b) {
                (Some(a), Some(b)) => {
                    now < expiry
                        && circle_circle_distance(a.x, a.y, b.x, b.y) <= TETHER_BREAK_DISTANCE
                }
                _ => false,
            };
            if !intact {
                self.registry.tethers.remove(&pair);
                continue;
            }
            // Tether kills carry no attribution
            self.apply_damage(pair.0, None, damage, DamageSource::Periodic, now);
            self.apply_damage(pair.1, None, damage, DamageSource::Periodic, now);
        }
    }

    fn expire_buffs(&mut self, now: u64) {
        for player in self.registry.players.values_mut() {
            player.speed_multiplier = if now < player.speed_until {
                SPEED_BOOST_MULTIPLIER
            } else {
                1.0
            };
        }
    }

    fn apply_hazards(&mut self, now: u64) {
        self.registry.expire_ice_trails(now);

        let trails: Vec<(f32, f32, Uuid)> = self
            .registry
            .ice_trails
            .iter()
            .map(|t| (t.x, t.y, t.owner_id))
            .collect();
        if !trails.is_empty() {
            for player in self.registry.players.values_mut() {
                if !player.is_active() {
                    continue;
                }
                let mut own = false;
                let mut foreign = false;
                for &(tx, ty, owner) in &trails {
                    if circle_circle_distance(player.x, player.y, tx, ty) <= ICE_TRAIL_RADIUS {
                        if owner == player.id {
                            own = true;
                        } else {
                            foreign = true;
                        }
                    }
                }
                if own {
                    player.speed_multiplier *= ICE_OWN_MULTIPLIER;
                } else if foreign {
                    player.speed_multiplier *= ICE_FOREIGN_MULTIPLIER;
                }
            }
        }

        let storms: Vec<(f32, f32, f32, Uuid)> = self
            .registry
            .projectiles
            .values()
            .filter(|p| p.kind.is_area() && !p.expired(now))
            .map(|p| (p.x, p.y, p.kind.stats().radius, p.owner_id))
            .collect();
        for (sx, sy, radius, owner) in storms {
            for id in self.active_ids() {
                if id == owner {
                    continue;
                }
                let Some(player) = self.registry.players.get_mut(&id) else {
                    continue;
                };
                if circle_circle_distance(sx, sy, player.x, player.y) > radius {
                    continue;
                }
                if let Some((dx, dy, dist)) = direction_to(player.x, player.y, sx, sy) {
                    let pull = STORM_PULL.min(dist);
                    let (nx, ny) = (player.x + dx * pull, player.y + dy * pull);
                    if !collides_with_walls(nx, ny, PLAYER_RADIUS) {
                        player.x = nx;
                        player.y = ny;
                    }
                }
                self.apply_damage(id, Some(owner), per_tick(STORM_DPS), DamageSource::Periodic, now);
            }
        }
    }

    fn update_powerups(&mut self, now: u64) {
        if now.saturating_sub(self.last_powerup_spawn) >= POWERUP_INTERVAL_MS {
            self.registry.spawn_powerup();
            self.last_powerup_spawn = now;
        }

        let powerups: Vec<(u64, f32, f32, PowerupType)> = self
            .registry
            .powerups
            .values()
            .map(|p| (p.id, p.x, p.y, p.kind))
            .collect();

        for (powerup_id, px, py, kind) in powerups {
            let picker = self
                .registry
                .players
                .values()
                .find(|p| p.is_active() && circle_circle_distance(px, py, p.x, p.y) < PICKUP_RADIUS)
                .map(|p| p.id);
            let Some(picker) = picker else {
                continue;
            };
            self.registry.remove_powerup(powerup_id);
            self.apply_powerup(picker, kind, now);
        }
    }

    fn apply_powerup(&mut self, picker: Uuid, kind: PowerupType, now: u64) {
        match kind {
            PowerupType::Speed => {
                if let Some(player) = self.registry.players.get_mut(&picker) {
                    player.speed_until = now + POWERUP_BUFF_MS;
                }
            }
            PowerupType::UnlimitedAmmo => {
                if let Some(player) = self.registry.players.get_mut(&picker) {
                    player.unlimited_ammo_until = now + POWERUP_BUFF_MS;
                    player.ammo = player.stats.max_ammo;
                    player.reload_timer = 0;
                }
            }
            PowerupType::Freeze => {
                for player in self.registry.players.values_mut() {
                    if player.id != picker
                        && player.is_active()
                        && player.stats.passive != Passive::FreezeImmune
                    {
                        player.frozen_until = now + FREEZE_MS;
                    }
                }
            }
        }
    }

    fn update_projectiles(&mut self, now: u64) {
        let ids: Vec<u64> = self.registry.projectiles.keys().copied().collect();
        for id in ids {
            // Taken out while stepping so the rest of the world stays borrowable
            let Some(mut proj) = self.registry.remove_projectile(id) else {
                continue;
            };
            if self.step_projectile(&mut proj, now) {
                self.registry.projectiles.insert(id, proj);
            }
        }
    }

    /// Advance one projectile and resolve its collisions.
    /// Returns false when it must be destroyed.
    fn step_projectile(&mut self, proj: &mut Projectile, now: u64) -> bool {
        let stats = proj.kind.stats();

        if stats.attached {
            let Some(owner) = self
                .registry
                .players
                .get(&proj.owner_id)
                .filter(|p| p.is_active())
            else {
                return false;
            };
            proj.target_angle = Some(owner.angle);
            proj.x = owner.x + owner.angle.cos() * SWING_REACH;
            proj.y = owner.y + owner.angle.sin() * SWING_REACH;
        } else {
            proj.x += proj.vel_x;
            proj.y += proj.vel_y;
        }

        if proj.expired(now) || out_of_bounds(proj.x, proj.y) {
            return false;
        }

        if !stats.ignores_walls && collides_with_walls(proj.x, proj.y, PROJECTILE_WALL_RADIUS) {
            self.emit(ServerMsg::Collision {
                x: proj.x,
                y: proj.y,
                kind: CollisionKind::Wall,
                damage: None,
                victim: None,
            });
            return false;
        }

        if self.mode == GameMode::Objective && self.push_ball(proj) && !stats.persistent_vs_ball {
            return false;
        }

        if proj.kind.is_area() {
            return true;
        }

        let victims: Vec<Uuid> = self
            .registry
            .players
            .values()
            .filter(|p| p.is_active() && proj.can_hit(p.id) && proj.check_hit(p.x, p.y))
            .map(|p| p.id)
            .collect();

        for victim in victims {
            if let Some(hits) = proj.hit_set.as_mut() {
                hits.insert(victim);
            }
            let outcome =
                self.apply_damage(victim, Some(proj.owner_id), stats.damage, DamageSource::Direct, now);
            self.emit(ServerMsg::Collision {
                x: proj.x,
                y: proj.y,
                kind: CollisionKind::Player,
                damage: Some(outcome.dealt),
                victim: Some(victim),
            });
            if stats.charge_gain > 0.0 {
                self.grant_charge(proj.owner_id, stats.charge_gain);
            }
            match proj.kind {
                _ if outcome.negated => {}
                ProjectileKind::Bolt => {
                    self.chain_lightning(victim, proj.owner_id, now);
                }
                ProjectileKind::Tornado => {
                    self.inflict_spin(victim, proj.owner_id, now);
                }
                _ => {}
            }
            if !stats.piercing {
                return false;
            }
        }
        true
    }
}
