//! Ability resolver - turns a `shoot` intent into projectiles or state changes

use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::MatchPhase;

use super::characters::{Kit, SuperKind};
use super::entities::{ProjectileKind, ProjectileSpec, SUPER_CHARGE_MAX, SWING_REACH};
use super::geometry::direction_to;
use super::world::{DeferredEffect, DeferredKind, IntentError, World};

/// Projectiles spawn this far in front of the shooter
pub const MUZZLE_OFFSET: f32 = 40.0;

/// Dash travel speed in pixels per millisecond
pub const DASH_PX_PER_MS: f32 = 1.2;
/// Longest dash (ms)
pub const DASH_MAX_MS: f32 = 450.0;
/// Dash distance when no target point is given
pub const DASH_DEFAULT_DISTANCE: f32 = 450.0;

/// Farthest a storm can be placed from its caster
pub const STORM_MAX_RANGE: f32 = 600.0;
/// Storm placement when no target point is given
pub const STORM_DEFAULT_RANGE: f32 = 300.0;

/// Delay before the second swing of a melee combo (ms)
pub const COMBO_DELAY_MS: u64 = 250;

/// Dash duration for a given travel distance
pub fn dash_duration_ms(distance: f32) -> u64 {
    (distance / DASH_PX_PER_MS).min(DASH_MAX_MS).max(0.0).round() as u64
}

/// Where an attack is aimed: explicit target or straight ahead
struct Aim {
    /// Unit direction
    dx: f32,
    dy: f32,
    angle: f32,
    /// Distance to the explicit target, if any
    distance: Option<f32>,
}

impl World {
    /// Validate and resolve a `shoot` intent
    pub fn resolve_shoot(
        &mut self,
        id: Uuid,
        is_super: bool,
        target: Option<(f32, f32)>,
        now: u64,
    ) -> Result<(), IntentError> {
        if self.phase != MatchPhase::Playing {
            return Err(IntentError::WrongPhase(self.phase));
        }
        if target.map_or(false, |(tx, ty)| !(tx.is_finite() && ty.is_finite())) {
            return Err(IntentError::NotFinite);
        }

        let player = self
            .registry
            .players
            .get_mut(&id)
            .ok_or(IntentError::UnknownPlayer(id))?;

        if player.is_waiting {
            return Err(IntentError::Waiting);
        }
        if !player.alive {
            return Err(IntentError::Dead);
        }
        if player.is_frozen(now) {
            return Err(IntentError::Frozen);
        }
        if player.is_dashing(now) {
            return Err(IntentError::Dashing);
        }

        if is_super {
            if player.super_charge < SUPER_CHARGE_MAX {
                return Err(IntentError::ChargeNotFull);
            }
            player.super_charge = 0.0;
        } else if !player.has_unlimited_ammo(now) {
            if player.ammo == 0 {
                return Err(IntentError::NoAmmo);
            }
            player.ammo -= 1;
            if player.reload_timer == 0 {
                player.reload_timer = now;
            }
        }
        player.last_attack_at = Some(now);

        let (x, y, angle) = (player.x, player.y, player.angle);
        let kit = Kit::for_character(player.character);

        let aim = match target.and_then(|(tx, ty)| direction_to(x, y, tx, ty)) {
            Some((dx, dy, distance)) => Aim {
                dx,
                dy,
                angle: dy.atan2(dx),
                distance: Some(distance),
            },
            None => Aim {
                dx: angle.cos(),
                dy: angle.sin(),
                angle,
                distance: None,
            },
        };

        if !is_super {
            self.fire_basic(id, kit, x, y, &aim, now);
            return Ok(());
        }

        match kit.charged {
            SuperKind::Projectile(kind) => {
                self.fire_projectile(id, kind, x, y, &aim, now);
            }
            SuperKind::Area(kind) => {
                let range = aim
                    .distance
                    .unwrap_or(STORM_DEFAULT_RANGE)
                    .min(STORM_MAX_RANGE);
                self.registry.spawn_projectile(ProjectileSpec {
                    kind,
                    owner_id: id,
                    x: x + aim.dx * range,
                    y: y + aim.dy * range,
                    direction: aim.angle,
                    now,
                });
            }
            SuperKind::Dash => self.start_dash(id, &aim, now),
        }
        debug!(player_id = %id, "Super used");
        Ok(())
    }

    fn fire_basic(&mut self, id: Uuid, kit: Kit, x: f32, y: f32, aim: &Aim, now: u64) {
        self.fire_projectile(id, kit.basic, x, y, aim, now);
        if kit.combo {
            self.deferred.push(DeferredEffect {
                due_at: now + COMBO_DELAY_MS,
                kind: DeferredKind::SecondSwing { owner: id },
            });
        }
    }

    fn fire_projectile(&mut self, id: Uuid, kind: ProjectileKind, x: f32, y: f32, aim: &Aim, now: u64) {
        let offset = if kind.stats().attached {
            SWING_REACH
        } else {
            MUZZLE_OFFSET
        };
        self.registry.spawn_projectile(ProjectileSpec {
            kind,
            owner_id: id,
            x: x + aim.dx * offset,
            y: y + aim.dy * offset,
            direction: aim.angle,
            now,
        });
    }

    /// Charged dash: a stored vector and deadline consumed by the tick
    fn start_dash(&mut self, id: Uuid, aim: &Aim, now: u64) {
        let distance = aim.distance.unwrap_or(DASH_DEFAULT_DISTANCE);
        let duration = dash_duration_ms(distance);
        if let Some(player) = self.registry.players.get_mut(&id) {
            player.dash_dir = (aim.dx, aim.dy);
            player.angle = aim.angle;
            player.dashing_until = now + duration;
            player.dash_ticks = 0;
            player.dash_hits.clear();
        }
    }

    /// Run a deferred effect. The world may have changed since it was queued,
    /// so everything is looked up again here.
    pub(crate) fn fire_deferred(&mut self, kind: DeferredKind, now: u64) {
        match kind {
            DeferredKind::SecondSwing { owner } => {
                if self.phase != MatchPhase::Playing {
                    return;
                }
                let Some(player) = self.registry.players.get(&owner) else {
                    return;
                };
                if !player.is_active() || player.is_frozen(now) {
                    return;
                }
                let (x, y, angle) = (player.x, player.y, player.angle);
                let aim = Aim {
                    dx: angle.cos(),
                    dy: angle.sin(),
                    angle,
                    distance: None,
                };
                self.fire_projectile(owner, ProjectileKind::Swing, x, y, &aim, now);
            }
        }
    }
}
