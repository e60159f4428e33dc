//! Combat system - damage resolution, kill credit, chain lightning

use std::collections::{HashSet, VecDeque};
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::{GameMode, ServerMsg};

use super::characters::{Kit, Passive};
use super::entities::{PairKey, SUPER_CHARGE_MAX};
use super::geometry::circle_circle_distance;
use super::world::World;

/// Chain lightning search radius around each linked player
pub const CHAIN_RADIUS: f32 = 300.0;
/// Maximum BFS depth from the first victim
pub const CHAIN_MAX_DEPTH: u32 = 2;
/// Maximum number of tethers one chain can create
pub const CHAIN_MAX_LINKS: usize = 4;
/// How long a tether lasts once created or refreshed (ms)
pub const TETHER_DURATION_MS: u64 = 3000;

/// Spin status duration (ms)
pub const SPIN_DURATION_MS: u64 = 2500;
/// Immunity kept after a spin wears off (ms)
pub const SPIN_IMMUNITY_MS: u64 = 1500;

/// How damage reached the victim
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageSource {
    /// Projectile or dash contact; subject to shields and reduction
    Direct,
    /// Damage over time (spin, tether, storm)
    Periodic,
}

/// Result of a single damage application
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DamageOutcome {
    pub dealt: f32,
    pub killed: bool,
    /// Shield or respawn protection swallowed the hit
    pub negated: bool,
}

/// Apply flat reduction and clamp (returns the damage that gets through)
pub fn reduce_damage(passive: Passive, amount: f32) -> f32 {
    match passive {
        Passive::DamageReduction(flat) => (amount - flat).max(0.0),
        _ => amount,
    }
}

/// Apply damage to health, returns (new_health, is_dead)
pub fn subtract_health(current_health: f32, damage: f32) -> (f32, bool) {
    let new_health = (current_health - damage).max(0.0);
    (new_health, new_health <= 0.0)
}

impl World {
    /// Resolve damage against `victim_id`, including passives, death and
    /// kill credit. Missing or dead victims are skipped.
    pub fn apply_damage(
        &mut self,
        victim_id: Uuid,
        attacker: Option<Uuid>,
        amount: f32,
        source: DamageSource,
        now: u64,
    ) -> DamageOutcome {
        let mode = self.mode;
        let Some(victim) = self.registry.players.get_mut(&victim_id) else {
            return DamageOutcome::default();
        };
        if !victim.is_active() {
            return DamageOutcome::default();
        }

        if victim.has_respawn_shield(now) {
            return DamageOutcome {
                negated: true,
                ..Default::default()
            };
        }

        let mut damage = amount;
        if source == DamageSource::Direct {
            if victim.shield_ready {
                victim.shield_ready = false;
                self.emit(ServerMsg::ShieldBreak { id: victim_id });
                return DamageOutcome {
                    negated: true,
                    ..Default::default()
                };
            }
            damage = reduce_damage(victim.stats.passive, damage);
        }

        let (new_health, killed) = subtract_health(victim.health, damage);
        victim.health = new_health;
        victim.last_damage_at = now;
        if attacker.is_some() {
            victim.last_attacker = attacker;
        }

        if killed {
            victim.alive = false;
            victim.died_at = Some(now);
            victim.deaths += 1;
            victim.dashing_until = 0;
            if mode == GameMode::Deathmatch {
                victim.lives = victim.lives.saturating_sub(1);
            }
            self.credit_kill(victim_id, attacker);
        }

        DamageOutcome {
            dealt: damage,
            killed,
            negated: false,
        }
    }

    fn credit_kill(&mut self, victim_id: Uuid, attacker: Option<Uuid>) {
        let killer = attacker.filter(|id| *id != victim_id);
        if let Some(killer_id) = killer {
            if let Some(killer) = self.registry.players.get_mut(&killer_id) {
                killer.kills += 1;
            }
        }
        debug!(victim = %victim_id, killer = ?killer, "Player killed");
        self.emit(ServerMsg::KillNotification {
            killer,
            victim: victim_id,
        });
    }

    /// Add super charge to `id`, capped at the maximum
    pub fn grant_charge(&mut self, id: Uuid, amount: f32) {
        if let Some(player) = self.registry.players.get_mut(&id) {
            player.super_charge = (player.super_charge + amount).min(SUPER_CHARGE_MAX);
        }
    }

    /// Put `target` into spin attributed to `owner`. Returns false when the
    /// target is immune.
    pub fn inflict_spin(&mut self, target: Uuid, owner: Uuid, now: u64) -> bool {
        let Some(player) = self.registry.players.get_mut(&target) else {
            return false;
        };
        let immune = !player.is_active()
            || player.id == owner
            || player.is_spinning(now)
            || now < player.spin_immune_until
            || player.has_respawn_shield(now)
            || Kit::for_character(player.character).spin_immune;
        if immune {
            return false;
        }
        player.spinning_until = now + SPIN_DURATION_MS;
        player.spin_immune_until = player.spinning_until + SPIN_IMMUNITY_MS;
        player.spin_owner = Some(owner);
        true
    }

    /// Breadth-first chain from the first victim of a bolt. Each link upserts
    /// a tether between parent and child. Returns the linked pairs in order.
    pub fn chain_lightning(&mut self, origin: Uuid, caster: Uuid, now: u64) -> Vec<PairKey> {
        let candidates: Vec<(Uuid, f32, f32)> = self
            .registry
            .players
            .values()
            .filter(|p| p.is_active() && p.id != caster)
            .map(|p| (p.id, p.x, p.y))
            .collect();

        let Some(&(_, ox, oy)) = candidates.iter().find(|(id, _, _)| *id == origin) else {
            return Vec::new();
        };

        let mut visited: HashSet<Uuid> = HashSet::from([origin]);
        let mut queue: VecDeque<(Uuid, f32, f32, u32)> = VecDeque::from([(origin, ox, oy, 0)]);
        let mut links = Vec::new();

        'search: while let Some((node, nx, ny, depth)) = queue.pop_front() {
            if depth >= CHAIN_MAX_DEPTH {
                continue;
            }
            for &(id, x, y) in &candidates {
                if visited.contains(&id) || circle_circle_distance(nx, ny, x, y) > CHAIN_RADIUS {
                    continue;
                }
                visited.insert(id);
                links.push(PairKey::new(node, id));
                queue.push_back((id, x, y, depth + 1));
                if links.len() >= CHAIN_MAX_LINKS {
                    break 'search;
                }
            }
        }

        for pair in &links {
            self.registry.upsert_tether(*pair, now + TETHER_DURATION_MS);
            self.emit(ServerMsg::LightningTether {
                p1: pair.0,
                p2: pair.1,
            });
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::test_support::*;
    use crate::ws::protocol::Character;

    #[test]
    fn flat_reduction_never_goes_negative() {
        assert_eq!(reduce_damage(Passive::DamageReduction(5.0), 25.0), 20.0);
        assert_eq!(reduce_damage(Passive::DamageReduction(5.0), 3.0), 0.0);
        assert_eq!(reduce_damage(Passive::None, 25.0), 25.0);
    }

    #[test]
    fn respawn_shield_negates_everything() {
        let (mut world, a, b) = duel(Character::Volt, Character::Volt);
        world.registry.players.get_mut(&b).unwrap().respawn_shield_until = T0 + 1;
        let outcome = world.apply_damage(b, Some(a), 50.0, DamageSource::Periodic, T0);
        assert!(outcome.negated);
        assert_eq!(world.registry.players[&b].health, 100.0);
    }

    #[test]
    fn one_time_shield_breaks_once() {
        let (mut world, a, b) = duel(Character::Volt, Character::Cyclone);
        let first = world.apply_damage(b, Some(a), 30.0, DamageSource::Direct, T0);
        assert!(first.negated);
        let events = world.drain_events();
        assert!(matches!(events[..], [ServerMsg::ShieldBreak { id }] if id == b));

        let second = world.apply_damage(b, Some(a), 30.0, DamageSource::Direct, T0);
        assert_eq!(second.dealt, 30.0);
        assert_eq!(world.registry.players[&b].health, 80.0);
    }

    #[test]
    fn lethal_damage_clamps_and_credits_killer() {
        let (mut world, a, b) = duel(Character::Volt, Character::Volt);
        world.registry.players.get_mut(&b).unwrap().lives = 3;
        let outcome = world.apply_damage(b, Some(a), 500.0, DamageSource::Direct, T0);
        assert!(outcome.killed);
        let victim = &world.registry.players[&b];
        assert_eq!(victim.health, 0.0);
        assert!(!victim.alive);
        assert_eq!(victim.lives, 2);
        assert_eq!(world.registry.players[&a].kills, 1);

        // Already dead: further damage is ignored
        let again = world.apply_damage(b, Some(a), 10.0, DamageSource::Direct, T0);
        assert_eq!(again, DamageOutcome::default());
    }

    #[test]
    fn unattributed_death_has_no_killer() {
        let (mut world, _, b) = duel(Character::Volt, Character::Volt);
        world.apply_damage(b, None, 500.0, DamageSource::Periodic, T0);
        let events = world.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            ServerMsg::KillNotification { killer: None, victim } if *victim == b
        )));
    }

    #[test]
    fn objective_mode_deaths_keep_lives() {
        let (mut world, a, b) = duel(Character::Volt, Character::Volt);
        world.mode = GameMode::Objective;
        world.registry.players.get_mut(&b).unwrap().lives = 3;
        world.apply_damage(b, Some(a), 500.0, DamageSource::Direct, T0);
        assert_eq!(world.registry.players[&b].lives, 3);
    }

    #[test]
    fn chain_respects_depth_and_link_cap() {
        let (mut world, caster, first) = duel(Character::Volt, Character::Volt);
        place(&mut world, caster, 1000.0, 2000.0, 0.0);
        place(&mut world, first, 2000.0, 1000.0, 0.0);
        // Line of players 250 px apart: depth 2 reaches two hops
        let second = add_player(&mut world, 10, Character::Frost, 2250.0, 1000.0);
        let third = add_player(&mut world, 11, Character::Frost, 2500.0, 1000.0);
        let fourth = add_player(&mut world, 12, Character::Frost, 2750.0, 1000.0);

        let links = world.chain_lightning(first, caster, T0);
        assert_eq!(
            links,
            vec![PairKey::new(first, second), PairKey::new(second, third)]
        );
        assert!(!world.registry.is_tethered(fourth));
        assert!(!world.registry.is_tethered(caster));
        assert_eq!(world.registry.tethers.len(), 2);
    }

    #[test]
    fn chain_fan_out_is_capped() {
        let (mut world, caster, first) = duel(Character::Volt, Character::Volt);
        place(&mut world, caster, 1000.0, 2000.0, 0.0);
        place(&mut world, first, 2000.0, 1000.0, 0.0);
        for n in 0..6u128 {
            let offset = n as f32 * 20.0;
            add_player(&mut world, 100 + n, Character::Vanguard, 2100.0 + offset, 1050.0);
        }
        let links = world.chain_lightning(first, caster, T0);
        assert_eq!(links.len(), CHAIN_MAX_LINKS);
    }

    #[test]
    fn spin_immunity_rules() {
        let (mut world, a, b) = duel(Character::Cyclone, Character::Volt);
        // Cyclone cannot be spun
        assert!(!world.inflict_spin(a, b, T0));
        assert!(world.inflict_spin(b, a, T0));
        // Already spinning
        assert!(!world.inflict_spin(b, a, T0 + 10));
        // Immune just after the spin wears off
        assert!(!world.inflict_spin(b, a, T0 + SPIN_DURATION_MS + 10));
        assert!(world.inflict_spin(b, a, T0 + SPIN_DURATION_MS + SPIN_IMMUNITY_MS));
    }
}
