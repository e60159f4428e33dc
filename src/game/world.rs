//! The world aggregate and client intent handlers
//!
//! `World` is the single owner of gameplay state. Intent handlers, the tick
//! (`tick.rs`), combat (`combat.rs`), abilities (`abilities.rs`) and the
//! lobby (`lobby.rs`) are all `impl World` blocks working on it; broadcast
//! only ever borrows it immutably.

use uuid::Uuid;

use crate::ws::protocol::{Character, ClientMsg, GameMode, MatchPhase, ServerMsg};

use super::geometry::{circle_circle_distance, collides_with_walls};
use super::lobby::MIN_MATCH_PLAYERS;
use super::map::{clamp_to_arena, PLAYER_RADIUS};
use super::registry::EntityRegistry;

/// Longest nickname kept
const MAX_NICKNAME_LEN: usize = 16;

/// Movement tolerance as a multiple of one tick's worth of movement
const MOVE_SLACK_TICKS: f32 = 4.0;

/// Why an intent was dropped. Never sent to clients, only logged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntentError {
    #[error("player {0} has not joined")]
    UnknownPlayer(Uuid),

    #[error("player already joined")]
    AlreadyJoined,

    #[error("player is dead")]
    Dead,

    #[error("player is waiting for the next round")]
    Waiting,

    #[error("player is frozen")]
    Frozen,

    #[error("player is dashing")]
    Dashing,

    #[error("no ammo")]
    NoAmmo,

    #[error("super charge not full")]
    ChargeNotFull,

    #[error("not allowed during {0:?}")]
    WrongPhase(MatchPhase),

    #[error("position inside a wall")]
    BlockedPosition,

    #[error("invalid number in intent")]
    NotFinite,
}

/// One-shot effect that fires after a delay and re-validates at fire time
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredKind {
    /// Second hit of a melee combo
    SecondSwing { owner: Uuid },
}

#[derive(Debug, Clone)]
pub struct DeferredEffect {
    pub due_at: u64,
    pub kind: DeferredKind,
}

/// The single shared world of the server
pub struct World {
    pub registry: EntityRegistry,
    pub phase: MatchPhase,
    pub mode: GameMode,
    /// Joined, non-waiting players needed before the lobby can advance
    pub min_players: usize,
    pub tick: u64,
    pub last_powerup_spawn: u64,
    pub(crate) deferred: Vec<DeferredEffect>,
    events: Vec<ServerMsg>,
}

impl World {
    pub fn new(seed: u64, min_players: usize) -> Self {
        Self {
            registry: EntityRegistry::new(seed),
            phase: MatchPhase::Lobby,
            mode: GameMode::default(),
            min_players: min_players.max(MIN_MATCH_PLAYERS),
            tick: 0,
            last_powerup_spawn: 0,
            deferred: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Queue an event for every connected client
    pub fn emit(&mut self, msg: ServerMsg) {
        self.events.push(msg);
    }

    /// Take all events produced since the last call
    pub fn drain_events(&mut self) -> Vec<ServerMsg> {
        std::mem::take(&mut self.events)
    }

    /// Dispatch an inbound intent
    pub fn handle_intent(&mut self, id: Uuid, msg: ClientMsg, now: u64) -> Result<(), IntentError> {
        match msg {
            ClientMsg::Join {
                character,
                nickname,
            } => self.handle_join(id, character, nickname, now),
            ClientMsg::ReadyUp { is_ready } => self.handle_ready(id, is_ready),
            ClientMsg::SelectMode { mode } => self.handle_select_mode(mode, now),
            ClientMsg::Update { x, y, angle } => self.handle_update(id, x, y, angle, now),
            ClientMsg::Shoot {
                is_super,
                target_x,
                target_y,
            } => {
                let target = target_x.zip(target_y);
                self.resolve_shoot(id, is_super, target, now)
            }
        }
    }

    /// Create the player entity for a connection
    pub fn handle_join(
        &mut self,
        id: Uuid,
        character: Character,
        nickname: String,
        now: u64,
    ) -> Result<(), IntentError> {
        if self.registry.players.contains_key(&id) {
            return Err(IntentError::AlreadyJoined);
        }

        let nickname = sanitize_nickname(&nickname, id);
        let phase = self.phase;
        let player = self.registry.spawn_player(id, character, nickname, now);
        // Mid-match joiners sit out until the next lobby
        player.is_waiting = phase != MatchPhase::Lobby;

        self.emit_lobby_update();
        Ok(())
    }

    /// Accept a client-predicted pose after validating it
    pub fn handle_update(
        &mut self,
        id: Uuid,
        x: f32,
        y: f32,
        angle: f32,
        now: u64,
    ) -> Result<(), IntentError> {
        if !(x.is_finite() && y.is_finite() && angle.is_finite()) {
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

        player.angle = angle;

        let (mut x, mut y) = clamp_to_arena(x, y);
        let max_step = player.stats.base_speed * player.speed_multiplier * MOVE_SLACK_TICKS;
        let step = circle_circle_distance(player.x, player.y, x, y);
        if step > max_step {
            let scale = max_step / step;
            x = player.x + (x - player.x) * scale;
            y = player.y + (y - player.y) * scale;
        }

        if collides_with_walls(x, y, PLAYER_RADIUS) {
            return Err(IntentError::BlockedPosition);
        }

        player.x = x;
        player.y = y;
        Ok(())
    }

    /// Connection closed: drop the player and re-check the match
    pub fn handle_disconnect(&mut self, id: Uuid, now: u64) {
        if self.registry.remove_player(id).is_none() {
            return;
        }
        self.deferred.retain(|effect| match effect.kind {
            DeferredKind::SecondSwing { owner } => owner != id,
        });
        self.registry.projectiles.retain(|_, proj| {
            !(proj.owner_id == id && proj.kind.stats().attached)
        });

        match self.phase {
            MatchPhase::Playing => self.check_win_condition(now),
            MatchPhase::PickMode if self.lobby_players() < self.min_players => {
                self.phase = MatchPhase::Lobby;
            }
            _ => self.try_advance_lobby(),
        }
        self.emit_lobby_update();
    }

    /// Run every deferred effect whose time has come
    pub fn run_due_effects(&mut self, now: u64) {
        if self.deferred.is_empty() {
            return;
        }
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.deferred)
            .into_iter()
            .partition(|effect| effect.due_at <= now);
        self.deferred = pending;
        for effect in due {
            self.fire_deferred(effect.kind, now);
        }
    }
}

fn sanitize_nickname(raw: &str, id: Uuid) -> String {
    let trimmed: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_NICKNAME_LEN)
        .collect();
    if trimmed.is_empty() {
        format!("Player_{}", &id.to_string()[..8])
    } else {
        trimmed
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::game::lobby::STARTING_LIVES;

    pub const T0: u64 = 10_000;

    /// World with two joined players standing in open ground
    pub fn duel(a_char: Character, b_char: Character) -> (World, Uuid, Uuid) {
        let mut world = World::new(11, 2);
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        world.handle_join(a, a_char, "alpha".into(), T0).unwrap();
        world.handle_join(b, b_char, "bravo".into(), T0).unwrap();
        world.phase = MatchPhase::Playing;
        world.last_powerup_spawn = T0;
        for player in world.registry.players.values_mut() {
            player.lives = STARTING_LIVES;
        }
        place(&mut world, a, 2000.0, 1000.0, 0.0);
        place(&mut world, b, 2100.0, 1000.0, std::f32::consts::PI);
        world.drain_events();
        (world, a, b)
    }

    pub fn place(world: &mut World, id: Uuid, x: f32, y: f32, angle: f32) {
        let player = world.registry.players.get_mut(&id).unwrap();
        player.x = x;
        player.y = y;
        player.angle = angle;
    }

    pub fn add_player(world: &mut World, n: u128, character: Character, x: f32, y: f32) -> Uuid {
        let id = Uuid::from_u128(n);
        world
            .handle_join(id, character, format!("p{n}"), T0)
            .unwrap();
        let player = world.registry.players.get_mut(&id).unwrap();
        player.is_waiting = false;
        player.lives = STARTING_LIVES;
        place(world, id, x, y, 0.0);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn join_in_lobby_is_active_and_mid_match_is_waiting() {
        let mut world = World::new(1, 2);
        let a = Uuid::new_v4();
        world.handle_join(a, Character::Volt, "a".into(), T0).unwrap();
        assert!(!world.registry.players[&a].is_waiting);
        assert_eq!(
            world.handle_join(a, Character::Volt, "a".into(), T0),
            Err(IntentError::AlreadyJoined)
        );

        world.phase = MatchPhase::Playing;
        let b = Uuid::new_v4();
        world.handle_join(b, Character::Frost, "b".into(), T0).unwrap();
        assert!(world.registry.players[&b].is_waiting);
        assert!(matches!(
            world.handle_update(b, 500.0, 500.0, 0.0, T0),
            Err(IntentError::Waiting)
        ));
    }

    #[test]
    fn empty_nickname_gets_default() {
        let id = Uuid::from_u128(0xabcdef);
        assert!(sanitize_nickname("   ", id).starts_with("Player_"));
        assert_eq!(sanitize_nickname(" bob ", id), "bob");
        assert_eq!(sanitize_nickname(&"x".repeat(40), id).len(), MAX_NICKNAME_LEN);
    }

    #[test]
    fn update_rejected_while_frozen_dashing_or_dead() {
        let (mut world, a, _) = duel(Character::Frost, Character::Volt);
        world.registry.players.get_mut(&a).unwrap().frozen_until = T0 + 100;
        assert_eq!(
            world.handle_update(a, 2001.0, 1000.0, 0.0, T0),
            Err(IntentError::Frozen)
        );
        world.registry.players.get_mut(&a).unwrap().frozen_until = 0;
        world.registry.players.get_mut(&a).unwrap().dashing_until = T0 + 100;
        assert_eq!(
            world.handle_update(a, 2001.0, 1000.0, 0.0, T0),
            Err(IntentError::Dashing)
        );
        world.registry.players.get_mut(&a).unwrap().dashing_until = 0;
        world.registry.players.get_mut(&a).unwrap().alive = false;
        assert_eq!(
            world.handle_update(a, 2001.0, 1000.0, 0.0, T0),
            Err(IntentError::Dead)
        );
    }

    #[test]
    fn update_clamps_long_steps_and_rejects_walls() {
        let (mut world, a, _) = duel(Character::Vanguard, Character::Volt);
        world.handle_update(a, 2500.0, 1000.0, 1.0, T0).unwrap();
        let player = &world.registry.players[&a];
        let max_step = player.stats.base_speed * MOVE_SLACK_TICKS;
        assert!((player.x - (2000.0 + max_step)).abs() < 1e-3);
        assert_eq!(player.angle, 1.0);

        // Pillar at (1500, 1500)
        place(&mut world, a, 1490.0, 1480.0, 0.0);
        assert_eq!(
            world.handle_update(a, 1500.0, 1490.0, 0.0, T0),
            Err(IntentError::BlockedPosition)
        );
        assert_eq!(
            world.handle_update(a, f32::NAN, 1.0, 0.0, T0),
            Err(IntentError::NotFinite)
        );
    }

    #[test]
    fn unknown_player_intents_are_rejected() {
        let mut world = World::new(1, 2);
        let ghost = Uuid::new_v4();
        assert_eq!(
            world.handle_update(ghost, 1.0, 1.0, 0.0, T0),
            Err(IntentError::UnknownPlayer(ghost))
        );
        // Disconnect of an unknown id is a no-op
        world.handle_disconnect(ghost, T0);
        assert!(world.drain_events().is_empty());
    }

    #[test]
    fn solo_lobby_is_raised_to_two_players() {
        let mut world = World::new(1, 1);
        assert_eq!(world.min_players, MIN_MATCH_PLAYERS);

        let a = Uuid::new_v4();
        world.handle_join(a, Character::Volt, "a".into(), T0).unwrap();
        world.handle_ready(a, true).unwrap();
        assert_eq!(world.phase, MatchPhase::Lobby);
    }
}
