//! Match state machine: lobby readiness, mode selection, start, win and reset

use std::collections::BTreeSet;
use tracing::info;
use uuid::Uuid;

use crate::ws::protocol::{GameMode, LobbyPlayer, MatchPhase, PlayerResult, ServerMsg};

use super::entities::{Ball, GoalSide, Player};
use super::world::{IntentError, World};

/// Lives every player starts a round with
pub const STARTING_LIVES: u32 = 3;

/// Fewest players a round can start with; a round ends once one contender is left
pub const MIN_MATCH_PLAYERS: usize = 2;

impl World {
    /// Joined players that take part in the next round
    pub fn lobby_players(&self) -> usize {
        self.registry
            .players
            .values()
            .filter(|p| !p.is_waiting)
            .count()
    }

    pub fn lobby_list(&self) -> Vec<LobbyPlayer> {
        self.registry
            .players
            .values()
            .map(|p| LobbyPlayer {
                id: p.id,
                nickname: p.nickname.clone(),
                character: p.character,
                ready: p.ready,
                is_waiting: p.is_waiting,
            })
            .collect()
    }

    pub fn emit_lobby_update(&mut self) {
        let players = self.lobby_list();
        self.emit(ServerMsg::LobbyUpdate { players });
    }

    pub fn handle_ready(&mut self, id: Uuid, is_ready: bool) -> Result<(), IntentError> {
        if self.phase != MatchPhase::Lobby {
            return Err(IntentError::WrongPhase(self.phase));
        }
        let player = self
            .registry
            .players
            .get_mut(&id)
            .ok_or(IntentError::UnknownPlayer(id))?;
        player.ready = is_ready;

        self.emit_lobby_update();
        self.try_advance_lobby();
        Ok(())
    }

    /// Move to mode selection once enough players are all ready
    pub fn try_advance_lobby(&mut self) {
        if self.phase != MatchPhase::Lobby || self.lobby_players() < self.min_players {
            return;
        }
        let all_ready = self
            .registry
            .players
            .values()
            .filter(|p| !p.is_waiting)
            .all(|p| p.ready);
        if all_ready {
            info!(players = self.lobby_players(), "All players ready, picking mode");
            self.phase = MatchPhase::PickMode;
            self.emit(ServerMsg::PickMode {});
        }
    }

    pub fn handle_select_mode(&mut self, mode: GameMode, now: u64) -> Result<(), IntentError> {
        if self.phase != MatchPhase::PickMode {
            return Err(IntentError::WrongPhase(self.phase));
        }
        self.start_match(mode, now);
        Ok(())
    }

    fn start_match(&mut self, mode: GameMode, now: u64) {
        self.mode = mode;
        self.phase = MatchPhase::Playing;
        self.registry.clear_round();
        self.deferred.clear();
        self.last_powerup_spawn = now;

        let ids: Vec<Uuid> = self.registry.players.keys().copied().collect();
        let mut next_side = GoalSide::Left;
        for id in ids {
            let (x, y) = self.registry.safe_spawn();
            let Some(player) = self.registry.players.get_mut(&id) else {
                continue;
            };
            player.is_waiting = false;
            player.restore(now);
            player.x = x;
            player.y = y;
            player.lives = STARTING_LIVES;
            player.kills = 0;
            player.deaths = 0;
            player.respawn_shield_until = 0;
            player.speed_until = 0;
            player.unlimited_ammo_until = 0;
            player.goal_side = None;
            if mode == GameMode::Objective {
                player.goal_side = Some(next_side);
                next_side = match next_side {
                    GoalSide::Left => GoalSide::Right,
                    GoalSide::Right => GoalSide::Left,
                };
            }
        }
        if mode == GameMode::Objective {
            self.registry.ball = Some(Ball::new());
        }

        info!(mode = ?mode, players = self.registry.players.len(), "Match started");
        self.emit(ServerMsg::GameStart { mode });
    }

    /// End the match when at most one contender is left
    pub fn check_win_condition(&mut self, now: u64) {
        if self.phase != MatchPhase::Playing {
            return;
        }
        let contenders = self.contenders();
        if contenders > 1 {
            return;
        }

        let results = self.results();
        let winner = self.winner(contenders);
        info!(winner = ?winner, mode = ?self.mode, "Match finished");
        self.emit(ServerMsg::MatchResults {
            winner,
            results,
            mode: self.mode,
        });
        self.reset_to_lobby(now);
    }

    fn contenders(&self) -> usize {
        let playing = self
            .registry
            .players
            .values()
            .filter(|p| !p.is_waiting && p.lives > 0);
        match self.mode {
            GameMode::Deathmatch => playing.count(),
            GameMode::Objective => playing
                .filter_map(|p| p.goal_side)
                .collect::<BTreeSet<_>>()
                .len(),
        }
    }

    /// Best surviving player, if anyone survived
    fn winner(&self, contenders: usize) -> Option<Uuid> {
        if contenders == 0 {
            return None;
        }
        self.registry
            .players
            .values()
            .filter(|p| !p.is_waiting && p.lives > 0)
            .min_by(|a, b| standing(a, b))
            .map(|p| p.id)
    }

    fn results(&self) -> Vec<PlayerResult> {
        let mut ranked: Vec<&Player> = self
            .registry
            .players
            .values()
            .filter(|p| !p.is_waiting)
            .collect();
        ranked.sort_by(|a, b| standing(a, b));
        ranked
            .into_iter()
            .enumerate()
            .map(|(i, p)| PlayerResult {
                id: p.id,
                nickname: p.nickname.clone(),
                character: p.character,
                kills: p.kills,
                deaths: p.deaths,
                lives: p.lives,
                placement: i as u32 + 1,
            })
            .collect()
    }

    /// Back to the lobby with everyone restored and the round cleared
    pub fn reset_to_lobby(&mut self, now: u64) {
        self.phase = MatchPhase::Lobby;
        self.registry.clear_round();
        self.deferred.clear();
        for player in self.registry.players.values_mut() {
            player.restore(now);
            player.ready = false;
            player.is_waiting = false;
            player.lives = STARTING_LIVES;
            player.goal_side = None;
            player.respawn_shield_until = 0;
            player.speed_until = 0;
            player.unlimited_ammo_until = 0;
        }
        self.emit_lobby_update();
    }
}

/// Ranking: more lives, then more kills, then fewer deaths
fn standing(a: &Player, b: &Player) -> std::cmp::Ordering {
    b.lives
        .cmp(&a.lives)
        .then(b.kills.cmp(&a.kills))
        .then(a.deaths.cmp(&b.deaths))
        .then(a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::world::test_support::*;
    use crate::ws::protocol::Character;

    fn lobby_of(n: u128) -> (World, Vec<Uuid>) {
        let mut world = World::new(5, 2);
        let ids = (1..=n)
            .map(|i| {
                let id = Uuid::from_u128(i);
                world
                    .handle_join(id, Character::Volt, format!("p{i}"), T0)
                    .unwrap();
                id
            })
            .collect();
        world.drain_events();
        (world, ids)
    }

    #[test]
    fn lobby_waits_for_min_players_all_ready() {
        let (mut world, ids) = lobby_of(1);
        world.handle_ready(ids[0], true).unwrap();
        assert_eq!(world.phase, MatchPhase::Lobby);

        let late = Uuid::from_u128(9);
        world.handle_join(late, Character::Frost, "late".into(), T0).unwrap();
        assert_eq!(world.phase, MatchPhase::Lobby);
        world.drain_events();

        world.handle_ready(late, true).unwrap();
        assert_eq!(world.phase, MatchPhase::PickMode);
        let events = world.drain_events();
        assert!(matches!(events.last(), Some(ServerMsg::PickMode {})));
        assert_eq!(
            world.handle_ready(late, false),
            Err(IntentError::WrongPhase(MatchPhase::PickMode))
        );
    }

    #[test]
    fn select_mode_starts_objective_with_alternating_sides() {
        let (mut world, ids) = lobby_of(3);
        for id in &ids {
            world.handle_ready(*id, true).unwrap();
        }
        assert_eq!(
            world.handle_select_mode(GameMode::Objective, T0),
            Ok(())
        );
        assert_eq!(world.phase, MatchPhase::Playing);
        assert!(world.registry.ball.is_some());
        let sides: Vec<_> = ids
            .iter()
            .map(|id| world.registry.players[id].goal_side)
            .collect();
        assert_eq!(
            sides,
            vec![
                Some(GoalSide::Left),
                Some(GoalSide::Right),
                Some(GoalSide::Left)
            ]
        );
        assert!(world
            .registry
            .players
            .values()
            .all(|p| p.lives == STARTING_LIVES));
        let events = world.drain_events();
        assert!(matches!(
            events.last(),
            Some(ServerMsg::GameStart {
                mode: GameMode::Objective
            })
        ));
    }

    #[test]
    fn select_mode_outside_pick_is_rejected() {
        let (mut world, _) = lobby_of(2);
        assert_eq!(
            world.handle_select_mode(GameMode::Deathmatch, T0),
            Err(IntentError::WrongPhase(MatchPhase::Lobby))
        );
    }

    #[test]
    fn last_player_standing_wins_once_and_lobby_resets() {
        let (mut world, a, b) = duel(Character::Volt, Character::Frost);
        world.registry.players.get_mut(&a).unwrap().kills = 3;
        world.registry.players.get_mut(&b).unwrap().lives = 0;
        world.registry.players.get_mut(&b).unwrap().alive = false;

        world.check_win_condition(T0);
        world.check_win_condition(T0 + 16);
        let events = world.drain_events();
        let results: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ServerMsg::MatchResults {
                    winner, results, ..
                } => Some((*winner, results.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(results.len(), 1);
        let (winner, ranked) = &results[0];
        assert_eq!(*winner, Some(a));
        assert_eq!(ranked[0].placement, 1);
        assert_eq!(ranked[0].id, a);
        assert_eq!(ranked[1].id, b);

        assert_eq!(world.phase, MatchPhase::Lobby);
        for player in world.registry.players.values() {
            assert!(!player.ready);
            assert!(player.alive);
            assert_eq!(player.lives, STARTING_LIVES);
            assert_eq!(player.health, player.stats.max_health);
        }
        assert!(world.registry.projectiles.is_empty());
    }

    #[test]
    fn objective_match_ends_when_one_side_remains() {
        let (mut world, a, b) = duel(Character::Volt, Character::Frost);
        let c = add_player(&mut world, 3, Character::Vanguard, 3000.0, 1000.0);
        world.mode = GameMode::Objective;
        world.registry.players.get_mut(&a).unwrap().goal_side = Some(GoalSide::Left);
        world.registry.players.get_mut(&b).unwrap().goal_side = Some(GoalSide::Right);
        world.registry.players.get_mut(&c).unwrap().goal_side = Some(GoalSide::Left);

        world.registry.players.get_mut(&a).unwrap().lives = 0;
        world.check_win_condition(T0);
        assert_eq!(world.phase, MatchPhase::Playing);

        world.registry.players.get_mut(&c).unwrap().lives = 0;
        world.check_win_condition(T0);
        assert_eq!(world.phase, MatchPhase::Lobby);
        let events = world.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            ServerMsg::MatchResults { winner: Some(w), .. } if *w == b
        )));
    }

    #[test]
    fn mid_match_joiner_is_excluded_until_next_lobby() {
        let (mut world, a, b) = duel(Character::Volt, Character::Frost);
        let late = Uuid::from_u128(7);
        world.handle_join(late, Character::Cyclone, "late".into(), T0).unwrap();
        assert!(world.registry.players[&late].is_waiting);

        world.registry.players.get_mut(&b).unwrap().lives = 0;
        world.check_win_condition(T0);
        assert_eq!(world.phase, MatchPhase::Lobby);
        assert!(!world.registry.players[&late].is_waiting);
        assert!(world.registry.players[&a].alive);
    }

    #[test]
    fn disconnect_during_play_can_end_match() {
        let (mut world, a, b) = duel(Character::Volt, Character::Frost);
        world.handle_disconnect(b, T0);
        assert_eq!(world.phase, MatchPhase::Lobby);
        let events = world.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            ServerMsg::MatchResults { winner: Some(w), .. } if *w == a
        )));
    }

    #[test]
    fn disconnect_during_pick_mode_falls_back_to_lobby() {
        let (mut world, ids) = lobby_of(2);
        for id in &ids {
            world.handle_ready(*id, true).unwrap();
        }
        assert_eq!(world.phase, MatchPhase::PickMode);
        world.handle_disconnect(ids[1], T0);
        assert_eq!(world.phase, MatchPhase::Lobby);
    }

    #[test]
    fn two_player_match_ends_within_bounded_ticks_of_last_life() {
        let (mut world, a, b) = duel(Character::Vanguard, Character::Volt);
        world.registry.players.get_mut(&b).unwrap().lives = 1;
        world.apply_damage(
            b,
            Some(a),
            500.0,
            crate::game::combat::DamageSource::Direct,
            T0,
        );
        world.run_tick(T0 + 16);
        assert_eq!(world.phase, MatchPhase::Lobby);
    }
}
