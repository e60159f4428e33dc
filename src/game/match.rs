//! Match runtime: the task that owns the world and drives the tick loop

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::util::time::{unix_millis, MatchClock, SNAPSHOT_INTERVAL_MICROS, TICK_DURATION_MICROS};
use crate::ws::protocol::{ClientMsg, MatchPhase, ServerMsg};

use super::snapshot::{SnapshotBuilder, SnapshotStats};
use super::world::World;

/// Capacity of each client's outbound queue
pub const CLIENT_QUEUE_CAPACITY: usize = 64;
/// Capacity of the shared event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
const COMMAND_CHANNEL_CAPACITY: usize = 1024;

/// Messages from sessions to the match task
#[derive(Debug)]
pub enum MatchCommand {
    Connect {
        id: Uuid,
        tx: mpsc::Sender<ServerMsg>,
    },
    Disconnect {
        id: Uuid,
    },
    Intent {
        id: Uuid,
        msg: ClientMsg,
    },
}

/// Counters the match publishes for the health endpoint
#[derive(Debug, Default)]
pub struct MatchStatus {
    connected: AtomicUsize,
    phase: AtomicU8,
    snapshots: AtomicU64,
}

impl MatchStatus {
    pub fn connected_clients(&self) -> usize {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> MatchPhase {
        match self.phase.load(Ordering::Relaxed) {
            1 => MatchPhase::PickMode,
            2 => MatchPhase::Playing,
            _ => MatchPhase::Lobby,
        }
    }

    pub fn snapshots_sent(&self) -> u64 {
        self.snapshots.load(Ordering::Relaxed)
    }

    fn set_phase(&self, phase: MatchPhase) {
        let code = match phase {
            MatchPhase::Lobby => 0,
            MatchPhase::PickMode => 1,
            MatchPhase::Playing => 2,
        };
        self.phase.store(code, Ordering::Relaxed);
    }
}

/// Handle to the running match
#[derive(Clone)]
pub struct MatchHandle {
    pub command_tx: mpsc::Sender<MatchCommand>,
    pub events_tx: broadcast::Sender<ServerMsg>,
    pub status: Arc<MatchStatus>,
}

impl MatchHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }
}

/// The authoritative game match
pub struct GameMatch {
    world: World,
    clock: MatchClock,
    command_rx: mpsc::Receiver<MatchCommand>,
    events_tx: broadcast::Sender<ServerMsg>,
    clients: BTreeMap<Uuid, mpsc::Sender<ServerMsg>>,
    stats: SnapshotStats,
    status: Arc<MatchStatus>,
}

impl GameMatch {
    /// Create a new match
    pub fn new(seed: u64, min_players: usize) -> (Self, MatchHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let status = Arc::new(MatchStatus::default());

        let handle = MatchHandle {
            command_tx,
            events_tx: events_tx.clone(),
            status: status.clone(),
        };

        let game_match = Self {
            world: World::new(seed, min_players),
            clock: MatchClock::new(),
            command_rx,
            events_tx,
            clients: BTreeMap::new(),
            stats: SnapshotStats::default(),
            status,
        };

        (game_match, handle)
    }

    /// Run until every handle is dropped
    pub async fn run(mut self) {
        info!(min_players = self.world.min_players, "Match loop started");

        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast_interval = interval(Duration::from_micros(SNAPSHOT_INTERVAL_MICROS));
        broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let now = self.clock.now_ms();
                    self.world.run_due_effects(now);
                    self.world.run_tick(now);
                    self.flush_events();
                }
                _ = broadcast_interval.tick() => {
                    self.broadcast_state();
                }
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command);
                    self.flush_events();
                }
            }
        }

        info!(
            snapshots = self.stats.total_snapshots,
            dropped = self.stats.dropped_snapshots,
            avg_players = self.stats.avg_players_per_snapshot,
            "Match loop stopped"
        );
    }

    fn handle_command(&mut self, command: MatchCommand) {
        let now = self.clock.now_ms();
        match command {
            MatchCommand::Connect { id, tx } => {
                let players = SnapshotBuilder::new(&self.world, now, unix_millis())
                    .visible_players(None);
                let _ = tx.try_send(ServerMsg::Init { id, players });
                let _ = tx.try_send(ServerMsg::LobbyUpdate {
                    players: self.world.lobby_list(),
                });
                self.clients.insert(id, tx);
                self.status
                    .connected
                    .store(self.clients.len(), Ordering::Relaxed);
                info!(player_id = %id, clients = self.clients.len(), "Client connected");
            }
            MatchCommand::Disconnect { id } => {
                self.clients.remove(&id);
                self.world.handle_disconnect(id, now);
                self.status
                    .connected
                    .store(self.clients.len(), Ordering::Relaxed);
                info!(player_id = %id, clients = self.clients.len(), "Client disconnected");
            }
            MatchCommand::Intent { id, msg } => {
                if let Err(e) = self.world.handle_intent(id, msg, now) {
                    debug!(player_id = %id, error = %e, "Intent rejected");
                }
            }
        }
    }

    /// Forward queued world events to every session
    fn flush_events(&mut self) {
        self.status.set_phase(self.world.phase);
        for event in self.world.drain_events() {
            // Fails only when nobody is subscribed
            let _ = self.events_tx.send(event);
        }
    }

    fn broadcast_state(&mut self) {
        if self.clients.is_empty() {
            return;
        }
        let builder = SnapshotBuilder::new(&self.world, self.clock.now_ms(), unix_millis());
        for (id, tx) in &self.clients {
            let snapshot = builder.build(Some(*id));
            let player_count = snapshot.players.len();
            let delivered = match tx.try_send(ServerMsg::State(snapshot)) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(player_id = %id, "Outbound queue full, dropping snapshot");
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(player_id = %id, "Outbound queue closed");
                    false
                }
            };
            self.stats.record(player_count, delivered);
        }
        self.status
            .snapshots
            .store(self.stats.total_snapshots, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{Character, GameMode};
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(2);

    async fn connect(handle: &MatchHandle, n: u128) -> (Uuid, mpsc::Receiver<ServerMsg>) {
        let id = Uuid::from_u128(n);
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
        tokio_test::assert_ok!(handle.command_tx.send(MatchCommand::Connect { id, tx }).await);
        (id, rx)
    }

    async fn intent(handle: &MatchHandle, id: Uuid, msg: ClientMsg) {
        tokio_test::assert_ok!(handle.command_tx.send(MatchCommand::Intent { id, msg }).await);
    }

    async fn next_event<F>(rx: &mut broadcast::Receiver<ServerMsg>, mut pred: F) -> ServerMsg
    where
        F: FnMut(&ServerMsg) -> bool,
    {
        timeout(WAIT, async {
            loop {
                if let Ok(msg) = rx.recv().await {
                    if pred(&msg) {
                        return msg;
                    }
                }
            }
        })
        .await
        .expect("event did not arrive")
    }

    #[tokio::test]
    async fn connect_receives_init_then_state() {
        let (game_match, handle) = GameMatch::new(1, 2);
        tokio::spawn(game_match.run());

        let (id, mut rx) = connect(&handle, 1).await;
        let first = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
        assert!(matches!(first, ServerMsg::Init { id: got, .. } if got == id));

        let state = timeout(WAIT, async {
            loop {
                if let Some(ServerMsg::State(snapshot)) = rx.recv().await {
                    return snapshot;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(state.state, MatchPhase::Lobby);
        assert_eq!(handle.status.connected_clients(), 1);
    }

    #[tokio::test]
    async fn two_ready_players_reach_play() {
        let (game_match, handle) = GameMatch::new(2, 2);
        let mut events = handle.subscribe();
        tokio::spawn(game_match.run());

        let (a, _rx_a) = connect(&handle, 1).await;
        let (b, _rx_b) = connect(&handle, 2).await;
        for (id, character) in [(a, Character::Vanguard), (b, Character::Frost)] {
            intent(
                &handle,
                id,
                ClientMsg::Join {
                    character,
                    nickname: "x".into(),
                },
            )
            .await;
            intent(&handle, id, ClientMsg::ReadyUp { is_ready: true }).await;
        }
        next_event(&mut events, |m| matches!(m, ServerMsg::PickMode {})).await;

        intent(
            &handle,
            a,
            ClientMsg::SelectMode {
                mode: GameMode::Deathmatch,
            },
        )
        .await;
        next_event(&mut events, |m| matches!(m, ServerMsg::GameStart { .. })).await;
        tokio::task::yield_now().await;
        assert_eq!(handle.status.phase(), MatchPhase::Playing);

        // Leaving mid-match hands the win to the other player
        tokio_test::assert_ok!(handle.command_tx.send(MatchCommand::Disconnect { id: b }).await);
        let results = next_event(&mut events, |m| matches!(m, ServerMsg::MatchResults { .. })).await;
        assert!(matches!(results, ServerMsg::MatchResults { winner: Some(w), .. } if w == a));
    }

    #[test]
    fn status_phase_round_trips() {
        let status = MatchStatus::default();
        assert_eq!(status.phase(), MatchPhase::Lobby);
        for phase in [MatchPhase::PickMode, MatchPhase::Playing, MatchPhase::Lobby] {
            status.set_phase(phase);
            assert_eq!(status.phase(), phase);
        }
    }
}
