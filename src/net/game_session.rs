//! Game session: the simulation plus every open connection
//!
//! Request handlers return [`Dispatch`]es instead of writing to streams so
//! the session lock is never held across network I/O.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::game::constants::{tick, tick_period};
use crate::game::entities::PlayerId;
use crate::game::game_loop::GameLoop;
use crate::game::input_buffer::InputSender;
use crate::game::state::JoinError;
use crate::metrics::Metrics;
use crate::net::aoi::AoiFilter;
use crate::net::framing::{write_frame, FramingError};
use crate::net::protocol::{
    encode, ClientMessage, GameEvent, PlayerSnapshot, ProjectileSnapshot, ServerMessage,
};

/// Reliable stream shared between the reader task and broadcasters
pub type StreamWriter = Arc<RwLock<Option<wtransport::SendStream>>>;

pub struct PlayerConnection {
    pub writer: StreamWriter,
}

/// A message and who should receive it
#[derive(Debug, Clone)]
pub enum Dispatch {
    To(PlayerId, ServerMessage),
    Broadcast(ServerMessage),
}

pub struct GameSession {
    game_loop: GameLoop,
    connections: HashMap<PlayerId, PlayerConnection>,
    aoi: AoiFilter,
    tick_period: Duration,
    broadcast_period: Duration,
    metrics: Arc<Metrics>,
}

impl GameSession {
    pub fn new(config: &ServerConfig, metrics: Arc<Metrics>) -> Self {
        let tick_interval = tick_period(config.tick_rate);
        info!(
            "Game session created: {} Hz tick, {} Hz broadcast, {} player cap",
            config.tick_rate, config.broadcast_rate, config.game.max_players
        );
        Self {
            aoi: AoiFilter::new(config.game.aoi_radius),
            game_loop: GameLoop::new(config.game.clone(), tick_interval),
            connections: HashMap::new(),
            tick_period: tick_interval,
            broadcast_period: tick_period(config.broadcast_rate),
            metrics,
        }
    }

    pub fn game_loop(&self) -> &GameLoop {
        &self.game_loop
    }

    pub fn game_loop_mut(&mut self) -> &mut GameLoop {
        &mut self.game_loop
    }

    pub fn input_sender(&self) -> InputSender {
        self.game_loop.input_sender()
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn broadcast_period(&self) -> Duration {
        self.broadcast_period
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Register a new connection and build its greeting
    pub fn connect(&mut self, id: PlayerId, writer: StreamWriter) -> ServerMessage {
        self.connections.insert(id, PlayerConnection { writer });
        self.metrics
            .connections_active
            .store(self.connections.len() as u64, Ordering::Relaxed);
        debug!("Connection {} registered", id);

        ServerMessage::Init {
            player_id: id,
            snapshot: self.game_loop.state().full_snapshot(),
        }
    }

    /// Drop the connection and its tank
    pub fn disconnect(&mut self, id: PlayerId) -> Vec<Dispatch> {
        self.connections.remove(&id);
        self.metrics
            .connections_active
            .store(self.connections.len() as u64, Ordering::Relaxed);
        self.leave(id)
    }

    pub fn handle_message(&mut self, id: PlayerId, message: ClientMessage) -> Vec<Dispatch> {
        match message {
            ClientMessage::Join { nickname } => self.join(id, &nickname),
            ClientMessage::Input(input) => {
                self.game_loop.state_mut().set_input(id, input);
                Vec::new()
            }
            ClientMessage::Shoot => self.shoot(id),
            ClientMessage::Respawn => self.respawn(id),
            ClientMessage::Ping { timestamp } => self.ping(id, timestamp),
            ClientMessage::Leave => self.leave(id),
        }
    }

    pub fn join(&mut self, id: PlayerId, nickname: &str) -> Vec<Dispatch> {
        let now = self.game_loop.state().now;
        let player = match self.game_loop.state_mut().add_player(id, nickname) {
            Ok(player) => PlayerSnapshot::from_player(player, now),
            Err(JoinError::ServerFull { max_players }) => {
                self.metrics.joins_rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Rejecting join from {}: arena full ({} players)", id, max_players);
                return vec![Dispatch::To(
                    id,
                    ServerMessage::ServerFull {
                        max_players: max_players as u32,
                    },
                )];
            }
            Err(e) => {
                debug!("Ignoring join: {}", e);
                return Vec::new();
            }
        };

        info!("{} joined the game", player.name);
        let name = player.name.clone();
        vec![
            Dispatch::Broadcast(ServerMessage::Event(GameEvent::PlayerJoined {
                player_id: id,
                name,
            })),
            Dispatch::To(
                id,
                ServerMessage::JoinAccepted {
                    player,
                    snapshot: self.game_loop.state().full_snapshot(),
                },
            ),
        ]
    }

    pub fn shoot(&mut self, id: PlayerId) -> Vec<Dispatch> {
        let fired = self.game_loop.state_mut().shoot(id);
        if fired.is_empty() {
            return Vec::new();
        }
        vec![Dispatch::Broadcast(ServerMessage::Event(
            GameEvent::ProjectilesFired {
                owner_id: id,
                projectiles: fired.iter().map(ProjectileSnapshot::from_projectile).collect(),
            },
        ))]
    }

    pub fn respawn(&mut self, id: PlayerId) -> Vec<Dispatch> {
        let now = self.game_loop.state().now;
        let Some(player) = self.game_loop.state_mut().respawn(id) else {
            return Vec::new();
        };
        let player = PlayerSnapshot::from_player(player, now);
        debug!("{} respawned", player.name);
        vec![
            Dispatch::To(id, ServerMessage::Respawned { player }),
            Dispatch::Broadcast(ServerMessage::Event(GameEvent::PlayerRespawned {
                player_id: id,
            })),
        ]
    }

    pub fn ping(&self, id: PlayerId, timestamp: u64) -> Vec<Dispatch> {
        let server_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        vec![Dispatch::To(
            id,
            ServerMessage::Pong {
                client_timestamp: timestamp,
                server_timestamp,
            },
        )]
    }

    /// Remove the tank but keep the connection open
    pub fn leave(&mut self, id: PlayerId) -> Vec<Dispatch> {
        let Some(player) = self.game_loop.state_mut().remove_player(id) else {
            return Vec::new();
        };
        info!("{} left the game", player.name);
        vec![Dispatch::Broadcast(ServerMessage::Event(GameEvent::PlayerLeft {
            player_id: id,
            name: player.name,
        }))]
    }

    /// Run one simulation step and broadcast what happened
    pub fn tick(&mut self) -> Vec<Dispatch> {
        let events = self.game_loop.tick(self.tick_period);

        let state = self.game_loop.state();
        self.metrics.record_world(state);
        if let Some(last) = self.game_loop.performance().last_tick() {
            self.metrics.record_tick_time(last);
        }

        events
            .into_iter()
            .map(|event| Dispatch::Broadcast(ServerMessage::Event(event)))
            .collect()
    }

    /// Per-viewer snapshots for every player in the arena
    pub fn snapshots(&self) -> Vec<Dispatch> {
        let state = self.game_loop.state();
        self.connections
            .keys()
            .filter(|id| state.players.contains_key(*id))
            .map(|&id| Dispatch::To(id, ServerMessage::Snapshot(self.aoi.snapshot_for(state, id))))
            .collect()
    }

    pub fn status_line(&self) -> String {
        let state = self.game_loop.state();
        let timing = self.game_loop.performance().timing();
        format!(
            "tick {}, {} players ({} alive), {} shells, {} pick-ups, {} obstacles, arena {} | avg {:?}, max {:?}",
            state.tick,
            state.player_count(),
            state.alive_players().count(),
            state.projectiles.len(),
            state.pickups.len(),
            state.obstacles.len(),
            state.arena.extent(),
            timing.average,
            timing.max,
        )
    }

    fn writer(&self, id: PlayerId) -> Option<StreamWriter> {
        self.connections.get(&id).map(|c| c.writer.clone())
    }
}

/// Send one message on a reliable stream
pub async fn send_to_player(writer: &StreamWriter, message: &ServerMessage) -> Result<(), FramingError> {
    let bytes = encode(message)?;
    match &mut *writer.write().await {
        Some(stream) => write_frame(stream, &bytes).await,
        None => Err(FramingError::ConnectionClosed),
    }
}

/// Encode each dispatch once and hand the frames to per-recipient tasks.
///
/// Frames for one recipient are written in dispatch order.
pub async fn deliver(session: &Arc<RwLock<GameSession>>, dispatches: Vec<Dispatch>) {
    if dispatches.is_empty() {
        return;
    }

    let mut outgoing: HashMap<PlayerId, (StreamWriter, Vec<Arc<Vec<u8>>>)> = HashMap::new();
    let metrics = {
        let guard = session.read().await;
        for dispatch in dispatches {
            let (recipients, message): (Vec<PlayerId>, ServerMessage) = match dispatch {
                Dispatch::To(id, message) => (vec![id], message),
                Dispatch::Broadcast(message) => (guard.connections.keys().copied().collect(), message),
            };
            let bytes = match encode(&message) {
                Ok(bytes) => Arc::new(bytes),
                Err(e) => {
                    warn!("Failed to encode message: {}", e);
                    continue;
                }
            };
            for id in recipients {
                if let Some(writer) = guard.writer(id) {
                    outgoing
                        .entry(id)
                        .or_insert_with(|| (writer, Vec::new()))
                        .1
                        .push(bytes.clone());
                }
            }
        }
        guard.metrics.clone()
    };

    for (id, (writer, frames)) in outgoing {
        let metrics = metrics.clone();
        tokio::spawn(async move {
            let mut guard = writer.write().await;
            let Some(stream) = guard.as_mut() else {
                debug!("Send to {} skipped: stream closed", id);
                return;
            };
            for frame in frames {
                if let Err(e) = write_frame(stream, &frame).await {
                    debug!("Send to {} failed: {}", id, e);
                    return;
                }
                metrics.record_sent(frame.len() + 4);
            }
        });
    }
}

/// Fixed-rate simulation task
pub fn start_game_loop(session: Arc<RwLock<GameSession>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = session.read().await.tick_period();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let status_every =
            (tick::STATUS_LOG_INTERVAL.as_secs_f64() / period.as_secs_f64()).round().max(1.0) as u64;

        info!("Game loop started ({:?} per tick)", period);

        loop {
            ticker.tick().await;

            let dispatches = {
                let mut guard = session.write().await;
                let dispatches = guard.tick();
                if guard.game_loop().state().tick % status_every == 0 {
                    info!("{}", guard.status_line());
                }
                dispatches
            };

            deliver(&session, dispatches).await;
        }
    })
}

/// Snapshot broadcast task, decoupled from the tick rate
pub fn start_broadcast_loop(session: Arc<RwLock<GameSession>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = session.read().await.broadcast_period();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let snapshots = session.read().await.snapshots();
            deliver(&session, snapshots).await;
        }
    })
}
