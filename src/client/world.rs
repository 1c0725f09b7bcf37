//! Client view of the arena, rebuilt from server messages

use hashbrown::HashMap;

use crate::client::interpolation::EntityInterpolator;
use crate::game::constants::client::PING_INTERVAL_MS;
use crate::game::entities::{EntityId, PlayerId};
use crate::net::protocol::{
    ClientMessage, GameEvent, GameSnapshot, ObstacleSnapshot, PickUpSnapshot, PlayerSnapshot,
    ProjectileSnapshot, ServerMessage,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Identity received, not yet in the arena
    Connected,
    Playing,
}

/// Everything a front end needs to draw the arena.
///
/// All timestamps are the client's own clock in milliseconds.
#[derive(Debug, Default)]
pub struct ClientWorld {
    state: ConnectionState,
    local_id: Option<PlayerId>,
    tick: u64,
    arena_extent: f32,
    players: EntityInterpolator<PlayerId, PlayerSnapshot>,
    projectiles: EntityInterpolator<EntityId, ProjectileSnapshot>,
    pickups: HashMap<EntityId, PickUpSnapshot>,
    obstacles: HashMap<EntityId, ObstacleSnapshot>,
    local_aim: Option<f32>,
    rtt_ms: Option<u64>,
    last_ping_ms: Option<u64>,
    rejected: Option<u32>,
    events: Vec<GameEvent>,
}

impl ClientWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn arena_extent(&self) -> f32 {
        self.arena_extent
    }

    /// Last measured round trip
    pub fn rtt_ms(&self) -> Option<u64> {
        self.rtt_ms
    }

    /// Player ceiling reported by the last rejected join
    pub fn rejected(&self) -> Option<u32> {
        self.rejected
    }

    /// Fold one server message into the world
    pub fn apply(&mut self, message: ServerMessage, now_ms: u64) {
        match message {
            ServerMessage::Init { player_id, snapshot } => {
                self.state = ConnectionState::Connected;
                self.local_id = Some(player_id);
                self.apply_snapshot(snapshot, now_ms);
            }
            ServerMessage::JoinAccepted { player, snapshot } => {
                self.state = ConnectionState::Playing;
                self.rejected = None;
                self.local_id = Some(player.id);
                self.apply_snapshot(snapshot, now_ms);
            }
            ServerMessage::ServerFull { max_players } => {
                self.rejected = Some(max_players);
            }
            ServerMessage::Snapshot(snapshot) => self.apply_snapshot(snapshot, now_ms),
            ServerMessage::Event(event) => self.apply_event(event, now_ms),
            ServerMessage::Respawned { player } => {
                self.state = ConnectionState::Playing;
                self.players.push(player.id, now_ms, player);
            }
            ServerMessage::Pong { client_timestamp, .. } => {
                self.rtt_ms = Some(now_ms.saturating_sub(client_timestamp));
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: GameSnapshot, now_ms: u64) {
        self.tick = snapshot.tick;
        self.arena_extent = snapshot.arena_extent;

        let players: Vec<PlayerId> = snapshot.players.iter().map(|p| p.id).collect();
        self.players.retain_keys(|id| players.contains(id));
        for player in snapshot.players {
            self.players.push(player.id, now_ms, player);
        }

        let projectiles: Vec<EntityId> = snapshot.projectiles.iter().map(|p| p.id).collect();
        self.projectiles.retain_keys(|id| projectiles.contains(id));
        for projectile in snapshot.projectiles {
            self.projectiles.push(projectile.id, now_ms, projectile);
        }

        self.pickups = snapshot.pickups.into_iter().map(|p| (p.id, p)).collect();
        self.obstacles = snapshot.obstacles.into_iter().map(|o| (o.id, o)).collect();

        self.players.prune(now_ms);
        self.projectiles.prune(now_ms);
    }

    fn apply_event(&mut self, event: GameEvent, now_ms: u64) {
        match &event {
            GameEvent::ArenaResized { extent } => self.arena_extent = *extent,
            GameEvent::ObstacleDestroyed { obstacle_id } => {
                self.obstacles.remove(obstacle_id);
            }
            GameEvent::PickUpCollected { pickup_id, .. } => {
                self.pickups.remove(pickup_id);
            }
            GameEvent::PlayerLeft { player_id, .. } => self.players.remove(player_id),
            GameEvent::ProjectilesFired { projectiles, .. } => {
                for projectile in projectiles {
                    self.projectiles.push(projectile.id, now_ms, projectile.clone());
                }
            }
            _ => {}
        }
        self.events.push(event);
    }

    /// Record the locally aimed turret angle; it wins over server state
    pub fn set_local_aim(&mut self, angle: f32) {
        self.local_aim = Some(angle);
    }

    pub fn player(&self, id: PlayerId, now_ms: u64) -> Option<PlayerSnapshot> {
        let mut player = self.players.sample(&id, now_ms)?;
        if Some(id) == self.local_id {
            if let Some(aim) = self.local_aim {
                player.turret_angle = aim;
            }
        }
        Some(player)
    }

    pub fn local_player(&self, now_ms: u64) -> Option<PlayerSnapshot> {
        self.player(self.local_id?, now_ms)
    }

    pub fn players(&self, now_ms: u64) -> Vec<PlayerSnapshot> {
        self.players
            .keys()
            .filter_map(|id| self.player(*id, now_ms))
            .collect()
    }

    pub fn projectiles(&self, now_ms: u64) -> Vec<ProjectileSnapshot> {
        self.projectiles
            .keys()
            .filter_map(|id| self.projectiles.sample(id, now_ms))
            .collect()
    }

    pub fn pickups(&self) -> impl Iterator<Item = &PickUpSnapshot> {
        self.pickups.values()
    }

    pub fn obstacles(&self) -> impl Iterator<Item = &ObstacleSnapshot> {
        self.obstacles.values()
    }

    /// Events received since the last call
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Latency probe stamped with the client clock
    pub fn ping(&self, now_ms: u64) -> ClientMessage {
        ClientMessage::Ping { timestamp: now_ms }
    }

    /// Next latency probe once the ping interval has passed, while connected
    pub fn poll_ping(&mut self, now_ms: u64) -> Option<ClientMessage> {
        if self.state == ConnectionState::Disconnected {
            return None;
        }
        if let Some(last) = self.last_ping_ms {
            if now_ms.saturating_sub(last) < PING_INTERVAL_MS {
                return None;
            }
        }
        self.last_ping_ms = Some(now_ms);
        Some(self.ping(now_ms))
    }

    /// Forget everything after the transport closes
    pub fn disconnect(&mut self) {
        *self = Self::default();
    }
}
