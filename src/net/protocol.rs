use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::entities::{EntityId, Obstacle, PickUp, PickUpKind, Player, PlayerId, Projectile};
use crate::game::state::GameState;
use crate::util::vec2::round_to;

pub use crate::game::entities::PlayerInput;

/// Messages from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Request to spawn into the arena
    Join { nickname: String },
    /// Latest movement and aim state
    Input(PlayerInput),
    /// Request to fire
    Shoot,
    /// Request to come back after dying
    Respawn,
    /// Ping for latency measurement
    Ping { timestamp: u64 },
    /// Request to leave the game
    Leave,
}

/// Messages from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Sent once on connect: assigned identity and the full world
    Init {
        player_id: PlayerId,
        snapshot: GameSnapshot,
    },
    /// Join succeeded
    JoinAccepted {
        player: PlayerSnapshot,
        snapshot: GameSnapshot,
    },
    /// Join was rejected because the arena is at capacity
    ServerFull { max_players: u32 },
    /// Area-of-interest filtered state
    Snapshot(GameSnapshot),
    /// Game event notification
    Event(GameEvent),
    /// Sent to the requester after a successful respawn
    Respawned { player: PlayerSnapshot },
    /// Pong response with server timestamp
    Pong {
        client_timestamp: u64,
        server_timestamp: u64,
    },
}

/// Discrete events produced by the simulation and request handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A shell hit a player
    PlayerHit {
        target_id: PlayerId,
        shooter_id: PlayerId,
        damage: i32,
    },
    /// A player was destroyed
    PlayerDeath {
        victim_id: PlayerId,
        killer_id: PlayerId,
        victim_name: String,
        killer_name: String,
    },
    /// A player collected a pick-up
    PickUpCollected {
        player_id: PlayerId,
        pickup_id: EntityId,
        kind: PickUpKind,
    },
    /// An obstacle lost its last hit point
    ObstacleDestroyed { obstacle_id: EntityId },
    /// Published arena side length changed
    ArenaResized { extent: f32 },
    /// A player joined
    PlayerJoined { player_id: PlayerId, name: String },
    /// A player left
    PlayerLeft { player_id: PlayerId, name: String },
    /// A player came back after dying
    PlayerRespawned { player_id: PlayerId },
    /// A player fired one or more shells
    ProjectilesFired {
        owner_id: PlayerId,
        projectiles: Vec<ProjectileSnapshot>,
    },
}

/// World state for network transmission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub tick: u64,
    /// Arena side length
    pub arena_extent: f32,
    pub players: Vec<PlayerSnapshot>,
    pub projectiles: Vec<ProjectileSnapshot>,
    pub pickups: Vec<PickUpSnapshot>,
    pub obstacles: Vec<ObstacleSnapshot>,
}

impl GameSnapshot {
    /// Every entity, used at connect and join time
    pub fn from_game_state(state: &GameState) -> Self {
        let now = state.now;
        Self {
            tick: state.tick,
            arena_extent: state.arena.extent(),
            players: state
                .players
                .values()
                .map(|p| PlayerSnapshot::from_player(p, now))
                .collect(),
            projectiles: state
                .projectiles
                .iter()
                .map(ProjectileSnapshot::from_projectile)
                .collect(),
            pickups: state.pickups.values().map(PickUpSnapshot::from_pickup).collect(),
            obstacles: state
                .obstacles
                .values()
                .map(ObstacleSnapshot::from_obstacle)
                .collect(),
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerSnapshot> {
        self.players.iter().find(|p| p.id == id)
    }
}

/// Compressed player state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub color: u32,
    pub x: f32,
    pub z: f32,
    pub body_angle: f32,
    pub turret_angle: f32,
    pub hp: i32,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
    pub alive: bool,
    pub invulnerable: bool,
    pub has_spread: bool,
    pub has_speed: bool,
}

impl PlayerSnapshot {
    pub fn from_player(player: &Player, now: Duration) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            color: player.color,
            x: round_to(player.position.x, 1),
            z: round_to(player.position.z, 1),
            body_angle: round_to(player.body_angle, 2),
            turret_angle: round_to(player.turret_angle, 2),
            hp: player.health.max(0),
            score: player.score,
            kills: player.kills,
            deaths: player.deaths,
            alive: player.alive,
            invulnerable: player.is_invulnerable(now),
            has_spread: player.has_spread(now),
            has_speed: player.has_speed(now),
        }
    }
}

/// Compressed projectile state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: EntityId,
    pub x: f32,
    pub z: f32,
    pub angle: f32,
}

impl ProjectileSnapshot {
    pub fn from_projectile(projectile: &Projectile) -> Self {
        Self {
            id: projectile.id,
            x: projectile.position.x.round(),
            z: projectile.position.z.round(),
            angle: round_to(projectile.angle, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickUpSnapshot {
    pub id: EntityId,
    pub kind: PickUpKind,
    pub x: f32,
    pub z: f32,
}

impl PickUpSnapshot {
    pub fn from_pickup(pickup: &PickUp) -> Self {
        Self {
            id: pickup.id,
            kind: pickup.kind,
            x: pickup.position.x.round(),
            z: pickup.position.z.round(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSnapshot {
    pub id: EntityId,
    pub x: f32,
    pub z: f32,
    pub width: f32,
    pub height: f32,
    pub depth: f32,
    pub hp: i32,
}

impl ObstacleSnapshot {
    pub fn from_obstacle(obstacle: &Obstacle) -> Self {
        Self {
            id: obstacle.id,
            x: obstacle.position.x.round(),
            z: obstacle.position.z.round(),
            width: obstacle.width.round(),
            height: obstacle.height.round(),
            depth: obstacle.depth.round(),
            hp: obstacle.health.max(0),
        }
    }
}

/// Encode a message using bincode
/// Uses legacy config for fixed-size integers
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| ProtocolError::Decode(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
}
