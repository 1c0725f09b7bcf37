use std::net::{IpAddr, Ipv4Addr};
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::game::constants::{
    aoi, arena, lobby, net, obstacle, pickup, player, projectile, spatial, tick,
};

/// Configuration rejected by [`ServerConfig::validate`]
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("{0} has an empty range")]
    EmptyRange(&'static str),
    #[error("arena max size {max} is below min size {min}")]
    ArenaBounds { min: f32, max: f32 },
    #[error("arena max size {0} exceeds the spatial grid coordinate bound")]
    ArenaTooLarge(f32),
    #[error("obstacle respawn threshold {0} must lie in 0..=1")]
    Threshold(f32),
}

/// Arena sizing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ArenaConfig {
    pub base_size: f32,
    pub size_per_player: f32,
    pub min_size: f32,
    pub max_size: f32,
    /// Units per second the current size moves toward the target
    pub transition_speed: f32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            base_size: arena::BASE_SIZE,
            size_per_player: arena::SIZE_PER_PLAYER,
            min_size: arena::MIN_SIZE,
            max_size: arena::MAX_SIZE,
            transition_speed: arena::TRANSITION_SPEED,
        }
    }
}

/// Gameplay tunables owned by the simulation
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub max_players: usize,

    pub player_max_health: i32,
    pub player_speed: f32,
    pub speed_boost_multiplier: f32,
    pub player_half_size: f32,
    pub movement_margin: f32,
    pub invulnerability: Duration,
    pub shoot_cooldown: Duration,
    pub respawn_shoot_lock: Duration,
    pub barrel_length: f32,
    pub kill_award: u32,

    pub projectile_speed: f32,
    pub projectile_lifetime: Duration,
    pub projectile_damage: i32,
    pub spread_offset: f32,

    pub pickup_radius: f32,
    pub pickup_lifetime: Duration,
    pub max_pickups: usize,
    pub pickup_spawn_interval: Duration,
    pub spread_duration: Duration,
    pub speed_duration: Duration,
    pub heal_amount: i32,

    pub obstacle_width: RangeInclusive<f32>,
    pub obstacle_height: RangeInclusive<f32>,
    pub obstacle_depth: RangeInclusive<f32>,
    pub obstacle_max_health: i32,
    pub initial_obstacles: usize,
    pub max_obstacles: usize,
    pub obstacle_respawn_threshold: f32,
    pub obstacle_respawn_interval: Duration,

    pub arena: ArenaConfig,
    pub spawn_margin: f32,
    pub shrink_margin: f32,
    pub spawn_attempts: usize,

    pub aoi_radius: f32,
    pub cell_size: f32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: lobby::MAX_PLAYERS,

            player_max_health: player::MAX_HEALTH,
            player_speed: player::SPEED,
            speed_boost_multiplier: player::SPEED_BOOST_MULTIPLIER,
            player_half_size: player::HALF_SIZE,
            movement_margin: player::MOVEMENT_MARGIN,
            invulnerability: player::INVULNERABILITY,
            shoot_cooldown: player::SHOOT_COOLDOWN,
            respawn_shoot_lock: player::RESPAWN_SHOOT_LOCK,
            barrel_length: player::BARREL_LENGTH,
            kill_award: player::KILL_AWARD,

            projectile_speed: projectile::SPEED,
            projectile_lifetime: projectile::LIFETIME,
            projectile_damage: projectile::DAMAGE,
            spread_offset: projectile::SPREAD_OFFSET,

            pickup_radius: pickup::RADIUS,
            pickup_lifetime: pickup::LIFETIME,
            max_pickups: pickup::MAX_COUNT,
            pickup_spawn_interval: pickup::SPAWN_INTERVAL,
            spread_duration: pickup::SPREAD_DURATION,
            speed_duration: pickup::SPEED_DURATION,
            heal_amount: pickup::HEAL_AMOUNT,

            obstacle_width: obstacle::MIN_WIDTH..=obstacle::MAX_WIDTH,
            obstacle_height: obstacle::MIN_HEIGHT..=obstacle::MAX_HEIGHT,
            obstacle_depth: obstacle::MIN_DEPTH..=obstacle::MAX_DEPTH,
            obstacle_max_health: obstacle::MAX_HEALTH,
            initial_obstacles: obstacle::INITIAL_COUNT,
            max_obstacles: obstacle::MAX_COUNT,
            obstacle_respawn_threshold: obstacle::RESPAWN_THRESHOLD,
            obstacle_respawn_interval: obstacle::RESPAWN_INTERVAL,

            arena: ArenaConfig::default(),
            spawn_margin: arena::SPAWN_MARGIN,
            shrink_margin: arena::SHRINK_MARGIN,
            spawn_attempts: arena::SPAWN_ATTEMPTS,

            aoi_radius: aoi::VIEW_RADIUS,
            cell_size: spatial::CELL_SIZE,
        }
    }
}

impl GameConfig {
    /// Largest half extent of any obstacle footprint
    pub fn max_obstacle_half_extent(&self) -> f32 {
        self.obstacle_width.end().max(*self.obstacle_depth.end()) / 2.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players == 0 {
            return Err(ConfigError::Zero("max_players"));
        }
        if self.player_speed <= 0.0 {
            return Err(ConfigError::Zero("player_speed"));
        }
        if self.projectile_speed <= 0.0 {
            return Err(ConfigError::Zero("projectile_speed"));
        }
        if self.cell_size <= 0.0 {
            return Err(ConfigError::Zero("cell_size"));
        }
        if self.aoi_radius <= 0.0 {
            return Err(ConfigError::Zero("aoi_radius"));
        }
        for (name, range) in [
            ("obstacle_width", &self.obstacle_width),
            ("obstacle_height", &self.obstacle_height),
            ("obstacle_depth", &self.obstacle_depth),
        ] {
            if range.is_empty() {
                return Err(ConfigError::EmptyRange(name));
            }
        }
        if !(0.0..=1.0).contains(&self.obstacle_respawn_threshold) {
            return Err(ConfigError::Threshold(self.obstacle_respawn_threshold));
        }
        let arena = &self.arena;
        if arena.max_size < arena.min_size {
            return Err(ConfigError::ArenaBounds {
                min: arena.min_size,
                max: arena.max_size,
            });
        }
        if arena.max_size / 2.0 >= spatial::MAX_COORDINATE {
            return Err(ConfigError::ArenaTooLarge(arena.max_size));
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: IpAddr,
    /// WebTransport port
    pub port: u16,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Snapshot broadcasts per second
    pub broadcast_rate: u32,
    /// Port of the plain HTTP metrics endpoint
    pub metrics_port: u16,
    /// Path to TLS certificate file
    pub tls_cert_path: Option<String>,
    /// Path to TLS key file
    pub tls_key_path: Option<String>,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: net::DEFAULT_PORT,
            tick_rate: tick::TICK_RATE,
            broadcast_rate: tick::BROADCAST_RATE,
            metrics_port: net::DEFAULT_METRICS_PORT,
            tls_cert_path: None,
            tls_key_path: None,
            game: GameConfig::default(),
        }
    }
}

/// Overwrite `target` with the parsed value of `name` when it is set and valid
fn read_env<T>(name: &str, target: &mut T, valid: impl Fn(&T) -> bool)
where
    T: FromStr,
{
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) if valid(&parsed) => *target = parsed,
        Ok(_) => tracing::warn!("{} '{}' is out of range, using default", name, raw),
        Err(_) => tracing::warn!("Invalid {} '{}', using default", name, raw),
    }
}

impl ServerConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        read_env("BIND_ADDRESS", &mut config.bind_address, |_| true);
        read_env("SERVER_PORT", &mut config.port, |p| *p > 0);
        read_env("TICK_RATE", &mut config.tick_rate, |r| (1..=120).contains(r));
        read_env("BROADCAST_RATE", &mut config.broadcast_rate, |r| {
            (1..=120).contains(r)
        });
        read_env("METRICS_PORT", &mut config.metrics_port, |p| *p > 0);

        let game = &mut config.game;
        read_env("MAX_PLAYERS", &mut game.max_players, |n| (1..=1000).contains(n));
        read_env("AOI_RADIUS", &mut game.aoi_radius, |r| *r > 0.0);
        read_env("PROJECTILE_SPEED", &mut game.projectile_speed, |s| *s > 0.0);
        read_env("PLAYER_SPEED", &mut game.player_speed, |s| *s > 0.0);

        if let Ok(cert_path) = std::env::var("TLS_CERT_PATH") {
            config.tls_cert_path = Some(cert_path);
        }

        if let Ok(key_path) = std::env::var("TLS_KEY_PATH") {
            config.tls_key_path = Some(key_path);
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Zero("port"));
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::Zero("tick_rate"));
        }
        if self.broadcast_rate == 0 {
            return Err(ConfigError::Zero("broadcast_rate"));
        }
        self.game.validate()
    }
}
