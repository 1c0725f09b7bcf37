//! Reference tunables. Runtime values live in [`crate::config::GameConfig`],
//! which defaults to these.

use std::time::Duration;

/// Simulation scheduling
pub mod tick {
    use std::time::Duration;

    /// Server tick rate in Hz
    pub const TICK_RATE: u32 = 10;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / TICK_RATE as f32;
    /// Tick duration in milliseconds
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
    /// Snapshot broadcast rate in Hz, independent of the tick rate
    pub const BROADCAST_RATE: u32 = 10;
    /// Samples kept by the tick timing window
    pub const PERFORMANCE_WINDOW: usize = 50;
    /// Interval between loop status log lines
    pub const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(10);
}

/// Tank constants
pub mod player {
    use std::time::Duration;

    pub const MAX_HEALTH: i32 = 100;
    /// Base movement speed in units per second
    pub const SPEED: f32 = 150.0;
    /// Movement multiplier while the speed boost is active
    pub const SPEED_BOOST_MULTIPLIER: f32 = 1.5;
    /// Half the side of the square tank footprint
    pub const HALF_SIZE: f32 = 25.0;
    /// Movement is clamped to the arena half extent minus this margin
    pub const MOVEMENT_MARGIN: f32 = 30.0;
    pub const INVULNERABILITY: Duration = Duration::from_millis(2000);
    pub const SHOOT_COOLDOWN: Duration = Duration::from_millis(1000);
    /// Shooting lock granted on respawn
    pub const RESPAWN_SHOOT_LOCK: Duration = Duration::from_millis(2000);
    /// Distance from tank center to the muzzle
    pub const BARREL_LENGTH: f32 = 35.0;
    /// Score awarded to the shooter on a kill
    pub const KILL_AWARD: u32 = 100;
    pub const DEFAULT_NAME: &str = "Player";
    pub const MAX_NAME_LENGTH: usize = 16;
    /// Tank colors, handed out round-robin
    pub const COLORS: [u32; 10] = [
        0x4ade80, 0xe74c3c, 0x3b82f6, 0xf59e0b, 0x8b5cf6, 0xec4899, 0x14b8a6, 0xeab308, 0x6366f1,
        0x06b6d4,
    ];
}

/// Shell constants
pub mod projectile {
    use std::time::Duration;

    /// Travel speed in units per second
    pub const SPEED: f32 = 400.0;
    pub const LIFETIME: Duration = Duration::from_millis(750);
    pub const DAMAGE: i32 = 25;
    /// Angular offset of the side shells while spread fire is active
    pub const SPREAD_OFFSET: f32 = 0.2;
}

/// Pick-up constants
pub mod pickup {
    use std::time::Duration;

    pub const RADIUS: f32 = 15.0;
    pub const LIFETIME: Duration = Duration::from_millis(30_000);
    pub const MAX_COUNT: usize = 15;
    pub const SPAWN_INTERVAL: Duration = Duration::from_millis(5_000);
    pub const SPREAD_DURATION: Duration = Duration::from_millis(10_000);
    pub const SPEED_DURATION: Duration = Duration::from_millis(8_000);
    pub const HEAL_AMOUNT: i32 = 50;
}

/// Destructible obstacle constants
pub mod obstacle {
    use std::time::Duration;

    pub const MIN_WIDTH: f32 = 40.0;
    pub const MAX_WIDTH: f32 = 80.0;
    pub const MIN_HEIGHT: f32 = 30.0;
    pub const MAX_HEIGHT: f32 = 60.0;
    pub const MIN_DEPTH: f32 = 40.0;
    pub const MAX_DEPTH: f32 = 80.0;
    pub const MAX_HEALTH: i32 = 75;
    /// Obstacles placed when the world is created
    pub const INITIAL_COUNT: usize = 20;
    pub const MAX_COUNT: usize = 50;
    /// Respawns happen only while the count is at or below this share of capacity
    pub const RESPAWN_THRESHOLD: f32 = 0.8;
    pub const RESPAWN_INTERVAL: Duration = Duration::from_millis(3_000);
}

/// Arena sizing constants
pub mod arena {
    /// Side length with no players
    pub const BASE_SIZE: f32 = 1500.0;
    /// Extra side length per connected player
    pub const SIZE_PER_PLAYER: f32 = 50.0;
    pub const MIN_SIZE: f32 = 1500.0;
    pub const MAX_SIZE: f32 = 4000.0;
    /// Easing rate of the current size toward the target, units per second
    pub const TRANSITION_SPEED: f32 = 100.0;
    /// Random spawn points keep this distance from the edge
    pub const SPAWN_MARGIN: f32 = 100.0;
    /// Resize clamps players and culls obstacles at half size minus this margin
    pub const SHRINK_MARGIN: f32 = 50.0;
    /// Attempts at finding an unobstructed spawn point before giving up
    pub const SPAWN_ATTEMPTS: usize = 16;
}

/// Area-of-interest filtering
pub mod aoi {
    /// Projectiles, pick-ups and obstacles beyond this distance are not sent
    pub const VIEW_RADIUS: f32 = 1000.0;
}

/// Broad-phase grid
pub mod spatial {
    pub const CELL_SIZE: f32 = 100.0;
    /// Largest absolute world coordinate the grid accepts
    pub const MAX_COORDINATE: f32 = 32_768.0;
}

/// Connection limits
pub mod lobby {
    pub const MAX_PLAYERS: usize = 50;
}

/// Network constants
pub mod net {
    /// Default WebTransport port
    pub const DEFAULT_PORT: u16 = 4433;
    /// Default metrics HTTP port
    pub const DEFAULT_METRICS_PORT: u16 = 9090;
    /// Maximum reliable message size in bytes
    pub const MAX_MESSAGE_SIZE: usize = 65536;
    /// Maximum datagram size in bytes
    pub const MAX_DATAGRAM_SIZE: usize = 1200;
    /// Queued inputs before new ones are dropped
    pub const INPUT_QUEUE_CAPACITY: usize = 1024;
}

/// Client reconciliation constants
pub mod client {
    /// Render time lags arrival time by this many milliseconds
    pub const INTERPOLATION_DELAY_MS: u64 = 100;
    /// States kept per entity
    pub const HISTORY_LENGTH: usize = 10;
    /// States older than this are pruned
    pub const HISTORY_RETENTION_MS: u64 = 1000;
    /// Interval between latency probes
    pub const PING_INTERVAL_MS: u64 = 2000;
}

/// Convenience for converting a tick rate to its period
pub fn tick_period(rate_hz: u32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1)))
}
