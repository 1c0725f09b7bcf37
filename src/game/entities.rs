//! Entity records mutated by the simulation.
//!
//! Players, projectiles, pick-ups and obstacles share no behavior; each is a
//! flat record with its own small set of operations. Timestamps are
//! simulation time measured from world creation.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::GameConfig;
use crate::util::vec2::Vec2;

/// Unique player identifier
pub type PlayerId = Uuid;

/// Entity identifier for non-player entities
pub type EntityId = u64;

/// Latest movement and aim state sent by a client
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Turret heading in radians
    pub angle: f32,
    /// Only used by clients for display
    pub shooting: bool,
}

impl PlayerInput {
    /// Unit movement direction from the flags, zero when idle or cancelled out
    pub fn movement(&self) -> Vec2 {
        let mut dir = Vec2::ZERO;
        if self.up {
            dir.z -= 1.0;
        }
        if self.down {
            dir.z += 1.0;
        }
        if self.left {
            dir.x -= 1.0;
        }
        if self.right {
            dir.x += 1.0;
        }
        dir.normalize()
    }
}

/// Tank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: u32,
    pub position: Vec2,
    pub body_angle: f32,
    pub turret_angle: f32,
    pub health: i32,
    pub score: u32,
    pub kills: u32,
    pub deaths: u32,
    pub alive: bool,
    pub invulnerable_until: Duration,
    /// Earliest time the next shot is allowed
    pub shoot_ready_at: Duration,
    pub spread_until: Option<Duration>,
    pub speed_until: Option<Duration>,
    pub input: PlayerInput,
}

impl Player {
    pub fn new(
        id: PlayerId,
        name: String,
        color: u32,
        position: Vec2,
        now: Duration,
        config: &GameConfig,
    ) -> Self {
        Self {
            id,
            name,
            color,
            position,
            body_angle: 0.0,
            turret_angle: 0.0,
            health: config.player_max_health,
            score: 0,
            kills: 0,
            deaths: 0,
            alive: true,
            invulnerable_until: now + config.invulnerability,
            shoot_ready_at: now,
            spread_until: None,
            speed_until: None,
            input: PlayerInput::default(),
        }
    }

    #[inline]
    pub fn is_invulnerable(&self, now: Duration) -> bool {
        now < self.invulnerable_until
    }

    #[inline]
    pub fn can_shoot(&self, now: Duration) -> bool {
        self.alive && now >= self.shoot_ready_at
    }

    #[inline]
    pub fn has_spread(&self, now: Duration) -> bool {
        self.spread_until.is_some_and(|until| now < until)
    }

    #[inline]
    pub fn has_speed(&self, now: Duration) -> bool {
        self.speed_until.is_some_and(|until| now < until)
    }

    /// Drop power-up flags whose expiry has passed
    pub fn clear_expired_powerups(&mut self, now: Duration) {
        if !self.has_spread(now) {
            self.spread_until = None;
        }
        if !self.has_speed(now) {
            self.speed_until = None;
        }
    }

    /// Subtract damage, clamping at zero. Returns true when this hit killed the player.
    pub fn apply_damage(&mut self, damage: i32) -> bool {
        if !self.alive {
            return false;
        }
        self.health = (self.health - damage).max(0);
        if self.health == 0 {
            self.alive = false;
            self.deaths += 1;
            return true;
        }
        false
    }

    /// Apply a collected pick-up. Timed effects refresh their expiry.
    pub fn apply_pickup(&mut self, kind: PickUpKind, now: Duration, config: &GameConfig) {
        match kind {
            PickUpKind::Spread => self.spread_until = Some(now + config.spread_duration),
            PickUpKind::Speed => self.speed_until = Some(now + config.speed_duration),
            PickUpKind::Heal => {
                self.health = (self.health + config.heal_amount).min(config.player_max_health);
            }
        }
    }

    /// Bring a dead player back at `position` with full health
    pub fn respawn(&mut self, position: Vec2, now: Duration, config: &GameConfig) {
        self.position = position;
        self.health = config.player_max_health;
        self.alive = true;
        self.score = 0;
        self.spread_until = None;
        self.speed_until = None;
        self.invulnerable_until = now + config.invulnerability;
        self.shoot_ready_at = now + config.respawn_shoot_lock;
    }
}

/// Tank shell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: EntityId,
    pub owner_id: PlayerId,
    pub position: Vec2,
    /// Position before the latest flight step
    pub previous_position: Vec2,
    pub velocity: Vec2,
    /// Heading at launch, kept for the wire form
    pub angle: f32,
    pub damage: i32,
    pub created_at: Duration,
}

impl Projectile {
    pub fn new(
        id: EntityId,
        owner_id: PlayerId,
        position: Vec2,
        angle: f32,
        speed: f32,
        damage: i32,
        created_at: Duration,
    ) -> Self {
        Self {
            id,
            owner_id,
            position,
            previous_position: position,
            velocity: Vec2::from_heading(angle) * speed,
            angle,
            damage,
            created_at,
        }
    }

    #[inline]
    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.created_at)
    }

    /// Integrate one flight step, remembering where it started
    pub fn advance(&mut self, dt: f32) {
        self.previous_position = self.position;
        self.position += self.velocity * dt;
    }
}

/// Pick-up effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PickUpKind {
    /// Three shells per shot for a while
    Spread,
    /// Faster movement for a while
    Speed,
    /// Instant health
    Heal,
}

impl PickUpKind {
    pub const ALL: [PickUpKind; 3] = [PickUpKind::Spread, PickUpKind::Speed, PickUpKind::Heal];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickUp {
    pub id: EntityId,
    pub kind: PickUpKind,
    pub position: Vec2,
    pub created_at: Duration,
}

impl PickUp {
    pub fn new(id: EntityId, kind: PickUpKind, position: Vec2, created_at: Duration) -> Self {
        Self {
            id,
            kind,
            position,
            created_at,
        }
    }

    pub fn is_expired(&self, now: Duration, lifetime: Duration) -> bool {
        now.saturating_sub(self.created_at) > lifetime
    }
}

/// Destructible block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    pub id: EntityId,
    pub position: Vec2,
    pub width: f32,
    pub height: f32,
    pub depth: f32,
    pub health: i32,
}

impl Obstacle {
    /// Obstacle with dimensions drawn from the configured ranges
    pub fn random<R: Rng + ?Sized>(
        id: EntityId,
        position: Vec2,
        rng: &mut R,
        config: &GameConfig,
    ) -> Self {
        Self {
            id,
            position,
            width: rng.gen_range(config.obstacle_width.clone()),
            height: rng.gen_range(config.obstacle_height.clone()),
            depth: rng.gen_range(config.obstacle_depth.clone()),
            health: config.obstacle_max_health,
        }
    }

    /// Half width along x and half depth along z
    #[inline]
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.depth / 2.0)
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.health <= 0
    }

    /// Returns true when this hit destroyed the obstacle
    pub fn apply_damage(&mut self, damage: i32) -> bool {
        if self.is_destroyed() {
            return false;
        }
        self.health = (self.health - damage).max(0);
        self.is_destroyed()
    }
}
