//! Arena sizing
//!
//! The square arena grows with the player count. The current side length
//! eases toward the target at a fixed rate and never jumps.

use crate::config::ArenaConfig;

/// Tracks the current and target arena side length
#[derive(Debug, Clone)]
pub struct ArenaController {
    config: ArenaConfig,
    current: f32,
    target: f32,
}

impl ArenaController {
    /// Controller starting at the size for zero players
    pub fn new(config: ArenaConfig) -> Self {
        let initial = Self::size_for(&config, 0);
        Self {
            config,
            current: initial,
            target: initial,
        }
    }

    fn size_for(config: &ArenaConfig, player_count: usize) -> f32 {
        let raw = config.base_size + player_count as f32 * config.size_per_player;
        raw.clamp(config.min_size, config.max_size)
    }

    /// Target side length for `player_count` players
    pub fn calculate_size(&self, player_count: usize) -> f32 {
        Self::size_for(&self.config, player_count)
    }

    /// Ease toward the target for `player_count` and return the current side length
    pub fn advance(&mut self, player_count: usize, dt: f32) -> f32 {
        self.target = self.calculate_size(player_count);
        let step = self.config.transition_speed * dt.max(0.0);
        let diff = self.target - self.current;
        if diff.abs() <= step {
            self.current = self.target;
        } else {
            self.current += step.copysign(diff);
        }
        self.current
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Side length as published to clients
    #[inline]
    pub fn extent(&self) -> f32 {
        self.current.round()
    }

    /// Half of the published side length
    #[inline]
    pub fn half_extent(&self) -> f32 {
        self.extent() / 2.0
    }

    pub fn is_transitioning(&self) -> bool {
        self.current != self.target
    }
}

impl Default for ArenaController {
    fn default() -> Self {
        Self::new(ArenaConfig::default())
    }
}
