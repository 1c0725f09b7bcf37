//! Area of Interest (AOI) filtering
//!
//! Every viewer receives all players so the scoreboard stays complete.
//! Shells, pick-ups and obstacles are limited to a circle around the
//! viewer's tank.

use crate::game::entities::PlayerId;
use crate::game::state::GameState;
use crate::net::protocol::{
    GameSnapshot, ObstacleSnapshot, PickUpSnapshot, PlayerSnapshot, ProjectileSnapshot,
};
use crate::util::vec2::Vec2;

/// Distance-based snapshot filter
#[derive(Debug, Clone, Copy)]
pub struct AoiFilter {
    radius: f32,
}

impl AoiFilter {
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    fn in_range(&self, center: Vec2, position: Vec2) -> bool {
        // Squared comparison, no sqrt in the hot path
        center.distance_sq_to(position) < self.radius * self.radius
    }

    /// Build the snapshot `viewer` should receive.
    ///
    /// Unknown viewers get the full world.
    pub fn snapshot_for(&self, state: &GameState, viewer: PlayerId) -> GameSnapshot {
        let Some(center) = state.get_player(viewer).map(|p| p.position) else {
            return GameSnapshot::from_game_state(state);
        };
        let now = state.now;

        GameSnapshot {
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
                .filter(|p| self.in_range(center, p.position))
                .map(ProjectileSnapshot::from_projectile)
                .collect(),
            pickups: state
                .pickups
                .values()
                .filter(|p| self.in_range(center, p.position))
                .map(PickUpSnapshot::from_pickup)
                .collect(),
            obstacles: state
                .obstacles
                .values()
                .filter(|o| self.in_range(center, o.position))
                .map(ObstacleSnapshot::from_obstacle)
                .collect(),
        }
    }

    /// Compare a filtered snapshot against the full one
    pub fn snapshot_stats(original: &GameSnapshot, filtered: &GameSnapshot) -> AoiStats {
        let total = |s: &GameSnapshot| s.projectiles.len() + s.pickups.len() + s.obstacles.len();
        let original_entities = total(original);
        let filtered_entities = total(filtered);
        AoiStats {
            original_entities,
            filtered_entities,
            reduction_percent: if original_entities > 0 {
                (1.0 - filtered_entities as f32 / original_entities as f32) * 100.0
            } else {
                0.0
            },
        }
    }
}

impl Default for AoiFilter {
    fn default() -> Self {
        Self::new(crate::game::constants::aoi::VIEW_RADIUS)
    }
}

/// How much a filter pass saved
#[derive(Debug, Clone, PartialEq)]
pub struct AoiStats {
    pub original_entities: usize,
    pub filtered_entities: usize,
    pub reduction_percent: f32,
}
