//! Pick-up expiry and periodic spawns

use crate::game::entities::EntityId;
use crate::game::state::GameState;

/// What the periodic spawn step added this tick
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SpawnReport {
    pub pickups: Vec<EntityId>,
    pub obstacles: Vec<EntityId>,
}

/// Remove pick-ups older than their lifetime. Returns how many expired.
pub fn expire_pickups(state: &mut GameState) -> usize {
    let now = state.now;
    let lifetime = state.config.pickup_lifetime;
    let before = state.pickups.len();
    state.pickups.retain(|_, p| !p.is_expired(now, lifetime));
    before - state.pickups.len()
}

/// Whether the obstacle count leaves room for a respawn
pub fn obstacle_respawn_allowed(state: &GameState) -> bool {
    let count = state.obstacles.len();
    let max = state.config.max_obstacles;
    count < max && count as f32 <= max as f32 * state.config.obstacle_respawn_threshold
}

/// Time-gated, capacity-gated spawning of pick-ups and obstacles.
///
/// Each timer restarts when its interval has elapsed, whether or not
/// anything was spawned.
pub fn update(state: &mut GameState) -> SpawnReport {
    let now = state.now;
    let mut report = SpawnReport::default();

    if now.saturating_sub(state.last_pickup_spawn) >= state.config.pickup_spawn_interval {
        if state.pickups.len() < state.config.max_pickups {
            report.pickups.push(state.spawn_pickup());
        }
        state.last_pickup_spawn = now;
    }

    if now.saturating_sub(state.last_obstacle_spawn) >= state.config.obstacle_respawn_interval {
        if obstacle_respawn_allowed(state) {
            report.obstacles.push(state.spawn_obstacle());
        }
        state.last_obstacle_spawn = now;
    }

    report
}
