//! Narrow-phase geometry and the per-tick collision pass
//!
//! Shells are resolved first: each queries its neighborhood once and is
//! retired at the first player or obstacle it hits. The shell test is swept
//! along the segment travelled during the last step, not sampled at its end
//! point. Tanks are resolved second: a tank may collect pick-ups and receive
//! several obstacle pushbacks in the same tick.

use std::f32::consts::SQRT_2;

use smallvec::SmallVec;

use crate::config::GameConfig;
use crate::game::entities::{EntityId, Obstacle, PlayerId, Projectile};
use crate::game::spatial::{SpatialEntityId, SpatialGrid};
use crate::game::state::GameState;
use crate::net::protocol::GameEvent;
use crate::util::vec2::Vec2;

/// Name reported for a killer who already left
const UNKNOWN_NAME: &str = "Unknown";

/// Overlap of two axis-aligned boxes on each axis, if they intersect.
/// Touching edges do not count.
#[inline]
pub fn box_overlap(a: Vec2, a_half: Vec2, b: Vec2, b_half: Vec2) -> Option<Vec2> {
    let overlap = Vec2::new(
        a_half.x + b_half.x - (a.x - b.x).abs(),
        a_half.z + b_half.z - (a.z - b.z).abs(),
    );
    (overlap.x > 0.0 && overlap.z > 0.0).then_some(overlap)
}

/// Whether the segment `from..to` passes through the open box around
/// `center`. A zero-length segment reduces to a strict point-in-box test.
pub fn segment_hits_box(from: Vec2, to: Vec2, center: Vec2, half: Vec2) -> bool {
    let mut t_min = 0.0f32;
    let mut t_max = 1.0f32;
    let axes = [
        (from.x, to.x - from.x, center.x, half.x),
        (from.z, to.z - from.z, center.z, half.z),
    ];
    for (start, delta, mid, extent) in axes {
        let (lo, hi) = (mid - extent, mid + extent);
        if delta == 0.0 {
            if start <= lo || start >= hi {
                return false;
            }
            continue;
        }
        let (mut t0, mut t1) = ((lo - start) / delta, (hi - start) / delta);
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min >= t_max {
            return false;
        }
    }
    true
}

/// Shell path crosses the square tank footprint
#[inline]
pub fn projectile_hits_player(shell: &Projectile, player: Vec2, half_size: f32) -> bool {
    segment_hits_box(
        shell.previous_position,
        shell.position,
        player,
        Vec2::new(half_size, half_size),
    )
}

/// Shell path crosses the obstacle footprint
#[inline]
pub fn projectile_hits_obstacle(shell: &Projectile, obstacle: &Obstacle) -> bool {
    segment_hits_box(
        shell.previous_position,
        shell.position,
        obstacle.position,
        obstacle.half_extents(),
    )
}

/// Circle test with the tank half size as its radius
#[inline]
pub fn player_touches_pickup(player: Vec2, half_size: f32, pickup: Vec2, pickup_radius: f32) -> bool {
    let reach = half_size + pickup_radius;
    player.distance_sq_to(pickup) < reach * reach
}

/// Minimum translation moving the tank out of the obstacle along the axis
/// of smaller overlap, away from the obstacle center.
pub fn obstacle_pushback(player: Vec2, half_size: f32, obstacle: &Obstacle) -> Option<Vec2> {
    let overlap = box_overlap(
        player,
        Vec2::new(half_size, half_size),
        obstacle.position,
        obstacle.half_extents(),
    )?;
    let away = |delta: f32| if delta > 0.0 { 1.0 } else { -1.0 };
    let push = if overlap.x < overlap.z {
        Vec2::new(overlap.x * away(player.x - obstacle.position.x), 0.0)
    } else {
        Vec2::new(0.0, overlap.z * away(player.z - obstacle.position.z))
    };
    Some(push)
}

/// Query radius guaranteeing a shell finds any tank or obstacle it is inside
pub fn projectile_reach(config: &GameConfig) -> f32 {
    config.player_half_size.max(config.max_obstacle_half_extent()) * SQRT_2
}

/// Query radius guaranteeing a tank finds any pick-up or obstacle it touches
pub fn player_reach(config: &GameConfig) -> f32 {
    let obstacle = (config.player_half_size + config.max_obstacle_half_extent()) * SQRT_2;
    let pickup = config.player_half_size + config.pickup_radius;
    obstacle.max(pickup)
}

/// Run both collision phases. `player_step` is the farthest a tank may
/// have moved since the grid was built.
pub fn resolve(state: &mut GameState, grid: &SpatialGrid, player_step: f32) -> Vec<GameEvent> {
    let mut events = Vec::new();
    resolve_projectiles(state, grid, player_step, &mut events);
    resolve_players(state, grid, &mut events);
    events
}

fn resolve_projectiles(
    state: &mut GameState,
    grid: &SpatialGrid,
    player_step: f32,
    events: &mut Vec<GameEvent>,
) {
    let reach = projectile_reach(&state.config) + player_step;
    let mut retired = vec![false; state.projectiles.len()];

    for (index, slot) in retired.iter_mut().enumerate() {
        let shell = state.projectiles[index].clone();
        // Query around the middle of this tick's flight path
        let center = shell.previous_position.lerp(shell.position, 0.5);
        let radius = reach + shell.previous_position.distance_to(shell.position) / 2.0;
        for candidate in grid.query(center, radius) {
            let hit = match candidate.id {
                SpatialEntityId::Player(target_id) => hit_player(state, &shell, target_id, events),
                SpatialEntityId::Obstacle(obstacle_id) => {
                    hit_obstacle(state, &shell, obstacle_id, events)
                }
                SpatialEntityId::PickUp(_) => false,
            };
            if hit {
                *slot = true;
                break;
            }
        }
    }

    let mut flags = retired.into_iter();
    state
        .projectiles
        .retain(|_| !flags.next().unwrap_or(false));
}

fn hit_player(
    state: &mut GameState,
    shell: &Projectile,
    target_id: PlayerId,
    events: &mut Vec<GameEvent>,
) -> bool {
    if target_id == shell.owner_id {
        return false;
    }
    let now = state.now;
    let half = state.config.player_half_size;
    let Some(target) = state.players.get_mut(&target_id) else {
        return false;
    };
    if !target.alive || target.is_invulnerable(now) {
        return false;
    }
    if !projectile_hits_player(shell, target.position, half) {
        return false;
    }

    let died = target.apply_damage(shell.damage);
    let victim_name = target.name.clone();
    events.push(GameEvent::PlayerHit {
        target_id,
        shooter_id: shell.owner_id,
        damage: shell.damage,
    });

    if died {
        let award = state.config.kill_award;
        let killer_name = match state.players.get_mut(&shell.owner_id) {
            Some(shooter) => {
                shooter.kills += 1;
                shooter.score += award;
                shooter.name.clone()
            }
            None => UNKNOWN_NAME.to_string(),
        };
        tracing::info!("{} destroyed {}", killer_name, victim_name);
        events.push(GameEvent::PlayerDeath {
            victim_id: target_id,
            killer_id: shell.owner_id,
            victim_name,
            killer_name,
        });
    }
    true
}

fn hit_obstacle(
    state: &mut GameState,
    shell: &Projectile,
    obstacle_id: EntityId,
    events: &mut Vec<GameEvent>,
) -> bool {
    let Some(obstacle) = state.obstacles.get_mut(&obstacle_id) else {
        return false;
    };
    if !projectile_hits_obstacle(shell, obstacle) {
        return false;
    }
    if obstacle.apply_damage(shell.damage) {
        state.obstacles.remove(&obstacle_id);
        events.push(GameEvent::ObstacleDestroyed { obstacle_id });
    }
    true
}

fn resolve_players(state: &mut GameState, grid: &SpatialGrid, events: &mut Vec<GameEvent>) {
    let reach = player_reach(&state.config);
    let half = state.config.player_half_size;
    let pickup_radius = state.config.pickup_radius;
    let now = state.now;

    let ids: Vec<PlayerId> = state.alive_players().map(|p| p.id).collect();
    for player_id in ids {
        let Some(origin) = state.get_player(player_id).map(|p| p.position) else {
            continue;
        };
        let candidates: SmallVec<[SpatialEntityId; 8]> =
            grid.query(origin, reach).map(|e| e.id).collect();

        for candidate in candidates {
            match candidate {
                SpatialEntityId::PickUp(pickup_id) => {
                    let Some(position) = state.get_player(player_id).map(|p| p.position) else {
                        break;
                    };
                    let touching = state.pickups.get(&pickup_id).is_some_and(|pickup| {
                        player_touches_pickup(position, half, pickup.position, pickup_radius)
                    });
                    if !touching {
                        continue;
                    }
                    let Some(pickup) = state.pickups.remove(&pickup_id) else {
                        continue;
                    };
                    if let Some(player) = state.players.get_mut(&player_id) {
                        player.apply_pickup(pickup.kind, now, &state.config);
                    }
                    events.push(GameEvent::PickUpCollected {
                        player_id,
                        pickup_id,
                        kind: pickup.kind,
                    });
                }
                SpatialEntityId::Obstacle(obstacle_id) => {
                    let Some(obstacle) = state.obstacles.get(&obstacle_id) else {
                        continue;
                    };
                    let Some(player) = state.players.get_mut(&player_id) else {
                        break;
                    };
                    if let Some(push) = obstacle_pushback(player.position, half, obstacle) {
                        player.position += push;
                    }
                }
                SpatialEntityId::Player(_) => {}
            }
        }
    }
}
