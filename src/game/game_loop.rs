//! Authoritative tick
//!
//! One call to [`GameLoop::tick`] advances the world by one fixed step in
//! this order: rebuild the grid, move tanks, fly shells, expire pick-ups,
//! resolve collisions, spawn, resize the arena, record timing.

use std::time::Duration;

use crate::config::GameConfig;
use crate::game::input_buffer::{InputBuffer, InputSender};
use crate::game::performance::PerformanceMonitor;
use crate::game::spatial::{SpatialEntity, SpatialEntityId, SpatialGrid};
use crate::game::state::GameState;
use crate::game::systems::{collision, movement, projectile, spawning};
use crate::net::protocol::GameEvent;

/// Owns the simulation state and everything needed to advance it
pub struct GameLoop {
    state: GameState,
    grid: SpatialGrid,
    performance: PerformanceMonitor,
    input_buffer: InputBuffer,
}

impl GameLoop {
    pub fn new(config: GameConfig, tick_period: Duration) -> Self {
        Self::with_state(GameState::new(config), tick_period)
    }

    pub fn with_state(state: GameState, tick_period: Duration) -> Self {
        Self {
            grid: SpatialGrid::new(state.config.cell_size),
            state,
            performance: PerformanceMonitor::new(tick_period),
            input_buffer: InputBuffer::default(),
        }
    }

    #[inline]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    #[inline]
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn performance(&self) -> &PerformanceMonitor {
        &self.performance
    }

    /// Handle for connection tasks to push movement input
    pub fn input_sender(&self) -> InputSender {
        self.input_buffer.sender()
    }

    /// Advance the world by `dt` and return the events it produced
    pub fn tick(&mut self, dt: Duration) -> Vec<GameEvent> {
        self.performance.tick_start();
        self.input_buffer.apply_to(&mut self.state);

        let dt_secs = dt.as_secs_f32();
        self.state.tick += 1;
        self.state.now += dt;

        self.rebuild_grid();
        movement::update(&mut self.state, dt_secs);
        projectile::advance(&mut self.state, dt_secs);
        spawning::expire_pickups(&mut self.state);

        let player_step = movement::max_step(&self.state, dt_secs);
        let mut events = collision::resolve(&mut self.state, &self.grid, player_step);

        let spawned = spawning::update(&mut self.state);
        if !spawned.obstacles.is_empty() || !spawned.pickups.is_empty() {
            tracing::debug!(
                "Spawned {} pick-up(s), {} obstacle(s)",
                spawned.pickups.len(),
                spawned.obstacles.len()
            );
        }

        if let Some(event) = self.update_arena(dt_secs) {
            events.push(event);
        }

        self.performance.tick_end();
        events
    }

    fn rebuild_grid(&mut self) {
        self.grid.clear();
        for player in self.state.alive_players() {
            self.grid.insert(SpatialEntity {
                id: SpatialEntityId::Player(player.id),
                position: player.position,
            });
        }
        for obstacle in self.state.obstacles.values() {
            self.grid.insert(SpatialEntity {
                id: SpatialEntityId::Obstacle(obstacle.id),
                position: obstacle.position,
            });
        }
        for pickup in self.state.pickups.values() {
            self.grid.insert(SpatialEntity {
                id: SpatialEntityId::PickUp(pickup.id),
                position: pickup.position,
            });
        }
    }

    fn update_arena(&mut self, dt: f32) -> Option<GameEvent> {
        let before = self.state.arena.extent();
        let player_count = self.state.player_count();
        self.state.arena.advance(player_count, dt);
        let extent = self.state.arena.extent();
        if extent == before {
            return None;
        }

        // Growing bounds never invalidate a position
        if extent < before {
            let culled = self.state.apply_arena_bounds();
            if culled > 0 {
                tracing::info!("Arena shrunk to {}, removed {} obstacle(s)", extent, culled);
            }
        }
        tracing::debug!("Arena resized to {}", extent);
        Some(GameEvent::ArenaResized { extent })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entities::{PickUp, PickUpKind, PlayerId, PlayerInput};
    use crate::util::vec2::Vec2;
    use uuid::Uuid;

    const TICK: Duration = Duration::from_millis(100);

    fn create_loop() -> GameLoop {
        GameLoop::with_state(GameState::empty(GameConfig::default()), TICK)
    }

    fn add_player_at(game: &mut GameLoop, x: f32, z: f32) -> PlayerId {
        let id = Uuid::new_v4();
        let state = game.state_mut();
        state.add_player(id, "tank").unwrap();
        let player = state.get_player_mut(id).unwrap();
        player.position = Vec2::new(x, z);
        player.invulnerable_until = Duration::ZERO;
        id
    }

    #[test]
    fn test_tick_advances_clock() {
        let mut game = create_loop();
        game.tick(TICK);
        game.tick(TICK);
        assert_eq!(game.state().tick, 2);
        assert_eq!(game.state().now, Duration::from_millis(200));
        assert_eq!(game.performance().timing().samples, 2);
    }

    #[test]
    fn test_shot_hits_player_within_one_tick() {
        let mut game = create_loop();
        let shooter = add_player_at(&mut game, 0.0, 0.0);
        let target = add_player_at(&mut game, 0.0, -40.0);

        let fired = game.state_mut().shoot(shooter);
        assert_eq!(fired.len(), 1);

        let speed = game.state().config.projectile_speed;
        let ticks = (40.0 / speed / TICK.as_secs_f32()).ceil() as usize;
        let mut hits = 0;
        for _ in 0..ticks.max(1) {
            hits += game
                .tick(TICK)
                .iter()
                .filter(|e| matches!(e, GameEvent::PlayerHit { target_id, .. } if *target_id == target))
                .count();
        }
        assert_eq!(hits, 1);
        assert_eq!(game.state().get_player(target).unwrap().health, 75);

        // Shell retired, no second hit
        for _ in 0..10 {
            game.tick(TICK);
        }
        assert_eq!(game.state().get_player(target).unwrap().health, 75);
    }

    #[test]
    fn test_heal_pickup_scenario() {
        let mut game = create_loop();
        let id = add_player_at(&mut game, 100.0, 100.0);
        game.state_mut().get_player_mut(id).unwrap().health = 40;
        game.state_mut().pickups.insert(
            500,
            PickUp::new(500, PickUpKind::Heal, Vec2::new(110.0, 100.0), Duration::ZERO),
        );

        let events = game.tick(TICK);
        assert_eq!(game.state().get_player(id).unwrap().health, 90);
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::PickUpCollected { pickup_id: 500, .. })));
    }

    #[test]
    fn test_projectiles_expire_within_lifetime_plus_tick() {
        let mut game = create_loop();
        let shooter = add_player_at(&mut game, 0.0, 600.0);
        game.state_mut().shoot(shooter);
        let created = game.state().now;
        let lifetime = game.state().config.projectile_lifetime;

        let mut removed_at = None;
        for _ in 0..20 {
            game.tick(TICK);
            if game.state().projectiles.is_empty() {
                removed_at = Some(game.state().now);
                break;
            }
        }
        let removed_at = removed_at.expect("shell should expire");
        assert!(removed_at - created <= lifetime + TICK);
    }

    #[test]
    fn test_projectile_removed_near_arena_edge() {
        let mut game = create_loop();
        let shooter = add_player_at(&mut game, 600.0, 0.0);
        let player = game.state_mut().get_player_mut(shooter).unwrap();
        player.turret_angle = std::f32::consts::FRAC_PI_2;
        player.input.angle = std::f32::consts::FRAC_PI_2;
        game.state_mut().shoot(shooter);

        for _ in 0..5 {
            game.tick(TICK);
            let half = game.state().arena.half_extent();
            assert!(game.state().projectiles.iter().all(|p| p.position.within_square(half)));
        }
        assert!(game.state().projectiles.is_empty());
    }

    #[test]
    fn test_health_invariant_holds() {
        let mut game = create_loop();
        let shooter = add_player_at(&mut game, 0.0, 0.0);
        let target = add_player_at(&mut game, 0.0, -100.0);
        game.state_mut().get_player_mut(target).unwrap().health = 30;

        for _ in 0..40 {
            game.state_mut().shoot(shooter);
            game.tick(TICK);
            for player in game.state().players.values() {
                assert!(player.health >= 0 && player.health <= 100);
                assert_eq!(player.alive, player.health > 0);
            }
        }
        let victim = game.state().get_player(target).unwrap();
        assert!(!victim.alive);
        assert_eq!(victim.deaths, 1);
        assert_eq!(game.state().get_player(shooter).unwrap().kills, 1);
    }

    #[test]
    fn test_input_applied_before_movement() {
        let mut game = create_loop();
        let id = add_player_at(&mut game, 0.0, 0.0);
        game.input_sender()
            .try_send(
                id,
                PlayerInput {
                    right: true,
                    angle: 0.3,
                    ..Default::default()
                },
            )
            .unwrap();

        game.tick(TICK);
        let player = game.state().get_player(id).unwrap();
        assert!((player.position.x - 15.0).abs() < 1e-3);
        assert_eq!(player.turret_angle, 0.3);
    }

    #[test]
    fn test_arena_grows_with_event() {
        let mut game = create_loop();
        add_player_at(&mut game, 0.0, 0.0);

        let events = game.tick(TICK);
        assert!(events.contains(&GameEvent::ArenaResized { extent: 1510.0 }));

        let mut previous = game.state().arena.extent();
        for _ in 0..10 {
            game.tick(TICK);
            let extent = game.state().arena.extent();
            assert!(extent >= previous);
            previous = extent;
        }
        assert_eq!(previous, 1550.0);
        assert!(!game.tick(TICK).iter().any(|e| matches!(e, GameEvent::ArenaResized { .. })));
    }

    #[test]
    fn test_arena_growth_keeps_edge_player_moving() {
        let mut game = create_loop();
        let id = add_player_at(&mut game, 720.0, 0.0);
        game.input_sender()
            .try_send(id, PlayerInput { right: true, ..Default::default() })
            .unwrap();

        let mut previous = 720.0;
        for _ in 0..6 {
            game.tick(TICK);
            let x = game.state().get_player(id).unwrap().position.x;
            assert!(x >= previous, "pulled back from {} to {}", previous, x);
            previous = x;
        }
        // Clamped only by the movement margin of the grown arena
        assert_eq!(game.state().arena.extent(), 1550.0);
        assert!((previous - 745.0).abs() < 1e-3);
    }

    #[test]
    fn test_arena_shrink_clamps_players() {
        let mut game = create_loop();
        let stayer = add_player_at(&mut game, 0.0, 0.0);
        let leavers: Vec<PlayerId> = (0..10).map(|_| add_player_at(&mut game, 0.0, 0.0)).collect();
        for _ in 0..60 {
            game.tick(TICK);
        }
        assert_eq!(game.state().arena.extent(), 2050.0);

        game.state_mut().get_player_mut(stayer).unwrap().position = Vec2::new(990.0, -990.0);
        for id in leavers {
            game.state_mut().remove_player(id);
        }
        for _ in 0..60 {
            game.tick(TICK);
        }
        assert_eq!(game.state().arena.extent(), 1550.0);
        let p = game.state().get_player(stayer).unwrap().position;
        assert!(p.within_square(1550.0 / 2.0 - 30.0));
    }

    #[test]
    fn test_missing_player_is_skipped() {
        let mut game = create_loop();
        let shooter = add_player_at(&mut game, 0.0, 0.0);
        let target = add_player_at(&mut game, 0.0, -40.0);
        game.state_mut().shoot(shooter);
        game.state_mut().remove_player(shooter);

        // Shell still flies and hits; killer credit goes nowhere
        game.tick(TICK);
        assert_eq!(game.state().get_player(target).unwrap().health, 75);
    }
}
