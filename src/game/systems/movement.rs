//! Tank movement from buffered input

use crate::game::state::GameState;

/// Apply the latest input of every living tank.
///
/// Turret follows the aim angle directly. The body turns to the movement
/// heading only while moving. Positions are clamped to the arena half
/// extent minus the movement margin.
pub fn update(state: &mut GameState, dt: f32) {
    let now = state.now;
    let half = (state.arena.half_extent() - state.config.movement_margin).max(0.0);
    let base_speed = state.config.player_speed;
    let boost = state.config.speed_boost_multiplier;

    for player in state.players.values_mut() {
        if !player.alive {
            continue;
        }
        player.clear_expired_powerups(now);

        let speed = if player.has_speed(now) {
            base_speed * boost
        } else {
            base_speed
        };

        let direction = player.input.movement();
        if direction.length_sq() > 0.0 {
            player.position += direction * speed * dt;
            player.body_angle = direction.heading();
        }
        player.position = player.position.clamp_to_square(half);

        if player.input.angle.is_finite() {
            player.turret_angle = player.input.angle;
        }
    }
}

/// Largest distance any tank can cover in one step of `dt`
pub fn max_step(state: &GameState, dt: f32) -> f32 {
    state.config.player_speed * state.config.speed_boost_multiplier.max(1.0) * dt.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::entities::{PickUpKind, PlayerId, PlayerInput};
    use crate::util::vec2::Vec2;
    use std::f32::consts::PI;
    use std::time::Duration;

    fn create_test_state() -> (GameState, PlayerId) {
        let mut state = GameState::empty(GameConfig::default());
        let id = uuid::Uuid::new_v4();
        state.add_player(id, "Driver").unwrap();
        state.get_player_mut(id).unwrap().position = Vec2::ZERO;
        (state, id)
    }

    #[test]
    fn test_moves_up() {
        let (mut state, id) = create_test_state();
        state.set_input(
            id,
            PlayerInput {
                up: true,
                ..Default::default()
            },
        );
        update(&mut state, 0.1);

        let player = state.get_player(id).unwrap();
        assert!((player.position.z + 15.0).abs() < 1e-4);
        assert!(player.body_angle.abs() < 1e-6);
    }

    #[test]
    fn test_diagonal_speed_is_normalized() {
        let (mut state, id) = create_test_state();
        state.set_input(
            id,
            PlayerInput {
                down: true,
                right: true,
                ..Default::default()
            },
        );
        update(&mut state, 0.1);

        let player = state.get_player(id).unwrap();
        assert!((player.position.length() - 15.0).abs() < 1e-3);
        assert!((player.body_angle - 3.0 * PI / 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_body_angle_kept_when_idle() {
        let (mut state, id) = create_test_state();
        state.get_player_mut(id).unwrap().body_angle = 1.0;
        state.set_input(
            id,
            PlayerInput {
                angle: -2.0,
                ..Default::default()
            },
        );
        update(&mut state, 0.1);

        let player = state.get_player(id).unwrap();
        assert_eq!(player.body_angle, 1.0);
        assert_eq!(player.turret_angle, -2.0);
        assert_eq!(player.position, Vec2::ZERO);
    }

    #[test]
    fn test_speed_boost() {
        let (mut state, id) = create_test_state();
        let config = state.config.clone();
        let player = state.get_player_mut(id).unwrap();
        player.apply_pickup(PickUpKind::Speed, Duration::ZERO, &config);
        player.input.left = true;
        update(&mut state, 0.1);
        assert!((state.get_player(id).unwrap().position.x + 22.5).abs() < 1e-3);

        // Boost expired: flag cleared, base speed again
        state.now = Duration::from_millis(8000);
        update(&mut state, 0.1);
        let player = state.get_player(id).unwrap();
        assert!((player.position.x + 37.5).abs() < 1e-3);
        assert_eq!(player.speed_until, None);
    }

    #[test]
    fn test_clamped_to_arena() {
        let (mut state, id) = create_test_state();
        let player = state.get_player_mut(id).unwrap();
        player.position = Vec2::new(715.0, 0.0);
        player.input.right = true;
        update(&mut state, 1.0);
        assert_eq!(state.get_player(id).unwrap().position.x, 720.0);
    }

    #[test]
    fn test_dead_players_do_not_move() {
        let (mut state, id) = create_test_state();
        let player = state.get_player_mut(id).unwrap();
        player.apply_damage(500);
        player.input.up = true;
        update(&mut state, 0.1);
        assert_eq!(state.get_player(id).unwrap().position, Vec2::ZERO);
    }

    #[test]
    fn test_max_step() {
        let (state, _) = create_test_state();
        assert!((max_step(&state, 0.1) - 22.5).abs() < 1e-4);
    }
}
