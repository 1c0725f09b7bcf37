//! Shell firing and flight

use smallvec::{smallvec, SmallVec};

use crate::game::entities::{PlayerId, Projectile};
use crate::game::state::GameState;
use crate::util::vec2::Vec2;

/// Fire from `player_id` along its turret heading.
///
/// Returns the shells created: empty when the player is unknown, dead, or
/// still cooling down; three while spread fire is active, otherwise one.
pub fn fire(state: &mut GameState, player_id: PlayerId) -> Vec<Projectile> {
    let now = state.now;
    let cooldown = state.config.shoot_cooldown;
    let (origin, heading, spread) = {
        let Some(player) = state.get_player_mut(player_id) else {
            return Vec::new();
        };
        if !player.can_shoot(now) {
            return Vec::new();
        }
        player.shoot_ready_at = now + cooldown;
        (player.position, player.turret_angle, player.has_spread(now))
    };

    let offset = state.config.spread_offset;
    let headings: SmallVec<[f32; 3]> = if spread {
        smallvec![heading - offset, heading, heading + offset]
    } else {
        smallvec![heading]
    };

    let muzzle = origin + Vec2::from_heading(heading) * state.config.barrel_length;
    let mut fired = Vec::with_capacity(headings.len());
    for angle in headings {
        let id = state.next_entity_id();
        let shell = Projectile::new(
            id,
            player_id,
            muzzle,
            angle,
            state.config.projectile_speed,
            state.config.projectile_damage,
            now,
        );
        state.projectiles.push(shell.clone());
        fired.push(shell);
    }

    tracing::debug!("Player {} fired {} shell(s)", player_id, fired.len());
    fired
}

/// Move shells and drop those past their lifetime or outside the arena.
/// Returns how many were removed.
pub fn advance(state: &mut GameState, dt: f32) -> usize {
    let now = state.now;
    let lifetime = state.config.projectile_lifetime;
    let half = state.arena.half_extent();
    let before = state.projectiles.len();

    state.projectiles.retain_mut(|shell| {
        shell.advance(dt);
        shell.age(now) <= lifetime && shell.position.within_square(half)
    });

    before - state.projectiles.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::entities::PickUpKind;
    use std::time::Duration;

    fn create_test_state() -> (GameState, PlayerId) {
        let mut state = GameState::empty(GameConfig::default());
        let id = uuid::Uuid::new_v4();
        state.add_player(id, "Gunner").unwrap();
        state.get_player_mut(id).unwrap().position = Vec2::ZERO;
        (state, id)
    }

    #[test]
    fn test_fire_spawns_at_barrel() {
        let (mut state, id) = create_test_state();
        let shells = fire(&mut state, id);
        assert_eq!(shells.len(), 1);
        assert_eq!(state.projectiles.len(), 1);

        let shell = &shells[0];
        assert_eq!(shell.owner_id, id);
        assert!(shell.position.x.abs() < 1e-4);
        assert!((shell.position.z + 35.0).abs() < 1e-4);
        assert!((shell.velocity.z + 400.0).abs() < 1e-3);
        assert_eq!(shell.damage, 25);
    }

    #[test]
    fn test_fire_respects_cooldown() {
        let (mut state, id) = create_test_state();
        assert_eq!(fire(&mut state, id).len(), 1);
        assert!(fire(&mut state, id).is_empty());

        state.now = Duration::from_millis(999);
        assert!(fire(&mut state, id).is_empty());

        state.now = Duration::from_millis(1000);
        assert_eq!(fire(&mut state, id).len(), 1);
    }

    #[test]
    fn test_fire_with_spread() {
        let (mut state, id) = create_test_state();
        let config = state.config.clone();
        state
            .get_player_mut(id)
            .unwrap()
            .apply_pickup(PickUpKind::Spread, Duration::ZERO, &config);

        let shells = fire(&mut state, id);
        assert_eq!(shells.len(), 3);
        let angles: Vec<f32> = shells.iter().map(|s| s.angle).collect();
        assert!((angles[0] + 0.2).abs() < 1e-6);
        assert_eq!(angles[1], 0.0);
        assert!((angles[2] - 0.2).abs() < 1e-6);

        // Distinct ids, shared muzzle
        assert_ne!(shells[0].id, shells[1].id);
        assert_eq!(shells[0].position, shells[2].position);
    }

    #[test]
    fn test_dead_player_cannot_fire() {
        let (mut state, id) = create_test_state();
        state.get_player_mut(id).unwrap().apply_damage(500);
        assert!(fire(&mut state, id).is_empty());
        assert!(state.projectiles.is_empty());
    }

    #[test]
    fn test_advance_moves_and_expires() {
        let (mut state, id) = create_test_state();
        fire(&mut state, id);

        state.now = Duration::from_millis(100);
        assert_eq!(advance(&mut state, 0.1), 0);
        assert!((state.projectiles[0].position.z + 75.0).abs() < 1e-3);
        assert!((state.projectiles[0].previous_position.z + 35.0).abs() < 1e-3);

        state.now = Duration::from_millis(751);
        assert_eq!(advance(&mut state, 0.0), 1);
        assert!(state.projectiles.is_empty());
    }

    #[test]
    fn test_advance_removes_out_of_bounds() {
        let (mut state, id) = create_test_state();
        state.get_player_mut(id).unwrap().position = Vec2::new(0.0, -740.0);
        fire(&mut state, id);

        assert_eq!(advance(&mut state, 0.1), 1);
        assert!(state.projectiles.is_empty());
    }
}
