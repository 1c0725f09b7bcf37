//! Simulation state
//!
//! Owns every entity collection, the gameplay configuration, ID
//! allocation, spawn placement and snapshot generation.

use std::time::Duration;

use hashbrown::HashMap;
use rand::Rng;
use thiserror::Error;

use crate::config::GameConfig;
use crate::game::entities::{
    EntityId, Obstacle, PickUp, PickUpKind, Player, PlayerId, PlayerInput, Projectile,
};
use crate::game::constants::player::{COLORS, DEFAULT_NAME, MAX_NAME_LENGTH};
use crate::game::systems::arena::ArenaController;
use crate::game::systems::projectile;
use crate::net::aoi::AoiFilter;
use crate::net::protocol::GameSnapshot;
use crate::util::vec2::Vec2;

/// Join rejected without touching the state
#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("server full ({max_players} players)")]
    ServerFull { max_players: usize },
    #[error("player {0} already joined")]
    AlreadyJoined(PlayerId),
}

/// Trim, strip markup and control characters, cap the length.
/// Falls back to the default name when nothing is left.
pub fn sanitize_name(raw: &str) -> String {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | '&'))
        .take(MAX_NAME_LENGTH)
        .collect();
    let name = name.trim();
    if name.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        name.to_string()
    }
}

/// Complete game state
#[derive(Debug)]
pub struct GameState {
    pub tick: u64,
    /// Simulation time since world creation
    pub now: Duration,
    pub config: GameConfig,
    pub arena: ArenaController,
    pub players: HashMap<PlayerId, Player>,
    pub projectiles: Vec<Projectile>,
    pub pickups: HashMap<EntityId, PickUp>,
    pub obstacles: HashMap<EntityId, Obstacle>,
    pub(crate) last_pickup_spawn: Duration,
    pub(crate) last_obstacle_spawn: Duration,
    next_entity_id: EntityId,
    next_color: usize,
}

impl GameState {
    /// Fresh world with the initial obstacle field
    pub fn new(config: GameConfig) -> Self {
        let mut state = Self::empty(config);
        for _ in 0..state.config.initial_obstacles {
            state.spawn_obstacle();
        }
        state
    }

    /// World without any obstacles
    pub fn empty(config: GameConfig) -> Self {
        Self {
            tick: 0,
            now: Duration::ZERO,
            arena: ArenaController::new(config.arena.clone()),
            config,
            players: HashMap::new(),
            projectiles: Vec::new(),
            pickups: HashMap::new(),
            obstacles: HashMap::new(),
            last_pickup_spawn: Duration::ZERO,
            last_obstacle_spawn: Duration::ZERO,
            next_entity_id: 1,
            next_color: 0,
        }
    }

    /// Generate a new unique entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.alive)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.max_players
    }

    /// Spawn a player at a clear point with temporary invulnerability
    pub fn add_player(&mut self, id: PlayerId, nickname: &str) -> Result<&Player, JoinError> {
        if self.players.contains_key(&id) {
            return Err(JoinError::AlreadyJoined(id));
        }
        if self.is_full() {
            return Err(JoinError::ServerFull {
                max_players: self.config.max_players,
            });
        }

        let color = COLORS[self.next_color % COLORS.len()];
        self.next_color = self.next_color.wrapping_add(1);
        let position = self.clear_spawn_position(&mut rand::thread_rng());
        let player = Player::new(
            id,
            sanitize_name(nickname),
            color,
            position,
            self.now,
            &self.config,
        );
        Ok(self.players.entry(id).or_insert(player))
    }

    /// Remove a player; unknown ids are a no-op
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.players.remove(&id)
    }

    /// Store the latest input; unknown ids are a no-op
    pub fn set_input(&mut self, id: PlayerId, input: PlayerInput) -> bool {
        match self.players.get_mut(&id) {
            Some(player) => {
                player.input = input;
                true
            }
            None => false,
        }
    }

    /// Fire for `id` subject to cooldown. Returns the shells created.
    pub fn shoot(&mut self, id: PlayerId) -> Vec<Projectile> {
        projectile::fire(self, id)
    }

    /// Respawn a dead player. Living or unknown players are ignored.
    pub fn respawn(&mut self, id: PlayerId) -> Option<&Player> {
        if !self.players.get(&id).is_some_and(|p| !p.alive) {
            return None;
        }
        let position = self.clear_spawn_position(&mut rand::thread_rng());
        let now = self.now;
        let player = self.players.get_mut(&id)?;
        player.respawn(position, now, &self.config);
        Some(&*player)
    }

    /// Uniform random point inside the arena, away from the edge
    pub fn random_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        let half = (self.arena.half_extent() - self.config.spawn_margin).max(0.0);
        if half == 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new(rng.gen_range(-half..=half), rng.gen_range(-half..=half))
    }

    /// Random point not overlapping an obstacle or another living tank.
    /// Gives up after the configured number of attempts and returns the last try.
    pub fn clear_spawn_position<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        let mut candidate = self.random_position(rng);
        for _ in 0..self.config.spawn_attempts {
            if self.is_clear(candidate) {
                return candidate;
            }
            candidate = self.random_position(rng);
        }
        candidate
    }

    fn is_clear(&self, position: Vec2) -> bool {
        let half = self.config.player_half_size;
        let blocked_by_obstacle = self.obstacles.values().any(|o| {
            let extents = o.half_extents();
            (position.x - o.position.x).abs() < half + extents.x
                && (position.z - o.position.z).abs() < half + extents.z
        });
        let blocked_by_player = self.alive_players().any(|p| {
            (position.x - p.position.x).abs() < half * 2.0
                && (position.z - p.position.z).abs() < half * 2.0
        });
        !blocked_by_obstacle && !blocked_by_player
    }

    pub fn spawn_pickup(&mut self) -> EntityId {
        let mut rng = rand::thread_rng();
        let id = self.next_entity_id();
        let position = self.random_position(&mut rng);
        let kind = PickUpKind::random(&mut rng);
        self.pickups.insert(id, PickUp::new(id, kind, position, self.now));
        id
    }

    pub fn spawn_obstacle(&mut self) -> EntityId {
        let mut rng = rand::thread_rng();
        let id = self.next_entity_id();
        let position = self.random_position(&mut rng);
        let obstacle = Obstacle::random(id, position, &mut rng, &self.config);
        self.obstacles.insert(id, obstacle);
        id
    }

    /// Pull entities inside the published arena after it shrinks. Players and
    /// pick-ups are clamped; obstacles left outside are destroyed.
    pub fn apply_arena_bounds(&mut self) -> usize {
        let half = (self.arena.half_extent() - self.config.shrink_margin).max(0.0);
        for player in self.players.values_mut() {
            player.position = player.position.clamp_to_square(half);
        }
        for pickup in self.pickups.values_mut() {
            pickup.position = pickup.position.clamp_to_square(half);
        }
        let before = self.obstacles.len();
        self.obstacles.retain(|_, o| o.position.within_square(half));
        before - self.obstacles.len()
    }

    /// Every entity, for newly connected viewers
    pub fn full_snapshot(&self) -> GameSnapshot {
        GameSnapshot::from_game_state(self)
    }

    /// Snapshot filtered to the area around `viewer`
    pub fn snapshot_for(&self, viewer: PlayerId) -> GameSnapshot {
        AoiFilter::new(self.config.aoi_radius).snapshot_for(self, viewer)
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn small_config(max_players: usize) -> GameConfig {
        GameConfig {
            max_players,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_world_has_initial_obstacles() {
        let state = GameState::new(GameConfig::default());
        assert_eq!(state.obstacles.len(), 20);
        assert!(state.players.is_empty());
        let half = state.arena.half_extent() - state.config.spawn_margin;
        for obstacle in state.obstacles.values() {
            assert!(obstacle.position.within_square(half));
        }
    }

    #[test]
    fn test_entity_ids_are_unique() {
        let mut state = GameState::empty(GameConfig::default());
        let a = state.next_entity_id();
        let b = state.spawn_pickup();
        let c = state.spawn_obstacle();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_add_player() {
        let mut state = GameState::new(GameConfig::default());
        let id = Uuid::new_v4();
        let player = state.add_player(id, "  Ace  ").unwrap();
        assert_eq!(player.name, "Ace");
        assert_eq!(player.color, COLORS[0]);
        assert!(player.is_invulnerable(Duration::ZERO));
        assert_eq!(state.player_count(), 1);
    }

    #[test]
    fn test_colors_round_robin() {
        let mut state = GameState::empty(GameConfig::default());
        let colors: Vec<u32> = (0..11)
            .map(|_| state.add_player(Uuid::new_v4(), "p").unwrap().color)
            .collect();
        assert_eq!(colors[1], COLORS[1]);
        assert_eq!(colors[10], COLORS[0]);
    }

    #[test]
    fn test_join_rejected_at_capacity() {
        let mut state = GameState::empty(small_config(2));
        state.add_player(Uuid::new_v4(), "a").unwrap();
        state.add_player(Uuid::new_v4(), "b").unwrap();

        let err = state.add_player(Uuid::new_v4(), "c").unwrap_err();
        assert_eq!(err, JoinError::ServerFull { max_players: 2 });
        assert_eq!(state.player_count(), 2);
    }

    #[test]
    fn test_join_twice_rejected() {
        let mut state = GameState::empty(GameConfig::default());
        let id = Uuid::new_v4();
        state.add_player(id, "a").unwrap();
        assert_eq!(state.add_player(id, "a").unwrap_err(), JoinError::AlreadyJoined(id));
    }

    #[test]
    fn test_unknown_player_operations_are_noops() {
        let mut state = GameState::new(GameConfig::default());
        let ghost = Uuid::new_v4();
        assert!(!state.set_input(ghost, PlayerInput::default()));
        assert!(state.shoot(ghost).is_empty());
        assert!(state.respawn(ghost).is_none());
        assert!(state.remove_player(ghost).is_none());
    }

    #[test]
    fn test_respawn_only_when_dead() {
        let mut state = GameState::empty(GameConfig::default());
        let id = Uuid::new_v4();
        state.add_player(id, "a").unwrap();
        assert!(state.respawn(id).is_none());

        state.get_player_mut(id).unwrap().apply_damage(1000);
        state.now = Duration::from_secs(10);
        let player = state.respawn(id).unwrap();
        assert!(player.alive);
        assert_eq!(player.health, 100);
        assert!(player.is_invulnerable(Duration::from_secs(10)));
        assert!(!player.can_shoot(Duration::from_secs(11)));
    }

    #[test]
    fn test_clear_spawn_avoids_obstacles() {
        let mut state = GameState::empty(GameConfig::default());
        // Obstacle covering the middle of the arena
        state.obstacles.insert(
            1,
            Obstacle {
                id: 1,
                position: Vec2::ZERO,
                width: 800.0,
                height: 40.0,
                depth: 800.0,
                health: 75,
            },
        );
        let mut rng = rand::thread_rng();
        let mut clear = 0;
        for _ in 0..50 {
            let p = state.clear_spawn_position(&mut rng);
            if p.x.abs() >= 425.0 || p.z.abs() >= 425.0 {
                clear += 1;
            }
        }
        // Each attempt has roughly a 57% chance of landing clear
        assert!(clear >= 45);
    }

    #[test]
    fn test_apply_arena_bounds_clamps_and_culls() {
        let mut state = GameState::empty(GameConfig::default());
        let id = Uuid::new_v4();
        state.add_player(id, "a").unwrap();
        state.get_player_mut(id).unwrap().position = Vec2::new(5000.0, -5000.0);
        state.obstacles.insert(
            99,
            Obstacle {
                id: 99,
                position: Vec2::new(740.0, 0.0),
                width: 40.0,
                height: 40.0,
                depth: 40.0,
                health: 75,
            },
        );

        let culled = state.apply_arena_bounds();
        assert_eq!(culled, 1);
        assert_eq!(
            state.get_player(id).unwrap().position,
            Vec2::new(700.0, -700.0)
        );
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  Bob  "), "Bob");
        assert_eq!(sanitize_name("<script>"), "script");
        assert_eq!(sanitize_name("a\u{7}b&c"), "abc");
        assert_eq!(sanitize_name("   "), "Player");
        assert_eq!(sanitize_name("abcdefghijklmnopqrstuvwxyz"), "abcdefghijklmnop");
    }
}
