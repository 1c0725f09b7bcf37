pub mod arena;
pub mod collision;
pub mod movement;
pub mod projectile;
pub mod spawning;
