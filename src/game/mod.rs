pub mod constants;
pub mod entities;
pub mod game_loop;
pub mod input_buffer;
pub mod performance;
pub mod spatial;
pub mod state;
pub mod systems;
