//! Latest-wins movement input delivery
//!
//! Connection handlers push inputs into a bounded crossbeam channel
//! without touching the simulation. The game loop drains it once per tick
//! and keeps only the newest input per player. When the channel is full
//! new inputs are dropped; the player's previous input stays in effect.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use hashbrown::HashMap;

use crate::game::constants::net::INPUT_QUEUE_CAPACITY;
use crate::game::entities::{PlayerId, PlayerInput};
use crate::game::state::GameState;

/// Input message from a player connection
#[derive(Debug, Clone)]
pub struct InputMessage {
    pub player_id: PlayerId,
    pub input: PlayerInput,
}

/// Bounded MPSC queue between connections and the game loop
pub struct InputBuffer {
    sender: Sender<InputMessage>,
    receiver: Receiver<InputMessage>,
    capacity: usize,
}

impl InputBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Create a new sender handle for a connection
    pub fn sender(&self) -> InputSender {
        InputSender {
            sender: self.sender.clone(),
        }
    }

    /// Newest pending input per player, emptying the queue
    pub fn drain_latest(&self) -> HashMap<PlayerId, PlayerInput> {
        let mut latest = HashMap::new();
        for message in self.receiver.try_iter() {
            latest.insert(message.player_id, message.input);
        }
        latest
    }

    /// Drain and store inputs on their players. Inputs for players that
    /// are gone are discarded. Returns how many players were updated.
    pub fn apply_to(&self, state: &mut GameState) -> usize {
        let mut applied = 0;
        for (player_id, input) in self.drain_latest() {
            if state.set_input(player_id, input) {
                applied += 1;
            }
        }
        applied
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InputBuffer {
    fn default() -> Self {
        Self::new(INPUT_QUEUE_CAPACITY)
    }
}

/// Clonable sender handle for connection handlers
#[derive(Clone)]
pub struct InputSender {
    sender: Sender<InputMessage>,
}

impl InputSender {
    /// Submit an input without blocking
    #[inline]
    pub fn try_send(&self, player_id: PlayerId, input: PlayerInput) -> Result<(), InputBufferError> {
        self.sender
            .try_send(InputMessage { player_id, input })
            .map_err(|e| match e {
                TrySendError::Full(_) => InputBufferError::Full,
                TrySendError::Disconnected(_) => InputBufferError::Disconnected,
            })
    }
}

/// Input buffer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InputBufferError {
    #[error("input queue full")]
    Full,
    #[error("input queue closed")]
    Disconnected,
}
