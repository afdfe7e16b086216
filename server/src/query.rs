//! Read-only input queries for the game loop
//!
//! Every query takes the slot table lock for a brief in-memory read and never
//! blocks on the network. Player indices are zero-based; an index outside
//! the configured player count is a programming error and panics.
//!
//! A restart may change the player count under a live handle. Consumers that
//! walk every player should read [`InputQuery::inputs`], which sizes and
//! fills the list under a single lock, instead of pairing `player_count`
//! with per-index calls.

use crate::slot_table::SlotTable;
use shared::Direction;
use std::sync::Arc;

/// Input of one player as seen by the game loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerInput {
    pub direction: Direction,
    pub action_pressed: bool,
}

/// Cheap, cloneable view of the live input state
///
/// The handle stays valid across server restarts, but the player count it
/// reports follows the most recent `start`.
#[derive(Debug, Clone)]
pub struct InputQuery {
    table: Arc<SlotTable>,
}

impl InputQuery {
    pub(crate) fn new(table: Arc<SlotTable>) -> Self {
        Self { table }
    }

    /// Number of devices currently connected, in `[0, player_count]`
    pub fn connected_count(&self) -> usize {
        self.table.connected_count()
    }

    /// True once any device has sent a pause request
    pub fn paused(&self) -> bool {
        self.table.is_paused()
    }

    /// Lowers the pause flag once the game has handled it
    pub fn clear_paused_status(&self) {
        self.table.clear_paused();
    }

    /// Current direction held by `player`, `None` when the slot is empty
    pub fn direction(&self, player: usize) -> Direction {
        let slot = self.table.slot(player);
        if slot.connected {
            slot.direction
        } else {
            Direction::None
        }
    }

    /// True while `player` holds the action button
    pub fn action_pressed(&self, player: usize) -> bool {
        let slot = self.table.slot(player);
        slot.connected && slot.action_pressed
    }

    pub fn player_count(&self) -> usize {
        self.table.len()
    }

    /// Input of every player from one consistent read, empty slots neutral
    pub fn inputs(&self) -> Vec<PlayerInput> {
        self.table
            .snapshot()
            .into_iter()
            .map(|slot| {
                if slot.connected {
                    PlayerInput {
                        direction: slot.direction,
                        action_pressed: slot.action_pressed,
                    }
                } else {
                    PlayerInput::default()
                }
            })
            .collect()
    }
}
