//! Player slot table shared between network tasks and the game loop
//!
//! This module owns every piece of live input state:
//! - Fixed-size slot roster, one entry per player index
//! - Slot reservation keyed by device identity (reconnection support)
//! - Lease tickets that fence writes from connections that lost their slot
//! - The global pause flag raised by any connected device
//!
//! All slot access goes through one mutex that is only ever held for
//! in-memory work, never across I/O, so readers on the game loop never wait
//! on the network.

use log::info;
use shared::Direction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// State of one player position
///
/// An empty `identity` means the slot is free. The identity is set when a
/// connection reserves the slot and `connected` follows once its decoder
/// starts running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Slot {
    /// Transport-level peer identifier, empty when unoccupied
    pub identity: String,
    pub connected: bool,
    pub direction: Direction,
    pub action_pressed: bool,
    /// Ticket of the lease that currently owns the slot, 0 when unowned
    ticket: u64,
    /// Ticket of a takeover waiting for its decoder to start, 0 when none
    pending: u64,
}

impl Slot {
    pub fn is_free(&self) -> bool {
        self.identity.is_empty()
    }

    fn reset_input(&mut self) {
        self.direction = Direction::None;
        self.action_pressed = false;
    }
}

/// Proof of ownership over one slot
///
/// Every reservation hands out a fresh ticket. Writes carrying a ticket that
/// no longer matches the slot are refused, so a connection whose slot was
/// taken over or reset can never clobber the new owner's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub index: usize,
    ticket: u64,
}

struct TableInner {
    slots: Vec<Slot>,
    next_ticket: u64,
}

impl TableInner {
    fn next_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    fn find(&self, identity: &str) -> Option<usize> {
        if identity.is_empty() {
            return None;
        }
        self.slots.iter().position(|slot| slot.identity == identity)
    }

    fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(Slot::is_free)
    }

    fn issue(&mut self, index: usize, identity: &str) -> Lease {
        let ticket = self.next_ticket();
        let slot = &mut self.slots[index];
        slot.identity = identity.to_string();
        slot.ticket = ticket;
        slot.pending = 0;
        Lease { index, ticket }
    }

    /// Queues a takeover; the current owner keeps the slot until it commits
    fn issue_pending(&mut self, index: usize) -> Lease {
        let ticket = self.next_ticket();
        self.slots[index].pending = ticket;
        Lease { index, ticket }
    }

    fn owned_mut(&mut self, lease: Lease) -> Option<&mut Slot> {
        self.slots
            .get_mut(lease.index)
            .filter(|slot| slot.ticket == lease.ticket)
    }
}

/// Thread-safe fixed-size table of player slots
pub struct SlotTable {
    inner: Mutex<TableInner>,
    paused: AtomicBool,
}

impl SlotTable {
    /// Creates a table with `player_count` free slots
    pub fn new(player_count: usize) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                slots: vec![Slot::default(); player_count],
                next_ticket: 1,
            }),
            paused: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableInner> {
        // Slot state stays valid even if a holder panicked mid-read.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Discards every slot and resizes the table to `player_count`
    ///
    /// Outstanding leases are invalidated: tickets are never reused, so
    /// writes from connections of a previous run are ignored.
    pub fn reset(&self, player_count: usize) {
        let mut inner = self.lock();
        inner.slots = vec![Slot::default(); player_count];
    }

    /// Number of slots, free or not
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    /// Finds the slot reserved by `identity`
    pub fn find_by_identity(&self, identity: &str) -> Option<usize> {
        self.lock().find(identity)
    }

    /// Reserves the first free slot for `identity`
    ///
    /// The emptiness check and the reservation happen under the same lock,
    /// so two connections can never claim the same slot.
    pub fn reserve_first_empty(&self, identity: &str) -> Option<Lease> {
        let mut inner = self.lock();
        let index = inner.first_free()?;
        Some(inner.issue(index, identity))
    }

    /// Assigns a slot to a newly accepted connection
    ///
    /// A device whose identity already holds a slot gets a pending takeover
    /// lease on that slot. The previous owner keeps the slot until the new
    /// lease is activated, so a takeover whose handshake fails leaves it
    /// untouched. Otherwise the first free slot is reserved. Returns `None`
    /// when every slot is occupied.
    pub fn assign(&self, identity: &str) -> Option<Lease> {
        let mut inner = self.lock();

        if let Some(index) = inner.find(identity) {
            info!("Player {} reclaim requested by {}", index + 1, identity);
            return Some(inner.issue_pending(index));
        }

        let index = inner.first_free()?;
        info!("Player {} reserved for {}", index + 1, identity);
        Some(inner.issue(index, identity))
    }

    /// Marks the leased slot connected with neutral input
    ///
    /// Activating a pending takeover lease commits it, which fences off the
    /// previous owner. Returns false if the lease is no longer valid.
    pub fn activate(&self, lease: Lease) -> bool {
        let mut inner = self.lock();
        let Some(slot) = inner.slots.get_mut(lease.index) else {
            return false;
        };
        if slot.pending != 0 && slot.pending == lease.ticket {
            slot.ticket = slot.pending;
            slot.pending = 0;
        } else if slot.ticket != lease.ticket {
            return false;
        }
        slot.reset_input();
        slot.connected = true;
        true
    }

    /// Records the latest direction; false if the lease lost the slot
    pub fn set_direction(&self, lease: Lease, direction: Direction) -> bool {
        let mut inner = self.lock();
        match inner.owned_mut(lease) {
            Some(slot) => {
                slot.direction = direction;
                true
            }
            None => false,
        }
    }

    /// Records the action button state; false if the lease lost the slot
    pub fn set_action_pressed(&self, lease: Lease, pressed: bool) -> bool {
        let mut inner = self.lock();
        match inner.owned_mut(lease) {
            Some(slot) => {
                slot.action_pressed = pressed;
                true
            }
            None => false,
        }
    }

    /// Raises the pause flag on behalf of a leased slot
    pub fn pause(&self, lease: Lease) -> bool {
        let inner = self.lock();
        let owned = inner
            .slots
            .get(lease.index)
            .is_some_and(|slot| slot.ticket == lease.ticket);
        if owned {
            self.paused.store(true, Ordering::SeqCst);
        }
        owned
    }

    /// Returns the leased slot to the free pool
    ///
    /// Clears identity, connectivity and input. When a takeover is pending
    /// the slot passes to it instead, still reserved for the same identity.
    /// Releasing a pending lease only withdraws the takeover. Returns false
    /// without touching anything when the lease is stale, which happens
    /// after a takeover or a table reset.
    pub fn release(&self, lease: Lease) -> bool {
        let mut inner = self.lock();
        let Some(slot) = inner.slots.get_mut(lease.index) else {
            return false;
        };
        if slot.pending != 0 && slot.pending == lease.ticket {
            slot.pending = 0;
            return true;
        }
        if slot.ticket != lease.ticket {
            return false;
        }
        if slot.pending != 0 {
            slot.ticket = slot.pending;
            slot.pending = 0;
            slot.connected = false;
            slot.reset_input();
        } else {
            *slot = Slot::default();
        }
        true
    }

    /// Counts slots matching `predicate`
    pub fn count_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&Slot) -> bool,
    {
        self.lock().slots.iter().filter(|&slot| predicate(slot)).count()
    }

    pub fn connected_count(&self) -> usize {
        self.count_where(|slot| slot.connected)
    }

    /// Returns a copy of one slot
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the table.
    pub fn slot(&self, index: usize) -> Slot {
        let inner = self.lock();
        assert!(
            index < inner.slots.len(),
            "player index {} out of range for {} slots",
            index,
            inner.slots.len()
        );
        inner.slots[index].clone()
    }

    /// Returns a copy of every slot
    pub fn snapshot(&self) -> Vec<Slot> {
        self.lock().slots.clone()
    }

    /// True once any leased connection has requested a pause
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Lowers the pause flag; connections never do this themselves
    pub fn clear_paused(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for SlotTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotTable")
            .field("slots", &self.snapshot())
            .field("paused", &self.is_paused())
            .finish()
    }
}
