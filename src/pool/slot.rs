//! Pooled connection slot bookkeeping (§3 Pooled Connection Slot).

use std::time::{Duration, Instant};

use crate::connection::Connection;

/// Identifies a slot across the active array and the parked deque. Slots are
/// moved between the two (swap-with-last on removal, see §4.4.3/§4.4.5), so
/// this is a stable id rather than an array index — the array index is a
/// transient property tracked separately as [`PooledConnectionSlot::index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotId(pub(crate) u64);

/// Wraps a [`Connection`] with the pool's bookkeeping (§3).
pub(crate) struct PooledConnectionSlot {
    pub(crate) id: SlotId,
    pub(crate) connection: Connection,
    /// Index in the active array, or `-1` if parked/removed.
    pub(crate) index: isize,
    pub(crate) parked: bool,
    pub(crate) removed: bool,
    /// `None` disables keepalive eviction for this slot.
    pub(crate) expires_at: Option<Instant>,
    pub(crate) allocated: u32,
    pub(crate) capacity: u32,
}

impl PooledConnectionSlot {
    pub(crate) fn new(id: SlotId, connection: Connection, capacity: u32) -> Self {
        PooledConnectionSlot {
            id,
            connection,
            index: -1,
            parked: false,
            removed: false,
            expires_at: None,
            allocated: 0,
            capacity,
        }
    }

    /// `min(allocated, capacity) / capacity` (§3, GLOSSARY). A slot with zero
    /// capacity (settings shrank to 0, or `capacity` not yet established) has
    /// a load factor of `1.0`, i.e. it looks fully loaded rather than
    /// dividing by zero.
    pub(crate) fn load_factor(&self) -> f64 {
        if self.capacity == 0 {
            return 1.0;
        }
        f64::from(self.allocated.min(self.capacity)) / f64::from(self.capacity)
    }

    /// §4.4.3 step 1: `isExpired ⇔ keepAliveTimeout set ∧ allocated == 0 ∧
    /// now > expirationTime`.
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.allocated == 0 && self.expires_at.is_some_and(|exp| now > exp)
    }

    /// Refresh the expiration window after a recycle (§4.4.5 `recycle`:
    /// `slot.touch()`).
    pub(crate) fn touch(&mut self, keep_alive_timeout: Option<Duration>, now: Instant) {
        self.expires_at = keep_alive_timeout.map(|d| now + d);
    }

    pub(crate) fn has_spare_capacity(&self) -> bool {
        self.allocated < self.capacity
    }
}
