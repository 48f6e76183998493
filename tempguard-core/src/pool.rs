//! Bounded Pool of Reusable Report Slots
//!
//! ## Overview
//!
//! All storage for in-flight anomaly reports is allocated once, when the pool
//! is created. Producers borrow a [`Slot`], fill it and hand it on; whoever
//! holds the slot last gives it back simply by dropping it. The pool is the
//! single scarce resource in the node: with `N` slots there are never more
//! than `N` reports in flight, whatever the input rate.
//!
//! ```text
//!   SlotPool (N boxes)          receiver            channel            sender
//!   ┌───┬───┬───┬───┐  try_borrow  ┌──────┐  put  ┌───────┐  get  ┌──────┐
//!   │ ▢ │ ▢ │ ▢ │ ▢ │ ───────────▶ │ Slot │ ────▶ │ Slot… │ ────▶ │ Slot │
//!   └───┴───┴───┴───┘              └──────┘       └───────┘       └──┬───┘
//!         ▲                                                          │
//!         └──────────────────────── drop (release) ◀─────────────────┘
//! ```
//!
//! ## Ownership Rules
//!
//! - A `Slot` is not `Clone`; exactly one stage owns it at any time.
//! - Releasing consumes the slot, so it cannot be touched afterwards.
//! - `Drop` releases too, so a slot lost on an error path still comes home.
//!
//! Exhaustion is an ordinary result, [`PoolExhausted`], that the caller has to
//! handle. There is no way to obtain a slot that does not exist.
//!
//! ## Example
//!
//! ```rust
//! use tempguard_core::pool::SlotPool;
//!
//! let pool = SlotPool::new(1);
//! let mut slot = pool.try_borrow().unwrap();
//! slot.reading = 58;
//!
//! assert!(pool.try_borrow().is_err()); // only one slot
//! pool.release(slot);
//! assert!(pool.try_borrow().is_ok());
//! ```

use core::fmt;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;

use crate::errors::PipelineError;
use crate::report::AnomalyReport;

/// Every slot is currently borrowed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("all {capacity} report slots are in use")]
pub struct PoolExhausted {
    /// Pool capacity
    pub capacity: usize,
}

impl From<PoolExhausted> for PipelineError {
    fn from(_: PoolExhausted) -> Self {
        PipelineError::PoolExhausted
    }
}

/// Pool usage counters
///
/// Relaxed atomics: they describe the pool, they do not guard it.
#[derive(Debug, Default)]
pub struct PoolStats {
    /// Successful borrows
    pub borrowed: AtomicU64,
    /// Borrow attempts that found the pool empty
    pub exhausted: AtomicU64,
    /// Slots currently out of the pool
    pub in_use: AtomicUsize,
    /// Highest `in_use` seen
    pub peak_in_use: AtomicUsize,
}

impl PoolStats {
    /// Update peak if current is higher
    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_in_use.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_use.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => peak = actual,
            }
        }
    }
}

/// Plain copy of [`PoolStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatsSnapshot {
    /// Total slots
    pub capacity: usize,
    /// Slots out of the pool
    pub in_use: usize,
    /// Highest `in_use` seen
    pub peak_in_use: usize,
    /// Successful borrows
    pub borrowed: u64,
    /// Failed borrows
    pub exhausted: u64,
}

struct PoolInner {
    free: Mutex<Vec<Box<AnomalyReport>>>,
    capacity: usize,
    stats: PoolStats,
}

impl PoolInner {
    fn give_back(&self, storage: Box<AnomalyReport>) {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(free.len() < self.capacity, "slot released twice");
        // capacity reserved up front: never reallocates
        free.push(storage);
        drop(free);
        self.stats.in_use.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Fixed-size pool of report slots
///
/// Cheap to clone; clones share the same slots.
#[derive(Clone)]
pub struct SlotPool {
    inner: Arc<PoolInner>,
}

impl SlotPool {
    /// Preallocate `capacity` slots
    ///
    /// A zero capacity is allowed and yields a pool that is always
    /// exhausted; the node configuration rejects it before getting here.
    pub fn new(capacity: usize) -> Self {
        let mut free = Vec::with_capacity(capacity);
        free.extend((0..capacity).map(|_| Box::new(AnomalyReport::default())));

        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(free),
                capacity,
                stats: PoolStats::default(),
            }),
        }
    }

    /// Take a slot without waiting
    ///
    /// The slot comes back zeroed.
    pub fn try_borrow(&self) -> Result<Slot, PoolExhausted> {
        let storage = {
            let mut free = self.inner.free.lock().unwrap_or_else(PoisonError::into_inner);
            free.pop()
        };

        match storage {
            Some(mut storage) => {
                *storage = AnomalyReport::default();
                let stats = &self.inner.stats;
                stats.borrowed.fetch_add(1, Ordering::Relaxed);
                let in_use = stats.in_use.fetch_add(1, Ordering::Relaxed) + 1;
                stats.update_peak(in_use);

                Ok(Slot {
                    storage: Some(storage),
                    pool: Arc::clone(&self.inner),
                })
            }
            None => {
                self.inner.stats.exhausted.fetch_add(1, Ordering::Relaxed);
                Err(PoolExhausted {
                    capacity: self.inner.capacity,
                })
            }
        }
    }

    /// Return a slot
    ///
    /// Equivalent to dropping it; spelled out for call sites that want the
    /// hand-back to be visible.
    pub fn release(&self, slot: Slot) {
        debug_assert!(
            Arc::ptr_eq(&self.inner, &slot.pool),
            "slot released to a foreign pool"
        );
        drop(slot);
    }

    /// Total number of slots
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Slots currently available
    pub fn available(&self) -> usize {
        self.inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Live counters
    pub fn stats(&self) -> &PoolStats {
        &self.inner.stats
    }

    /// Copy of the counters
    pub fn stats_snapshot(&self) -> PoolStatsSnapshot {
        let s = &self.inner.stats;
        PoolStatsSnapshot {
            capacity: self.inner.capacity,
            in_use: s.in_use.load(Ordering::Relaxed),
            peak_in_use: s.peak_in_use.load(Ordering::Relaxed),
            borrowed: s.borrowed.load(Ordering::Relaxed),
            exhausted: s.exhausted.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for SlotPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotPool")
            .field("capacity", &self.inner.capacity)
            .field("available", &self.available())
            .finish()
    }
}

/// Exclusive handle to one pooled report
///
/// Dereferences to the [`AnomalyReport`] it holds. Returned to its pool on
/// drop.
pub struct Slot {
    // Only `None` inside `drop`
    storage: Option<Box<AnomalyReport>>,
    pool: Arc<PoolInner>,
}

impl Slot {
    /// Overwrite the held report
    pub fn write(&mut self, report: AnomalyReport) {
        **self = report;
    }

    /// Copy out the held report
    pub fn report(&self) -> AnomalyReport {
        **self
    }
}

impl Deref for Slot {
    type Target = AnomalyReport;

    fn deref(&self) -> &AnomalyReport {
        self.storage.as_deref().expect("slot storage present until drop")
    }
}

impl DerefMut for Slot {
    fn deref_mut(&mut self) -> &mut AnomalyReport {
        self.storage.as_deref_mut().expect("slot storage present until drop")
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(storage) = self.storage.take() {
            self.pool.give_back(storage);
        }
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Slot").field(&**self).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausts_after_capacity() {
        let pool = SlotPool::new(4);
        let slots: Vec<_> = (0..4).map(|_| pool.try_borrow().unwrap()).collect();

        assert_eq!(pool.try_borrow().unwrap_err(), PoolExhausted { capacity: 4 });
        assert_eq!(pool.stats_snapshot().exhausted, 1);
        assert_eq!(pool.available(), 0);

        drop(slots);
        assert_eq!(pool.available(), 4);
    }

    #[test]
    fn release_makes_slot_available() {
        let pool = SlotPool::new(2);
        let a = pool.try_borrow().unwrap();
        let _b = pool.try_borrow().unwrap();
        assert!(pool.try_borrow().is_err());

        pool.release(a);
        assert!(pool.try_borrow().is_ok());
    }

    #[test]
    fn borrowed_slot_is_zeroed() {
        let pool = SlotPool::new(1);
        let mut slot = pool.try_borrow().unwrap();
        slot.write(AnomalyReport {
            reading: 99,
            minimum: 1,
            maximum: 99,
            count: 3,
            total: 150,
        });
        drop(slot);

        let slot = pool.try_borrow().unwrap();
        assert_eq!(slot.report(), AnomalyReport::default());
    }

    #[test]
    fn peak_tracks_high_water_mark() {
        let pool = SlotPool::new(3);
        let a = pool.try_borrow().unwrap();
        let b = pool.try_borrow().unwrap();
        drop(a);
        drop(b);
        let _c = pool.try_borrow().unwrap();

        let stats = pool.stats_snapshot();
        assert_eq!(stats.peak_in_use, 2);
        assert_eq!(stats.in_use, 1);
        assert_eq!(stats.borrowed, 3);
    }

    #[test]
    fn slots_move_across_threads() {
        let pool = SlotPool::new(8);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let mut slot = pool.try_borrow().unwrap();
                slot.reading = i;
                std::thread::spawn(move || slot.reading)
            })
            .collect();

        let mut seen: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..8).collect::<Vec<_>>());
        assert_eq!(pool.available(), 8);
    }

    #[test]
    fn zero_capacity_is_always_exhausted() {
        let pool = SlotPool::new(0);
        assert!(pool.try_borrow().is_err());
    }
}
