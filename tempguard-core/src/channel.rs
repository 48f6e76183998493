//! Bounded Hand-off Channel between Receiver and Sender
//!
//! ## Overview
//!
//! A fixed-capacity FIFO of [`Slot`]s built on tokio's bounded `mpsc`. The
//! receiver puts, the sender gets; slot ownership moves with the item, so no
//! stage can see a report another stage is still writing.
//!
//! ```text
//! Receiver                                 Sender
//!    │ put / try_put    ┌─────────────┐  get  │
//!    └────────────────▶ │ 0 1 2 … C-1 │ ─────▶┘
//!                       └─────────────┘
//!                    oldest out first (FIFO)
//! ```
//!
//! ## Backpressure
//!
//! When the channel holds `C` items:
//! - [`HandoffSender::put`] waits for room (the default policy)
//! - [`HandoffSender::try_put`] returns [`PutError::Full`] with the slot, so the
//!   caller decides whether to drop it (which releases it to the pool)
//!
//! ## Shutdown
//!
//! Dropping every [`HandoffSender`] is the sentinel: the sender stage drains
//! what is left and then [`HandoffReceiver::get`] returns `None`.

use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::errors::PipelineError;
use crate::pool::Slot;

/// What the receiver does when the channel is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackpressurePolicy {
    /// Wait for the sender stage to make room
    #[default]
    Block,
    /// Drop the report and count it as missed
    Reject,
}

/// Failed non-blocking put; the slot is handed back
#[derive(Debug)]
pub enum PutError {
    /// Channel at capacity
    Full(Slot),
    /// Sender stage gone
    Closed(Slot),
}

impl From<PutError> for PipelineError {
    fn from(err: PutError) -> Self {
        match err {
            PutError::Full(_) => PipelineError::ChannelFull,
            PutError::Closed(_) => PipelineError::ChannelClosed,
        }
    }
}

/// Channel counters
#[derive(Debug)]
pub struct ChannelStats {
    capacity: usize,
    /// Items accepted
    pub accepted: AtomicU64,
    /// Items handed to the consumer
    pub delivered: AtomicU64,
    /// Non-blocking puts refused because the channel was full
    pub rejected: AtomicU64,
    /// Maximum depth seen
    pub max_depth: AtomicUsize,
}

impl ChannelStats {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            accepted: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            max_depth: AtomicUsize::new(0),
        }
    }

    /// Copy of the counters
    pub fn snapshot(&self) -> ChannelStatsSnapshot {
        ChannelStatsSnapshot {
            capacity: self.capacity,
            accepted: self.accepted.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            max_depth: self.max_depth.load(Ordering::Relaxed),
        }
    }

    /// Update max depth if current is higher
    fn update_max_depth(&self, current: usize) {
        let mut max = self.max_depth.load(Ordering::Relaxed);
        while current > max {
            match self.max_depth.compare_exchange_weak(
                max,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => max = actual,
            }
        }
    }
}

/// Plain copy of [`ChannelStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelStatsSnapshot {
    /// Configured capacity
    pub capacity: usize,
    /// Items accepted
    pub accepted: u64,
    /// Items delivered
    pub delivered: u64,
    /// Full-channel rejections
    pub rejected: u64,
    /// Maximum depth seen
    pub max_depth: usize,
}

/// Create a channel holding at most `capacity` slots
///
/// # Panics
///
/// If `capacity` is zero. Node configuration rejects that earlier.
pub fn handoff(capacity: usize) -> (HandoffSender, HandoffReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    let stats = Arc::new(ChannelStats::new(capacity));
    (
        HandoffSender {
            tx,
            stats: Arc::clone(&stats),
        },
        HandoffReceiver { rx, stats },
    )
}

/// Producer half, held by the receiver stage
#[derive(Debug, Clone)]
pub struct HandoffSender {
    tx: mpsc::Sender<Slot>,
    stats: Arc<ChannelStats>,
}

impl HandoffSender {
    /// Enqueue, waiting while the channel is full
    ///
    /// Fails only when the consumer has gone away; the slot is handed back.
    pub async fn put(&self, slot: Slot) -> Result<(), PutError> {
        match self.tx.send(slot).await {
            Ok(()) => {
                self.on_accepted();
                Ok(())
            }
            Err(mpsc::error::SendError(slot)) => Err(PutError::Closed(slot)),
        }
    }

    /// Enqueue without waiting
    pub fn try_put(&self, slot: Slot) -> Result<(), PutError> {
        match self.tx.try_send(slot) {
            Ok(()) => {
                self.on_accepted();
                Ok(())
            }
            Err(TrySendError::Full(slot)) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                Err(PutError::Full(slot))
            }
            Err(TrySendError::Closed(slot)) => Err(PutError::Closed(slot)),
        }
    }

    /// Items currently queued
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Live counters, shared with the consumer half
    pub fn stats(&self) -> Arc<ChannelStats> {
        Arc::clone(&self.stats)
    }

    fn on_accepted(&self) {
        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        self.stats.update_max_depth(self.len());
    }
}

/// Consumer half, held by the sender stage
#[derive(Debug)]
pub struct HandoffReceiver {
    rx: mpsc::Receiver<Slot>,
    stats: Arc<ChannelStats>,
}

impl HandoffReceiver {
    /// Dequeue the oldest slot, waiting for one to arrive
    ///
    /// `None` once all senders are dropped and the queue is empty.
    pub async fn get(&mut self) -> Option<Slot> {
        let slot = self.rx.recv().await?;
        self.stats.delivered.fetch_add(1, Ordering::Relaxed);
        Some(slot)
    }

    /// Dequeue without waiting
    ///
    /// `Ok(None)` when empty but still open, `Err(ChannelClosed)` when
    /// empty and closed.
    #[cfg(test)]
    pub(crate) fn try_get(&mut self) -> Result<Option<Slot>, PipelineError> {
        match self.rx.try_recv() {
            Ok(slot) => {
                self.stats.delivered.fetch_add(1, Ordering::Relaxed);
                Ok(Some(slot))
            }
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(PipelineError::ChannelClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SlotPool;

    fn slot_with(pool: &SlotPool, reading: i32) -> Slot {
        let mut slot = pool.try_borrow().unwrap();
        slot.reading = reading;
        slot
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let pool = SlotPool::new(8);
        let (tx, mut rx) = handoff(8);

        for reading in [3, 1, 4, 1, 5] {
            tx.put(slot_with(&pool, reading)).await.unwrap();
        }

        let mut seen = Vec::new();
        while let Some(slot) = rx.try_get().unwrap() {
            seen.push(slot.reading);
        }
        assert_eq!(seen, vec![3, 1, 4, 1, 5]);
    }

    #[tokio::test]
    async fn accepts_exactly_capacity() {
        let pool = SlotPool::new(8);
        let (tx, _rx) = handoff(4);

        for i in 0..4 {
            tx.try_put(slot_with(&pool, i)).unwrap();
        }
        assert_eq!(tx.len(), 4);

        let err = tx.try_put(slot_with(&pool, 99)).unwrap_err();
        match err {
            PutError::Full(slot) => assert_eq!(slot.reading, 99),
            PutError::Closed(_) => panic!("channel still open"),
        }

        let stats = tx.stats().snapshot();
        assert_eq!(stats.accepted, 4);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.max_depth, 4);
    }

    #[tokio::test]
    async fn rejected_slot_returns_to_pool_on_drop() {
        let pool = SlotPool::new(2);
        let (tx, _rx) = handoff(1);

        tx.try_put(slot_with(&pool, 1)).unwrap();
        let err = tx.try_put(slot_with(&pool, 2)).unwrap_err();
        assert_eq!(pool.available(), 0);
        drop(err);
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn put_waits_for_room() {
        let pool = SlotPool::new(4);
        let (tx, mut rx) = handoff(1);
        tx.put(slot_with(&pool, 1)).await.unwrap();

        let producer = {
            let tx = tx.clone();
            let slot = slot_with(&pool, 2);
            tokio::spawn(async move { tx.put(slot).await })
        };
        tokio::task::yield_now().await;
        assert!(!producer.is_finished());

        assert_eq!(rx.get().await.unwrap().reading, 1);
        producer.await.unwrap().unwrap();
        assert_eq!(rx.get().await.unwrap().reading, 2);
    }

    #[tokio::test]
    async fn closing_senders_ends_get_after_drain() {
        let pool = SlotPool::new(2);
        let (tx, mut rx) = handoff(2);
        tx.put(slot_with(&pool, 7)).await.unwrap();
        drop(tx);

        assert_eq!(rx.get().await.unwrap().reading, 7);
        assert!(rx.get().await.is_none());
        assert!(matches!(rx.try_get(), Err(PipelineError::ChannelClosed)));
    }

    #[tokio::test]
    async fn put_on_closed_channel_returns_slot() {
        let pool = SlotPool::new(1);
        let (tx, rx) = handoff(1);
        drop(rx);

        let err = tx.put(slot_with(&pool, 5)).await.unwrap_err();
        assert!(matches!(err, PutError::Closed(_)));
        drop(err);
        assert_eq!(pool.available(), 1);
    }
}
