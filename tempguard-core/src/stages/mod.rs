//! The two long-running pipeline stages
//!
//! ```text
//!  datagram ─▶ ReceiverStage ──Slot──▶ hand-off channel ──Slot──▶ SenderStage ─▶ datagram
//!                  │                                                   │
//!            AggregateState                                       drop(slot)
//!            (owned, single writer)                               back to pool
//! ```
//!
//! Each stage is a plain struct with an async `run` loop, meant to be spawned
//! as its own task. They share nothing but the slot pool, the channel and the
//! [`PipelineStats`](crate::stats::PipelineStats) counters.

pub mod receiver;
pub mod sender;

pub use receiver::{ReceiveOutcome, ReceiverConfig, ReceiverStage};
pub use sender::{SendOutcome, SenderConfig, SenderStage};
