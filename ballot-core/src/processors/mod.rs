//! The two long-running loops of the vote pipeline.
//!
//! - `QueueConsumer`: pops vote records from the queue, upserts them into
//!   the store
//! - `TallyBroadcaster`: polls the store for tally changes, pushes them to
//!   live subscribers
//!
//! The loops never talk to each other directly. The store is their only
//! meeting point.

pub mod queue_consumer;
pub mod tally_broadcaster;

pub use queue_consumer::{ConsumerPhase, PollOutcome, QueueConsumer, RecordError, decode_record};
pub use tally_broadcaster::{SnapshotReader, TallyBroadcaster, TickOutcome};
