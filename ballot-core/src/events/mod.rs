//! Live tally fan-out.
//!
//! The broadcaster only knows the [`LiveBroadcast`] capability. The
//! [`LiveRegistry`] implementation fans messages out to every subscribed
//! WebSocket task through a `tokio::sync::broadcast` channel.

pub mod live;

pub use ballot_sdk::objects::LiveMessage;
pub use live::{LiveBroadcast, LiveReceiver, LiveRegistry, DEFAULT_LIVE_BUFFER};
