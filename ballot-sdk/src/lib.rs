//! Shared types for the ballot vote pipeline.
//!
//! The `objects` module holds every JSON shape that crosses a process
//! boundary: the queued vote record, the HTTP API bodies, and the frames
//! pushed over the live WebSocket channel. The optional `client` module
//! wraps those in a typed HTTP + WebSocket client.

#[cfg(feature = "client")]
pub mod client;
pub mod objects;
