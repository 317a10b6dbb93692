#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod entities;
pub mod events;
pub mod framework;
pub mod processors;
pub mod queue;
pub mod store;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

/// Boxed error used where a backend's native error type is erased.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
