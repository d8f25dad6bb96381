//! Plain data types shared across the engine.

mod client;
mod connection;
mod snapshot;

pub use client::{default_catalogue, VpnClient};
pub use connection::{ConnectionSession, UsageCounters, VpnStatus};
pub use snapshot::{ServiceState, SignalSnapshot};
