//! Core engine: probing, fusion, state machine, usage and notifications.

pub mod collector;
pub mod control;
pub mod engine;
pub mod executor;
pub mod probes;
pub mod resolver;
pub mod store;
pub mod throttle;
pub mod usage;
