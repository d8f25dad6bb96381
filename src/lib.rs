//! vpnwatch: infers whether a VPN tunnel is up from indirect OS signals.
//!
//! Each tick collects a [`state::SignalSnapshot`] through external diagnostic
//! commands, resolves it to a [`state::VpnStatus`] with an ordered rule table,
//! and runs the connectivity state machine in [`crate::core::engine`], which returns
//! the notifications, sounds and persistence writes for the caller to apply.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod event;
pub mod logger;
pub mod state;
pub mod theme;

pub use error::{Error, Result};
