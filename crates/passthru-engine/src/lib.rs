//! Bidirectional TCP passthrough engine
//!
//! Joins a local and a remote endpoint and relays bytes in both directions
//! until stopped. Each direction runs its own pump: acquire a connection,
//! read chunks, forward them to the opposite endpoint, and on any failure
//! tear the whole pairing down symmetrically before retrying.

use std::fmt;

pub mod config;
pub mod engine;
pub mod observer;
pub mod rate;

pub use config::PassthroughConfig;
pub use engine::{PassthroughEngine, PassthroughError};
pub use observer::PassthroughObserver;

/// Forwarding direction of a pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LocalToRemote,
    RemoteToLocal,
}

impl Direction {
    /// The side this pump reads from.
    pub fn source(&self) -> &'static str {
        match self {
            Direction::LocalToRemote => "local",
            Direction::RemoteToLocal => "remote",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::LocalToRemote => write!(f, "local->remote"),
            Direction::RemoteToLocal => write!(f, "remote->local"),
        }
    }
}
