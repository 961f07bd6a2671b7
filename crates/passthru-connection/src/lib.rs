//! Connection capability consumed by the passthrough engine
//!
//! Defines the provider trait the engine pumps against, plus a plain
//! `host:port` TCP implementation.

pub mod provider;
pub mod tcp;

pub use provider::{ConnectionProvider, ProviderError};
pub use tcp::TcpConnectionProvider;
