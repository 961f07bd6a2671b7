//! Passthru - bidirectional TCP passthrough
//!
//! Joins a device-local TCP endpoint and a remote TCP endpoint and relays
//! bytes in both directions until stopped, reconnecting through failures
//! on either side. This crate re-exports the public API of the member
//! crates as a single entry point.
//!
//! # Quick Start
//!
//! ```ignore
//! use passthru::{
//!     ConnectionProvider, PassthroughConfig, PassthroughEngine, TcpConnectionProvider,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = PassthroughEngine::new(PassthroughConfig::default());
//!
//!     let local: Arc<dyn ConnectionProvider> =
//!         Arc::new(TcpConnectionProvider::new("127.0.0.1:9000"));
//!     let remote: Arc<dyn ConnectionProvider> =
//!         Arc::new(TcpConnectionProvider::new("relay.example.com:9000"));
//!
//!     engine.start(local, remote).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     engine.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! Implement [`PassthroughObserver`] and register it with
//! [`PassthroughEngine::set_observer`] to receive connect/disconnect and
//! traffic-rate events; all callbacks default to no-ops.

pub use passthru_connection::{ConnectionProvider, ProviderError, TcpConnectionProvider};
pub use passthru_engine::{
    Direction, PassthroughConfig, PassthroughEngine, PassthroughError, PassthroughObserver,
};
