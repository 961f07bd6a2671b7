//! Provider trait for passthrough endpoints

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One endpoint of a passthrough pair.
///
/// The engine holds two providers, one per side, and drives the retry
/// cadence itself: `acquire` is expected to make a single attempt at
/// ensuring a live stream, although implementations are free to block and
/// run their own backoff internally.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Ensure a live connection is available.
    ///
    /// Returns `true` when the endpoint is immediately usable for
    /// `recv`/`send`. Idempotent: calling again while connected keeps the
    /// existing stream; after a failure or close, a new call may establish
    /// a fresh one.
    async fn acquire(&self) -> bool;

    /// Receive the next chunk from the live stream.
    ///
    /// `Ok(None)` means the peer closed gracefully (zero-length read).
    /// A pending `recv` must unblock with an error when `close` is called.
    async fn recv(&self) -> Result<Option<Bytes>, ProviderError>;

    /// Send data to the peer.
    async fn send(&self, data: Bytes) -> Result<(), ProviderError>;

    /// Close the connection.
    ///
    /// Idempotent and safe to call when never connected. Unblocks a
    /// pending `recv`.
    async fn close(&self);
}
