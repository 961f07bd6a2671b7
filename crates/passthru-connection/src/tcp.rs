//! Plain TCP implementation of the connection provider
//!
//! Connects to a `host:port` address. One connect attempt per `acquire`;
//! the engine owns the retry cadence.

use crate::provider::{ConnectionProvider, ProviderError};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

const DEFAULT_READ_BUFFER_SIZE: usize = 16384;

/// TCP connection provider for a single `host:port` endpoint.
///
/// The stream halves live behind separate locks so that the pump owning
/// this endpoint can sit in `recv` while the opposite pump forwards into
/// `send`. `close` never waits on a blocked reader: it signals the close
/// channel instead, which unblocks the pending `recv`.
pub struct TcpConnectionProvider {
    addr: String,
    read_buffer_size: usize,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: Mutex<Option<OwnedWriteHalf>>,
    close_tx: watch::Sender<u64>,
}

impl TcpConnectionProvider {
    /// Create a provider for the given `host:port` address.
    pub fn new(addr: impl Into<String>) -> Self {
        let (close_tx, _) = watch::channel(0);
        Self {
            addr: addr.into(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            close_tx,
        }
    }

    /// Set the read buffer size (default 16 KiB).
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// The configured endpoint address.
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl ConnectionProvider for TcpConnectionProvider {
    async fn acquire(&self) -> bool {
        let mut reader = self.reader.lock().await;
        let mut writer = self.writer.lock().await;

        if reader.is_some() && writer.is_some() {
            return true;
        }

        // Drop any stale half left over from a failed connection.
        reader.take();
        writer.take();

        match TcpStream::connect(&self.addr).await {
            Ok(stream) => {
                info!(addr = %self.addr, "Connected to endpoint");
                let (read_half, write_half) = stream.into_split();
                *reader = Some(read_half);
                *writer = Some(write_half);
                true
            }
            Err(e) => {
                warn!(addr = %self.addr, error = %e, "Failed to connect to endpoint");
                false
            }
        }
    }

    async fn recv(&self) -> Result<Option<Bytes>, ProviderError> {
        let mut close_rx = self.close_tx.subscribe();
        let mut guard = self.reader.lock().await;
        let reader = guard.as_mut().ok_or(ProviderError::NotConnected)?;

        let mut buf = vec![0u8; self.read_buffer_size];
        tokio::select! {
            result = reader.read(&mut buf) => match result {
                Ok(0) => {
                    debug!(addr = %self.addr, "Peer closed connection");
                    guard.take();
                    Ok(None)
                }
                Ok(n) => {
                    buf.truncate(n);
                    Ok(Some(Bytes::from(buf)))
                }
                Err(e) => {
                    guard.take();
                    Err(e.into())
                }
            },
            _ = close_rx.changed() => {
                guard.take();
                Err(ProviderError::Closed)
            }
        }
    }

    async fn send(&self, data: Bytes) -> Result<(), ProviderError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ProviderError::NotConnected)?;

        if let Err(e) = writer.write_all(&data).await {
            guard.take();
            return Err(e.into());
        }
        Ok(())
    }

    async fn close(&self) {
        // Wake a pending recv first so the reader lock frees up.
        self.close_tx.send_modify(|generation| *generation += 1);

        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
            debug!(addr = %self.addr, "Closed connection");
        }

        // The unblocked recv drops the read half itself; only reap it here
        // when nobody is reading.
        if let Ok(mut guard) = self.reader.try_lock() {
            guard.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_acquire_and_roundtrip() {
        let (listener, addr) = listen().await;
        let provider = TcpConnectionProvider::new(addr);

        assert!(provider.acquire().await);
        let (mut peer, _) = listener.accept().await.unwrap();

        // acquire is idempotent while connected
        assert!(provider.acquire().await);

        provider.send(Bytes::from_static(b"ping")).await.unwrap();
        let mut buf = [0u8; 4];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        peer.write_all(b"pong").await.unwrap();
        let chunk = provider.recv().await.unwrap().unwrap();
        assert_eq!(&chunk[..], b"pong");
    }

    #[tokio::test]
    async fn test_acquire_unreachable_endpoint() {
        // Bind and drop a listener to get a port nothing listens on.
        let (listener, addr) = listen().await;
        drop(listener);

        let provider = TcpConnectionProvider::new(addr);
        assert!(!provider.acquire().await);
    }

    #[tokio::test]
    async fn test_recv_reports_graceful_close() {
        let (listener, addr) = listen().await;
        let provider = TcpConnectionProvider::new(addr);

        assert!(provider.acquire().await);
        let (peer, _) = listener.accept().await.unwrap();
        drop(peer);

        assert!(provider.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recv_and_send_when_not_connected() {
        let provider = TcpConnectionProvider::new("127.0.0.1:9");
        assert!(matches!(
            provider.recv().await,
            Err(ProviderError::NotConnected)
        ));
        assert!(matches!(
            provider.send(Bytes::from_static(b"x")).await,
            Err(ProviderError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_close_unblocks_pending_recv() {
        let (listener, addr) = listen().await;
        let provider = std::sync::Arc::new(TcpConnectionProvider::new(addr));

        assert!(provider.acquire().await);
        let (_peer, _) = listener.accept().await.unwrap();

        let reader = provider.clone();
        let pending = tokio::spawn(async move { reader.recv().await });

        // Give the recv a moment to block on the socket.
        tokio::time::sleep(Duration::from_millis(50)).await;
        provider.close().await;

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("recv did not unblock after close")
            .unwrap();
        assert!(matches!(result, Err(ProviderError::Closed)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let provider = TcpConnectionProvider::new("127.0.0.1:9");

        // Safe when never connected, and repeatedly.
        provider.close().await;
        provider.close().await;

        let (listener, addr) = listen().await;
        let provider = TcpConnectionProvider::new(addr);
        assert!(provider.acquire().await);
        let _peer = listener.accept().await.unwrap();

        provider.close().await;
        provider.close().await;
        assert!(matches!(
            provider.recv().await,
            Err(ProviderError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_reacquire_after_close() {
        let (listener, addr) = listen().await;
        let provider = TcpConnectionProvider::new(addr);

        assert!(provider.acquire().await);
        let _first = listener.accept().await.unwrap();

        provider.close().await;
        assert!(provider.acquire().await);
        let _second = listener.accept().await.unwrap();

        provider.send(Bytes::from_static(b"again")).await.unwrap();
    }
}
