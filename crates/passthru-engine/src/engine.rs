//! Passthrough engine: session lifecycle and direction pumps
//!
//! One engine drives one local/remote pair. `start` spawns two pumps that
//! run until `stop`: the local->remote pump reads from the local provider
//! and forwards into the remote one, and vice versa. A failure on either
//! leg tears both legs down before the pumps retry, so the pair never ends
//! up half-open.

use crate::config::PassthroughConfig;
use crate::observer::{EventNotifier, PassthroughObserver};
use crate::rate::TrafficMeter;
use crate::Direction;
use passthru_connection::ConnectionProvider;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Engine errors
#[derive(Debug, Error)]
pub enum PassthroughError {
    /// `start` was called while a session is active. Call `stop` first;
    /// a running session is never replaced implicitly.
    #[error("A passthrough session is already running")]
    AlreadyRunning,
}

/// Bidirectional passthrough engine.
///
/// Instantiable: construct one engine per local/remote pair. At most one
/// session is active per engine at a time.
pub struct PassthroughEngine {
    config: PassthroughConfig,
    notifier: Arc<EventNotifier>,
    session: tokio::sync::Mutex<Option<Arc<Session>>>,
}

impl PassthroughEngine {
    pub fn new(config: PassthroughConfig) -> Self {
        Self {
            config,
            notifier: Arc::new(EventNotifier::new()),
            session: tokio::sync::Mutex::new(None),
        }
    }

    /// Register the observer. The engine only keeps a weak reference;
    /// dropping the observer silently stops event delivery.
    pub fn set_observer(&self, observer: &Arc<dyn PassthroughObserver>) {
        self.notifier.set_observer(observer);
    }

    /// Start relaying between the two providers.
    ///
    /// Spawns both pumps and returns immediately. Fails with
    /// [`PassthroughError::AlreadyRunning`] when a session is active.
    pub async fn start(
        &self,
        local: Arc<dyn ConnectionProvider>,
        remote: Arc<dyn ConnectionProvider>,
    ) -> Result<(), PassthroughError> {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            return Err(PassthroughError::AlreadyRunning);
        }

        info!("Starting passthrough");
        let (stop_tx, _) = watch::channel(false);
        let notifier = self.notifier.clone();
        let session = Arc::new(Session {
            local,
            remote,
            links: Mutex::new(LinkState {
                local_up: false,
                remote_up: false,
                epoch: 0,
            }),
            stop_tx,
            retry_delay: self.config.retry_delay,
            ltr_meter: TrafficMeter::new(
                Direction::LocalToRemote,
                self.config.rate_window,
                notifier.clone(),
            ),
            rtl_meter: TrafficMeter::new(
                Direction::RemoteToLocal,
                self.config.rate_window,
                notifier.clone(),
            ),
            notifier,
        });

        tokio::spawn(run_pump(session.clone(), Direction::LocalToRemote));
        tokio::spawn(run_pump(session.clone(), Direction::RemoteToLocal));

        *slot = Some(session);
        Ok(())
    }

    /// Stop the active session.
    ///
    /// Signals both pumps and force-closes both providers, which unblocks
    /// any pending read. Idempotent; a no-op when nothing is running.
    pub async fn stop(&self) {
        let session = self.session.lock().await.take();
        let Some(session) = session else {
            debug!("Stop requested with no active session");
            return;
        };

        info!("Stopping passthrough");
        session.stop_tx.send_replace(true);
        session.local.close().await;
        session.remote.close().await;
    }

    /// Whether a session is currently active.
    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }
}

/// Per-direction connected flags plus the teardown epoch.
///
/// The epoch increments on every teardown. A pump only performs the
/// teardown if the epoch still matches the one it observed when it started
/// streaming; otherwise the opposite pump already tore this pairing down
/// and the late pump must not touch connections acquired since.
struct LinkState {
    local_up: bool,
    remote_up: bool,
    epoch: u64,
}

/// State owned by one `start`..`stop` session.
struct Session {
    local: Arc<dyn ConnectionProvider>,
    remote: Arc<dyn ConnectionProvider>,
    links: Mutex<LinkState>,
    stop_tx: watch::Sender<bool>,
    retry_delay: Duration,
    notifier: Arc<EventNotifier>,
    ltr_meter: TrafficMeter,
    rtl_meter: TrafficMeter,
}

impl Session {
    fn endpoints(
        &self,
        direction: Direction,
    ) -> (&Arc<dyn ConnectionProvider>, &Arc<dyn ConnectionProvider>) {
        match direction {
            Direction::LocalToRemote => (&self.local, &self.remote),
            Direction::RemoteToLocal => (&self.remote, &self.local),
        }
    }

    fn meter(&self, direction: Direction) -> &TrafficMeter {
        match direction {
            Direction::LocalToRemote => &self.ltr_meter,
            Direction::RemoteToLocal => &self.rtl_meter,
        }
    }

    fn stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Sleep the retry delay. Returns `false` when the session stopped,
    /// in which case the pump must not re-enter acquiring.
    async fn retry_wait(&self) -> bool {
        let mut stop_rx = self.stop_tx.subscribe();
        if *stop_rx.borrow() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(self.retry_delay) => true,
            _ = stop_rx.changed() => false,
        }
    }

    /// Mark a direction connected, emitting its connected event exactly
    /// once per outage. Returns the teardown epoch the pump streams under.
    fn mark_connected(&self, direction: Direction) -> u64 {
        let (epoch, newly_connected) = {
            let mut links = self.links.lock().unwrap();
            let flag = match direction {
                Direction::LocalToRemote => &mut links.local_up,
                Direction::RemoteToLocal => &mut links.remote_up,
            };
            let newly_connected = !*flag;
            *flag = true;
            (links.epoch, newly_connected)
        };

        if newly_connected {
            info!(endpoint = direction.source(), "Endpoint connected");
            self.notifier.connected(direction);
        }
        epoch
    }

    /// Tear the connection pair down: close both providers and emit one
    /// disconnected event per side that was connected. Skipped when the
    /// observed epoch is stale (the other pump got here first).
    async fn teardown(&self, observed_epoch: u64, direction: Direction) {
        let (local_was_up, remote_was_up) = {
            let mut links = self.links.lock().unwrap();
            if links.epoch != observed_epoch {
                debug!(pump = %direction, "Pairing already torn down");
                return;
            }
            links.epoch += 1;
            let flags = (links.local_up, links.remote_up);
            links.local_up = false;
            links.remote_up = false;
            flags
        };

        debug!(pump = %direction, "Tearing down connection pair");
        self.local.close().await;
        self.remote.close().await;

        if local_was_up {
            info!(endpoint = "local", "Endpoint disconnected");
            self.notifier.disconnected(Direction::LocalToRemote);
        }
        if remote_was_up {
            info!(endpoint = "remote", "Endpoint disconnected");
            self.notifier.disconnected(Direction::RemoteToLocal);
        }
    }
}

/// One direction's acquire/stream/teardown/retry loop.
async fn run_pump(session: Arc<Session>, direction: Direction) {
    debug!(pump = %direction, "Pump started");

    loop {
        if session.stopped() {
            break;
        }

        let (source, sink) = session.endpoints(direction);

        if !source.acquire().await {
            if session.retry_wait().await {
                continue;
            }
            break;
        }

        if session.stopped() {
            // Stop raced the acquire; the fresh connection must not outlive
            // the session.
            source.close().await;
            break;
        }

        let epoch = session.mark_connected(direction);

        loop {
            match source.recv().await {
                Ok(Some(chunk)) => {
                    session.meter(direction).record(chunk.len() as u64);
                    if let Err(e) = sink.send(chunk).await {
                        warn!(pump = %direction, error = %e, "Forward write failed");
                        break;
                    }
                }
                Ok(None) => {
                    info!(pump = %direction, "Peer closed connection (zero-length read)");
                    break;
                }
                Err(e) => {
                    warn!(pump = %direction, error = %e, "Read failed");
                    break;
                }
            }
        }

        session.teardown(epoch, direction).await;

        if !session.retry_wait().await {
            break;
        }
    }

    debug!(pump = %direction, "Pump exited");
}
