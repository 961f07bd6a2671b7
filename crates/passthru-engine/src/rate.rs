//! Per-direction traffic-rate aggregation
//!
//! Collapses individual read sizes into at most one bytes-transferred
//! event per reporting window. The first read after an idle period arms a
//! one-shot timer; further reads accumulate into the same counter until
//! the timer fires and emits the cumulative total.

use crate::observer::EventNotifier;
use crate::Direction;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::trace;

struct WindowState {
    armed: bool,
    bytes: u64,
}

struct MeterInner {
    state: Mutex<WindowState>,
    notifier: Arc<EventNotifier>,
}

/// Traffic meter for one direction.
pub(crate) struct TrafficMeter {
    direction: Direction,
    window: Duration,
    inner: Arc<MeterInner>,
}

impl TrafficMeter {
    pub(crate) fn new(direction: Direction, window: Duration, notifier: Arc<EventNotifier>) -> Self {
        Self {
            direction,
            window,
            inner: Arc::new(MeterInner {
                state: Mutex::new(WindowState {
                    armed: false,
                    bytes: 0,
                }),
                notifier,
            }),
        }
    }

    /// Record a read of `count` bytes.
    ///
    /// At most one timer task is outstanding per meter; the armed flag
    /// guards against scheduling a second.
    pub(crate) fn record(&self, count: u64) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.armed {
                state.bytes += count;
                return;
            }
            state.bytes = count;
            state.armed = true;
        }

        let inner = Arc::clone(&self.inner);
        let direction = self.direction;
        let window = self.window;
        let timer = sleep(window);
        tokio::spawn(async move {
            timer.await;
            let total = {
                let mut state = inner.state.lock().unwrap();
                state.armed = false;
                state.bytes
            };
            trace!(direction = %direction, bytes = total, "Rate window elapsed");
            inner.notifier.bytes_transferred(direction, total);
        });
    }
}
