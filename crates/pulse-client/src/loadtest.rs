//! Connection-count load generator for the duplex endpoint.
//!
//! Opens up to `max_connections` sockets spread evenly over the ramp-up
//! window, holds each one open reading frames, logs a status line on a
//! fixed interval, and stops after the test duration or on an external
//! shutdown signal. Counters are shared atomics so connection tasks never
//! contend on a lock.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::StreamExt;
use pulse_core::config::LoadTestConfig;
use pulse_types::{InboundMessage, decode_inbound};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

/// Upper bound on a single connection attempt.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Floor for the spacing between connection attempts.
const MIN_SPACING: Duration = Duration::from_millis(1);

/// Counters shared by every connection task.
#[derive(Debug, Default)]
pub struct LoadStats {
    attempted: AtomicU64,
    active: AtomicU64,
    max_concurrent: AtomicU64,
    failed: AtomicU64,
    messages: AtomicU64,
    last_user_count: AtomicU64,
}

impl LoadStats {
    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> LoadSnapshot {
        LoadSnapshot {
            attempted: self.attempted.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            max_concurrent: self.max_concurrent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            messages: self.messages.load(Ordering::Relaxed),
            last_user_count: self.last_user_count.load(Ordering::Relaxed),
        }
    }

    fn opened(&self) {
        let active = self.active.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        self.max_concurrent.fetch_max(active, Ordering::Relaxed);
    }

    fn closed(&self) {
        self.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Counter values at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadSnapshot {
    /// Connection attempts started.
    pub attempted: u64,
    /// Sockets open right now.
    pub active: u64,
    /// Most sockets open at once.
    pub max_concurrent: u64,
    /// Attempts that failed or timed out.
    pub failed: u64,
    /// Text frames received across all sockets.
    pub messages: u64,
    /// Latest participant count pushed by the server.
    pub last_user_count: u64,
}

/// One load test run against a single endpoint.
#[derive(Debug, Clone)]
pub struct LoadTest {
    url: String,
    config: LoadTestConfig,
}

impl LoadTest {
    /// Prepare a run against `url` (a `ws://` or `wss://` endpoint).
    pub fn new(url: impl Into<String>, config: LoadTestConfig) -> Self {
        Self {
            url: url.into(),
            config,
        }
    }

    /// Spacing between connection attempts during ramp-up.
    pub fn spacing(&self) -> Duration {
        Duration::from_secs(self.config.ramp_up_secs)
            .checked_div(self.config.max_connections)
            .unwrap_or_default()
            .max(MIN_SPACING)
    }

    /// Run until the configured duration elapses or `shutdown` resolves,
    /// then close every socket. Returns the counters as they stood when
    /// the run was stopped.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> LoadSnapshot {
        let stats = Arc::new(LoadStats::default());
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        let mut ramp = tokio::time::interval(self.spacing());
        let mut report = tokio::time::interval(
            Duration::from_secs(self.config.report_interval_secs).max(Duration::from_secs(1)),
        );
        let deadline = tokio::time::sleep(Duration::from_secs(self.config.duration_secs));
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        info!(
            url = %self.url,
            max_connections = self.config.max_connections,
            spacing_ms = self.spacing().as_millis(),
            "load test starting"
        );

        let mut launched: u32 = 0;
        loop {
            tokio::select! {
                _ = ramp.tick(), if launched < self.config.max_connections => {
                    launched = launched.saturating_add(1);
                    let _ = tasks.spawn(hold_connection(
                        self.url.clone(),
                        Arc::clone(&stats),
                        stop_rx.clone(),
                    ));
                }
                _ = report.tick() => {
                    let s = stats.snapshot();
                    info!(
                        attempted = s.attempted,
                        active = s.active,
                        max_concurrent = s.max_concurrent,
                        failed = s.failed,
                        messages = s.messages,
                        user_count = s.last_user_count,
                        "load test status"
                    );
                }
                () = &mut deadline => {
                    info!("test duration completed");
                    break;
                }
                () = &mut shutdown => {
                    info!("interrupted");
                    break;
                }
            }
        }

        let at_stop = stats.snapshot();
        let _ = stop_tx.send(true);
        while tasks.join_next().await.is_some() {}
        at_stop
    }
}

/// Open one socket and read from it until told to stop.
async fn hold_connection(url: String, stats: Arc<LoadStats>, mut stop: watch::Receiver<bool>) {
    stats.attempted.fetch_add(1, Ordering::Relaxed);

    let connect = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(url.as_str()));
    let mut ws = tokio::select! {
        _ = stop.changed() => {
            debug!("stopped while connecting");
            return;
        }
        attempt = connect => match attempt {
            Ok(Ok((ws, _))) => ws,
            Ok(Err(e)) => {
                debug!(error = %e, "connection failed");
                stats.failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
            Err(_) => {
                debug!("connection timed out");
                stats.failed.fetch_add(1, Ordering::Relaxed);
                return;
            }
        },
    };
    stats.opened();

    loop {
        tokio::select! {
            _ = stop.changed() => {
                let _ = ws.close(None).await;
                break;
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    stats.messages.fetch_add(1, Ordering::Relaxed);
                    if let Ok(Some(InboundMessage::UserCount(count))) = decode_inbound(text.as_str()) {
                        stats.last_user_count.store(count, Ordering::Relaxed);
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "read failed");
                    break;
                }
            },
        }
    }

    stats.closed();
}
