//! Heartbeat monitor

use crate::connection::{CloseReason, ConnectionRegistry, NodeConnection};
use crate::handlers::GatewayError;
use futures::future::join_all;
use nova_common::HeartbeatConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections in the sweep's snapshot
    pub probed: usize,
    /// Connections closed and removed by the sweep
    pub reaped: usize,
}

/// Periodic liveness sweep over the registry
pub struct HeartbeatMonitor {
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    max_missed: u32,
    write_timeout: Duration,
}

impl HeartbeatMonitor {
    /// Create a monitor for the given registry
    pub fn new(registry: Arc<ConnectionRegistry>, config: &HeartbeatConfig) -> Self {
        Self {
            registry,
            interval: config.interval(),
            max_missed: config.max_missed,
            write_timeout: config.write_timeout(),
        }
    }

    /// Probe every registered connection once and reap the dead ones
    ///
    /// Probes go out concurrently on a snapshot taken under the read lock, so
    /// connections registered meanwhile are neither probed nor removed.
    pub async fn sweep(&self) -> SweepReport {
        let connections = self.registry.connections();
        let probed = connections.len();

        let outcomes = join_all(connections.into_iter().map(|connection| async move {
            let verdict = self.probe(&connection).await;
            (connection, verdict)
        }))
        .await;

        let mut dead = Vec::new();
        for (connection, verdict) in outcomes {
            let Err(error) = verdict else {
                continue;
            };

            let reason = match &error {
                GatewayError::LivenessTimeout { .. } => CloseReason::HeartbeatTimeout,
                _ => CloseReason::ProbeFailed,
            };
            tracing::warn!(
                node_id = %connection.node_id(),
                connection_id = %connection.id(),
                error = %error,
                "Reaping dead node connection"
            );
            connection.close(reason);
            dead.push(connection);
        }

        let reaped = self.registry.remove_connections(&dead);

        tracing::debug!(probed, reaped, "Heartbeat sweep finished");

        SweepReport { probed, reaped }
    }

    /// Count the sweep, then send the probe
    ///
    /// The counter moves before the probe is queued, so a pong answering this
    /// probe always lands after the increment and resets it.
    async fn probe(&self, connection: &Arc<NodeConnection>) -> Result<(), GatewayError> {
        let missed = connection.record_missed_heartbeat();
        if missed > self.max_missed {
            return Err(GatewayError::LivenessTimeout { missed });
        }

        connection.send_probe(self.write_timeout).await
    }

    /// Run sweeps until `stop` turns `true`
    ///
    /// The first sweep fires one interval after the call. A sweep that overruns
    /// pushes the following ticks back instead of bursting them.
    pub fn spawn(self, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                interval_ms = self.interval.as_millis() as u64,
                max_missed = self.max_missed,
                "Heartbeat monitor started"
            );

            loop {
                tokio::select! {
                    biased;
                    () = async {
                        let _ = stop.wait_for(|stopped| *stopped).await;
                    } => break,
                    _ = ticker.tick() => {
                        self.sweep().await;
                    }
                }
            }

            tracing::info!("Heartbeat monitor stopped");
        })
    }
}

impl std::fmt::Debug for HeartbeatMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatMonitor")
            .field("interval", &self.interval)
            .field("max_missed", &self.max_missed)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}
