//! Resource poller: wait for readiness thresholds and pod completion
//!
//! Both waits read one status field at a fixed interval (no backoff) until the
//! condition holds. A read that succeeds but is not ready yet is retried; a read that
//! fails stops the wait with the read error. Every wait can be bounded by a timeout
//! and interrupted through a [`CancelSignal`].

use serde_json::Value;
use ship_core::ResourceRef;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::cluster::ClusterReader;
use crate::error::{KubeError, Result};

/// Pod phase that completes a completion wait
pub const SUCCEEDED_PHASE: &str = "Succeeded";

/// Pod phase that fails a completion wait
pub const FAILED_PHASE: &str = "Failed";

/// Polling behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before each status read
    pub interval: Duration,

    /// Default limit for a single wait (`None` or zero waits forever)
    pub timeout: Option<Duration>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            timeout: Some(Duration::from_secs(600)),
        }
    }
}

/// Sender side of a cancellation signal
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Cancel every wait observing the paired signal
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Receiver side of a cancellation signal
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// Create a connected handle and signal
    pub fn pair() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle(tx), CancelSignal(rx))
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolve once cancellation is requested
    ///
    /// Never resolves if the handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.0.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Waits on cluster resources through a [`ClusterReader`]
pub struct ResourcePoller<R> {
    reader: R,
    config: PollConfig,
    cancel: Option<CancelSignal>,
}

impl<R: ClusterReader> ResourcePoller<R> {
    /// Create a poller
    pub fn new(reader: R, config: PollConfig) -> Self {
        Self {
            reader,
            config,
            cancel: None,
        }
    }

    /// Stop waits when `signal` is cancelled
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Wait until `resource` reports at least `min_ready` ready replicas
    ///
    /// `timeout` overrides the configured default; a zero timeout waits forever.
    /// Returns the observed ready count.
    pub async fn wait_ready(
        &self,
        resource: &ResourceRef,
        min_ready: u32,
        timeout: Option<Duration>,
    ) -> Result<u32> {
        let (kind, field) = resource.readiness_target()?;
        let waiting_for = format!("{} ready", min_ready);
        let reader = &self.reader;

        self.poll(resource, &waiting_for, timeout, move || async move {
            let value = reader
                .status_field(kind, &resource.name, &resource.namespace, field)
                .await?;
            let ready = value.as_ref().and_then(ready_count);
            tracing::debug!(%resource, ?ready, min_ready, "readiness sample");

            Ok(ready.filter(|count| *count >= min_ready))
        })
        .await
    }

    /// Wait until the pod `resource` reaches the `Succeeded` phase
    ///
    /// A `Failed` phase ends the wait with [`KubeError::ResourceFailed`].
    pub async fn wait_completed(
        &self,
        resource: &ResourceRef,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let kind = resource.completion_target()?;
        let reader = &self.reader;

        self.poll(resource, "completion", timeout, move || async move {
            let value = reader
                .status_field(kind, &resource.name, &resource.namespace, "phase")
                .await?;
            let phase = value.as_ref().and_then(Value::as_str);
            tracing::debug!(%resource, ?phase, "phase sample");

            match phase {
                Some(SUCCEEDED_PHASE) => Ok(Some(())),
                Some(FAILED_PHASE) => Err(KubeError::ResourceFailed {
                    resource: resource.to_string(),
                    reason: "finished in phase Failed".to_string(),
                }),
                _ => Ok(None),
            }
        })
        .await
    }

    /// Sleep, sample, repeat until `sample` yields a value or the deadline passes
    async fn poll<T, F, Fut>(
        &self,
        resource: &ResourceRef,
        waiting_for: &str,
        timeout: Option<Duration>,
        mut sample: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<Option<T>>>,
    {
        let limit = match timeout {
            Some(limit) if limit.is_zero() => None,
            Some(limit) => Some(limit),
            None => self.config.timeout.filter(|limit| !limit.is_zero()),
        };
        let deadline = limit.map(|limit| Instant::now() + limit);

        loop {
            self.pause().await?;

            if let Some(done) = sample().await? {
                return Ok(done);
            }

            if let (Some(deadline), Some(after)) = (deadline, limit)
                && Instant::now() >= deadline
            {
                return Err(KubeError::Timeout {
                    resource: resource.to_string(),
                    waiting_for: waiting_for.to_string(),
                    after,
                });
            }
        }
    }

    async fn pause(&self) -> Result<()> {
        match &self.cancel {
            Some(signal) => {
                if signal.is_cancelled() {
                    return Err(KubeError::Cancelled);
                }
                tokio::select! {
                    _ = tokio::time::sleep(self.config.interval) => Ok(()),
                    _ = signal.cancelled() => Err(KubeError::Cancelled),
                }
            }
            None => {
                tokio::time::sleep(self.config.interval).await;
                Ok(())
            }
        }
    }
}

/// Interpret a ready-count status value (number or numeric string)
fn ready_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().trim_matches('"').parse().ok(),
        _ => None,
    }
}
