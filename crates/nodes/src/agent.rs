//! The consumer side of the agent: a polling loop that drains the inbound
//! buffer one payload at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pipeline::MergedResult;

use crate::{ChainExecutor, InboundBuffer};

/// Delay before re-checking an empty buffer.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Counters for payloads taken from the buffer.
#[derive(Debug, Default)]
struct Counters {
    completed: AtomicU64,
    dropped: AtomicU64,
}

/// Point-in-time view of the agent's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AgentStats {
    /// Payloads that produced a result (including cancelled chains).
    pub completed: u64,
    /// Payloads whose result was dropped because processing failed.
    pub dropped: u64,
}

/// Owns the inbound buffer and the executor; processes one chain at a time.
pub struct Agent {
    buffer: Arc<InboundBuffer>,
    executor: ChainExecutor,
    poll_interval: Duration,
    counters: Counters,
}

impl Agent {
    pub fn new(executor: ChainExecutor) -> Self {
        Self {
            buffer: Arc::new(InboundBuffer::new()),
            executor,
            poll_interval: DEFAULT_POLL_INTERVAL,
            counters: Counters::default(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Handle for the producer side.
    pub fn buffer(&self) -> Arc<InboundBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Convenience for producers holding the agent itself.
    pub fn enqueue(&self, payload: Value) {
        self.buffer.enqueue(payload);
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats {
            completed: self.counters.completed.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    /// One turn of the consumer loop.
    ///
    /// On an empty buffer this waits for the poll interval and returns `None`
    /// without touching any state. Otherwise it processes exactly one payload.
    /// A payload whose processing fails is logged and also yields `None`.
    pub async fn poll_once(&self) -> Option<MergedResult> {
        if self.buffer.is_empty() {
            tokio::time::sleep(self.poll_interval).await;
            return None;
        }

        let payload = self.buffer.try_take()?;

        match self.executor.process(payload).await {
            Ok(result) => {
                self.counters.completed.fetch_add(1, Ordering::Relaxed);
                Some(result)
            }
            Err(err) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                error!(error = %err, "payload processing failed; result dropped");
                None
            }
        }
    }

    /// Runs the consumer loop until `shutdown` fires or `outbound` closes.
    ///
    /// Shutdown is checked between turns, so an in-flight chain always
    /// finishes and its result is sent.
    pub async fn run(
        &self,
        outbound: mpsc::UnboundedSender<MergedResult>,
        shutdown: CancellationToken,
    ) {
        info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "consumer loop started");
        while !shutdown.is_cancelled() {
            let Some(result) = self.poll_once().await else {
                continue;
            };
            if outbound.send(result).is_err() {
                warn!("outbound channel closed; stopping consumer loop");
                break;
            }
        }
        info!(stats = ?self.stats(), "consumer loop stopped");
    }
}
