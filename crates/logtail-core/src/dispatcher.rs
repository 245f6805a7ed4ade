// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Interval-driven dispatch loop draining the ingestion queue towards the
//! transport.
//!
//! The dispatcher is the only consumer of the queue. Every tick it takes
//! the whole backlog in one locked drain, then forwards entry by entry with
//! the lock already released. Delivery is fire-and-forget: a failed send is
//! logged and the entry discarded, and the rest of the pass still runs, so
//! one bad entry or a dead session never wedges the queue.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::entry::LogEntry;
use crate::error::ForwardError;
use crate::queue::QueueHandle;

/// Sink for drained entries. Implemented by the transport handle; tests
/// substitute mocks.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, entry: &LogEntry) -> Result<(), ForwardError>;
}

/// Drains the queue on a fixed interval and hands entries to a
/// [`Forwarder`].
pub struct Dispatcher {
    queue: QueueHandle,
    forwarder: Arc<dyn Forwarder>,
    dispatch_interval: Duration,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        queue: QueueHandle,
        forwarder: Arc<dyn Forwarder>,
        dispatch_interval: Duration,
    ) -> Self {
        Dispatcher {
            queue,
            forwarder,
            dispatch_interval,
        }
    }

    /// Runs until cancellation, then performs one final drain so entries
    /// queued during shutdown still get a chance to leave.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.dispatch_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.dispatch_pass().await;
                }
                () = cancel.cancelled() => {
                    debug!(target: "logtail::dispatch", "shutdown requested, draining once more");
                    self.dispatch_pass().await;
                    return;
                }
            }
        }
    }

    async fn dispatch_pass(&self) {
        let entries = self.queue.drain();
        if entries.is_empty() {
            return;
        }

        debug!(
            target: "logtail::dispatch",
            count = entries.len(),
            "dispatching queued entries"
        );

        let total = entries.len();
        let mut dropped = 0usize;
        for entry in &entries {
            if let Err(e) = self.forwarder.forward(entry).await {
                dropped += 1;
                debug!(
                    target: "logtail::dispatch",
                    identifier = entry.identifier(),
                    error = %e,
                    "failed to forward entry, discarding"
                );
            }
        }

        if dropped > 0 {
            warn!(
                target: "logtail::dispatch",
                dropped,
                total,
                "discarded entries that could not be forwarded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every forwarded entry; optionally fails on selected
    /// messages.
    struct RecordingForwarder {
        seen: Mutex<Vec<LogEntry>>,
        fail_on: Option<String>,
    }

    impl RecordingForwarder {
        fn new() -> Self {
            RecordingForwarder {
                seen: Mutex::new(Vec::new()),
                fail_on: None,
            }
        }

        fn failing_on(message: &str) -> Self {
            RecordingForwarder {
                seen: Mutex::new(Vec::new()),
                fail_on: Some(message.to_string()),
            }
        }

        fn seen(&self) -> Vec<LogEntry> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Forwarder for RecordingForwarder {
        async fn forward(&self, entry: &LogEntry) -> Result<(), ForwardError> {
            if self.fail_on.as_deref() == Some(entry.message()) {
                return Err(ForwardError::NotConnected);
            }
            self.seen.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn entry(n: usize) -> LogEntry {
        LogEntry::new("test", n as i64, format!("message {n}"))
    }

    #[tokio::test]
    async fn pass_forwards_in_insertion_order() {
        let queue = QueueHandle::new(16);
        for n in 0..5 {
            queue.push(entry(n));
        }
        let forwarder = Arc::new(RecordingForwarder::new());
        let dispatcher = Dispatcher::new(
            queue.clone(),
            forwarder.clone(),
            Duration::from_millis(10),
        );

        dispatcher.dispatch_pass().await;

        assert_eq!(forwarder.seen(), (0..5).map(entry).collect::<Vec<_>>());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_pass() {
        let queue = QueueHandle::new(16);
        for n in 0..4 {
            queue.push(entry(n));
        }
        let forwarder = Arc::new(RecordingForwarder::failing_on("message 1"));
        let dispatcher = Dispatcher::new(
            queue.clone(),
            forwarder.clone(),
            Duration::from_millis(10),
        );

        dispatcher.dispatch_pass().await;

        // The failed entry is discarded, the rest still went through, and
        // nothing was left on the queue.
        assert_eq!(forwarder.seen(), vec![entry(0), entry(2), entry(3)]);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_drains_on_each_tick() {
        let queue = QueueHandle::new(16);
        let forwarder = Arc::new(RecordingForwarder::new());
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(
            queue.clone(),
            forwarder.clone(),
            Duration::from_millis(500),
        );

        queue.push(entry(0));
        let task = tokio::spawn(dispatcher.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(forwarder.seen().len(), 1);

        queue.push(entry(1));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(forwarder.seen().len(), 2);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_triggers_a_final_drain() {
        let queue = QueueHandle::new(16);
        let forwarder = Arc::new(RecordingForwarder::new());
        let cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(queue.clone(), forwarder.clone(), Duration::from_secs(60));

        let task = tokio::spawn(dispatcher.run(cancel.clone()));
        tokio::task::yield_now().await;

        // Queued after the loop started, cancelled long before the next
        // tick: only the shutdown drain can deliver it.
        queue.push(entry(0));
        cancel.cancel();
        task.await.unwrap();

        assert_eq!(forwarder.seen(), vec![entry(0)]);
    }
}
