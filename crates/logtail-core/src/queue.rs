// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded FIFO ingestion queue shared by every source backend and the
//! dispatcher.
//!
//! The queue evicts its oldest entry when a push would exceed capacity, so
//! pushing never blocks and never fails; a slow or disconnected collector
//! costs the oldest data, not producer liveness. All access goes through
//! [`QueueHandle`], which scopes the mutex to the individual push/drain so
//! the lock can never be held across a network call.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::entry::LogEntry;

/// FIFO buffer of pending log entries with a hard capacity.
#[derive(Debug)]
pub struct LogQueue {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    evicted: u64,
}

impl LogQueue {
    /// Creates a queue holding at most `capacity` entries. A zero capacity
    /// is clamped to one so a push always lands.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        LogQueue {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            evicted: 0,
        }
    }

    /// Appends an entry, evicting the current oldest entry first when the
    /// queue is full.
    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
            debug!(
                target: "logtail::queue",
                capacity = self.capacity,
                "queue full, dropping oldest entry"
            );
        }
        self.entries.push_back(entry);
    }

    /// Removes and returns every queued entry in insertion order.
    pub fn drain(&mut self) -> Vec<LogEntry> {
        self.entries.drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of entries evicted due to overflow since creation.
    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

/// Cloneable handle to the shared queue. Producers and the dispatcher hold
/// copies of this; nothing else touches the inner mutex.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    inner: Arc<Mutex<LogQueue>>,
}

#[allow(clippy::expect_used)]
impl QueueHandle {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        QueueHandle {
            inner: Arc::new(Mutex::new(LogQueue::new(capacity))),
        }
    }

    /// Inserts one entry. Never blocks beyond the queue mutex and never
    /// fails; overflow evicts the oldest entry.
    pub fn push(&self, entry: LogEntry) {
        self.inner.lock().expect("lock poisoned").push(entry);
    }

    /// Takes every queued entry, in insertion order. The lock is released
    /// before the caller forwards anything.
    pub fn drain(&self) -> Vec<LogEntry> {
        self.inner.lock().expect("lock poisoned").drain()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("lock poisoned").is_empty()
    }

    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.inner.lock().expect("lock poisoned").evicted()
    }
}
