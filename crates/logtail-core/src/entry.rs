// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Normalized log entry flowing from a source backend to the collector.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

/// One log record as seen by the queue, the dispatcher, and the wire
/// protocol. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    identifier: String,
    timestamp: i64,
    message: String,
}

impl LogEntry {
    /// Builds an entry with an explicit acquisition timestamp in
    /// microseconds since the Unix epoch.
    pub fn new(
        identifier: impl Into<String>,
        timestamp: i64,
        message: impl Into<String>,
    ) -> Self {
        LogEntry {
            identifier: identifier.into(),
            timestamp,
            message: message.into(),
        }
    }

    /// Builds an entry stamped with the current clock reading.
    pub fn now(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(identifier, epoch_micros(), message)
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Current wallclock in microseconds since the Unix epoch.
///
/// Saturates to 0 for clocks set before 1970 rather than panicking in a
/// producer loop.
#[must_use]
pub fn epoch_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Identity presented to the collector during authentication. Loaded once
/// at startup, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Identity {
    name: String,
    secret: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Identity {
            name: name.into(),
            secret: secret.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_accessors_round_trip() {
        let entry = LogEntry::new("syslog", 1_700_000_000_000_000, "hello");
        assert_eq!(entry.identifier(), "syslog");
        assert_eq!(entry.timestamp(), 1_700_000_000_000_000);
        assert_eq!(entry.message(), "hello");
    }

    #[test]
    fn now_stamps_a_plausible_clock() {
        let before = epoch_micros();
        let entry = LogEntry::now("syslog", "hello");
        let after = epoch_micros();
        assert!(entry.timestamp() >= before);
        assert!(entry.timestamp() <= after);
    }

    #[test]
    fn entry_serializes_with_wire_field_names() {
        let entry = LogEntry::new("app", 42, "line");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"identifier": "app", "timestamp": 42, "message": "line"})
        );
    }
}
