// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! systemd journal tail backend (linux only).
//!
//! Attaches at the journal tail, blocks on the journal's own wait
//! primitive, and walks the new records on each wake. Every key/value
//! field on a record is folded into one JSON object so the collector sees
//! the complete structured payload. The journal reader is not `Send`, so
//! it is opened on the producer thread itself and the open result is
//! reported back over a readiness channel.

use std::collections::BTreeMap;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use journald::reader::{JournalReader, JournalReaderConfig, JournalSeek};
use tracing::{error, info, warn};

use logtail_core::{epoch_micros, LogEntry, QueueHandle};

use crate::error::SourceError;
use crate::registry::SourceKind;

pub struct JournalSource {
    identifier: String,
}

impl JournalSource {
    #[must_use]
    pub fn new(identifier: impl Into<String>) -> Self {
        JournalSource {
            identifier: identifier.into(),
        }
    }

    /// Opens the journal on a dedicated thread and starts tailing. An open
    /// failure is reported back to the registry and the loop never runs.
    pub fn spawn(self, queue: QueueHandle) -> Result<JoinHandle<()>, SourceError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_name = format!("logtail-journal-{}", self.identifier);

        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let mut reader = match open_at_tail() {
                    Ok(reader) => {
                        let _ = ready_tx.send(Ok(()));
                        reader
                    }
                    Err(reason) => {
                        let _ = ready_tx.send(Err(reason));
                        return;
                    }
                };
                run(&mut reader, &self.identifier, &queue);
            })
            .map_err(|e| SourceError::Unavailable {
                kind: SourceKind::Journal,
                reason: format!("failed to spawn the tail thread: {e}"),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(target: "logtail::journal", "journal tail started");
                Ok(handle)
            }
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(SourceError::Unavailable {
                    kind: SourceKind::Journal,
                    reason,
                })
            }
            Err(_) => {
                let _ = handle.join();
                Err(SourceError::Unavailable {
                    kind: SourceKind::Journal,
                    reason: "journal thread died during startup".to_string(),
                })
            }
        }
    }
}

fn open_at_tail() -> Result<JournalReader, String> {
    let config = JournalReaderConfig::default();
    let mut reader =
        JournalReader::open(&config).map_err(|e| format!("failed to open the journal: {e}"))?;
    reader
        .seek(JournalSeek::Tail)
        .map_err(|e| format!("failed to seek to the journal tail: {e}"))?;
    // Step back one record so the next forward walk begins exactly at the
    // first record written after attach.
    let _ = reader
        .previous_entry()
        .map_err(|e| format!("failed to position at the journal tail: {e}"))?;
    Ok(reader)
}

fn run(reader: &mut JournalReader, identifier: &str, queue: &QueueHandle) {
    loop {
        if let Err(e) = reader.wait() {
            error!(
                target: "logtail::journal",
                error = %e,
                "journal wait failed, stopping this tail"
            );
            return;
        }

        // A wake with nothing new is fine; the walk below just comes up
        // empty.
        let mut batch = Vec::new();
        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    let timestamp = entry
                        .get_source_wallclock_time()
                        .map(|t| t.timestamp_us)
                        .unwrap_or_else(epoch_micros);
                    match normalize(identifier, timestamp, &entry.fields) {
                        Some(log_entry) => batch.push(log_entry),
                        None => {
                            warn!(
                                target: "logtail::journal",
                                "skipping journal record with no usable fields"
                            );
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!(
                        target: "logtail::journal",
                        error = %e,
                        "journal read failed, stopping this tail"
                    );
                    return;
                }
            }
        }

        for entry in batch {
            queue.push(entry);
        }
    }
}

/// Folds every field of a record into one JSON object. Records with no
/// fields at all are treated as corrupt and skipped.
fn normalize(
    identifier: &str,
    timestamp: i64,
    record_fields: &BTreeMap<String, String>,
) -> Option<LogEntry> {
    if record_fields.is_empty() {
        return None;
    }

    let mut fields = serde_json::Map::with_capacity(record_fields.len());
    for (key, value) in record_fields {
        fields.insert(key.clone(), serde_json::Value::String(value.clone()));
    }

    Some(LogEntry::new(
        identifier,
        timestamp,
        serde_json::Value::Object(fields).to_string(),
    ))
}
