// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Windows event log tail backend (windows only).
//!
//! Attaches at the newest record of the configured log, waits on the
//! change-notification event, and on each wake collects the records newer
//! than the remembered record number. The log is enumerated newest-first,
//! so the batch is collected backward and reversed once before emission.
//! Each record is normalized into a JSON object carrying the source name,
//! the translated event type, category, both timestamps, and the joined
//! description strings. Raw handles are not `Send`, so the log is opened on
//! the producer thread and the open result travels back over a readiness
//! channel.

use std::mem::size_of;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use tracing::{error, info, warn};

use windows_sys::Win32::Foundation::{
    CloseHandle, GetLastError, ERROR_HANDLE_EOF, ERROR_INSUFFICIENT_BUFFER, HANDLE, WAIT_OBJECT_0,
};
use windows_sys::Win32::System::EventLog::{
    CloseEventLog, GetNumberOfEventLogRecords, GetOldestEventLogRecord, NotifyChangeEventLog,
    OpenEventLogW, ReadEventLogW, EVENTLOGRECORD, EVENTLOG_AUDIT_FAILURE, EVENTLOG_AUDIT_SUCCESS,
    EVENTLOG_ERROR_TYPE, EVENTLOG_FORWARDS_READ, EVENTLOG_INFORMATION_TYPE, EVENTLOG_SEEK_READ,
    EVENTLOG_WARNING_TYPE,
};
use windows_sys::Win32::System::Threading::{CreateEventW, WaitForSingleObject, INFINITE};

use logtail_core::{LogEntry, QueueHandle};

use crate::error::SourceError;
use crate::registry::SourceKind;
use crate::util::into_oldest_first;

pub struct EventLogSource {
    identifier: String,
    log_name: String,
}

impl EventLogSource {
    #[must_use]
    pub fn new(identifier: impl Into<String>, log_name: impl Into<String>) -> Self {
        EventLogSource {
            identifier: identifier.into(),
            log_name: log_name.into(),
        }
    }

    /// Opens the log on a dedicated thread and starts tailing. An open
    /// failure is reported back to the registry and the loop never runs.
    pub fn spawn(self, queue: QueueHandle) -> Result<JoinHandle<()>, SourceError> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let thread_name = format!("logtail-eventlog-{}", self.identifier);

        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || {
                let handles = match open(&self.log_name) {
                    Ok(handles) => {
                        let _ = ready_tx.send(Ok(()));
                        handles
                    }
                    Err(reason) => {
                        let _ = ready_tx.send(Err(reason));
                        return;
                    }
                };
                run(&handles, &self.identifier, &self.log_name, &queue);
            })
            .map_err(|e| SourceError::Unavailable {
                kind: SourceKind::EventLog,
                reason: format!("failed to spawn the tail thread: {e}"),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(target: "logtail::eventlog", "event log tail started");
                Ok(handle)
            }
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(SourceError::Unavailable {
                    kind: SourceKind::EventLog,
                    reason,
                })
            }
            Err(_) => {
                let _ = handle.join();
                Err(SourceError::Unavailable {
                    kind: SourceKind::EventLog,
                    reason: "event log thread died during startup".to_string(),
                })
            }
        }
    }
}

/// Open log handle plus the change-notification event tied to it.
struct LogHandles {
    log: HANDLE,
    wake: HANDLE,
}

impl Drop for LogHandles {
    fn drop(&mut self) {
        unsafe {
            CloseEventLog(self.log);
            CloseHandle(self.wake);
        }
    }
}

fn open(log_name: &str) -> Result<LogHandles, String> {
    let wide_name = to_wide(log_name);

    let log = unsafe { OpenEventLogW(std::ptr::null(), wide_name.as_ptr()) };
    if log.is_null() {
        return Err(format!(
            "failed to open '{log_name}', error: 0x{:08X}",
            unsafe { GetLastError() }
        ));
    }

    // Auto-reset so every wake observes exactly one signal.
    let wake = unsafe { CreateEventW(std::ptr::null(), 0, 0, std::ptr::null()) };
    if wake.is_null() {
        let status = unsafe { GetLastError() };
        unsafe { CloseEventLog(log) };
        return Err(format!(
            "failed to create the wait event for '{log_name}', error: 0x{status:08X}"
        ));
    }

    if unsafe { NotifyChangeEventLog(log, wake) } == 0 {
        let status = unsafe { GetLastError() };
        unsafe {
            CloseHandle(wake);
            CloseEventLog(log);
        }
        return Err(format!(
            "failed to register for changes on '{log_name}', error: 0x{status:08X}"
        ));
    }

    Ok(LogHandles { log, wake })
}

fn run(handles: &LogHandles, identifier: &str, log_name: &str, queue: &QueueHandle) {
    // Attach at the newest existing record; no historical replay.
    let mut cursor = match newest_record_number(handles.log) {
        Ok(number) => number,
        Err(status) => {
            error!(
                target: "logtail::eventlog",
                log_name,
                "failed to locate the newest record, error: 0x{status:08X}"
            );
            return;
        }
    };

    loop {
        let wait = unsafe { WaitForSingleObject(handles.wake, INFINITE) };
        if wait != WAIT_OBJECT_0 {
            error!(
                target: "logtail::eventlog",
                log_name,
                "wait on the change event failed (status {wait}), stopping this tail"
            );
            return;
        }

        let newest = match newest_record_number(handles.log) {
            Ok(number) => number,
            Err(status) => {
                error!(
                    target: "logtail::eventlog",
                    log_name,
                    "failed to count records, error: 0x{status:08X}"
                );
                return;
            }
        };
        if newest <= cursor {
            // Spurious wake.
            continue;
        }

        // The log enumerates newest-first: collect backward down to the
        // remembered record, reverse once, emit oldest-first.
        let mut batch = Vec::new();
        let mut record_number = newest;
        while record_number > cursor {
            match read_record(handles.log, record_number) {
                Ok(buffer) => match normalize(identifier, log_name, &buffer) {
                    Some(entry) => batch.push(entry),
                    None => {
                        warn!(
                            target: "logtail::eventlog",
                            log_name, record_number,
                            "skipping corrupt event record"
                        );
                    }
                },
                Err(status) if status == ERROR_HANDLE_EOF => break,
                Err(status) => {
                    error!(
                        target: "logtail::eventlog",
                        log_name, record_number,
                        "failed to read a record, error: 0x{status:08X}; stopping this tail"
                    );
                    return;
                }
            }
            record_number -= 1;
        }
        cursor = newest;

        for entry in into_oldest_first(batch) {
            queue.push(entry);
        }
    }
}

/// Record number of the newest record, or 0 for an empty log.
fn newest_record_number(log: HANDLE) -> Result<u32, u32> {
    let mut oldest = 0u32;
    if unsafe { GetOldestEventLogRecord(log, &mut oldest) } == 0 {
        return Err(unsafe { GetLastError() });
    }
    let mut count = 0u32;
    if unsafe { GetNumberOfEventLogRecords(log, &mut count) } == 0 {
        return Err(unsafe { GetLastError() });
    }
    if count == 0 {
        return Ok(0);
    }
    Ok(oldest.wrapping_add(count).wrapping_sub(1))
}

/// Reads one record by number, growing the buffer once when probed.
fn read_record(log: HANDLE, record_number: u32) -> Result<Vec<u8>, u32> {
    let flags = EVENTLOG_SEEK_READ | EVENTLOG_FORWARDS_READ;
    let mut probe = [0u8; size_of::<EVENTLOGRECORD>()];
    let mut bytes_read = 0u32;
    let mut bytes_needed = 0u32;

    let ok = unsafe {
        ReadEventLogW(
            log,
            flags,
            record_number,
            probe.as_mut_ptr().cast(),
            probe.len() as u32,
            &mut bytes_read,
            &mut bytes_needed,
        )
    };
    if ok != 0 {
        return Ok(probe[..bytes_read as usize].to_vec());
    }

    let status = unsafe { GetLastError() };
    if status != ERROR_INSUFFICIENT_BUFFER {
        return Err(status);
    }

    let mut buffer = vec![0u8; bytes_needed as usize];
    let ok = unsafe {
        ReadEventLogW(
            log,
            flags,
            record_number,
            buffer.as_mut_ptr().cast(),
            buffer.len() as u32,
            &mut bytes_read,
            &mut bytes_needed,
        )
    };
    if ok == 0 {
        return Err(unsafe { GetLastError() });
    }
    buffer.truncate(bytes_read as usize);
    Ok(buffer)
}

/// Normalizes one raw record into an entry. Returns `None` for records that
/// are too short, carry no event id, or whose strings fall outside the
/// buffer.
fn normalize(identifier: &str, log_name: &str, buffer: &[u8]) -> Option<LogEntry> {
    if buffer.len() < size_of::<EVENTLOGRECORD>() {
        return None;
    }
    // The buffer comes from a Vec<u8>; read unaligned rather than casting.
    let record = unsafe { std::ptr::read_unaligned(buffer.as_ptr().cast::<EVENTLOGRECORD>()) };
    if record.EventID == 0 {
        return None;
    }

    let (source_name, _) = wide_string_at(buffer, size_of::<EVENTLOGRECORD>())?;

    let mut description_parts = Vec::with_capacity(record.NumStrings as usize);
    let mut offset = record.StringOffset as usize;
    for _ in 0..record.NumStrings {
        let (part, next) = wide_string_at(buffer, offset)?;
        description_parts.push(part);
        offset = next;
    }

    let data = serde_json::json!({
        "event_source": log_name,
        "event_type": event_type_label(record.EventType),
        "event_category": record.EventCategory,
        "time_generated": record.TimeGenerated,
        "time_written": record.TimeWritten,
        "source_name": source_name,
        "description": description_parts.join("\n"),
    });

    Some(LogEntry::now(identifier, data.to_string()))
}

/// Reads a NUL-terminated UTF-16LE string starting at `offset`. Returns the
/// string and the offset just past its terminator.
fn wide_string_at(buffer: &[u8], offset: usize) -> Option<(String, usize)> {
    let mut units = Vec::new();
    let mut pos = offset;
    loop {
        let bytes = buffer.get(pos..pos + 2)?;
        let unit = u16::from_le_bytes([bytes[0], bytes[1]]);
        pos += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    Some((String::from_utf16_lossy(&units), pos))
}

fn event_type_label(value: u16) -> &'static str {
    match value {
        EVENTLOG_ERROR_TYPE => "ERROR",
        EVENTLOG_WARNING_TYPE => "WARNING",
        EVENTLOG_INFORMATION_TYPE => "INFORMATION",
        EVENTLOG_AUDIT_SUCCESS => "AUDIT_SUCCESS",
        EVENTLOG_AUDIT_FAILURE => "AUDIT_FAILURE",
        _ => "",
    }
}

fn to_wide(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}
