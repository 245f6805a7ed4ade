// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Plain-text file tail backend.
//!
//! Attaches at the current end of the file (no historical replay), wakes on
//! directory-watch notifications, and reads everything past the remembered
//! byte offset. NUL and carriage-return bytes are stripped, an implicit
//! trailing newline is added when the freshly read blob lacks one, and each
//! line becomes one entry. A file that shrank below the remembered offset
//! was truncated or rotated: the cursor resets to the start and tailing
//! continues.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use logtail_core::{LogEntry, QueueHandle};

use crate::error::SourceError;
use crate::registry::SourceKind;
use crate::watch::FileWatcher;

/// Upper bound on how long a lost notification can delay a read.
const POLL_FALLBACK: Duration = Duration::from_secs(2);

pub struct FileSource {
    identifier: String,
    path: PathBuf,
}

impl FileSource {
    #[must_use]
    pub fn new(identifier: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        FileSource {
            identifier: identifier.into(),
            path: path.into(),
        }
    }

    /// Validates the source and starts the tail thread. The cursor starts
    /// at the current end of the file.
    pub fn spawn(self, queue: QueueHandle) -> Result<JoinHandle<()>, SourceError> {
        let cursor = std::fs::metadata(&self.path)
            .map_err(|e| SourceError::Unavailable {
                kind: SourceKind::File,
                reason: format!("cannot stat '{}': {e}", self.path.display()),
            })?
            .len();

        let watcher = FileWatcher::new(&self.path).map_err(|e| SourceError::Unavailable {
            kind: SourceKind::File,
            reason: format!("cannot watch '{}': {e}", self.path.display()),
        })?;

        info!(
            target: "logtail::file",
            identifier = %self.identifier,
            path = %self.path.display(),
            "file tail started"
        );

        thread::Builder::new()
            .name(format!("logtail-file-{}", self.identifier))
            .spawn(move || self.run(queue, watcher, cursor))
            .map_err(|e| SourceError::Unavailable {
                kind: SourceKind::File,
                reason: format!("failed to spawn the tail thread: {e}"),
            })
    }

    fn run(self, queue: QueueHandle, watcher: FileWatcher, mut cursor: u64) {
        loop {
            if watcher.wait(POLL_FALLBACK).is_none() {
                error!(
                    target: "logtail::file",
                    path = %self.path.display(),
                    "file watcher is gone, stopping this tail"
                );
                return;
            }

            match read_new(&self.path, cursor) {
                Ok((lines, next_cursor)) => {
                    cursor = next_cursor;
                    for line in lines {
                        debug!(
                            target: "logtail::file",
                            path = %self.path.display(),
                            line = %line,
                            "detected line"
                        );
                        queue.push(LogEntry::now(self.identifier.as_str(), line));
                    }
                }
                Err(e) => {
                    error!(
                        target: "logtail::file",
                        path = %self.path.display(),
                        error = %e,
                        "read failed, stopping this tail"
                    );
                    return;
                }
            }
        }
    }
}

/// Reads everything past `cursor`, split into lines, and returns the new
/// cursor position.
pub(crate) fn read_new(path: &Path, cursor: u64) -> io::Result<(Vec<String>, u64)> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    let mut cursor = cursor;
    if len < cursor {
        warn!(
            target: "logtail::file",
            path = %path.display(),
            "file shrank below the remembered offset, rereading from the start"
        );
        cursor = 0;
    }

    if let Err(e) = file.seek(SeekFrom::Start(cursor)) {
        warn!(
            target: "logtail::file",
            path = %path.display(),
            error = %e,
            "failed to seek to the remembered offset, rereading from the start"
        );
        cursor = 0;
        file.seek(SeekFrom::Start(0))?;
    }

    let mut raw = Vec::new();
    file.read_to_end(&mut raw)?;
    let next_cursor = cursor + raw.len() as u64;

    let mut blob: Vec<u8> = raw.into_iter().filter(|&b| b != 0 && b != b'\r').collect();
    if blob.is_empty() {
        return Ok((Vec::new(), next_cursor));
    }
    if blob.last() != Some(&b'\n') {
        blob.push(b'\n');
    }

    let text = String::from_utf8_lossy(&blob);
    let lines = text.lines().map(str::to_owned).collect();
    Ok((lines, next_cursor))
}
