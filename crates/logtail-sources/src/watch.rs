// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! File-change notification for the file tail backend.
//!
//! Watches the parent directory and filters events down to the tailed file,
//! with a bounded poll fallback so a lost notification can only delay a
//! read, never stall it forever.

use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    /// The watched file changed.
    Changed,
    /// Nothing arrived within the fallback window; caller polls the file.
    Poll,
}

pub(crate) struct FileWatcher {
    _watcher: RecommendedWatcher,
    events: mpsc::Receiver<notify::Result<Event>>,
    file_name: OsString,
}

impl FileWatcher {
    pub(crate) fn new(path: &Path) -> notify::Result<Self> {
        let file_name = path
            .file_name()
            .ok_or_else(|| notify::Error::generic("watched path has no file name"))?
            .to_os_string();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let (tx, rx) = mpsc::channel();
        let mut watcher = recommended_watcher(tx)?;
        watcher.watch(directory, RecursiveMode::NonRecursive)?;

        debug!(
            target: "logtail::file",
            directory = %directory.display(),
            file = %file_name.to_string_lossy(),
            "directory watch installed"
        );

        Ok(FileWatcher {
            _watcher: watcher,
            events: rx,
            file_name,
        })
    }

    /// Blocks until the tailed file changes or the fallback elapses.
    /// Returns `None` once the watcher backend is gone.
    pub(crate) fn wait(&self, poll_fallback: Duration) -> Option<Wake> {
        loop {
            match self.events.recv_timeout(poll_fallback) {
                Ok(Ok(event)) => {
                    if self.is_relevant(&event) {
                        return Some(Wake::Changed);
                    }
                }
                Ok(Err(e)) => {
                    warn!(target: "logtail::file", error = %e, "watch backend reported an error");
                }
                Err(RecvTimeoutError::Timeout) => return Some(Wake::Poll),
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        let touches_file = event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(self.file_name.as_os_str()));
        touches_file
            && matches!(
                event.kind,
                EventKind::Any | EventKind::Create(_) | EventKind::Modify(_)
            )
    }
}
