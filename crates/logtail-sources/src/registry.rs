// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Backend registry and bootstrap.
//!
//! Takes the declarative source table from the configuration, validates
//! every entry against a capability table (platform support is data, not a
//! crash), and only then starts the backends. A single invalid declaration
//! aborts the whole bootstrap; there is no partial start.

use std::fmt;
use std::path::PathBuf;
use std::thread::JoinHandle;

use serde::Deserialize;
use tracing::info;

use logtail_core::QueueHandle;

use crate::error::SourceError;
use crate::file::FileSource;

/// The backend kinds this agent knows how to tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Journal,
    EventLog,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::File, SourceKind::Journal, SourceKind::EventLog];

    /// Maps a declaration's `type` value to a kind. Aliases cover the names
    /// the platforms themselves use.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "file" => Some(SourceKind::File),
            "journal" | "journald" => Some(SourceKind::Journal),
            "eventlog" | "event_log" | "winevent" => Some(SourceKind::EventLog),
            _ => None,
        }
    }

    /// Whether this backend can run on the current platform. Being
    /// unsupported is a normal, reportable condition.
    #[must_use]
    pub fn platform_supported(self) -> bool {
        match self {
            SourceKind::File => true,
            SourceKind::Journal => cfg!(target_os = "linux"),
            SourceKind::EventLog => cfg!(windows),
        }
    }

    #[must_use]
    fn as_str(self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::Journal => "journal",
            SourceKind::EventLog => "eventlog",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One backend declaration as it appears in the configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDecl {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub identifier: Option<String>,
    /// File backends: path of the tailed file.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Event-log backends: name of the log to follow.
    #[serde(default)]
    pub log_name: Option<String>,
}

/// A declaration that passed validation.
#[derive(Debug)]
enum ValidatedDecl {
    File { identifier: String, path: PathBuf },
    Journal { identifier: String },
    EventLog { identifier: String, log_name: String },
}

/// Starts the configured backends against the shared queue.
pub struct Registry {
    queue: QueueHandle,
}

impl Registry {
    #[must_use]
    pub fn new(queue: QueueHandle) -> Self {
        Registry { queue }
    }

    /// Validates every declaration, then starts every backend. Returns the
    /// producer thread handles, or the first error with nothing started.
    pub fn start_all(&self, decls: &[SourceDecl]) -> Result<Vec<JoinHandle<()>>, SourceError> {
        let validated = decls
            .iter()
            .map(validate_decl)
            .collect::<Result<Vec<_>, _>>()?;

        let mut handles = Vec::with_capacity(validated.len());
        for decl in validated {
            handles.push(self.start(decl)?);
        }

        info!(
            target: "logtail::registry",
            backends = handles.len(),
            "source backends started"
        );
        Ok(handles)
    }

    fn start(&self, decl: ValidatedDecl) -> Result<JoinHandle<()>, SourceError> {
        match decl {
            ValidatedDecl::File { identifier, path } => {
                FileSource::new(identifier, path).spawn(self.queue.clone())
            }
            ValidatedDecl::Journal { identifier } => self.start_journal(identifier),
            ValidatedDecl::EventLog {
                identifier,
                log_name,
            } => self.start_eventlog(identifier, log_name),
        }
    }

    #[cfg(target_os = "linux")]
    fn start_journal(&self, identifier: String) -> Result<JoinHandle<()>, SourceError> {
        crate::journal::JournalSource::new(identifier).spawn(self.queue.clone())
    }

    #[cfg(not(target_os = "linux"))]
    fn start_journal(&self, _identifier: String) -> Result<JoinHandle<()>, SourceError> {
        Err(SourceError::Unsupported(SourceKind::Journal))
    }

    #[cfg(windows)]
    fn start_eventlog(
        &self,
        identifier: String,
        log_name: String,
    ) -> Result<JoinHandle<()>, SourceError> {
        crate::eventlog::EventLogSource::new(identifier, log_name).spawn(self.queue.clone())
    }

    #[cfg(not(windows))]
    fn start_eventlog(
        &self,
        _identifier: String,
        _log_name: String,
    ) -> Result<JoinHandle<()>, SourceError> {
        Err(SourceError::Unsupported(SourceKind::EventLog))
    }
}

fn validate_decl(decl: &SourceDecl) -> Result<ValidatedDecl, SourceError> {
    let kind =
        SourceKind::parse(&decl.kind).ok_or_else(|| SourceError::UnknownKind(decl.kind.clone()))?;

    if !kind.platform_supported() {
        return Err(SourceError::Unsupported(kind));
    }

    let identifier = decl
        .identifier
        .clone()
        .filter(|value| !value.is_empty())
        .ok_or(SourceError::MissingKey {
            kind,
            key: "identifier",
        })?;

    match kind {
        SourceKind::File => {
            let path = decl
                .path
                .clone()
                .filter(|value| !value.as_os_str().is_empty())
                .ok_or(SourceError::MissingKey { kind, key: "path" })?;
            Ok(ValidatedDecl::File { identifier, path })
        }
        SourceKind::Journal => Ok(ValidatedDecl::Journal { identifier }),
        SourceKind::EventLog => {
            let log_name = decl
                .log_name
                .clone()
                .filter(|value| !value.is_empty())
                .ok_or(SourceError::MissingKey {
                    kind,
                    key: "log_name",
                })?;
            Ok(ValidatedDecl::EventLog {
                identifier,
                log_name,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(kind: &str) -> SourceDecl {
        SourceDecl {
            kind: kind.to_string(),
            identifier: Some("test".to_string()),
            path: None,
            log_name: None,
        }
    }

    #[test]
    fn kind_parsing_covers_aliases() {
        assert_eq!(SourceKind::parse("file"), Some(SourceKind::File));
        assert_eq!(SourceKind::parse("journal"), Some(SourceKind::Journal));
        assert_eq!(SourceKind::parse("journald"), Some(SourceKind::Journal));
        assert_eq!(SourceKind::parse("eventlog"), Some(SourceKind::EventLog));
        assert_eq!(SourceKind::parse("winevent"), Some(SourceKind::EventLog));
        assert_eq!(SourceKind::parse("syslog"), None);
    }

    #[test]
    fn exactly_one_platform_gated_backend_is_supported() {
        assert!(SourceKind::File.platform_supported());
        // Journal and event log are mutually exclusive by platform.
        assert!(
            !(SourceKind::Journal.platform_supported()
                && SourceKind::EventLog.platform_supported())
        );
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = validate_decl(&decl("syslog"));
        assert!(matches!(result, Err(SourceError::UnknownKind(k)) if k == "syslog"));
    }

    #[test]
    fn identifier_is_required_for_every_kind() {
        let mut d = decl("file");
        d.identifier = None;
        d.path = Some(PathBuf::from("/var/log/app.log"));
        assert!(matches!(
            validate_decl(&d),
            Err(SourceError::MissingKey {
                key: "identifier",
                ..
            })
        ));
    }

    #[test]
    fn file_declarations_require_a_path() {
        let d = decl("file");
        assert!(matches!(
            validate_decl(&d),
            Err(SourceError::MissingKey { key: "path", .. })
        ));
    }

    #[cfg(not(windows))]
    #[test]
    fn eventlog_is_reported_unsupported_off_windows() {
        let mut d = decl("eventlog");
        d.log_name = Some("Application".to_string());
        assert!(matches!(
            validate_decl(&d),
            Err(SourceError::Unsupported(SourceKind::EventLog))
        ));
    }

    #[test]
    fn one_bad_declaration_aborts_the_whole_bootstrap() {
        let dir = tempfile::tempdir().unwrap();
        let good_path = dir.path().join("good.log");
        std::fs::write(&good_path, b"seed\n").unwrap();

        let mut good = decl("file");
        good.path = Some(good_path);
        let bad = decl("nonsense");

        let queue = QueueHandle::new(8);
        let registry = Registry::new(queue);
        let result = registry.start_all(&[good, bad]);
        assert!(matches!(result, Err(SourceError::UnknownKind(_))));
    }

    #[test]
    fn valid_file_declarations_start() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"seed\n").unwrap();

        let mut d = decl("file");
        d.path = Some(path);

        let queue = QueueHandle::new(8);
        let registry = Registry::new(queue);
        let handles = registry.start_all(&[d]).unwrap();
        assert_eq!(handles.len(), 1);
    }
}
