// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Source backends feeding the logtail ingestion queue.
//!
//! Each backend watches one platform log source (plain-text file, systemd
//! journal, Windows event log) on a dedicated thread for the process
//! lifetime, normalizes new records into [`logtail_core::LogEntry`] values,
//! and pushes them into the shared queue. The [`registry`] validates the
//! configured set of backends and starts them fail-closed.

pub mod error;
pub mod file;
pub mod registry;
pub mod util;
mod watch;

#[cfg(target_os = "linux")]
pub mod journal;

#[cfg(windows)]
pub mod eventlog;

pub use error::SourceError;
pub use file::FileSource;
pub use registry::{Registry, SourceDecl, SourceKind};
