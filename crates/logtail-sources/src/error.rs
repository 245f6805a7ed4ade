// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

use crate::registry::SourceKind;

/// Why a backend could not be validated or started.
///
/// Any of these aborts the whole bootstrap; mid-loop failures never take
/// this form, they terminate the owning backend thread with a diagnostic.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unknown source type '{0}'")]
    UnknownKind(String),

    #[error("source type '{0}' is not supported on this platform")]
    Unsupported(SourceKind),

    #[error("{kind} source declaration is missing required key '{key}'")]
    MissingKey {
        kind: SourceKind,
        key: &'static str,
    },

    #[error("failed to open {kind} source: {reason}")]
    Unavailable { kind: SourceKind, reason: String },
}
