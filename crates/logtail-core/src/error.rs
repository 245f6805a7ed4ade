// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Failure to hand a single entry to the collector.
///
/// The dispatcher treats every variant the same way: log it, discard the
/// entry, and keep going with the rest of the drain pass. The transport is
/// responsible for flipping its session to `Faulted` on I/O variants.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// No authenticated session is currently active.
    #[error("no active session")]
    NotConnected,

    /// The entry could not be encoded into a wire message.
    #[error("failed to encode log message: {0}")]
    Encode(#[from] serde_json::Error),

    /// Writing the frame to the collector failed.
    #[error("session write failed: {0}")]
    Write(#[from] std::io::Error),
}
