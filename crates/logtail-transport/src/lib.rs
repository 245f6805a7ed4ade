// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Best-effort persistent transport to the log collector.
//!
//! One TLS client session at a time walks the
//! connect → authenticate → stream state machine; any fault tears the
//! session down and the supervisor retries forever on a fixed delay. Log
//! messages are fire-and-forget NUL-terminated JSON frames.

pub mod framing;
pub mod protocol;
pub mod session;

pub use framing::{FrameError, FrameReader};
pub use session::{SessionState, Supervisor, TransportConfig, TransportError, TransportHandle};
