// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Core pipeline of the logtail agent: the normalized [`LogEntry`] model,
//! the bounded ingestion queue shared by all source backends, and the
//! dispatcher that drains it on a fixed interval towards a [`Forwarder`].

pub mod dispatcher;
pub mod entry;
pub mod error;
pub mod queue;

pub use dispatcher::{Dispatcher, Forwarder};
pub use entry::{epoch_micros, Identity, LogEntry};
pub use error::ForwardError;
pub use queue::{LogQueue, QueueHandle};
