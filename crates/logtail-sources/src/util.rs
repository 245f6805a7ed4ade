// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Helpers shared by the source backends.

/// Reorders a batch collected from a backward-enumerating source.
///
/// Sources that can only be walked newest-first (the event log; the journal
/// when catching up from a cursor) collect into a temporary buffer and run
/// this single reverse pass before emission, so entries always leave a
/// backend oldest-first.
#[must_use]
pub fn into_oldest_first<T>(mut newest_first: Vec<T>) -> Vec<T> {
    newest_first.reverse();
    newest_first
}
