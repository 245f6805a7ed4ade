// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire messages exchanged with the collector.
//!
//! Two message kinds leave the agent: an auth request answered by a single
//! reply frame, and log messages with no response expected. Everything is
//! UTF-8 JSON inside NUL-terminated frames.

use logtail_core::{Identity, LogEntry};
use serde::{Deserialize, Serialize};

/// `{"command":"auth","identity":...,"data":{"password":...}}`
#[derive(Debug, Serialize)]
pub struct AuthRequest<'a> {
    command: &'static str,
    identity: &'a str,
    data: AuthData<'a>,
}

#[derive(Debug, Serialize)]
struct AuthData<'a> {
    password: &'a str,
}

impl<'a> AuthRequest<'a> {
    #[must_use]
    pub fn new(identity: &'a Identity) -> Self {
        AuthRequest {
            command: "auth",
            identity: identity.name(),
            data: AuthData {
                password: identity.secret(),
            },
        }
    }
}

/// `{"command":"log","identity":...,"data":{identifier,timestamp,message}}`
#[derive(Debug, Serialize)]
pub struct LogMessage<'a> {
    command: &'static str,
    identity: &'a str,
    data: &'a LogEntry,
}

impl<'a> LogMessage<'a> {
    #[must_use]
    pub fn new(identity: &'a str, entry: &'a LogEntry) -> Self {
        LogMessage {
            command: "log",
            identity,
            data: entry,
        }
    }
}

/// Reply to an auth request. The session goes Active only on a well-formed
/// reply carrying exactly `"authenticated"`; anything else is a rejection.
#[derive(Debug, Deserialize)]
pub struct AuthReply {
    #[serde(default)]
    auth: Option<String>,
}

impl AuthReply {
    pub const AUTHENTICATED: &'static str = "authenticated";

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.auth.as_deref() == Some(Self::AUTHENTICATED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_request_wire_shape() {
        let identity = Identity::new("edge-42", "hunter2");
        let value = serde_json::to_value(AuthRequest::new(&identity)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "command": "auth",
                "identity": "edge-42",
                "data": {"password": "hunter2"},
            })
        );
    }

    #[test]
    fn log_message_wire_shape() {
        let entry = LogEntry::new("syslog", 1234, "boot complete");
        let value = serde_json::to_value(LogMessage::new("edge-42", &entry)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "command": "log",
                "identity": "edge-42",
                "data": {
                    "identifier": "syslog",
                    "timestamp": 1234,
                    "message": "boot complete",
                },
            })
        );
    }

    #[test]
    fn only_the_exact_reply_authenticates() {
        let ok: AuthReply = serde_json::from_str(r#"{"auth":"authenticated"}"#).unwrap();
        assert!(ok.is_authenticated());

        let denied: AuthReply = serde_json::from_str(r#"{"auth":"denied"}"#).unwrap();
        assert!(!denied.is_authenticated());

        let unrelated: AuthReply = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(!unrelated.is_authenticated());
    }
}
