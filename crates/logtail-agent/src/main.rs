// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

mod config;
mod logger;

use std::env;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use logtail_core::{Dispatcher, QueueHandle};
use logtail_sources::Registry;
use logtail_transport::Supervisor;

use crate::config::Config;

#[tokio::main]
pub async fn main() {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {e}");
            return;
        }
    };

    let default_level = if config.verbose { "debug" } else { "info" };
    let log_level = env::var("LOGTAIL_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or_else(|_| default_level.to_string());
    let env_filter = format!("rustls=off,notify=off,{log_level}");

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .event_format(logger::Formatter)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(target: "logtail::agent", "logtail agent starting");

    let queue = QueueHandle::new(config.queue_capacity);

    // The connect loop retries forever; it only ever returns when the trust
    // anchor is unusable, and then the rest of the agent keeps running on
    // diagnostics alone.
    let (supervisor, transport) = Supervisor::new(config.transport_config());
    tokio::spawn(async move {
        if let Err(e) = supervisor.run().await {
            error!(
                target: "logtail::agent",
                error = %e,
                "transport supervisor stopped, no logs will be forwarded"
            );
        }
    });

    let registry = Registry::new(queue.clone());
    let source_handles = match registry.start_all(&config.sources) {
        Ok(handles) => handles,
        Err(e) => {
            error!(
                target: "logtail::agent",
                error = %e,
                "source bootstrap failed, shutting down"
            );
            return;
        }
    };
    if source_handles.is_empty() {
        info!(target: "logtail::agent", "no sources configured, nothing will be collected");
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!(target: "logtail::agent", "shutdown signal received");
                cancel.cancel();
            }
        });
    }

    // The dispatcher owns the main task until shutdown; source threads run
    // for the process lifetime and die with it.
    let dispatcher = Dispatcher::new(queue, Arc::new(transport), config.dispatch_interval());
    dispatcher.run(cancel).await;

    info!(target: "logtail::agent", "logtail agent stopped");
}
