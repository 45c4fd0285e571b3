// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Opens storage, connects the configured sequence and inbox backends,
//! starts the inbox retryer and the queue consumers, then runs until
//! SIGINT/SIGTERM. Client transports live outside this process and feed
//! the queue through their own `Dispatcher`.

use std::sync::Arc;

use courier_config::model::CourierConfig;
use courier_core::CourierError;
use courier_pipeline::{MessageConsumer, shutdown};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::stack::Stack;

/// Runs the `courier serve` command.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.service.log_level);
    info!(name = %config.service.name, "starting courier serve");

    let cancel = shutdown::install_signal_handler();
    run_until(config, cancel).await
}

/// Serves until `cancel` fires, then shuts down consumers, the retryer,
/// and storage in that order.
pub async fn run_until(config: CourierConfig, cancel: CancellationToken) -> Result<(), CourierError> {
    let stack = Stack::build(&config).await?;
    let retryer = stack.start_retryer(&config);
    let ingest = Arc::new(stack.ingestion(retryer.as_ref()));

    let consumer_cancel = CancellationToken::new();
    let workers = match &stack.queue {
        Some(queue) => {
            let consumer = Arc::new(MessageConsumer::new(
                queue.clone(),
                Arc::clone(&ingest),
                &config.queue,
            ));
            consumer.spawn_workers(&consumer_cancel)
        }
        None => Vec::new(),
    };

    info!(
        consumers = workers.len(),
        fan_out_retry = retryer.is_some(),
        "courier ready"
    );
    cancel.cancelled().await;
    info!("shutting down");

    consumer_cancel.cancel();
    for result in futures::future::join_all(workers).await {
        if let Err(e) = result {
            error!(error = %e, "consumer worker panicked");
        }
    }
    if let Some(retryer) = retryer {
        retryer.stop().await;
    }
    stack.close().await?;
    info!("courier stopped");
    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `service.log_level`.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
