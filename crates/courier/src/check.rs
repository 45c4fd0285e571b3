// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier check` command implementation.
//!
//! Builds the configured backends and runs each one's health check.

use std::time::{Duration, Instant};

use courier_config::model::CourierConfig;
use courier_core::types::{BackendKind, HealthStatus};
use courier_core::{Backend, CourierError};

use crate::stack::Stack;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Status of a single check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single backend check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub kind: Option<BackendKind>,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

/// Runs every check and prints a report. Returns the number of failures.
pub async fn run_check(config: &CourierConfig) -> Result<usize, CourierError> {
    let results = collect_checks(config).await;

    println!();
    println!("  courier check");
    println!("  {}", "-".repeat(50));
    for result in &results {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        let kind = result.kind.map(|k| k.to_string()).unwrap_or_default();
        println!(
            "    {tag} {:<20} {:<9} {} ({}ms)",
            result.name,
            kind,
            result.message,
            result.duration.as_millis()
        );
    }
    println!();

    let failures = results
        .iter()
        .filter(|r| r.status == CheckStatus::Fail)
        .count();
    if failures == 0 {
        println!("  All checks passed.");
    } else {
        let word = if failures == 1 { "check" } else { "checks" };
        println!("  {failures} {word} failed.");
    }
    println!();
    Ok(failures)
}

/// Opens the stack and checks each backend. A stack that cannot be built
/// is reported as a single failed check.
pub async fn collect_checks(config: &CourierConfig) -> Vec<CheckResult> {
    let start = Instant::now();
    let stack = match Stack::build(config).await {
        Ok(stack) => stack,
        Err(e) => {
            return vec![CheckResult {
                name: "backends".to_string(),
                kind: None,
                status: CheckStatus::Fail,
                message: e.to_string(),
                duration: start.elapsed(),
            }];
        }
    };

    let mut results = Vec::with_capacity(stack.backends.len());
    for backend in &stack.backends {
        results.push(check_backend(backend.as_ref()).await);
    }
    if let Err(e) = stack.close().await {
        tracing::warn!(error = %e, "closing storage after checks failed");
    }
    results
}

async fn check_backend(backend: &dyn Backend) -> CheckResult {
    let start = Instant::now();
    let (status, message) = match tokio::time::timeout(CHECK_TIMEOUT, backend.health_check()).await {
        Ok(Ok(HealthStatus::Healthy)) => (CheckStatus::Pass, "healthy".to_string()),
        Ok(Ok(HealthStatus::Degraded(reason))) => (CheckStatus::Warn, reason),
        Ok(Ok(HealthStatus::Unhealthy(reason))) => (CheckStatus::Fail, reason),
        Ok(Err(e)) => (CheckStatus::Fail, e.to_string()),
        Err(_) => (
            CheckStatus::Fail,
            format!("no answer within {}s", CHECK_TIMEOUT.as_secs()),
        ),
    };
    CheckResult {
        name: backend.name().to_string(),
        kind: Some(backend.kind()),
        status,
        message,
        duration: start.elapsed(),
    }
}
