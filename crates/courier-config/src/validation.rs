// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks cross-field constraints serde attributes cannot express, such as
//! a Redis URL being present whenever a Redis-backed component is selected.

use crate::diagnostic::ConfigError;
use crate::model::{CourierConfig, InboxBackend, SeqStrategy};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        fail(format!(
            "service.log_level `{}` must be one of {}",
            config.service.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.service.request_timeout_ms == 0 {
        fail("service.request_timeout_ms must be greater than 0".to_string());
    }

    if config.service.pull_default_limit == 0 {
        fail("service.pull_default_limit must be greater than 0".to_string());
    }

    if config.service.pull_default_limit > config.service.pull_max_limit {
        fail(format!(
            "service.pull_default_limit ({}) must not exceed service.pull_max_limit ({})",
            config.service.pull_default_limit, config.service.pull_max_limit
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    let redis_configured = config
        .redis
        .url
        .as_deref()
        .is_some_and(|url| !url.trim().is_empty());

    if config.sequence.strategy == SeqStrategy::AtomicCounter && !redis_configured {
        fail("sequence.strategy `atomic_counter` requires redis.url".to_string());
    }

    if config.inbox.backend == InboxBackend::Redis && !redis_configured {
        fail("inbox.backend `redis` requires redis.url".to_string());
    }

    if config.inbox.ttl_secs == 0 {
        fail("inbox.ttl_secs must be greater than 0".to_string());
    }

    if config.retry.queue_size == 0 {
        fail("retry.queue_size must be greater than 0".to_string());
    }

    if config.retry.max_attempts == 0 {
        fail("retry.max_attempts must be greater than 0".to_string());
    }

    if config.retry.base_backoff_ms == 0 || config.retry.attempt_timeout_ms == 0 {
        fail("retry.base_backoff_ms and retry.attempt_timeout_ms must be greater than 0".to_string());
    }

    if config.retry.base_backoff_ms > config.retry.max_backoff_ms {
        fail(format!(
            "retry.base_backoff_ms ({}) must not exceed retry.max_backoff_ms ({})",
            config.retry.base_backoff_ms, config.retry.max_backoff_ms
        ));
    }

    if config.queue.queue_name.trim().is_empty() {
        fail("queue.queue_name must not be empty".to_string());
    }

    if config.queue.workers == 0 {
        fail("queue.workers must be at least 1".to_string());
    }

    if config.queue.max_delivery_attempts == 0 {
        fail("queue.max_delivery_attempts must be at least 1".to_string());
    }

    if config.queue.consumer_timeout_ms == 0 || config.queue.publish_timeout_ms == 0 {
        fail("queue.consumer_timeout_ms and queue.publish_timeout_ms must be greater than 0".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(errors: &[ConfigError]) -> Vec<String> {
        errors.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn default_config_validates() {
        let config = CourierConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn atomic_counter_without_redis_fails() {
        let mut config = CourierConfig::default();
        config.sequence.strategy = SeqStrategy::AtomicCounter;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(messages(&errors)[0].contains("requires redis.url"));
    }

    #[test]
    fn redis_inbox_with_url_passes() {
        let mut config = CourierConfig::default();
        config.inbox.backend = InboxBackend::Redis;
        config.redis.url = Some("redis://localhost:6379".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn backoff_ceiling_below_base_fails() {
        let mut config = CourierConfig::default();
        config.retry.base_backoff_ms = 1_000;
        config.retry.max_backoff_ms = 100;
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors)[0].contains("retry.base_backoff_ms"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = CourierConfig::default();
        config.storage.database_path = "  ".to_string();
        config.queue.workers = 0;
        config.service.log_level = "verbose".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
