// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Courier.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Process identity and request handling.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Durable store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Redis connection shared by the counter and inbox backends.
    #[serde(default)]
    pub redis: RedisConfig,

    /// Sequence number strategy.
    #[serde(default)]
    pub sequence: SequenceConfig,

    /// Inbox fan-out backend.
    #[serde(default)]
    pub inbox: InboxConfig,

    /// Inbox fan-out retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Durable ingestion queue.
    #[serde(default)]
    pub queue: QueueConfig,
}

/// Process identity and request handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Deadline for synchronous chat, pull, and ack requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Page size used when a pull request does not carry one.
    #[serde(default = "default_pull_limit")]
    pub pull_default_limit: usize,

    /// Upper bound on any pull page size.
    #[serde(default = "default_pull_max_limit")]
    pub pull_max_limit: usize,
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            request_timeout_ms: default_request_timeout_ms(),
            pull_default_limit: default_pull_limit(),
            pull_max_limit: default_pull_max_limit(),
        }
    }
}

fn default_service_name() -> String {
    "courier".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_ms() -> u64 {
    3_000
}

fn default_pull_limit() -> usize {
    50
}

fn default_pull_max_limit() -> usize {
    200
}

/// Durable store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// How long a writer waits on another process's lock before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("courier.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Redis connection settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://localhost:6379/0`. `None` disables Redis.
    #[serde(default)]
    pub url: Option<String>,
}

/// Which sequence generator a deployment uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeqStrategy {
    /// Transactional `MAX(seq) + 1` against the durable store.
    #[default]
    LockedMax,
    /// Atomic `INCR` against Redis.
    AtomicCounter,
}

/// Sequence number strategy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SequenceConfig {
    #[serde(default)]
    pub strategy: SeqStrategy,

    /// Counter key prefix for the atomic counter strategy.
    #[serde(default = "default_seq_prefix")]
    pub key_prefix: String,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            strategy: SeqStrategy::default(),
            key_prefix: default_seq_prefix(),
        }
    }
}

fn default_seq_prefix() -> String {
    "im:seq:".to_string()
}

/// Where inbox projections are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InboxBackend {
    /// Redis sorted sets, shared between processes.
    Redis,
    /// Process-local maps; lost on restart.
    #[default]
    Memory,
    /// No fan-out.
    Disabled,
}

/// Inbox fan-out configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InboxConfig {
    #[serde(default)]
    pub backend: InboxBackend,

    #[serde(default = "default_inbox_prefix")]
    pub key_prefix: String,

    /// Retention horizon refreshed on every append.
    #[serde(default = "default_inbox_ttl_secs")]
    pub ttl_secs: u64,
}

impl InboxConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            backend: InboxBackend::default(),
            key_prefix: default_inbox_prefix(),
            ttl_secs: default_inbox_ttl_secs(),
        }
    }
}

fn default_inbox_prefix() -> String {
    "im:inbox:".to_string()
}

fn default_inbox_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

/// Inbox fan-out retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Bounded retry queue capacity; overflow is dropped.
    #[serde(default = "default_retry_queue_size")]
    pub queue_size: usize,

    #[serde(default = "default_retry_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Deadline for a single append attempt.
    #[serde(default = "default_attempt_timeout_ms")]
    pub attempt_timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            queue_size: default_retry_queue_size(),
            max_attempts: default_retry_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            attempt_timeout_ms: default_attempt_timeout_ms(),
        }
    }
}

fn default_retry_queue_size() -> usize {
    1024
}

fn default_retry_max_attempts() -> u32 {
    8
}

fn default_base_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    5_000
}

fn default_attempt_timeout_ms() -> u64 {
    2_000
}

/// Durable ingestion queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Route chat submissions through the queue instead of ingesting inline.
    #[serde(default = "default_queue_enabled")]
    pub enabled: bool,

    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,

    /// Deadline for replaying one delivery through ingestion.
    #[serde(default = "default_consumer_timeout_ms")]
    pub consumer_timeout_ms: u64,

    /// Idle sleep between polls of an empty queue.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Deliveries after which a repeatedly failing entry is dead-lettered.
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,

    /// How long a claimed entry stays invisible before redelivery.
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Number of concurrent consumer loops.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: default_queue_enabled(),
            queue_name: default_queue_name(),
            publish_timeout_ms: default_publish_timeout_ms(),
            consumer_timeout_ms: default_consumer_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            max_delivery_attempts: default_max_delivery_attempts(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            workers: default_workers(),
        }
    }
}

fn default_queue_enabled() -> bool {
    true
}

fn default_queue_name() -> String {
    "im.msg.process".to_string()
}

fn default_publish_timeout_ms() -> u64 {
    3_000
}

fn default_consumer_timeout_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_max_delivery_attempts() -> u32 {
    10
}

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_workers() -> usize {
    1
}
