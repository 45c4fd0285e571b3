// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background inbox fan-out with bounded queueing and exponential backoff.
//!
//! [`InboxRetryer::enqueue`] never waits: when the queue is full the task is
//! dropped and logged. One worker owns every task and walks it through
//! `Queued -> Attempting -> {Succeeded | BackoffWait -> Attempting | GaveUp}`.
//! The inbox is a projection of the durable timeline, so a dropped or
//! abandoned task loses nothing that a pull cannot recover.

use std::sync::Arc;
use std::time::Duration;

use courier_config::model::RetryConfig;
use courier_core::types::TimelineMessage;
use courier_core::{CourierError, InboxWriter};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, warn};

const DEFAULT_QUEUE_SIZE: usize = 1024;
const DEFAULT_MAX_ATTEMPTS: u32 = 8;
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(200);
const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5);
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

/// Tuning for an [`InboxRetryer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    pub queue_size: usize,
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            queue_size: DEFAULT_QUEUE_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
        }
    }
}

impl RetryOptions {
    /// Replaces zero values with the defaults and lifts `max_backoff` to at
    /// least `base_backoff`.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let base_backoff = if self.base_backoff.is_zero() {
            defaults.base_backoff
        } else {
            self.base_backoff
        };
        let max_backoff = if self.max_backoff.is_zero() {
            defaults.max_backoff
        } else {
            self.max_backoff
        };
        Self {
            queue_size: if self.queue_size == 0 {
                defaults.queue_size
            } else {
                self.queue_size
            },
            max_attempts: if self.max_attempts == 0 {
                defaults.max_attempts
            } else {
                self.max_attempts
            },
            base_backoff,
            max_backoff: max_backoff.max(base_backoff),
            attempt_timeout: if self.attempt_timeout.is_zero() {
                defaults.attempt_timeout
            } else {
                self.attempt_timeout
            },
        }
    }
}

impl From<&RetryConfig> for RetryOptions {
    fn from(config: &RetryConfig) -> Self {
        Self {
            queue_size: config.queue_size,
            max_attempts: config.max_attempts,
            base_backoff: Duration::from_millis(config.base_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            attempt_timeout: Duration::from_millis(config.attempt_timeout_ms),
        }
    }
}

/// Delay after the failed attempt with zero-based index `attempt`:
/// `min(base * 2^attempt, max)`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

struct RetryTask {
    msg: TimelineMessage,
    recipients: Vec<String>,
    /// Failed attempts so far.
    attempt: u32,
}

/// Retrying front for an [`InboxWriter`].
pub struct InboxRetryer {
    tx: mpsc::Sender<RetryTask>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InboxRetryer {
    /// Spawns the worker on the current runtime.
    pub fn start(writer: Arc<dyn InboxWriter>, options: RetryOptions) -> Self {
        let options = options.normalized();
        let (tx, rx) = mpsc::channel(options.queue_size);
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_worker(writer, rx, options, cancel.clone()).in_current_span());
        info!(
            queue_size = options.queue_size,
            max_attempts = options.max_attempts,
            "inbox retryer started"
        );
        Self {
            tx,
            cancel,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queues a fan-out without waiting. Returns `false` when the task was
    /// dropped because the queue is full or the retryer has stopped.
    pub fn enqueue(&self, msg: &TimelineMessage, recipients: Vec<String>) -> bool {
        if recipients.is_empty() {
            return true;
        }
        let task = RetryTask {
            msg: msg.clone(),
            recipients,
            attempt: 0,
        };
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(task)) => {
                warn!(
                    conversation_id = %task.msg.conversation_id,
                    msg_id = %task.msg.msg_id,
                    seq = task.msg.seq,
                    "inbox retry queue full, dropping fan-out"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                warn!(
                    conversation_id = %task.msg.conversation_id,
                    msg_id = %task.msg.msg_id,
                    "inbox retryer stopped, dropping fan-out"
                );
                false
            }
        }
    }

    /// Signals the worker and waits for it to exit.
    ///
    /// An append in flight runs to completion; a backoff wait is cut short
    /// and queued tasks are abandoned. Calling `stop` again is a no-op.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "inbox retry worker panicked");
            }
            info!("inbox retryer stopped");
        }
    }
}

async fn run_worker(
    writer: Arc<dyn InboxWriter>,
    mut rx: mpsc::Receiver<RetryTask>,
    options: RetryOptions,
    cancel: CancellationToken,
) {
    loop {
        let task = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => task,
                None => break,
            },
        };
        deliver(writer.as_ref(), task, &options, &cancel).await;
    }
    let abandoned = rx.len();
    if abandoned > 0 {
        warn!(abandoned, "inbox retry worker exiting with queued fan-outs");
    }
    debug!("inbox retry worker exited");
}

async fn deliver(
    writer: &dyn InboxWriter,
    mut task: RetryTask,
    options: &RetryOptions,
    cancel: &CancellationToken,
) {
    loop {
        let result =
            match tokio::time::timeout(options.attempt_timeout, writer.append(&task.msg, &task.recipients))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(CourierError::Timeout {
                    duration: options.attempt_timeout,
                }),
            };

        let err = match result {
            Ok(()) => {
                debug!(
                    conversation_id = %task.msg.conversation_id,
                    msg_id = %task.msg.msg_id,
                    seq = task.msg.seq,
                    attempt = task.attempt + 1,
                    "inbox fan-out delivered"
                );
                return;
            }
            Err(e) => e,
        };

        let failed_index = task.attempt;
        task.attempt += 1;
        if task.attempt >= options.max_attempts {
            error!(
                conversation_id = %task.msg.conversation_id,
                msg_id = %task.msg.msg_id,
                seq = task.msg.seq,
                attempt = task.attempt,
                error = %err,
                "inbox fan-out gave up after max attempts"
            );
            return;
        }

        let delay = backoff_delay(failed_index, options.base_backoff, options.max_backoff);
        warn!(
            conversation_id = %task.msg.conversation_id,
            msg_id = %task.msg.msg_id,
            attempt = task.attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "inbox fan-out failed, retrying"
        );
        tokio::select! {
            _ = cancel.cancelled() => {
                warn!(
                    msg_id = %task.msg.msg_id,
                    attempt = task.attempt,
                    "inbox fan-out abandoned on shutdown"
                );
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use courier_core::types::{BackendKind, HealthStatus, MsgType, STATUS_NORMAL};
    use courier_core::Backend;
    use proptest::prelude::*;
    use tracing_test::traced_test;

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyWriter {
        failures: u32,
        calls: AtomicU32,
        successes: AtomicU32,
        delay: Duration,
    }

    impl FlakyWriter {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
                successes: AtomicU32::new(0),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl Backend for FlakyWriter {
        fn name(&self) -> &str {
            "flaky"
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Inbox
        }

        async fn health_check(&self) -> Result<HealthStatus, CourierError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl InboxWriter for FlakyWriter {
        async fn append(
            &self,
            _msg: &TimelineMessage,
            _recipients: &[String],
        ) -> Result<(), CourierError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(CourierError::Internal("inbox unavailable".into()));
            }
            self.successes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn message() -> TimelineMessage {
        TimelineMessage {
            msg_id: "m1".into(),
            conversation_id: "private_a_b".into(),
            seq: 1,
            sender_id: "a".into(),
            content: "hi".into(),
            msg_type: MsgType::Text,
            status: STATUS_NORMAL,
            send_time: 1,
        }
    }

    fn fast_options() -> RetryOptions {
        RetryOptions {
            queue_size: 16,
            max_attempts: 5,
            base_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
            attempt_timeout: Duration::from_secs(1),
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let base = Duration::from_millis(200);
        let max = Duration::from_secs(5);
        assert_eq!(backoff_delay(0, base, max), Duration::from_millis(200));
        assert_eq!(backoff_delay(1, base, max), Duration::from_millis(400));
        assert_eq!(backoff_delay(4, base, max), Duration::from_millis(3200));
        assert_eq!(backoff_delay(5, base, max), max);
        assert_eq!(backoff_delay(40, base, max), max);
    }

    #[test]
    fn normalized_fills_zero_values() {
        let options = RetryOptions {
            queue_size: 0,
            max_attempts: 0,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            attempt_timeout: Duration::ZERO,
        }
        .normalized();
        assert_eq!(options, RetryOptions::default());

        let lifted = RetryOptions {
            base_backoff: Duration::from_secs(10),
            ..RetryOptions::default()
        }
        .normalized();
        assert_eq!(lifted.max_backoff, Duration::from_secs(10));
    }

    #[test]
    fn options_from_config() {
        let options = RetryOptions::from(&RetryConfig::default());
        assert_eq!(options, RetryOptions::default());
    }

    proptest! {
        #[test]
        fn backoff_is_monotonic_and_bounded(
            attempt in 0u32..64,
            base_ms in 1u64..10_000,
            extra_ms in 0u64..100_000,
        ) {
            let base = Duration::from_millis(base_ms);
            let max = base + Duration::from_millis(extra_ms);
            let here = backoff_delay(attempt, base, max);
            let next = backoff_delay(attempt + 1, base, max);
            prop_assert!(here >= base);
            prop_assert!(here <= max);
            prop_assert!(next >= here);
        }
    }

    #[tokio::test]
    async fn flaky_writer_succeeds_after_retries() {
        let writer = Arc::new(FlakyWriter::new(2));
        let retryer = InboxRetryer::start(writer.clone(), fast_options());

        assert!(retryer.enqueue(&message(), vec!["a".into(), "b".into()]));
        wait_for(|| writer.successes.load(Ordering::SeqCst) == 1).await;

        assert_eq!(writer.calls.load(Ordering::SeqCst), 3);
        retryer.stop().await;
        assert_eq!(writer.successes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn gives_up_after_max_attempts() {
        let writer = Arc::new(FlakyWriter::new(u32::MAX));
        let options = RetryOptions {
            max_attempts: 3,
            ..fast_options()
        };
        let retryer = InboxRetryer::start(writer.clone(), options);

        retryer.enqueue(&message(), vec!["b".into()]);
        wait_for(|| writer.calls.load(Ordering::SeqCst) == 3).await;
        // Let the worker log the give-up before stopping it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        retryer.stop().await;

        assert_eq!(writer.calls.load(Ordering::SeqCst), 3);
        assert!(logs_contain("inbox fan-out gave up after max attempts"));
    }

    #[tokio::test]
    #[traced_test]
    async fn full_queue_drops_without_blocking() {
        let writer = Arc::new(FlakyWriter::new(0).with_delay(Duration::from_millis(200)));
        let options = RetryOptions {
            queue_size: 1,
            ..fast_options()
        };
        let retryer = InboxRetryer::start(writer.clone(), options);

        let recipients = || vec!["b".to_string()];
        let mut accepted = 0;
        for _ in 0..5 {
            if retryer.enqueue(&message(), recipients()) {
                accepted += 1;
            }
        }
        assert!(accepted < 5, "some tasks must be dropped");
        assert!(logs_contain("inbox retry queue full, dropping fan-out"));
        retryer.stop().await;
    }

    #[tokio::test]
    async fn stop_interrupts_backoff_and_rejects_new_work() {
        let writer = Arc::new(FlakyWriter::new(u32::MAX));
        let options = RetryOptions {
            max_attempts: 100,
            base_backoff: Duration::from_secs(30),
            max_backoff: Duration::from_secs(30),
            ..fast_options()
        };
        let retryer = InboxRetryer::start(writer.clone(), options);

        retryer.enqueue(&message(), vec!["b".into()]);
        wait_for(|| writer.calls.load(Ordering::SeqCst) == 1).await;

        // Must return promptly despite the 30s backoff.
        tokio::time::timeout(Duration::from_secs(2), retryer.stop())
            .await
            .expect("stop should interrupt the backoff sleep");
        assert_eq!(writer.calls.load(Ordering::SeqCst), 1);

        assert!(!retryer.enqueue(&message(), vec!["b".into()]));
        retryer.stop().await;
    }

    #[tokio::test]
    async fn empty_recipients_are_ignored() {
        let writer = Arc::new(FlakyWriter::new(0));
        let retryer = InboxRetryer::start(writer.clone(), fast_options());
        assert!(retryer.enqueue(&message(), Vec::new()));
        retryer.stop().await;
        assert_eq!(writer.calls.load(Ordering::SeqCst), 0);
    }
}
