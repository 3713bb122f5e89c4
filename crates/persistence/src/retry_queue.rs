//! Durable retry queue
//!
//! Holds actions whose execution failed transiently and replays them when
//! connectivity returns. The queue is a bounded FIFO (oldest evicted first)
//! written through to a [`KeyValueStore`] after every mutation.
//!
//! Entry lifecycle in `process_queue`:
//!
//! ```text
//! pending --success--------------------------> removed
//! pending --transient, retries < max---------> pending (retry_count + 1)
//! pending --transient, retries reach max-----> dropped
//! pending --permanent or rejected------------> dropped
//! ```

use farmhand_config::RetryQueueConfig;
use farmhand_core::{
    Action, ActionExecutor, ConnectivityProbe, ExecutionContext, ExecutionError, KeyValueStore,
    QueuedAction,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::PersistenceError;

/// Outcome of a processing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePassStatus {
    Completed,
    /// Probe reported offline; nothing was touched
    Offline,
    /// Another pass was in progress; nothing was touched
    AlreadyRunning,
}

/// Counters for one processing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePassReport {
    pub status: QueuePassStatus,
    pub attempted: usize,
    pub succeeded: usize,
    /// Failed transiently and kept for a later pass
    pub retried: usize,
    /// Removed after a permanent failure or the last allowed retry
    pub dropped: usize,
    /// Entries left after the pass
    pub remaining: usize,
}

impl QueuePassReport {
    fn skipped(status: QueuePassStatus, remaining: usize) -> Self {
        Self {
            status,
            attempted: 0,
            succeeded: 0,
            retried: 0,
            dropped: 0,
            remaining,
        }
    }
}

/// Clears the processing flag when a pass ends, even on panic
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Bounded, persisted FIFO of failed actions
pub struct RetryQueue {
    store: Arc<dyn KeyValueStore>,
    storage_key: String,
    capacity: usize,
    max_retries: u8,
    call_timeout: Duration,
    entries: Mutex<VecDeque<QueuedAction>>,
    processing: AtomicBool,
}

impl RetryQueue {
    /// Load the queue persisted under `config.storage_key`.
    ///
    /// A blob that cannot be decoded is moved aside to `<key>.corrupt` and
    /// the queue starts empty.
    pub async fn open(
        store: Arc<dyn KeyValueStore>,
        config: &RetryQueueConfig,
        call_timeout: Duration,
    ) -> Result<Self, PersistenceError> {
        let mut entries = VecDeque::new();

        if let Some(bytes) = store.get(&config.storage_key).await? {
            match serde_json::from_slice::<Vec<QueuedAction>>(&bytes) {
                Ok(loaded) => entries.extend(loaded),
                Err(e) => {
                    tracing::error!(
                        key = %config.storage_key,
                        error = %e,
                        "Persisted retry queue is unreadable, starting empty"
                    );
                    store
                        .set(&format!("{}.corrupt", config.storage_key), bytes)
                        .await?;
                }
            }
        }

        // Capacity may have shrunk since the queue was written
        while entries.len() > config.capacity {
            entries.pop_front();
        }

        tracing::info!(
            entries = entries.len(),
            capacity = config.capacity,
            "Retry queue loaded"
        );

        Ok(Self {
            store,
            storage_key: config.storage_key.clone(),
            capacity: config.capacity,
            max_retries: config.max_retries,
            call_timeout,
            entries: Mutex::new(entries),
            processing: AtomicBool::new(false),
        })
    }

    /// Append a failed action, evicting the oldest entry when full.
    ///
    /// The new state is persisted before it becomes visible; on a storage
    /// error the queue is left unchanged.
    pub async fn enqueue(
        &self,
        action: Action,
        context: ExecutionContext,
        error: impl Into<String>,
    ) -> Result<Uuid, PersistenceError> {
        let entry = QueuedAction::new(action, context, error);
        let id = entry.id;

        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        if next.len() >= self.capacity {
            if let Some(evicted) = next.pop_front() {
                tracing::warn!(
                    evicted = %evicted.id,
                    intent = %evicted.action.intent,
                    "Retry queue full, evicting oldest entry"
                );
            }
        }
        next.push_back(entry);

        self.persist(&next).await?;
        *entries = next;

        tracing::info!(queued_id = %id, depth = entries.len(), "Action queued for retry");
        Ok(id)
    }

    /// Replay queued actions.
    ///
    /// Non-reentrant: a call made while a pass is running returns
    /// `AlreadyRunning` without effect. Only entries present when the pass
    /// starts are attempted.
    pub async fn process_queue(
        &self,
        executor: &dyn ActionExecutor,
        probe: &dyn ConnectivityProbe,
    ) -> QueuePassReport {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Retry pass already running");
            return QueuePassReport::skipped(QueuePassStatus::AlreadyRunning, self.len().await);
        }
        let _guard = ProcessingGuard(&self.processing);

        if !probe.is_online().await {
            tracing::debug!("Offline, skipping retry pass");
            return QueuePassReport::skipped(QueuePassStatus::Offline, self.len().await);
        }

        let snapshot: Vec<QueuedAction> = self.entries.lock().await.iter().cloned().collect();
        let mut report = QueuePassReport::skipped(QueuePassStatus::Completed, 0);

        for queued in snapshot {
            report.attempted += 1;

            let outcome = match tokio::time::timeout(
                self.call_timeout,
                executor.execute(&queued.action, &queued.context),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ExecutionError::timeout(self.call_timeout.as_millis() as u64)),
            };

            let mut entries = self.entries.lock().await;
            // Evicted by an enqueue while we were executing
            let Some(pos) = entries.iter().position(|e| e.id == queued.id) else {
                continue;
            };

            match outcome {
                Ok(result) if result.success => {
                    entries.remove(pos);
                    report.succeeded += 1;
                    tracing::info!(queued_id = %queued.id, "Queued action replayed");
                }
                Ok(result) => {
                    entries.remove(pos);
                    report.dropped += 1;
                    tracing::warn!(
                        queued_id = %queued.id,
                        message = %result.message,
                        "Queued action rejected by executor, dropping"
                    );
                }
                Err(ExecutionError::Permanent(reason)) => {
                    entries.remove(pos);
                    report.dropped += 1;
                    tracing::warn!(queued_id = %queued.id, %reason, "Permanent failure, dropping");
                }
                Err(ExecutionError::Transient(reason)) => {
                    let entry = &mut entries[pos];
                    entry.retry_count = entry.retry_count.saturating_add(1);
                    entry.last_error = Some(reason.clone());

                    if entry.retry_count >= self.max_retries {
                        entries.remove(pos);
                        report.dropped += 1;
                        tracing::warn!(
                            queued_id = %queued.id,
                            %reason,
                            "Retries exhausted, dropping"
                        );
                    } else {
                        report.retried += 1;
                        tracing::debug!(
                            queued_id = %queued.id,
                            retry_count = entries[pos].retry_count,
                            %reason,
                            "Retry failed, keeping"
                        );
                    }
                }
            }

            if let Err(e) = self.persist(&entries).await {
                tracing::error!(error = %e, "Failed to persist retry queue");
            }
        }

        let entries = self.entries.lock().await;
        if let Err(e) = self.persist(&entries).await {
            tracing::error!(error = %e, "Failed to persist retry queue");
        }
        report.remaining = entries.len();

        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            retried = report.retried,
            dropped = report.dropped,
            remaining = report.remaining,
            "Retry pass finished"
        );
        report
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Copy of the current entries, oldest first
    pub async fn entries(&self) -> Vec<QueuedAction> {
        self.entries.lock().await.iter().cloned().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    async fn persist(&self, entries: &VecDeque<QueuedAction>) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec(entries)?;
        self.store.set(&self.storage_key, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use farmhand_core::{ActionResult, ExtractedParameters, Intent};
    use parking_lot::Mutex as SyncMutex;

    /// Executor that replays a fixed script of results, then succeeds
    struct ScriptedExecutor {
        script: SyncMutex<VecDeque<Result<ActionResult, ExecutionError>>>,
        calls: SyncMutex<Vec<Uuid>>,
    }

    impl ScriptedExecutor {
        fn new(script: Vec<Result<ActionResult, ExecutionError>>) -> Self {
            Self {
                script: SyncMutex::new(script.into()),
                calls: SyncMutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self::new(
                (0..16)
                    .map(|_| Err(ExecutionError::Transient("connection refused".into())))
                    .collect(),
            )
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl ActionExecutor for ScriptedExecutor {
        async fn execute(
            &self,
            action: &Action,
            _context: &ExecutionContext,
        ) -> Result<ActionResult, ExecutionError> {
            self.calls.lock().push(action.idempotency_key);
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(ActionResult::ok("done")))
        }
    }

    struct Offline;

    #[async_trait]
    impl ConnectivityProbe for Offline {
        async fn is_online(&self) -> bool {
            false
        }
    }

    fn config(capacity: usize) -> RetryQueueConfig {
        RetryQueueConfig {
            capacity,
            ..RetryQueueConfig::default()
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new("farm-1", "user-1", NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
    }

    fn action() -> Action {
        Action::new(Intent::CreateSale, ExtractedParameters::new())
    }

    async fn open(store: Arc<dyn KeyValueStore>, capacity: usize) -> RetryQueue {
        RetryQueue::open(store, &config(capacity), Duration::from_millis(200))
            .await
            .unwrap()
    }

    /// Generous call timeout so a parked executor is not cut short
    async fn open_slow(store: Arc<dyn KeyValueStore>, capacity: usize) -> RetryQueue {
        RetryQueue::open(store, &config(capacity), Duration::from_secs(5))
            .await
            .unwrap()
    }

    /// Executor that parks each call until the test hands out permits
    struct Gate {
        started: tokio::sync::Notify,
        release: tokio::sync::Semaphore,
        calls: SyncMutex<Vec<Uuid>>,
    }

    impl Gate {
        fn new() -> Self {
            Self {
                started: tokio::sync::Notify::new(),
                release: tokio::sync::Semaphore::new(0),
                calls: SyncMutex::new(Vec::new()),
            }
        }

        fn open(&self, permits: usize) {
            self.release.add_permits(permits);
        }
    }

    #[async_trait]
    impl ActionExecutor for Gate {
        async fn execute(
            &self,
            action: &Action,
            _context: &ExecutionContext,
        ) -> Result<ActionResult, ExecutionError> {
            self.calls.lock().push(action.id);
            self.started.notify_one();
            self.release.acquire().await.unwrap().forget();
            Ok(ActionResult::ok("done"))
        }
    }

    #[tokio::test]
    async fn test_enqueue_persists_immediately() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let queue = open(store.clone(), 100).await;

        let id = queue.enqueue(action(), context(), "timeout").await.unwrap();

        // A second queue over the same store sees the entry
        let reloaded = open(store, 100).await;
        let entries = reloaded.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, id);
        assert_eq!(entries[0].retry_count, 0);
        assert_eq!(entries[0].last_error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let queue = open(Arc::new(InMemoryStore::new()), 3).await;

        let mut ids = Vec::new();
        for _ in 0..4 {
            ids.push(queue.enqueue(action(), context(), "offline").await.unwrap());
        }

        let entries = queue.entries().await;
        assert_eq!(entries.len(), 3);
        // The first one went
        assert_eq!(
            entries.iter().map(|e| e.id).collect::<Vec<_>>(),
            ids[1..].to_vec()
        );
    }

    #[tokio::test]
    async fn test_success_removes_entry() {
        let queue = open(Arc::new(InMemoryStore::new()), 100).await;
        let queued_action = action();
        let key = queued_action.idempotency_key;
        queue.enqueue(queued_action, context(), "timeout").await.unwrap();

        let executor = ScriptedExecutor::new(vec![]);
        let report = queue.process_queue(&executor, &farmhand_core::AlwaysOnline).await;

        assert_eq!(report.status, QueuePassStatus::Completed);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.remaining, 0);
        // The original idempotency key is replayed
        assert_eq!(executor.calls.lock().as_slice(), &[key]);
    }

    #[tokio::test]
    async fn test_three_failures_drop_entry() {
        let queue = open(Arc::new(InMemoryStore::new()), 100).await;
        queue.enqueue(action(), context(), "timeout").await.unwrap();
        let executor = ScriptedExecutor::failing();

        let first = queue.process_queue(&executor, &farmhand_core::AlwaysOnline).await;
        assert_eq!((first.retried, first.dropped), (1, 0));
        assert_eq!(queue.entries().await[0].retry_count, 1);

        let second = queue.process_queue(&executor, &farmhand_core::AlwaysOnline).await;
        assert_eq!((second.retried, second.dropped), (1, 0));

        // Third failure reaches the limit and drops in the same pass
        let third = queue.process_queue(&executor, &farmhand_core::AlwaysOnline).await;
        assert_eq!((third.retried, third.dropped), (0, 1));
        assert!(queue.is_empty().await);

        // Nothing left to retry
        let fourth = queue.process_queue(&executor, &farmhand_core::AlwaysOnline).await;
        assert_eq!(fourth.attempted, 0);
        assert_eq!(executor.call_count(), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_drops_immediately() {
        let queue = open(Arc::new(InMemoryStore::new()), 100).await;
        queue.enqueue(action(), context(), "timeout").await.unwrap();

        let executor =
            ScriptedExecutor::new(vec![Err(ExecutionError::Permanent("unknown animal".into()))]);
        let report = queue.process_queue(&executor, &farmhand_core::AlwaysOnline).await;

        assert_eq!(report.dropped, 1);
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_offline_pass_is_a_no_op() {
        let queue = open(Arc::new(InMemoryStore::new()), 100).await;
        queue.enqueue(action(), context(), "timeout").await.unwrap();
        let executor = ScriptedExecutor::failing();

        let report = queue.process_queue(&executor, &Offline).await;

        assert_eq!(report.status, QueuePassStatus::Offline);
        assert_eq!(executor.call_count(), 0);
        assert_eq!(queue.entries().await[0].retry_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_pass_is_rejected() {
        let queue = Arc::new(open(Arc::new(InMemoryStore::new()), 100).await);
        queue.enqueue(action(), context(), "timeout").await.unwrap();

        let gate = Arc::new(Gate::new());
        let running = {
            let queue = queue.clone();
            let gate = gate.clone();
            tokio::spawn(async move {
                queue.process_queue(gate.as_ref(), &farmhand_core::AlwaysOnline).await
            })
        };

        while !queue.is_processing() {
            tokio::task::yield_now().await;
        }
        let second = queue.process_queue(gate.as_ref(), &farmhand_core::AlwaysOnline).await;
        assert_eq!(second.status, QueuePassStatus::AlreadyRunning);

        gate.open(1);
        let first = running.await.unwrap();
        assert_eq!(first.succeeded, 1);
        assert!(!queue.is_processing());
    }

    #[tokio::test]
    async fn test_entry_enqueued_mid_pass_waits_for_next_pass() {
        let queue = Arc::new(open_slow(Arc::new(InMemoryStore::new()), 100).await);
        let first = action();
        let first_id = first.id;
        queue.enqueue(first, context(), "timeout").await.unwrap();

        let gate = Arc::new(Gate::new());
        let running = {
            let queue = queue.clone();
            let gate = gate.clone();
            tokio::spawn(async move {
                queue.process_queue(gate.as_ref(), &farmhand_core::AlwaysOnline).await
            })
        };

        gate.started.notified().await;
        let late_id = queue.enqueue(action(), context(), "offline").await.unwrap();
        gate.open(8);

        let report = running.await.unwrap();
        assert_eq!(report.attempted, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.remaining, 1);
        assert_eq!(gate.calls.lock().as_slice(), &[first_id]);

        let entries = queue.entries().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, late_id);
        assert_eq!(entries[0].retry_count, 0);
    }

    #[tokio::test]
    async fn test_entry_evicted_mid_pass_is_not_counted() {
        let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
        let queue = Arc::new(open_slow(store.clone(), 2).await);
        let (oldest, second) = (action(), action());
        let calls = vec![oldest.id, second.id];
        queue.enqueue(oldest, context(), "timeout").await.unwrap();
        queue.enqueue(second, context(), "timeout").await.unwrap();

        let gate = Arc::new(Gate::new());
        let running = {
            let queue = queue.clone();
            let gate = gate.clone();
            tokio::spawn(async move {
                queue.process_queue(gate.as_ref(), &farmhand_core::AlwaysOnline).await
            })
        };

        // The oldest entry is in flight when a new failure fills the queue
        gate.started.notified().await;
        let newest = queue.enqueue(action(), context(), "offline").await.unwrap();
        gate.open(8);

        let report = running.await.unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!((report.retried, report.dropped), (0, 0));
        assert_eq!(report.remaining, 1);
        assert_eq!(*gate.calls.lock(), calls);

        let reloaded = open(store, 2).await;
        let ids: Vec<Uuid> = reloaded.entries().await.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![newest]);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        struct Hangs;

        #[async_trait]
        impl ActionExecutor for Hangs {
            async fn execute(
                &self,
                _action: &Action,
                _context: &ExecutionContext,
            ) -> Result<ActionResult, ExecutionError> {
                std::future::pending().await
            }
        }

        let queue = RetryQueue::open(
            Arc::new(InMemoryStore::new()),
            &config(100),
            Duration::from_millis(20),
        )
        .await
        .unwrap();
        queue.enqueue(action(), context(), "timeout").await.unwrap();

        let report = queue.process_queue(&Hangs, &farmhand_core::AlwaysOnline).await;
        assert_eq!(report.retried, 1);
        let entry = &queue.entries().await[0];
        assert!(entry.last_error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_moved_aside() {
        let store = Arc::new(InMemoryStore::new());
        store.set("retry_queue", b"not json".to_vec()).await.unwrap();

        let queue = open(store.clone(), 100).await;

        assert!(queue.is_empty().await);
        assert_eq!(
            store.get("retry_queue.corrupt").await.unwrap(),
            Some(b"not json".to_vec())
        );
    }
}
