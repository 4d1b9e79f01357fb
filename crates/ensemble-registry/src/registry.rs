use chrono::{Duration as ChronoDuration, Utc};
use ensemble_core::{Capability, RegistryError, Task, TaskInput, TaskOutput, TaskStatus};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SHARD_COUNT: usize = 16;

/// Payload accompanying a status transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// No payload (used for `in_progress`).
    None,
    /// Output payload for a `completed` transition.
    Output(TaskOutput),
    /// Failure description for a `failed` or `timed_out` transition.
    Error(String),
}

struct TaskEntry {
    task: Task,
    // Flipped to true exactly once, on the terminal transition.
    done: watch::Sender<bool>,
}

/// Concurrency-safe store of task records keyed by task ID.
///
/// Records are spread over a fixed set of shards by ID hash; operations on
/// the same task are linearized by its shard lock while unrelated tasks
/// proceed in parallel. Waiters on a task's completion are parked on a
/// per-task watch channel and woken by the terminal transition.
pub struct TaskRegistry {
    shards: Vec<RwLock<HashMap<Uuid, TaskEntry>>>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, task_id: Uuid) -> &RwLock<HashMap<Uuid, TaskEntry>> {
        let mut hasher = DefaultHasher::new();
        task_id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Creates a new pending task record and returns a snapshot of it.
    pub async fn create(
        &self,
        capability: Capability,
        input: TaskInput,
        context_id: Uuid,
    ) -> Task {
        let task = Task::new(capability, input, context_id);
        let snapshot = task.clone();
        let (done, _) = watch::channel(false);

        let mut shard = self.shard(task.task_id).write().await;
        shard.insert(task.task_id, TaskEntry { task, done });

        debug!(task_id = %snapshot.task_id, capability = %capability, "Task created");
        snapshot
    }

    /// Returns a snapshot of the task, or `NotFound`.
    pub async fn get(&self, task_id: Uuid) -> Result<Task, RegistryError> {
        let shard = self.shard(task_id).read().await;
        shard
            .get(&task_id)
            .map(|entry| entry.task.clone())
            .ok_or(RegistryError::NotFound(task_id))
    }

    /// Advances a task's status, attaching the given outcome payload.
    ///
    /// Fails with `InvalidTransition` if the new status does not advance the
    /// monotonic lifecycle order or the outcome payload does not match the
    /// target status (`completed` carries output, `failed`/`timed_out` carry
    /// an error, `in_progress` carries neither). The record is untouched on
    /// failure.
    pub async fn transition(
        &self,
        task_id: Uuid,
        new_status: TaskStatus,
        outcome: TransitionOutcome,
    ) -> Result<Task, RegistryError> {
        let mut shard = self.shard(task_id).write().await;
        let entry = shard
            .get_mut(&task_id)
            .ok_or(RegistryError::NotFound(task_id))?;

        let current = entry.task.status;
        if !current.can_advance_to(new_status) {
            return Err(RegistryError::InvalidTransition {
                task_id,
                from: current,
                to: new_status,
            });
        }
        if !outcome_matches(new_status, &outcome) {
            return Err(RegistryError::InvalidTransition {
                task_id,
                from: current,
                to: new_status,
            });
        }

        entry.task.status = new_status;
        entry.task.updated_at = Utc::now();
        match outcome {
            TransitionOutcome::None => {}
            TransitionOutcome::Output(output) => entry.task.output = Some(output),
            TransitionOutcome::Error(error) => entry.task.error = Some(error),
        }

        if new_status.is_terminal() {
            // Wake every waiter parked on this task.
            let _ = entry.done.send(true);
        }

        info!(task_id = %task_id, from = %current, to = %new_status, "Task transitioned");
        Ok(entry.task.clone())
    }

    /// Waits until the task reaches a terminal status or `timeout` elapses,
    /// then returns the current snapshot either way.
    pub async fn wait_terminal(
        &self,
        task_id: Uuid,
        timeout: Duration,
    ) -> Result<Task, RegistryError> {
        let mut rx = {
            let shard = self.shard(task_id).read().await;
            let entry = shard.get(&task_id).ok_or(RegistryError::NotFound(task_id))?;
            if entry.task.status.is_terminal() {
                return Ok(entry.task.clone());
            }
            entry.done.subscribe()
        };

        // Race the completion signal against the timer. Either way the
        // caller gets whatever state the task is in now.
        if tokio::time::timeout(timeout, rx.wait_for(|done| *done))
            .await
            .is_err()
        {
            debug!(task_id = %task_id, timeout_ms = timeout.as_millis() as u64, "Wait elapsed before terminal state");
        }

        self.get(task_id).await
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().await.len();
        }
        total
    }

    /// Whether the registry holds no records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes terminal records whose last update is older than `ttl`.
    /// Returns the number of records evicted.
    ///
    /// Non-terminal records are never evicted; the endpoint's execution
    /// bookkeeping guarantees they eventually reach a terminal state.
    pub async fn evict_finished(&self, ttl: Duration) -> usize {
        let cutoff = Utc::now()
            - ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(0));
        let mut evicted = 0;

        for shard in &self.shards {
            let mut shard = shard.write().await;
            let before = shard.len();
            shard.retain(|_, entry| {
                !(entry.task.status.is_terminal() && entry.task.updated_at < cutoff)
            });
            evicted += before - shard.len();
        }

        if evicted > 0 {
            info!(evicted, "Evicted finished task records");
        }
        evicted
    }

    /// Spawns a background sweeper that evicts finished records every
    /// `interval`. The sweeper runs until the returned handle is aborted or
    /// the runtime shuts down.
    pub fn spawn_eviction_sweeper(
        self: Arc<Self>,
        interval: Duration,
        ttl: Duration,
    ) -> JoinHandle<()> {
        let registry = self;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_finished(ttl).await;
                if evicted > 0 {
                    warn!(evicted, ttl_secs = ttl.as_secs(), "Eviction sweep removed stale tasks");
                }
            }
        })
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn outcome_matches(status: TaskStatus, outcome: &TransitionOutcome) -> bool {
    match status {
        TaskStatus::Completed => matches!(outcome, TransitionOutcome::Output(_)),
        TaskStatus::Failed | TaskStatus::TimedOut => matches!(outcome, TransitionOutcome::Error(_)),
        TaskStatus::Pending | TaskStatus::InProgress => matches!(outcome, TransitionOutcome::None),
    }
}
