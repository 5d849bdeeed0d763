use crate::collaborators::{HistoryCollaborator, NotificationCollaborator};
use crate::config::DispatchConfig;
use crate::error::{AppError, Result};
use crate::metrics::record_side_effect;
use crate::models::{
    CallerIdentity, EhrEntry, NotificationKind, NotificationPayload, PredictionRecord,
};
use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

/// How many recent predictions are checked for a recurring disease
pub const RECURRING_LOOKBACK: usize = 10;

/// Prior occurrences of the same disease that make a prediction recurring
pub const RECURRING_THRESHOLD: usize = 2;

/// Work handed to the background side-effect workers
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    PersistHistory(Box<PredictionRecord>),
    CreateEhrEntry(EhrEntry),
    Notify {
        user_id: String,
        kind: NotificationKind,
        payload: NotificationPayload,
    },
}

impl OutboundMessage {
    /// Caller the effect belongs to
    pub fn user_id(&self) -> &str {
        match self {
            OutboundMessage::PersistHistory(record) => &record.user_id,
            OutboundMessage::CreateEhrEntry(entry) => &entry.user_id,
            OutboundMessage::Notify { user_id, .. } => user_id,
        }
    }

    /// Metric label for this kind of effect
    pub fn effect(&self) -> &'static str {
        match self {
            OutboundMessage::PersistHistory(_) => "history",
            OutboundMessage::CreateEhrEntry(_) => "ehr",
            OutboundMessage::Notify { .. } => "notification",
        }
    }
}

/// Non-blocking queues in front of the history and notification collaborators.
///
/// Each worker owns one queue and every message for a given user lands on
/// the same queue, so one user's effects are applied in dispatch order.
pub struct SideEffectDispatcher {
    shards: Vec<mpsc::Sender<OutboundMessage>>,
    in_flight: Arc<AtomicUsize>,
}

impl SideEffectDispatcher {
    /// Create the queue and spawn its workers; must be called inside a tokio runtime
    pub fn start(
        config: &DispatchConfig,
        history: Arc<dyn HistoryCollaborator>,
        notifier: Arc<dyn NotificationCollaborator>,
    ) -> Self {
        let in_flight = Arc::new(AtomicUsize::new(0));

        let worker = Arc::new(Worker {
            history,
            notifier,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        });

        let workers = config.worker_threads.max(1);
        let shard_size = (config.queue_size / workers).max(1);
        let shards = (0..workers)
            .map(|worker_id| {
                let (tx, rx) = mpsc::channel(shard_size);
                spawn_worker(worker_id, worker.clone(), rx, in_flight.clone());
                tx
            })
            .collect();

        info!(
            workers,
            shard_size,
            max_retries = config.max_retries,
            "Side-effect dispatcher started"
        );

        Self { shards, in_flight }
    }

    fn shard_for(&self, user_id: &str) -> &mpsc::Sender<OutboundMessage> {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        let idx = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[idx]
    }

    /// Enqueue without waiting; a full or closed queue is reported, never awaited
    pub fn dispatch(&self, message: OutboundMessage) -> Result<()> {
        let effect = message.effect();
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        match self.shard_for(message.user_id()).try_send(message) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                record_side_effect(effect, "dropped");
                match e {
                    mpsc::error::TrySendError::Full(_) => Err(AppError::QueueFull(format!(
                        "Side-effect queue is full, dropping {} message",
                        effect
                    ))),
                    mpsc::error::TrySendError::Closed(_) => Err(AppError::Internal(format!(
                        "Side-effect queue is closed, dropping {} message",
                        effect
                    ))),
                }
            }
        }
    }

    /// Enqueue every message, logging the ones that could not be queued.
    ///
    /// Returns how many were accepted.
    pub fn dispatch_all(&self, messages: impl IntoIterator<Item = OutboundMessage>) -> usize {
        let mut accepted = 0;
        for message in messages {
            let effect = message.effect();
            match self.dispatch(message) {
                Ok(()) => accepted += 1,
                Err(e) => warn!(effect, error = %e, "Side effect not queued"),
            }
        }
        accepted
    }

    /// Messages queued or being worked on
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every accepted message has been handled, up to `timeout`
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(5)).await;
        }
        true
    }
}

fn spawn_worker(
    worker_id: usize,
    worker: Arc<Worker>,
    mut rx: mpsc::Receiver<OutboundMessage>,
    in_flight: Arc<AtomicUsize>,
) {
    tokio::spawn(async move {
        debug!(worker_id, "Side-effect worker started");

        while let Some(message) = rx.recv().await {
            worker.handle(message).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        debug!(worker_id, "Side-effect worker stopped");
    });
}

struct Worker {
    history: Arc<dyn HistoryCollaborator>,
    notifier: Arc<dyn NotificationCollaborator>,
    max_retries: u32,
    retry_backoff: Duration,
}

impl Worker {
    async fn handle(&self, message: OutboundMessage) {
        match message {
            OutboundMessage::PersistHistory(record) => self.persist(&record).await,
            OutboundMessage::CreateEhrEntry(entry) => {
                let entry = &entry;
                self.with_retry("ehr", move || self.history.create_ehr_entry(entry))
                    .await;
            }
            OutboundMessage::Notify {
                user_id,
                kind,
                payload,
            } => {
                self.notify(&user_id, kind, &payload).await;
            }
        }
    }

    /// Persist a prediction, then raise a recurring-pattern notice when the
    /// same disease already appeared often enough before it.
    ///
    /// History is read after the write, so the stored record is part of the
    /// count even when an earlier attempt had to be retried.
    async fn persist(&self, record: &PredictionRecord) {
        let stored = self
            .with_retry("history", move || self.history.record_prediction(record))
            .await;
        if stored.is_none() {
            return;
        }

        let prior = self.prior_occurrences(record).await;
        if prior >= RECURRING_THRESHOLD {
            let disease = &record.result.top_label;
            info!(
                user_id = %record.user_id,
                disease = %disease,
                prior,
                "Recurring condition detected"
            );
            let kind = NotificationKind::RecurringPattern;
            let payload = NotificationPayload::new(kind, disease, record.result.risk_tier);
            self.notify(&record.user_id, kind, &payload).await;
        }
    }

    async fn notify(&self, user_id: &str, kind: NotificationKind, payload: &NotificationPayload) {
        self.with_retry("notification", move || {
            self.notifier.notify(user_id, kind, payload)
        })
        .await;
    }

    /// Matches among the `RECURRING_LOOKBACK` records stored before `record`,
    /// which must already be in history
    async fn prior_occurrences(&self, record: &PredictionRecord) -> usize {
        if record.user_id == CallerIdentity::ANONYMOUS {
            return 0;
        }

        match self
            .history
            .recent_diseases(&record.user_id, RECURRING_LOOKBACK + 1)
            .await
        {
            Ok(diseases) => diseases
                .iter()
                .skip(1)
                .filter(|d| **d == record.result.top_label)
                .count(),
            Err(e) => {
                warn!(
                    user_id = %record.user_id,
                    error = %e,
                    "Could not read recent history, skipping recurrence check"
                );
                0
            }
        }
    }

    /// Run `op` until it succeeds or retries are exhausted, with exponential backoff
    async fn with_retry<T, F, Fut>(&self, effect: &'static str, mut op: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                let delay = self.retry_backoff * 2_u32.saturating_pow(attempt - 1);
                debug!(
                    effect,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying side effect"
                );
                sleep(delay).await;
            }

            match op().await {
                Ok(value) => {
                    record_side_effect(effect, "delivered");
                    return Some(value);
                }
                Err(e) if attempt < self.max_retries => {
                    record_side_effect(effect, "retried");
                    warn!(effect, attempt = attempt + 1, error = %e, "Side effect failed");
                    attempt += 1;
                }
                Err(e) => {
                    record_side_effect(effect, "failed");
                    error!(
                        effect,
                        attempts = attempt + 1,
                        error = %e,
                        "Side effect failed after all retries"
                    );
                    return None;
                }
            }
        }
    }
}
