use super::Job;
use crate::error::JobError;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, Notify, mpsc};
use tokio_retry::strategy::ExponentialBackoff;
use tracing::{debug, error, trace};
use uuid::Uuid;

/// Accepts jobs for asynchronous execution
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> Result<Uuid, JobError>;
}

/// Observable state of an unfinished job. Completed jobs are forgotten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running { attempt: u32 },
    /// Last attempt failed; the job has been put back for redelivery
    Failed { attempts: u32, error: String },
}

/// A job handed to a worker
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: Uuid,
    pub job: Job,
    /// 1 for the first delivery
    pub attempt: u32,
}

/// Backoff before a failed job is delivered again
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before delivery number `attempt + 1`
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis().clamp(1, u128::from(u64::MAX)) as u64;
        ExponentialBackoff::from_millis(2)
            .factor(base / 2 + base % 2)
            .max_delay(self.max_delay)
            .take(attempt.max(1) as usize)
            .last()
            .unwrap_or(self.base_delay)
    }
}

struct Shared {
    sender: mpsc::UnboundedSender<Delivery>,
    /// Jobs not yet acknowledged
    states: DashMap<Uuid, JobState>,
    /// Queued, running or waiting for redelivery
    outstanding: AtomicUsize,
    idle: Notify,
    retry: RetryPolicy,
}

impl Shared {
    fn settle(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// In-process queue with at-least-once delivery: jobs that fail are
/// requeued with exponential backoff until they succeed.
#[derive(Clone)]
pub struct LocalJobQueue {
    shared: Arc<Shared>,
    receiver: Arc<Mutex<mpsc::UnboundedReceiver<Delivery>>>,
}

impl LocalJobQueue {
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                sender,
                states: DashMap::new(),
                outstanding: AtomicUsize::new(0),
                idle: Notify::new(),
                retry,
            }),
            receiver: Arc::new(Mutex::new(receiver)),
        }
    }

    /// Wait for the next delivery
    pub async fn next(&self) -> Option<Delivery> {
        let delivery = self.receiver.lock().await.recv().await?;
        self.shared.states.insert(
            delivery.id,
            JobState::Running {
                attempt: delivery.attempt,
            },
        );
        trace!("Delivering {} (attempt {})", delivery.job, delivery.attempt);
        Some(delivery)
    }

    /// Acknowledge a delivery
    pub fn complete(&self, delivery: &Delivery) {
        self.shared.states.remove(&delivery.id);
        self.shared.settle();
    }

    /// Record a failure and schedule redelivery
    pub fn fail(&self, delivery: Delivery, error: String) {
        let delay = self.shared.retry.delay(delivery.attempt);
        error!(
            "Job {} failed on attempt {}: {}; requeueing in {:?}",
            delivery.job, delivery.attempt, error, delay
        );
        self.shared.states.insert(
            delivery.id,
            JobState::Failed {
                attempts: delivery.attempt,
                error,
            },
        );

        let shared = self.shared.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let redelivery = Delivery {
                attempt: delivery.attempt + 1,
                ..delivery
            };
            let id = redelivery.id;
            if shared.sender.send(redelivery).is_err() {
                debug!("Queue closed, dropping redelivery of {}", id);
                shared.states.remove(&id);
                shared.settle();
            }
        });
    }

    /// `None` once a job has completed (or was never enqueued)
    pub fn state(&self, id: &Uuid) -> Option<JobState> {
        self.shared.states.get(id).map(|s| s.value().clone())
    }

    /// Number of jobs with a tracked state
    pub fn tracked(&self) -> usize {
        self.shared.states.len()
    }

    /// Jobs queued, running or waiting for redelivery
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.load(Ordering::SeqCst)
    }

    /// Resolve once nothing is outstanding
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Default for LocalJobQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobQueue for LocalJobQueue {
    async fn enqueue(&self, job: Job) -> Result<Uuid, JobError> {
        let id = Uuid::new_v4();
        debug!("Enqueueing {} as {}", job, id);
        self.shared.states.insert(id, JobState::Queued);
        self.shared.outstanding.fetch_add(1, Ordering::SeqCst);
        if self
            .shared
            .sender
            .send(Delivery {
                id,
                job,
                attempt: 1,
            })
            .is_err()
        {
            self.shared.states.remove(&id);
            self.shared.settle();
            return Err(JobError::QueueClosed);
        }
        Ok(id)
    }
}
