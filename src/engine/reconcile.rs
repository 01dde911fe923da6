use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::archive::{AnalyticsArchive, AnalyticsRecord};
use crate::clock::Clock;
use crate::events::{Event, EventBus};
use crate::job::{Job, JobRegistry, JobStatus};
use crate::matcher::match_answer;
use crate::node::{NodeClient, NodeMessage};
use crate::notifier::{Delivery, Notifier};

/// Timing of the reconciliation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Sleep when there is nothing to poll.
    pub idle_interval: Duration,
    /// Sleep between two cycles.
    pub cycle_delay: Duration,
    /// Deadline for a single inbox fetch or delivery.
    pub call_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_secs(1),
            cycle_delay: Duration::from_secs(1),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of one pass over the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub polled: usize,
    pub delivered: usize,
    /// Jobs with no answer yet.
    pub waiting: usize,
    pub failed_polls: usize,
    pub failed_deliveries: usize,
}

/// Polls the node for answers to outstanding jobs and delivers them.
pub struct Reconciler {
    node: Arc<dyn NodeClient>,
    notifier: Arc<dyn Notifier>,
    registry: Arc<JobRegistry>,
    archive: Arc<AnalyticsArchive>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    config: LoopConfig,
    /// Inbox as it was when each job's latest answer was posted.
    delivered: Mutex<HashMap<String, Vec<NodeMessage>>>,
}

impl Reconciler {
    pub fn new(
        node: Arc<dyn NodeClient>,
        notifier: Arc<dyn Notifier>,
        registry: Arc<JobRegistry>,
        archive: Arc<AnalyticsArchive>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        config: LoopConfig,
    ) -> Self {
        Self {
            node,
            notifier,
            registry,
            archive,
            events,
            clock,
            config,
            delivered: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> LoopConfig {
        self.config
    }

    /// Run cycles until `cancel` fires.
    ///
    /// Cancellation is only observed while sleeping, so a cycle that has
    /// started always runs to completion.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            idle_ms = self.config.idle_interval.as_millis() as u64,
            cycle_ms = self.config.cycle_delay.as_millis() as u64,
            "reconciler started"
        );

        loop {
            let pause = if self.registry.is_empty().await {
                self.config.idle_interval
            } else {
                let report = self.run_cycle().await;
                tracing::debug!(
                    polled = report.polled,
                    delivered = report.delivered,
                    waiting = report.waiting,
                    failed_polls = report.failed_polls,
                    failed_deliveries = report.failed_deliveries,
                    "cycle finished"
                );
                self.config.cycle_delay
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        let outstanding = self.registry.len().await;
        tracing::info!(outstanding, "reconciler stopped");
    }

    /// One pass over every outstanding job.
    ///
    /// Inboxes are fetched concurrently; matching and delivery then run job
    /// by job. A failure on one job never affects the others.
    pub async fn run_cycle(&self) -> CycleReport {
        let jobs = self.registry.snapshot().await;
        let mut report = CycleReport {
            polled: jobs.len(),
            ..CycleReport::default()
        };
        if jobs.is_empty() {
            return report;
        }
        tracing::debug!(jobs = jobs.len(), "polling outstanding jobs");

        let timeout = self.config.call_timeout;
        let inboxes = futures::future::join_all(
            jobs.iter()
                .map(|job| tokio::time::timeout(timeout, self.node.fetch_inbox(&job.job_id))),
        )
        .await;

        for (job, inbox) in jobs.into_iter().zip(inboxes) {
            let messages = match inbox {
                Ok(Ok(messages)) => messages,
                Ok(Err(e)) => {
                    tracing::warn!(job_id = %job.job_id, error = %e, "inbox poll failed");
                    report.failed_polls += 1;
                    continue;
                }
                Err(_) => {
                    tracing::warn!(
                        job_id = %job.job_id,
                        timeout_ms = timeout.as_millis() as u64,
                        "inbox poll timed out"
                    );
                    report.failed_polls += 1;
                    continue;
                }
            };

            match match_answer(&messages) {
                None => {
                    tracing::debug!(job_id = %job.job_id, messages = messages.len(), "no answer yet");
                    report.waiting += 1;
                }
                Some(_) if self.already_delivered(&job.job_id, &messages) => {
                    tracing::debug!(job_id = %job.job_id, "latest answer already delivered");
                    report.waiting += 1;
                }
                Some(answer) => {
                    if self.deliver(job, answer, messages).await {
                        report.delivered += 1;
                    } else {
                        report.failed_deliveries += 1;
                    }
                }
            }
        }

        report
    }

    fn delivered(&self) -> MutexGuard<'_, HashMap<String, Vec<NodeMessage>>> {
        self.delivered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the inbox is unchanged since this job's last delivery, so
    /// its latest answer has already been posted.
    fn already_delivered(&self, job_id: &str, messages: &[NodeMessage]) -> bool {
        self.delivered()
            .get(job_id)
            .is_some_and(|seen| seen.as_slice() == messages)
    }

    async fn deliver(&self, job: Job, answer: String, messages: Vec<NodeMessage>) -> bool {
        let timeout = self.config.call_timeout;
        let delivery =
            match tokio::time::timeout(timeout, self.notifier.post(&job.origin, &answer)).await {
                Ok(delivery) => delivery,
                Err(_) => Delivery::Rejected(format!("timed out after {}ms", timeout.as_millis())),
            };

        match delivery {
            Delivery::Posted => {
                self.delivered().insert(job.job_id.clone(), messages);
                let delivered_at = self.clock.now();
                let record = AnalyticsRecord::delivered(&job, answer, delivered_at);
                let latency_ms = record.latency_ms;

                match self.registry.complete(&job).await {
                    Some(done) => {
                        tracing::info!(job_id = %done.job_id, origin = %done.origin, status = %done.status, latency_ms, "answer delivered, job evicted");
                    }
                    None => {
                        // A follow-up prompt re-registered the job while we
                        // were posting; keep waiting for its answer.
                        tracing::info!(job_id = %job.job_id, latency_ms, "answer delivered, job re-dispatched meanwhile");
                    }
                }

                self.archive.append(record);
                self.events.emit(Event::AnswerDelivered {
                    job_id: job.job_id,
                    origin: job.origin,
                    latency_ms,
                });
                true
            }
            Delivery::Rejected(reason) => {
                tracing::warn!(job_id = %job.job_id, origin = %job.origin, %reason, "delivery failed, will retry");
                self.registry.mark(&job.job_id, JobStatus::Failed).await;
                self.events.emit(Event::DeliveryFailed {
                    job_id: job.job_id,
                    reason,
                });
                false
            }
        }
    }
}
