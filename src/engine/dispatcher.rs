use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::DispatchError;
use crate::clock::Clock;
use crate::events::{Event, EventBus};
use crate::job::{Job, JobRegistry, Origin};
use crate::node::NodeClient;
use crate::store::ThreadStore;

type Gate = Arc<tokio::sync::Mutex<()>>;

/// Sends prompts to the node and registers the resulting jobs.
///
/// Safe to call from many tasks at once. Dispatches for the same thread are
/// serialised while the thread is being bound to a job, so a thread never
/// ends up with two jobs.
pub struct Dispatcher {
    node: Arc<dyn NodeClient>,
    registry: Arc<JobRegistry>,
    threads: Arc<ThreadStore>,
    events: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    agent: String,
    gates: Mutex<HashMap<String, Gate>>,
}

impl Dispatcher {
    pub fn new(
        node: Arc<dyn NodeClient>,
        registry: Arc<JobRegistry>,
        threads: Arc<ThreadStore>,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        agent: impl Into<String>,
    ) -> Self {
        Self {
            node,
            registry,
            threads,
            events,
            clock,
            agent: agent.into(),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Send `prompt` into a job and register the job for reconciliation.
    ///
    /// With `existing_job_id` the job is reused. Otherwise the job bound to
    /// `origin.thread_id` is used, and a new one is created and bound when
    /// the thread has none yet. A send failure still registers the job and
    /// reports its id through [`DispatchError::MessageSend`].
    pub async fn dispatch(
        &self,
        prompt: &str,
        origin: Origin,
        existing_job_id: Option<&str>,
    ) -> Result<String, DispatchError> {
        let job_id = match existing_job_id {
            Some(job_id) => {
                tracing::info!(job_id, "reusing existing job");
                job_id.to_string()
            }
            None => self.bind_thread(&origin.thread_id).await?,
        };

        self.send_and_register(prompt, origin, job_id).await
    }

    /// Dispatch a message that arrived in a chat thread: reuse the job the
    /// thread is bound to, or create and bind one.
    pub async fn dispatch_in_thread(
        &self,
        prompt: &str,
        origin: Origin,
    ) -> Result<String, DispatchError> {
        self.dispatch(prompt, origin, None).await
    }

    async fn bind_thread(&self, thread_id: &str) -> Result<String, DispatchError> {
        if let Some(job_id) = self.threads.get(thread_id) {
            tracing::info!(thread_id, job_id = %job_id, "thread already has a job");
            return Ok(job_id);
        }

        let gate = self.gate(thread_id);
        let bound = {
            let _guard = gate.lock().await;
            match self.threads.get(thread_id) {
                Some(job_id) => {
                    tracing::info!(thread_id, job_id = %job_id, "thread bound while waiting");
                    Ok(job_id)
                }
                None => match self.create_job().await {
                    Ok(job_id) => Ok(self.threads.put(thread_id, &job_id)),
                    Err(e) => Err(e),
                },
            }
        };
        self.release_gate(thread_id, gate);
        bound
    }

    async fn create_job(&self) -> Result<String, DispatchError> {
        match self.node.create_job(&self.agent).await {
            Ok(job_id) => {
                tracing::info!(job_id = %job_id, agent = %self.agent, "job created");
                Ok(job_id)
            }
            Err(e) => {
                tracing::error!(agent = %self.agent, error = %e, "job creation failed");
                Err(DispatchError::JobCreation(e))
            }
        }
    }

    async fn send_and_register(
        &self,
        prompt: &str,
        origin: Origin,
        job_id: String,
    ) -> Result<String, DispatchError> {
        let sent = self.node.send_message(prompt, &job_id).await;

        let job = Job::pending(&job_id, prompt, origin.clone(), self.clock.now());
        self.registry.register(job).await;
        self.events.emit(Event::JobDispatched {
            job_id: job_id.clone(),
            origin: origin.clone(),
        });

        match sent {
            Ok(()) => {
                tracing::info!(job_id = %job_id, %origin, "prompt dispatched");
                Ok(job_id)
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, %origin, error = %e, "prompt send failed, job kept for follow-up");
                Err(DispatchError::MessageSend { job_id, source: e })
            }
        }
    }

    fn gates(&self) -> MutexGuard<'_, HashMap<String, Gate>> {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn gate(&self, thread_id: &str) -> Gate {
        Arc::clone(self.gates().entry(thread_id.to_string()).or_default())
    }

    /// Drop the gate once nobody else is waiting on it.
    fn release_gate(&self, thread_id: &str, gate: Gate) {
        let mut gates = self.gates();
        drop(gate);
        if gates
            .get(thread_id)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(thread_id);
        }
    }

    #[cfg(test)]
    fn open_gates(&self) -> usize {
        self.gates().len()
    }
}
