//! The correlation engine: a [`Dispatcher`] that sends prompts and a
//! [`Reconciler`] that polls for answers and delivers them.
//!
//! Both share one [`JobRegistry`]. [`Courier`] wires them together.

pub mod dispatcher;
pub mod reconcile;

use std::sync::Arc;

pub use dispatcher::Dispatcher;
pub use reconcile::{CycleReport, LoopConfig, Reconciler};

use crate::archive::AnalyticsArchive;
use crate::clock::{Clock, SystemClock};
use crate::events::EventBus;
use crate::job::JobRegistry;
use crate::node::{NodeClient, NodeError};
use crate::notifier::Notifier;
use crate::store::ThreadStore;

/// Failures the caller of a dispatch has to report to the end user.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// No job exists; nothing was registered.
    #[error("could not create a job on the node: {0}")]
    JobCreation(#[source] NodeError),
    /// The job exists and is registered, but the prompt may not have reached
    /// the node.
    #[error("job {job_id} is registered but its prompt was not accepted: {source}")]
    MessageSend {
        job_id: String,
        #[source]
        source: NodeError,
    },
}

impl DispatchError {
    /// Job id the failure is about, when a job exists.
    pub fn job_id(&self) -> Option<&str> {
        match self {
            DispatchError::JobCreation(_) => None,
            DispatchError::MessageSend { job_id, .. } => Some(job_id),
        }
    }
}

/// Everything the engine shares, assembled once at startup.
pub struct Courier {
    pub registry: Arc<JobRegistry>,
    pub threads: Arc<ThreadStore>,
    pub archive: Arc<AnalyticsArchive>,
    pub events: Arc<EventBus>,
    pub dispatcher: Arc<Dispatcher>,
    pub reconciler: Arc<Reconciler>,
}

impl Courier {
    pub fn new(
        node: Arc<dyn NodeClient>,
        notifier: Arc<dyn Notifier>,
        threads: ThreadStore,
        agent: impl Into<String>,
        config: LoopConfig,
    ) -> Self {
        Self::with_clock(node, notifier, threads, agent, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        node: Arc<dyn NodeClient>,
        notifier: Arc<dyn Notifier>,
        threads: ThreadStore,
        agent: impl Into<String>,
        config: LoopConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let threads = Arc::new(threads);
        let archive = Arc::new(AnalyticsArchive::new());
        let events = Arc::new(EventBus::default());

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::clone(&node),
            Arc::clone(&registry),
            Arc::clone(&threads),
            Arc::clone(&events),
            Arc::clone(&clock),
            agent,
        ));
        let reconciler = Arc::new(Reconciler::new(
            node,
            notifier,
            Arc::clone(&registry),
            Arc::clone(&archive),
            Arc::clone(&events),
            clock,
            config,
        ));

        Self {
            registry,
            threads,
            archive,
            events,
            dispatcher,
            reconciler,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_only_for_send_failures() {
        let creation = DispatchError::JobCreation(NodeError::JobCreation("down".to_string()));
        assert!(creation.job_id().is_none());

        let send = DispatchError::MessageSend {
            job_id: "J1".to_string(),
            source: NodeError::MessageSend("down".to_string()),
        };
        assert_eq!(send.job_id(), Some("J1"));
        assert!(send.to_string().contains("J1"));
    }
}
