use std::collections::HashSet;

use crate::pod::{self, PodEvent, PodSnapshot};
use crate::registry::{self, ContainerRegistry};
use crate::sink::LogSink;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed pod event: {0}")]
    Malformed(#[from] pod::Error),
    #[error("pod event source closed{}", closed_reason(.0))]
    SourceClosed(Option<String>),
}

fn closed_reason(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|reason| format!(": {reason}"))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, Error>;

/// What a single reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Tasks started for running containers.
    pub started: usize,
    /// Tasks stopped because their container is not running.
    pub stopped: usize,
    /// Tasks removed because their container is no longer declared.
    pub swept: usize,
}

/// Aligns the container registry with the pod events it is fed.
///
/// Events must be handled one at a time; every event is reconciled against
/// the registry alone, never against an earlier snapshot.
pub struct Reconciler<S> {
    registry: ContainerRegistry<S>,
}

impl<S: LogSink> Reconciler<S> {
    pub fn new(registry: ContainerRegistry<S>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ContainerRegistry<S> {
        &self.registry
    }

    /// Applies one pod event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for pods that cannot be reconciled and
    /// [`Error::SourceClosed`] when the event source reports it closed. The
    /// registry is left untouched in both cases.
    pub fn handle(&self, event: PodEvent) -> Result<Reconciled> {
        match event {
            PodEvent::Applied(pod) => {
                let snapshot = PodSnapshot::try_from(&pod)?;
                Ok(self.ensure_pod_status(&snapshot))
            }
            PodEvent::Deleted(pod) => {
                let uid = pod::pod_uid(&pod)?;
                let stopped = self.registry.remove_all_for_pod(uid);
                log::debug!("Pod `{}` deleted, stopped {} log tails", uid, stopped);
                Ok(Reconciled {
                    stopped,
                    ..Default::default()
                })
            }
            PodEvent::Closed(reason) => Err(Error::SourceClosed(reason)),
        }
    }

    /// Starts tails for running containers of `pod`, stops tails of
    /// containers that are not running, and sweeps tails of containers no
    /// longer declared by the pod.
    pub fn ensure_pod_status(&self, pod: &PodSnapshot) -> Reconciled {
        let mut outcome = Reconciled::default();
        let mut declared = HashSet::new();

        for container in pod.declared() {
            declared.insert(&container.identity);
            if container.state.is_running() {
                if self.registry.ensure(pod.descriptor(container)).started() {
                    outcome.started += 1;
                }
                continue;
            }
            match self.registry.remove(&container.identity) {
                Ok(_) => {
                    log::debug!(
                        "{}: container is {:?}, stopped streaming",
                        container.identity,
                        container.state
                    );
                    outcome.stopped += 1;
                }
                Err(registry::Error::NotFound(identity)) => {
                    log::trace!("{}: container is not running, nothing to stop", identity);
                }
            }
        }

        for identity in self.registry.identities_for_pod(pod.uid()) {
            if declared.contains(&identity) {
                continue;
            }
            if self.registry.remove(&identity).is_ok() {
                log::debug!("{}: container left the pod spec, stopped streaming", identity);
                outcome.swept += 1;
            }
        }

        if outcome != Reconciled::default() {
            log::info!(
                "Reconciled pod `{}/{}`: started={} stopped={} swept={}",
                pod.namespace(),
                pod.name(),
                outcome.started,
                outcome.stopped,
                outcome.swept
            );
        }
        outcome
    }
}
