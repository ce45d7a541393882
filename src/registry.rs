use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::container::{ContainerDescriptor, ContainerIdentity};
use crate::sink::LogSink;
use crate::task::{ContainerTask, TaskHandle};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("container `{0}` is not tracked")]
    NotFound(ContainerIdentity),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Outcome of [`ContainerRegistry::ensure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    /// No task existed; a new one was started.
    Created,
    /// A live task already tracks the container.
    Existing,
    /// The tracked task had stopped on its own and was replaced.
    Restarted,
}

impl Ensured {
    /// Whether a new task was started.
    pub fn started(&self) -> bool {
        !matches!(self, Ensured::Existing)
    }
}

/// Tracks the active log tail of every monitored container.
///
/// All mutation goes through the map's entry and removal operations, which
/// lock the affected shard, so at most one task exists per identity.
pub struct ContainerRegistry<S> {
    tasks: DashMap<ContainerIdentity, ContainerTask>,
    sink: Arc<S>,
}

impl<S: LogSink> ContainerRegistry<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self {
            tasks: DashMap::new(),
            sink,
        }
    }

    /// Makes sure a live task tails the container described by `descriptor`.
    ///
    /// Starting a task requires a running tokio runtime.
    pub fn ensure(&self, descriptor: ContainerDescriptor) -> Ensured {
        log::debug!("{}: ensuring container is monitored", descriptor.identity());
        match self.tasks.entry(descriptor.identity().clone()) {
            Entry::Occupied(mut entry) => {
                if !entry.get().is_stopped() {
                    return Ensured::Existing;
                }
                log::debug!(
                    "{}: previous log tail stopped ({:?}), starting a new one",
                    entry.key(),
                    entry.get().state()
                );
                let since = entry.get().last_seen();
                let fresh = ContainerTask::resume(descriptor, Arc::clone(&self.sink), since);
                entry.insert(fresh).cancel();
                Ensured::Restarted
            }
            Entry::Vacant(entry) => {
                entry.insert(ContainerTask::spawn(descriptor, Arc::clone(&self.sink)));
                Ensured::Created
            }
        }
    }

    pub fn get(&self, identity: &ContainerIdentity) -> Option<TaskHandle> {
        self.tasks.get(identity).map(|task| task.handle())
    }

    pub fn contains(&self, identity: &ContainerIdentity) -> bool {
        self.tasks.contains_key(identity)
    }

    /// Stops tracking `identity` and cancels its task.
    ///
    /// The entry is gone when this returns; the task shuts down asynchronously.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the container is not tracked.
    pub fn remove(&self, identity: &ContainerIdentity) -> Result<TaskHandle> {
        match self.tasks.remove(identity) {
            Some((_, task)) => Ok(task.cancel()),
            None => Err(Error::NotFound(identity.clone())),
        }
    }

    /// Stops tracking every container of the pod `pod_uid`.
    ///
    /// Returns the number of removed containers.
    pub fn remove_all_for_pod(&self, pod_uid: &str) -> usize {
        log::debug!("Removing containers of pod `{}`", pod_uid);
        self.drain(|identity| identity.pod_uid() == pod_uid)
    }

    /// Stops tracking every container.
    pub fn shutdown(&self) -> usize {
        self.drain(|_| true)
    }

    /// Removes every matching entry, dropping (and so cancelling) its task.
    fn drain(&self, matches: impl Fn(&ContainerIdentity) -> bool) -> usize {
        let mut removed = 0;
        self.tasks.retain(|identity, _| {
            let remove = matches(identity);
            removed += usize::from(remove);
            !remove
        });
        removed
    }

    fn matching(&self, matches: impl Fn(&ContainerIdentity) -> bool) -> Vec<ContainerIdentity> {
        self.tasks
            .iter()
            .filter(|entry| matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn identities_for_pod(&self, pod_uid: &str) -> Vec<ContainerIdentity> {
        self.matching(|identity| identity.pod_uid() == pod_uid)
    }

    /// UIDs of all pods with at least one tracked container.
    pub fn pod_uids(&self) -> HashSet<String> {
        self.tasks
            .iter()
            .map(|entry| entry.key().pod_uid().to_owned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
