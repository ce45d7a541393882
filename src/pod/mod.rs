//! Pod events and the per-event view of a pod used for reconciliation.
use std::sync::Arc;

use k8s_openapi::api::core::v1::{Container, ContainerStatus, Pod};

use crate::container::{ContainerDescriptor, ContainerGroup, ContainerIdentity};

mod error;
#[cfg(test)]
pub(crate) mod fixtures;

pub use error::{Error, Result};

/// One message from the pod watch.
#[derive(Debug, Clone)]
pub enum PodEvent {
    /// A pod was created or changed.
    Applied(Pod),
    /// A pod was deleted.
    Deleted(Pod),
    /// The event source closed, optionally because of an error.
    Closed(Option<String>),
}

/// Observed state of a declared container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    NotRunning,
    /// No status has been reported yet.
    Unknown,
}

impl RunState {
    fn from_status(status: Option<&ContainerStatus>) -> Self {
        match status.and_then(|status| status.state.as_ref()) {
            Some(state) if state.running.is_some() => RunState::Running,
            Some(_) => RunState::NotRunning,
            None => RunState::Unknown,
        }
    }

    pub fn is_running(&self) -> bool {
        *self == RunState::Running
    }
}

/// A container declared in the pod spec together with its observed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredContainer {
    pub identity: ContainerIdentity,
    pub state: RunState,
}

/// Validated view of a single pod event. Never kept past the event.
#[derive(Debug, Clone)]
pub struct PodSnapshot {
    uid: Arc<str>,
    name: Arc<str>,
    namespace: Arc<str>,
    init_containers: Vec<DeclaredContainer>,
    containers: Vec<DeclaredContainer>,
}

impl PodSnapshot {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn init_containers(&self) -> &[DeclaredContainer] {
        &self.init_containers
    }

    pub fn containers(&self) -> &[DeclaredContainer] {
        &self.containers
    }

    /// Init containers first, then regular containers, in spec order.
    pub fn declared(&self) -> impl Iterator<Item = &DeclaredContainer> {
        self.init_containers.iter().chain(self.containers.iter())
    }

    pub fn descriptor(&self, container: &DeclaredContainer) -> ContainerDescriptor {
        ContainerDescriptor::new(
            container.identity.clone(),
            Arc::clone(&self.name),
            Arc::clone(&self.namespace),
        )
    }
}

impl TryFrom<&Pod> for PodSnapshot {
    type Error = Error;

    fn try_from(pod: &Pod) -> Result<Self> {
        let uid = pod_uid(pod)?;
        let name = pod
            .metadata
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::MissingName {
                uid: uid.to_owned(),
            })?;
        let namespace = pod
            .metadata
            .namespace
            .as_deref()
            .filter(|namespace| !namespace.is_empty())
            .ok_or_else(|| Error::MissingNamespace {
                pod: name.to_owned(),
            })?;
        let spec = pod.spec.as_ref().ok_or_else(|| Error::MissingSpec {
            pod: name.to_owned(),
        })?;
        let status = pod.status.as_ref();

        let init_containers = declare(
            uid,
            spec.init_containers.as_deref().unwrap_or_default(),
            status.and_then(|status| status.init_container_statuses.as_deref()),
            ContainerGroup::Init,
        )?;
        let containers = declare(
            uid,
            &spec.containers,
            status.and_then(|status| status.container_statuses.as_deref()),
            ContainerGroup::Regular,
        )?;

        Ok(Self {
            uid: uid.into(),
            name: name.into(),
            namespace: namespace.into(),
            init_containers,
            containers,
        })
    }
}

/// Returns the UID of `pod`.
///
/// # Errors
///
/// Returns [`Error::MissingUid`] if the pod has no (or an empty) UID.
pub fn pod_uid(pod: &Pod) -> Result<&str> {
    pod.metadata
        .uid
        .as_deref()
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| Error::MissingUid {
            pod: pod.metadata.name.clone().unwrap_or_default(),
        })
}

fn declare(
    uid: &str,
    containers: &[Container],
    statuses: Option<&[ContainerStatus]>,
    group: ContainerGroup,
) -> Result<Vec<DeclaredContainer>> {
    containers
        .iter()
        .map(|container| -> Result<DeclaredContainer> {
            let status = statuses
                .unwrap_or_default()
                .iter()
                .find(|status| status.name == container.name);
            Ok(DeclaredContainer {
                identity: ContainerIdentity::new(uid, &container.name, group)?,
                state: RunState::from_status(status),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::fixtures::{PodBuilder, Status};
    use super::*;

    #[test]
    fn test_snapshot_from_pod() {
        let pod = PodBuilder::new("uid-1")
            .init("setup", Status::Terminated)
            .container("app", Status::Running)
            .container("sidecar", Status::Waiting)
            .container("late", Status::Missing)
            .build();

        let snapshot = PodSnapshot::try_from(&pod).unwrap();
        assert_eq!(snapshot.uid(), "uid-1");
        assert_eq!(snapshot.name(), "pod-uid-1");
        assert_eq!(snapshot.namespace(), "apps");

        let states: Vec<_> = snapshot
            .declared()
            .map(|c| (c.identity.name().to_owned(), c.identity.group(), c.state))
            .collect();
        assert_eq!(
            states,
            vec![
                ("setup".to_owned(), ContainerGroup::Init, RunState::NotRunning),
                ("app".to_owned(), ContainerGroup::Regular, RunState::Running),
                ("sidecar".to_owned(), ContainerGroup::Regular, RunState::NotRunning),
                ("late".to_owned(), ContainerGroup::Regular, RunState::Unknown),
            ]
        );
    }

    #[test]
    fn test_status_lookup_respects_group() {
        // init and regular container share a name but report different states
        let pod = PodBuilder::new("uid-1")
            .init("app", Status::Running)
            .container("app", Status::Waiting)
            .build();

        let snapshot = PodSnapshot::try_from(&pod).unwrap();
        assert_eq!(snapshot.init_containers()[0].state, RunState::Running);
        assert_eq!(snapshot.containers()[0].state, RunState::NotRunning);
        assert_ne!(
            snapshot.init_containers()[0].identity,
            snapshot.containers()[0].identity
        );
    }

    #[test]
    fn test_pod_without_status_is_unknown() {
        let mut pod = PodBuilder::new("uid-1")
            .container("app", Status::Running)
            .build();
        pod.status = None;

        let snapshot = PodSnapshot::try_from(&pod).unwrap();
        assert_eq!(snapshot.containers()[0].state, RunState::Unknown);
    }

    #[test]
    fn test_descriptor_from_snapshot() {
        let pod = PodBuilder::new("uid-1")
            .container("app", Status::Running)
            .build();
        let snapshot = PodSnapshot::try_from(&pod).unwrap();

        let descriptor = snapshot.descriptor(&snapshot.containers()[0]);
        assert_eq!(descriptor.pod_name(), "pod-uid-1");
        assert_eq!(descriptor.namespace(), "apps");
        assert_eq!(descriptor.container_name(), "app");
    }

    #[test]
    fn test_malformed_pods() {
        let mut pod = PodBuilder::new("uid-1").build();
        pod.metadata.uid = None;
        assert!(matches!(
            PodSnapshot::try_from(&pod),
            Err(Error::MissingUid { .. })
        ));

        let mut pod = PodBuilder::new("uid-1").build();
        pod.metadata.name = None;
        assert!(matches!(
            PodSnapshot::try_from(&pod),
            Err(Error::MissingName { .. })
        ));

        let mut pod = PodBuilder::new("uid-1").build();
        pod.metadata.namespace = Some(String::new());
        assert!(matches!(
            PodSnapshot::try_from(&pod),
            Err(Error::MissingNamespace { .. })
        ));

        let mut pod = PodBuilder::new("uid-1").build();
        pod.spec = None;
        assert!(matches!(
            PodSnapshot::try_from(&pod),
            Err(Error::MissingSpec { .. })
        ));

        let pod = PodBuilder::new("uid-1").container("", Status::Running).build();
        assert!(matches!(
            PodSnapshot::try_from(&pod),
            Err(Error::Container(_))
        ));
    }
}
