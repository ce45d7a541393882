use k8s_openapi::api::core::v1::{
    Container, ContainerState, ContainerStateRunning, ContainerStateTerminated,
    ContainerStateWaiting, ContainerStatus, Pod, PodSpec, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Container status reported by a test pod.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Status {
    Running,
    Waiting,
    Terminated,
    /// Declared, but no status reported yet.
    Missing,
}

/// Builds `Pod` objects in the shape the API server delivers them.
pub(crate) struct PodBuilder {
    uid: String,
    init: Vec<(String, Status)>,
    containers: Vec<(String, Status)>,
}

impl PodBuilder {
    pub(crate) fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_owned(),
            init: Vec::new(),
            containers: Vec::new(),
        }
    }

    pub(crate) fn init(mut self, name: &str, status: Status) -> Self {
        self.init.push((name.to_owned(), status));
        self
    }

    pub(crate) fn container(mut self, name: &str, status: Status) -> Self {
        self.containers.push((name.to_owned(), status));
        self
    }

    pub(crate) fn build(self) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(format!("pod-{}", self.uid)),
                namespace: Some("apps".to_owned()),
                uid: Some(self.uid.clone()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                init_containers: Some(containers(&self.init)),
                containers: containers(&self.containers),
                ..Default::default()
            }),
            status: Some(PodStatus {
                init_container_statuses: Some(statuses(&self.init)),
                container_statuses: Some(statuses(&self.containers)),
                ..Default::default()
            }),
        }
    }
}

fn containers(declared: &[(String, Status)]) -> Vec<Container> {
    declared
        .iter()
        .map(|(name, _)| Container {
            name: name.clone(),
            ..Default::default()
        })
        .collect()
}

fn statuses(declared: &[(String, Status)]) -> Vec<ContainerStatus> {
    declared
        .iter()
        .filter_map(|(name, status)| {
            let state = match status {
                Status::Running => ContainerState {
                    running: Some(ContainerStateRunning::default()),
                    ..Default::default()
                },
                Status::Waiting => ContainerState {
                    waiting: Some(ContainerStateWaiting {
                        reason: Some("ContainerCreating".to_owned()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                Status::Terminated => ContainerState {
                    terminated: Some(ContainerStateTerminated {
                        exit_code: 0,
                        reason: Some("Completed".to_owned()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                Status::Missing => return None,
            };
            Some(ContainerStatus {
                name: name.clone(),
                state: Some(state),
                ..Default::default()
            })
        })
        .collect()
}
