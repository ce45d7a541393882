use std::fmt;
use std::sync::Arc;

mod error;

pub use error::{Error, Result};

/// Distinguishes init containers from regular containers of the same pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerGroup {
    Init,
    Regular,
}

impl ContainerGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerGroup::Init => "init",
            ContainerGroup::Regular => "regular",
        }
    }
}

impl fmt::Display for ContainerGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable key naming one monitored container of one pod.
///
/// Two identities are equal only if pod UID, container name and
/// [`ContainerGroup`] all match, so an init container never collides with a
/// regular container that happens to share its name.
///
/// # Examples
///
/// ```
/// # use pod_log_bridge::container::{ContainerGroup, ContainerIdentity};
/// let init = ContainerIdentity::new("7f0c", "setup", ContainerGroup::Init).unwrap();
/// let main = ContainerIdentity::new("7f0c", "setup", ContainerGroup::Regular).unwrap();
/// assert_ne!(init, main);
/// assert_eq!(init.to_string(), "7f0c/init/setup");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerIdentity {
    pod_uid: Arc<str>,
    name: Arc<str>,
    group: ContainerGroup,
}

impl ContainerIdentity {
    /// Creates a new `ContainerIdentity`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyPodUid`] or [`Error::EmptyContainerName`] if either
    /// component is empty.
    pub fn new(
        pod_uid: impl AsRef<str>,
        name: impl AsRef<str>,
        group: ContainerGroup,
    ) -> Result<Self> {
        let pod_uid = pod_uid.as_ref();
        let name = name.as_ref();
        if pod_uid.is_empty() {
            return Err(Error::EmptyPodUid {
                container: name.to_owned(),
            });
        }
        if name.is_empty() {
            return Err(Error::EmptyContainerName {
                pod_uid: pod_uid.to_owned(),
            });
        }

        Ok(Self {
            pod_uid: pod_uid.into(),
            name: name.into(),
            group,
        })
    }

    pub fn pod_uid(&self) -> &str {
        &self.pod_uid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> ContainerGroup {
        self.group
    }

    pub fn is_init(&self) -> bool {
        self.group == ContainerGroup::Init
    }
}

impl fmt::Display for ContainerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.pod_uid, self.group, self.name)
    }
}

/// Everything a task needs to locate the log stream of one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDescriptor {
    identity: ContainerIdentity,
    pod_name: Arc<str>,
    namespace: Arc<str>,
}

impl ContainerDescriptor {
    pub fn new(
        identity: ContainerIdentity,
        pod_name: impl Into<Arc<str>>,
        namespace: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            identity,
            pod_name: pod_name.into(),
            namespace: namespace.into(),
        }
    }

    pub fn identity(&self) -> &ContainerIdentity {
        &self.identity
    }

    pub fn pod_name(&self) -> &str {
        &self.pod_name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn pod_uid(&self) -> &str {
        self.identity.pod_uid()
    }

    pub fn container_name(&self) -> &str {
        self.identity.name()
    }
}
