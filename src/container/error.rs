#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("empty pod uid for container `{container}`")]
    EmptyPodUid { container: String },
    #[error("empty container name in pod `{pod_uid}`")]
    EmptyContainerName { pod_uid: String },
}

pub type Result<T> = std::result::Result<T, Error>;
