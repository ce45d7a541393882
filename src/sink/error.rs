#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open log stream for `{namespace}/{pod}/{container}`: {source}")]
    Connect {
        namespace: String,
        pod: String,
        container: String,
        #[source]
        source: Box<kube::Error>,
    },
    #[error("pod `{namespace}/{pod}` not found")]
    PodNotFound { namespace: String, pod: String },
    #[error("line channel is closed")]
    Closed,
    #[error("failed to encode log line: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write log line: {0}")]
    Write(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
