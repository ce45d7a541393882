use crate::container;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("pod `{pod}` has no uid")]
    MissingUid { pod: String },
    #[error("pod with uid `{uid}` has no name")]
    MissingName { uid: String },
    #[error("pod `{pod}` has no namespace")]
    MissingNamespace { pod: String },
    #[error("pod `{pod}` has no spec")]
    MissingSpec { pod: String },
    #[error(transparent)]
    Container(#[from] container::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
