//! Log stream sources and the downstream line writer.
//!
//! A [`LogSink`] is what a container task talks to: it opens the log stream
//! of one container and accepts the decoded lines read from it. The
//! production implementation, [`KubeLogSink`], follows container logs through
//! the Kubernetes API and hands lines to [`write_lines`] over a bounded
//! channel.
use std::pin::Pin;
use std::time::SystemTime;

use futures::Stream;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::container::{ContainerDescriptor, ContainerGroup};

mod error;
mod kubernetes;
#[cfg(test)]
pub(crate) mod mock;

pub use error::{Error, Result};
pub use kubernetes::{KubeLogSink, LogOptions};

/// Lazy, potentially infinite sequence of log lines from one container.
pub type LogStream = Pin<Box<dyn Stream<Item = std::io::Result<String>> + Send>>;

/// Connects container tasks to their log streams and accepts their lines.
pub trait LogSink: Send + Sync + 'static {
    /// Opens the log stream of the container described by `descriptor`.
    ///
    /// With `since` set only lines written after that point are wanted; it is
    /// passed when an earlier stream of the same container came to an end.
    fn connect(
        &self,
        descriptor: &ContainerDescriptor,
        since: Option<SystemTime>,
    ) -> impl std::future::Future<Output = Result<LogStream>> + Send;

    /// Hands one decoded line downstream.
    fn forward(&self, line: LogLine) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// A single line read from a container's log stream.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LogLine {
    pub namespace: String,
    pub pod: String,
    pub pod_uid: String,
    pub container: String,
    pub group: ContainerGroup,
    pub message: String,
}

impl LogLine {
    pub fn new(descriptor: &ContainerDescriptor, message: String) -> Self {
        Self {
            namespace: descriptor.namespace().to_owned(),
            pod: descriptor.pod_name().to_owned(),
            pod_uid: descriptor.pod_uid().to_owned(),
            container: descriptor.container_name().to_owned(),
            group: descriptor.identity().group(),
            message,
        }
    }
}

/// Drains `rx`, writing one JSON object per line to `out` until every sender
/// is gone.
///
/// # Errors
///
/// Returns an error if a line cannot be encoded or written.
pub async fn write_lines<W>(
    mut rx: tokio::sync::mpsc::Receiver<LogLine>,
    mut out: W,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(512);
    while let Some(line) = rx.recv().await {
        buf.clear();
        serde_json::to_writer(&mut buf, &line).map_err(Error::Encode)?;
        buf.push(b'\n');
        out.write_all(&buf).await.map_err(Error::Write)?;
        out.flush().await.map_err(Error::Write)?;
    }
    log::debug!("Line channel closed, stopping writer");

    Ok(())
}
