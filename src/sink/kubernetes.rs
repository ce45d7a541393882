use std::time::SystemTime;

use futures::AsyncBufReadExt;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::api::LogParams;

use crate::container::ContainerDescriptor;

use super::{Error, LogLine, LogSink, LogStream, Result};

/// Options applied to every log stream opened by [`KubeLogSink`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Prefix each line with the RFC3339 timestamp reported by the kubelet.
    pub timestamps: bool,
    /// Number of historic lines to replay on a first connect; `None` replays
    /// all. Resumed streams start where the previous one left off instead.
    pub tail_lines: Option<i64>,
}

/// [`LogSink`] following container logs through the Kubernetes API.
///
/// Lines are forwarded into a bounded channel; the receiving end is usually
/// drained by [`super::write_lines`].
#[derive(Clone)]
pub struct KubeLogSink {
    client: kube::Client,
    options: LogOptions,
    lines: tokio::sync::mpsc::Sender<LogLine>,
}

impl KubeLogSink {
    pub fn new(
        client: kube::Client,
        options: LogOptions,
        lines: tokio::sync::mpsc::Sender<LogLine>,
    ) -> Self {
        Self {
            client,
            options,
            lines,
        }
    }

    fn log_params(
        &self,
        descriptor: &ContainerDescriptor,
        since: Option<SystemTime>,
    ) -> LogParams {
        // whole seconds only, lines from the last partial second may repeat
        let since_seconds = since.map(|since| {
            let elapsed = since.elapsed().unwrap_or_default();
            i64::try_from(elapsed.as_secs())
                .unwrap_or(i64::MAX)
                .saturating_add(1)
        });
        LogParams {
            container: Some(descriptor.container_name().to_owned()),
            follow: true,
            since_seconds,
            tail_lines: match since_seconds {
                Some(_) => None,
                None => self.options.tail_lines,
            },
            timestamps: self.options.timestamps,
            ..Default::default()
        }
    }
}

impl LogSink for KubeLogSink {
    async fn connect(
        &self,
        descriptor: &ContainerDescriptor,
        since: Option<SystemTime>,
    ) -> Result<LogStream> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), descriptor.namespace());
        let params = self.log_params(descriptor, since);
        log::debug!(
            "Opening log stream for container `{}` of pod `{}/{}`",
            descriptor.container_name(),
            descriptor.namespace(),
            descriptor.pod_name()
        );

        let reader = pods
            .log_stream(descriptor.pod_name(), &params)
            .await
            .map_err(|err| match err {
                kube::Error::Api(ref resp) if resp.code == 404 => Error::PodNotFound {
                    namespace: descriptor.namespace().to_owned(),
                    pod: descriptor.pod_name().to_owned(),
                },
                source => Error::Connect {
                    namespace: descriptor.namespace().to_owned(),
                    pod: descriptor.pod_name().to_owned(),
                    container: descriptor.container_name().to_owned(),
                    source: Box::new(source),
                },
            })?;

        Ok(Box::pin(reader.lines()))
    }

    async fn forward(&self, line: LogLine) -> Result<()> {
        self.lines.send(line).await.map_err(|_| Error::Closed)
    }
}
