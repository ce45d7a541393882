//! Pod Log Bridge: follows the logs of every running container in a
//! Kubernetes namespace and forwards them as JSON lines.
//!
//! The heart of the crate is the [`reconciler::Reconciler`], which turns pod
//! watch events into a correctly maintained set of per-container log tails
//! kept in a [`registry::ContainerRegistry`].
use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;

use crate::error::LogErrorExt;

pub mod config;
pub mod container;
pub mod error;
pub mod pod;
pub mod reconciler;
pub mod registry;
pub mod sink;
pub mod task;
pub mod watch;

/// Runs the bridge until the pod watch ends or the process is interrupted.
///
/// # Errors
///
/// Possible errors include:
/// - Invalid values in the environment (see [`config::Config::from_env`]).
/// - No usable cluster configuration for the Kubernetes client.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::from_env()?;
    log::debug!("Namespace: {}", config.namespace.as_deref().unwrap_or("<all>"));
    log::debug!("Log options: {:?}", config.log_options());
    log::debug!("Line buffer size: {}", config.line_buffer_size);

    let client = kube::Client::try_default().await?;
    log::debug!("Kubernetes client initialized");

    let (lines_tx, lines_rx) = tokio::sync::mpsc::channel(config.line_buffer_size);
    let writer = tokio::spawn(async move {
        sink::write_lines(lines_rx, tokio::io::stdout())
            .await
            .ok_or_log(log::Level::Error);
    });

    let sink = Arc::new(sink::KubeLogSink::new(
        client.clone(),
        config.log_options(),
        lines_tx,
    ));
    let reconciler = reconciler::Reconciler::new(registry::ContainerRegistry::new(sink));

    let pods: kube::Api<Pod> = match config.namespace.as_deref() {
        Some(namespace) => kube::Api::namespaced(client, namespace),
        None => kube::Api::all(client),
    };
    log::info!("Watching pods");
    tokio::select! {
        _ = watch::watch_pods(pods, &reconciler) => {}
        res = tokio::signal::ctrl_c() => {
            res?;
            log::info!("Interrupted, shutting down");
        }
    }

    let stopped = reconciler.registry().shutdown();
    log::info!("Stopped {} log tails", stopped);
    // The writer finishes once every task has dropped its sender.
    drop(reconciler);
    writer.await?;

    Ok(())
}
