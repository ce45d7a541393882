//! Feeds pod watch events into a [`Reconciler`].
use std::collections::HashSet;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Api;
use kube::runtime::{WatchStreamExt, watcher};

use crate::error::LogErrorExt;
use crate::pod::PodEvent;
use crate::reconciler::Reconciler;
use crate::sink::LogSink;

/// Translates raw watcher events into [`PodEvent`]s.
///
/// Pods deleted while the watch was disconnected never produce a delete
/// event; after every re-list the pods that are still tracked but were not
/// listed again are reported as deleted.
#[derive(Debug, Default)]
pub struct Relist {
    listed: Option<HashSet<String>>,
}

impl Relist {
    /// Translates `event`. `tracked` returns the UIDs of all pods that
    /// currently have tracked containers and is only called when a re-list
    /// completes.
    pub fn translate(
        &mut self,
        event: watcher::Event<Pod>,
        tracked: impl FnOnce() -> HashSet<String>,
    ) -> Vec<PodEvent> {
        match event {
            watcher::Event::Apply(pod) => vec![PodEvent::Applied(pod)],
            watcher::Event::Delete(pod) => vec![PodEvent::Deleted(pod)],
            watcher::Event::Init => {
                log::debug!("Pod re-list started");
                self.listed = Some(HashSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(pod) => {
                let uid = pod.metadata.uid.as_ref();
                if let (Some(listed), Some(uid)) = (self.listed.as_mut(), uid) {
                    listed.insert(uid.clone());
                }
                vec![PodEvent::Applied(pod)]
            }
            watcher::Event::InitDone => {
                let Some(listed) = self.listed.take() else {
                    return Vec::new();
                };
                let gone: Vec<PodEvent> = tracked()
                    .into_iter()
                    .filter(|uid| !listed.contains(uid))
                    .map(|uid| {
                        log::debug!("Pod `{}` vanished while the watch was down", uid);
                        PodEvent::Deleted(deleted_pod(uid))
                    })
                    .collect();
                log::debug!(
                    "Pod re-list done: {} pods listed, {} gone",
                    listed.len(),
                    gone.len()
                );
                gone
            }
        }
    }
}

fn deleted_pod(uid: String) -> Pod {
    Pod {
        metadata: ObjectMeta {
            uid: Some(uid),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Watches the pods of `api` and reconciles every event, one at a time.
///
/// Watch errors are reported to the reconciler as closed events and the
/// watch is retried with backoff. Returns only if the watch stream ends.
pub async fn watch_pods<S: LogSink>(api: Api<Pod>, reconciler: &Reconciler<S>) {
    let mut relist = Relist::default();
    let mut events = std::pin::pin!(watcher(api, watcher::Config::default()).default_backoff());

    while let Some(event) = events.next().await {
        let pod_events = match event {
            Ok(event) => relist.translate(event, || reconciler.registry().pod_uids()),
            Err(err) => vec![PodEvent::Closed(Some(err.to_string()))],
        };
        for pod_event in pod_events {
            if let Some(outcome) = reconciler.handle(pod_event).ok_or_log(log::Level::Warn) {
                log::trace!("{:?}", outcome);
            }
        }
    }
    log::warn!("Pod watch stream ended");
}
