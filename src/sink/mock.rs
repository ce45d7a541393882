use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use futures::channel::mpsc;

use crate::container::{ContainerDescriptor, ContainerIdentity};

use super::{Error, LogLine, LogSink, LogStream, Result};

type Feed = mpsc::UnboundedSender<std::io::Result<String>>;

/// In-memory [`LogSink`] whose streams are fed by the test.
#[derive(Default)]
pub(crate) struct MockSink {
    feeds: Mutex<HashMap<ContainerIdentity, Feed>>,
    connects: AtomicUsize,
    since: Mutex<Vec<Option<SystemTime>>>,
    forwards: AtomicUsize,
    refuse: AtomicBool,
    stall_connect: AtomicBool,
    stall_forward: AtomicBool,
    forwarded: Mutex<Option<tokio::sync::mpsc::UnboundedSender<LogLine>>>,
}

impl MockSink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns a sink that reports every forwarded line on the returned receiver.
    pub(crate) fn with_lines() -> (Arc<Self>, tokio::sync::mpsc::UnboundedReceiver<LogLine>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = Self::default();
        *sink.forwarded.lock().unwrap() = Some(tx);
        (Arc::new(sink), rx)
    }

    /// Makes every following `connect` fail.
    pub(crate) fn refuse_connections(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    /// Makes every following `connect` hang forever.
    pub(crate) fn stall_connections(&self) {
        self.stall_connect.store(true, Ordering::SeqCst);
    }

    /// Makes every following `forward` hang forever.
    pub(crate) fn stall_forwarding(&self) {
        self.stall_forward.store(true, Ordering::SeqCst);
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// The `since` argument of every `connect` so far, in order.
    pub(crate) fn connected_since(&self) -> Vec<Option<SystemTime>> {
        self.since.lock().unwrap().clone()
    }

    /// Number of lines handed to `forward`, including stalled ones.
    pub(crate) fn forwards(&self) -> usize {
        self.forwards.load(Ordering::SeqCst)
    }

    /// Pushes a line into the stream of `id`. Returns false if nothing is connected.
    pub(crate) fn push(&self, id: &ContainerIdentity, line: &str) -> bool {
        self.feeds
            .lock()
            .unwrap()
            .get(id)
            .is_some_and(|feed| feed.unbounded_send(Ok(line.to_owned())).is_ok())
    }

    /// Fails the stream of `id`.
    pub(crate) fn fail(&self, id: &ContainerIdentity) -> bool {
        self.feeds.lock().unwrap().get(id).is_some_and(|feed| {
            feed.unbounded_send(Err(std::io::Error::other("connection reset")))
                .is_ok()
        })
    }

    /// Ends the stream of `id`.
    pub(crate) fn close(&self, id: &ContainerIdentity) -> bool {
        self.feeds.lock().unwrap().remove(id).is_some()
    }
}

impl LogSink for MockSink {
    async fn connect(
        &self,
        descriptor: &ContainerDescriptor,
        since: Option<SystemTime>,
    ) -> Result<LogStream> {
        self.since.lock().unwrap().push(since);
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.stall_connect.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::PodNotFound {
                namespace: descriptor.namespace().to_owned(),
                pod: descriptor.pod_name().to_owned(),
            });
        }
        let (tx, rx) = mpsc::unbounded();
        self.feeds
            .lock()
            .unwrap()
            .insert(descriptor.identity().clone(), tx);
        Ok(Box::pin(rx))
    }

    async fn forward(&self, line: LogLine) -> Result<()> {
        self.forwards.fetch_add(1, Ordering::SeqCst);
        if self.stall_forward.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        match self.forwarded.lock().unwrap().as_ref() {
            Some(tx) => tx.send(line).map_err(|_| Error::Closed),
            None => Ok(()),
        }
    }
}
