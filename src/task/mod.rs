//! Per-container log tailing tasks.
//!
//! A [`ContainerTask`] follows the log stream of exactly one container and
//! moves through `Pending → Running → Stopped`. It is started by the registry
//! and only ever stopped by firing its [`CancelSignal`] or by its stream
//! coming to an end; a stopped task is never restarted. Dropping a task fires
//! its signal, so a tail never outlives its owner.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::container::{ContainerDescriptor, ContainerIdentity};
use crate::sink::{LogLine, LogSink};

/// One-shot cancellation signal shared between a task and its observers.
///
/// Firing is idempotent: only the first [`CancelSignal::fire`] has an effect.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Returns `true` only for the call that fired it.
    pub fn fire(&self) -> bool {
        let first = !self.fired.swap(true, Ordering::AcqRel);
        self.token.cancel();
        first
    }

    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes once the signal has been fired.
    pub async fn fired(&self) {
        self.token.cancelled().await
    }
}

/// Why a task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation signal fired.
    Cancelled,
    /// The log stream ended, usually because the container exited.
    StreamEnded,
    /// Reading from the log stream failed.
    StreamFailed,
    /// The log stream could not be opened.
    ConnectFailed,
    /// A line could not be handed downstream.
    ForwardFailed,
    /// The task went away without reporting a reason.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Stopped(StopReason),
}

impl TaskState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, TaskState::Stopped(_))
    }
}

/// Wall-clock time of the last sign of life of a log stream.
#[derive(Debug, Default)]
struct LastSeen(AtomicU64);

impl LastSeen {
    fn mark(&self) {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |since_epoch| {
                u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX)
            });
        self.0.store(millis, Ordering::Release);
    }

    fn get(&self) -> Option<SystemTime> {
        match self.0.load(Ordering::Acquire) {
            0 => None,
            millis => Some(UNIX_EPOCH + Duration::from_millis(millis)),
        }
    }
}

/// A running log tail for one container.
///
/// Owned by the registry entry of its identity. Everyone else observes it
/// through a [`TaskHandle`]. Dropping the task cancels it.
#[derive(Debug)]
pub struct ContainerTask {
    descriptor: ContainerDescriptor,
    signal: CancelSignal,
    state: watch::Receiver<TaskState>,
    seen: Arc<LastSeen>,
}

impl ContainerTask {
    /// Spawns the tail loop for `descriptor` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn spawn<S: LogSink>(descriptor: ContainerDescriptor, sink: Arc<S>) -> Self {
        Self::resume(descriptor, sink, None)
    }

    /// Like [`ContainerTask::spawn`], but only asks for lines newer than
    /// `since`, the last activity of a previous tail of the same container.
    pub fn resume<S: LogSink>(
        descriptor: ContainerDescriptor,
        sink: Arc<S>,
        since: Option<SystemTime>,
    ) -> Self {
        let signal = CancelSignal::new();
        let seen = Arc::new(LastSeen::default());
        let (state_tx, state) = watch::channel(TaskState::Pending);
        tokio::spawn(tail(
            descriptor.clone(),
            sink,
            since,
            signal.clone(),
            Arc::clone(&seen),
            state_tx,
        ));

        Self {
            descriptor,
            signal,
            state,
            seen,
        }
    }

    pub fn identity(&self) -> &ContainerIdentity {
        self.descriptor.identity()
    }

    /// When the stream last connected or delivered a line.
    pub fn last_seen(&self) -> Option<SystemTime> {
        self.seen.get()
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.state().is_stopped()
    }

    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            identity: self.identity().clone(),
            signal: self.signal.clone(),
            state: self.state.clone(),
        }
    }

    /// Fires the cancellation signal and gives up ownership of the task.
    ///
    /// The tail loop shuts down on its own afterwards; use the returned handle
    /// to wait for it.
    pub fn cancel(self) -> TaskHandle {
        let handle = self.handle();
        drop(self);
        handle
    }
}

impl Drop for ContainerTask {
    fn drop(&mut self) {
        if self.signal.fire() && !self.is_stopped() {
            log::debug!("{}: cancelled log tail", self.identity());
        }
    }
}

/// Observer of a [`ContainerTask`].
#[derive(Debug, Clone)]
pub struct TaskHandle {
    identity: ContainerIdentity,
    signal: CancelSignal,
    state: watch::Receiver<TaskState>,
}

impl TaskHandle {
    pub fn identity(&self) -> &ContainerIdentity {
        &self.identity
    }

    pub fn signal(&self) -> &CancelSignal {
        &self.signal
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_fired()
    }

    /// Waits until the task has left `Pending`. Returns `true` if it is running.
    pub async fn started(&mut self) -> bool {
        match self.state.wait_for(|state| *state != TaskState::Pending).await {
            Ok(state) => *state == TaskState::Running,
            Err(_) => false,
        }
    }

    /// Waits for the terminal state of the task.
    pub async fn stopped(&mut self) -> StopReason {
        match self.state.wait_for(TaskState::is_stopped).await {
            Ok(state) => match *state {
                TaskState::Stopped(reason) => reason,
                _ => StopReason::Aborted,
            },
            Err(_) => StopReason::Aborted,
        }
    }
}

async fn tail<S: LogSink>(
    descriptor: ContainerDescriptor,
    sink: Arc<S>,
    since: Option<SystemTime>,
    signal: CancelSignal,
    seen: Arc<LastSeen>,
    state: watch::Sender<TaskState>,
) {
    let reason =
        tail_until_stopped(&descriptor, sink.as_ref(), since, &signal, &seen, &state).await;
    log::debug!("{}: log tail stopped: {:?}", descriptor.identity(), reason);
    state.send_replace(TaskState::Stopped(reason));
}

async fn tail_until_stopped<S: LogSink>(
    descriptor: &ContainerDescriptor,
    sink: &S,
    since: Option<SystemTime>,
    signal: &CancelSignal,
    seen: &LastSeen,
    state: &watch::Sender<TaskState>,
) -> StopReason {
    let mut stream = tokio::select! {
        biased;
        _ = signal.fired() => return StopReason::Cancelled,
        conn = sink.connect(descriptor, since) => match conn {
            Ok(stream) => stream,
            Err(err) => {
                log::warn!("{}: {}", descriptor.identity(), err);
                return StopReason::ConnectFailed;
            }
        },
    };
    seen.mark();
    state.send_replace(TaskState::Running);
    log::debug!("{}: tailing logs", descriptor.identity());

    loop {
        let next = tokio::select! {
            biased;
            _ = signal.fired() => return StopReason::Cancelled,
            next = stream.next() => next,
        };
        let message = match next {
            Some(Ok(message)) => {
                seen.mark();
                message
            }
            Some(Err(err)) => {
                log::warn!("{}: failed reading log stream: {}", descriptor.identity(), err);
                return StopReason::StreamFailed;
            }
            None => return StopReason::StreamEnded,
        };

        tokio::select! {
            biased;
            _ = signal.fired() => return StopReason::Cancelled,
            res = sink.forward(LogLine::new(descriptor, message)) => {
                if let Err(err) = res {
                    log::warn!("{}: {}", descriptor.identity(), err);
                    return StopReason::ForwardFailed;
                }
            }
        }
    }
}
