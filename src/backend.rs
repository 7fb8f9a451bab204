//! Periodic task runners for the scheduler and sync ticks.
//!
//! [`ThreadBackend`] runs a task on a dedicated timer thread.
//! [`MainLoopBackend`] runs it from the host's own loop via [`SchedulerBackend::pump`].

use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use thread_priority::ThreadPriority;

use crate::Result;

/// One tick of a periodic task. `Break` ends the task.
pub type TickFn = Arc<dyn Fn() -> ControlFlow<()> + Send + Sync>;

/// Creates a fresh backend for each engine task.
pub type BackendFactory = Arc<dyn Fn() -> Box<dyn SchedulerBackend> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Dedicated timer thread per task.
    #[default]
    Thread,
    /// Host-driven; call `PlaybackEngine::pump` from the host loop.
    MainLoop,
}

impl BackendKind {
    pub fn create(self, high_priority: bool) -> Box<dyn SchedulerBackend> {
        match self {
            BackendKind::Thread => Box::new(ThreadBackend::new().high_priority(high_priority)),
            BackendKind::MainLoop => Box::new(MainLoopBackend::new()),
        }
    }
}

/// Runs one periodic task.
pub trait SchedulerBackend: Send {
    fn name(&self) -> &'static str;

    /// Start calling `tick` every `interval`. No-op if already running.
    fn start(&mut self, task: &str, interval: Duration, tick: TickFn) -> Result<()>;

    /// Stop the task and wait for an in-flight tick to finish.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Run the task if it is due at `now`. Returns whether a tick ran.
    ///
    /// Backends that drive themselves ignore this.
    fn pump(&mut self, _now: Instant) -> bool {
        false
    }
}

struct Worker {
    // Dropping the sender wakes and ends the thread.
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// A task on its own named thread, paced with deadline waits on a stop channel.
#[derive(Default)]
pub struct ThreadBackend {
    worker: Option<Worker>,
    high_priority: bool,
}

impl ThreadBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the timer thread's OS priority when it starts. Best effort.
    pub fn high_priority(mut self, enabled: bool) -> Self {
        self.high_priority = enabled;
        self
    }
}

impl SchedulerBackend for ThreadBackend {
    fn name(&self) -> &'static str {
        "thread"
    }

    fn start(&mut self, task: &str, interval: Duration, tick: TickFn) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        // Reap a worker whose task ended on its own.
        self.stop();

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let high_priority = self.high_priority;
        let handle = thread::Builder::new()
            .name(format!("gridsync-{task}"))
            .spawn(move || {
                if high_priority {
                    let _ = thread_priority::set_current_thread_priority(ThreadPriority::Max);
                }
                let mut deadline = Instant::now();
                loop {
                    if tick().is_break() {
                        break;
                    }
                    deadline += interval;
                    let now = Instant::now();
                    if deadline < now {
                        // Overran; don't burst to catch up.
                        deadline = now;
                    }
                    match stop_rx.recv_deadline(deadline) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        tracing::debug!(task, interval_ms = interval.as_secs_f64() * 1000.0, "timer thread started");
        self.worker = Some(Worker { stop_tx, handle });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(Worker { stop_tx, handle }) = self.worker.take() {
            drop(stop_tx);
            if handle.join().is_err() {
                tracing::warn!("timer thread panicked");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }
}

impl Drop for ThreadBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PumpTask {
    interval: Duration,
    next_due: Option<Instant>,
    tick: TickFn,
}

/// A task driven by the host calling [`SchedulerBackend::pump`].
///
/// The first pump after `start` always ticks; later pumps tick once per
/// elapsed interval at most.
#[derive(Default)]
pub struct MainLoopBackend {
    task: Option<PumpTask>,
}

impl MainLoopBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulerBackend for MainLoopBackend {
    fn name(&self) -> &'static str {
        "main-loop"
    }

    fn start(&mut self, task: &str, interval: Duration, tick: TickFn) -> Result<()> {
        if self.task.is_none() {
            tracing::debug!(task, "main-loop task armed");
            self.task = Some(PumpTask {
                interval,
                next_due: None,
                tick,
            });
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.task = None;
    }

    fn is_running(&self) -> bool {
        self.task.is_some()
    }

    fn pump(&mut self, now: Instant) -> bool {
        let Some(task) = self.task.as_mut() else {
            return false;
        };
        if task.next_due.is_some_and(|due| now < due) {
            return false;
        }
        task.next_due = Some(now + task.interval);
        if (task.tick)().is_break() {
            self.task = None;
        }
        true
    }
}
