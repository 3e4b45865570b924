//! Periodic and on-demand organize runs with a single-flight guarantee.
//!
//! One tokio task owns the timer and is the only place a run is started from.
//! While a run is in flight the task is busy awaiting it, so a second run
//! cannot begin; triggers that pile up meanwhile are discarded afterwards.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::organizer::{Organizer, RunResult};

/// Something that performs one organize pass. Blocking.
pub trait RunExecutor: Send + Sync + 'static {
    fn run(&self, folder_override: Option<&Path>) -> RunResult;
}

impl RunExecutor for Organizer {
    fn run(&self, folder_override: Option<&Path>) -> RunResult {
        Organizer::run(self, folder_override)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SchedulerState {
    Idle,
    #[serde(rename_all = "camelCase")]
    Waiting { next_fire: DateTime<Local> },
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Handed to the worker; runs unless a run starts first
    Accepted,
    AlreadyRunning,
    Stopped,
}

enum Command {
    Trigger(Option<PathBuf>),
    SetInterval(Duration),
    Shutdown,
}

pub struct Scheduler {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SchedulerState>,
    interval: Mutex<Duration>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    /// Spawns the worker on the current tokio runtime. Every finished run is
    /// delivered on the returned receiver.
    pub fn start(
        executor: Arc<dyn RunExecutor>,
        interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<RunResult>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();

        let worker = Worker {
            executor,
            interval,
            commands: command_rx,
            state: state_tx,
            completed: completed_tx,
        };
        let handle = tokio::spawn(worker.run());
        log::info!("Scheduler started (interval {}s)", interval.as_secs());

        let scheduler = Self {
            commands: command_tx,
            state: state_rx,
            interval: Mutex::new(interval),
            worker: Mutex::new(Some(handle)),
        };
        (scheduler, completed_rx)
    }

    pub fn state(&self) -> SchedulerState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    /// Run now instead of waiting for the timer. No-op while a run is active.
    pub fn trigger(&self, folder_override: Option<PathBuf>) -> TriggerOutcome {
        if *self.state.borrow() == SchedulerState::Running {
            log::info!("Manual organize ignored: a run is already in progress");
            return TriggerOutcome::AlreadyRunning;
        }
        match self.commands.send(Command::Trigger(folder_override)) {
            Ok(()) => TriggerOutcome::Accepted,
            Err(_) => TriggerOutcome::Stopped,
        }
    }

    pub fn interval(&self) -> Duration {
        *self.interval.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Re-arms the pending timer, or applies to the next wait if a run is
    /// active. Returns false when `interval` is already in effect.
    pub fn set_interval(&self, interval: Duration) -> bool {
        let mut current = self.interval.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == interval {
            return false;
        }
        *current = interval;
        self.commands.send(Command::SetInterval(interval)).is_ok()
    }

    /// Stops arming new runs and waits for an in-flight run to finish.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                log::error!("Scheduler worker ended abnormally: {}", e);
            }
        }
    }
}

enum Wake {
    Timer,
    Command(Option<Command>),
}

struct Worker {
    executor: Arc<dyn RunExecutor>,
    interval: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<SchedulerState>,
    completed: mpsc::UnboundedSender<RunResult>,
}

impl Worker {
    async fn run(mut self) {
        'arm: loop {
            let deadline = Instant::now() + self.interval;
            let next_fire = chrono::Duration::from_std(self.interval)
                .ok()
                .and_then(|d| Local::now().checked_add_signed(d))
                .unwrap_or_else(Local::now);
            self.state.send_replace(SchedulerState::Waiting { next_fire });

            let wake = tokio::select! {
                _ = sleep_until(deadline) => Wake::Timer,
                command = self.commands.recv() => Wake::Command(command),
            };
            let folder_override = match wake {
                Wake::Timer => None,
                Wake::Command(Some(Command::Trigger(folder))) => folder,
                Wake::Command(Some(Command::SetInterval(interval))) => {
                    log::info!("Scheduler re-armed (interval {}s)", interval.as_secs());
                    self.interval = interval;
                    continue 'arm;
                }
                Wake::Command(Some(Command::Shutdown)) | Wake::Command(None) => break 'arm,
            };

            self.state.send_replace(SchedulerState::Running);
            if let Some(result) = self.execute(folder_override).await {
                // nobody listening is fine
                let _ = self.completed.send(result);
            }
            if !self.drain_pending() {
                break 'arm;
            }
        }
        self.state.send_replace(SchedulerState::Idle);
        log::info!("Scheduler stopped");
    }

    async fn execute(&self, folder_override: Option<PathBuf>) -> Option<RunResult> {
        let executor = self.executor.clone();
        let joined =
            tokio::task::spawn_blocking(move || executor.run(folder_override.as_deref())).await;
        match joined {
            Ok(result) => Some(result),
            Err(e) => {
                log::error!("Organize run aborted: {}", e);
                None
            }
        }
    }

    /// Handles commands that arrived during a run. Returns false on shutdown.
    fn drain_pending(&mut self) -> bool {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Trigger(_) => {
                    log::info!("Manual organize ignored: it arrived while a run was in progress")
                }
                Command::SetInterval(interval) => self.interval = interval,
                Command::Shutdown => return false,
            }
        }
        true
    }
}
