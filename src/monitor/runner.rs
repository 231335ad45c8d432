//! Monitor runner - owns the worker thread and the Stopped/Running switch.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::SharedParameters;
use crate::logging::LogSender;
use crate::monitor::session::{MonitorBackends, MonitorSession};

/// Runs ticks until `stop` is set. The flag is read once per tick, so a
/// stop request takes effect within one tick.
pub fn run_monitor(mut session: MonitorSession, stop: &AtomicBool) {
    session.log("Monitoring started.");
    while !stop.load(Ordering::SeqCst) {
        let pause = session.run_tick();
        thread::sleep(pause);
    }
    session.log("Monitoring stopped.");
}

/// A running monitor thread.
pub struct MonitorHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Spawns a worker thread running `session`.
    pub fn spawn(session: MonitorSession) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("monitor".to_string())
            .spawn(move || run_monitor(session, &flag))
            .map_err(|e| anyhow!("Failed to spawn monitor thread: {}", e))?;

        Ok(Self {
            stop,
            thread: Some(thread),
        })
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Requests a stop and waits for the current tick to finish, so no
    /// injection is in flight once this returns.
    pub fn stop(mut self) {
        self.request_stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

/// Creates fresh platform backends for each run.
pub type BackendFactory = Box<dyn FnMut() -> Result<MonitorBackends>>;

/// Start/stop control used by the hotkeys. At most one worker exists at a
/// time and every start begins with an empty trigger state.
pub struct MonitorController {
    params: SharedParameters,
    log: LogSender,
    make_backends: BackendFactory,
    running: Option<MonitorHandle>,
}

impl MonitorController {
    pub fn new(params: SharedParameters, log: LogSender, make_backends: BackendFactory) -> Self {
        Self {
            params,
            log,
            make_backends,
            running: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        match &self.running {
            Some(handle) if !handle.is_finished() => MonitorState::Running,
            _ => MonitorState::Stopped,
        }
    }

    /// Starts monitoring. Returns `Ok(false)` when already running.
    pub fn start(&mut self) -> Result<bool> {
        if self.state() == MonitorState::Running {
            return Ok(false);
        }
        if let Some(finished) = self.running.take() {
            finished.stop();
        }

        let backends = (self.make_backends)()?;
        let session = MonitorSession::new(self.params.clone(), backends, self.log.clone())?;
        self.running = Some(MonitorHandle::spawn(session)?);
        Ok(true)
    }

    /// Stops monitoring and waits for the worker. Returns `false` when
    /// nothing was running.
    pub fn stop(&mut self) -> bool {
        match self.running.take() {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }
}
