//! Polling loop around the clear state machine
//!
//! [`ClearWatcher`] is the tick boundary: it absorbs detector errors so a
//! bad frame never leaves the machine half-updated, and it pauses for a few
//! ticks after each transition so the same screen is not counted twice.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::events::{ClearEvent, ClearSink};
use super::machine::{ClearStateMachine, StepOutcome};
use super::state::ClearState;
use crate::vision::{BitmapView, CaptureSource};
use crate::{Error, Result};

/// Ticks skipped after a transition by default
pub const DEFAULT_COOLDOWN_TICKS: u32 = 2;

/// How often an unavailable capture source is re-checked
const SOURCE_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// What happened on one tick
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// Skipped because a transition happened recently
    CoolingDown,
    /// Evaluated; nothing fired
    Idle,
    /// A rule fired
    Fired(ClearEvent),
    /// Evaluation failed; treated as no transition
    Failed(String),
}

/// Drives a [`ClearStateMachine`] one frame at a time
#[derive(Debug)]
pub struct ClearWatcher {
    machine: ClearStateMachine,
    cooldown_ticks: u32,
    cooldown_remaining: u32,
}

impl ClearWatcher {
    /// Wrap a machine with the default cooldown
    pub fn new(machine: ClearStateMachine) -> Self {
        Self {
            machine,
            cooldown_ticks: DEFAULT_COOLDOWN_TICKS,
            cooldown_remaining: 0,
        }
    }

    /// Set how many ticks to skip after a transition
    pub fn with_cooldown(mut self, ticks: u32) -> Self {
        self.cooldown_ticks = ticks;
        self
    }

    /// Current state of the machine
    pub fn state(&self) -> ClearState {
        self.machine.state()
    }

    /// Get the wrapped machine
    pub fn machine(&self) -> &ClearStateMachine {
        &self.machine
    }

    /// Process one frame
    pub fn tick(&mut self, view: &BitmapView, sink: &mut dyn ClearSink) -> TickOutcome {
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            return TickOutcome::CoolingDown;
        }

        match self.machine.step(view, sink) {
            Ok(StepOutcome::Transitioned(event)) => {
                self.cooldown_remaining = self.cooldown_ticks;
                TickOutcome::Fired(event)
            }
            Ok(StepOutcome::NoTransition) => TickOutcome::Idle,
            Err(e) => {
                log::warn!("Detection failed in state {}: {}", self.machine.state(), e);
                sink.push_log(&format!("Detection error: {}", e));
                TickOutcome::Failed(e.to_string())
            }
        }
    }

    /// Back to waiting with no cooldown or history
    pub fn reset(&mut self) {
        self.cooldown_remaining = 0;
        self.machine.reset();
    }

    /// Run the polling loop on a background thread.
    ///
    /// Frames are pulled from `source` every `interval`. The sink is shared
    /// with the caller and locked for the duration of each tick.
    pub fn spawn<C, S>(
        self,
        source: C,
        sink: Arc<Mutex<S>>,
        interval: Duration,
    ) -> Result<WatcherHandle<S>>
    where
        C: CaptureSource + 'static,
        S: ClearSink + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(Mutex::new(self.state()));

        let worker = {
            let running = running.clone();
            let state = state.clone();
            let sink = sink.clone();
            thread::Builder::new()
                .name("clear-watcher".to_string())
                .spawn(move || run_watch_loop(self, source, sink, state, running, interval))?
        };

        log::info!("Clear watcher started ({} ms interval)", interval.as_millis());
        Ok(WatcherHandle {
            running,
            state,
            sink,
            worker: Some(worker),
        })
    }
}

/// Handle to a watcher running on a background thread
pub struct WatcherHandle<S> {
    running: Arc<AtomicBool>,
    state: Arc<Mutex<ClearState>>,
    sink: Arc<Mutex<S>>,
    worker: Option<JoinHandle<()>>,
}

impl<S> WatcherHandle<S> {
    /// Whether the loop is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// State after the most recent tick
    pub fn state(&self) -> ClearState {
        *self.state.lock()
    }

    /// The shared sink
    pub fn sink(&self) -> &Arc<Mutex<S>> {
        &self.sink
    }

    /// Stop the loop and wait for the thread to exit
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
            log::info!("Clear watcher stopped");
        }
    }

    /// Wait for the loop to end on its own, e.g. when a replay runs out
    pub fn join(mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl<S> Drop for WatcherHandle<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_watch_loop<C, S>(
    mut watcher: ClearWatcher,
    mut source: C,
    sink: Arc<Mutex<S>>,
    state: Arc<Mutex<ClearState>>,
    running: Arc<AtomicBool>,
    interval: Duration,
) where
    C: CaptureSource,
    S: ClearSink,
{
    let mut frame_count: u64 = 0;

    while running.load(Ordering::SeqCst) {
        let frame_start = Instant::now();

        if !source.is_available() {
            log::debug!("Waiting for capture source");
            thread::sleep(SOURCE_RETRY_INTERVAL.min(interval));
            continue;
        }

        match source.capture() {
            Ok(view) => {
                frame_count += 1;
                let outcome = watcher.tick(&view, &mut *sink.lock());
                if let TickOutcome::Fired(event) = outcome {
                    log::info!("Rule '{}' fired on frame {}", event.label, frame_count);
                }
                *state.lock() = watcher.state();
            }
            Err(Error::SourceExhausted) => {
                log::info!("Capture source exhausted after {} frames", frame_count);
                break;
            }
            Err(e) => {
                log::warn!("Capture failed: {}", e);
            }
        }

        let elapsed = frame_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }

    running.store(false, Ordering::SeqCst);
}
