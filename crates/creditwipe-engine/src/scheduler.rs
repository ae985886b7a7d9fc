//! Coalescing background lanes.
//!
//! Each lane owns one worker thread and a single-slot mailbox. A trigger that
//! finds the slot full is dropped: the pending run will already read the
//! newest inputs, so a burst of triggers while a job runs yields exactly one
//! follow-up run. Runs of the same lane never overlap; synchronous runs take
//! the same gate as the worker.

use creditwipe_core::Result;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace};

/// Work executed by a lane. It reads its inputs when it starts.
pub type Job = Arc<dyn Fn() + Send + Sync>;

struct LaneState {
    name: &'static str,
    gate: Mutex<()>,
    runs: AtomicUsize,
    coalesced: AtomicUsize,
}

impl LaneState {
    fn run(&self, job: &Job) {
        let _gate = self.gate.lock();
        trace!(lane = self.name, "lane job started");
        job();
        self.runs.fetch_add(1, Ordering::Relaxed);
    }
}

/// Cloneable handle that schedules a lane's job.
#[derive(Clone)]
pub struct Trigger {
    tx: Sender<()>,
    state: Arc<LaneState>,
}

impl Trigger {
    /// Request a run. Returns false if a run was already pending (or the lane
    /// has shut down).
    pub fn trigger(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                self.state.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!(lane = self.state.name, "trigger coalesced");
                false
            }
            Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// A single-worker, single-slot job lane.
pub struct Lane {
    trigger: Option<Trigger>,
    job: Job,
    state: Arc<LaneState>,
    worker: Option<JoinHandle<()>>,
}

impl Lane {
    /// Spawn the lane's worker thread.
    pub fn spawn(name: &'static str, job: Job) -> Result<Self> {
        let (tx, rx): (Sender<()>, Receiver<()>) = bounded(1);
        let state = Arc::new(LaneState {
            name,
            gate: Mutex::new(()),
            runs: AtomicUsize::new(0),
            coalesced: AtomicUsize::new(0),
        });

        let worker = {
            let state = Arc::clone(&state);
            let job = Arc::clone(&job);
            thread::Builder::new()
                .name(format!("creditwipe-{name}"))
                .spawn(move || {
                    for () in rx.iter() {
                        state.run(&job);
                    }
                    debug!(lane = state.name, "lane stopped");
                })?
        };

        Ok(Self {
            trigger: Some(Trigger {
                tx,
                state: Arc::clone(&state),
            }),
            job,
            state,
            worker: Some(worker),
        })
    }

    /// Request a background run. See [`Trigger::trigger`].
    pub fn trigger(&self) -> bool {
        self.trigger.as_ref().map_or(false, Trigger::trigger)
    }

    /// A handle other jobs can use to schedule this lane.
    pub fn handle(&self) -> Option<Trigger> {
        self.trigger.clone()
    }

    /// Run the job on the calling thread, waiting for any in-flight run.
    pub fn run_now(&self) {
        self.state.run(&self.job);
    }

    /// Run `f` while holding the lane's gate.
    pub fn exclusive<R>(&self, f: impl FnOnce() -> R) -> R {
        let _gate = self.state.gate.lock();
        let out = f();
        self.state.runs.fetch_add(1, Ordering::Relaxed);
        out
    }

    /// Completed job runs, background and synchronous.
    pub fn runs(&self) -> usize {
        self.state.runs.load(Ordering::Relaxed)
    }

    /// Triggers dropped because a run was already pending.
    pub fn coalesced(&self) -> usize {
        self.state.coalesced.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &'static str {
        self.state.name
    }

    /// Close the mailbox and wait for the worker. A pending run still
    /// executes first. The job is released afterwards, so [`Lane::run_now`]
    /// does nothing on a stopped lane.
    ///
    /// Outstanding [`Trigger`] handles keep the mailbox open, so callers must
    /// drop them before shutting the lane down.
    pub fn shutdown(&mut self) {
        drop(self.trigger.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!(lane = self.state.name, "lane worker panicked");
            }
            self.job = Arc::new(|| {});
        }
    }
}

impl Drop for Lane {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The mask-update lane chained into the display-apply lane.
///
/// Completion of a mask run, successful or not, triggers the display lane.
pub struct Scheduler {
    // Field order matters: the mask lane holds a display trigger and must be
    // torn down first.
    mask: Lane,
    display: Lane,
}

impl Scheduler {
    pub fn new(mask_job: Job, display_job: Job) -> Result<Self> {
        let display = Lane::spawn("display", display_job)?;
        let chained: Job = match display.handle() {
            Some(next) => Arc::new(move || {
                mask_job();
                next.trigger();
            }),
            None => mask_job,
        };
        let mask = Lane::spawn("mask", chained)?;
        Ok(Self { mask, display })
    }

    pub fn trigger_mask(&self) -> bool {
        self.mask.trigger()
    }

    pub fn trigger_display(&self) -> bool {
        self.display.trigger()
    }

    pub fn mask_lane(&self) -> &Lane {
        &self.mask
    }

    pub fn display_lane(&self) -> &Lane {
        &self.display
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.mask.shutdown();
        self.display.shutdown();
    }
}
