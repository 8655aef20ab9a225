//! Generic repeating background jobs
//!
//! A [`Job`] runs a [`LoopJob`] payload on its own dedicated thread at a
//! fixed (live-adjustable) interval until cancelled. The telemetry poll
//! loop, every overlay render timer and every auxiliary data collector are
//! instances of this one primitive.
//!
//! Guarantees:
//! - iterations of one job never overlap (single worker thread),
//! - `before_run`/`after_cancel` run exactly once at the state boundaries,
//! - a panicking iteration is logged and the loop continues,
//! - after `cancel_join` returns no hook of that job runs again.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Payload of a repeating job
pub trait LoopJob: Send + 'static {
    /// Invoked once on the worker thread before the first iteration
    fn before_run(&mut self) {}

    /// One iteration of work. Panics are caught at the job boundary.
    fn tick(&mut self);

    /// Invoked once on the worker thread after the loop has exited
    fn after_cancel(&mut self) {}
}

/// Plain closures can serve as hook-less payloads
impl<F: FnMut() + Send + 'static> LoopJob for F {
    fn tick(&mut self) {
        self()
    }
}

const STATE_CREATED: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// How long `cancel_join` waits before abandoning a stuck worker
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

struct CancelSignal {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl CancelSignal {
    fn new() -> Self {
        Self {
            cancelled: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    fn cancel(&self) {
        let mut cancelled = self.cancelled.lock().expect("cancel signal poisoned");
        *cancelled = true;
        self.condvar.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock().expect("cancel signal poisoned")
    }

    /// Sleep up to `timeout` or until cancelled; returns the cancel state
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.cancelled.lock().expect("cancel signal poisoned");
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .condvar
                .wait_timeout(cancelled, deadline - now)
                .expect("cancel signal poisoned");
            cancelled = guard;
        }
        *cancelled
    }
}

/// Handle to one repeating background job
pub struct Job {
    name: String,
    interval_ms: Arc<AtomicU64>,
    signal: Arc<CancelSignal>,
    state: Arc<AtomicU8>,
    payload: Mutex<Option<Box<dyn LoopJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    worker_id: Arc<Mutex<Option<ThreadId>>>,
}

impl Job {
    pub fn new(name: impl Into<String>, interval: Duration, payload: impl LoopJob) -> Self {
        Self {
            name: name.into(),
            interval_ms: Arc::new(AtomicU64::new(interval.as_millis() as u64)),
            signal: Arc::new(CancelSignal::new()),
            state: Arc::new(AtomicU8::new(STATE_CREATED)),
            payload: Mutex::new(Some(Box::new(payload))),
            worker: Mutex::new(None),
            worker_id: Arc::new(Mutex::new(None)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Move Created -> Running and spawn the worker thread.
    ///
    /// A second call is a no-op with a warning; a job instance runs at
    /// most once.
    pub fn run(&self) {
        if self
            .state
            .compare_exchange(
                STATE_CREATED,
                STATE_RUNNING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            warn!(job = %self.name, "run() called on a job that already ran");
            return;
        }

        let mut payload = self
            .payload
            .lock()
            .expect("job payload lock poisoned")
            .take()
            .expect("job payload taken before run");

        let name = self.name.clone();
        let interval_ms = Arc::clone(&self.interval_ms);
        let signal = Arc::clone(&self.signal);
        let state = Arc::clone(&self.state);
        let worker_id = Arc::clone(&self.worker_id);

        let handle = thread::Builder::new()
            .name(format!("job-{name}"))
            .spawn(move || {
                *worker_id.lock().expect("worker id lock poisoned") =
                    Some(thread::current().id());

                payload.before_run();

                while !signal.is_cancelled() {
                    let started = Instant::now();

                    if catch_unwind(AssertUnwindSafe(|| payload.tick())).is_err() {
                        error!(job = %name, "job iteration panicked, loop continues");
                    }

                    // Interval is re-read every iteration so rate changes
                    // apply live; the sleep wakes early on cancel.
                    let interval = Duration::from_millis(interval_ms.load(Ordering::Relaxed));
                    let remaining = interval.saturating_sub(started.elapsed());
                    if !remaining.is_zero() && signal.wait(remaining) {
                        break;
                    }
                }

                payload.after_cancel();
                state.store(STATE_STOPPED, Ordering::Release);
                debug!(job = %name, "job stopped");
            })
            .expect("failed to spawn job thread");

        *self.worker.lock().expect("job worker lock poisoned") = Some(handle);
    }

    /// Request the loop to stop; returns immediately. Safe to call from
    /// within the job's own `tick`.
    pub fn cancel(&self) {
        self.signal.cancel();
    }

    /// Request stop and wait for the worker to exit.
    ///
    /// Bounded: after [`JOIN_TIMEOUT`] the worker is abandoned with an
    /// error log. Called from the job's own thread this degrades to
    /// [`cancel`](Self::cancel) instead of deadlocking.
    pub fn cancel_join(&self) {
        self.signal.cancel();

        let is_self = *self.worker_id.lock().expect("worker id lock poisoned")
            == Some(thread::current().id());
        if is_self {
            warn!(job = %self.name, "cancel_join from the job's own thread, not joining");
            return;
        }

        let handle = self.worker.lock().expect("job worker lock poisoned").take();
        let Some(handle) = handle else {
            return;
        };

        let deadline = Instant::now() + JOIN_TIMEOUT;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                error!(job = %self.name, "job did not stop within {JOIN_TIMEOUT:?}, abandoning");
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }

        if handle.join().is_err() {
            // tick panics are caught in the loop; this covers hook panics
            error!(job = %self.name, "job worker terminated by panic");
        }
        self.state.store(STATE_STOPPED, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == STATE_RUNNING && !self.signal.is_cancelled()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    /// Change the pacing interval; takes effect on the next iteration
    pub fn set_interval(&self, interval: Duration) {
        self.interval_ms
            .store(interval.as_millis() as u64, Ordering::Relaxed);
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.signal.cancel();
    }
}
