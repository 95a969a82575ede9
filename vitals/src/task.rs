//! The periodic task primitive: "run X every T, cancellable promptly".
//!
//! Uses a `Condvar::wait_timeout` rather than an unconditional sleep, so
//! `stop` wakes the task immediately instead of waiting out the full
//! period.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::error;

struct Shared {
    stop_requested: AtomicBool,
    wake: Mutex<()>,
    condvar: Condvar,
}

/// A handle to a running periodic task.
///
/// Dropping the handle without calling [`PeriodicTask::stop`] leaves the
/// task running in the background. Callers that need to bound the task's
/// lifetime must call `stop` explicitly.
pub struct PeriodicTask {
    name: String,
    shared: Arc<Shared>,
    join: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawns `body` to run every `period`, on its own OS thread.
    ///
    /// The first iteration runs only after the first `period` elapses (or
    /// immediately if `stop` is called before then, in which case the
    /// pending iteration is skipped).
    pub fn spawn<F>(name: impl Into<String>, period: Duration, mut body: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let shared = Arc::new(Shared {
            stop_requested: AtomicBool::new(false),
            wake: Mutex::new(()),
            condvar: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        let thread_name = name.clone();
        let join = thread::Builder::new()
            .name(format!("periodic-task-{thread_name}"))
            .spawn(move || {
                run_loop(&thread_shared, period, &thread_name, &mut body);
            })
            .expect("failed to spawn periodic task thread");

        Self { name, shared, join: Some(join) }
    }

    /// The task's name, as given to [`PeriodicTask::spawn`].
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests termination, wakes the sleeping task immediately, and joins
    /// it. Returns only after the current iteration (if any) completes.
    ///
    /// Idempotent: calling `stop` more than once is safe and simply joins
    /// again (a no-op on an already-joined handle).
    pub fn stop(mut self) -> thread::Result<()> {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        // Hold the wake mutex only long enough to notify; the worker
        // doesn't need us to hold it across the notification.
        drop(self.shared.wake.lock().expect("wake mutex poisoned"));
        self.shared.condvar.notify_all();

        match self.join.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

fn run_loop(shared: &Shared, period: Duration, name: &str, body: &mut dyn FnMut()) {
    loop {
        let mut guard = shared.wake.lock().expect("wake mutex poisoned");
        let (guard_after, timeout_result) =
            shared.condvar.wait_timeout(guard, period).expect("wake mutex poisoned");
        guard = guard_after;
        drop(guard);

        if shared.stop_requested.load(Ordering::SeqCst) {
            return;
        }

        // A spurious wake before the deadline without a stop request simply
        // means we go back to sleeping for the remainder of the period; in
        // practice this only matters on the rare spurious-wakeup path,
        // since `notify_all` is only ever paired with a stop request.
        if !timeout_result.timed_out() {
            continue;
        }

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| body())) {
            error!(task = name, panic = %panic_message(&panic), "periodic task body panicked");
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_owned()
    }
}
