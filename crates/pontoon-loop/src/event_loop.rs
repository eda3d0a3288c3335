//! Cooperative single-threaded scheduler: microtasks and timers.
//!
//! This is the minimal host realization of the scheduler interface the
//! bridge consumes: `new_promise`, `queue_microtask`, `set_timeout` /
//! `set_interval` / `clear_*`, plus a run loop for tests and embedders.
//! Microtasks have strict priority over timers; a microtask scheduled
//! from within a microtask runs in the same checkpoint.

use crate::error::{LoopError, LoopResult};
use crate::promise::NeutralPromise;
use crate::value::NeutralValue;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

type Microtask = Box<dyn FnOnce() + Send>;

/// Hook invoked with the reason of a rejected promise that still has no
/// rejection reaction at the end of the checkpoint it rejected in.
/// Shared so reporting can run without holding the hook slot locked; a
/// hook may replace itself from inside its own invocation.
pub type RejectionHook = Arc<dyn Fn(NeutralValue) + Send + Sync>;

enum TimerCallback {
    Once(Box<dyn FnOnce() + Send>),
    Repeating(Arc<dyn Fn() + Send + Sync>),
}

struct TimerEntry {
    id: u64,
    when: Instant,
    interval: Option<Duration>,
    callback: TimerCallback,
    cancelled: Arc<AtomicBool>,
}

/// The event loop. Shared as `Arc<EventLoop>`; all mutation goes
/// through interior mutability, mirroring its single-threaded,
/// cooperative execution model.
pub struct EventLoop {
    microtasks: Mutex<VecDeque<Microtask>>,
    timers: Mutex<Vec<TimerEntry>>,
    /// Cancellation flags of timers currently executing, so a callback
    /// can clear its own interval.
    executing_timers: Mutex<HashMap<u64, Arc<AtomicBool>>>,
    next_timer_id: AtomicU64,
    shut_down: AtomicBool,
    /// Rejected promises awaiting the end-of-checkpoint report. Strong
    /// handles: a script that rejects and immediately discards the
    /// promise must still be reported. The list is drained every
    /// checkpoint, so the handles live at most until the next one.
    pending_rejections: Mutex<Vec<Arc<NeutralPromise>>>,
    rejection_hook: Mutex<Option<RejectionHook>>,
}

impl EventLoop {
    /// Create a new, empty loop.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            microtasks: Mutex::new(VecDeque::new()),
            timers: Mutex::new(Vec::new()),
            executing_timers: Mutex::new(HashMap::new()),
            next_timer_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
            pending_rejections: Mutex::new(Vec::new()),
            rejection_hook: Mutex::new(None),
        })
    }

    /// Create a fresh pending promise owned by this loop.
    pub fn new_promise(self: &Arc<Self>) -> Arc<NeutralPromise> {
        NeutralPromise::new(self.clone())
    }

    /// Create an already-fulfilled promise.
    pub fn fulfilled(self: &Arc<Self>, value: NeutralValue) -> Arc<NeutralPromise> {
        let promise = self.new_promise();
        promise.resolve(value);
        promise
    }

    /// Create an already-rejected promise.
    pub fn rejected(self: &Arc<Self>, reason: NeutralValue) -> Arc<NeutralPromise> {
        let promise = self.new_promise();
        promise.reject(reason);
        promise
    }

    /// Schedule a microtask. FIFO, runs before any timer callback.
    pub fn queue_microtask<F>(&self, f: F) -> LoopResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(LoopError::ShutDown);
        }
        self.enqueue(Box::new(f));
        Ok(())
    }

    /// Internal infallible enqueue used by promise settlement. Work
    /// scheduled after shutdown is dropped.
    pub(crate) fn enqueue(&self, task: Microtask) {
        if self.shut_down.load(Ordering::Acquire) {
            tracing::trace!("dropping microtask scheduled after shutdown");
            return;
        }
        self.microtasks.lock().push_back(task);
    }

    pub(crate) fn track_rejection(&self, promise: Arc<NeutralPromise>) {
        self.pending_rejections.lock().push(promise);
    }

    /// Install the unhandled-rejection hook, replacing any previous one.
    pub fn set_unhandled_rejection_hook(&self, hook: RejectionHook) {
        *self.rejection_hook.lock() = Some(hook);
    }

    /// Schedule a one-shot timer. Returns the timer id.
    pub fn set_timeout<F>(&self, f: F, delay: Duration) -> LoopResult<u64>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_timer(TimerCallback::Once(Box::new(f)), delay, None)
    }

    /// Schedule a repeating timer. Returns the timer id.
    pub fn set_interval<F>(&self, f: F, delay: Duration) -> LoopResult<u64>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.schedule_timer(TimerCallback::Repeating(Arc::new(f)), delay, Some(delay))
    }

    fn schedule_timer(
        &self,
        callback: TimerCallback,
        delay: Duration,
        interval: Option<Duration>,
    ) -> LoopResult<u64> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(LoopError::ShutDown);
        }
        let id = self.next_timer_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(id, ?delay, repeating = interval.is_some(), "scheduling timer");
        self.timers.lock().push(TimerEntry {
            id,
            when: Instant::now() + delay,
            interval,
            callback,
            cancelled: Arc::new(AtomicBool::new(false)),
        });
        Ok(id)
    }

    /// Cancel a one-shot timer. Unknown ids are silently ignored
    /// (browser behavior).
    pub fn clear_timeout(&self, id: u64) {
        self.clear_timer(id);
    }

    /// Cancel a repeating timer. Unknown ids are silently ignored.
    /// Works from inside the timer's own callback.
    pub fn clear_interval(&self, id: u64) {
        self.clear_timer(id);
    }

    fn clear_timer(&self, id: u64) -> bool {
        if let Some(flag) = self.executing_timers.lock().get(&id) {
            flag.store(true, Ordering::SeqCst);
            return true;
        }
        let mut timers = self.timers.lock();
        if let Some(pos) = timers.iter().position(|t| t.id == id) {
            timers.swap_remove(pos);
            tracing::debug!(id, "timer cleared");
            return true;
        }
        false
    }

    /// Drain the microtask queue to empty, then report unhandled
    /// rejections. Microtasks scheduled while draining run in the same
    /// checkpoint.
    pub fn perform_microtask_checkpoint(&self) {
        loop {
            let task = self.microtasks.lock().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
        self.report_unhandled_rejections();
        // Reporting may have scheduled more work (hooks are ordinary
        // host code); make sure the queue is empty when we return.
        if !self.microtasks.lock().is_empty() {
            self.perform_microtask_checkpoint();
        }
    }

    fn report_unhandled_rejections(&self) {
        let pending = std::mem::take(&mut *self.pending_rejections.lock());
        if pending.is_empty() {
            return;
        }
        // Clone the hook out so the slot is unlocked while it runs; a
        // hook is ordinary host code and may install a replacement.
        let hook = self.rejection_hook.lock().clone();
        for promise in pending {
            if promise.is_handled() {
                continue;
            }
            let Some(reason) = promise.reason() else { continue };
            promise.mark_handled();
            match &hook {
                Some(hook) => hook(reason),
                None => tracing::warn!(?reason, "unhandled promise rejection"),
            }
        }
    }

    /// Whether any microtask or live timer is outstanding.
    pub fn has_pending_work(&self) -> bool {
        if !self.microtasks.lock().is_empty() {
            return true;
        }
        self.timers
            .lock()
            .iter()
            .any(|t| !t.cancelled.load(Ordering::SeqCst))
    }

    /// Run until no work remains: alternate microtask checkpoints with
    /// due-timer dispatch, sleeping until the earliest deadline.
    ///
    /// A repeating timer keeps the loop alive until cleared.
    pub fn run(&self) {
        loop {
            self.perform_microtask_checkpoint();
            let Some((id, when)) = self.next_timer() else {
                break;
            };
            let now = Instant::now();
            if when > now {
                std::thread::sleep(when - now);
            }
            self.fire_timer(id);
        }
    }

    fn next_timer(&self) -> Option<(u64, Instant)> {
        self.timers
            .lock()
            .iter()
            .filter(|t| !t.cancelled.load(Ordering::SeqCst))
            .min_by_key(|t| t.when)
            .map(|t| (t.id, t.when))
    }

    fn fire_timer(&self, id: u64) {
        let entry = {
            let mut timers = self.timers.lock();
            let Some(pos) = timers.iter().position(|t| t.id == id) else {
                return;
            };
            timers.swap_remove(pos)
        };
        if entry.cancelled.load(Ordering::SeqCst) {
            return;
        }

        self.executing_timers
            .lock()
            .insert(entry.id, entry.cancelled.clone());

        match entry.callback {
            TimerCallback::Once(f) => f(),
            TimerCallback::Repeating(f) => {
                f();
                if !entry.cancelled.load(Ordering::SeqCst) {
                    let interval = entry.interval.unwrap_or(Duration::ZERO);
                    self.timers.lock().push(TimerEntry {
                        id: entry.id,
                        when: Instant::now() + interval,
                        interval: entry.interval,
                        callback: TimerCallback::Repeating(f),
                        cancelled: entry.cancelled.clone(),
                    });
                }
            }
        }

        self.executing_timers.lock().remove(&entry.id);
    }

    /// Stop accepting work. Queued microtasks and timers are dropped.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        self.microtasks.lock().clear();
        self.timers.lock().clear();
    }
}
