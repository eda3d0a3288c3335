//! The neutral promise: a monotonic three-state settlement cell.
//!
//! A [`NeutralPromise`] is owned by the host scheduler and referenced
//! (non-owningly, from its point of view) by bridges. Settlement is
//! idempotent: only the first `resolve` or `reject` has effect. Every
//! reaction registered against a promise runs as a microtask on the
//! loop, even when the promise is already settled at registration time;
//! nothing ever runs inline with the caller.

use crate::event_loop::EventLoop;
use crate::value::NeutralValue;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Promise lifecycle state. Transitions are monotonic: once a promise
/// leaves `Pending` it never changes again.
#[derive(Debug, Clone)]
pub enum PromiseState {
    /// Not yet settled.
    Pending,
    /// Settled with a value.
    Fulfilled(NeutralValue),
    /// Settled with a reason.
    Rejected(NeutralValue),
}

impl PromiseState {
    /// Whether the promise has left `Pending`.
    pub fn is_settled(&self) -> bool {
        !matches!(self, PromiseState::Pending)
    }
}

/// A completed settlement, handed to reactions.
#[derive(Debug, Clone)]
pub enum Settlement {
    /// The promise fulfilled with this value.
    Fulfilled(NeutralValue),
    /// The promise rejected with this reason.
    Rejected(NeutralValue),
}

type Reaction = Box<dyn FnOnce(Settlement) + Send>;

/// Host-owned promise handle with monotonic state.
pub struct NeutralPromise {
    scheduler: Arc<EventLoop>,
    state: Mutex<PromiseState>,
    reactions: Mutex<Vec<Reaction>>,
    /// Set once any rejection-capable reaction is registered; used by
    /// the loop's unhandled-rejection reporting.
    handled: AtomicBool,
}

impl std::fmt::Debug for NeutralPromise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &*self.state.lock() {
            PromiseState::Pending => write!(f, "Promise {{ <pending> }}"),
            PromiseState::Fulfilled(v) => write!(f, "Promise {{ <fulfilled>: {v:?} }}"),
            PromiseState::Rejected(r) => write!(f, "Promise {{ <rejected>: {r:?} }}"),
        }
    }
}

impl NeutralPromise {
    pub(crate) fn new(scheduler: Arc<EventLoop>) -> Arc<Self> {
        Arc::new(Self {
            scheduler,
            state: Mutex::new(PromiseState::Pending),
            reactions: Mutex::new(Vec::new()),
            handled: AtomicBool::new(false),
        })
    }

    /// The loop this promise schedules its reactions on.
    pub fn scheduler(&self) -> &Arc<EventLoop> {
        &self.scheduler
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PromiseState {
        self.state.lock().clone()
    }

    /// Whether the promise is still pending.
    pub fn is_pending(&self) -> bool {
        matches!(*self.state.lock(), PromiseState::Pending)
    }

    /// Whether the promise fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        matches!(*self.state.lock(), PromiseState::Fulfilled(_))
    }

    /// Whether the promise rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(*self.state.lock(), PromiseState::Rejected(_))
    }

    /// Whether the promise has settled either way.
    pub fn is_settled(&self) -> bool {
        self.state.lock().is_settled()
    }

    /// The fulfillment value, when fulfilled.
    pub fn value(&self) -> Option<NeutralValue> {
        match &*self.state.lock() {
            PromiseState::Fulfilled(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// The rejection reason, when rejected.
    pub fn reason(&self) -> Option<NeutralValue> {
        match &*self.state.lock() {
            PromiseState::Rejected(r) => Some(r.clone()),
            _ => None,
        }
    }

    /// Fulfill the promise. No-op if already settled.
    pub fn resolve(self: &Arc<Self>, value: NeutralValue) {
        self.settle(Settlement::Fulfilled(value));
    }

    /// Reject the promise. No-op if already settled.
    pub fn reject(self: &Arc<Self>, reason: NeutralValue) {
        let was_pending = self.settle(Settlement::Rejected(reason));
        if was_pending && !self.handled.load(Ordering::Acquire) {
            self.scheduler.track_rejection(self.clone());
        }
    }

    fn settle(self: &Arc<Self>, settlement: Settlement) -> bool {
        let mut state = self.state.lock();
        if state.is_settled() {
            tracing::trace!("ignoring settlement of an already-settled promise");
            return false;
        }
        *state = match &settlement {
            Settlement::Fulfilled(v) => PromiseState::Fulfilled(v.clone()),
            Settlement::Rejected(r) => PromiseState::Rejected(r.clone()),
        };
        drop(state);

        let reactions = std::mem::take(&mut *self.reactions.lock());
        for reaction in reactions {
            let settlement = settlement.clone();
            self.scheduler.enqueue(Box::new(move || reaction(settlement)));
        }
        true
    }

    /// Register a reaction for settlement on either branch.
    ///
    /// Marks the promise as handled for unhandled-rejection purposes:
    /// the caller is taking responsibility for the rejection branch.
    pub fn on_settled<F>(&self, reaction: F)
    where
        F: FnOnce(Settlement) + Send + 'static,
    {
        self.register(Box::new(reaction), true);
    }

    /// Register a reaction for fulfillment only. Rejections are ignored
    /// by this reaction and stay unhandled.
    pub fn on_fulfilled<F>(&self, reaction: F)
    where
        F: FnOnce(NeutralValue) + Send + 'static,
    {
        self.register(
            Box::new(move |settlement| {
                if let Settlement::Fulfilled(value) = settlement {
                    reaction(value);
                }
            }),
            false,
        );
    }

    /// Register a reaction for rejection only.
    pub fn on_rejected<F>(&self, reaction: F)
    where
        F: FnOnce(NeutralValue) + Send + 'static,
    {
        self.register(
            Box::new(move |settlement| {
                if let Settlement::Rejected(reason) = settlement {
                    reaction(reason);
                }
            }),
            true,
        );
    }

    fn register(&self, reaction: Reaction, marks_handled: bool) {
        if marks_handled {
            self.handled.store(true, Ordering::Release);
        }
        let state = self.state.lock();
        match &*state {
            PromiseState::Pending => {
                // Push under the state lock so a concurrent settlement
                // cannot drain the list between the check and the push.
                self.reactions.lock().push(reaction);
                drop(state);
            }
            PromiseState::Fulfilled(v) => {
                let settlement = Settlement::Fulfilled(v.clone());
                drop(state);
                self.scheduler.enqueue(Box::new(move || reaction(settlement)));
            }
            PromiseState::Rejected(r) => {
                let settlement = Settlement::Rejected(r.clone());
                drop(state);
                self.scheduler.enqueue(Box::new(move || reaction(settlement)));
            }
        }
    }

    pub(crate) fn is_handled(&self) -> bool {
        self.handled.load(Ordering::Acquire)
    }

    pub(crate) fn mark_handled(&self) {
        self.handled.store(true, Ordering::Release);
    }
}
