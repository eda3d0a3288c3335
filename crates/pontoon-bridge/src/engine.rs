//! The bridge context.
//!
//! [`Engine`] is the explicit context threaded through every
//! conversion and wrap operation. It owns the loop handle and the
//! shared `then`/`catch`/`finally` method table. Method closures hold
//! the engine weakly: a wrapper object referencing its methods must
//! never keep the whole engine (and through it the loop) alive, and
//! the engine must not participate in reference cycles that would
//! defeat collection of dropped wrappers.

use crate::error::{BridgeError, BridgeResult};
use crate::promise::{self as promise_module, MethodTable};
use crate::timers;
use crate::value::Value;
use indexmap::IndexMap;
use parking_lot::Mutex;
use pontoon_loop::EventLoop;
use std::sync::{Arc, Weak};

pub(crate) struct EngineInner {
    event_loop: Arc<EventLoop>,
    methods: MethodTable,
}

/// Bridge context: loop handle plus the wrapper method table.
///
/// Cheap to clone; clones share the same engine.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine bound to the given loop.
    pub fn new(event_loop: Arc<EventLoop>) -> Self {
        let inner = Arc::new_cyclic(|weak| EngineInner {
            event_loop,
            methods: promise_module::build_method_table(weak.clone()),
        });
        Engine { inner }
    }

    pub(crate) fn from_inner(inner: Arc<EngineInner>) -> Self {
        Engine { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<EngineInner> {
        Arc::downgrade(&self.inner)
    }

    /// The loop this engine schedules on.
    pub fn event_loop(&self) -> &Arc<EventLoop> {
        &self.inner.event_loop
    }

    pub(crate) fn methods(&self) -> &MethodTable {
        &self.inner.methods
    }

    /// Install the global surface (`Promise`, timers, `queueMicrotask`)
    /// into `scope` as a single step.
    ///
    /// The promise module is built completely before anything becomes
    /// visible, so script code can never observe a half-initialized
    /// constructor. Installing twice into the same scope is an error.
    pub fn install(&self, scope: &GlobalScope) -> BridgeResult<()> {
        for name in ["Promise", "setTimeout", "clearTimeout", "setInterval", "clearInterval", "queueMicrotask"] {
            if scope.get(name).is_some() {
                return Err(BridgeError::AlreadyInstalled(name.into()));
            }
        }

        let promise = promise_module::build_constructor(self);
        let mut bindings = timers::bindings(self);
        bindings.push(("Promise", promise));
        for (name, value) in bindings {
            scope.set(name, value);
        }
        Ok(())
    }
}

/// A script global scope: the bag of named bindings the bridge
/// installs into. Real embeddings hand this to the engine; tests read
/// the installed functions back out of it.
pub struct GlobalScope {
    names: Mutex<IndexMap<String, Value>>,
}

impl GlobalScope {
    /// Empty scope.
    pub fn new() -> Self {
        Self {
            names: Mutex::new(IndexMap::new()),
        }
    }

    /// Look up a global binding.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.names.lock().get(name).cloned()
    }

    /// Define or replace a global binding.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.names.lock().insert(name.into(), value);
    }
}

impl Default for GlobalScope {
    fn default() -> Self {
        Self::new()
    }
}
