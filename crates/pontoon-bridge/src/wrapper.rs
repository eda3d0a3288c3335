//! Wrapper identity: one canonical script wrapper per neutral promise.
//!
//! Identity is carried structurally by the wrapper's internal slot.
//! There is deliberately no registry map keyed by promise: a side
//! table would grow without bound as promises are created, which is
//! exactly the leak class this layout removes. "Is this already
//! wrapped" is answered by inspecting the value itself.

use crate::engine::Engine;
use crate::value::{JsObject, Value};
use pontoon_loop::NeutralPromise;
use std::sync::Arc;

/// Build the canonical script wrapper for a neutral promise.
///
/// The wrapper is a plain object whose internal slot carries the
/// promise handle and whose `then`/`catch`/`finally` come from the
/// engine's shared method table.
pub fn wrap(engine: &Engine, promise: &Arc<NeutralPromise>) -> Value {
    let obj = JsObject::new();
    obj.set_promise_slot(promise.clone());
    let methods = engine.methods();
    obj.set("then", methods.then.clone());
    obj.set("catch", methods.catch.clone());
    obj.set("finally", methods.finally.clone());
    Value::Object(Arc::new(obj))
}

/// Read the internal slot of a wrapper.
///
/// Returns `None` for any value without the slot — including
/// duck-typed objects that merely expose a `then` method; those take
/// the thenable-assimilation path instead.
pub fn unwrap(value: &Value) -> Option<Arc<NeutralPromise>> {
    value.as_object()?.promise_slot()
}
