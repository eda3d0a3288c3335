//! Bidirectional value conversion between script and neutral forms.
//!
//! Host-to-script ([`to_script`]) is structural: sequences become
//! arrays, maps become plain objects, aggregates become error objects,
//! promises unwrap recursively through their state, and external
//! payloads come back out as the exact script value that went in.
//!
//! Script-to-host has two distinct contracts. [`neutral_from_value`]
//! is literal: it never promise-wraps and never performs thenable
//! resolution, which is what rejection reasons and bare combinator
//! elements require. [`promise_from_value`] is the identity-preserving
//! promise path: canonical wrappers contribute their backing promise
//! directly, thenables are assimilated, and everything else becomes a
//! synchronously fulfilled promise.

use crate::engine::Engine;
use crate::value::{JsObject, Value};
use crate::wrapper;
use pontoon_loop::{NeutralPromise, NeutralValue, PromiseState, Settlement};
use std::sync::Arc;

/// Convert a neutral value to its script-visible form.
pub fn to_script(value: &NeutralValue) -> Value {
    match value {
        NeutralValue::Undefined => Value::Undefined,
        NeutralValue::Null => Value::Null,
        NeutralValue::Bool(b) => Value::Bool(*b),
        NeutralValue::Number(n) => Value::Number(*n),
        NeutralValue::String(s) => Value::String(s.clone()),
        NeutralValue::Sequence(items) => Value::array(items.iter().map(to_script).collect()),
        NeutralValue::Map(entries) => {
            let obj = JsObject::new();
            for (key, value) in entries {
                obj.set(key.clone(), to_script(value));
            }
            Value::Object(Arc::new(obj))
        }
        // Handlers must never see a promise-of-a-promise: unwrap
        // through the state. A still-pending promise reads as
        // undefined.
        NeutralValue::Promise(promise) => match promise.state() {
            PromiseState::Pending => Value::Undefined,
            PromiseState::Fulfilled(inner) => to_script(&inner),
            PromiseState::Rejected(reason) => to_script(&reason),
        },
        NeutralValue::Aggregate(err) => {
            let obj = JsObject::new();
            obj.set("name", Value::string("AggregateError"));
            obj.set("message", Value::string(&err.message));
            obj.set("errors", Value::array(err.errors.iter().map(to_script).collect()));
            Value::Object(Arc::new(obj))
        }
        NeutralValue::External(ext) => match ext.downcast_ref::<Value>() {
            Some(script) => script.clone(),
            None => {
                // Payload from some other producer; nothing sensible
                // to surface.
                tracing::debug!("foreign external payload crossed the bridge");
                Value::Undefined
            }
        },
    }
}

/// Literal conversion of a script value to neutral form.
///
/// Primitives map to neutral primitives; objects and functions pass
/// through opaquely so reference identity survives the round trip. No
/// promise wrapping, no thenable resolution — `Promise.reject(p)` must
/// keep `p` itself as the reason.
pub fn neutral_from_value(value: &Value) -> NeutralValue {
    match value {
        Value::Undefined => NeutralValue::Undefined,
        Value::Null => NeutralValue::Null,
        Value::Bool(b) => NeutralValue::Bool(*b),
        Value::Number(n) => NeutralValue::Number(*n),
        Value::String(s) => NeutralValue::String(s.clone()),
        Value::Object(_) => NeutralValue::external(value.clone()),
    }
}

/// The identity-preserving promise path.
///
/// A canonical wrapper yields its backing promise directly — no new
/// promise is ever created for it. Thenables and plain values go
/// through the resolution procedure on a fresh promise.
pub fn promise_from_value(engine: &Engine, value: &Value) -> Arc<NeutralPromise> {
    if let Some(promise) = wrapper::unwrap(value) {
        return promise;
    }
    let promise = engine.event_loop().new_promise();
    resolve_value(engine, &promise, value.clone());
    promise
}

/// The promise resolution procedure, shared by executor `resolve`
/// closures and handler-return adoption.
///
/// Wrappers are adopted by chaining onto their backing promise;
/// thenables are assimilated by calling their `then` from a microtask
/// (a throw there becomes rejection); anything else fulfills with the
/// literal neutral form.
pub fn resolve_value(engine: &Engine, promise: &Arc<NeutralPromise>, value: Value) {
    if let Some(inner) = wrapper::unwrap(&value) {
        if Arc::ptr_eq(&inner, promise) {
            promise.reject(neutral_from_value(&Value::type_error(
                "Promise cannot resolve itself",
            )));
            return;
        }
        let target = promise.clone();
        inner.on_settled(move |settlement| match settlement {
            Settlement::Fulfilled(v) => target.resolve(v),
            Settlement::Rejected(r) => target.reject(r),
        });
        return;
    }

    if let Some(then) = thenable_then(&value) {
        let engine = engine.clone();
        let promise = promise.clone();
        let event_loop = engine.event_loop().clone();
        // Thenable assimilation is itself a job, so a badly-behaved
        // `then` cannot reenter the caller synchronously.
        let scheduled = event_loop.queue_microtask(move || {
            let resolve_fn = {
                let engine = engine.clone();
                let promise = promise.clone();
                Value::function(move |_this, args| {
                    let v = args.first().cloned().unwrap_or(Value::Undefined);
                    resolve_value(&engine, &promise, v);
                    Ok(Value::Undefined)
                })
            };
            let reject_fn = {
                let promise = promise.clone();
                Value::function(move |_this, args| {
                    let r = args.first().cloned().unwrap_or(Value::Undefined);
                    promise.reject(neutral_from_value(&r));
                    Ok(Value::Undefined)
                })
            };
            if let Err(thrown) = then.call(&value, &[resolve_fn, reject_fn]) {
                promise.reject(neutral_from_value(&thrown));
            }
        });
        if scheduled.is_err() {
            tracing::debug!("thenable assimilation dropped: loop is shut down");
        }
        return;
    }

    promise.resolve(neutral_from_value(&value));
}

/// The callable `then` member of a duck-typed thenable, if present.
///
/// Wrapper objects are not reported here; callers check the internal
/// slot first, which is what distinguishes the canonical wrapper from
/// a value that merely looks like a promise.
fn thenable_then(value: &Value) -> Option<Value> {
    let then = value.get("then")?;
    then.is_callable().then_some(then)
}
