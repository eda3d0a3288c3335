//! The script-visible Promise surface: constructor, statics, and the
//! `then`/`catch`/`finally` instance methods.
//!
//! The method table is built once per engine and shared by every
//! wrapper; each method reads its receiver's internal slot, so calling
//! one on a value that is not a wrapper raises a TypeError rather than
//! silently doing nothing. The constructor object is assembled
//! completely before installation.

use crate::combinators;
use crate::convert::{neutral_from_value, promise_from_value, resolve_value, to_script};
use crate::engine::{Engine, EngineInner};
use crate::value::{JsObject, Value};
use crate::wrapper::{unwrap, wrap};
use pontoon_loop::{NeutralPromise, Settlement};
use std::sync::{Arc, Weak};

/// Shared `then`/`catch`/`finally` function objects.
pub(crate) struct MethodTable {
    pub(crate) then: Value,
    pub(crate) catch: Value,
    pub(crate) finally: Value,
}

pub(crate) fn build_method_table(engine: Weak<EngineInner>) -> MethodTable {
    let then = {
        let engine = engine.clone();
        Value::function(move |this, args| {
            let engine = upgrade(&engine)?;
            let receiver = receiver(this, "then")?;
            Ok(do_then(
                &engine,
                &receiver,
                handler_or_none(args.first()),
                handler_or_none(args.get(1)),
            ))
        })
    };

    let catch = {
        let engine = engine.clone();
        Value::function(move |this, args| {
            let engine = upgrade(&engine)?;
            let receiver = receiver(this, "catch")?;
            Ok(do_then(&engine, &receiver, None, handler_or_none(args.first())))
        })
    };

    let finally = {
        let engine = engine.clone();
        Value::function(move |this, args| {
            let engine = upgrade(&engine)?;
            let receiver = receiver(this, "finally")?;
            Ok(do_finally(&engine, &receiver, handler_or_none(args.first())))
        })
    };

    MethodTable { then, catch, finally }
}

/// Build the `Promise` global: a callable constructor object carrying
/// the static methods.
pub(crate) fn build_constructor(engine: &Engine) -> Value {
    let ctor = {
        let engine = engine.downgrade();
        JsObject::function(Arc::new(move |_this: &Value, args: &[Value]| {
            construct(&upgrade(&engine)?, args)
        }))
    };

    let statics: [(&str, fn(&Engine, &[Value]) -> Result<Value, Value>); 6] = [
        ("resolve", static_resolve),
        ("reject", static_reject),
        ("all", combinators::all),
        ("race", combinators::race),
        ("allSettled", combinators::all_settled),
        ("any", combinators::any),
    ];

    for (name, imp) in statics {
        let engine = engine.downgrade();
        ctor.set(
            name,
            Value::function(move |_this, args| imp(&upgrade(&engine)?, args)),
        );
    }

    Value::Object(Arc::new(ctor))
}

/// `new Promise(executor)`.
///
/// The executor is validated before any promise is allocated, so a bad
/// argument never leaks a half-built promise into the scheduler.
fn construct(engine: &Engine, args: &[Value]) -> Result<Value, Value> {
    let executor = args
        .first()
        .filter(|v| v.is_callable())
        .cloned()
        .ok_or_else(|| Value::type_error("Promise executor must be a function"))?;

    let promise = engine.event_loop().new_promise();

    let resolve_fn = {
        let engine = engine.clone();
        let promise = promise.clone();
        Value::function(move |_this, args| {
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            resolve_value(&engine, &promise, value);
            Ok(Value::Undefined)
        })
    };
    let reject_fn = {
        let promise = promise.clone();
        Value::function(move |_this, args| {
            let reason = args.first().cloned().unwrap_or(Value::Undefined);
            promise.reject(neutral_from_value(&reason));
            Ok(Value::Undefined)
        })
    };

    if let Err(thrown) = executor.call(&Value::Undefined, &[resolve_fn, reject_fn]) {
        promise.reject(neutral_from_value(&thrown));
    }

    Ok(wrap(engine, &promise))
}

/// `Promise.resolve(v)`: a canonical wrapper comes back unchanged —
/// the very same object — otherwise the value takes the
/// identity-preserving promise path and gets wrapped.
fn static_resolve(engine: &Engine, args: &[Value]) -> Result<Value, Value> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    if unwrap(&value).is_some() {
        return Ok(value);
    }
    Ok(wrap(engine, &promise_from_value(engine, &value)))
}

/// `Promise.reject(v)`: the reason is the literal argument. No
/// thenable resolution happens here — rejecting with a promise keeps
/// that promise object as the reason.
fn static_reject(engine: &Engine, args: &[Value]) -> Result<Value, Value> {
    let reason = args.first().cloned().unwrap_or(Value::Undefined);
    let promise = engine.event_loop().rejected(neutral_from_value(&reason));
    Ok(wrap(engine, &promise))
}

/// Core of `then`/`catch`: derive a promise that settles from the
/// handler outcome.
pub(crate) fn do_then(
    engine: &Engine,
    source: &Arc<NeutralPromise>,
    on_fulfilled: Option<Value>,
    on_rejected: Option<Value>,
) -> Value {
    let derived = engine.event_loop().new_promise();
    let reaction_engine = engine.clone();
    let reaction_derived = derived.clone();

    source.on_settled(move |settlement| match settlement {
        Settlement::Fulfilled(value) => match on_fulfilled {
            Some(handler) => run_handler(&reaction_engine, &reaction_derived, handler, to_script(&value)),
            None => reaction_derived.resolve(value),
        },
        Settlement::Rejected(reason) => match on_rejected {
            Some(handler) => run_handler(&reaction_engine, &reaction_derived, handler, to_script(&reason)),
            None => reaction_derived.reject(reason),
        },
    });

    wrap(engine, &derived)
}

/// Core of `finally`: the callback sees no arguments and cannot alter
/// the settlement, but its own throw takes priority.
fn do_finally(engine: &Engine, source: &Arc<NeutralPromise>, on_finally: Option<Value>) -> Value {
    let derived = engine.event_loop().new_promise();
    let reaction_derived = derived.clone();

    source.on_settled(move |settlement| {
        if let Some(callback) = on_finally {
            if let Err(thrown) = callback.call(&Value::Undefined, &[]) {
                reaction_derived.reject(neutral_from_value(&thrown));
                return;
            }
        }
        match settlement {
            Settlement::Fulfilled(value) => reaction_derived.resolve(value),
            Settlement::Rejected(reason) => reaction_derived.reject(reason),
        }
    });

    wrap(engine, &derived)
}

fn run_handler(engine: &Engine, derived: &Arc<NeutralPromise>, handler: Value, argument: Value) {
    match handler.call(&Value::Undefined, &[argument]) {
        Ok(result) => resolve_value(engine, derived, result),
        Err(thrown) => derived.reject(neutral_from_value(&thrown)),
    }
}

fn upgrade(weak: &Weak<EngineInner>) -> Result<Engine, Value> {
    weak.upgrade()
        .map(Engine::from_inner)
        .ok_or_else(|| Value::error("Error", "promise bridge engine has been dropped"))
}

fn receiver(this: &Value, method: &str) -> Result<Arc<NeutralPromise>, Value> {
    unwrap(this).ok_or_else(|| Value::type_error(format!("{method}() called on non-Promise object")))
}

/// Missing or non-callable handler arguments mean pass-through.
fn handler_or_none(argument: Option<&Value>) -> Option<Value> {
    argument.filter(|v| v.is_callable()).cloned()
}
