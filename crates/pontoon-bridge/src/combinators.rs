//! Script-facing combinator statics: argument extraction and wrapping
//! around the neutral combinators.
//!
//! Each static reads an array-like input, lifts every element onto the
//! identity-preserving promise path, delegates to the neutral
//! combinator, and wraps the result. Elements that are plain values
//! still round-trip with reference identity intact because the promise
//! path carries them opaquely.

use crate::convert::promise_from_value;
use crate::engine::Engine;
use crate::value::Value;
use crate::wrapper::wrap;
use pontoon_loop::{self as neutral, NeutralPromise};
use std::sync::Arc;

pub(crate) fn all(engine: &Engine, args: &[Value]) -> Result<Value, Value> {
    let input = input_promises(engine, args, "Promise.all")?;
    Ok(wrap(engine, &neutral::all(engine.event_loop(), &input)))
}

pub(crate) fn race(engine: &Engine, args: &[Value]) -> Result<Value, Value> {
    // A missing input races nothing and never settles, same as `[]`.
    let arg = args.first().cloned().unwrap_or(Value::Undefined);
    if arg.is_nullish() {
        return Ok(wrap(engine, &neutral::race(engine.event_loop(), &[])));
    }
    let input = promises_from(engine, &arg, "Promise.race")?;
    Ok(wrap(engine, &neutral::race(engine.event_loop(), &input)))
}

pub(crate) fn all_settled(engine: &Engine, args: &[Value]) -> Result<Value, Value> {
    let input = input_promises(engine, args, "Promise.allSettled")?;
    Ok(wrap(engine, &neutral::all_settled(engine.event_loop(), &input)))
}

pub(crate) fn any(engine: &Engine, args: &[Value]) -> Result<Value, Value> {
    let arg = args.first().cloned().unwrap_or(Value::Undefined);
    if arg.is_nullish() {
        return Err(Value::type_error("Promise.any requires an iterable"));
    }
    let input = promises_from(engine, &arg, "Promise.any")?;
    Ok(wrap(engine, &neutral::any(engine.event_loop(), &input)))
}

/// Shared extraction for `all`/`allSettled`: a nullish argument counts
/// as the empty input.
fn input_promises(
    engine: &Engine,
    args: &[Value],
    method: &str,
) -> Result<Vec<Arc<NeutralPromise>>, Value> {
    let arg = args.first().cloned().unwrap_or(Value::Undefined);
    if arg.is_nullish() {
        return Ok(Vec::new());
    }
    promises_from(engine, &arg, method)
}

fn promises_from(
    engine: &Engine,
    input: &Value,
    method: &str,
) -> Result<Vec<Arc<NeutralPromise>>, Value> {
    let items = array_like_items(input)
        .ok_or_else(|| Value::type_error(format!("{method} requires an iterable")))?;
    Ok(items
        .iter()
        .map(|item| promise_from_value(engine, item))
        .collect())
}

/// Read an array-like value: real arrays by element storage, other
/// objects through a numeric `length` property and index keys.
fn array_like_items(value: &Value) -> Option<Vec<Value>> {
    let obj = value.as_object()?;
    if obj.is_array() {
        return Some(obj.elements());
    }
    let length = obj.get("length")?.as_number()?;
    if !length.is_finite() || length < 0.0 {
        return None;
    }
    let length = length as usize;
    let mut items = Vec::with_capacity(length);
    for index in 0..length {
        items.push(obj.get(&index.to_string()).unwrap_or(Value::Undefined));
    }
    Some(items)
}
