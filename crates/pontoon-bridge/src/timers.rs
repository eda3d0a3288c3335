//! Script timer and microtask globals.
//!
//! Thin validation shims over the loop's scheduling API. Arguments are
//! checked eagerly (callable callback, non-negative delay) so a bad
//! call throws at the call site instead of surfacing later inside the
//! loop. A throw from inside a scheduled callback has no script frame
//! to land in; it is logged and swallowed.

use crate::engine::Engine;
use crate::value::Value;
use pontoon_loop::EventLoop;
use std::sync::Arc;
use std::time::Duration;

/// Build the timer global bindings for installation.
pub(crate) fn bindings(engine: &Engine) -> Vec<(&'static str, Value)> {
    let event_loop = engine.event_loop().clone();
    vec![
        ("setTimeout", set_timeout_binding(event_loop.clone())),
        ("clearTimeout", clear_binding(event_loop.clone(), ClearKind::Timeout)),
        ("setInterval", set_interval_binding(event_loop.clone())),
        ("clearInterval", clear_binding(event_loop.clone(), ClearKind::Interval)),
        ("queueMicrotask", queue_microtask_binding(event_loop)),
    ]
}

fn set_timeout_binding(event_loop: Arc<EventLoop>) -> Value {
    Value::function(move |_this, args| {
        let callback = callback_from(args, "setTimeout")?;
        let delay = delay_from(args.get(1))?;
        let id = event_loop
            .set_timeout(move || run_callback(&callback, "setTimeout"), delay)
            .map_err(loop_failure)?;
        Ok(Value::Number(id as f64))
    })
}

fn set_interval_binding(event_loop: Arc<EventLoop>) -> Value {
    Value::function(move |_this, args| {
        let callback = callback_from(args, "setInterval")?;
        let delay = delay_from(args.get(1))?;
        let id = event_loop
            .set_interval(move || run_callback(&callback, "setInterval"), delay)
            .map_err(loop_failure)?;
        Ok(Value::Number(id as f64))
    })
}

enum ClearKind {
    Timeout,
    Interval,
}

fn clear_binding(event_loop: Arc<EventLoop>, kind: ClearKind) -> Value {
    Value::function(move |_this, args| {
        // Non-numeric and unknown ids are ignored, browser-style.
        if let Some(id) = args.first().and_then(Value::as_number) {
            if id.is_finite() && id >= 0.0 {
                match kind {
                    ClearKind::Timeout => event_loop.clear_timeout(id as u64),
                    ClearKind::Interval => event_loop.clear_interval(id as u64),
                }
            }
        }
        Ok(Value::Undefined)
    })
}

fn queue_microtask_binding(event_loop: Arc<EventLoop>) -> Value {
    Value::function(move |_this, args| {
        let callback = callback_from(args, "queueMicrotask")?;
        event_loop
            .queue_microtask(move || run_callback(&callback, "queueMicrotask"))
            .map_err(loop_failure)?;
        Ok(Value::Undefined)
    })
}

fn callback_from(args: &[Value], name: &str) -> Result<Value, Value> {
    args.first()
        .filter(|v| v.is_callable())
        .cloned()
        .ok_or_else(|| Value::type_error(format!("{name} requires a function as first argument")))
}

/// Delay in milliseconds. Missing and NaN read as zero; negative
/// delays throw.
fn delay_from(argument: Option<&Value>) -> Result<Duration, Value> {
    let millis = argument.and_then(Value::as_number).unwrap_or(0.0);
    if millis.is_nan() {
        return Ok(Duration::ZERO);
    }
    if millis < 0.0 {
        return Err(Value::type_error("delay cannot be negative"));
    }
    Ok(Duration::from_millis(millis as u64))
}

fn run_callback(callback: &Value, source: &str) {
    if let Err(thrown) = callback.call(&Value::Undefined, &[]) {
        tracing::warn!(source, thrown = ?thrown, "scheduled callback threw");
    }
}

fn loop_failure(err: pontoon_loop::LoopError) -> Value {
    Value::error("Error", err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, GlobalScope};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn installed() -> (Engine, GlobalScope) {
        let engine = Engine::new(EventLoop::new());
        let scope = GlobalScope::new();
        engine.install(&scope).unwrap();
        (engine, scope)
    }

    #[test]
    fn set_timeout_requires_a_function() {
        let (_engine, scope) = installed();
        let set_timeout = scope.get("setTimeout").unwrap();
        let thrown = set_timeout.call(&Value::Undefined, &[Value::Number(1.0)]).unwrap_err();
        assert_eq!(
            thrown.get("message").and_then(|v| v.as_str().map(String::from)),
            Some("setTimeout requires a function as first argument".into())
        );
    }

    #[test]
    fn negative_delay_throws() {
        let (_engine, scope) = installed();
        let set_timeout = scope.get("setTimeout").unwrap();
        let callback = Value::function(|_, _| Ok(Value::Undefined));
        let thrown = set_timeout
            .call(&Value::Undefined, &[callback, Value::Number(-5.0)])
            .unwrap_err();
        assert_eq!(
            thrown.get("message").and_then(|v| v.as_str().map(String::from)),
            Some("delay cannot be negative".into())
        );
    }

    #[test]
    fn nan_delay_reads_as_zero() {
        assert_eq!(delay_from(Some(&Value::Number(f64::NAN))).unwrap(), Duration::ZERO);
        assert_eq!(delay_from(None).unwrap(), Duration::ZERO);
    }

    #[test]
    fn timer_fires_and_can_be_cleared() {
        let (engine, scope) = installed();
        let fired = Arc::new(AtomicU32::new(0));

        let set_timeout = scope.get("setTimeout").unwrap();
        let clear_timeout = scope.get("clearTimeout").unwrap();

        let keep = {
            let fired = fired.clone();
            Value::function(move |_, _| {
                fired.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Undefined)
            })
        };
        let cancel = {
            let fired = fired.clone();
            Value::function(move |_, _| {
                fired.fetch_add(100, Ordering::SeqCst);
                Ok(Value::Undefined)
            })
        };

        set_timeout.call(&Value::Undefined, &[keep, Value::Number(1.0)]).unwrap();
        let id = set_timeout
            .call(&Value::Undefined, &[cancel, Value::Number(1.0)])
            .unwrap();
        clear_timeout.call(&Value::Undefined, &[id]).unwrap();

        engine.event_loop().run();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn interval_repeats_until_cleared() {
        let (engine, scope) = installed();
        let runs = Arc::new(AtomicU32::new(0));
        let id_cell: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));

        let set_interval = scope.get("setInterval").unwrap();
        let clear_interval = scope.get("clearInterval").unwrap();

        let callback = {
            let runs = runs.clone();
            let id_cell = id_cell.clone();
            Value::function(move |_, _| {
                if runs.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                    if let Some(id) = id_cell.lock().clone() {
                        clear_interval.call(&Value::Undefined, &[id])?;
                    }
                }
                Ok(Value::Undefined)
            })
        };

        let id = set_interval
            .call(&Value::Undefined, &[callback, Value::Number(1.0)])
            .unwrap();
        *id_cell.lock() = Some(id);

        engine.event_loop().run();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn queue_microtask_runs_before_timers() {
        let (engine, scope) = installed();
        let order = Arc::new(Mutex::new(Vec::new()));

        let set_timeout = scope.get("setTimeout").unwrap();
        let queue_microtask = scope.get("queueMicrotask").unwrap();

        let timer_cb = {
            let order = order.clone();
            Value::function(move |_, _| {
                order.lock().push("timer");
                Ok(Value::Undefined)
            })
        };
        let micro_cb = {
            let order = order.clone();
            Value::function(move |_, _| {
                order.lock().push("micro");
                Ok(Value::Undefined)
            })
        };

        set_timeout.call(&Value::Undefined, &[timer_cb]).unwrap();
        queue_microtask.call(&Value::Undefined, &[micro_cb]).unwrap();

        engine.event_loop().run();
        assert_eq!(*order.lock(), vec!["micro", "timer"]);
    }

    #[test]
    fn clear_ignores_garbage_ids() {
        let (_engine, scope) = installed();
        let clear_timeout = scope.get("clearTimeout").unwrap();
        clear_timeout.call(&Value::Undefined, &[]).unwrap();
        clear_timeout.call(&Value::Undefined, &[Value::string("nope")]).unwrap();
        clear_timeout.call(&Value::Undefined, &[Value::Number(-1.0)]).unwrap();
    }
}
