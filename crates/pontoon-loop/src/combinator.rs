//! Promise combinators at the neutral level.
//!
//! Each combinator derives one promise from a slice of input promises.
//! Settlement rules follow the standard Promise semantics exactly,
//! including the empty-input edge cases: `all`/`all_settled` of nothing
//! fulfill immediately, `race` of nothing stays pending forever, and
//! `any` of nothing rejects with an empty aggregate.

use crate::event_loop::EventLoop;
use crate::promise::{NeutralPromise, Settlement};
use crate::value::{AggregateError, NeutralValue};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

const ALL_REJECTED_MESSAGE: &str = "All promises were rejected";

/// Fulfills with every input's value, index-aligned; rejects with the
/// first rejection observed in settlement order.
pub fn all(event_loop: &Arc<EventLoop>, promises: &[Arc<NeutralPromise>]) -> Arc<NeutralPromise> {
    let result = event_loop.new_promise();
    if promises.is_empty() {
        result.resolve(NeutralValue::Sequence(Vec::new()));
        return result;
    }

    let count = promises.len();
    let remaining = Arc::new(AtomicUsize::new(count));
    let values: Arc<Mutex<Vec<Option<NeutralValue>>>> = Arc::new(Mutex::new(vec![None; count]));
    let rejected = Arc::new(AtomicBool::new(false));

    for (index, promise) in promises.iter().enumerate() {
        let result = result.clone();
        let remaining = remaining.clone();
        let values = values.clone();
        let rejected = rejected.clone();

        promise.on_settled(move |settlement| match settlement {
            Settlement::Fulfilled(value) => {
                if rejected.load(Ordering::Acquire) {
                    return;
                }
                values.lock()[index] = Some(value);
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    result.resolve(collect(&values));
                }
            }
            Settlement::Rejected(reason) => {
                if !rejected.swap(true, Ordering::AcqRel) {
                    result.reject(reason);
                }
            }
        });
    }

    result
}

/// Settles with whichever input settles first, fulfilled or rejected.
/// An empty input never settles; that is intentional, not a bug.
pub fn race(event_loop: &Arc<EventLoop>, promises: &[Arc<NeutralPromise>]) -> Arc<NeutralPromise> {
    let result = event_loop.new_promise();

    for promise in promises {
        let result = result.clone();
        promise.on_settled(move |settlement| match settlement {
            // Settlement idempotence makes the first writer win.
            Settlement::Fulfilled(value) => result.resolve(value),
            Settlement::Rejected(reason) => result.reject(reason),
        });
    }

    result
}

/// Always fulfills once every input has settled, with an index-aligned
/// sequence of `{status, value|reason}` records.
pub fn all_settled(
    event_loop: &Arc<EventLoop>,
    promises: &[Arc<NeutralPromise>],
) -> Arc<NeutralPromise> {
    let result = event_loop.new_promise();
    if promises.is_empty() {
        result.resolve(NeutralValue::Sequence(Vec::new()));
        return result;
    }

    let count = promises.len();
    let remaining = Arc::new(AtomicUsize::new(count));
    let records: Arc<Mutex<Vec<Option<NeutralValue>>>> = Arc::new(Mutex::new(vec![None; count]));

    for (index, promise) in promises.iter().enumerate() {
        let result = result.clone();
        let remaining = remaining.clone();
        let records = records.clone();

        promise.on_settled(move |settlement| {
            let record = match settlement {
                Settlement::Fulfilled(value) => NeutralValue::Map(vec![
                    ("status".into(), NeutralValue::string("fulfilled")),
                    ("value".into(), value),
                ]),
                Settlement::Rejected(reason) => NeutralValue::Map(vec![
                    ("status".into(), NeutralValue::string("rejected")),
                    ("reason".into(), reason),
                ]),
            };
            records.lock()[index] = Some(record);
            if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                result.resolve(collect(&records));
            }
        });
    }

    result
}

/// Fulfills with the first fulfillment observed; if every input
/// rejects, rejects with an aggregate of all reasons in input order.
pub fn any(event_loop: &Arc<EventLoop>, promises: &[Arc<NeutralPromise>]) -> Arc<NeutralPromise> {
    let result = event_loop.new_promise();
    if promises.is_empty() {
        result.reject(NeutralValue::Aggregate(Arc::new(AggregateError::new(
            ALL_REJECTED_MESSAGE,
            Vec::new(),
        ))));
        return result;
    }

    let count = promises.len();
    let fulfilled = Arc::new(AtomicBool::new(false));
    let remaining = Arc::new(AtomicUsize::new(count));
    let reasons: Arc<Mutex<Vec<Option<NeutralValue>>>> = Arc::new(Mutex::new(vec![None; count]));

    for (index, promise) in promises.iter().enumerate() {
        let result = result.clone();
        let fulfilled = fulfilled.clone();
        let remaining = remaining.clone();
        let reasons = reasons.clone();

        promise.on_settled(move |settlement| match settlement {
            Settlement::Fulfilled(value) => {
                if !fulfilled.swap(true, Ordering::AcqRel) {
                    result.resolve(value);
                }
            }
            Settlement::Rejected(reason) => {
                if fulfilled.load(Ordering::Acquire) {
                    return;
                }
                reasons.lock()[index] = Some(reason);
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let errors = reasons
                        .lock()
                        .iter()
                        .map(|r| r.clone().unwrap_or(NeutralValue::Undefined))
                        .collect();
                    result.reject(NeutralValue::Aggregate(Arc::new(AggregateError::new(
                        ALL_REJECTED_MESSAGE,
                        errors,
                    ))));
                }
            }
        });
    }

    result
}

fn collect(slots: &Mutex<Vec<Option<NeutralValue>>>) -> NeutralValue {
    NeutralValue::Sequence(
        slots
            .lock()
            .iter()
            .map(|v| v.clone().unwrap_or(NeutralValue::Undefined))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(event_loop: &Arc<EventLoop>) {
        event_loop.perform_microtask_checkpoint();
    }

    #[test]
    fn all_fulfills_index_aligned() {
        let event_loop = EventLoop::new();
        let p1 = event_loop.new_promise();
        let p2 = event_loop.new_promise();
        let combined = all(&event_loop, &[p1.clone(), p2.clone()]);

        // Settle out of index order; results must stay index-aligned.
        p2.resolve(NeutralValue::Number(2.0));
        p1.resolve(NeutralValue::Number(1.0));
        checkpoint(&event_loop);

        match combined.value() {
            Some(NeutralValue::Sequence(items)) => {
                assert!(matches!(items[0], NeutralValue::Number(n) if n == 1.0));
                assert!(matches!(items[1], NeutralValue::Number(n) if n == 2.0));
            }
            other => panic!("expected sequence, got {other:?}"),
        }
    }

    #[test]
    fn all_rejects_with_first_rejection_in_settlement_order() {
        let event_loop = EventLoop::new();
        let p1 = event_loop.new_promise();
        let p2 = event_loop.new_promise();
        let combined = all(&event_loop, &[p1.clone(), p2.clone()]);

        p2.reject(NeutralValue::string("second rejected first"));
        p1.resolve(NeutralValue::Number(1.0));
        checkpoint(&event_loop);

        match combined.reason() {
            Some(NeutralValue::String(s)) => assert_eq!(&*s, "second rejected first"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn all_of_empty_fulfills_immediately() {
        let event_loop = EventLoop::new();
        let combined = all(&event_loop, &[]);
        assert!(matches!(
            combined.value(),
            Some(NeutralValue::Sequence(items)) if items.is_empty()
        ));
    }

    #[test]
    fn race_first_settlement_wins() {
        let event_loop = EventLoop::new();
        let p1 = event_loop.new_promise();
        let p2 = event_loop.new_promise();
        let winner = race(&event_loop, &[p1.clone(), p2.clone()]);

        p2.reject(NeutralValue::string("fast failure"));
        p1.resolve(NeutralValue::Number(1.0));
        checkpoint(&event_loop);

        assert!(winner.is_rejected());
    }

    #[test]
    fn race_of_empty_never_settles() {
        let event_loop = EventLoop::new();
        let pending = race(&event_loop, &[]);
        checkpoint(&event_loop);
        assert!(pending.is_pending());
    }

    #[test]
    fn all_settled_never_rejects() {
        let event_loop = EventLoop::new();
        let p1 = event_loop.fulfilled(NeutralValue::Number(1.0));
        let p2 = event_loop.rejected(NeutralValue::string("e"));
        let combined = all_settled(&event_loop, &[p1, p2]);
        checkpoint(&event_loop);

        match combined.value() {
            Some(NeutralValue::Sequence(records)) => {
                let NeutralValue::Map(first) = &records[0] else {
                    panic!("expected record map");
                };
                assert!(
                    matches!(&first[0].1, NeutralValue::String(s) if &**s == "fulfilled")
                );
                let NeutralValue::Map(second) = &records[1] else {
                    panic!("expected record map");
                };
                assert!(matches!(&second[0].1, NeutralValue::String(s) if &**s == "rejected"));
                assert!(matches!(&second[1].1, NeutralValue::String(s) if &**s == "e"));
            }
            other => panic!("expected fulfilled sequence, got {other:?}"),
        }
    }

    #[test]
    fn any_aggregates_reasons_in_input_order() {
        let event_loop = EventLoop::new();
        let p1 = event_loop.new_promise();
        let p2 = event_loop.new_promise();
        let combined = any(&event_loop, &[p1.clone(), p2.clone()]);

        // Reject in reverse order; the aggregate must keep input order.
        p2.reject(NeutralValue::string("b"));
        p1.reject(NeutralValue::string("a"));
        checkpoint(&event_loop);

        match combined.reason() {
            Some(NeutralValue::Aggregate(err)) => {
                assert_eq!(err.errors.len(), 2);
                assert!(matches!(&err.errors[0], NeutralValue::String(s) if &**s == "a"));
                assert!(matches!(&err.errors[1], NeutralValue::String(s) if &**s == "b"));
            }
            other => panic!("expected aggregate rejection, got {other:?}"),
        }
    }

    #[test]
    fn any_first_fulfillment_wins() {
        let event_loop = EventLoop::new();
        let p1 = event_loop.new_promise();
        let p2 = event_loop.new_promise();
        let combined = any(&event_loop, &[p1.clone(), p2.clone()]);

        p1.reject(NeutralValue::string("a"));
        p2.resolve(NeutralValue::Number(9.0));
        checkpoint(&event_loop);

        assert!(matches!(combined.value(), Some(NeutralValue::Number(n)) if n == 9.0));
    }

    #[test]
    fn any_of_empty_rejects_with_empty_aggregate() {
        let event_loop = EventLoop::new();
        let combined = any(&event_loop, &[]);
        match combined.reason() {
            Some(NeutralValue::Aggregate(err)) => assert!(err.errors.is_empty()),
            other => panic!("expected aggregate rejection, got {other:?}"),
        }
    }
}
