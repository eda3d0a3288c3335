//! Neutral value representation.
//!
//! Every value that crosses the host/script boundary is expressed as a
//! [`NeutralValue`]. The variants cover primitives, ordered sequences,
//! key/value maps, promises, aggregate errors, and an opaque external
//! payload. The external payload is how a bridge passes engine values
//! through the host untouched: the host never inspects it, so reference
//! identity survives the round trip.

use crate::promise::NeutralPromise;
use std::any::Any;
use std::sync::Arc;

/// Opaque payload carried through the host without conversion.
///
/// Bridges store their engine-native value here (behind `Arc`, so
/// cloning a neutral value never clones the engine value) and downcast
/// on the way back out.
pub type External = Arc<dyn Any + Send + Sync>;

/// The host-side universal value representation.
#[derive(Clone)]
pub enum NeutralValue {
    /// Absent value (script `undefined`).
    Undefined,
    /// Explicit null.
    Null,
    /// Boolean primitive.
    Bool(bool),
    /// Numeric primitive.
    Number(f64),
    /// String primitive.
    String(Arc<str>),
    /// Ordered sequence of neutral values.
    Sequence(Vec<NeutralValue>),
    /// Key/value mapping. Stored as pairs so iteration is deterministic;
    /// semantically the order carries no meaning.
    Map(Vec<(String, NeutralValue)>),
    /// A neutral promise handle.
    Promise(Arc<NeutralPromise>),
    /// Aggregate of rejection reasons (`Promise.any` total failure).
    Aggregate(Arc<AggregateError>),
    /// Opaque engine value, passed through unchanged.
    External(External),
}

impl NeutralValue {
    /// String helper.
    pub fn string(s: impl AsRef<str>) -> Self {
        NeutralValue::String(Arc::from(s.as_ref()))
    }

    /// Wrap an arbitrary payload as an external value.
    pub fn external<T: Any + Send + Sync>(payload: T) -> Self {
        NeutralValue::External(Arc::new(payload))
    }

    /// The promise handle, if this value is a promise.
    pub fn as_promise(&self) -> Option<&Arc<NeutralPromise>> {
        match self {
            NeutralValue::Promise(p) => Some(p),
            _ => None,
        }
    }

    /// Downcast the external payload to a concrete type.
    pub fn as_external<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            NeutralValue::External(ext) => ext.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl std::fmt::Debug for NeutralValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NeutralValue::Undefined => write!(f, "undefined"),
            NeutralValue::Null => write!(f, "null"),
            NeutralValue::Bool(b) => write!(f, "{b}"),
            NeutralValue::Number(n) => write!(f, "{n}"),
            NeutralValue::String(s) => write!(f, "{s:?}"),
            NeutralValue::Sequence(items) => f.debug_list().entries(items).finish(),
            NeutralValue::Map(entries) => {
                let mut map = f.debug_map();
                for (k, v) in entries {
                    map.entry(k, v);
                }
                map.finish()
            }
            NeutralValue::Promise(p) => write!(f, "{p:?}"),
            NeutralValue::Aggregate(e) => write!(f, "AggregateError({:?})", e.message),
            NeutralValue::External(_) => write!(f, "<external>"),
        }
    }
}

/// An error-shaped value aggregating multiple rejection reasons.
///
/// Produced by [`crate::combinator::any`] when every input rejects. The
/// reasons are kept in input order, never collapsed to a single reason.
#[derive(Debug, Clone)]
pub struct AggregateError {
    /// Human-readable summary.
    pub message: String,
    /// The underlying rejection reasons, in input order.
    pub errors: Vec<NeutralValue>,
}

impl AggregateError {
    /// Create an aggregate error from reasons in input order.
    pub fn new(message: impl Into<String>, errors: Vec<NeutralValue>) -> Self {
        Self {
            message: message.into(),
            errors,
        }
    }
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AggregateError: {}", self.message)
    }
}
