//! Dynamic script values.
//!
//! This is the engine-facing value model the bridge operates on: a
//! tagged union of primitives plus reference-counted objects. Objects
//! carry an insertion-ordered property map, optional array storage, an
//! optional call slot (functions are callable objects), and a
//! non-enumerable internal promise slot used by the wrapper registry.
//!
//! Script exceptions are themselves values: native functions return
//! `Result<Value, Value>`, so a thrown value can become a rejection
//! reason without loss.

use indexmap::IndexMap;
use parking_lot::Mutex;
use pontoon_loop::NeutralPromise;
use std::sync::Arc;

/// Native function signature: `(this, args) -> result-or-thrown`.
pub type NativeFn = Arc<dyn Fn(&Value, &[Value]) -> Result<Value, Value> + Send + Sync>;

/// A dynamically-typed script value.
#[derive(Clone)]
pub enum Value {
    /// Script `undefined`.
    Undefined,
    /// Script `null`.
    Null,
    /// Boolean primitive.
    Bool(bool),
    /// Numeric primitive.
    Number(f64),
    /// String primitive.
    String(Arc<str>),
    /// Object reference (plain object, array, function, or wrapper).
    Object(Arc<JsObject>),
}

impl Value {
    /// Build a string value.
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::String(Arc::from(s.as_ref()))
    }

    /// Build a plain object value.
    pub fn object(obj: Arc<JsObject>) -> Self {
        Value::Object(obj)
    }

    /// Build an array value from elements.
    pub fn array(elements: Vec<Value>) -> Self {
        Value::Object(Arc::new(JsObject::array(elements)))
    }

    /// Build a callable value from a native function.
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> Result<Value, Value> + Send + Sync + 'static,
    {
        Value::Object(Arc::new(JsObject::function(Arc::new(f))))
    }

    /// Build an error-shaped object: `{ name, message }`.
    pub fn error(name: &str, message: impl AsRef<str>) -> Self {
        let obj = JsObject::new();
        obj.set("name", Value::string(name));
        obj.set("message", Value::string(message.as_ref()));
        Value::Object(Arc::new(obj))
    }

    /// Build a script TypeError value.
    pub fn type_error(message: impl AsRef<str>) -> Self {
        Value::error("TypeError", message)
    }

    /// Whether this is `undefined` or `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// The numeric payload, if any.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The object payload, if any.
    pub fn as_object(&self) -> Option<&Arc<JsObject>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Whether this value can be called.
    pub fn is_callable(&self) -> bool {
        self.as_object().is_some_and(|o| o.callable().is_some())
    }

    /// Call the value as a function.
    ///
    /// `Err` carries the thrown script value; calling a non-function
    /// throws a TypeError.
    pub fn call(&self, this: &Value, args: &[Value]) -> Result<Value, Value> {
        match self.as_object().and_then(|o| o.callable()) {
            Some(f) => f(this, args),
            None => Err(Value::type_error("value is not a function")),
        }
    }

    /// Look up a property on an object value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.as_object().and_then(|o| o.get(key))
    }

    /// Call a method by name with `this` bound to the receiver.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, Value> {
        match self.get(name) {
            Some(method) => method.call(self, args),
            None => Err(Value::type_error(format!("{name} is not a function"))),
        }
    }

    /// Reference identity: `true` iff both values are the same object.
    pub fn same_ref(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Object(x), Value::Object(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Object(o) => {
                if o.callable().is_some() {
                    write!(f, "[function]")
                } else if o.is_array() {
                    write!(f, "[array len={}]", o.array_len())
                } else if o.promise_slot().is_some() {
                    write!(f, "[promise wrapper]")
                } else {
                    write!(f, "[object]")
                }
            }
        }
    }
}

/// Script object: property map plus optional array storage, call slot,
/// and internal promise slot.
pub struct JsObject {
    props: Mutex<IndexMap<String, Value>>,
    elements: Mutex<Vec<Value>>,
    is_array: bool,
    call: Option<NativeFn>,
    /// Internal, non-enumerable slot carrying the backing neutral
    /// promise of a wrapper. This is the wrapper registry's only
    /// storage: no side table exists anywhere.
    promise_slot: Mutex<Option<Arc<NeutralPromise>>>,
}

impl JsObject {
    /// Plain object.
    pub fn new() -> Self {
        Self {
            props: Mutex::new(IndexMap::new()),
            elements: Mutex::new(Vec::new()),
            is_array: false,
            call: None,
            promise_slot: Mutex::new(None),
        }
    }

    /// Array object with the given elements.
    pub fn array(elements: Vec<Value>) -> Self {
        Self {
            props: Mutex::new(IndexMap::new()),
            elements: Mutex::new(elements),
            is_array: true,
            call: None,
            promise_slot: Mutex::new(None),
        }
    }

    /// Callable object.
    pub fn function(f: NativeFn) -> Self {
        Self {
            props: Mutex::new(IndexMap::new()),
            elements: Mutex::new(Vec::new()),
            is_array: false,
            call: Some(f),
            promise_slot: Mutex::new(None),
        }
    }

    /// Whether this object is an array.
    pub fn is_array(&self) -> bool {
        self.is_array
    }

    /// Number of array elements (0 for non-arrays).
    pub fn array_len(&self) -> usize {
        self.elements.lock().len()
    }

    /// Array element at `index`.
    pub fn element(&self, index: usize) -> Option<Value> {
        self.elements.lock().get(index).cloned()
    }

    /// Snapshot of all array elements.
    pub fn elements(&self) -> Vec<Value> {
        self.elements.lock().clone()
    }

    /// The call slot, if this object is callable.
    pub fn callable(&self) -> Option<&NativeFn> {
        self.call.as_ref()
    }

    /// Property lookup. Arrays answer `length` and numeric keys from
    /// their element storage.
    pub fn get(&self, key: &str) -> Option<Value> {
        if self.is_array {
            if key == "length" {
                return Some(Value::Number(self.array_len() as f64));
            }
            if let Ok(index) = key.parse::<usize>() {
                return self.element(index);
            }
        }
        self.props.lock().get(key).cloned()
    }

    /// Property assignment.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.props.lock().insert(key.into(), value);
    }

    /// Enumerable property names, in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.props.lock().keys().cloned().collect()
    }

    /// The internal promise slot.
    pub fn promise_slot(&self) -> Option<Arc<NeutralPromise>> {
        self.promise_slot.lock().clone()
    }

    pub(crate) fn set_promise_slot(&self, promise: Arc<NeutralPromise>) {
        *self.promise_slot.lock() = Some(promise);
    }
}

impl Default for JsObject {
    fn default() -> Self {
        Self::new()
    }
}
