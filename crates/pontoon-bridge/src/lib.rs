//! Promise bridge between a dynamic script value model and the neutral
//! promise layer in `pontoon-loop`.
//!
//! The bridge installs a script-visible surface — a `Promise`
//! constructor with `resolve`/`reject`/`all`/`race`/`allSettled`/`any`
//! statics, `then`/`catch`/`finally` instance methods, timers, and
//! `queueMicrotask` — backed entirely by neutral promises, and keeps
//! value identity intact in both directions: each neutral promise has
//! one canonical wrapper, and script objects crossing into the neutral
//! layer come back out as the same object.
//!
//! ```no_run
//! use pontoon_bridge::{Engine, GlobalScope};
//! use pontoon_loop::EventLoop;
//!
//! let engine = Engine::new(EventLoop::new());
//! let scope = GlobalScope::new();
//! engine.install(&scope)?;
//! // hand `scope` to the script engine, then drive the loop
//! engine.event_loop().run();
//! # Ok::<(), pontoon_bridge::BridgeError>(())
//! ```

mod combinators;
mod convert;
mod engine;
mod error;
mod promise;
mod timers;
mod value;
mod wrapper;

pub use convert::{neutral_from_value, promise_from_value, resolve_value, to_script};
pub use engine::{Engine, GlobalScope};
pub use error::{BridgeError, BridgeResult};
pub use value::{JsObject, NativeFn, Value};
pub use wrapper::{unwrap, wrap};
