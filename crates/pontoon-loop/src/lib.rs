//! # Pontoon Loop
//!
//! Host-side concurrency primitives for the Pontoon promise bridge.
//!
//! This crate owns everything that is shared across embedded scripts:
//! the neutral value representation, the neutral promise (a monotonic
//! three-state cell with microtask-deferred reactions), a cooperative
//! single-threaded scheduler, and the promise combinators expressed at
//! the neutral level.
//!
//! Script engines never appear here. A bridge crate converts engine
//! values to [`NeutralValue`] at the boundary and registers reactions
//! through [`NeutralPromise`]; the loop guarantees that every reaction
//! runs as a microtask on the loop thread, never inline with the call
//! that registered it.

pub mod combinator;
pub mod error;
pub mod event_loop;
pub mod promise;
pub mod value;

pub use combinator::{all, all_settled, any, race};
pub use error::{LoopError, LoopResult};
pub use event_loop::EventLoop;
pub use promise::{NeutralPromise, PromiseState, Settlement};
pub use value::{AggregateError, External, NeutralValue};
