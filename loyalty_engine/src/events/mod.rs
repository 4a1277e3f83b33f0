//! Settlement events.
//!
//! Other parts of the system can react to committed settlements by registering a callback in [`EventHooks`]. Each hook
//! gets its own [`EventHandler`], and the [`EventProducers`] handed to the settlement API publish to all of them.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::OrderSettledEvent;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
