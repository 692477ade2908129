//! Event plumbing shared by the write side and the read side.
//!
//! - `Event`: metadata every recorded fact exposes
//! - `EventEnvelope`: stream position + payload, the unit appended and published
//! - `EventBus` / `InMemoryEventBus`: fan-out to projections and workers

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
