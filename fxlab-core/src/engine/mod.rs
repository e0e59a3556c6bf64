//! The event loop — simulated time and deterministic dispatch.

pub mod event_loop;

pub use event_loop::{EngineError, Event, EventDispatcher, EventId, EventLoop, Replayable};
