//! Cross-cutting services module
//!
//! Lifecycle events emitted around each exchange.

pub mod events;

pub use events::{
    AjaxEvent,
    CompleteEvent,
    DispatchEvent,
    EventDispatcher,
    EventHandler,
    FailureEvent,
    LoggingHandler,
    RetryEvent,
};
