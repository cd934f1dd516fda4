//! Request lifecycle events.
//!
//! Provides hooks for logging and custom reactions around each exchange.

use chrono::{DateTime, Utc};
use http::Method;
use std::sync::Arc;
use std::time::Duration;

use crate::transport::TransportMode;

/// Emitted right before the transport sends.
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    pub url: String,
    pub method: Method,
    pub mode: TransportMode,
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
}

/// Emitted when the transport reports a response.
#[derive(Debug, Clone)]
pub struct CompleteEvent {
    pub url: String,
    pub method: Method,
    pub status: u16,
    pub success: bool,
    pub latency: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Emitted when a timed-out exchange is resent.
#[derive(Debug, Clone)]
pub struct RetryEvent {
    pub url: String,
    pub method: Method,
    pub timeout: Duration,
    pub timestamp: DateTime<Utc>,
}

/// Emitted when an exchange fails without a usable response.
#[derive(Debug, Clone)]
pub struct FailureEvent {
    pub url: String,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum AjaxEvent {
    Dispatch(DispatchEvent),
    Complete(CompleteEvent),
    Retry(RetryEvent),
    Failure(FailureEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &AjaxEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: AjaxEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &AjaxEvent) {
        match event {
            AjaxEvent::Dispatch(dispatch) => {
                log::debug!(
                    "-> {} {} ({:?}, attempt {})",
                    dispatch.method,
                    dispatch.url,
                    dispatch.mode,
                    dispatch.attempt
                );
            }
            AjaxEvent::Complete(complete) => {
                log::debug!(
                    "<- {} {} -> {} ({:.2}s)",
                    complete.method,
                    complete.url,
                    complete.status,
                    complete.latency.as_secs_f64()
                );
            }
            AjaxEvent::Retry(retry) => {
                log::info!(
                    "Loading... {} {} timed out, resending with {}ms timeout",
                    retry.method,
                    retry.url,
                    retry.timeout.as_millis()
                );
            }
            AjaxEvent::Failure(failure) => {
                log::warn!("request to {} failed: {}", failure.url, failure.error);
            }
        }
    }
}
