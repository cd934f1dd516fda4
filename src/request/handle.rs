//! Chainable handle returned by every dispatch.
//!
//! The exchange runs on its own task and reports through a oneshot channel.
//! Resolving the handle (awaiting it, or [`Handle::detach`]) fires `done` or
//! `error` and then `always`, once. Callbacks registered any time before
//! resolution are honored. Dropping a handle that still holds callbacks
//! detaches it, so they fire when the exchange finishes.

use std::future::{Future, IntoFuture};
use std::mem;
use std::pin::Pin;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::executor::ExchangeError;
use super::types::{Exchange, Outcome, ResponseBody};
use crate::transport::TransportMode;

type DoneCallback = Box<dyn FnOnce(&ResponseBody, &str, &Exchange) + Send>;
type ExchangeCallback = Box<dyn FnOnce(&Exchange) + Send>;

/// At most one callback per slot; unset slots are no-ops.
#[derive(Default)]
pub struct CallbackRegistry {
    done: Option<DoneCallback>,
    error: Option<ExchangeCallback>,
    always: Option<ExchangeCallback>,
}

impl CallbackRegistry {
    pub fn is_empty(&self) -> bool {
        self.done.is_none() && self.error.is_none() && self.always.is_none()
    }

    /// Deliver `outcome`: `done` or `error`, then `always`.
    pub fn resolve(self, outcome: &Outcome) {
        match outcome {
            Outcome::Success {
                body,
                headers,
                exchange,
            } => {
                if let Some(done) = self.done {
                    done(body, headers, exchange);
                }
            }
            Outcome::Failure { exchange } => {
                if let Some(error) = self.error {
                    error(exchange);
                }
            }
        }

        if let Some(always) = self.always {
            always(outcome.exchange());
        }
    }
}

/// Handle to a dispatched exchange.
///
/// Await it to get the [`Outcome`]. Dropping it with callbacks registered
/// detaches it onto the current runtime.
pub struct Handle {
    callbacks: CallbackRegistry,
    outcome: oneshot::Receiver<Outcome>,
    method: String,
    url: String,
    mode: TransportMode,
}

impl Handle {
    pub(crate) fn new(
        outcome: oneshot::Receiver<Outcome>,
        method: String,
        url: String,
        mode: TransportMode,
    ) -> Self {
        Self {
            callbacks: CallbackRegistry::default(),
            outcome,
            method,
            url,
            mode,
        }
    }

    /// Called with `(body, header_block, exchange)` on success.
    pub fn done<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&ResponseBody, &str, &Exchange) + Send + 'static,
    {
        self.callbacks.done = Some(Box::new(callback));
        self
    }

    /// Called with the exchange on failure.
    pub fn error<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&Exchange) + Send + 'static,
    {
        self.callbacks.error = Some(Box::new(callback));
        self
    }

    /// Called last, whatever the outcome.
    pub fn always<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&Exchange) + Send + 'static,
    {
        self.callbacks.always = Some(Box::new(callback));
        self
    }

    /// Wait for the terminal event, run the callbacks and return the outcome.
    pub fn wait(mut self) -> impl Future<Output = Outcome> + Send + 'static {
        self.take_pending().resolve()
    }

    /// Resolve in the background; callbacks fire without the caller awaiting.
    pub fn detach(self) -> JoinHandle<Outcome> {
        tokio::spawn(self.wait())
    }

    /// Move the resolution state out, leaving an inert handle behind.
    fn take_pending(&mut self) -> Pending {
        let (_, closed) = oneshot::channel();
        Pending {
            callbacks: mem::take(&mut self.callbacks),
            outcome: mem::replace(&mut self.outcome, closed),
            method: mem::take(&mut self.method),
            url: mem::take(&mut self.url),
            mode: self.mode,
        }
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.callbacks.is_empty() {
            return;
        }

        let pending = self.take_pending();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(pending.resolve());
            }
            Err(_) => log::warn!(
                "handle for {} {} dropped outside a runtime; callbacks discarded",
                pending.method,
                pending.url
            ),
        }
    }
}

struct Pending {
    callbacks: CallbackRegistry,
    outcome: oneshot::Receiver<Outcome>,
    method: String,
    url: String,
    mode: TransportMode,
}

impl Pending {
    async fn resolve(self) -> Outcome {
        let Self {
            callbacks,
            outcome,
            method,
            url,
            mode,
        } = self;

        let outcome = outcome.await.unwrap_or_else(|_| Outcome::Failure {
            exchange: Exchange::failed(method, url, mode, 0, ExchangeError::Aborted),
        });
        callbacks.resolve(&outcome);
        outcome
    }
}

impl IntoFuture for Handle {
    type Output = Outcome;
    type IntoFuture = Pin<Box<dyn Future<Output = Outcome> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use std::sync::{Arc, Mutex};

    fn exchange(status: u16) -> Exchange {
        Exchange {
            method: "GET".into(),
            url: "http://localhost/".into(),
            status,
            status_text: String::new(),
            headers: HeaderMap::new(),
            mode: TransportMode::Standard,
            attempts: 1,
            error: None,
        }
    }

    fn recording_handle(rx: oneshot::Receiver<Outcome>, log: Arc<Mutex<Vec<String>>>) -> Handle {
        let (done_log, error_log, always_log) = (log.clone(), log.clone(), log);
        Handle::new(rx, "GET".into(), "http://localhost/".into(), TransportMode::Standard)
            .done(move |_, _, _| done_log.lock().unwrap().push("done".into()))
            .error(move |_| error_log.lock().unwrap().push("error".into()))
            .always(move |_| always_log.lock().unwrap().push("always".into()))
    }

    #[tokio::test]
    async fn success_fires_done_then_always() {
        let (tx, rx) = oneshot::channel();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = recording_handle(rx, log.clone());

        tx.send(Outcome::Success {
            body: ResponseBody::Empty,
            headers: String::new(),
            exchange: exchange(200),
        })
        .unwrap();

        assert!(handle.await.is_success());
        assert_eq!(*log.lock().unwrap(), vec!["done", "always"]);
    }

    #[tokio::test]
    async fn failure_fires_error_then_always() {
        let (tx, rx) = oneshot::channel();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = recording_handle(rx, log.clone());

        tx.send(Outcome::Failure { exchange: exchange(500) }).unwrap();

        assert!(!handle.await.is_success());
        assert_eq!(*log.lock().unwrap(), vec!["error", "always"]);
    }

    #[tokio::test]
    async fn dropped_exchange_resolves_as_aborted_failure() {
        let (tx, rx) = oneshot::channel::<Outcome>();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = recording_handle(rx, log.clone());
        drop(tx);

        let outcome = handle.await;
        assert!(matches!(
            outcome.exchange().error,
            Some(ExchangeError::Aborted)
        ));
        assert_eq!(*log.lock().unwrap(), vec!["error", "always"]);
    }

    #[tokio::test]
    async fn later_registration_replaces_earlier_one() {
        let (tx, rx) = oneshot::channel();
        let hits = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (hits.clone(), hits.clone());

        let handle = Handle::new(rx, "GET".into(), "/".into(), TransportMode::Standard)
            .done(move |_, _, _| first.lock().unwrap().push(1))
            .done(move |_, _, _| second.lock().unwrap().push(2));

        tx.send(Outcome::Success {
            body: ResponseBody::Empty,
            headers: String::new(),
            exchange: exchange(204),
        })
        .unwrap();

        handle.await;
        assert_eq!(*hits.lock().unwrap(), vec![2]);
    }

    #[tokio::test]
    async fn missing_callbacks_are_no_ops() {
        let (tx, rx) = oneshot::channel();
        let handle = Handle::new(rx, "GET".into(), "/".into(), TransportMode::Standard);
        tx.send(Outcome::Failure { exchange: exchange(404) }).unwrap();
        assert_eq!(handle.await.exchange().status, 404);
    }

    #[tokio::test]
    async fn dropped_handle_with_callbacks_detaches() {
        let (tx, rx) = oneshot::channel();
        let (finished_tx, finished_rx) = oneshot::channel();
        let log = Arc::new(Mutex::new(Vec::new()));
        let done_log = log.clone();

        drop(
            Handle::new(rx, "GET".into(), "/".into(), TransportMode::Standard)
                .done(move |_, _, _| done_log.lock().unwrap().push("done"))
                .always(move |_| {
                    let _ = finished_tx.send(());
                }),
        );

        tx.send(Outcome::Success {
            body: ResponseBody::Empty,
            headers: String::new(),
            exchange: exchange(200),
        })
        .unwrap();

        finished_rx.await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["done"]);
    }

    #[tokio::test]
    async fn resolved_handle_fires_callbacks_only_once() {
        let (tx, rx) = oneshot::channel();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = recording_handle(rx, log.clone());
        tx.send(Outcome::Failure { exchange: exchange(500) }).unwrap();

        handle.await;
        tokio::task::yield_now().await;
        assert_eq!(*log.lock().unwrap(), vec!["error", "always"]);
    }

    #[tokio::test]
    async fn detached_handle_still_fires_callbacks() {
        let (tx, rx) = oneshot::channel();
        let log = Arc::new(Mutex::new(Vec::new()));
        let task = recording_handle(rx, log.clone()).detach();

        tx.send(Outcome::Success {
            body: ResponseBody::Text("ok".into()),
            headers: String::new(),
            exchange: exchange(200),
        })
        .unwrap();

        let outcome = task.await.unwrap();
        assert_eq!(outcome.body().and_then(ResponseBody::as_text), Some("ok"));
        assert_eq!(*log.lock().unwrap(), vec!["done", "always"]);
    }
}
