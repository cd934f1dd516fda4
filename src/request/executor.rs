//! Request execution.
//!
//! Turns merged settings into a [`TransportRequest`], picks the transport,
//! arms the timeout and drives the exchange to its single terminal
//! [`Outcome`].
//!
//! Execution steps:
//! 1. Merge the caller's settings over the defaults.
//! 2. Encode the payload when it is form data and encoding applies.
//! 3. Choose the standard or the legacy transport.
//! 4. Fold the payload into the query string for `GET`.
//! 5. Build the request (method, URL, credentials, response type, headers).
//! 6. Send, resending once with an extended timeout if the first send times
//!    out, then classify the response against the success range.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderName, HeaderValue, Method};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::time::sleep;
use url::Url;

use super::handle::Handle;
use super::types::{Exchange, Outcome, ResponseBody, SuccessRange};
use crate::codec::decoder::{XML_MIME_TYPES, mime_essence, parse_json, parse_xml};
use crate::codec::encoder::{Payload, encode};
use crate::modules::events::{
    AjaxEvent, CompleteEvent, DispatchEvent, EventDispatcher, FailureEvent, RetryEvent,
};
use crate::settings::{ContentType, RequestSettings, ResponseType, Settings, merge};
use crate::transport::{
    Capabilities, Credentials, Transport, TransportError, TransportMode, TransportRequest,
    TransportResponse,
};

/// Why an exchange produced no usable response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    #[error("invalid method '{0}'")]
    InvalidMethod(String),
    #[error("invalid url '{0}': {1}")]
    InvalidUrl(String, String),
    #[error("invalid header '{0}'")]
    InvalidHeader(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("exchange aborted before completion")]
    Aborted,
}

/// Tunable executor behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorPolicy {
    pub success_range: SuccessRange,
    /// Encode form payloads on cross-origin exchanges too.
    pub process_cross_origin_data: bool,
    /// Added to the timeout for the single resend.
    pub retry_extension: Duration,
    /// Wait before a legacy transport sends.
    pub legacy_dispatch_delay: Duration,
}

impl Default for ExecutorPolicy {
    fn default() -> Self {
        Self {
            success_range: SuccessRange::Strict,
            process_cross_origin_data: true,
            retry_extension: Duration::from_millis(5000),
            legacy_dispatch_delay: Duration::from_millis(4),
        }
    }
}

/// Timeout enforcement chosen for an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    None,
    /// Enforced by the transport.
    Native(Duration),
    /// Enforced around the send by the executor.
    External(Duration),
}

impl Timer {
    fn extended(self, by: Duration) -> Self {
        match self {
            Self::None => Self::None,
            Self::Native(timeout) => Self::Native(timeout.saturating_add(by)),
            Self::External(timeout) => Self::External(timeout.saturating_add(by)),
        }
    }

    fn duration(&self) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Native(timeout) | Self::External(timeout) => Some(*timeout),
        }
    }
}

struct Lane {
    transport: Arc<dyn Transport>,
    capabilities: Capabilities,
}

impl Lane {
    fn new(transport: Arc<dyn Transport>) -> Self {
        let capabilities = transport.capabilities();
        Self {
            transport,
            capabilities,
        }
    }
}

/// Builds and dispatches exchanges. Cheap to share behind an `Arc`.
pub struct Executor {
    standard: Lane,
    legacy: Option<Lane>,
    defaults: Arc<Settings>,
    location: Url,
    policy: ExecutorPolicy,
    events: Arc<EventDispatcher>,
}

impl Executor {
    /// Capabilities of both transports are read here, once.
    pub fn new(
        standard: Arc<dyn Transport>,
        legacy: Option<Arc<dyn Transport>>,
        defaults: Settings,
        location: Url,
        policy: ExecutorPolicy,
        events: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            standard: Lane::new(standard),
            legacy: legacy.map(Lane::new),
            defaults: Arc::new(defaults),
            location,
            policy,
            events,
        }
    }

    pub fn defaults(&self) -> &Settings {
        &self.defaults
    }

    pub fn policy(&self) -> &ExecutorPolicy {
        &self.policy
    }

    /// Dispatch one exchange and return its handle immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn execute(&self, overrides: &RequestSettings) -> Handle {
        let settings = merge(overrides, &self.defaults);
        let (sender, receiver) = oneshot::channel();

        match self.prepare(settings) {
            Ok(prepared) => {
                let handle = Handle::new(
                    receiver,
                    prepared.request.method.to_string(),
                    prepared.request.url.to_string(),
                    prepared.mode,
                );
                tokio::spawn(async move {
                    let outcome = prepared.run().await;
                    let _ = sender.send(outcome);
                });
                handle
            }
            Err(failure) => {
                let exchange = failure.into_exchange();
                self.events.dispatch(AjaxEvent::Failure(FailureEvent {
                    url: exchange.url.clone(),
                    error: exchange
                        .error
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    timestamp: chrono::Utc::now(),
                }));
                let handle = Handle::new(
                    receiver,
                    exchange.method.clone(),
                    exchange.url.clone(),
                    exchange.mode,
                );
                let _ = sender.send(Outcome::Failure { exchange });
                handle
            }
        }
    }

    fn select_lane(&self, settings: &Settings) -> (&Lane, TransportMode) {
        if settings.cross_origin && !self.standard.capabilities.credentials {
            if let Some(legacy) = &self.legacy {
                return (legacy, TransportMode::Legacy);
            }
        }
        (&self.standard, TransportMode::Standard)
    }

    fn prepare(&self, settings: Settings) -> Result<Prepared, SetupFailure> {
        let method_name = settings.normalized_method();
        let (lane, mode) = self.select_lane(&settings);
        let capabilities = lane.capabilities;
        let fail = |error: ExchangeError, url: &str| SetupFailure {
            method: method_name.clone(),
            url: url.to_string(),
            mode,
            error,
        };

        let body = self.encode_body(&settings);

        let is_get = method_name == "GET";
        let raw_url = if is_get {
            fold_query(&settings.url, body.as_deref())
        } else {
            settings.url.clone()
        };

        let url = self.location.join(&raw_url).map_err(|err| {
            fail(
                ExchangeError::InvalidUrl(raw_url.clone(), err.to_string()),
                &raw_url,
            )
        })?;

        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| fail(ExchangeError::InvalidMethod(method_name.clone()), url.as_str()))?;

        let mut request = TransportRequest::new(method, url.clone());
        if mode == TransportMode::Standard && capabilities.credentials {
            request.with_credentials = settings.with_credentials;
            request.credentials = settings.username.clone().map(|username| Credentials {
                username,
                password: settings.password.clone(),
            });
        }

        if capabilities.response_type && settings.response_type != ResponseType::Default {
            request.response_type = Some(settings.response_type);
        }

        request.headers = build_headers(&settings).map_err(|error| fail(error, url.as_str()))?;

        if !is_get {
            request.body = body;
        }

        let timer = if settings.timeout.is_zero() {
            Timer::None
        } else if mode == TransportMode::Standard
            && capabilities.native_timeout
            && settings.async_mode
        {
            Timer::Native(settings.timeout)
        } else {
            Timer::External(settings.timeout)
        };

        if mode == TransportMode::Legacy && !settings.async_mode {
            log::warn!("legacy transport cannot run synchronously; {url} is sent asynchronously");
        }

        Ok(Prepared {
            transport: lane.transport.clone(),
            capabilities,
            mode,
            request,
            timer,
            response_type: settings.response_type,
            xml_mime: settings.accepts.xml_mime().to_string(),
            data_type: settings.data_type,
            policy: self.policy,
            events: self.events.clone(),
        })
    }

    fn encode_body(&self, settings: &Settings) -> Option<Bytes> {
        let skip_cross_origin = settings.cross_origin && !self.policy.process_cross_origin_data;

        match settings.data.as_ref()? {
            Payload::Text(text) => Some(Bytes::from(text.clone())),
            Payload::Bytes(bytes) => Some(bytes.clone()),
            Payload::Form(form) => {
                let encodable = settings.process_data
                    && !settings.response_type.is_binary()
                    && !skip_cross_origin;
                if encodable {
                    Some(Bytes::from(encode(form)))
                } else {
                    Some(Bytes::from(form.to_json().to_string()))
                }
            }
        }
    }
}

/// Append the separator and the encoded body to a `GET` URL. The separator
/// is added even when there is no body.
fn fold_query(url: &str, body: Option<&[u8]>) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    let mut folded = String::with_capacity(url.len() + 1);
    folded.push_str(url);
    folded.push(separator);
    if let Some(body) = body {
        folded.push_str(&String::from_utf8_lossy(body));
    }
    folded
}

fn build_headers(settings: &Settings) -> Result<http::HeaderMap, ExchangeError> {
    let mut headers = http::HeaderMap::new();

    if let ContentType::Value(content_type) = &settings.content_type {
        headers.insert(CONTENT_TYPE, header_value(CONTENT_TYPE.as_str(), content_type)?);
    }
    headers.insert(ACCEPT, header_value(ACCEPT.as_str(), settings.accept())?);
    headers.insert(
        HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    );

    for (name, value) in &settings.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ExchangeError::InvalidHeader(name.clone()))?;
        headers.insert(header_name, header_value(name, value)?);
    }

    Ok(headers)
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, ExchangeError> {
    HeaderValue::from_str(value).map_err(|_| ExchangeError::InvalidHeader(name.to_string()))
}

struct SetupFailure {
    method: String,
    url: String,
    mode: TransportMode,
    error: ExchangeError,
}

impl SetupFailure {
    fn into_exchange(self) -> Exchange {
        Exchange::failed(self.method, self.url, self.mode, 0, self.error)
    }
}

/// A fully configured exchange waiting to be sent.
struct Prepared {
    transport: Arc<dyn Transport>,
    capabilities: Capabilities,
    mode: TransportMode,
    request: TransportRequest,
    timer: Timer,
    response_type: ResponseType,
    /// Document MIME type used when the response does not name an XML one.
    xml_mime: String,
    data_type: String,
    policy: ExecutorPolicy,
    events: Arc<EventDispatcher>,
}

impl Prepared {
    async fn run(self) -> Outcome {
        if self.mode == TransportMode::Legacy && !self.policy.legacy_dispatch_delay.is_zero() {
            sleep(self.policy.legacy_dispatch_delay).await;
        }

        let mut timer = self.timer;
        let mut attempt = 1u32;

        loop {
            self.events.dispatch(AjaxEvent::Dispatch(DispatchEvent {
                url: self.request.url.to_string(),
                method: self.request.method.clone(),
                mode: self.mode,
                attempt,
                timestamp: chrono::Utc::now(),
            }));

            let started = Instant::now();
            match self.send_once(timer).await {
                Ok(response) => return self.complete(response, attempt, started.elapsed()),
                Err(TransportError::Timeout)
                    if attempt == 1
                        && self.mode == TransportMode::Standard
                        && timer != Timer::None =>
                {
                    timer = timer.extended(self.policy.retry_extension);
                    self.events.dispatch(AjaxEvent::Retry(RetryEvent {
                        url: self.request.url.to_string(),
                        method: self.request.method.clone(),
                        timeout: timer.duration().unwrap_or_default(),
                        timestamp: chrono::Utc::now(),
                    }));
                    attempt += 1;
                }
                Err(error) => return self.fail(error, attempt),
            }
        }
    }

    async fn send_once(&self, timer: Timer) -> Result<TransportResponse, TransportError> {
        let mut request = self.request.clone();
        match timer {
            Timer::None => self.transport.send(request).await,
            Timer::Native(timeout) => {
                request.timeout = Some(timeout);
                self.transport.send(request).await
            }
            Timer::External(timeout) => {
                tokio::time::timeout(timeout, self.transport.send(request))
                    .await
                    .map_err(|_| TransportError::Timeout)?
            }
        }
    }

    fn complete(&self, response: TransportResponse, attempts: u32, latency: Duration) -> Outcome {
        let success = self.policy.success_range.contains(response.status);
        self.events.dispatch(AjaxEvent::Complete(CompleteEvent {
            url: response.url.to_string(),
            method: self.request.method.clone(),
            status: response.status,
            success,
            latency,
            timestamp: chrono::Utc::now(),
        }));

        let body = success.then(|| self.extract_body(&response));
        let exchange = Exchange {
            method: self.request.method.to_string(),
            url: response.url.to_string(),
            status: response.status,
            status_text: response.status_text,
            headers: response.headers,
            mode: self.mode,
            attempts,
            error: None,
        };

        match body {
            Some(body) => Outcome::Success {
                headers: exchange.all_response_headers(),
                body,
                exchange,
            },
            None => Outcome::Failure { exchange },
        }
    }

    fn fail(&self, error: TransportError, attempts: u32) -> Outcome {
        self.events.dispatch(AjaxEvent::Failure(FailureEvent {
            url: self.request.url.to_string(),
            error: error.to_string(),
            timestamp: chrono::Utc::now(),
        }));

        Outcome::Failure {
            exchange: Exchange::failed(
                self.request.method.to_string(),
                self.request.url.to_string(),
                self.mode,
                attempts,
                error.into(),
            ),
        }
    }

    fn extract_body(&self, response: &TransportResponse) -> ResponseBody {
        let response_type = if self.capabilities.response_type {
            self.response_type
        } else {
            ResponseType::Default
        };
        decode_body(response, response_type, &self.data_type, &self.xml_mime)
    }
}

/// Pick the payload representation for a successful response.
///
/// Explicit response types decode strictly. The default response type keeps
/// text unless the content type is XML or `data_type` asks for JSON or XML
/// and the body parses as such. Documents take the response's XML content
/// type, or `default_xml_mime` when it has none.
fn decode_body(
    response: &TransportResponse,
    response_type: ResponseType,
    data_type: &str,
    default_xml_mime: &str,
) -> ResponseBody {
    if response.body.is_empty() && !response_type.is_binary() {
        return ResponseBody::Empty;
    }

    let xml_mime = response_xml_mime(response);
    let document_mime = xml_mime.as_deref().unwrap_or(default_xml_mime);
    let text = || String::from_utf8_lossy(&response.body).into_owned();

    match response_type {
        ResponseType::ArrayBuffer | ResponseType::Blob => {
            ResponseBody::Bytes(response.body.clone())
        }
        ResponseType::Text => ResponseBody::Text(text()),
        ResponseType::Json => parse_json(&text())
            .map(ResponseBody::Json)
            .unwrap_or(ResponseBody::Empty),
        ResponseType::Document => parse_xml(&text(), Some(document_mime))
            .map(ResponseBody::Document)
            .unwrap_or(ResponseBody::Empty),
        ResponseType::Default => {
            let text = text();
            if xml_mime.is_some() || data_type == "xml" {
                if let Ok(document) = parse_xml(&text, Some(document_mime)) {
                    return ResponseBody::Document(document);
                }
            } else if data_type == "json" {
                if let Ok(value) = parse_json(&text) {
                    return ResponseBody::Json(value);
                }
            }
            ResponseBody::Text(text)
        }
    }
}

fn response_xml_mime(response: &TransportResponse) -> Option<String> {
    let content_type = response.headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let essence = mime_essence(content_type).ok()?;
    XML_MIME_TYPES
        .contains(&essence.as_str())
        .then_some(essence)
}
