//! Transport abstraction.
//!
//! A [`Transport`] performs one HTTP exchange. Implementations advertise
//! what they support through [`Capabilities`]; the executor reads those once
//! when the client is built and adapts the request accordingly instead of
//! probing the transport at dispatch time.

pub mod legacy;
pub mod reqwest_client;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method};
use thiserror::Error;
use url::Url;

use crate::settings::ResponseType;

pub use legacy::LegacyTransport;
pub use reqwest_client::ReqwestTransport;

/// Feature set exposed by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Honors `with_credentials` and basic-auth credentials.
    pub credentials: bool,
    /// Enforces `TransportRequest::timeout` itself.
    pub native_timeout: bool,
    /// Accepts a requested response type.
    pub response_type: bool,
}

impl Capabilities {
    pub const STANDARD: Self = Self {
        credentials: true,
        native_timeout: true,
        response_type: true,
    };

    pub const LEGACY: Self = Self {
        credentials: false,
        native_timeout: false,
        response_type: false,
    };
}

/// Whether an exchange runs on the standard or the legacy transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Standard,
    Legacy,
}

/// Basic-auth pair passed on open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: Option<String>,
}

/// Fully prepared request handed to a transport.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub credentials: Option<Credentials>,
    pub with_credentials: bool,
    pub timeout: Option<Duration>,
    pub response_type: Option<ResponseType>,
}

impl TransportRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            credentials: None,
            with_credentials: false,
            timeout: None,
            response_type: None,
        }
    }
}

/// Completed exchange as reported by a transport.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("transport setup failed: {0}")]
    Build(String),
}

/// A single-exchange HTTP transport.
#[async_trait]
pub trait Transport: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(err.to_string())
    }
}

pub(crate) async fn read_response(
    response: reqwest::Response,
) -> Result<TransportResponse, TransportError> {
    let status = response.status();
    let url = response.url().clone();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(map_reqwest_error)?;

    Ok(TransportResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        url,
        headers,
        body,
    })
}
