//! Data structures shared by the executor and the handle.

use bytes::Bytes;
use http::HeaderMap;
use serde::Deserialize;

use crate::codec::XmlDocument;
use crate::transport::TransportMode;

use super::executor::ExchangeError;

/// Status range treated as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuccessRange {
    /// `[200, 300)`
    #[default]
    Strict,
    /// `[200, 400)`
    AllowRedirects,
}

impl SuccessRange {
    pub fn contains(&self, status: u16) -> bool {
        match self {
            Self::Strict => (200..300).contains(&status),
            Self::AllowRedirects => (200..400).contains(&status),
        }
    }
}

/// Raw view of a finished exchange, passed to every callback.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub method: String,
    pub url: String,
    /// `0` when no response was received.
    pub status: u16,
    pub status_text: String,
    pub headers: HeaderMap,
    pub mode: TransportMode,
    /// Sends performed, including the timeout resend.
    pub attempts: u32,
    pub error: Option<ExchangeError>,
}

impl Exchange {
    pub(crate) fn failed(
        method: impl Into<String>,
        url: impl Into<String>,
        mode: TransportMode,
        attempts: u32,
        error: ExchangeError,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            status: 0,
            status_text: String::new(),
            headers: HeaderMap::new(),
            mode,
            attempts,
            error: Some(error),
        }
    }

    pub fn response_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Response headers as a `name: value\r\n` block.
    pub fn all_response_headers(&self) -> String {
        let mut block = String::new();
        for (name, value) in &self.headers {
            block.push_str(name.as_str());
            block.push_str(": ");
            block.push_str(&String::from_utf8_lossy(value.as_bytes()));
            block.push_str("\r\n");
        }
        block
    }
}

/// Decoded response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Empty,
    Text(String),
    Json(serde_json::Value),
    Document(XmlDocument),
    Bytes(Bytes),
}

impl ResponseBody {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&XmlDocument> {
        match self {
            Self::Document(document) => Some(document),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// The single terminal result of an exchange.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success {
        body: ResponseBody,
        headers: String,
        exchange: Exchange,
    },
    Failure {
        exchange: Exchange,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn exchange(&self) -> &Exchange {
        match self {
            Self::Success { exchange, .. } | Self::Failure { exchange } => exchange,
        }
    }

    pub fn body(&self) -> Option<&ResponseBody> {
        match self {
            Self::Success { body, .. } => Some(body),
            Self::Failure { .. } => None,
        }
    }
}
