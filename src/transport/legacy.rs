//! Reduced-capability cross-domain transport.
//!
//! Models the old cross-domain request object: it opens with method and URL
//! only, never sends credentials or cookies, has no native timeout and
//! ignores the requested response type.

use async_trait::async_trait;
use reqwest::Client;

use super::{
    Capabilities, Transport, TransportError, TransportRequest, TransportResponse,
    map_reqwest_error, read_response,
};

pub struct LegacyTransport {
    client: Client,
}

impl LegacyTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .build()
            .map_err(|err| TransportError::Build(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for LegacyTransport {
    fn capabilities(&self) -> Capabilities {
        Capabilities::LEGACY
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        if request.credentials.is_some() || request.with_credentials || request.timeout.is_some() {
            log::debug!("legacy transport ignores credentials and timeout for {}", request.url);
        }

        let mut builder = self
            .client
            .request(request.method, request.url.as_str())
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        read_response(response).await
    }
}
