//! Reqwest-based implementation of the [`Transport`] trait.
//!
//! Keeps two clients: one with a cookie store for credentialed exchanges and
//! one without, so `with_credentials` maps onto cookie inclusion.

use async_trait::async_trait;
use reqwest::Client;

use super::{
    Capabilities, Transport, TransportError, TransportRequest, TransportResponse,
    map_reqwest_error, read_response,
};

/// Standard, full-capability transport.
pub struct ReqwestTransport {
    anonymous: Client,
    credentialed: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let anonymous = Client::builder()
            .build()
            .map_err(|err| TransportError::Build(err.to_string()))?;
        let credentialed = Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|err| TransportError::Build(err.to_string()))?;

        Ok(Self {
            anonymous,
            credentialed,
        })
    }

    /// Wrap existing clients. `credentialed` should carry a cookie store.
    pub fn from_clients(anonymous: Client, credentialed: Client) -> Self {
        Self {
            anonymous,
            credentialed,
        }
    }

    fn client_for(&self, request: &TransportRequest) -> &Client {
        if request.with_credentials {
            &self.credentialed
        } else {
            &self.anonymous
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn capabilities(&self) -> Capabilities {
        Capabilities::STANDARD
    }

    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client_for(&request)
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone());

        if let Some(credentials) = request.credentials {
            builder = builder.basic_auth(credentials.username, credentials.password);
        }

        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        read_response(response).await
    }
}
