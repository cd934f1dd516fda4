//! Client entry point.
//!
//! Wires the configuration, the transports, the blob registry and the event
//! dispatcher together and exposes [`Ajax::ajax`], which dispatches one
//! exchange and hands back its [`Handle`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use url::Url;

use crate::codec::{BlobStore, DecodeFailure, Payload};
use crate::config::{AjaxConfig, ConfigError};
use crate::modules::events::{EventDispatcher, EventHandler, LoggingHandler};
use crate::request::{Executor, Handle, SuccessRange};
use crate::settings::{RequestSettings, Settings};
use crate::transport::{ReqwestTransport, Transport, TransportError};

/// Result alias used by the client layer.
pub type AjaxResult<T> = Result<T, AjaxError>;

/// Errors raised while building a client. Exchange failures never surface
/// here; they are delivered through the handle's `error` callback.
#[derive(Debug, Error)]
pub enum AjaxError {
	#[error("transport error: {0}")]
	Transport(#[from] TransportError),
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),
}

/// Fluent builder for [`Ajax`].
pub struct AjaxBuilder {
	config: AjaxConfig,
	transport: Option<Arc<dyn Transport>>,
	legacy_transport: Option<Arc<dyn Transport>>,
	handlers: Vec<Arc<dyn EventHandler>>,
	logging: bool,
}

impl AjaxBuilder {
	pub fn new() -> Self {
		Self {
			config: AjaxConfig::default(),
			transport: None,
			legacy_transport: None,
			handlers: Vec::new(),
			logging: true,
		}
	}

	/// Replace the whole configuration, e.g. one loaded from JSON.
	pub fn with_config(mut self, config: AjaxConfig) -> Self {
		self.config = config;
		self
	}

	pub fn with_defaults(mut self, defaults: Settings) -> Self {
		self.config.defaults = defaults;
		self
	}

	/// Document location relative URLs resolve against.
	pub fn with_location(mut self, location: Url) -> Self {
		self.config.set_location(location);
		self
	}

	pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.transport = Some(transport);
		self
	}

	/// Reduced-capability transport used for cross-origin exchanges when the
	/// standard transport cannot carry credentials.
	pub fn with_legacy_transport(mut self, transport: Arc<dyn Transport>) -> Self {
		self.legacy_transport = Some(transport);
		self
	}

	pub fn with_success_range(mut self, range: SuccessRange) -> Self {
		self.config.success_range = range;
		self
	}

	pub fn process_cross_origin_data(mut self, enabled: bool) -> Self {
		self.config.process_cross_origin_data = enabled;
		self
	}

	pub fn with_retry_extension(mut self, extension: Duration) -> Self {
		self.config.retry_extension = extension;
		self
	}

	pub fn with_legacy_dispatch_delay(mut self, delay: Duration) -> Self {
		self.config.legacy_dispatch_delay = delay;
		self
	}

	pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
		self.handlers.push(handler);
		self
	}

	/// Skip the default [`LoggingHandler`].
	pub fn disable_logging(mut self) -> Self {
		self.logging = false;
		self
	}

	pub fn build(self) -> AjaxResult<Ajax> {
		let transport = match self.transport {
			Some(transport) => transport,
			None => Arc::new(ReqwestTransport::new()?),
		};

		let mut events = EventDispatcher::new();
		if self.logging {
			events.register_handler(Arc::new(LoggingHandler));
		}
		for handler in self.handlers {
			events.register_handler(handler);
		}

		Ok(Ajax::assemble(
			self.config,
			transport,
			self.legacy_transport,
			Arc::new(events),
		))
	}
}

impl Default for AjaxBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Request helper. Holds only immutable configuration and the blob registry,
/// so one instance can serve any number of concurrent exchanges.
pub struct Ajax {
	config: Arc<AjaxConfig>,
	executor: Executor,
	blobs: BlobStore,
	events: Arc<EventDispatcher>,
}

impl Ajax {
	/// Construct a client with the default configuration and transport.
	pub fn new() -> AjaxResult<Self> {
		Self::builder().build()
	}

	pub fn builder() -> AjaxBuilder {
		AjaxBuilder::new()
	}

	/// Construct a client from a JSON configuration file.
	pub fn from_config_file(path: impl AsRef<Path>) -> AjaxResult<Self> {
		let config = AjaxConfig::from_json_file(path)?;
		Self::builder().with_config(config).build()
	}

	fn assemble(
		config: AjaxConfig,
		transport: Arc<dyn Transport>,
		legacy_transport: Option<Arc<dyn Transport>>,
		events: Arc<EventDispatcher>,
	) -> Self {
		let origin = config.location.origin().ascii_serialization();
		let executor = Executor::new(
			transport,
			legacy_transport,
			config.defaults.clone(),
			config.location.clone(),
			config.policy(),
			events.clone(),
		);

		log::debug!(
			"ajax client ready (location {}, {} event handler(s))",
			config.location,
			events.len()
		);

		Self {
			config: Arc::new(config),
			executor,
			blobs: BlobStore::new(Some(&origin)),
			events,
		}
	}

	/// Dispatch one exchange. Returns immediately; register callbacks on the
	/// handle and await it (or [`Handle::detach`] it) to deliver the outcome.
	///
	/// Must be called from within a tokio runtime.
	pub fn ajax(&self, settings: &RequestSettings) -> Handle {
		self.executor.execute(settings)
	}

	pub fn get(&self, url: impl Into<String>) -> Handle {
		self.ajax(&RequestSettings::get(url))
	}

	pub fn post(&self, url: impl Into<String>, data: impl Into<Payload>) -> Handle {
		self.ajax(&RequestSettings::post(url).data(data))
	}

	pub fn config(&self) -> &AjaxConfig {
		&self.config
	}

	pub fn events(&self) -> &EventDispatcher {
		&self.events
	}

	/// Object URL registry scoped to this client's origin.
	pub fn blobs(&self) -> &BlobStore {
		&self.blobs
	}

	/// Register `bytes` in this client's blob registry.
	pub fn parse_blob(&self, bytes: &[u8], mime: &str) -> Result<String, DecodeFailure<Bytes>> {
		self.blobs.parse_blob(bytes, mime)
	}
}
