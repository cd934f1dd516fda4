//! # ajaxify-rs
//!
//! A chainable HTTP request helper in the spirit of the classic `$.ajax`:
//! one call merges per-request settings over a defaults table, encodes the
//! payload, picks a transport and hands back a handle on which `done`,
//! `error` and `always` callbacks are registered.
//!
//! ## Features
//!
//! - Exactly one terminal outcome per exchange, delivered `done`/`error` then `always`
//! - Form payloads encoded like `encodeURIComponent`, folded into the query for `GET`
//! - Best-effort JSON, XML, blob and data-URI decoders that never panic
//! - Standard and reduced-capability legacy transports chosen by capability
//! - Single timeout resend with an extended window
//! - Lifecycle events routed through the `log` facade
//!
//! ## Example
//!
//! ```no_run
//! use ajaxify_rs::{Ajax, FormData, RequestSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ajax = Ajax::new()?;
//!     let settings = RequestSettings::get("https://example.com/search")
//!         .data(FormData::map([("q", "rust http")]));
//!
//!     ajax.ajax(&settings)
//!         .done(|body, _headers, exchange| println!("{}: {:?}", exchange.status, body))
//!         .error(|exchange| eprintln!("failed with {}", exchange.status))
//!         .always(|_| println!("finished"))
//!         .await;
//!     Ok(())
//! }
//! ```

mod ajax;
mod each;

pub mod codec;
pub mod config;
pub mod modules;
pub mod request;
pub mod settings;
pub mod transport;

pub use crate::ajax::{Ajax, AjaxBuilder, AjaxError, AjaxResult};
pub use crate::each::{Entries, Flow, each};

pub use crate::codec::{
    Blob, BlobStore, DecodeError, DecodeFailure, FormData, Payload, Value, XmlDocument,
    XmlElement, XmlNode, encode, encode_component, parse_array_buffer, parse_blob, parse_json,
    parse_xml,
};

pub use crate::config::{AjaxConfig, ConfigError};

pub use crate::modules::{
    AjaxEvent, CompleteEvent, DispatchEvent, EventDispatcher, EventHandler, FailureEvent,
    LoggingHandler, RetryEvent,
};

pub use crate::request::{
    CallbackRegistry, ExchangeError, Exchange, Executor, ExecutorPolicy, Handle, Outcome,
    ResponseBody, SuccessRange,
};

pub use crate::settings::{
    Accepts, ContentType, DEFAULT_CONTENT_TYPE, DEFAULT_LOCATION, RequestSettings, ResponseType,
    Settings, merge,
};

pub use crate::transport::{
    Capabilities, Credentials, LegacyTransport, ReqwestTransport, Transport, TransportError,
    TransportMode, TransportRequest, TransportResponse,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
