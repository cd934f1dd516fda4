//! Request settings and the defaults table they are merged over.
//!
//! [`RequestSettings`] carries caller overrides, every field optional.
//! [`Settings`] is the fully resolved value; its `Default` impl is the fixed
//! defaults table. [`merge`] produces a fresh `Settings` per call and never
//! mutates either input.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::codec::encoder::Payload;

/// Default `Content-Type` applied to every exchange unless disabled.
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Fallback document location used to resolve relative URLs.
pub const DEFAULT_LOCATION: &str = "http://localhost/";

/// Requested decoding mode for the response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    #[default]
    #[serde(rename = "")]
    Default,
    ArrayBuffer,
    Blob,
    Document,
    Json,
    Text,
}

impl ResponseType {
    /// Map a response type name. Unrecognised names fall back to
    /// [`ResponseType::Default`].
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "arraybuffer" => Self::ArrayBuffer,
            "blob" => Self::Blob,
            "document" => Self::Document,
            "json" => Self::Json,
            "text" => Self::Text,
            _ => Self::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "",
            Self::ArrayBuffer => "arraybuffer",
            Self::Blob => "blob",
            Self::Document => "document",
            Self::Json => "json",
            Self::Text => "text",
        }
    }

    /// Binary response types suppress body encoding.
    pub fn is_binary(&self) -> bool {
        matches!(self, Self::ArrayBuffer | Self::Blob)
    }
}

impl<'de> Deserialize<'de> for ResponseType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// `Content-Type` header policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Value(String),
    /// Suppress the header entirely.
    Disabled,
}

impl Default for ContentType {
    fn default() -> Self {
        Self::Value(DEFAULT_CONTENT_TYPE.to_string())
    }
}

impl<'de> Deserialize<'de> for ContentType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Value(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(false) => Ok(Self::Disabled),
            Raw::Flag(true) => Ok(Self::default()),
            Raw::Value(value) => Ok(Self::Value(value)),
        }
    }
}

/// `dataType` -> `Accept` lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Accepts(BTreeMap<String, String>);

impl Accepts {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, data_type: impl Into<String>, accept: impl Into<String>) -> Self {
        self.0.insert(data_type.into(), accept.into());
        self
    }

    pub fn get(&self, data_type: &str) -> Option<&str> {
        self.0.get(data_type).map(String::as_str)
    }

    /// `Accept` value for `data_type`, falling back to the `*` entry.
    pub fn resolve(&self, data_type: &str) -> &str {
        self.get(data_type)
            .or_else(|| self.get("*"))
            .unwrap_or("*/*")
    }

    /// First MIME type listed under the `xml` entry.
    pub fn xml_mime(&self) -> &str {
        self.get("xml")
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or("application/xml")
    }
}

impl Default for Accepts {
    fn default() -> Self {
        Self::new()
            .with("*", "*/*")
            .with("text", "text/plain")
            .with("html", "text/html")
            .with("xml", "application/xml, text/xml")
            .with("json", "application/json, text/javascript")
    }
}

/// Fully resolved settings for one exchange.
#[derive(Debug, Clone)]
pub struct Settings {
    pub accepts: Accepts,
    pub content_type: ContentType,
    pub async_mode: bool,
    pub method: String,
    pub timeout: Duration,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub with_credentials: bool,
    pub data_type: String,
    pub data: Option<Payload>,
    pub process_data: bool,
    pub headers: Vec<(String, String)>,
    pub cross_origin: bool,
    pub response_type: ResponseType,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accepts: Accepts::default(),
            content_type: ContentType::default(),
            async_mode: true,
            method: "GET".to_string(),
            timeout: Duration::ZERO,
            url: DEFAULT_LOCATION.to_string(),
            username: None,
            password: None,
            with_credentials: false,
            data_type: "json".to_string(),
            data: None,
            process_data: true,
            headers: Vec::new(),
            cross_origin: false,
            response_type: ResponseType::Default,
        }
    }
}

impl Settings {
    /// Upper-cased method; an empty method means `GET`.
    pub fn normalized_method(&self) -> String {
        let method = self.method.trim().to_ascii_uppercase();
        if method.is_empty() {
            "GET".to_string()
        } else {
            method
        }
    }

    /// `Accept` header value for the configured `data_type`.
    pub fn accept(&self) -> &str {
        self.accepts.resolve(&self.data_type)
    }
}

/// Caller-supplied overrides. Unset fields fall back to the defaults table.
#[derive(Debug, Clone, Default)]
pub struct RequestSettings {
    pub accepts: Option<Accepts>,
    pub content_type: Option<ContentType>,
    pub async_mode: Option<bool>,
    pub method: Option<String>,
    pub timeout: Option<Duration>,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub with_credentials: Option<bool>,
    pub data_type: Option<String>,
    pub data: Option<Payload>,
    pub process_data: Option<bool>,
    pub headers: Option<Vec<(String, String)>>,
    pub cross_origin: Option<bool>,
    pub response_type: Option<ResponseType>,
}

impl RequestSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new().method("GET").url(url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new().method("POST").url(url)
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    pub fn accepts(mut self, accepts: Accepts) -> Self {
        self.accepts = Some(accepts);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Vec::new)
            .push((name.into(), value.into()));
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = Some(
            headers
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        );
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout_ms(self, millis: u64) -> Self {
        self.timeout(Duration::from_millis(millis))
    }

    pub fn async_mode(mut self, enabled: bool) -> Self {
        self.async_mode = Some(enabled);
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = Some(enabled);
        self
    }

    pub fn cross_origin(mut self, enabled: bool) -> Self {
        self.cross_origin = Some(enabled);
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(ContentType::Value(content_type.into()));
        self
    }

    pub fn without_content_type(mut self) -> Self {
        self.content_type = Some(ContentType::Disabled);
        self
    }

    pub fn process_data(mut self, enabled: bool) -> Self {
        self.process_data = Some(enabled);
        self
    }
}

/// Merge caller overrides over `defaults`.
///
/// A field the caller set always wins; everything else is taken from the
/// defaults. Nested values (headers, accepts) are replaced wholesale.
pub fn merge(overrides: &RequestSettings, defaults: &Settings) -> Settings {
    let overrides = overrides.clone();
    let defaults = defaults.clone();

    Settings {
        accepts: overrides.accepts.unwrap_or(defaults.accepts),
        content_type: overrides.content_type.unwrap_or(defaults.content_type),
        async_mode: overrides.async_mode.unwrap_or(defaults.async_mode),
        method: overrides.method.unwrap_or(defaults.method),
        timeout: overrides.timeout.unwrap_or(defaults.timeout),
        url: overrides.url.unwrap_or(defaults.url),
        username: overrides.username.or(defaults.username),
        password: overrides.password.or(defaults.password),
        with_credentials: overrides.with_credentials.unwrap_or(defaults.with_credentials),
        data_type: overrides.data_type.unwrap_or(defaults.data_type),
        data: overrides.data.or(defaults.data),
        process_data: overrides.process_data.unwrap_or(defaults.process_data),
        headers: overrides.headers.unwrap_or(defaults.headers),
        cross_origin: overrides.cross_origin.unwrap_or(defaults.cross_origin),
        response_type: overrides.response_type.unwrap_or(defaults.response_type),
    }
}
