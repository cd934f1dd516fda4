//! Client configuration.
//!
//! [`AjaxConfig`] bundles the defaults table with the executor policies. It
//! can be built in code (usually through [`crate::AjaxBuilder`]) or loaded
//! from JSON with camelCase keys:
//!
//! ```json
//! {
//!   "location": "https://app.example.com/",
//!   "successRange": "allowRedirects",
//!   "retryExtension": 5000,
//!   "defaults": { "dataType": "xml", "timeout": 250, "contentType": false }
//! }
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use url::Url;

use crate::request::{ExecutorPolicy, SuccessRange};
use crate::settings::{
    Accepts, ContentType, DEFAULT_LOCATION, RequestSettings, ResponseType, Settings, merge,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid location '{0}': {1}")]
    InvalidLocation(String, url::ParseError),
}

/// Immutable configuration shared by every exchange of a client.
#[derive(Debug, Clone)]
pub struct AjaxConfig {
    pub defaults: Settings,
    pub location: Url,
    pub success_range: SuccessRange,
    pub process_cross_origin_data: bool,
    pub retry_extension: Duration,
    pub legacy_dispatch_delay: Duration,
}

impl Default for AjaxConfig {
    fn default() -> Self {
        let policy = ExecutorPolicy::default();
        Self {
            defaults: Settings::default(),
            location: default_location(),
            success_range: policy.success_range,
            process_cross_origin_data: policy.process_cross_origin_data,
            retry_extension: policy.retry_extension,
            legacy_dispatch_delay: policy.legacy_dispatch_delay,
        }
    }
}

impl AjaxConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = serde_json::from_str(json)?;
        file.into_config()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn policy(&self) -> ExecutorPolicy {
        ExecutorPolicy {
            success_range: self.success_range,
            process_cross_origin_data: self.process_cross_origin_data,
            retry_extension: self.retry_extension,
            legacy_dispatch_delay: self.legacy_dispatch_delay,
        }
    }

    /// Move the document location; the default URL follows it unless it was
    /// set to something else.
    pub fn set_location(&mut self, location: Url) {
        if self.defaults.url == self.location.as_str() {
            self.defaults.url = location.to_string();
        }
        self.location = location;
    }
}

fn default_location() -> Url {
    Url::parse(DEFAULT_LOCATION).expect("default location is a valid url")
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigFile {
    location: Option<String>,
    success_range: Option<SuccessRange>,
    process_cross_origin_data: Option<bool>,
    /// Milliseconds.
    retry_extension: Option<u64>,
    /// Milliseconds.
    legacy_dispatch_delay: Option<u64>,
    defaults: DefaultsFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DefaultsFile {
    accepts: Option<Accepts>,
    content_type: Option<ContentType>,
    #[serde(rename = "async")]
    async_mode: Option<bool>,
    method: Option<String>,
    /// Milliseconds.
    timeout: Option<u64>,
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    with_credentials: Option<bool>,
    data_type: Option<String>,
    data: Option<String>,
    process_data: Option<bool>,
    #[serde(deserialize_with = "ordered_headers")]
    headers: Option<Vec<(String, String)>>,
    cross_origin: Option<bool>,
    response_type: Option<ResponseType>,
}

/// Header objects keep their document order.
fn ordered_headers<'de, D>(deserializer: D) -> Result<Option<Vec<(String, String)>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct HeadersVisitor;

    impl<'de> Visitor<'de> for HeadersVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of header names to values")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut headers = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some(entry) = map.next_entry::<String, String>()? {
                headers.push(entry);
            }
            Ok(headers)
        }
    }

    deserializer.deserialize_map(HeadersVisitor).map(Some)
}

impl ConfigFile {
    fn into_config(self) -> Result<AjaxConfig, ConfigError> {
        let policy = ExecutorPolicy::default();
        let location = match self.location {
            Some(raw) => Url::parse(&raw).map_err(|err| ConfigError::InvalidLocation(raw, err))?,
            None => default_location(),
        };

        let mut base = Settings::default();
        base.url = location.to_string();

        Ok(AjaxConfig {
            defaults: merge(&self.defaults.into_overrides(), &base),
            location,
            success_range: self.success_range.unwrap_or(policy.success_range),
            process_cross_origin_data: self
                .process_cross_origin_data
                .unwrap_or(policy.process_cross_origin_data),
            retry_extension: self
                .retry_extension
                .map(Duration::from_millis)
                .unwrap_or(policy.retry_extension),
            legacy_dispatch_delay: self
                .legacy_dispatch_delay
                .map(Duration::from_millis)
                .unwrap_or(policy.legacy_dispatch_delay),
        })
    }
}

impl DefaultsFile {
    fn into_overrides(self) -> RequestSettings {
        RequestSettings {
            accepts: self.accepts,
            content_type: self.content_type,
            async_mode: self.async_mode,
            method: self.method,
            timeout: self.timeout.map(Duration::from_millis),
            url: self.url,
            username: self.username,
            password: self.password,
            with_credentials: self.with_credentials,
            data_type: self.data_type,
            data: self.data.map(Into::into),
            process_data: self.process_data,
            headers: self.headers,
            cross_origin: self.cross_origin,
            response_type: self.response_type,
        }
    }
}
