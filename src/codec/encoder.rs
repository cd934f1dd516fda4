//! Form body encoding.
//!
//! Serialises a [`FormData`] mapping or sequence into
//! `application/x-www-form-urlencoded` text. Keys and values are escaped with
//! the same character set as `encodeURIComponent`; encoded spaces are then
//! rewritten from `%20` to `+`.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters left untouched by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A single form value.
#[derive(Clone, Default)]
pub enum Value {
    /// Encodes as the empty string.
    #[default]
    Null,
    Literal(String),
    /// Produced lazily, once per encode.
    Deferred(Arc<dyn Fn() -> String + Send + Sync>),
}

impl Value {
    pub fn deferred<F>(producer: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Self::Deferred(Arc::new(producer))
    }

    pub fn resolve(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Literal(value) => value.clone(),
            Self::Deferred(producer) => producer(),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Literal(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Literal(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

macro_rules! literal_from_display {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Literal(value.to_string())
                }
            }
        )*
    };
}

literal_from_display!(bool, i32, i64, u32, u64, usize, f64);

/// Structured payload eligible for form encoding.
#[derive(Debug, Clone)]
pub enum FormData {
    /// Key/value pairs in insertion order.
    Map(Vec<(String, Value)>),
    /// Positional values, encoded as `index=value`.
    Seq(Vec<Value>),
}

impl FormData {
    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn seq<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Seq(values.into_iter().map(Into::into).collect())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Map(entries) => entries.len(),
            Self::Seq(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// JSON rendition used when the payload is sent without form encoding.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Map(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), json_value(value)))
                    .collect(),
            ),
            Self::Seq(values) => serde_json::Value::Array(values.iter().map(json_value).collect()),
        }
    }
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        other => serde_json::Value::String(other.resolve()),
    }
}

/// Request payload.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Already a string; sent as-is.
    Text(String),
    /// Raw bytes; sent as-is.
    Bytes(Bytes),
    Form(FormData),
}

impl Payload {
    pub fn as_form(&self) -> Option<&FormData> {
        match self {
            Self::Form(form) => Some(form),
            _ => None,
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<FormData> for Payload {
    fn from(value: FormData) -> Self {
        Self::Form(value)
    }
}

/// Percent-encode one key or value the way `encodeURIComponent` does.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, URI_COMPONENT).to_string()
}

/// Encode `form` as `k=v` pairs joined by `&`.
pub fn encode(form: &FormData) -> String {
    let pairs: Vec<String> = match form {
        FormData::Seq(values) => values
            .iter()
            .enumerate()
            .map(|(index, value)| pair(&index.to_string(), &value.resolve()))
            .collect(),
        FormData::Map(entries) => entries
            .iter()
            .map(|(key, value)| pair(key, &value.resolve()))
            .collect(),
    };

    pairs.join("&").replace("%20", "+")
}

fn pair(key: &str, value: &str) -> String {
    format!("{}={}", encode_component(key), encode_component(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn encodes_map_in_insertion_order() {
        let form = FormData::map([("q", "a b"), ("page", "2")]);
        assert_eq!(encode(&form), "q=a+b&page=2");
    }

    #[test]
    fn encodes_sequence_by_position() {
        let form = FormData::seq(["x", "y z"]);
        assert_eq!(encode(&form), "0=x&1=y+z");
    }

    #[test]
    fn null_encodes_as_empty_string() {
        let form = FormData::map([("a", Value::Null), ("b", Value::from(None::<String>))]);
        assert_eq!(encode(&form), "a=&b=");
    }

    #[test]
    fn deferred_values_are_invoked_once_per_encode() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let form = FormData::map([(
            "token",
            Value::deferred(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                "abc".to_string()
            }),
        )]);

        assert_eq!(encode(&form), "token=abc");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn escapes_like_encode_uri_component() {
        assert_eq!(encode_component("a&b=c/d?"), "a%26b%3Dc%2Fd%3F");
        assert_eq!(encode_component("-_.!~*'()"), "-_.!~*'()");
        assert_eq!(encode_component("é"), "%C3%A9");
    }

    #[test]
    fn literal_percent_twenty_is_not_rewritten() {
        let form = FormData::map([("v", "%20")]);
        assert_eq!(encode(&form), "v=%2520");
    }

    #[test]
    fn json_rendition_resolves_values() {
        let form = FormData::map([("a", Value::from("1")), ("b", Value::Null)]);
        assert_eq!(form.to_json(), serde_json::json!({"a": "1", "b": null}));
    }

    proptest! {
        #[test]
        fn pair_count_matches_entry_count(
            entries in proptest::collection::vec(("\\PC{0,8}", "\\PC{0,8}"), 1..12)
        ) {
            let form = FormData::map(entries.clone());
            let encoded = encode(&form);
            prop_assert_eq!(encoded.split('&').count(), entries.len());
            prop_assert!(!encoded.contains("%20"));
            prop_assert!(!encoded.contains(' '));
        }
    }
}
