//! Best-effort response decoders.
//!
//! None of these panic or bubble a library error upwards: a failure comes
//! back as a [`DecodeFailure`] pairing the error with the original input, so
//! callers always get their data back.

use std::fmt;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use mime::Mime;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

use crate::settings::Accepts;

/// MIME types accepted by [`parse_xml`].
pub const XML_MIME_TYPES: &[&str] = &[
    "application/xml",
    "text/xml",
    "application/xhtml+xml",
    "image/svg+xml",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid json at line {line}, column {column}: {message}")]
    Json {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("invalid xml: {0}")]
    Xml(String),
    #[error("unsupported mime type '{0}'")]
    UnsupportedMime(String),
    #[error("invalid mime type '{0}'")]
    InvalidMime(String),
}

/// A failed decode: the error plus the untouched input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure<T> {
    pub error: DecodeError,
    pub input: T,
}

impl<T> DecodeFailure<T> {
    fn new(error: DecodeError, input: T) -> Self {
        Self { error, input }
    }

    pub fn into_parts(self) -> (DecodeError, T) {
        (self.error, self.input)
    }
}

impl<T: fmt::Debug> fmt::Display for DecodeFailure<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl<T: fmt::Debug> std::error::Error for DecodeFailure<T> {}

/// Parse `text` as JSON.
pub fn parse_json(text: &str) -> Result<serde_json::Value, DecodeFailure<String>> {
    serde_json::from_str(text).map_err(|err| {
        DecodeFailure::new(
            DecodeError::Json {
                line: err.line(),
                column: err.column(),
                message: err.to_string(),
            },
            text.to_string(),
        )
    })
}

/// A node inside an [`XmlElement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, DecodeError> {
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(|err| DecodeError::Xml(err.to_string()))?;
            let value = attribute
                .unescape_value()
                .map_err(|err| DecodeError::Xml(err.to_string()))?;
            attributes.push((
                String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
                value.into_owned(),
            ));
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            children: Vec::new(),
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// First descendant (depth-first) named `name`, including `self`.
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        if self.name == name {
            return Some(self);
        }
        self.elements().find_map(|child| child.find(name))
    }

    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            match child {
                XmlNode::Text(text) => out.push_str(text),
                XmlNode::Element(element) => out.push_str(&element.text()),
            }
        }
        out
    }
}

/// Parsed XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub mime: String,
    pub root: XmlElement,
}

impl XmlDocument {
    pub fn find(&self, name: &str) -> Option<&XmlElement> {
        self.root.find(name)
    }
}

/// Parse `text` into an [`XmlDocument`].
///
/// Without an explicit `mime` the first entry of the default accepts table's
/// `xml` value is used.
pub fn parse_xml(text: &str, mime: Option<&str>) -> Result<XmlDocument, DecodeFailure<String>> {
    let accepts = Accepts::default();
    let mime = mime.unwrap_or_else(|| accepts.xml_mime());
    parse_xml_document(text, mime).map_err(|error| DecodeFailure::new(error, text.to_string()))
}

fn parse_xml_document(text: &str, mime: &str) -> Result<XmlDocument, DecodeError> {
    let essence = mime_essence(mime)?;
    if !XML_MIME_TYPES.contains(&essence.as_str()) {
        return Err(DecodeError::UnsupportedMime(mime.to_string()));
    }

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader.read_event().map_err(|err| {
            DecodeError::Xml(format!("{err} at position {}", reader.buffer_position()))
        })?;

        match event {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(DecodeError::Xml("content after document element".into()));
                }
                stack.push(XmlElement::from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = XmlElement::from_start(&start)?;
                close_element(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DecodeError::Xml("unexpected closing tag".into()))?;
                close_element(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let value = text.unescape().map_err(|err| DecodeError::Xml(err.to_string()))?;
                push_text(&mut stack, value.into_owned())?;
            }
            Event::CData(data) => {
                let value = String::from_utf8_lossy(&data.into_inner()).into_owned();
                push_text(&mut stack, value)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DecodeError::Xml("unclosed element at end of input".into()));
    }

    let root = root.ok_or_else(|| DecodeError::Xml("no document element".into()))?;
    Ok(XmlDocument {
        mime: essence,
        root,
    })
}

fn close_element(
    stack: &mut Vec<XmlElement>,
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(DecodeError::Xml("content after document element".into())),
    }
}

fn push_text(stack: &mut [XmlElement], text: String) -> Result<(), DecodeError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Text(text));
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(DecodeError::Xml("text outside document element".into())),
    }
}

pub(crate) fn mime_essence(mime: &str) -> Result<String, DecodeError> {
    let parsed: Mime = mime
        .trim()
        .parse()
        .map_err(|_| DecodeError::InvalidMime(mime.to_string()))?;
    Ok(parsed.essence_str().to_string())
}

/// Encode `bytes` as a `data:` URI.
pub fn parse_array_buffer(bytes: &[u8], mime: &str) -> Result<String, DecodeFailure<Bytes>> {
    let essence = mime_essence(mime)
        .map_err(|error| DecodeFailure::new(error, Bytes::copy_from_slice(bytes)))?;
    Ok(format!("data:{essence};base64,{}", STANDARD.encode(bytes)))
}
