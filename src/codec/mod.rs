//! Payload encoding and response decoding.

pub mod blob;
pub mod decoder;
pub mod encoder;

pub use blob::{Blob, BlobStore, parse_blob};
pub use decoder::{
    DecodeError, DecodeFailure, XmlDocument, XmlElement, XmlNode, parse_array_buffer,
    parse_json, parse_xml,
};
pub use encoder::{FormData, Payload, Value, encode, encode_component};
