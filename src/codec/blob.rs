//! In-memory object URL registry.
//!
//! [`BlobStore::parse_blob`] wraps raw bytes into a [`Blob`] and hands back a
//! `blob:<origin>/<uuid>` reference that can later be resolved or revoked.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use uuid::Uuid;

use super::decoder::{DecodeFailure, mime_essence};

/// Immutable binary object with a content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub mime: String,
    pub data: Bytes,
}

impl Blob {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Cloneable handle to a shared blob registry.
#[derive(Debug, Clone)]
pub struct BlobStore {
    origin: String,
    blobs: Arc<Mutex<HashMap<String, Blob>>>,
}

impl BlobStore {
    /// `origin` is embedded in generated URLs; `None` renders as `null`.
    pub fn new(origin: Option<&str>) -> Self {
        Self {
            origin: origin.unwrap_or("null").trim_end_matches('/').to_string(),
            blobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Register `blob` and return its object URL.
    pub fn create_object_url(&self, blob: Blob) -> String {
        let url = format!("blob:{}/{}", self.origin, Uuid::new_v4());
        self.lock().insert(url.clone(), blob);
        url
    }

    /// Wrap `bytes` as a blob of type `mime` and return its object URL.
    pub fn parse_blob(&self, bytes: &[u8], mime: &str) -> Result<String, DecodeFailure<Bytes>> {
        let data = Bytes::copy_from_slice(bytes);
        match mime_essence(mime) {
            Ok(mime) => Ok(self.create_object_url(Blob { mime, data })),
            Err(error) => Err(DecodeFailure { error, input: data }),
        }
    }

    pub fn resolve(&self, url: &str) -> Option<Blob> {
        self.lock().get(url).cloned()
    }

    /// Drop the blob behind `url`. Returns whether it was registered.
    pub fn revoke(&self, url: &str) -> bool {
        self.lock().remove(url).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Blob>> {
        // A poisoned registry still holds consistent entries.
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for BlobStore {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Free-standing form of [`BlobStore::parse_blob`].
pub fn parse_blob(
    store: &BlobStore,
    bytes: &[u8],
    mime: &str,
) -> Result<String, DecodeFailure<Bytes>> {
    store.parse_blob(bytes, mime)
}
