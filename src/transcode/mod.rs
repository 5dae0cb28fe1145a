//! Payload Transcoding Module
//!
//! Converts a component tree into the textual payload that gets cached and
//! back again. Encoding and decoding both stream; a payload is the complete,
//! concatenated text of an encode stream.

mod decode;
mod encode;
mod manifest;
mod row;
mod tree;

use std::fmt;

use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use decode::{decode, decode_stream, payload_stream, DecodeMode, ManifestLoader, ModuleLoader};
pub use encode::{collect_payload, encode, render_to_payload, MAX_CHUNK_BYTES};
pub use manifest::{
    BundleManifest, ClientManifest, ClientReferenceEntry, ManifestRegistry, Manifests,
    ModuleLoading, SsrManifest, SsrModuleEntry, WHOLE_MODULE_EXPORT,
};
pub use row::ROW_TERMINATOR;
pub use tree::{escape_html, ClientNode, Element, Node, ResolvedModule};

/// Byte chunks of an encoded payload, in order.
pub type PayloadStream = BoxStream<'static, Result<Bytes, TranscodeError>>;

/// Transcoding failures. A failed transcode never yields a partial payload
/// or tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranscodeError {
    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("payload stream ended before the tree row was complete")]
    Truncated,

    #[error("client module could not be resolved: {0}")]
    UnresolvedModule(String),

    #[error("invalid UTF-8 in payload stream: {0}")]
    Utf8(String),

    #[error("failed to serialize tree: {0}")]
    Serialize(String),
}

/// Serialized render output: the complete text of an encode stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenderPayload(String);

impl RenderPayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for RenderPayload {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl fmt::Display for RenderPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
