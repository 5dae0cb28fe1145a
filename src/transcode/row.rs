//! Payload Row Format
//!
//! A payload is a sequence of newline-terminated rows, `<id>:<tag><json>`:
//!
//! - `I` rows import a client module under a numeric id.
//! - The single `J` row (id 0) carries the tree; client nodes point at
//!   import ids, so every import row precedes the tree row.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transcode::TranscodeError;

pub const ROW_TERMINATOR: char = '\n';
pub const ROOT_ROW_ID: u32 = 0;

const IMPORT_TAG: char = 'I';
const MODEL_TAG: char = 'J';

/// Module import carried by an `I` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    /// Reference key the tree used
    pub key: String,
    pub id: String,
    pub chunks: Vec<String>,
    pub name: String,
}

/// Serialized tree node inside the `J` row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "lowercase")]
pub enum WireNode {
    Text {
        v: String,
    },
    El {
        tag: String,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attrs: BTreeMap<String, String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<WireNode>,
    },
    Frag {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<WireNode>,
    },
    Client {
        /// Import row id
        r: u32,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        props: BTreeMap<String, Value>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        children: Vec<WireNode>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Import { id: u32, import: ImportRow },
    Model { id: u32, node: WireNode },
}

impl Row {
    /// Serializes the row including its terminator.
    pub fn to_line(&self) -> Result<String, TranscodeError> {
        let (id, tag, body) = match self {
            Row::Import { id, import } => (*id, IMPORT_TAG, serde_json::to_string(import)),
            Row::Model { id, node } => (*id, MODEL_TAG, serde_json::to_string(node)),
        };
        let body = body.map_err(|e| TranscodeError::Serialize(e.to_string()))?;
        Ok(format!("{}:{}{}{}", id, tag, body, ROW_TERMINATOR))
    }

    /// Parses one row without its terminator.
    pub fn parse(line: &str) -> Result<Self, TranscodeError> {
        let (id, rest) = line
            .split_once(':')
            .ok_or_else(|| TranscodeError::Malformed(format!("row without id: {:?}", excerpt(line))))?;
        let id: u32 = id
            .parse()
            .map_err(|_| TranscodeError::Malformed(format!("invalid row id {:?}", excerpt(id))))?;

        let mut chars = rest.chars();
        let tag = chars.next();
        let body = chars.as_str();
        let malformed = |e: serde_json::Error| TranscodeError::Malformed(format!("row {}: {}", id, e));

        match tag {
            Some(IMPORT_TAG) => Ok(Row::Import {
                id,
                import: serde_json::from_str(body).map_err(malformed)?,
            }),
            Some(MODEL_TAG) => Ok(Row::Model {
                id,
                node: serde_json::from_str(body).map_err(malformed)?,
            }),
            other => Err(TranscodeError::Malformed(format!(
                "row {} has unknown tag {:?}",
                id, other
            ))),
        }
    }
}

fn excerpt(text: &str) -> String {
    text.chars().take(32).collect()
}

// == Text Buffer ==
/// Incremental UTF-8 decoder over byte chunks.
///
/// Multi-byte sequences split across chunks are held back until complete;
/// chunks are appended strictly in arrival order.
#[derive(Debug, Default)]
pub struct TextBuffer {
    text: String,
    pending: Vec<u8>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Result<(), TranscodeError> {
        self.pending.extend_from_slice(chunk);
        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // Incomplete sequence at the end: keep the tail for the next chunk
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(TranscodeError::Utf8(e.to_string())),
        };
        let decoded = std::str::from_utf8(&self.pending[..valid])
            .map_err(|e| TranscodeError::Utf8(e.to_string()))?;
        self.text.push_str(decoded);
        self.pending.drain(..valid);
        Ok(())
    }

    /// Removes and returns every complete row decoded so far.
    pub fn take_lines(&mut self) -> Vec<String> {
        let Some(last) = self.text.rfind(ROW_TERMINATOR) else {
            return Vec::new();
        };
        let rest = self.text.split_off(last + ROW_TERMINATOR.len_utf8());
        let complete = std::mem::replace(&mut self.text, rest);
        complete
            .split_terminator(ROW_TERMINATOR)
            .map(str::to_string)
            .collect()
    }

    /// Ends the stream. Fails if a multi-byte sequence was cut off.
    pub fn finish(self) -> Result<String, TranscodeError> {
        if !self.pending.is_empty() {
            return Err(TranscodeError::Utf8(format!(
                "stream ended inside a {}-byte partial sequence",
                self.pending.len()
            )));
        }
        Ok(self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_row_line() {
        let row = Row::Import {
            id: 1,
            import: ImportRow {
                key: "counter".to_string(),
                id: "7".to_string(),
                chunks: vec!["7.js".to_string()],
                name: "Counter".to_string(),
            },
        };
        let line = row.to_line().unwrap();
        assert!(line.starts_with("1:I{"));
        assert!(line.ends_with('\n'));
        assert_eq!(Row::parse(line.trim_end()).unwrap(), row);
    }

    #[test]
    fn test_model_row_escapes_newlines() {
        let row = Row::Model {
            id: ROOT_ROW_ID,
            node: WireNode::Text {
                v: "line one\nline two".to_string(),
            },
        };
        let line = row.to_line().unwrap();
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Row::parse("garbage"), Err(TranscodeError::Malformed(_))));
        assert!(matches!(Row::parse("x:J{}"), Err(TranscodeError::Malformed(_))));
        assert!(matches!(Row::parse("0:Q{}"), Err(TranscodeError::Malformed(_))));
        assert!(matches!(Row::parse("0:J{\"t\":"), Err(TranscodeError::Malformed(_))));
    }

    #[test]
    fn test_text_buffer_split_multibyte() {
        let bytes = "héllo\n".as_bytes();
        let mut buffer = TextBuffer::new();
        // Split inside the two-byte 'é'
        buffer.push(&bytes[..2]).unwrap();
        buffer.push(&bytes[2..]).unwrap();
        assert_eq!(buffer.take_lines(), vec!["héllo"]);
        assert_eq!(buffer.finish().unwrap(), "");
    }

    #[test]
    fn test_text_buffer_keeps_partial_line() {
        let mut buffer = TextBuffer::new();
        buffer.push(b"1:I{}\n0:J").unwrap();
        assert_eq!(buffer.take_lines(), vec!["1:I{}"]);
        assert_eq!(buffer.finish().unwrap(), "0:J");
    }

    #[test]
    fn test_text_buffer_invalid_and_cut_sequences() {
        let mut buffer = TextBuffer::new();
        assert!(matches!(buffer.push(&[0xff, b'a']), Err(TranscodeError::Utf8(_))));

        let mut buffer = TextBuffer::new();
        buffer.push(&"é".as_bytes()[..1]).unwrap();
        assert!(matches!(buffer.finish(), Err(TranscodeError::Utf8(_))));
    }
}
