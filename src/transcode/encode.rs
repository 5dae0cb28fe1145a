//! Payload Encoder
//!
//! Streams a component tree into payload bytes and drains such a stream into
//! a [`RenderPayload`].

use std::collections::HashMap;

use bytes::Bytes;
use futures::{stream, Stream, StreamExt};

use crate::transcode::row::{ImportRow, Row, TextBuffer, WireNode, ROOT_ROW_ID};
use crate::transcode::{
    ClientManifest, Node, PayloadStream, RenderPayload, TranscodeError, ROW_TERMINATOR,
};

/// Upper bound on the size of one emitted chunk.
pub const MAX_CHUNK_BYTES: usize = 16 * 1024;

struct Encoder<'m> {
    manifest: &'m ClientManifest,
    imports: HashMap<String, u32>,
    rows: Vec<Row>,
}

impl<'m> Encoder<'m> {
    fn new(manifest: &'m ClientManifest) -> Self {
        Self {
            manifest,
            imports: HashMap::new(),
            rows: Vec::new(),
        }
    }

    fn import(&mut self, reference: &str) -> Result<u32, TranscodeError> {
        if let Some(id) = self.imports.get(reference) {
            return Ok(*id);
        }
        let entry = self
            .manifest
            .get(reference)
            .ok_or_else(|| TranscodeError::UnresolvedModule(reference.to_string()))?;

        let id = self.imports.len() as u32 + 1;
        self.imports.insert(reference.to_string(), id);
        self.rows.push(Row::Import {
            id,
            import: ImportRow {
                key: reference.to_string(),
                id: entry.id.clone(),
                chunks: entry.chunks.clone(),
                name: entry.name.clone(),
            },
        });
        Ok(id)
    }

    fn wire(&mut self, node: &Node) -> Result<WireNode, TranscodeError> {
        Ok(match node {
            Node::Text(text) => WireNode::Text { v: text.clone() },
            Node::Element(element) => WireNode::El {
                tag: element.tag.clone(),
                attrs: element.attrs.clone(),
                children: self.wire_all(&element.children)?,
            },
            Node::Fragment(children) => WireNode::Frag {
                children: self.wire_all(children)?,
            },
            Node::Client(client) => WireNode::Client {
                r: self.import(&client.reference)?,
                props: client.props.clone(),
                children: self.wire_all(&client.children)?,
            },
        })
    }

    fn wire_all(&mut self, nodes: &[Node]) -> Result<Vec<WireNode>, TranscodeError> {
        nodes.iter().map(|node| self.wire(node)).collect()
    }

    /// Import rows in first-use order, then the tree row.
    fn finish(mut self, tree: &Node) -> Result<Vec<Row>, TranscodeError> {
        let node = self.wire(tree)?;
        self.rows.push(Row::Model {
            id: ROOT_ROW_ID,
            node,
        });
        Ok(self.rows)
    }
}

/// Encodes `tree` into a stream of payload chunks.
///
/// Every client reference must be present in `manifest`; otherwise the
/// stream yields a single [`TranscodeError::UnresolvedModule`].
pub fn encode(tree: &Node, manifest: &ClientManifest) -> PayloadStream {
    let lines = Encoder::new(manifest)
        .finish(tree)
        .and_then(|rows| rows.iter().map(Row::to_line).collect::<Result<Vec<_>, _>>());

    match lines {
        Ok(lines) => stream::iter(
            lines
                .into_iter()
                .flat_map(|line| split_chunks(Bytes::from(line)))
                .map(Ok),
        )
        .boxed(),
        Err(err) => stream::once(async move { Err(err) }).boxed(),
    }
}

fn split_chunks(line: Bytes) -> Vec<Bytes> {
    (0..line.len())
        .step_by(MAX_CHUNK_BYTES)
        .map(|start| line.slice(start..(start + MAX_CHUNK_BYTES).min(line.len())))
        .collect()
}

/// Drains `stream` into a payload, decoding text chunks in arrival order.
///
/// The stream must run to completion and end on a row boundary; anything
/// else is a [`TranscodeError`], never a partial payload.
pub async fn collect_payload<S>(stream: S) -> Result<RenderPayload, TranscodeError>
where
    S: Stream<Item = Result<Bytes, TranscodeError>>,
{
    futures::pin_mut!(stream);
    let mut buffer = TextBuffer::new();
    while let Some(chunk) = stream.next().await {
        buffer.push(&chunk?)?;
    }

    let text = buffer.finish()?;
    if !text.ends_with(ROW_TERMINATOR) {
        return Err(TranscodeError::Truncated);
    }
    Ok(RenderPayload::from(text))
}

/// Encodes `tree` and drains the result into a payload.
pub async fn render_to_payload(
    tree: &Node,
    manifest: &ClientManifest,
) -> Result<RenderPayload, TranscodeError> {
    collect_payload(encode(tree, manifest)).await
}
