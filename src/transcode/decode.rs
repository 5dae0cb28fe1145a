//! Payload Decoder
//!
//! Streams a payload back into a component tree, resolving client module
//! imports through the manifest of the active render side.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use tracing::debug;

use crate::transcode::row::{ImportRow, Row, TextBuffer, WireNode, ROOT_ROW_ID};
use crate::transcode::tree::is_valid_name;
use crate::transcode::{
    ClientManifest, ClientNode, ClientReferenceEntry, Element, Node, PayloadStream,
    RenderPayload, ResolvedModule, SsrManifest, TranscodeError,
};

// == Module Loader ==
/// The client runtime's own module loader.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self, import: &ClientReferenceEntry) -> Result<ResolvedModule, TranscodeError>;
}

/// Loads any module the client manifest knows, by its published chunks.
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    manifest: Arc<ClientManifest>,
}

impl ManifestLoader {
    pub fn new(manifest: Arc<ClientManifest>) -> Self {
        Self { manifest }
    }
}

#[async_trait]
impl ModuleLoader for ManifestLoader {
    async fn load(&self, import: &ClientReferenceEntry) -> Result<ResolvedModule, TranscodeError> {
        if !self.manifest.contains_module(&import.id) {
            return Err(TranscodeError::UnresolvedModule(format!(
                "{}#{}",
                import.id, import.name
            )));
        }
        Ok(ResolvedModule {
            id: import.id.clone(),
            name: import.name.clone(),
            chunks: import.chunks.clone(),
        })
    }
}

// == Decode Mode ==
/// Which side is rendering the decoded tree.
#[derive(Clone)]
pub enum DecodeMode {
    /// Resolve through the SSR manifest, without a module loader
    ServerRender(Arc<SsrManifest>),
    /// Resolve through the runtime's module loader
    ClientRender(Arc<dyn ModuleLoader>),
}

impl DecodeMode {
    pub fn is_server(&self) -> bool {
        matches!(self, DecodeMode::ServerRender(_))
    }

    async fn resolve(&self, import: &ClientReferenceEntry) -> Result<ResolvedModule, TranscodeError> {
        match self {
            DecodeMode::ServerRender(ssr) => ssr.resolve(import).ok_or_else(|| {
                TranscodeError::UnresolvedModule(format!("{}#{}", import.id, import.name))
            }),
            DecodeMode::ClientRender(loader) => loader.load(import).await,
        }
    }
}

impl fmt::Debug for DecodeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeMode::ServerRender(_) => f.write_str("ServerRender"),
            DecodeMode::ClientRender(_) => f.write_str("ClientRender"),
        }
    }
}

/// Presents a stored payload as a single-chunk byte stream.
pub fn payload_stream(payload: &RenderPayload) -> PayloadStream {
    let bytes = Bytes::from(payload.as_str().to_owned());
    stream::once(async move { Ok(bytes) }).boxed()
}

struct Imported {
    key: String,
    module: ResolvedModule,
}

struct Decoder<'a> {
    mode: &'a DecodeMode,
    imports: HashMap<u32, Imported>,
    root: Option<Node>,
}

impl<'a> Decoder<'a> {
    async fn apply(&mut self, line: &str) -> Result<(), TranscodeError> {
        if line.is_empty() {
            return Err(TranscodeError::Malformed("empty row".to_string()));
        }
        if self.root.is_some() {
            return Err(TranscodeError::Malformed("row after the tree row".to_string()));
        }

        match Row::parse(line)? {
            Row::Import { id, import } => self.import(id, import).await,
            Row::Model { id, node } if id == ROOT_ROW_ID => {
                self.root = Some(self.node(node)?);
                Ok(())
            }
            Row::Model { id, .. } => Err(TranscodeError::Malformed(format!(
                "tree row must have id {}, got {}",
                ROOT_ROW_ID, id
            ))),
        }
    }

    async fn import(&mut self, id: u32, import: ImportRow) -> Result<(), TranscodeError> {
        if id == ROOT_ROW_ID || self.imports.contains_key(&id) {
            return Err(TranscodeError::Malformed(format!("duplicate row id {}", id)));
        }
        let entry = ClientReferenceEntry {
            id: import.id,
            chunks: import.chunks,
            name: import.name,
        };
        let module = self.mode.resolve(&entry).await?;
        debug!("Resolved client module {} as {}", import.key, module.id);
        self.imports.insert(
            id,
            Imported {
                key: import.key,
                module,
            },
        );
        Ok(())
    }

    fn node(&self, wire: WireNode) -> Result<Node, TranscodeError> {
        Ok(match wire {
            WireNode::Text { v } => Node::Text(v),
            WireNode::El {
                tag,
                attrs,
                children,
            } => {
                if let Some(name) = std::iter::once(&tag)
                    .chain(attrs.keys())
                    .find(|name| !is_valid_name(name))
                {
                    return Err(TranscodeError::Malformed(format!(
                        "invalid element or attribute name {:?}",
                        name
                    )));
                }
                Node::Element(Element {
                    tag,
                    attrs,
                    children: self.nodes(children)?,
                })
            }
            WireNode::Frag { children } => Node::Fragment(self.nodes(children)?),
            WireNode::Client { r, props, children } => {
                let imported = self.imports.get(&r).ok_or_else(|| {
                    TranscodeError::UnresolvedModule(format!("row {} was never imported", r))
                })?;
                Node::Client(ClientNode {
                    reference: imported.key.clone(),
                    props,
                    children: self.nodes(children)?,
                    module: Some(imported.module.clone()),
                })
            }
        })
    }

    fn nodes(&self, wires: Vec<WireNode>) -> Result<Vec<Node>, TranscodeError> {
        wires.into_iter().map(|wire| self.node(wire)).collect()
    }
}

/// Decodes a payload byte stream into a tree.
///
/// Malformed rows, cut-off streams and unresolvable modules are errors; a
/// payload never decodes to an empty tree by accident.
pub async fn decode_stream<S>(stream: S, mode: &DecodeMode) -> Result<Node, TranscodeError>
where
    S: Stream<Item = Result<Bytes, TranscodeError>>,
{
    futures::pin_mut!(stream);
    let mut buffer = TextBuffer::new();
    let mut decoder = Decoder {
        mode,
        imports: HashMap::new(),
        root: None,
    };

    while let Some(chunk) = stream.next().await {
        buffer.push(&chunk?)?;
        for line in buffer.take_lines() {
            decoder.apply(&line).await?;
        }
    }

    if !buffer.finish()?.is_empty() {
        return Err(TranscodeError::Truncated);
    }
    decoder.root.ok_or(TranscodeError::Truncated)
}

/// Decodes a stored payload into a tree.
pub async fn decode(payload: &RenderPayload, mode: &DecodeMode) -> Result<Node, TranscodeError> {
    decode_stream(payload_stream(payload), mode).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcode::{render_to_payload, ManifestRegistry, BundleManifest, SsrModuleEntry};

    fn manifests() -> crate::transcode::Manifests {
        let mut bundle = BundleManifest::default();
        bundle.client_modules.insert(
            "app/counter#Counter",
            ClientReferenceEntry {
                id: "7".to_string(),
                chunks: vec!["static/7.js".to_string()],
                name: "Counter".to_string(),
            },
        );
        bundle.ssr_module_mapping.insert(
            "7".to_string(),
            [(
                "Counter".to_string(),
                SsrModuleEntry {
                    id: "ssr/7".to_string(),
                    chunks: vec![],
                    name: "Counter".to_string(),
                },
            )]
            .into_iter()
            .collect(),
        );
        ManifestRegistry::new().register("/", bundle).build()
    }

    fn cached_tree() -> Node {
        Element::new("div")
            .attr("class", "gap-4 p-4")
            .child(Element::new("p").child("Hello, this is a cached server component."))
            .child(
                Element::new("time")
                    .attr("dateTime", "2024-01-01T00:00:00Z")
                    .child("Cached at: <soon> & \"later\""),
            )
            .child(ClientNode::new("app/counter#Counter").prop("start", 0))
            .into()
    }

    #[tokio::test]
    async fn test_roundtrip_server_render() {
        let manifests = manifests();
        let tree = cached_tree();
        let payload = render_to_payload(&tree, &manifests.client).await.unwrap();

        let mode = DecodeMode::ServerRender(Arc::clone(&manifests.ssr));
        let decoded = decode(&payload, &mode).await.unwrap();
        assert_eq!(decoded.to_html(), tree.to_html());

        let mut modules = Vec::new();
        decoded.for_each_client(&mut |client| modules.push(client.module.clone()));
        assert_eq!(modules[0].as_ref().unwrap().id, "ssr/7");
    }

    #[tokio::test]
    async fn test_roundtrip_client_render() {
        let manifests = manifests();
        let tree = cached_tree();
        let payload = render_to_payload(&tree, &manifests.client).await.unwrap();

        let mode = DecodeMode::ClientRender(Arc::new(ManifestLoader::new(manifests.client)));
        let decoded = decode(&payload, &mode).await.unwrap();
        assert_eq!(decoded.to_html(), tree.to_html());

        let mut chunks = Vec::new();
        decoded.for_each_client(&mut |client| {
            chunks.extend(client.module.iter().flat_map(|m| m.chunks.clone()))
        });
        assert_eq!(chunks, vec!["static/7.js"]);
    }

    #[tokio::test]
    async fn test_missing_ssr_mapping_is_unresolved() {
        let manifests = manifests();
        let payload = render_to_payload(&cached_tree(), &manifests.client)
            .await
            .unwrap();

        let mode = DecodeMode::ServerRender(Arc::new(SsrManifest::default()));
        assert!(matches!(
            decode(&payload, &mode).await,
            Err(TranscodeError::UnresolvedModule(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupted_payloads_are_errors() {
        let mode = DecodeMode::ServerRender(Arc::new(SsrManifest::default()));
        let cases = [
            ("", TranscodeError::Truncated),
            ("0:J{\"t\":\"text\",\"v\":\"cut", TranscodeError::Truncated),
        ];
        for (payload, expected) in cases {
            let result = decode(&RenderPayload::from(payload.to_string()), &mode).await;
            assert_eq!(result, Err(expected), "payload {:?}", payload);
        }

        for payload in ["not a payload\n", "0:J{}\n", "5:J{\"t\":\"text\",\"v\":\"x\"}\n"] {
            let result = decode(&RenderPayload::from(payload.to_string()), &mode).await;
            assert!(
                matches!(result, Err(TranscodeError::Malformed(_))),
                "payload {:?} gave {:?}",
                payload,
                result
            );
        }
    }

    #[tokio::test]
    async fn test_reference_to_unknown_import() {
        let mode = DecodeMode::ServerRender(Arc::new(SsrManifest::default()));
        let payload = RenderPayload::from("0:J{\"t\":\"client\",\"r\":3}\n".to_string());
        assert!(matches!(
            decode(&payload, &mode).await,
            Err(TranscodeError::UnresolvedModule(_))
        ));
    }

    #[tokio::test]
    async fn test_markup_in_names_is_rejected() {
        let mode = DecodeMode::ServerRender(Arc::new(SsrManifest::default()));
        let payloads = [
            r#"0:J{"t":"el","tag":"img src=x onerror=alert(1)","attrs":{},"children":[]}"#,
            r#"0:J{"t":"el","tag":"p","attrs":{"a><script>":"x"},"children":[]}"#,
            r#"0:J{"t":"el","tag":"","attrs":{},"children":[]}"#,
        ];
        for payload in payloads {
            let result = decode(&RenderPayload::from(format!("{}\n", payload)), &mode).await;
            assert!(
                matches!(result, Err(TranscodeError::Malformed(_))),
                "payload {:?} gave {:?}",
                payload,
                result
            );
        }

        let valid = r#"0:J{"t":"el","tag":"time","attrs":{"dateTime":"x","data-at":"y"},"children":[]}"#;
        let tree = decode(&RenderPayload::from(format!("{}\n", valid)), &mode).await.unwrap();
        assert_eq!(tree.to_html(), "<time data-at=\"y\" dateTime=\"x\"></time>");
    }

    #[tokio::test]
    async fn test_row_after_tree_is_rejected() {
        let mode = DecodeMode::ServerRender(Arc::new(SsrManifest::default()));
        let payload = RenderPayload::from(
            "0:J{\"t\":\"text\",\"v\":\"a\"}\n0:J{\"t\":\"text\",\"v\":\"b\"}\n".to_string(),
        );
        assert!(matches!(
            decode(&payload, &mode).await,
            Err(TranscodeError::Malformed(_))
        ));
    }
}
