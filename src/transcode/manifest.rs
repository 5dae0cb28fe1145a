//! Module Manifest Module
//!
//! Mappings that resolve client component references during encode and
//! decode. Per-page bundle manifests are registered once at startup and
//! frozen into an immutable [`Manifests`] value that callers pass explicitly.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::transcode::{ResolvedModule, TranscodeError};

/// Export name that stands for the whole module in an SSR module map.
pub const WHOLE_MODULE_EXPORT: &str = "*";

// == Client Manifest ==
/// Load instructions for one client component reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientReferenceEntry {
    pub id: String,
    pub chunks: Vec<String>,
    pub name: String,
}

/// Map from reference key (as used by [`ClientNode::reference`](crate::transcode::ClientNode))
/// to load instructions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientManifest {
    entries: HashMap<String, ClientReferenceEntry>,
}

impl ClientManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, reference: impl Into<String>, entry: ClientReferenceEntry) {
        self.entries.insert(reference.into(), entry);
    }

    pub fn get(&self, reference: &str) -> Option<&ClientReferenceEntry> {
        self.entries.get(reference)
    }

    pub fn contains_module(&self, id: &str) -> bool {
        self.entries.values().any(|entry| entry.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copies every entry of `other` over this one; `other` wins on collision.
    pub fn merge_from(&mut self, other: &ClientManifest) {
        for (reference, entry) in &other.entries {
            self.entries.insert(reference.clone(), entry.clone());
        }
    }
}

// == SSR Manifest ==
/// How chunk files are fetched while rendering on the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleLoading {
    pub prefix: String,
    #[serde(default)]
    pub crossorigin: Option<String>,
}

/// Server-side implementation of one client module export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsrModuleEntry {
    pub id: String,
    pub chunks: Vec<String>,
    pub name: String,
}

/// Module loading instructions plus the client module id to server
/// implementation mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsrManifest {
    #[serde(default)]
    pub module_loading: Option<ModuleLoading>,
    #[serde(default)]
    pub module_map: HashMap<String, HashMap<String, SsrModuleEntry>>,
}

impl SsrManifest {
    /// Finds the server implementation for `entry`, falling back to the
    /// whole-module export. Chunks get the module loading prefix.
    pub fn resolve(&self, entry: &ClientReferenceEntry) -> Option<ResolvedModule> {
        let exports = self.module_map.get(&entry.id)?;
        let ssr = exports
            .get(&entry.name)
            .or_else(|| exports.get(WHOLE_MODULE_EXPORT))?;
        let prefix = self
            .module_loading
            .as_ref()
            .map(|loading| loading.prefix.as_str())
            .unwrap_or_default();

        Some(ResolvedModule {
            id: ssr.id.clone(),
            name: ssr.name.clone(),
            chunks: ssr
                .chunks
                .iter()
                .map(|chunk| format!("{}{}", prefix, chunk))
                .collect(),
        })
    }
}

// == Bundle Manifest ==
/// The manifest one page bundle contributes, as written by the build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleManifest {
    #[serde(default)]
    pub client_modules: ClientManifest,
    #[serde(default)]
    pub module_loading: Option<ModuleLoading>,
    #[serde(default)]
    pub ssr_module_mapping: HashMap<String, HashMap<String, SsrModuleEntry>>,
}

impl BundleManifest {
    pub fn from_json(json: &str) -> Result<Self, TranscodeError> {
        serde_json::from_str(json)
            .map_err(|e| TranscodeError::Malformed(format!("bundle manifest: {}", e)))
    }
}

// == Registry ==
/// Collects bundle manifests by page, in registration order.
#[derive(Debug, Default)]
pub struct ManifestRegistry {
    bundles: Vec<(String, BundleManifest)>,
}

impl ManifestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the manifest of `page`. Registering a page again replaces
    /// its manifest but keeps its original position.
    pub fn register(mut self, page: impl Into<String>, bundle: BundleManifest) -> Self {
        let page = page.into();
        match self.bundles.iter_mut().find(|(name, _)| *name == page) {
            Some((_, existing)) => *existing = bundle,
            None => self.bundles.push((page, bundle)),
        }
        self
    }

    /// Merges every registered bundle. Later registrations win on key
    /// collision; that includes reference keys, SSR module ids and the
    /// module loading instructions.
    pub fn build(self) -> Manifests {
        let mut client = ClientManifest::new();
        let mut ssr = SsrManifest::default();

        for (_, bundle) in &self.bundles {
            client.merge_from(&bundle.client_modules);
            if bundle.module_loading.is_some() {
                ssr.module_loading = bundle.module_loading.clone();
            }
            for (id, exports) in &bundle.ssr_module_mapping {
                ssr.module_map.insert(id.clone(), exports.clone());
            }
        }

        Manifests {
            client: Arc::new(client),
            ssr: Arc::new(ssr),
        }
    }
}

/// Frozen, shareable manifests for encode and decode.
#[derive(Debug, Clone, Default)]
pub struct Manifests {
    pub client: Arc<ClientManifest>,
    pub ssr: Arc<SsrManifest>,
}
