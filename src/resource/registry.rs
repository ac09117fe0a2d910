//! Asset Registry - Lookup of resource kinds by detail table id
//!
//! Distinct asset types read back from the list table are normalized to a
//! table id and resolved here. Types without a registered kind are skipped
//! by the caller.

use super::compute::{Address, BackendService, ComputeAsset, ForwardingRule, Subnetwork};
use super::AssetKind;
use crate::gcp::GcpClient;
use crate::store::normalize_identifier;
use std::collections::HashMap;
use std::sync::Arc;

/// Resource kinds keyed by detail table id
#[derive(Default, Clone)]
pub struct AssetRegistry {
    kinds: HashMap<String, Arc<dyn AssetKind>>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every Compute Engine kind this crate ships
    pub fn compute(client: &GcpClient) -> Self {
        let mut registry = Self::new();
        registry.register(ComputeAsset::<Address>::new(client.clone()));
        registry.register(ComputeAsset::<ForwardingRule>::new(client.clone()));
        registry.register(ComputeAsset::<Subnetwork>::new(client.clone()));
        registry.register(ComputeAsset::<BackendService>::new(client.clone()));
        registry
    }

    /// Add a kind, replacing any kind with the same table id
    pub fn register<K: AssetKind + 'static>(&mut self, kind: K) {
        let table_id = kind.asset_table_id();
        tracing::debug!("Registered {} as {}", kind.asset_type(), table_id);
        self.kinds.insert(table_id, Arc::new(kind));
    }

    /// Kind whose detail table id is `table_id`
    pub fn get(&self, table_id: &str) -> Option<Arc<dyn AssetKind>> {
        self.kinds.get(table_id).cloned()
    }

    /// Kind handling `asset_type`
    pub fn for_asset_type(&self, asset_type: &str) -> Option<Arc<dyn AssetKind>> {
        self.get(&normalize_identifier(asset_type))
    }

    /// Registered table ids, sorted
    pub fn table_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.kinds.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
