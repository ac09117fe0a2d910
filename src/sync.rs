//! One sync run
//!
//! List assets -> rebuild the list table -> read back the distinct asset
//! types -> reconcile the detail table of every type with a registered kind.

use crate::asset::{AssetLister, ResourceRecord};
use crate::config::Config;
use crate::error::{SyncError, EXIT_PROVISIONING};
use crate::gcp::GcpClient;
use crate::inventory::InventoryRefresh;
use crate::poll::PollPolicy;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::resource::AssetRegistry;
use crate::store::{normalize_identifier, TableStore};
use futures::TryStreamExt;

/// What a run did
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Assets written to the list table
    pub listed: usize,
    pub reports: Vec<ReconcileReport>,
    /// Listed asset types without a registered kind
    pub unhandled_types: Vec<String>,
    /// Per-type failures; the run went on with the next type
    pub failures: Vec<SyncError>,
}

impl RunSummary {
    /// 0 when every type reconciled; otherwise the first failure's code,
    /// provisioning failures taking precedence
    pub fn exit_code(&self) -> u8 {
        if self
            .failures
            .iter()
            .any(|err| err.exit_code() == EXIT_PROVISIONING)
        {
            return EXIT_PROVISIONING;
        }
        self.failures.first().map_or(0, SyncError::exit_code)
    }
}

/// Collect every asset of the configured types
pub async fn list_assets(config: &Config, client: &GcpClient) -> Result<Vec<ResourceRecord>, SyncError> {
    let scope = config.scope.to_string();
    let records: Vec<ResourceRecord> = AssetLister::new(client)
        .list(&scope, &config.asset_types)
        .try_collect()
        .await
        .map_err(SyncError::Listing)?;
    tracing::info!("Asset:list {} assets under {}", records.len(), scope);
    Ok(records)
}

/// Refresh the list table and reconcile every registered type found in it
pub async fn sync_inventory(
    config: &Config,
    store: &dyn TableStore,
    registry: &AssetRegistry,
    records: &[ResourceRecord],
) -> Result<RunSummary, SyncError> {
    let dataset = config.dataset_ref();
    let refresh = InventoryRefresh::new(
        store,
        dataset.clone(),
        &config.inventory_table,
        &config.dataset_region,
        config.readiness,
    );
    let listed = refresh.refresh(records).await?;

    let asset_types = store
        .distinct_asset_types(refresh.table())
        .await
        .map_err(|err| SyncError::query(format!("listing asset types of {}", refresh.table()), err))?;

    let reconciler = Reconciler::new(store, dataset, &config.inventory_table, config.readiness);
    let mut summary = RunSummary {
        listed,
        ..Default::default()
    };

    for asset_type in asset_types {
        let Some(kind) = registry.for_asset_type(&asset_type) else {
            tracing::info!(
                "No kind registered for {} ({}), skipping",
                asset_type,
                normalize_identifier(&asset_type)
            );
            summary.unhandled_types.push(asset_type);
            continue;
        };

        tracing::info!("Reconciling {}", asset_type);
        match reconciler.reconcile(&*kind).await {
            Ok(report) => summary.reports.push(report),
            Err(err) => {
                tracing::error!("{}: {}", asset_type, err);
                summary.failures.push(err);
            }
        }
    }

    Ok(summary)
}

/// Full run against BigQuery and the Compute kinds
pub async fn run(config: &Config, client: &GcpClient, job_poll: PollPolicy) -> Result<RunSummary, SyncError> {
    let records = list_assets(config, client).await?;
    let store = crate::store::BigQueryStore::new(
        client.clone(),
        Some(config.dataset_region.clone()),
        job_poll,
    );
    let registry = AssetRegistry::compute(client);
    sync_inventory(config, &store, &registry, &records).await
}
