//! Inventory reconciler
//!
//! Brings one detail table in line with the list table:
//!
//! 1. make sure the detail table exists (create it and wait if not)
//! 2. compare it with the list rows of its asset type
//! 3. classify every differing row
//! 4. delete stale detail rows, fetch and load fresh ones
//!
//! Table and compare failures stop the pass for that type. Failures on a
//! single row are collected in the [`ReconcileReport`] and the pass goes on.

mod action;

pub use crate::poll::PollPolicy;
pub use action::{classify, Action};

use crate::error::{RowError, SyncError};
use crate::poll::wait_for_table;
use crate::resource::AssetKind;
use crate::schema::ColumnDescriptor;
use crate::store::{CompareQuery, DatasetRef, DiffRow, TableRef, TableStore};

/// Outcome of one reconciliation pass
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub asset_type: String,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Rows classified [`Action::Unknown`]
    pub unchanged: usize,
    pub failures: Vec<RowError>,
}

impl ReconcileReport {
    fn new(asset_type: &str) -> Self {
        Self {
            asset_type: asset_type.to_string(),
            ..Default::default()
        }
    }

    /// Rows that changed the detail table
    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, error: RowError) {
        tracing::error!("{}: {}", self.asset_type, error);
        self.failures.push(error);
    }
}

/// Reconciles detail tables of one dataset against its list table
pub struct Reconciler<'a> {
    store: &'a dyn TableStore,
    dataset: DatasetRef,
    inventory: TableRef,
    readiness: PollPolicy,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a dyn TableStore,
        dataset: DatasetRef,
        inventory_table: &str,
        readiness: PollPolicy,
    ) -> Self {
        let inventory = dataset.table(inventory_table);
        Self {
            store,
            dataset,
            inventory,
            readiness,
        }
    }

    /// Run one pass for `kind`
    pub async fn reconcile(&self, kind: &dyn AssetKind) -> Result<ReconcileReport, SyncError> {
        let asset_type = kind.asset_type();
        let schema = kind.schema()?;
        let table = self.dataset.table(&kind.asset_table_id());
        let mut report = ReconcileReport::new(asset_type);

        self.ensure_table(&table, &schema).await?;

        let query = CompareQuery {
            inventory: self.inventory.clone(),
            detail: table.clone(),
            asset_type: asset_type.to_string(),
        };
        let rows = self.store.compare(&query).await.map_err(|err| {
            SyncError::query(format!("comparing {} with {}", self.inventory, table), err)
        })?;
        tracing::info!("{}: {} rows differ from {}", asset_type, rows.len(), table);

        for row in rows {
            let action = classify(&row);
            tracing::trace!(
                "{} {} name={:?} selfLink={:?}",
                asset_type,
                action,
                row.name,
                row.self_link
            );
            self.apply(kind, &table, &schema, action, row, &mut report)
                .await;
        }

        tracing::info!(
            "{}: {} created, {} updated, {} deleted, {} skipped, {} failed",
            asset_type,
            report.created,
            report.updated,
            report.deleted,
            report.unchanged,
            report.failures.len()
        );
        Ok(report)
    }

    async fn ensure_table(&self, table: &TableRef, schema: &[ColumnDescriptor]) -> Result<(), SyncError> {
        let exists = self
            .store
            .table_exists(table)
            .await
            .map_err(|err| SyncError::provisioning(table, err))?;
        if exists {
            return Ok(());
        }

        self.store
            .create_table(table, schema)
            .await
            .map_err(|err| SyncError::provisioning(table, err))?;
        wait_for_table(self.store, table, &self.readiness).await
    }

    async fn apply(
        &self,
        kind: &dyn AssetKind,
        table: &TableRef,
        schema: &[ColumnDescriptor],
        action: Action,
        row: DiffRow,
        report: &mut ReconcileReport,
    ) {
        let name = row.name.unwrap_or_default();
        let self_link = row.self_link.unwrap_or_default();

        // Fetched before anything is deleted so a failed fetch leaves the
        // current detail row in place
        let record = if action.loads() {
            if name.is_empty() {
                report.fail(RowError::validation(&self_link, "row has no asset name"));
                return;
            }
            match kind.fetch_detail(&name).await {
                Ok(record) => Some(record),
                Err(err) => {
                    report.fail(err);
                    return;
                }
            }
        } else {
            None
        };

        if action.deletes() {
            if let Err(source) = self.store.delete_row(table, &self_link).await {
                report.fail(RowError::Delete { self_link, source });
                return;
            }
        }

        let Some(record) = record else {
            match action {
                Action::Delete => report.deleted += 1,
                _ => report.unchanged += 1,
            }
            return;
        };

        let loaded_link = record.self_link().to_string();
        let payload = record.into_row(row.update_time);
        if let Err(source) = self.store.load_rows(table, schema, &[payload]).await {
            report.fail(RowError::Load {
                self_link: loaded_link,
                source,
            });
            return;
        }

        match action {
            Action::Update => report.updated += 1,
            _ => report.created += 1,
        }
    }
}
