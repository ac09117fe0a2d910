//! List table refresh
//!
//! Every run rebuilds the list table from scratch: dataset created if
//! missing, table dropped and recreated with the [`InventoryRow`] schema,
//! then filled with one row per listed asset.

use crate::asset::{InventoryRow, ResourceRecord};
use crate::error::SyncError;
use crate::poll::{wait_for_table, PollPolicy};
use crate::schema::{infer_schema, Describe};
use crate::store::{DatasetRef, TableRef, TableStore};
use serde_json::Value;

/// Rows per `insertAll` request
pub const INSERT_BATCH_SIZE: usize = 500;

/// Rebuilds the list table of one dataset
pub struct InventoryRefresh<'a> {
    store: &'a dyn TableStore,
    dataset: DatasetRef,
    table: TableRef,
    region: String,
    readiness: PollPolicy,
}

impl<'a> InventoryRefresh<'a> {
    pub fn new(
        store: &'a dyn TableStore,
        dataset: DatasetRef,
        table_id: &str,
        region: &str,
        readiness: PollPolicy,
    ) -> Self {
        let table = dataset.table(table_id);
        Self {
            store,
            dataset,
            table,
            region: region.to_string(),
            readiness,
        }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    fn validate(&self) -> Result<(), SyncError> {
        let identifiers = [
            ("project", &self.dataset.project),
            ("dataset", &self.dataset.dataset),
            ("dataset region", &self.region),
            ("inventory table", &self.table.table),
        ];
        for (label, value) in identifiers {
            if value.trim().is_empty() {
                return Err(SyncError::Configuration(format!("{} must not be empty", label)));
            }
        }
        Ok(())
    }

    /// Rebuild the list table with `records`; returns the number of rows written
    pub async fn refresh(&self, records: &[ResourceRecord]) -> Result<usize, SyncError> {
        self.validate()?;

        let exists = self
            .store
            .dataset_exists(&self.dataset)
            .await
            .map_err(|err| SyncError::provisioning(&self.dataset, err))?;
        if !exists {
            self.store
                .create_dataset(&self.dataset, &self.region)
                .await
                .map_err(|err| SyncError::provisioning(&self.dataset, err))?;
        }

        let table_exists = self
            .store
            .table_exists(&self.table)
            .await
            .map_err(|err| SyncError::provisioning(&self.table, err))?;
        if table_exists {
            self.store
                .delete_table(&self.table)
                .await
                .map_err(|err| SyncError::provisioning(&self.table, err))?;
        }

        let schema = infer_schema(&InventoryRow::describe())?;
        self.store
            .create_table(&self.table, &schema)
            .await
            .map_err(|err| SyncError::provisioning(&self.table, err))?;
        wait_for_table(self.store, &self.table, &self.readiness).await?;

        let rows = records
            .iter()
            .map(|record| {
                serde_json::to_value(InventoryRow::from(record)).map_err(|err| {
                    SyncError::Configuration(format!("cannot encode {}: {}", record.name, err))
                })
            })
            .collect::<Result<Vec<Value>, SyncError>>()?;

        for batch in rows.chunks(INSERT_BATCH_SIZE) {
            self.insert_batch(batch).await?;
        }

        tracing::info!("bqTable:REFRESH {} rows into {}", rows.len(), self.table);
        Ok(rows.len())
    }

    /// Insert one batch, retrying while a fresh table still answers "not found"
    async fn insert_batch(&self, batch: &[Value]) -> Result<(), SyncError> {
        let mut attempt = 1;
        loop {
            match self.store.insert_rows(&self.table, batch).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_not_found() => {
                    if attempt >= self.readiness.max_attempts {
                        tracing::error!(
                            "Table {} still not found after {} insert attempts",
                            self.table,
                            attempt
                        );
                        return Err(SyncError::ProvisioningTimeout {
                            target: self.table.to_string(),
                            attempts: attempt,
                        });
                    }
                    tracing::debug!(
                        "Insert into {} not accepted yet ({}/{})",
                        self.table,
                        attempt,
                        self.readiness.max_attempts
                    );
                    attempt += 1;
                    self.readiness.pause().await;
                }
                Err(err) => return Err(SyncError::provisioning(&self.table, err)),
            }
        }
    }
}
