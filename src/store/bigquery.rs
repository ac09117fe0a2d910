//! BigQuery implementation of [`TableStore`]
//!
//! Queries go through `jobs.query` / `jobs.getQueryResults` with named
//! parameters and int64 timestamps. Detail rows are written with a
//! multipart load job (append-only, `CREATE_NEVER`, schema attached) and the
//! list table with `tabledata.insertAll`.

use super::{sql, CompareQuery, DatasetRef, DiffRow, TableRef, TableStore};
use crate::gcp::{ApiError, GcpClient};
use crate::poll::PollPolicy;
use crate::schema::ColumnDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

/// How long `jobs.query` may block server-side before returning
const QUERY_TIMEOUT_MS: u32 = 10_000;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    f: Vec<Cell>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    job_complete: bool,
    #[serde(default)]
    rows: Vec<Row>,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorProto {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    #[serde(default)]
    job_reference: JobReference,
    #[serde(default)]
    status: JobStatus,
}

fn decode<T: serde::de::DeserializeOwned>(url: &str, value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

/// Cell as text; `None` for SQL NULL
fn cell_text(row: &Row, idx: usize) -> Option<String> {
    match row.f.get(idx).map(|c| &c.v) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a TIMESTAMP cell: int64 microseconds, float seconds, or RFC 3339
pub fn parse_timestamp(cell: &str) -> Option<DateTime<Utc>> {
    if let Ok(micros) = cell.parse::<i64>() {
        return DateTime::from_timestamp_micros(micros);
    }
    if let Ok(seconds) = cell.parse::<f64>() {
        return DateTime::from_timestamp_micros((seconds * 1_000_000.0).round() as i64);
    }
    DateTime::parse_from_rfc3339(cell)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// [`TableStore`] over the BigQuery REST API
#[derive(Clone)]
pub struct BigQueryStore {
    client: GcpClient,
    /// Job location; `None` lets BigQuery route by dataset
    location: Option<String>,
    job_poll: PollPolicy,
}

impl BigQueryStore {
    pub fn new(client: GcpClient, location: Option<String>, job_poll: PollPolicy) -> Self {
        Self {
            client,
            location,
            job_poll,
        }
    }

    /// Run a query in `project`, following pagination, and return raw rows
    async fn run_query(&self, project: &str, query: &str, params: &[(&str, &str)]) -> Result<Vec<Row>, ApiError> {
        tracing::debug!("BigQuery:QUERY `{}`", query);

        let parameters: Vec<Value> = params
            .iter()
            .map(|(name, value)| {
                json!({
                    "name": name,
                    "parameterType": {"type": "STRING"},
                    "parameterValue": {"value": value}
                })
            })
            .collect();

        let mut body = json!({
            "query": query,
            "useLegacySql": false,
            "useQueryCache": false,
            "parameterMode": "NAMED",
            "queryParameters": parameters,
            "formatOptions": {"useInt64Timestamp": true},
            "timeoutMs": QUERY_TIMEOUT_MS,
        });
        if let Some(location) = &self.location {
            body["location"] = json!(location);
        }

        let url = self.client.bigquery_url(project, "queries");
        let mut response: QueryResponse = decode(&url, self.client.post(&url, &body).await?)?;

        let mut rows = Vec::new();
        let mut pending_polls = 0u32;
        loop {
            if response.job_complete {
                rows.append(&mut response.rows);
            }

            let page_token = match (response.job_complete, response.page_token.take()) {
                (true, None) => break,
                (true, Some(token)) => Some(token),
                (false, _) => {
                    pending_polls += 1;
                    if pending_polls > self.job_poll.max_attempts {
                        return Err(ApiError::JobTimeout {
                            job_id: job_id(&response),
                            attempts: self.job_poll.max_attempts,
                        });
                    }
                    self.job_poll.pause().await;
                    None
                }
            };

            let reference = response.job_reference.as_ref().ok_or_else(|| ApiError::Job {
                job_id: String::new(),
                message: "query response carries no job reference".to_string(),
            })?;
            let url = self.query_results_url(project, reference, page_token.as_deref());
            response = decode(&url, self.client.get(&url).await?)?;
        }

        tracing::debug!("BigQuery:QUERY returned {} rows", rows.len());
        Ok(rows)
    }

    fn query_results_url(&self, project: &str, reference: &JobReference, page_token: Option<&str>) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("timeoutMs", &QUERY_TIMEOUT_MS.to_string());
        query.append_pair("formatOptions.useInt64Timestamp", "true");
        if let Some(location) = reference.location.as_ref().or(self.location.as_ref()) {
            query.append_pair("location", location);
        }
        if let Some(token) = page_token {
            query.append_pair("pageToken", token);
        }
        format!(
            "{}?{}",
            self.client.bigquery_url(
                project,
                &format!("queries/{}", urlencoding::encode(&reference.job_id))
            ),
            query.finish()
        )
    }

    /// Poll a job until it is DONE, failing on its error result
    async fn wait_for_job(&self, project: &str, mut job: Job) -> Result<(), ApiError> {
        let mut attempts = 0u32;
        while job.status.state != "DONE" {
            attempts += 1;
            if attempts > self.job_poll.max_attempts {
                return Err(ApiError::JobTimeout {
                    job_id: job.job_reference.job_id,
                    attempts: self.job_poll.max_attempts,
                });
            }
            self.job_poll.pause().await;

            let mut url = self.client.bigquery_url(
                project,
                &format!("jobs/{}", urlencoding::encode(&job.job_reference.job_id)),
            );
            if let Some(location) = job.job_reference.location.as_ref().or(self.location.as_ref()) {
                url = format!("{}?location={}", url, urlencoding::encode(location));
            }
            job = decode(&url, self.client.get(&url).await?)?;
        }

        match job.status.error_result {
            Some(error) => Err(ApiError::Job {
                job_id: job.job_reference.job_id,
                message: error.message,
            }),
            None => Ok(()),
        }
    }
}

fn job_id(response: &QueryResponse) -> String {
    response
        .job_reference
        .as_ref()
        .map(|r| r.job_id.clone())
        .unwrap_or_default()
}

fn table_reference(table: &TableRef) -> Value {
    json!({
        "projectId": table.project,
        "datasetId": table.dataset,
        "tableId": table.table,
    })
}

#[async_trait]
impl TableStore for BigQueryStore {
    async fn dataset_exists(&self, dataset: &DatasetRef) -> Result<bool, ApiError> {
        let url = self
            .client
            .bigquery_dataset_url(&dataset.project, &dataset.dataset);
        let exists = self.client.get_optional(&url).await?.is_some();
        tracing::info!("bqDataset:EXIST == {} `datasetID: {}`", exists, dataset);
        Ok(exists)
    }

    async fn create_dataset(&self, dataset: &DatasetRef, location: &str) -> Result<(), ApiError> {
        let url = self.client.bigquery_url(&dataset.project, "datasets");
        let body = json!({
            "datasetReference": {
                "projectId": dataset.project,
                "datasetId": dataset.dataset,
            },
            "location": location,
        });
        self.client.post(&url, &body).await?;
        tracing::info!("bqDataset:CREATE `datasetID: {}` location: {}", dataset, location);
        Ok(())
    }

    async fn table_exists(&self, table: &TableRef) -> Result<bool, ApiError> {
        let url = self
            .client
            .bigquery_table_url(&table.project, &table.dataset, &table.table);
        let exists = self.client.get_optional(&url).await?.is_some();
        tracing::info!("bqTable:EXIST == {} `tableID: {}`", exists, table);
        Ok(exists)
    }

    async fn create_table(&self, table: &TableRef, schema: &[ColumnDescriptor]) -> Result<(), ApiError> {
        let url = self.client.bigquery_dataset_url(&table.project, &table.dataset) + "/tables";
        let body = json!({
            "tableReference": table_reference(table),
            "schema": {"fields": schema},
        });
        self.client.post(&url, &body).await?;
        tracing::info!("bqTable:CREATE `tableID: {}` with {} columns", table, schema.len());
        Ok(())
    }

    async fn delete_table(&self, table: &TableRef) -> Result<(), ApiError> {
        let url = self
            .client
            .bigquery_table_url(&table.project, &table.dataset, &table.table);
        self.client.delete(&url).await?;
        tracing::info!("bqTable:DELETE `tableID: {}`", table);
        Ok(())
    }

    async fn insert_rows(&self, table: &TableRef, rows: &[Value]) -> Result<(), ApiError> {
        let url = self
            .client
            .bigquery_table_url(&table.project, &table.dataset, &table.table)
            + "/insertAll";
        let body = json!({
            "kind": "bigquery#tableDataInsertAllRequest",
            "skipInvalidRows": false,
            "ignoreUnknownValues": false,
            "rows": rows.iter().map(|row| json!({"json": row})).collect::<Vec<_>>(),
        });

        let response = self.client.post(&url, &body).await?;
        if let Some(errors) = response
            .get("insertErrors")
            .and_then(|v| v.as_array())
            .filter(|errors| !errors.is_empty())
        {
            return Err(ApiError::Rejected {
                target: table.to_string(),
                message: format!("{} of {} rows failed: {}", errors.len(), rows.len(), errors[0]),
            });
        }
        tracing::trace!("bqTable:INSERT {} rows into {}", rows.len(), table);
        Ok(())
    }

    async fn load_rows(
        &self,
        table: &TableRef,
        schema: &[ColumnDescriptor],
        rows: &[Value],
    ) -> Result<(), ApiError> {
        let mut payload = Vec::new();
        for row in rows {
            payload.extend_from_slice(row.to_string().as_bytes());
            payload.push(b'\n');
        }

        let job_id = format!("asset_sync_load_{}", uuid::Uuid::new_v4().simple());
        let mut job_reference = json!({"projectId": table.project, "jobId": job_id});
        if let Some(location) = &self.location {
            job_reference["location"] = json!(location);
        }
        let metadata = json!({
            "jobReference": job_reference,
            "configuration": {
                "load": {
                    "destinationTable": table_reference(table),
                    "schema": {"fields": schema},
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "writeDisposition": "WRITE_APPEND",
                    "createDisposition": "CREATE_NEVER",
                    "ignoreUnknownValues": true,
                }
            }
        });

        let url = self.client.bigquery_upload_url(&table.project);
        let job: Job = decode(&url, self.client.upload(&url, &metadata, &payload).await?)?;
        tracing::debug!("bqTable:LOAD job {} for {}", job.job_reference.job_id, table);
        self.wait_for_job(&table.project, job).await
    }

    async fn distinct_asset_types(&self, inventory: &TableRef) -> Result<Vec<String>, ApiError> {
        let rows = self
            .run_query(&inventory.project, &sql::distinct_asset_types(inventory), &[])
            .await?;
        Ok(rows.iter().filter_map(|row| cell_text(row, 0)).collect())
    }

    async fn compare(&self, query: &CompareQuery) -> Result<Vec<DiffRow>, ApiError> {
        let rows = self
            .run_query(
                &query.inventory.project,
                &sql::compare(query),
                &[(sql::ASSET_TYPE_PARAM, query.asset_type.as_str())],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| DiffRow {
                name: cell_text(row, 0).filter(|s| !s.is_empty()),
                self_link: cell_text(row, 1).filter(|s| !s.is_empty()),
                update_time: cell_text(row, 2).as_deref().and_then(parse_timestamp),
                updated_timestamp: cell_text(row, 3).as_deref().and_then(parse_timestamp),
            })
            .collect())
    }

    async fn delete_row(&self, table: &TableRef, self_link: &str) -> Result<(), ApiError> {
        self.run_query(
            &table.project,
            &sql::delete_by_self_link(table),
            &[(sql::SELF_LINK_PARAM, self_link)],
        )
        .await?;
        tracing::debug!("bqTable:DELETE ROW {} from {}", self_link, table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("1709287200000000"), Some(expected));
        assert_eq!(parse_timestamp("1.7092872E9"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_cell_text_handles_nulls() {
        let row: Row = serde_json::from_value(json!({"f": [{"v": "a"}, {"v": null}]})).unwrap();
        assert_eq!(cell_text(&row, 0), Some("a".to_string()));
        assert_eq!(cell_text(&row, 1), None);
        assert_eq!(cell_text(&row, 5), None);
    }

    #[test]
    fn test_job_status_decoding() {
        let job: Job = serde_json::from_value(json!({
            "jobReference": {"projectId": "p", "jobId": "j1", "location": "US"},
            "status": {"state": "DONE", "errorResult": {"reason": "invalid", "message": "bad row"}}
        }))
        .unwrap();
        assert_eq!(job.job_reference.job_id, "j1");
        assert_eq!(job.status.error_result.unwrap().message, "bad row");
    }
}
