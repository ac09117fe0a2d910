//! SQL text for the queries the sync runs (GoogleSQL)
//!
//! Values are passed as named query parameters; only table paths are
//! interpolated, and those are quoted with backticks.

use super::{CompareQuery, TableRef, SELF_LINK_COLUMN, UPDATED_TIMESTAMP_COLUMN};

/// Parameter carrying the asset type in [`compare`]
pub const ASSET_TYPE_PARAM: &str = "asset_type";

/// Parameter carrying the self-link in [`delete_by_self_link`]
pub const SELF_LINK_PARAM: &str = "self_link";

fn quoted(table: &TableRef) -> String {
    format!(
        "`{}.{}.{}`",
        table.project.replace('`', ""),
        table.dataset.replace('`', ""),
        table.table.replace('`', "")
    )
}

/// SQL counterpart of [`super::join_key`]
fn join_key_expr(column: &str) -> String {
    format!(
        "REGEXP_REPLACE(COALESCE(REGEXP_EXTRACT({c}, r'projects/.*'), {c}), r'[./]', '_')",
        c = column
    )
}

/// Distinct asset types present in the list table
pub fn distinct_asset_types(inventory: &TableRef) -> String {
    format!(
        "SELECT DISTINCT asset_type FROM {} ORDER BY asset_type",
        quoted(inventory)
    )
}

/// Full outer join of the list table (one asset type) and a detail table,
/// keeping rows missing on either side or newer in the list table.
///
/// Result columns: `name`, `selfLink`, `update_time`, `updatedTimestamp`.
pub fn compare(query: &CompareQuery) -> String {
    format!(
        "WITH inventory AS (
  SELECT name, {inventory_key} AS join_key, update_time
  FROM {inventory}
  WHERE asset_type = @{asset_type_param}
),
detail AS (
  SELECT {self_link}, {detail_key} AS join_key, {updated}
  FROM {detail}
)
SELECT inventory.name, detail.{self_link}, inventory.update_time, detail.{updated}
FROM inventory
FULL OUTER JOIN detail USING (join_key)
WHERE detail.{self_link} IS NULL
  OR inventory.name IS NULL
  OR inventory.update_time > detail.{updated}",
        inventory_key = join_key_expr("name"),
        inventory = quoted(&query.inventory),
        asset_type_param = ASSET_TYPE_PARAM,
        self_link = SELF_LINK_COLUMN,
        detail_key = join_key_expr(SELF_LINK_COLUMN),
        updated = UPDATED_TIMESTAMP_COLUMN,
        detail = quoted(&query.detail),
    )
}

/// Delete the detail rows carrying a self-link
pub fn delete_by_self_link(table: &TableRef) -> String {
    format!(
        "DELETE FROM {} WHERE {} = @{}",
        quoted(table),
        SELF_LINK_COLUMN,
        SELF_LINK_PARAM
    )
}
