//! Bounded polling
//!
//! BigQuery metadata is eventually consistent: a freshly created table can
//! answer "not found" for a while. Waits are a fixed interval with a fixed
//! ceiling, never open-ended.

use crate::error::SyncError;
use crate::store::{TableRef, TableStore};
use std::time::Duration;

/// Default wait between polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of polls before giving up
pub const DEFAULT_POLL_ATTEMPTS: u32 = 60;

/// Fixed-interval, capped retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_POLL_ATTEMPTS,
        }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Sleep one interval
    pub async fn pause(&self) {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Wait until the store reports `table` as present
pub async fn wait_for_table<S>(store: &S, table: &TableRef, policy: &PollPolicy) -> Result<(), SyncError>
where
    S: TableStore + ?Sized,
{
    for attempt in 1..=policy.max_attempts {
        let exists = store
            .table_exists(table)
            .await
            .map_err(|err| SyncError::provisioning(table, err))?;
        if exists {
            tracing::debug!("Table {} ready after {} attempt(s)", table, attempt);
            return Ok(());
        }
        if attempt < policy.max_attempts {
            tracing::debug!(
                "Table {} not visible yet ({}/{}), retrying in {:?}",
                table,
                attempt,
                policy.max_attempts,
                policy.interval
            );
            policy.pause().await;
        }
    }

    tracing::error!(
        "Table {} was not ready in time, gave up after {} attempts",
        table,
        policy.max_attempts
    );
    Err(SyncError::ProvisioningTimeout {
        target: table.to_string(),
        attempts: policy.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_matches_five_minute_ceiling() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval * policy.max_attempts, Duration::from_secs(300));
    }

    #[test]
    fn test_at_least_one_attempt() {
        assert_eq!(PollPolicy::new(Duration::ZERO, 0).max_attempts, 1);
    }
}
