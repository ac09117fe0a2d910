//! Error taxonomy
//!
//! [`SyncError`] stops a unit of work (the whole run or one resource type's
//! pass). [`RowError`] is isolated to a single asset and never aborts a pass.

use crate::gcp::ApiError;
use crate::schema::SchemaError;

/// Exit code for configuration and validation failures
pub const EXIT_CONFIGURATION: u8 = 1;

/// Exit code for dataset/table provisioning failures
pub const EXIT_PROVISIONING: u8 = 12;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{0}")]
    Configuration(String),

    #[error("credentials: {0:#}")]
    Credentials(anyhow::Error),

    #[error("listing assets failed: {0}")]
    Listing(#[source] ApiError),

    #[error("provisioning {target} failed: {source}")]
    Provisioning {
        target: String,
        #[source]
        source: ApiError,
    },

    #[error("{target} was not ready after {attempts} attempts")]
    ProvisioningTimeout { target: String, attempts: u32 },

    #[error("{context}: {source}")]
    Query {
        context: String,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl SyncError {
    pub fn provisioning(target: impl ToString, source: ApiError) -> Self {
        SyncError::Provisioning {
            target: target.to_string(),
            source,
        }
    }

    pub fn query(context: impl ToString, source: ApiError) -> Self {
        SyncError::Query {
            context: context.to_string(),
            source,
        }
    }

    /// Process exit code for this failure
    pub fn exit_code(&self) -> u8 {
        match self {
            SyncError::Provisioning { .. } | SyncError::ProvisioningTimeout { .. } => {
                EXIT_PROVISIONING
            }
            _ => EXIT_CONFIGURATION,
        }
    }
}

/// Failure confined to one asset of a reconciliation pass
#[derive(Debug, thiserror::Error)]
pub enum RowError {
    #[error("{name}: {reason}")]
    Validation { name: String, reason: String },

    #[error("fetching {name} failed: {source}")]
    Fetch {
        name: String,
        #[source]
        source: ApiError,
    },

    #[error("deleting {self_link} failed: {source}")]
    Delete {
        self_link: String,
        #[source]
        source: ApiError,
    },

    #[error("loading {self_link} failed: {source}")]
    Load {
        self_link: String,
        #[source]
        source: ApiError,
    },
}

impl RowError {
    pub fn validation(name: &str, reason: impl ToString) -> Self {
        RowError::Validation {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
