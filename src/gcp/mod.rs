//! GCP API interaction module
//!
//! Authentication, HTTP plumbing and URL construction for the three REST
//! services the sync talks to: Cloud Asset, BigQuery and Compute Engine.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client and per-service URL builders
//! - [`http`] - HTTP utilities and the [`ApiError`] type
//!
//! # Example
//!
//! ```ignore
//! use asset_sync::gcp::GcpClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = GcpClient::new().await?;
//!     let table = client.get(&client.bigquery_table_url("my-project", "inv", "t")).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;

pub use auth::GcpCredentials;
pub use client::{Endpoints, GcpClient};
pub use http::ApiError;
