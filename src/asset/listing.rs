//! Asset listing
//!
//! Pages through `assets.list` lazily. The stream ends at the first error.

use super::ResourceRecord;
use crate::gcp::{ApiError, GcpClient};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Deserialize;

/// Assets requested per page
pub const PAGE_SIZE: u32 = 1000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAssetsPage {
    #[serde(default)]
    assets: Vec<ResourceRecord>,
    #[serde(default)]
    next_page_token: Option<String>,
}

enum Cursor {
    Start,
    Next(String),
    Done,
}

/// Lists assets under a scope
pub struct AssetLister<'a> {
    client: &'a GcpClient,
}

impl<'a> AssetLister<'a> {
    pub fn new(client: &'a GcpClient) -> Self {
        Self { client }
    }

    /// Stream every asset of the given types under `scope`
    pub fn list(
        &self,
        scope: &str,
        asset_types: &[String],
    ) -> BoxStream<'a, Result<ResourceRecord, ApiError>> {
        let client = self.client;
        let base = client.cloudasset_assets_url(scope);
        let asset_types = asset_types.to_vec();

        tracing::debug!("Asset:list scope={} asset_types={:?}", scope, asset_types);

        stream::try_unfold(Cursor::Start, move |cursor| {
            let base = base.clone();
            let asset_types = asset_types.clone();
            async move {
                let page_token = match cursor {
                    Cursor::Done => return Ok(None),
                    Cursor::Start => None,
                    Cursor::Next(token) => Some(token),
                };

                let url = page_url(&base, &asset_types, page_token.as_deref());
                let response = client.get(&url).await?;
                let page: ListAssetsPage = serde_json::from_value(response)
                    .map_err(|source| ApiError::Decode { url, source })?;

                tracing::debug!("Asset:list page with {} assets", page.assets.len());

                let next = match page.next_page_token {
                    Some(token) if !token.is_empty() => Cursor::Next(token),
                    _ => Cursor::Done,
                };
                Ok::<_, ApiError>(Some((page.assets, next)))
            }
        })
        .map_ok(|assets| stream::iter(assets.into_iter().map(Ok)))
        .try_flatten()
        .inspect_ok(|asset| tracing::trace!("Asset:list {}", asset.name))
        .boxed()
    }
}

fn page_url(base: &str, asset_types: &[String], page_token: Option<&str>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    for asset_type in asset_types {
        query.append_pair("assetTypes", asset_type);
    }
    query.append_pair("contentType", "RESOURCE");
    query.append_pair("pageSize", &PAGE_SIZE.to_string());
    if let Some(token) = page_token {
        query.append_pair("pageToken", token);
    }
    format!("{}?{}", base, query.finish())
}
