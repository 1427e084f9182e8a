//! GraphPhotoProvider - IPhotoProvider implementation for Microsoft Graph
//!
//! Maps the OneDrive drive-item surface onto the photo-provider port:
//! container scans over `/children`, incremental sync over `/delta`, and
//! streaming content downloads.
//!
//! ## Design Notes
//!
//! - The client is built during `init()` (that is when credentials are
//!   read and reachability verified) and kept behind a `tokio::sync::Mutex`
//!   because the port takes `&self`.
//! - Container scans are iterative (queue + visited set) so cyclic folder
//!   graphs terminate and the recursion bound is explicit.
//! - Only entries whose `file.mimeType` starts with `image/` are yielded.

use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::Method;
use tracing::{debug, info, warn};

use framesync_core::domain::{DeltaToken, PhotoId};
use framesync_core::ports::photo_provider::{
    ByteStream, ContainerSpec, DeltaPage, IPhotoProvider, PhotoMeta,
};

use crate::client::GraphClient;
use crate::token::TokenFile;

// ============================================================================
// Graph API response types
// ============================================================================

/// One page of drive items from a children or delta listing
#[derive(Debug, serde::Deserialize)]
struct DriveItemPage {
    #[serde(default)]
    value: Vec<DriveItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
    #[serde(rename = "@odata.deltaLink")]
    delta_link: Option<String>,
}

/// Minimal DriveItem shape the provider cares about
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveItem {
    id: String,
    name: Option<String>,
    /// File facet; present on files, carries the MIME type
    file: Option<FileFacet>,
    /// Folder facet; present on folders
    folder: Option<serde_json::Value>,
    /// Photo facet; carries the capture timestamp when EXIF had one
    photo: Option<PhotoFacet>,
    /// Image facet; pre-transform pixel dimensions
    image: Option<ImageFacet>,
    /// GPS coordinates, when the item has them
    location: Option<GeoFacet>,
    /// Deleted facet; present in delta responses for removed items
    deleted: Option<serde_json::Value>,
    parent_reference: Option<ParentRef>,
    created_date_time: Option<DateTime<Utc>>,
    last_modified_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileFacet {
    mime_type: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotoFacet {
    taken_date_time: Option<DateTime<Utc>>,
}

#[derive(Debug, serde::Deserialize)]
struct ImageFacet {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, serde::Deserialize)]
struct GeoFacet {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, serde::Deserialize)]
struct ParentRef {
    id: Option<String>,
}

impl DriveItem {
    fn is_image(&self) -> bool {
        self.file
            .as_ref()
            .and_then(|f| f.mime_type.as_deref())
            .is_some_and(|mime| mime.starts_with("image/"))
    }

    /// Capture time when known, falling back to upload / modification time
    fn creation_time(&self) -> DateTime<Utc> {
        self.photo
            .as_ref()
            .and_then(|p| p.taken_date_time)
            .or(self.created_date_time)
            .or(self.last_modified_date_time)
            .unwrap_or_else(Utc::now)
    }

    fn into_photo_meta(self, container_key: &str) -> Result<PhotoMeta> {
        let creation_time = self.creation_time();
        let id = PhotoId::new(self.id).context("graph item has an unusable id")?;
        Ok(PhotoMeta {
            filename: self.name.unwrap_or_else(|| format!("{id}.jpg")),
            id,
            container_key: container_key.to_string(),
            creation_time,
            width: self.image.as_ref().and_then(|i| i.width),
            height: self.image.as_ref().and_then(|i| i.height),
            latitude: self.location.as_ref().and_then(|l| l.latitude),
            longitude: self.location.as_ref().and_then(|l| l.longitude),
        })
    }
}

/// Children listing path for a container; `root` is addressed specially
fn children_path(container_id: &str) -> String {
    if container_id == "root" {
        "/me/drive/root/children".to_string()
    } else {
        format!("/me/drive/items/{container_id}/children")
    }
}

/// Extracts the `token` parameter from a delta link URL
///
/// Falls back to the full link when the URL has no token parameter; the
/// Graph API accepts either form on the next call.
fn token_from_delta_link(delta_link: &str) -> Option<String> {
    url::Url::parse(delta_link).ok().and_then(|u| {
        u.query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    })
}

// ============================================================================
// GraphPhotoProvider
// ============================================================================

/// IPhotoProvider implementation over the Microsoft Graph API
pub struct GraphPhotoProvider {
    token_path: PathBuf,
    base_url: Option<String>,
    client: tokio::sync::Mutex<Option<GraphClient>>,
}

impl GraphPhotoProvider {
    /// Creates a provider reading its token from `token_path`
    pub fn new(token_path: PathBuf) -> Self {
        Self {
            token_path,
            base_url: None,
            client: tokio::sync::Mutex::new(None),
        }
    }

    /// Creates a provider against a custom API base URL (testing)
    pub fn with_base_url(token_path: PathBuf, base_url: impl Into<String>) -> Self {
        Self {
            token_path,
            base_url: Some(base_url.into()),
            client: tokio::sync::Mutex::new(None),
        }
    }

    async fn client(&self) -> Result<GraphClient> {
        self.client
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow::anyhow!("graph provider is not initialized"))
    }

    /// Fetches one listing page, by relative path or absolute next-link
    async fn fetch_page(
        &self,
        client: &GraphClient,
        path: &str,
        absolute: Option<&str>,
    ) -> Result<DriveItemPage> {
        let request = match absolute {
            Some(url) => client.request_absolute(Method::GET, url),
            None => client.request(Method::GET, path),
        };
        client.fetch_json(request).await
    }
}

#[async_trait::async_trait]
impl IPhotoProvider for GraphPhotoProvider {
    async fn init(&self) -> Result<()> {
        let token = TokenFile::load(&self.token_path)?;
        if token.is_expired() {
            warn!(path = %self.token_path.display(), "Access token is past its recorded expiry");
        }

        let client = match &self.base_url {
            Some(base) => GraphClient::with_base_url(&token.access_token, base),
            None => GraphClient::new(&token.access_token),
        };

        let account = client.probe().await?;
        info!(%account, "Graph provider initialized");

        *self.client.lock().await = Some(client);
        Ok(())
    }

    async fn full_scan(&self, containers: &[ContainerSpec]) -> Result<Vec<PhotoMeta>> {
        let client = self.client().await?;

        let mut photos: Vec<PhotoMeta> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();

        for spec in containers {
            // Iterative traversal with a visited set: folder graphs can be
            // cyclic (an item shared into two parents), and the recursion
            // bound has the hierarchical reading.
            let mut visited: HashSet<String> = HashSet::new();
            let mut queue: VecDeque<(String, i32)> = VecDeque::new();
            queue.push_back((spec.id.clone(), spec.depth));

            while let Some((container_id, depth)) = queue.pop_front() {
                if !visited.insert(container_id.clone()) {
                    debug!(container = %container_id, "Skipping already-visited container");
                    continue;
                }

                let mut next_link: Option<String> = None;
                loop {
                    let page = self
                        .fetch_page(&client, &children_path(&container_id), next_link.as_deref())
                        .await
                        .with_context(|| format!("failed to list container {container_id}"))?;

                    for item in page.value {
                        if item.folder.is_some() {
                            if depth != 0 {
                                let remaining = if depth > 0 { depth - 1 } else { -1 };
                                queue.push_back((item.id, remaining));
                            }
                        } else if item.is_image() && seen_ids.insert(item.id.clone()) {
                            photos.push(item.into_photo_meta(&container_id)?);
                        }
                    }

                    match page.next_link {
                        Some(url) => next_link = Some(url),
                        None => break,
                    }
                }
            }
        }

        info!(
            photos = photos.len(),
            containers = containers.len(),
            "Full scan completed"
        );
        Ok(photos)
    }

    async fn download(&self, id: &PhotoId, timeout: Duration) -> Result<ByteStream> {
        let client = self.client().await?;

        let response = client
            .request(Method::GET, &format!("/me/drive/items/{id}/content"))
            .timeout(timeout)
            .send()
            .await
            .with_context(|| format!("download request failed for photo {id}"))?
            .error_for_status()
            .with_context(|| format!("download rejected for photo {id}"))?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(anyhow::Error::from))
            .boxed())
    }

    fn name(&self) -> &str {
        "graph"
    }

    fn supports_delta(&self) -> bool {
        true
    }

    async fn delta_start_token(&self) -> Result<DeltaToken> {
        let client = self.client().await?;

        // `token=latest` yields an empty page whose deltaLink encodes "now".
        let page = client
            .fetch_json::<DriveItemPage>(
                client
                    .request(Method::GET, "/me/drive/root/delta")
                    .query(&[("token", "latest")]),
            )
            .await
            .context("failed to obtain delta start token")?;

        let delta_link = page
            .delta_link
            .ok_or_else(|| anyhow::anyhow!("delta latest response had no delta link"))?;
        let token = token_from_delta_link(&delta_link).unwrap_or(delta_link);
        Ok(DeltaToken::new(token)?)
    }

    async fn delta(&self, token: &DeltaToken) -> Result<DeltaPage> {
        let client = self.client().await?;

        let mut added_or_modified = Vec::new();
        let mut deleted_ids = Vec::new();
        let mut delta_link: Option<String> = None;
        let mut next_link: Option<String> = None;

        loop {
            let request = match &next_link {
                Some(url) => client.request_absolute(Method::GET, url),
                None => client
                    .request(Method::GET, "/me/drive/root/delta")
                    .query(&[("token", token.as_str())]),
            };
            let page: DriveItemPage = client
                .fetch_json(request)
                .await
                .context("delta query failed")?;

            for item in page.value {
                if item.deleted.is_some() {
                    deleted_ids.push(PhotoId::new(item.id)?);
                } else if item.folder.is_some() {
                    // Folder changes carry no displayable content.
                } else if item.is_image() {
                    let container = item
                        .parent_reference
                        .as_ref()
                        .and_then(|p| p.id.clone())
                        .unwrap_or_else(|| "root".to_string());
                    added_or_modified.push(item.into_photo_meta(&container)?);
                }
            }

            if let Some(link) = page.delta_link {
                delta_link = Some(link);
                break;
            }
            match page.next_link {
                Some(url) => next_link = Some(url),
                None => break,
            }
        }

        let delta_link =
            delta_link.ok_or_else(|| anyhow::anyhow!("delta response had no delta link"))?;
        let next_token =
            DeltaToken::new(token_from_delta_link(&delta_link).unwrap_or(delta_link))?;

        debug!(
            added = added_or_modified.len(),
            deleted = deleted_ids.len(),
            "Delta query completed"
        );

        Ok(DeltaPage {
            added_or_modified,
            deleted_ids,
            next_token,
        })
    }
}
