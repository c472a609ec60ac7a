//! Tile transports - turning a tile path into encoded raster bytes

use crate::error::{Result, VolumeError};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// Where tiles are fetched from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSource {
    /// Local file system
    FileSystem,
    /// HTTP(S) server
    Http,
}

impl TileSource {
    /// Parse the tile source from a URL scheme
    pub fn from_url(url: &str) -> Result<Self> {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end];
            match scheme {
                "file" => Ok(TileSource::FileSystem),
                "http" | "https" => Ok(TileSource::Http),
                _ => Err(VolumeError::InvalidUrl(format!("Unknown scheme: {}", scheme))),
            }
        } else {
            // Assume file system if no scheme
            Ok(TileSource::FileSystem)
        }
    }
}

/// Fetches the encoded bytes of one tile
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// Fetch the tile at `path`, relative to the source root
    async fn fetch(&self, path: &str) -> Result<Bytes>;

    /// The kind of source this fetcher reads from
    fn source(&self) -> TileSource;
}

/// Reads tiles from a directory tree
pub struct FileSystemFetcher {
    base_path: PathBuf,
}

impl FileSystemFetcher {
    /// Fetcher rooted at `base_path`
    pub fn new(base_path: impl AsRef<Path>) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl TileFetcher for FileSystemFetcher {
    async fn fetch(&self, path: &str) -> Result<Bytes> {
        let full_path = self.full_path(path);
        let data = fs::read(&full_path).await.map_err(|e| VolumeError::TileFetch {
            path: path.to_string(),
            reason: format!("{}: {}", full_path.display(), e),
        })?;
        Ok(Bytes::from(data))
    }

    fn source(&self) -> TileSource {
        TileSource::FileSystem
    }
}

/// Downloads tiles with HTTP GET requests below a base URL
#[cfg(feature = "http-client")]
pub struct HttpFetcher {
    base_url: String,
    client: reqwest::Client,
}

#[cfg(feature = "http-client")]
impl HttpFetcher {
    /// Fetcher for tiles below `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(feature = "http-client")]
#[async_trait]
impl TileFetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| VolumeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(VolumeError::TileFetch {
                path: path.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| VolumeError::Network(e.to_string()))
    }

    fn source(&self) -> TileSource {
        TileSource::Http
    }
}

/// Parse URL and create the matching fetcher
///
/// HTTP sources need the `http-client` feature.
pub fn create_fetcher(url: &str) -> Result<Arc<dyn TileFetcher>> {
    match TileSource::from_url(url)? {
        TileSource::FileSystem => {
            let path = url.strip_prefix("file://").unwrap_or(url);
            Ok(Arc::new(FileSystemFetcher::new(path)))
        }
        #[cfg(feature = "http-client")]
        TileSource::Http => Ok(Arc::new(HttpFetcher::new(url))),
        #[cfg(not(feature = "http-client"))]
        TileSource::Http => Err(VolumeError::Configuration(format!(
            "{} needs the http-client feature",
            url
        ))),
    }
}
