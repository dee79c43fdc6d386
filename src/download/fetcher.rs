//! Network seam of the downloader.

use async_trait::async_trait;
use tracing::debug;

use super::DownloadError;
use crate::cache::Blob;

/// Fetches raw media bytes from a URL
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// GET the URL; non-2xx and transport failures are errors
    async fn fetch(&self, url: &str) -> Result<Blob, DownloadError>;
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    /// Create a fetcher with a default client
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Create a fetcher sharing an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Blob, DownloadError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        debug!(%url, "Downloading media");

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::transport(url, e))?;

        debug!(%url, bytes = bytes.len(), "Downloaded media");
        Ok(Blob::from(bytes.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_rejected_without_request() {
        let fetcher = HttpFetcher::new();
        let err = fetcher.fetch("not a url").await.unwrap_err();

        assert!(matches!(err, DownloadError::InvalidUrl { .. }));
    }
}
