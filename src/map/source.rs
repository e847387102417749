//! Where the GeoJSON document of a map comes from.

use std::future::Future;
use std::io;

use camino::Utf8PathBuf;

use crate::error::FetchError;

/// A raw answer to a fetch, before the status is checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

pub trait GeoJsonSource {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Response, FetchError>> + Send;
}

/// Serves documents from a directory, usually the build output.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: Utf8PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl GeoJsonSource for FileSource {
    async fn fetch(&self, url: &str) -> Result<Response, FetchError> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let path = self.root.join(path.trim_start_matches('/'));

        match std::fs::read_to_string(&path) {
            Ok(body) => Ok(Response { status: 200, body }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Response {
                status: 404,
                body: String::new(),
            }),
            Err(e) => Err(FetchError::Network(e.to_string())),
        }
    }
}

/// Fetches documents over HTTP.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct HttpSource {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
impl GeoJsonSource for HttpSource {
    async fn fetch(&self, url: &str) -> Result<Response, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Response { status, body })
    }
}
