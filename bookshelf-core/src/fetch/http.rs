//! HTTP fetcher backed by reqwest

use super::{AssetRequest, AssetResponse, Fetcher};
use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};

/// Fetches assets over HTTP(S)
///
/// Relative request paths are resolved against the configured origin;
/// absolute URLs are fetched as-is.
pub struct HttpFetcher {
    client: Client,
    origin: Option<Url>,
}

impl HttpFetcher {
    /// Create a fetcher for the given origin, e.g. `https://books.example.com/`
    pub fn new(origin: &str) -> Result<Self, FetchError> {
        let origin = Url::parse(origin)
            .map_err(|e| FetchError::Unsupported(format!("invalid origin {}: {}", origin, e)))?;
        Ok(Self {
            client: Self::client()?,
            origin: Some(origin),
        })
    }

    /// Fetcher for absolute URLs only; relative paths are unsupported
    pub fn absolute_only() -> Result<Self, FetchError> {
        Ok(Self {
            client: Self::client()?,
            origin: None,
        })
    }

    fn client() -> Result<Client, FetchError> {
        Client::builder()
            .user_agent(concat!("bookshelf/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))
    }

    fn resolve(&self, request: &AssetRequest) -> Result<Url, FetchError> {
        let parsed = match &self.origin {
            _ if request.is_absolute() => Url::parse(&request.url),
            Some(origin) => origin.join(&request.url),
            None => return Err(FetchError::Unsupported(request.url.clone())),
        };
        parsed.map_err(|e| FetchError::Unsupported(format!("{}: {}", request.url, e)))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &AssetRequest) -> Result<AssetResponse, FetchError> {
        let url = self.resolve(request)?;
        tracing::debug!(url = %url, destination = request.destination.as_str(), "network fetch");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(AssetResponse::new(status, content_type, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::Destination;

    #[test]
    fn test_resolves_relative_and_absolute_urls() {
        let fetcher = HttpFetcher::new("https://books.example.com/app/").unwrap();

        let relative = AssetRequest::new("/src/css/styles.css", Destination::Style);
        assert_eq!(
            fetcher.resolve(&relative).unwrap().as_str(),
            "https://books.example.com/src/css/styles.css"
        );

        let absolute = AssetRequest::new("https://cdn.example.org/pdf.min.js", Destination::Script);
        assert_eq!(
            fetcher.resolve(&absolute).unwrap().as_str(),
            "https://cdn.example.org/pdf.min.js"
        );
    }

    #[test]
    fn test_absolute_only_rejects_relative_paths() {
        let fetcher = HttpFetcher::absolute_only().unwrap();
        let relative = AssetRequest::new("/index.html", Destination::Document);
        assert!(matches!(
            fetcher.resolve(&relative),
            Err(FetchError::Unsupported(_))
        ));
        let absolute = AssetRequest::new("https://cdn.example.org/a.js", Destination::Script);
        assert!(fetcher.resolve(&absolute).is_ok());
    }

    #[test]
    fn test_rejects_invalid_origin() {
        assert!(HttpFetcher::new("not a url").is_err());
    }
}
