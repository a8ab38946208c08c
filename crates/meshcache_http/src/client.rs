// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector as TcpConnector;
use hyper_util::rt::TokioExecutor;
use meshcache::{BoxError, Connector, Error, FetchRequest, FetchResponse, Fetcher, PeerFetcher, codec};
use pct_str::{Encoder, PctString};

use crate::{DEFAULT_BASE_PATH, DEFAULT_TIMEOUT};

type HttpClient = Client<TcpConnector, Full<Bytes>>;

/// Escapes every character outside the RFC 3986 unreserved set, `%` and `/` included.
struct PathSegment;

impl Encoder for PathSegment {
    fn encode(&self, c: char) -> bool {
        !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
    }
}

/// Connects a [`PeerPool`](meshcache::PeerPool) to peers over HTTP.
///
/// All fetchers created by one connector share a pooled HTTP client.
#[derive(Clone)]
pub struct HttpConnector {
    client: HttpClient,
    base_path: Arc<str>,
    timeout: Duration,
}

impl Debug for HttpConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnector")
            .field("base_path", &self.base_path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpConnector {
    /// Creates a connector that requests paths under [`DEFAULT_BASE_PATH`] and gives up on a
    /// peer after [`DEFAULT_TIMEOUT`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            base_path: Arc::from(DEFAULT_BASE_PATH),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the path prefix the peers serve groups under. It must match the peers'
    /// [`PeerService::base_path`](crate::PeerService::base_path).
    #[must_use]
    pub fn base_path(mut self, base_path: impl AsRef<str>) -> Self {
        self.base_path = Arc::from(base_path.as_ref());
        self
    }

    /// Sets how long a fetch may wait for a peer's complete response before failing.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Connector for HttpConnector {
    fn connect(&self, addr: &str) -> Fetcher {
        Fetcher::new(HttpFetcher::new(self.client.clone(), addr, &self.base_path, self.timeout))
    }
}

/// Fetches values from one peer with `GET <peer><base_path><group>/<key>`.
#[derive(Clone)]
pub struct HttpFetcher {
    client: HttpClient,
    addr: String,
    base_url: String,
    timeout: Duration,
}

impl Debug for HttpFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("addr", &self.addr)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl HttpFetcher {
    fn new(client: HttpClient, addr: &str, base_path: &str, timeout: Duration) -> Self {
        let base_url = if addr.contains("://") {
            format!("{}{base_path}", addr.trim_end_matches('/'))
        } else {
            format!("http://{addr}{base_path}")
        };

        Self {
            client,
            addr: addr.to_owned(),
            base_url,
            timeout,
        }
    }

    /// Returns the peer address this fetcher talks to.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn url(&self, request: &FetchRequest) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            PctString::encode(request.group.chars(), PathSegment),
            PctString::encode(request.key.chars(), PathSegment),
        )
    }

    fn failure(&self, cause: impl Into<BoxError>) -> Error {
        let error = Error::peer_fetch(self.addr.as_str(), cause);
        tracing::warn!(peer.addr = %self.addr, error = %error, "peer fetch failed");
        error
    }

    async fn get(&self, request: &FetchRequest) -> Result<Bytes, Error> {
        let uri: Uri = self.url(request).parse().map_err(|error| self.failure(error))?;
        tracing::debug!(peer.addr = %self.addr, uri = %uri, "fetching from peer");

        tokio::time::timeout(self.timeout, self.exchange(uri))
            .await
            .map_err(|elapsed| self.failure(elapsed))?
    }

    async fn exchange(&self, uri: Uri) -> Result<Bytes, Error> {
        let response = self.client.get(uri).await.map_err(|error| self.failure(error))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|error| self.failure(error))?
            .to_bytes();

        if status != StatusCode::OK {
            return Err(self.failure(format!("server returned {status}: {}", String::from_utf8_lossy(&body))));
        }
        Ok(body)
    }
}

impl PeerFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
        let body = self.get(request).await?;
        codec::decode_response(&body).map_err(|error| self.failure(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher(addr: &str) -> HttpFetcher {
        let connector = HttpConnector::new();
        HttpFetcher::new(connector.client, addr, DEFAULT_BASE_PATH, DEFAULT_TIMEOUT)
    }

    #[test]
    fn url_escapes_group_and_key() {
        let fetcher = fetcher("127.0.0.1:8001");
        let url = fetcher.url(&FetchRequest::new("scores", "a/b c"));

        assert_eq!(url, "http://127.0.0.1:8001/_meshcache/scores/a%2Fb%20c");
    }

    #[test]
    fn url_escapes_percent_signs() {
        let fetcher = fetcher("127.0.0.1:8001");
        let url = fetcher.url(&FetchRequest::new("rates", "100%"));

        assert_eq!(url, "http://127.0.0.1:8001/_meshcache/rates/100%25");
    }

    #[test]
    fn addresses_with_a_scheme_are_kept() {
        let fetcher = fetcher("http://localhost:8001/");
        let url = fetcher.url(&FetchRequest::new("scores", "Tom"));

        assert_eq!(url, "http://localhost:8001/_meshcache/scores/Tom");
        assert_eq!(fetcher.addr(), "http://localhost:8001/");
    }
}
