// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::convert::Infallible;
use std::fmt::{self, Debug};
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode, header};
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use meshcache::{FetchResponse, Registry, codec};
use pct_str::PctStr;
use tokio::net::TcpListener;

use crate::DEFAULT_BASE_PATH;

#[derive(Clone)]
enum Groups {
    Global,
    Owned(Arc<Registry>),
}

impl Groups {
    fn registry(&self) -> &Registry {
        match self {
            Self::Global => Registry::global(),
            Self::Owned(registry) => registry,
        }
    }
}

/// Answers peer fetches from the groups of one registry.
///
/// `GET <base_path><group>/<key>` looks `key` up in `group` and responds with:
///
/// - `200` and an encoded [`FetchResponse`] on success,
/// - `400` if the path does not name a group and a key,
/// - `404` if no such group is registered,
/// - `405` for methods other than `GET`,
/// - `500` with the error text if the lookup fails.
#[derive(Clone)]
pub struct PeerService {
    groups: Groups,
    base_path: Arc<str>,
}

impl Debug for PeerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerService")
            .field("global", &matches!(self.groups, Groups::Global))
            .field("base_path", &self.base_path)
            .finish()
    }
}

impl PeerService {
    /// Serves the groups of `registry`.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            groups: Groups::Owned(registry),
            base_path: Arc::from(DEFAULT_BASE_PATH),
        }
    }

    /// Serves the groups of [`Registry::global`].
    #[must_use]
    pub fn global() -> Self {
        Self {
            groups: Groups::Global,
            base_path: Arc::from(DEFAULT_BASE_PATH),
        }
    }

    /// Sets the path prefix groups are served under. Defaults to [`DEFAULT_BASE_PATH`].
    #[must_use]
    pub fn base_path(mut self, base_path: impl AsRef<str>) -> Self {
        self.base_path = Arc::from(base_path.as_ref());
        self
    }

    /// Handles one request.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<Full<Bytes>> {
        let path = request.uri().path();
        tracing::debug!(method = %request.method(), path, "serving peer request");

        if request.method() != Method::GET {
            return text(StatusCode::METHOD_NOT_ALLOWED, "only GET is supported");
        }

        let Some((group_name, key)) = self.split(path) else {
            return text(StatusCode::BAD_REQUEST, format!("unexpected path: {path}"));
        };

        let Some(group) = self.groups.registry().get(&group_name) else {
            return text(StatusCode::NOT_FOUND, format!("no such group: {group_name}"));
        };

        match group.get_local(&key).await {
            Ok(value) => Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(Full::new(codec::encode_response(&FetchResponse::new(value.to_bytes()))))
                .unwrap_or_else(|_invalid| text(StatusCode::INTERNAL_SERVER_ERROR, "failed to build response")),
            Err(error) => {
                tracing::warn!(group.name = %group_name, group.key = %key, error = %error, "peer lookup failed");
                text(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        }
    }

    /// Splits `<base_path><group>/<key>` into its decoded group and key.
    fn split(&self, path: &str) -> Option<(String, String)> {
        let (group, key) = path.strip_prefix(&*self.base_path)?.split_once('/')?;
        let group = PctStr::new(group).ok()?.decode();
        let key = PctStr::new(key).ok()?.decode();
        (!group.is_empty() && !key.is_empty()).then_some((group, key))
    }
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
}

/// Serves `service` over HTTP/1 on every connection accepted from `listener`.
///
/// Each connection is handled on its own task. Runs until accepting fails.
///
/// # Errors
///
/// Returns the error that stopped the listener.
pub async fn serve(listener: TcpListener, service: PeerService) -> io::Result<()> {
    tracing::info!(addr = ?listener.local_addr().ok(), base_path = %service.base_path, "serving peers");

    loop {
        let (stream, remote) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let service = service.clone();

        tokio::spawn(async move {
            let handler = service_fn(move |request| {
                let service = service.clone();
                async move { Ok::<_, Infallible>(service.handle(request).await) }
            });

            if let Err(error) = http1::Builder::new().serve_connection(io, handler).await {
                tracing::warn!(remote = %remote, error = %error, "peer connection failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> PeerService {
        PeerService::new(Arc::new(Registry::new()))
    }

    #[test]
    fn split_decodes_group_and_key() {
        let service = service();

        assert_eq!(
            service.split("/_meshcache/scores/a%2Fb%20c"),
            Some(("scores".to_string(), "a/b c".to_string()))
        );
        assert_eq!(
            service.split("/_meshcache/scores/a/b"),
            Some(("scores".to_string(), "a/b".to_string()))
        );
    }

    #[test]
    fn split_rejects_malformed_paths() {
        let service = service();

        for path in ["/other/scores/Tom", "/_meshcache/scores", "/_meshcache//Tom", "/_meshcache/scores/", "/_meshcache/scores/%zz"] {
            assert_eq!(service.split(path), None, "{path}");
        }
    }

    #[test]
    fn custom_base_path() {
        let service = service().base_path("/cache/");
        assert_eq!(
            service.split("/cache/scores/Tom"),
            Some(("scores".to_string(), "Tom".to_string()))
        );
    }
}
