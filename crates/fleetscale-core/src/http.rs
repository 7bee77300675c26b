//! Minimal HTTP/1.1 client over hyper's connection API.
//!
//! Each request opens a fresh connection (TCP or unix socket), performs a
//! single exchange, and collects the full body. That is all the orchestrator
//! and API calls need, and it keeps the client free of pooling state.

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::{HttpError, HttpResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const AGENT: &str = concat!("fleetscale/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
enum Endpoint {
    /// `host:port` for TCP connections.
    Tcp { authority: String },
    /// Filesystem path of a unix domain socket.
    Unix { path: String },
}

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> HttpResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// HTTP client bound to one base URL.
///
/// Accepts `http://host[:port][/prefix]` and `unix:///path/to.sock`.
/// Request paths are appended to the prefix.
#[derive(Debug, Clone)]
pub struct HttpClient {
    endpoint: Endpoint,
    base_path: String,
    base_url: String,
    timeout: Duration,
}

impl HttpClient {
    /// Create a client for the given base URL.
    pub fn new(base_url: &str) -> HttpResult<Self> {
        let invalid = |reason: &str| HttpError::InvalidUrl {
            url: base_url.to_string(),
            reason: reason.to_string(),
        };

        if let Some(path) = base_url.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(invalid("missing socket path"));
            }
            return Ok(Self {
                endpoint: Endpoint::Unix {
                    path: path.to_string(),
                },
                base_path: String::new(),
                base_url: base_url.to_string(),
                timeout: DEFAULT_TIMEOUT,
            });
        }

        let uri: Uri = base_url.parse().map_err(|_| invalid("not a valid uri"))?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(_) => return Err(invalid("only http:// and unix:// are supported")),
            None => return Err(invalid("missing scheme")),
        }
        let authority = uri.authority().ok_or_else(|| invalid("missing host"))?;
        let port = authority.port_u16().unwrap_or(80);

        Ok(Self {
            endpoint: Endpoint::Tcp {
                authority: format!("{}:{port}", authority.host()),
            },
            base_path: uri.path().trim_end_matches('/').to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The base URL this client was built from.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform a request. `path` must start with `/` and may carry a query.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> HttpResult<HttpResponse> {
        let target = format!("{}{path}", self.base_path);
        let url = format!("{}{path}", self.base_url);

        let host = match &self.endpoint {
            Endpoint::Tcp { authority } => authority.as_str(),
            Endpoint::Unix { .. } => "localhost",
        };

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(target.as_str())
            .header(HOST, host)
            .header(USER_AGENT, AGENT);
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let request = builder.body(Full::new(Bytes::from(body.unwrap_or_default())))?;

        let exchange = async {
            match &self.endpoint {
                Endpoint::Tcp { authority } => {
                    let stream = tokio::net::TcpStream::connect(authority.as_str())
                        .await
                        .map_err(|source| HttpError::Connect {
                            endpoint: authority.clone(),
                            source,
                        })?;
                    exchange(stream, request).await
                }
                Endpoint::Unix { path } => {
                    let stream = tokio::net::UnixStream::connect(path.as_str())
                        .await
                        .map_err(|source| HttpError::Connect {
                            endpoint: path.clone(),
                            source,
                        })?;
                    exchange(stream, request).await
                }
            }
        };

        let response = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| HttpError::Timeout(url.clone()))??;

        debug!(%method, %url, status = %response.status, "http exchange");
        Ok(response)
    }

    /// GET a JSON document, failing on any non-2xx status.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> HttpResult<T> {
        let response = self.send(Method::GET, path, None).await?;
        self.check_success(path, &response)?;
        response.json()
    }

    /// Send a JSON body with the given method, failing on any non-2xx status.
    pub async fn send_json<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> HttpResult<HttpResponse> {
        let bytes = serde_json::to_vec(body)?;
        let response = self.send(method, path, Some(bytes)).await?;
        self.check_success(path, &response)?;
        Ok(response)
    }

    fn check_success(&self, path: &str, response: &HttpResponse) -> HttpResult<()> {
        if response.status.is_success() {
            Ok(())
        } else {
            Err(HttpError::Status {
                status: response.status,
                url: format!("{}{path}", self.base_url),
            })
        }
    }
}

/// Append `pairs` to `path` as a form-encoded query string.
pub fn with_query(path: &str, pairs: &[(&str, &str)]) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs)
        .finish();
    format!("{path}?{query}")
}

async fn exchange<S>(stream: S, request: Request<Full<Bytes>>) -> HttpResult<HttpResponse>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let response = sender.send_request(request).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes();
    Ok(HttpResponse { status, body })
}
