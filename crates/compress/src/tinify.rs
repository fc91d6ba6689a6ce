//! Tinify (TinyPNG) compression service client.
//!
//! Talks to the Tinify HTTP API directly:
//!
//! 1. `POST /shrink` with the raw image bytes. The response's `Location`
//!    header points at the compressed output.
//! 2. `GET <output>` downloads the compressed image as-is, or
//!    `POST <output>` with `{"convert": {"type": ["image/webp"]}}` downloads
//!    it converted to another format.
//!
//! Authentication is HTTP basic auth with the literal user `api` and the API
//! key as the password. Every response carries a `Compression-Count` header
//! with the number of compressions used this month; it's recorded for
//! logging.

use crate::error::{ErrorKind, Result};
use crate::{CompressionService, Handle, ImageFormat};
use async_trait::async_trait;
use exn::{OptionExt, ResultExt};
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::instrument;

const DEFAULT_ENDPOINT: &str = "https://api.tinify.com";
const COMPRESSION_COUNT_HEADER: &str = "compression-count";
const USER_AGENT: &str = concat!("imgsync/", env!("CARGO_PKG_VERSION"));
const API_USER: &str = "api";

/// Error body returned by the API on any non-2xx response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ConvertRequest {
    convert: ConvertOptions,
}
#[derive(Debug, Serialize)]
struct ConvertOptions {
    #[serde(rename = "type")]
    types: Vec<&'static str>,
}
impl ConvertRequest {
    fn to(format: ImageFormat) -> Self {
        Self {
            convert: ConvertOptions {
                types: vec![format.mime_type()],
            },
        }
    }
}

/// Tinify API client.
///
/// # Examples
///
/// ```no_run
/// use imgsync_compress::TinifyClient;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = TinifyClient::new("api-key")?;
/// # Ok(())
/// # }
/// ```
pub struct TinifyClient {
    http: Client,
    api_key: String,
    endpoint: String,
    compression_count: AtomicU64,
}

impl TinifyClient {
    /// Create a client for the public Tinify API.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build().or_raise(|| ErrorKind::Network)?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            compression_count: AtomicU64::new(0),
        })
    }

    /// Point the client at a different API host (proxies, test servers).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Compressions used this month, as last reported by the API.
    pub fn compression_count(&self) -> u64 {
        self.compression_count.load(Ordering::Relaxed)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(API_USER, Some(&self.api_key))
    }

    /// The API hands out absolute URLs, but be lenient with relative ones.
    fn resolve_location(&self, location: &str) -> String {
        match location.starts_with('/') {
            true => format!("{}{}", self.endpoint, location),
            false => location.to_string(),
        }
    }

    fn record_count(&self, headers: &HeaderMap) {
        if let Some(count) = parse_compression_count(headers) {
            self.compression_count.store(count, Ordering::Relaxed);
            tracing::debug!(count, "Tinify compression count");
        }
    }

    async fn check(&self, response: Response) -> Result<Response> {
        self.record_count(response.headers());
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.json::<ApiError>().await.ok();
        exn::bail!(classify(status, body));
    }
}

fn parse_compression_count(headers: &HeaderMap) -> Option<u64> {
    headers.get(COMPRESSION_COUNT_HEADER)?.to_str().ok()?.trim().parse().ok()
}

/// Map an unsuccessful response onto an actionable error.
fn classify(status: StatusCode, body: Option<ApiError>) -> ErrorKind {
    let message = match body {
        Some(ApiError { error, message }) => format!("{error}: {message}"),
        None => status.to_string(),
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => ErrorKind::QuotaExceeded,
        s if s.is_client_error() => ErrorKind::InvalidImage(message),
        s if s.is_server_error() => ErrorKind::Server(message),
        _ => ErrorKind::InvalidResponse(message),
    }
}

#[async_trait]
impl CompressionService for TinifyClient {
    fn name(&self) -> &str {
        "tinify"
    }

    #[instrument(skip(self, data), fields(input_size = data.len()))]
    async fn submit(&self, data: Vec<u8>) -> Result<Handle> {
        let url = format!("{}/shrink", self.endpoint);
        let response =
            self.authorized(self.http.post(url)).body(data).send().await.or_raise(|| ErrorKind::Network)?;
        let response = self.check(response).await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_raise(|| ErrorKind::InvalidResponse("missing Location header".to_string()))?;
        Ok(Handle::new(self.resolve_location(location)))
    }

    #[instrument(skip(self, handle), fields(location = handle.location(), output_size))]
    async fn fetch(&self, handle: &Handle) -> Result<Vec<u8>> {
        let request = match handle.conversion() {
            Some(format) => self.http.post(handle.location()).json(&ConvertRequest::to(format)),
            None => self.http.get(handle.location()),
        };
        let response = self.authorized(request).send().await.or_raise(|| ErrorKind::Network)?;
        let response = self.check(response).await?;
        let data = response.bytes().await.or_raise(|| ErrorKind::Network)?;
        tracing::Span::current().record("output_size", data.len());
        Ok(data.to_vec())
    }
}
