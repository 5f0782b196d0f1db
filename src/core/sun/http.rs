//! Sun over HTTPS.
//!
//! Reads retry on transient failures with capped exponential backoff and
//! jitter. Writes retry only when they carry `if_match_rev` and the server
//! turned them away unapplied (408, 425, 429, 503).

use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::Rng;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::{checksum, Metadata, ObjectMeta, ObjectPayload, ObjectRevision, PutRequest, SunStore};
use crate::core::config::SunSettings;
use crate::core::constants::DEFAULT_PAYLOAD_CAP;
use crate::error::{Result, SunError};

const MAX_TOKEN_CHARS: usize = 256;
const READ_RETRIES: u32 = 2;
const WRITE_RETRIES: u32 = 2;
const BASE_DELAY: Duration = Duration::from_millis(200);
const MAX_DELAY: Duration = Duration::from_secs(2);
const ACCOUNT_HEADER: &str = "X-Sun-Account";

/// Connection options for [`HttpSun`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub list_timeout: Duration,
    pub payload_cap: usize,
    pub account: Option<String>,
    pub allow_insecure_http: bool,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            list_timeout: Duration::from_secs(20),
            payload_cap: DEFAULT_PAYLOAD_CAP,
            account: None,
            allow_insecure_http: false,
        }
    }
}

/// HTTP client for the Sun object API.
pub struct HttpSun {
    base: Url,
    client: Client,
    options: HttpOptions,
}

impl std::fmt::Debug for HttpSun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSun")
            .field("base", &self.base.as_str())
            .field("options", &self.options)
            .finish()
    }
}

#[derive(Serialize)]
struct PutBody<'a> {
    content_type: &'a str,
    payload_base64: String,
    #[serde(skip_serializing_if = "is_empty_map")]
    metadata: &'a Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_revision: Option<u64>,
}

fn is_empty_map(metadata: &&Metadata) -> bool {
    metadata.is_empty()
}

#[derive(Deserialize)]
struct Items<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize, Default)]
struct PutResponse {
    #[serde(default)]
    result: PutResult,
}

#[derive(Deserialize, Default)]
struct PutResult {
    #[serde(default)]
    object: LatestRevision,
    #[serde(default)]
    revision: RevisionNumber,
}

#[derive(Deserialize, Default)]
struct LatestRevision {
    #[serde(default)]
    latest_revision: u64,
}

#[derive(Deserialize, Default)]
struct RevisionNumber {
    #[serde(default)]
    revision: u64,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl HttpSun {
    /// Build a client from resolved settings.
    ///
    /// # Errors
    ///
    /// `NotConfigured` without a base URL or token, or when either is
    /// malformed.
    pub fn from_settings(settings: &SunSettings) -> Result<Self> {
        let base_url = settings
            .base_url
            .as_deref()
            .ok_or_else(|| SunError::NotConfigured("no base URL".into()))?;
        let token = settings
            .token
            .as_deref()
            .ok_or_else(|| SunError::NotConfigured("no token".into()))?;
        let options = HttpOptions {
            timeout: settings.timeout(),
            list_timeout: settings.list_timeout(),
            payload_cap: settings.payload_cap(),
            account: settings.account.clone(),
            allow_insecure_http: settings.allow_insecure_http.or(false),
        };
        Self::new(base_url, token, options)
    }

    /// Build a client.
    ///
    /// # Errors
    ///
    /// `NotConfigured` if the URL is not https (loopback http is allowed)
    /// or the token is empty, too long, or contains whitespace.
    pub fn new(base_url: &str, token: &str, options: HttpOptions) -> Result<Self> {
        let base = validate_base_url(base_url, options.allow_insecure_http)?;
        let token = Zeroizing::new(validate_token(token)?.to_string());

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
            .map_err(|_| SunError::NotConfigured("token is not a valid header value".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        if let Some(account) = options.account.as_deref().filter(|a| !a.trim().is_empty()) {
            let value = HeaderValue::from_str(account.trim())
                .map_err(|_| SunError::NotConfigured("invalid account".into()))?;
            headers.insert(ACCOUNT_HEADER, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .user_agent(concat!("si/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SunError::NotConfigured(e.to_string()))?;

        debug!(base = %base, "sun client ready");
        Ok(Self {
            base,
            client,
            options,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SunError::NotConfigured("base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn list_url(&self, kind: &str, name: Option<&str>, prefix: &str, limit: usize) -> Result<Url> {
        let mut url = self.url(&["v1", "objects"])?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("kind", kind);
            if let Some(name) = name {
                query.append_pair("name", name);
            }
            if !prefix.is_empty() {
                query.append_pair("prefix", prefix);
            }
            if limit > 0 {
                query.append_pair("limit", &limit.to_string());
            }
        }
        Ok(url)
    }

    /// Send under `retry`. `what` names the object for error messages.
    fn send(
        &self,
        retry: Retry,
        what: (&str, &str),
        build: impl Fn() -> RequestBuilder,
    ) -> Result<Response> {
        let retries = retry.attempts();
        let mut attempt = 0;
        loop {
            match build().send() {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) => {
                    let status = resp.status();
                    if attempt < retries && retry.on_status(status) {
                        let delay = retry_delay(attempt, retry_after(&resp));
                        warn!(status = status.as_u16(), attempt, "sun request failed, retrying");
                        thread::sleep(delay);
                        attempt += 1;
                        continue;
                    }
                    return Err(self.status_error(resp, what).into());
                }
                Err(e) => {
                    if attempt < retries && retry.on_transport(&e) {
                        warn!(error = %e, attempt, "sun transport error, retrying");
                        thread::sleep(retry_delay(attempt, None));
                        attempt += 1;
                        continue;
                    }
                    return Err(SunError::Unavailable(e.to_string()).into());
                }
            }
        }
    }

    fn status_error(&self, resp: Response, (kind, name): (&str, &str)) -> SunError {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.trim().chars().take(200).collect());
        let detail = if message.is_empty() {
            status.to_string()
        } else {
            format!("{}: {}", status.as_u16(), message)
        };

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SunError::Unauthorized(detail),
            StatusCode::NOT_FOUND => SunError::NotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            },
            StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => SunError::Conflict {
                kind: kind.to_string(),
                name: name.to_string(),
                detail,
            },
            StatusCode::PAYLOAD_TOO_LARGE => SunError::TooLarge {
                size: 0,
                cap: self.options.payload_cap,
            },
            s if is_retryable(s) => SunError::Unavailable(detail),
            _ => SunError::Protocol(detail),
        }
    }

    fn lookup(&self, kind: &str, name: &str) -> Result<ObjectMeta> {
        let url = self.list_url(kind, Some(name), "", 1)?;
        let resp = self.send(Retry::Read, (kind, name), || {
            self.client
                .get(url.clone())
                .timeout(self.options.timeout)
        })?;
        let parsed: Items<ObjectMeta> = resp
            .json()
            .map_err(|e| SunError::Protocol(format!("parse list response: {}", e)))?;
        parsed
            .items
            .into_iter()
            .find(|m| m.name == name)
            .ok_or_else(|| {
                SunError::NotFound {
                    kind: kind.to_string(),
                    name: name.to_string(),
                }
                .into()
            })
    }
}

impl SunStore for HttpSun {
    fn put(&self, req: PutRequest<'_>) -> Result<u64> {
        if req.payload.len() > self.options.payload_cap {
            return Err(SunError::TooLarge {
                size: req.payload.len(),
                cap: self.options.payload_cap,
            }
            .into());
        }
        let url = self.url(&["v1", "objects", req.kind, req.name])?;
        let body = PutBody {
            content_type: req.content_type,
            payload_base64: STANDARD.encode(req.payload),
            metadata: &req.metadata,
            expected_revision: req.if_match_rev,
        };
        let retry = if req.if_match_rev.is_some() {
            Retry::GatedWrite
        } else {
            Retry::Never
        };

        let resp = self.send(retry, (req.kind, req.name), || {
            self.client.put(url.clone()).json(&body)
        })?;
        let parsed: PutResponse = resp
            .json()
            .map_err(|e| SunError::Protocol(format!("parse put response: {}", e)))?;
        let revision = match parsed.result.revision.revision {
            0 => parsed.result.object.latest_revision,
            r => r,
        };
        debug!(kind = req.kind, name = req.name, revision, "sun put");
        Ok(revision)
    }

    /// Metadata comes from a listing and the bytes from `/payload`, which
    /// carries no revision. The pair is accepted only when the bytes match
    /// the listed SHA-256 checksum or, without one, when a second lookup
    /// still reports the same revision.
    fn get_payload(&self, kind: &str, name: &str) -> Result<ObjectPayload> {
        let url = self.url(&["v1", "objects", kind, name, "payload"])?;
        let mut attempt = 0;
        loop {
            let meta = self.lookup(kind, name)?;
            let resp = self.send(Retry::Read, (kind, name), || {
                self.client.get(url.clone()).timeout(self.options.timeout)
            })?;
            let payload = resp
                .bytes()
                .map_err(|e| SunError::Unavailable(format!("read payload: {}", e)))?
                .to_vec();

            let consistent = if is_sha256_hex(&meta.checksum) {
                checksum(&payload).eq_ignore_ascii_case(&meta.checksum)
            } else {
                self.lookup(kind, name)?.latest_revision == meta.latest_revision
            };
            if consistent {
                debug!(kind, name, revision = meta.latest_revision, "sun get");
                return Ok(ObjectPayload {
                    payload,
                    content_type: meta.content_type,
                    metadata: meta.metadata,
                    revision: meta.latest_revision,
                });
            }
            if attempt >= READ_RETRIES {
                return Err(SunError::Protocol(format!(
                    "{}/{} kept changing while it was read",
                    kind, name
                ))
                .into());
            }
            debug!(kind, name, revision = meta.latest_revision, "object changed during read");
            attempt += 1;
        }
    }

    fn list(&self, kind: &str, prefix: &str, limit: usize) -> Result<Vec<ObjectMeta>> {
        let url = self.list_url(kind, None, prefix, limit)?;
        let resp = self.send(Retry::Read, (kind, prefix), || {
            self.client
                .get(url.clone())
                .timeout(self.options.list_timeout)
        })?;
        let parsed: Items<ObjectMeta> = resp
            .json()
            .map_err(|e| SunError::Protocol(format!("parse list response: {}", e)))?;
        let mut items = parsed.items;
        items.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(b.latest_revision.cmp(&a.latest_revision))
        });
        debug!(kind, count = items.len(), "sun list");
        Ok(items)
    }

    fn list_revisions(
        &self,
        kind: &str,
        name: &str,
        limit: usize,
    ) -> Result<Vec<ObjectRevision>> {
        let mut url = self.url(&["v1", "objects", kind, name, "revisions"])?;
        if limit > 0 {
            url.query_pairs_mut()
                .append_pair("limit", &limit.to_string());
        }
        let resp = self.send(Retry::Read, (kind, name), || {
            self.client.get(url.clone()).timeout(self.options.timeout)
        })?;
        let parsed: Items<ObjectRevision> = resp
            .json()
            .map_err(|e| SunError::Protocol(format!("parse revisions response: {}", e)))?;
        let mut items = parsed.items;
        items.sort_by(|a, b| b.revision.cmp(&a.revision));
        Ok(items)
    }
}

fn validate_base_url(raw: &str, allow_insecure_http: bool) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SunError::NotConfigured("no base URL".into()).into());
    }
    let url = Url::parse(raw)
        .map_err(|e| SunError::NotConfigured(format!("invalid base URL {}: {}", raw, e)))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if allow_insecure_http || is_loopback(&url) => Ok(url),
        "http" => Err(SunError::NotConfigured(format!(
            "refusing insecure http base URL {} (only loopback hosts may use http)",
            raw
        ))
        .into()),
        other => Err(SunError::NotConfigured(format!("unsupported scheme {}", other)).into()),
    }
}

fn is_loopback(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<std::net::IpAddr>()
            .is_ok_and(|ip| ip.is_loopback())
}

fn validate_token(token: &str) -> Result<&str> {
    let token = token.trim();
    if token.is_empty() {
        return Err(SunError::NotConfigured("token is empty".into()).into());
    }
    if token.chars().count() > MAX_TOKEN_CHARS {
        return Err(SunError::NotConfigured(format!(
            "token is longer than {} characters",
            MAX_TOKEN_CHARS
        ))
        .into());
    }
    if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(SunError::NotConfigured("token contains whitespace".into()).into());
    }
    Ok(token)
}

/// When a failed request may be sent again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Idempotent reads: retryable statuses and transport failures.
    Read,
    /// Writes carrying `expected_revision`: only statuses that mean the
    /// server turned the request away without applying it.
    GatedWrite,
    Never,
}

impl Retry {
    fn attempts(self) -> u32 {
        match self {
            Retry::Read => READ_RETRIES,
            Retry::GatedWrite => WRITE_RETRIES,
            Retry::Never => 0,
        }
    }

    fn on_status(self, status: StatusCode) -> bool {
        match self {
            Retry::Read => is_retryable(status),
            Retry::GatedWrite => is_turned_away(status),
            Retry::Never => false,
        }
    }

    fn on_transport(self, err: &reqwest::Error) -> bool {
        self == Retry::Read && is_transient(err)
    }
}

/// 408, 425, 429 and 503: the write was not applied.
fn is_turned_away(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::SERVICE_UNAVAILABLE
        || status.as_u16() == 425
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.as_u16() == 425
        || status.is_server_error()
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// `min(base * 2^attempt, max)` plus up to 25% jitter; `Retry-After` wins
/// when the server sends one.
fn retry_delay(attempt: u32, retry_after: Option<Duration>) -> Duration {
    if let Some(delay) = retry_after {
        return delay.min(MAX_DELAY * 2);
    }
    let backoff = BASE_DELAY
        .saturating_mul(1u32 << attempt.min(8))
        .min(MAX_DELAY);
    let jitter_ms = rand::thread_rng().gen_range(0..=backoff.as_millis() as u64 / 4);
    backoff + Duration::from_millis(jitter_ms)
}
