use std::time::{Duration, Instant};

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::config::HttpCfg;
use crate::error::{CoreResult, RecallError};
use crate::telemetry::{KEY_LATENCY_MS, KEY_REQUEST_ID};

/// Request context carries the caller's correlation id.
#[derive(Clone, Copy, Default)]
pub struct RequestCtx<'a> {
    pub request_id: Option<&'a str>,
}

/// Represents a single Server-Sent-Event line (already split on `\n`).
#[derive(Debug, Clone)]
pub struct SseLine {
    pub line: String,
}

/// A boxed stream of `SseLine` results.
pub type SseStream =
    std::pin::Pin<Box<dyn futures_util::stream::Stream<Item = CoreResult<SseLine>> + Send>>;

/// Body of a generation response.
pub enum ResponseBody {
    /// `text/event-stream` (or anything that is not JSON): read line by line.
    Lines(SseStream),
    /// `application/json`: the whole body, read eagerly.
    Document(String),
}

/// Thin wrapper around reqwest::Client with defaults and helpers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
    bearer: Option<SecretString>,
    request_timeout: Duration,
}

impl HttpClient {
    pub fn new_default() -> CoreResult<Self> {
        Self::from_cfg(&HttpCfg::default())
    }

    pub fn from_cfg(cfg: &HttpCfg) -> CoreResult<Self> {
        // No client-wide total timeout: generation bodies stream for as long as the
        // service keeps producing. JSON calls get a per-request timeout instead.
        let mut builder = Client::builder().connect_timeout(Duration::from_millis(cfg.connect_timeout_ms));
        if let Some(n) = cfg.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(n);
        }
        let inner = builder
            .build()
            .map_err(|e| RecallError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            inner,
            user_agent: "recall/0.1".to_string(),
            bearer: None,
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
        })
    }

    /// Attach `Authorization: Bearer <token>` to every request.
    pub fn with_bearer(mut self, token: SecretString) -> Self {
        self.bearer = Some(token);
        self
    }

    fn request(&self, method: Method, url: &str, ctx: &RequestCtx<'_>) -> RequestBuilder {
        let mut req = self
            .inner
            .request(method, url)
            .header("User-Agent", &self.user_agent);
        if let Some(token) = &self.bearer {
            req = req.bearer_auth(token.expose_secret());
        }
        if let Some(rid) = ctx.request_id {
            req = req.header("X-Request-Id", rid);
        }
        req
    }

    async fn send(req: RequestBuilder) -> CoreResult<reqwest::Response> {
        let resp = req.send().await.map_err(|e| RecallError::ServiceUnavailable {
            reason: format!("request failed: {e}"),
        })?;
        let status = resp.status();
        if !status.is_success() {
            let headers = resp.headers().clone();
            let ra = parse_retry_after(&headers);
            let body = resp.text().await.unwrap_or_default();
            return Err(map_http_error(status, ra, &body));
        }
        Ok(resp)
    }

    /// Send an optional JSON body and decode a JSON reply.
    /// Returns the decoded value and the latency in milliseconds.
    pub async fn send_json<T: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&T>,
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<(R, u32)> {
        let start = Instant::now();
        let mut req = self.request(method.clone(), url, ctx).timeout(self.request_timeout);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = Self::send(req).await?;
        let latency = start.elapsed().as_millis() as u32;
        let status = resp.status();

        let text = resp.text().await.map_err(|e| RecallError::ServiceUnavailable {
            reason: format!("reading body failed: {e}"),
        })?;
        // Some endpoints answer 204 / an empty body; treat that as JSON null.
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        let parsed = serde_json::from_str::<R>(text).map_err(|e| RecallError::ServiceError {
            code: status.as_u16().to_string(),
            message: format!("json decode error: {e}"),
        })?;
        debug!(
            %method,
            url,
            { KEY_REQUEST_ID } = ctx.request_id.unwrap_or(""),
            { KEY_LATENCY_MS } = latency,
            "json call ok"
        );
        Ok((parsed, latency))
    }

    /// Send a JSON body and discard the reply, caring only about the status.
    pub async fn send_unit<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        body: Option<&T>,
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<u32> {
        let (_, latency) = self
            .send_json::<T, serde_json::Value>(method, url, body, ctx)
            .await?;
        Ok(latency)
    }

    /// POST JSON and return the response body as an SSE line stream, or as a whole
    /// document when the service answers with `application/json`.
    ///
    /// The request timeout bounds only the wait for the response head. Once the body
    /// streams, `idle_timeout` bounds the silence between two body chunks.
    pub async fn post_sse<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        idle_timeout: Option<Duration>,
        ctx: &RequestCtx<'_>,
    ) -> CoreResult<ResponseBody> {
        let req = self
            .request(Method::POST, url, ctx)
            .json(body)
            .header("Accept", "text/event-stream")
            .header("Cache-Control", "no-cache");
        let resp = tokio::time::timeout(self.request_timeout, Self::send(req))
            .await
            .map_err(|_| RecallError::ServiceUnavailable {
                reason: format!("no response within {} ms", self.request_timeout.as_millis()),
            })??;

        let is_json = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        if is_json {
            let text = resp.text().await.map_err(|e| RecallError::StreamAborted {
                reason: format!("reading body failed: {e}"),
            })?;
            return Ok(ResponseBody::Document(text));
        }

        // Stream body as bytes and split on '\n'
        let byte_stream = resp.bytes_stream();
        let line_stream = LineStream::new(Box::pin(byte_stream), idle_timeout);
        Ok(ResponseBody::Lines(Box::pin(line_stream)))
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    if let Some(v) = headers.get("retry-after")
        && let Ok(s) = v.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        return Some(secs);
    }
    // HTTP-date forms are ignored.
    None
}

/// Prefer the service's own `{"message": ...}` over the raw body.
fn error_message(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrBody {
        message: String,
    }
    match serde_json::from_str::<ErrBody>(body) {
        Ok(b) => truncate(&b.message, 300),
        Err(_) => truncate(body, 300),
    }
}

fn map_http_error(status: StatusCode, retry_after: Option<u64>, body: &str) -> RecallError {
    match status {
        StatusCode::UNAUTHORIZED => RecallError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => RecallError::RateLimited { retry_after },
        s if s.is_server_error() => RecallError::ServiceUnavailable {
            reason: format!("{} {}", s.as_u16(), error_message(body)),
        },
        s => RecallError::ServiceError {
            code: s.as_u16().to_string(),
            message: error_message(body),
        },
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        let mut t = s[..end].to_string();
        t.push_str("...");
        t
    } else {
        s.to_string()
    }
}

/// Internal line splitter over a bytes stream; yields `SseLine`s separated by '\n'.
///
/// Bytes are buffered until a newline arrives so multi-byte characters split
/// across chunks decode intact. With an idle limit, the clock restarts on every
/// chunk; a line may take any time to complete as long as its chunks keep coming.
struct LineStream {
    inner: ByteStream,
    buf: Vec<u8>,
    done: bool,
    idle: Option<Duration>,
    idle_deadline: Option<std::pin::Pin<Box<tokio::time::Sleep>>>,
}

type ByteStream = std::pin::Pin<
    Box<dyn futures_util::stream::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>,
>;

impl LineStream {
    fn new(inner: ByteStream, idle: Option<Duration>) -> Self {
        Self {
            inner,
            buf: Vec::new(),
            done: false,
            idle,
            idle_deadline: None,
        }
    }

    fn take_line(&mut self) -> Option<SseLine> {
        let idx = self.buf.iter().position(|b| *b == b'\n')?;
        let mut raw: Vec<u8> = self.buf.drain(..=idx).collect();
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        Some(SseLine {
            line: String::from_utf8_lossy(&raw).into_owned(),
        })
    }
}

impl futures_util::stream::Stream for LineStream {
    type Item = CoreResult<SseLine>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        use std::future::Future;
        use std::task::Poll;
        loop {
            // If we already have a newline in the buffer, split and yield immediately.
            if let Some(line) = self.take_line() {
                return Poll::Ready(Some(Ok(line)));
            }
            if self.done {
                return Poll::Ready(None);
            }

            // Otherwise, poll the inner stream for more bytes
            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    self.idle_deadline = None;
                    self.buf.extend_from_slice(&chunk);
                    continue;
                }
                Poll::Ready(Some(Err(e))) => {
                    self.done = true;
                    self.buf.clear();
                    return Poll::Ready(Some(Err(RecallError::StreamAborted {
                        reason: format!("body read failed: {e}"),
                    })));
                }
                Poll::Ready(None) => {
                    self.done = true;
                    if self.buf.is_empty() {
                        return Poll::Ready(None);
                    }
                    let tail = std::mem::take(&mut self.buf);
                    return Poll::Ready(Some(Ok(SseLine {
                        line: String::from_utf8_lossy(&tail).into_owned(),
                    })));
                }
                Poll::Pending => {
                    let Some(limit) = self.idle else {
                        return Poll::Pending;
                    };
                    let deadline = self
                        .idle_deadline
                        .get_or_insert_with(|| Box::pin(tokio::time::sleep(limit)));
                    if deadline.as_mut().poll(cx).is_pending() {
                        return Poll::Pending;
                    }
                    self.done = true;
                    self.buf.clear();
                    self.idle_deadline = None;
                    return Poll::Ready(Some(Err(RecallError::StreamAborted {
                        reason: format!("no data for {} ms", limit.as_millis()),
                    })));
                }
            }
        }
    }
}
