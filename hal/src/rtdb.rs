//! Realtime database client
//!
//! Talks to a Firebase-style realtime database over its REST interface:
//! - one-shot reads: `GET <url>/<path>.json`
//! - subscriptions: the same URL with `Accept: text/event-stream`, which
//!   streams `put` / `patch` events relative to the subscribed path
//!
//! The stream carries deltas, so the client keeps a local copy of the
//! document and hands the whole value to subscribers after every change.

use crate::{HalError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

/// One notification from a subscription
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    /// Current value at the path; `None` when the path holds no data
    Snapshot(Option<Value>),
    /// Delivery problem; the subscription keeps retrying unless the channel closes
    Error(String),
}

/// Path-addressable document source
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Read the current value once. `Ok(None)` means the path is empty.
    async fn fetch(&self) -> Result<Option<Value>>;

    /// Start a subscription. Fails if the stream cannot be opened at all.
    async fn subscribe(&self) -> Result<mpsc::Receiver<SourceEvent>>;

    /// Human-readable location of the document, for status messages
    fn describe(&self) -> String;
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct RtdbConfig {
    pub database_url: String,
    pub path: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_backoff: Duration,
}

impl Default for RtdbConfig {
    fn default() -> Self {
        Self {
            database_url: "https://vigil1-default-rtdb.firebaseio.com".to_string(),
            path: "wildeye".to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// REST client for one document path
pub struct RtdbClient {
    config: RtdbConfig,
    url: String,
    http: reqwest::Client,
    stream_http: reqwest::Client,
}

impl RtdbClient {
    pub fn new(config: RtdbConfig) -> Result<Self> {
        let base = config.database_url.trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(HalError::InvalidConfig(format!(
                "database url must be http(s): {}",
                config.database_url
            )));
        }
        let url = format!("{}/{}.json", base, config.path.trim_matches('/'));

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        // Streams stay open indefinitely, so only the connect phase is bounded
        let stream_http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            config,
            url,
            http,
            stream_http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SnapshotSource for RtdbClient {
    async fn fetch(&self) -> Result<Option<Value>> {
        let response = self.http.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(HalError::SourceUnavailable(format!(
                "GET {} returned {}",
                self.url,
                response.status()
            )));
        }

        let body = response.bytes().await?;
        let value: Value = serde_json::from_slice(&body)?;
        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn subscribe(&self) -> Result<mpsc::Receiver<SourceEvent>> {
        let first = open_stream(&self.stream_http, &self.url).await?;
        let (tx, rx) = mpsc::channel(64);

        let client = self.stream_http.clone();
        let url = self.url.clone();
        let max_backoff = self.config.max_backoff;

        tokio::spawn(async move {
            run_stream(client, url, first, tx, max_backoff).await;
        });

        tracing::info!("Subscribed to {}", self.url);
        Ok(rx)
    }

    fn describe(&self) -> String {
        format!("/{}", self.config.path.trim_matches('/'))
    }
}

async fn open_stream(client: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(HalError::SourceUnavailable(format!(
            "stream {} returned {}",
            url,
            response.status()
        )));
    }
    Ok(response)
}

async fn run_stream(
    client: reqwest::Client,
    url: String,
    first: reqwest::Response,
    tx: mpsc::Sender<SourceEvent>,
    max_backoff: Duration,
) {
    let mut pending = Some(first);
    let mut backoff = Duration::from_secs(1);

    loop {
        let response = match pending.take() {
            Some(response) => response,
            None => match open_stream(&client, &url).await {
                Ok(response) => {
                    tracing::info!("Stream reconnected: {}", url);
                    response
                }
                Err(e) => {
                    tracing::warn!("Stream reconnect failed, retrying in {:?}: {}", backoff, e);
                    if tx.send(SourceEvent::Error(e.to_string())).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(max_backoff);
                    continue;
                }
            },
        };
        backoff = Duration::from_secs(1);

        match pump(response, &tx).await {
            Ok(()) => {
                if tx.is_closed() {
                    return;
                }
                tracing::warn!("Stream closed by server: {}", url);
                if tx.send(SourceEvent::Error("stream closed".to_string())).await.is_err() {
                    return;
                }
            }
            Err(HalError::StreamCancelled(reason)) => {
                tracing::error!("Stream cancelled: {}", reason);
                let _ = tx.send(SourceEvent::Error(format!("cancelled: {}", reason))).await;
                return;
            }
            Err(e) => {
                tracing::warn!("Stream error: {}", e);
                if tx.send(SourceEvent::Error(e.to_string())).await.is_err() {
                    return;
                }
            }
        }

        tokio::time::sleep(backoff).await;
    }
}

/// Read one connection until it ends, forwarding document snapshots
async fn pump(mut response: reqwest::Response, tx: &mpsc::Sender<SourceEvent>) -> Result<()> {
    let mut decoder = SseDecoder::default();
    let mut document = Value::Null;

    while let Some(chunk) = response.chunk().await? {
        for event in decoder.feed(&chunk) {
            if let Some(snapshot) = apply_event(&mut document, &event)? {
                if tx.send(SourceEvent::Snapshot(snapshot)).await.is_err() {
                    return Ok(());
                }
            }
        }
    }

    Ok(())
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: String,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feed raw bytes, returning every event completed by them
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.event.is_empty() || !self.data.is_empty() {
                    events.push(SseEvent {
                        event: std::mem::take(&mut self.event),
                        data: std::mem::take(&mut self.data).join("\n"),
                    });
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = value.to_string(),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        events
    }
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

/// Apply one stream event to the local document.
///
/// Returns the new document value when it changed.
pub fn apply_event(document: &mut Value, event: &SseEvent) -> Result<Option<Option<Value>>> {
    match event.event.as_str() {
        "put" | "patch" => {
            let payload: StreamPayload = serde_json::from_str(&event.data)?;
            if event.event == "put" {
                put_at(document, &payload.path, payload.data);
            } else if let Value::Object(fields) = payload.data {
                for (key, value) in fields {
                    let child = format!("{}/{}", payload.path.trim_end_matches('/'), key);
                    put_at(document, &child, value);
                }
            }

            let snapshot = if document.is_null() {
                None
            } else {
                Some(document.clone())
            };
            Ok(Some(snapshot))
        }
        "keep-alive" => Ok(None),
        "cancel" => Err(HalError::StreamCancelled(event.data.clone())),
        "auth_revoked" => Err(HalError::StreamCancelled("credential expired".to_string())),
        other => {
            tracing::debug!("Ignoring stream event {:?}", other);
            Ok(None)
        }
    }
}

/// Set `value` at a slash-separated path, creating objects along the way.
/// A null value deletes the key.
fn put_at(document: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        *document = value;
        return;
    };

    let mut node = document;
    for segment in parents {
        if !node.is_object() {
            if value.is_null() {
                return;
            }
            *node = Value::Object(Default::default());
        }
        let Value::Object(map) = node else { return };
        node = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Default::default()));
    }

    if value.is_null() {
        if let Value::Object(map) = node {
            map.remove(*last);
        }
        return;
    }
    if !node.is_object() {
        *node = Value::Object(Default::default());
    }
    if let Value::Object(map) = node {
        map.insert(last.to_string(), value);
    }
}
