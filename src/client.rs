//! Chunk-fetch orchestration: retrieve a remote resource in one request or
//! as a plan of byte-range requests, serially or concurrently, and
//! reassemble the original bytes in order.
//!
//! Both chunked strategies consume the same plan from
//! [`plan_chunks`](crate::range::plan_chunks); they differ only in
//! scheduling. Any chunk failure aborts the whole orchestration with no
//! partial result and no retry.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::{StatusCode, header};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{Error, Result};
use crate::range::{ByteRange, plan_chunks};
use crate::reassemble::{ChunkPayload, Content, assemble};

/// How to retrieve the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Strategy {
    /// One GET for the whole body.
    Full,
    /// One range GET at a time, in ascending order.
    SerialChunks,
    /// All range GETs in flight concurrently.
    ParallelChunks,
}

/// Cap on how many chunk requests the parallel strategy keeps in flight.
///
/// The historical behaviour is [`Concurrency::Unlimited`], every chunk in
/// flight at once; it stays the default, but as an explicit choice rather
/// than a hidden one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Concurrency {
    #[default]
    Unlimited,
    Limit(usize),
}

/// Chunked-transfer client over a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct Fetcher {
    http: reqwest::Client,
    concurrency: Concurrency,
}

impl Fetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Fetcher { http, concurrency: Concurrency::default() }
    }

    /// Set the in-flight cap for [`Strategy::ParallelChunks`].
    pub fn concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// The single entry point: retrieve `url` with the given strategy and
    /// maximum chunk size, producing the reassembled content or the first
    /// failure.
    pub async fn fetch(&self, url: &str, strategy: Strategy, max_chunk_size: u64) -> Result<Content> {
        match strategy {
            Strategy::Full => self.fetch_full(url).await,
            Strategy::SerialChunks => self.fetch_serial(url, max_chunk_size).await,
            Strategy::ParallelChunks => self.fetch_parallel(url, max_chunk_size).await,
        }
    }

    /// Revalidate a previously retrieved fingerprint. `Ok(None)` means the
    /// cached copy is still current; `Ok(Some(content))` carries the fresh
    /// bytes.
    pub async fn revalidate(&self, url: &str, fingerprint: &str) -> Result<Option<Content>> {
        let response = self
            .http
            .get(url)
            .header(header::IF_NONE_MATCH, format!("\"{fingerprint}\""))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            tracing::info!(url, "cached copy is current");
            return Ok(None);
        }
        let response = check_status(url, response)?;
        let content_type = content_type_of(&response);
        let bytes = response.bytes().await?;
        Ok(Some(Content { bytes, content_type }))
    }

    async fn fetch_full(&self, url: &str) -> Result<Content> {
        tracing::info!(url, "requesting complete resource");
        let response = check_status(url, self.http.get(url).send().await?)?;
        let content_type = content_type_of(&response);
        let bytes = response.bytes().await?;
        Ok(Content { bytes, content_type })
    }

    async fn fetch_serial(&self, url: &str, max_chunk_size: u64) -> Result<Content> {
        let probe = self.probe(url).await?;
        let plan = plan_chunks(probe.size_bytes, max_chunk_size)?;
        tracing::info!(url, total_size = probe.size_bytes, chunks = plan.len(), "starting serial chunk fetch");

        // one request in flight at a time, receive order == range order
        let mut chunks = Vec::with_capacity(plan.len());
        for range in plan {
            let bytes = fetch_chunk(&self.http, url, range).await?;
            tracing::debug!(start = range.start, end = range.end, "received chunk");
            chunks.push(ChunkPayload { range, bytes });
        }

        Ok(assemble(chunks, probe.content_type))
    }

    async fn fetch_parallel(&self, url: &str, max_chunk_size: u64) -> Result<Content> {
        let probe = self.probe(url).await?;
        let plan = plan_chunks(probe.size_bytes, max_chunk_size)?;
        tracing::info!(url, total_size = probe.size_bytes, chunks = plan.len(), "starting parallel chunk fetch");

        let limiter = match self.concurrency {
            Concurrency::Unlimited => None,
            Concurrency::Limit(n) => Some(Arc::new(Semaphore::new(n))),
        };

        let mut tasks: JoinSet<Result<(ByteRange, Bytes)>> = JoinSet::new();
        for range in plan {
            let http = self.http.clone();
            let url = url.to_string();
            let limiter = limiter.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(s) => Some(s.acquire_owned().await.expect("chunk limiter is never closed")),
                    None => None,
                };
                let bytes = fetch_chunk(&http, &url, range).await?;
                Ok((range, bytes))
            });
        }

        // completion order races; key by offset and let the map restore
        // range order. The first failure propagates and dropping the set
        // aborts whatever is still in flight.
        let mut completed = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (range, bytes) = joined??;
            tracing::debug!(start = range.start, end = range.end, "received chunk");
            completed.insert(range.start, ChunkPayload { range, bytes });
        }

        Ok(assemble(completed.into_values().collect(), probe.content_type))
    }

    /// HEAD the resource to learn its size and content type before planning
    /// chunks.
    async fn probe(&self, url: &str) -> Result<Probe> {
        let response = check_status(url, self.http.head(url).send().await?)?;

        let size_bytes = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
            .ok_or(Error::MissingSize)?;

        Ok(Probe { size_bytes, content_type: content_type_of(&response) })
    }
}

struct Probe {
    size_bytes: u64,
    content_type: String,
}

/// Issue one range GET and return its payload. Anything other than 206 is a
/// chunk failure.
async fn fetch_chunk(http: &reqwest::Client, url: &str, range: ByteRange) -> Result<Bytes> {
    tracing::debug!(range = %range.header_value(), "requesting chunk");
    let response = http
        .get(url)
        .header(header::RANGE, range.header_value())
        .send()
        .await?;

    if response.status() != StatusCode::PARTIAL_CONTENT {
        return Err(Error::ChunkFetch { status: response.status() });
    }

    Ok(response.bytes().await?)
}

fn check_status(url: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    match response.status() {
        StatusCode::NOT_FOUND => Err(Error::NotFound(url.to_string())),
        status if !status.is_success() => Err(Error::ChunkFetch { status }),
        _ => Ok(response),
    }
}

fn content_type_of(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string()
}
