//! # range-relay
//!
//! Exercises HTTP range-based (chunked) content transfer end to end: an
//! [`axum`][1] server exposing one binary resource via full, partial
//! (byte-range), and conditional (fingerprint-validated) responses, and a
//! [`reqwest`][2] client that retrieves the same resource in one request or
//! as a plan of byte-range requests, fetched serially or concurrently, and
//! reassembles the original bytes in order.
//!
//! Server side: [`create_router`] serves `GET`/`HEAD /resource` with
//! `Accept-Ranges`, `Cache-Control`, `ETag`, and `Last-Modified` headers,
//! answering 304 on a matching `If-None-Match` fingerprint, 206 for a valid
//! `bytes=<start>-<end>` range, and 416 for a malformed one.
//!
//! Client side: [`Fetcher::fetch`] is the single entry point.
//!
//! ```no_run
//! use range_relay::{Fetcher, Strategy};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), range_relay::Error> {
//!     let fetcher = Fetcher::new();
//!     let content = fetcher
//!         .fetch("http://localhost:8085/resource", Strategy::ParallelChunks, 1_000_000)
//!         .await?;
//!     println!("{} bytes of {}", content.len(), content.content_type);
//!     Ok(())
//! }
//! ```
//!
//! [1]: https://docs.rs/axum
//! [2]: https://docs.rs/reqwest

pub mod client;
pub mod error;
pub mod range;
pub mod reassemble;
pub mod resource;
pub mod server;
pub mod source;
pub mod stream;

pub use client::{Concurrency, Fetcher, Strategy};
pub use error::{Error, Result};
pub use range::{ByteRange, parse_range_header, plan_chunks};
pub use reassemble::{ChunkPayload, Content, assemble};
pub use resource::{FingerprintCache, ResourceMeta, resolve};
pub use server::{AppState, create_router};
pub use source::{FileSource, RangeSource, SeekStart};
pub use stream::SpanStream;
