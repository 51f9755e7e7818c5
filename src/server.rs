//! Range-aware delivery of a single resource over HTTP.
//!
//! Response shape, header set, and status codes follow classic static-file
//! range semantics:
//!
//! - `GET /resource` → 200 with the full body, or 304 when `If-None-Match`
//!   carries the current fingerprint.
//! - `GET /resource` + `Range: bytes=<start>-<end>` → 206 with exactly that
//!   span and a `Content-Range` header.
//! - `HEAD /resource` → the same header set with no body.
//!
//! A malformed range header is answered with 416, never silently downgraded
//! to a full response.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum_extra::headers::{
    AcceptRanges, CacheControl, ContentLength, ContentRange, ETag, HeaderMapExt, LastModified,
};

use crate::error::Error;
use crate::range::parse_range_header;
use crate::resource::{FingerprintCache, ResourceMeta, resolve};
use crate::source::FileSource;
use crate::stream::SpanStream;

/// Cache lifetime hint attached to every resource response, one year.
const CACHE_MAX_AGE: Duration = Duration::from_secs(31_536_000);

/// Shared server state: the one resource being served and the process-wide
/// fingerprint memo.
#[derive(Debug)]
pub struct AppState {
    pub resource_path: PathBuf,
    pub fingerprints: FingerprintCache,
}

impl AppState {
    pub fn new(resource_path: PathBuf) -> Self {
        AppState {
            resource_path,
            fingerprints: FingerprintCache::new(),
        }
    }
}

/// Build the resource router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/resource", get(get_resource).head(head_resource))
        .with_state(state)
}

/// Discoverability and caching headers common to every response for the
/// resource, conditional or not.
fn base_headers(meta: &ResourceMeta) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.typed_insert(AcceptRanges::bytes());
    headers.typed_insert(CacheControl::new().with_max_age(CACHE_MAX_AGE));
    headers.typed_insert(LastModified::from(meta.last_modified));
    if let Ok(etag) = format!("\"{}\"", meta.fingerprint).parse::<ETag>() {
        headers.typed_insert(etag);
    }
    if let Ok(content_type) = HeaderValue::from_str(&meta.content_type) {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    headers
}

/// Exact, case-sensitive comparison of the client's `If-None-Match` value
/// against the quoted current fingerprint. No weak-comparison semantics.
fn client_has_current(request: &HeaderMap, meta: &ResourceMeta) -> bool {
    request
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("\"{}\"", meta.fingerprint))
}

async fn get_resource(State(state): State<Arc<AppState>>, request: HeaderMap) -> Response {
    let meta = match resolve(&state.resource_path, &state.fingerprints).await {
        Ok(meta) => meta,
        Err(err) => return resolve_failure(err),
    };
    let headers = base_headers(&meta);

    // conditional validation wins over any requested range
    if client_has_current(&request, &meta) {
        tracing::info!(path = %state.resource_path.display(), "client has current version");
        return (StatusCode::NOT_MODIFIED, headers).into_response();
    }

    let source = match FileSource::open(&state.resource_path).await {
        Ok(source) => source,
        Err(err) => return resolve_failure(Error::Io(err)),
    };

    match request.get(header::RANGE).map(|value| value.to_str()) {
        None => {
            tracing::info!(path = %state.resource_path.display(), size = meta.size_bytes, "serving complete resource");
            (StatusCode::OK, headers, SpanStream::full(source)).into_response()
        }
        Some(raw) => {
            let parsed = raw
                .map_err(|_| Error::RangeParse("non-ascii range header".to_string()))
                .and_then(|raw| parse_range_header(raw, meta.size_bytes));
            match parsed {
                Ok(range) => {
                    tracing::info!(
                        path = %state.resource_path.display(),
                        start = range.start,
                        end = range.end,
                        "serving partial resource"
                    );
                    let mut headers = headers;
                    let content_range = ContentRange::bytes(range.start..range.end + 1, meta.size_bytes)
                        .expect("ContentRange::bytes cannot panic in this usage");
                    headers.typed_insert(content_range);
                    let stream = SpanStream::new(source, range.start, range.len());
                    (StatusCode::PARTIAL_CONTENT, headers, stream).into_response()
                }
                Err(err) => {
                    tracing::warn!(error = %err, "rejecting malformed range");
                    let mut headers = headers;
                    headers.typed_insert(ContentRange::unsatisfied_bytes(meta.size_bytes));
                    (StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response()
                }
            }
        }
    }
}

/// Headers only; clients use this to learn size and content type before
/// planning chunks.
async fn head_resource(State(state): State<Arc<AppState>>, request: HeaderMap) -> Response {
    let meta = match resolve(&state.resource_path, &state.fingerprints).await {
        Ok(meta) => meta,
        Err(err) => return resolve_failure(err),
    };

    let mut headers = base_headers(&meta);
    headers.typed_insert(ContentLength(meta.size_bytes));

    let status = if client_has_current(&request, &meta) {
        StatusCode::NOT_MODIFIED
    } else {
        StatusCode::OK
    };
    tracing::info!(path = %state.resource_path.display(), %status, "serving resource headers");
    (status, headers).into_response()
}

fn resolve_failure(err: Error) -> Response {
    match err {
        Error::NotFound(path) => {
            tracing::warn!(path = %path, "resource not found");
            (StatusCode::NOT_FOUND, "resource not found").into_response()
        }
        err => {
            tracing::error!(error = %err, "failed to resolve resource");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;

    const FIXTURE: &[u8] = b"Hello world this is a file to test range requests on!\n";

    struct TestApp {
        router: Router,
        // holds the temp file open for the duration of the test
        _file: tempfile::NamedTempFile,
    }

    fn app() -> TestApp {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(FIXTURE).unwrap();
        file.flush().unwrap();
        let state = Arc::new(AppState::new(file.path().to_path_buf()));
        TestApp { router: create_router(state), _file: file }
    }

    async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let response = app.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body.to_vec())
    }

    fn get(headers: &[(&str, &str)]) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri("/resource");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn full_response_carries_discovery_headers() {
        let app = app();
        let (status, headers, body) = send(&app, get(&[])).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers.get("Accept-Ranges").unwrap(), "bytes");
        assert_eq!(headers.get("Cache-Control").unwrap(), "max-age=31536000");
        assert_eq!(headers.get("Content-Type").unwrap(), "text/plain");
        assert!(headers.get("Last-Modified").is_some());
        let etag = headers.get("ETag").unwrap().to_str().unwrap();
        assert!(etag.starts_with('"') && etag.ends_with('"'));
        assert_eq!(body, FIXTURE);
    }

    #[tokio::test]
    async fn range_request_returns_exact_span() {
        let app = app();
        let (status, headers, body) = send(&app, get(&[("Range", "bytes=0-9")])).await;

        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(
            headers.get("Content-Range").unwrap(),
            &format!("bytes 0-9/{}", FIXTURE.len())
        );
        assert_eq!(body, &FIXTURE[0..10]);
    }

    #[tokio::test]
    async fn tail_range_reaches_last_byte() {
        let app = app();
        let last = FIXTURE.len() - 1;
        let (status, _, body) =
            send(&app, get(&[("Range", &format!("bytes={last}-{last}"))])).await;

        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(body, &FIXTURE[last..]);
    }

    #[tokio::test]
    async fn inverted_range_is_rejected_not_downgraded() {
        let app = app();
        let (status, headers, body) = send(&app, get(&[("Range", "bytes=5-2")])).await;

        assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            headers.get("Content-Range").unwrap(),
            &format!("bytes */{}", FIXTURE.len())
        );
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn range_past_end_is_rejected() {
        let app = app();
        let (status, _, _) =
            send(&app, get(&[("Range", &format!("bytes=0-{}", FIXTURE.len()))])).await;
        assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
    }

    #[tokio::test]
    async fn matching_fingerprint_short_circuits_to_not_modified() {
        let app = app();
        let (_, headers, _) = send(&app, get(&[])).await;
        let etag = headers.get("ETag").unwrap().to_str().unwrap().to_string();

        let (status, headers, body) = send(&app, get(&[("If-None-Match", &etag)])).await;
        assert_eq!(status, StatusCode::NOT_MODIFIED);
        assert_eq!(headers.get("ETag").unwrap().to_str().unwrap(), etag);
        assert!(body.is_empty());

        // a matching fingerprint wins over any requested range
        let (status, _, body) =
            send(&app, get(&[("If-None-Match", &etag), ("Range", "bytes=0-9")])).await;
        assert_eq!(status, StatusCode::NOT_MODIFIED);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn stale_fingerprint_gets_full_delivery() {
        let app = app();
        let (status, _, body) =
            send(&app, get(&[("If-None-Match", "\"0000000000000000\"")])).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, FIXTURE);
    }

    #[tokio::test]
    async fn head_reports_length_without_body() {
        let app = app();
        let request = Request::builder()
            .method("HEAD")
            .uri("/resource")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(&app, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers.get("Content-Length").unwrap(),
            &FIXTURE.len().to_string()
        );
        assert_eq!(headers.get("Accept-Ranges").unwrap(), "bytes");
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let state = Arc::new(AppState::new(PathBuf::from("missing/resource.bin")));
        let app = TestApp {
            router: create_router(state),
            _file: tempfile::NamedTempFile::new().unwrap(),
        };
        let (status, _, _) = send(&app, get(&[])).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
