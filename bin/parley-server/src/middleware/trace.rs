use std::time::Instant;

use axum::body::{Body, HttpBody};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use http_body_util::{BodyExt, Limited};
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Bodies larger than this are never buffered or logged.
const MAX_LOGGED_BODY: usize = 1024;

/// Wrap each request in a span carrying a trace id.
///
/// The id is taken from an incoming `x-trace-id` header when it is a valid
/// UUID, otherwise generated, and echoed on the response.
pub async fn trace_middleware(req: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();

    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let header_value = HeaderValue::from_str(&trace_id.to_string()).ok();

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!("request started");

        let (mut parts, body) = req.into_parts();
        let body = log_body("request", &parts.headers, body).await;
        if let Some(value) = &header_value {
            parts.headers.insert(X_TRACE_ID, value.clone());
        }
        let req = Request::from_parts(parts, body);

        let response = next.run(req).await;

        let (mut parts, body) = response.into_parts();
        let body = log_body("response", &parts.headers, body).await;
        if let Some(value) = header_value {
            parts.headers.insert(X_TRACE_ID, value);
        }
        let response = Response::from_parts(parts, body);

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "response finished"
        );
        response
    }
    .instrument(span)
    .await
}

/// Log small JSON payloads at debug level.
///
/// Only a body known to be under [`MAX_LOGGED_BODY`] is buffered; anything
/// else is handed on unread so downstream limits still apply.
async fn log_body(direction: &str, headers: &HeaderMap, body: Body) -> Body {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let size = declared_size(headers, &body);

    let small = size.is_some_and(|n| n < MAX_LOGGED_BODY as u64);
    if !content_type.contains("application/json") || !small {
        if size != Some(0) {
            debug!(direction, content_type, size = ?size, "body not logged");
        }
        return body;
    }

    let bytes = match Limited::new(body, MAX_LOGGED_BODY).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(direction, error = %e, "failed to read body");
            return Body::empty();
        }
    };
    if let Ok(text) = std::str::from_utf8(&bytes) {
        if !text.is_empty() {
            debug!(direction, body = text, "json body");
        }
    }
    Body::from(bytes)
}

/// `Content-Length` if present, else the body's exact size when it knows it.
fn declared_size(headers: &HeaderMap, body: &Body) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| body.size_hint().exact())
}
