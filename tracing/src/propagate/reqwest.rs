use reqwest_tracing::{SpanBackendWithUrl, TracingMiddleware};

/// Returns a tracing middleware to be used with reqwest_middleware.
///
/// Every outgoing request gets its own span, with the requested url recorded
/// in `http.url`, so requests issued while expanding a tree node show up
/// nested below the span of the operation that triggered them.
pub fn tracing_middleware() -> TracingMiddleware<SpanBackendWithUrl> {
    TracingMiddleware::<SpanBackendWithUrl>::new()
}
