//! Request metrics middleware

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use moltwatch_common::metrics::RequestMetrics;

/// Record count and latency per route template
pub async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());

    let metrics = RequestMetrics::start(request.method().as_str(), &endpoint);
    let response = next.run(request).await;
    metrics.finish(response.status().as_u16());

    response
}

#[cfg(test)]
mod tests {
    use crate::test_support::{app, get_json};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_unmatched_routes_pass_through() {
        let (app, _db) = app().await;
        let (status, _) = get_json(&app, "/api/nowhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
