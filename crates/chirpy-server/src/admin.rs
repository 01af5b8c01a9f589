use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::{
    Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    routing::get,
};

/// Hit counter for the static file server.
#[derive(Clone, Default)]
pub struct Metrics {
    hits: Arc<AtomicUsize>,
}

impl Metrics {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}

/// `GET /admin/metrics` reports the counter, `GET /admin/reset` zeroes it.
pub fn routes(metrics: Metrics) -> Router {
    Router::new()
        .route("/admin/metrics", get(metrics_handler))
        .route("/admin/reset", get(reset_handler))
        .with_state(metrics)
}

pub async fn count_hits(State(metrics): State<Metrics>, req: Request, next: Next) -> Response {
    metrics.hits.fetch_add(1, Ordering::Relaxed);
    next.run(req).await
}

pub async fn metrics_handler(State(metrics): State<Metrics>) -> String {
    format!("Hits: {}", metrics.hits())
}

pub async fn reset_handler(State(metrics): State<Metrics>) -> StatusCode {
    metrics.hits.store(0, Ordering::Relaxed);
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn reset_zeroes_the_counter() {
        let metrics = Metrics::default();
        metrics.hits.fetch_add(3, Ordering::Relaxed);
        assert_eq!(metrics_handler(State(metrics.clone())).await, "Hits: 3");

        assert_eq!(reset_handler(State(metrics.clone())).await, StatusCode::OK);
        assert_eq!(metrics_handler(State(metrics)).await, "Hits: 0");
    }

    #[tokio::test]
    async fn reset_is_served_over_get() {
        let metrics = Metrics::default();
        metrics.hits.fetch_add(5, Ordering::Relaxed);
        let app = routes(metrics.clone());

        let request = |method: Method, uri: &str| {
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap()
        };

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/admin/reset"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(metrics.hits(), 5);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/admin/reset"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(request(Method::GET, "/admin/metrics"))
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Hits: 0");
    }
}
