use crate::constants::REQUEST_ID_HEADER;
use axum::{
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::fmt;
use tracing::{debug, info, Instrument};
use uuid::Uuid;

/// Correlation id minted for every request.
///
/// Handlers receive it as an explicit `Extension<RequestId>` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Mint a correlation id, expose it to the handler, and echo it in `X-Request-ID`.
pub async fn request_id<B>(mut req: Request<B>, next: Next<B>) -> Response {
    let request_id = RequestId::new();
    req.extensions_mut().insert(request_id);

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        uri = %req.uri(),
    );

    async move {
        debug!("Request started");
        let mut response = next.run(req).await;
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
        info!(status = %response.status(), "Request completed");
        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn echo_router() -> Router {
        Router::new()
            .route(
                "/echo",
                get(|Extension(id): Extension<RequestId>| async move { id.to_string() }),
            )
            .layer(middleware::from_fn(request_id))
    }

    async fn call(app: Router) -> (String, String) {
        let response = app
            .oneshot(Request::builder().uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let header = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .expect("missing X-Request-ID")
            .to_str()
            .unwrap()
            .to_string();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (header, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_handler_sees_the_id_sent_back_in_the_header() {
        let (header, body) = call(echo_router()).await;

        assert_eq!(header, body);
        assert!(Uuid::parse_str(&header).is_ok());
    }

    #[tokio::test]
    async fn test_each_request_gets_a_new_id() {
        let app = echo_router();

        let (first, _) = call(app.clone()).await;
        let (second, _) = call(app).await;
        assert_ne!(first, second);
    }
}
