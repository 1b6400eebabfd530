use crate::constants::{
    DEFAULT_LIMIT, DEFAULT_OFFSET, HEALTH_RESPONSE, LIMIT_PARAM, OFFSET_PARAM, SORT_BY_PARAM,
    SORT_ORDER_PARAM,
};
use crate::domain::{Options, PaginatedResponse, Risk, RiskDraft, SortColumn, SortOrder};
use crate::error::RiskError;
use crate::middleware::RequestId;
use crate::service::RiskService;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RiskService>,
}

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// An error on its way out to the client
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Caller mistakes keep their own message. Anything else is logged in full
    /// and answered with the generic `context` message only.
    fn from_risk_error(err: RiskError, context: &str, request_id: RequestId) -> Self {
        if err.is_client_error() {
            warn!(%request_id, "{context}: {err}");
            let status = match &err {
                RiskError::NotFound(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            Self::new(status, err.to_string())
        } else {
            error!(%request_id, "{context}: {err}");
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, context)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn parse_risk_id(
    path: Result<Path<String>, PathRejection>,
    request_id: RequestId,
) -> Result<Uuid, ApiError> {
    let raw = match path {
        Ok(Path(raw)) => raw,
        Err(rejection) => {
            warn!(%request_id, "invalid riskID path: {}", rejection.body_text());
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid riskID, expected a UUID",
            ));
        }
    };

    Uuid::parse_str(&raw).map_err(|_| {
        ApiError::from_risk_error(RiskError::InvalidId(raw), "invalid riskID", request_id)
    })
}

/// Build listing options from query parameters. Unparsable numbers fall back
/// to the defaults; an unknown sort column is rejected.
fn options_from_query(params: &HashMap<String, String>) -> Result<Options, RiskError> {
    let offset = params
        .get(OFFSET_PARAM)
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(DEFAULT_OFFSET);
    let limit = params
        .get(LIMIT_PARAM)
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(DEFAULT_LIMIT);
    let sort_by = match params.get(SORT_BY_PARAM).map(String::as_str) {
        None | Some("") => SortColumn::default(),
        Some(column) => column.parse()?,
    };
    let sort_order = SortOrder::from_query(params.get(SORT_ORDER_PARAM).map(String::as_str));

    Ok(Options {
        offset,
        limit,
        sort_by,
        sort_order,
    })
}

/// Liveness probe, no dependency checks
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        HEALTH_RESPONSE,
    )
}

pub async fn create_risk(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<RiskDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Risk>), ApiError> {
    info!(%request_id, "Received a request to create a new risk");

    let draft = match payload {
        Ok(Json(draft)) => draft,
        Err(rejection) => {
            warn!(%request_id, "error decoding risk request: {}", rejection.body_text());
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "error decoding risk request",
            ));
        }
    };

    let risk = state.service.add(draft).await.map_err(|e| {
        ApiError::from_risk_error(e, "error processing the risk add request", request_id)
    })?;

    info!(%request_id, "Successfully added a new risk with ID: {}", risk.id);
    Ok((StatusCode::CREATED, Json(risk)))
}

pub async fn get_risk(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<Risk>, ApiError> {
    let id = parse_risk_id(path, request_id)?;
    info!(%request_id, "Received a request to fetch risk {}", id);
    let context = format!("error fetching risk with ID: {id}");

    match state.service.get_by_id(id).await {
        Ok(Some(risk)) => Ok(Json(risk)),
        Ok(None) => Err(ApiError::from_risk_error(
            RiskError::NotFound(id),
            &context,
            request_id,
        )),
        Err(e) => Err(ApiError::from_risk_error(e, &context, request_id)),
    }
}

pub async fn list_risks(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<PaginatedResponse>, ApiError> {
    const CONTEXT: &str = "error fetching risks";

    let options = options_from_query(&params)
        .map_err(|e| ApiError::from_risk_error(e, CONTEXT, request_id))?;
    info!(%request_id, "Fetching risks with options: {:?}", options);

    let page = state
        .service
        .get_all(options)
        .await
        .map_err(|e| ApiError::from_risk_error(e, CONTEXT, request_id))?;

    info!(%request_id, "Fetched {} of {} risks", page.risks.len(), page.total_count);
    Ok(Json(page))
}

pub async fn delete_risk(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    path: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let id = parse_risk_id(path, request_id)?;
    info!(%request_id, "Received a request to delete risk {}", id);

    state.service.delete_by_id(id).await.map_err(|e| {
        ApiError::from_risk_error(e, &format!("error deleting risk with ID: {id}"), request_id)
    })?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REQUEST_ID_HEADER;
    use crate::domain::State as RiskState;
    use crate::server::create_router;
    use crate::storage::mock::{Call, MockRiskStore};
    use axum::{body::Body, http::Request, Router};
    use serde::de::DeserializeOwned;
    use tower::ServiceExt;

    const RISK_ID: &str = "c7041e22-15c1-4293-9b43-c54c8dd4b909";

    fn stored_risk() -> Risk {
        Risk {
            id: Uuid::parse_str(RISK_ID).unwrap(),
            state: RiskState::Open,
            title: "threat 1".to_string(),
            description: "DDOS threat".to_string(),
        }
    }

    fn app(store: MockRiskStore) -> (Router, Arc<MockRiskStore>) {
        let store = Arc::new(store);
        let service = Arc::new(RiskService::new(store.clone()));
        (create_router(service), store)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/risks")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send<T: DeserializeOwned>(app: Router, request: Request<Body>) -> (StatusCode, T) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_returns_pong() {
        let (app, _) = app(MockRiskStore::failing());

        let response = app.oneshot(get("/risks/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&bytes[..], b"pong");
    }

    #[tokio::test]
    async fn test_create_risk_returns_created_with_minted_id() {
        let (app, store) = app(MockRiskStore::default());
        let body = r#"{"id": "c7041e22-15c1-4293-9b43-c54c8dd4b909", "title": "threat 1", "description": "DDOS threat", "state": "open"}"#;

        let (status, risk): (_, Risk) = send(app, post_json(body)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_ne!(risk.id.to_string(), RISK_ID);
        assert_eq!(risk.title, "threat 1");
        assert_eq!(risk.description, "DDOS threat");
        assert_eq!(risk.state, RiskState::Open);
        assert_eq!(*store.calls.lock().await, vec![Call::Add(risk)]);
    }

    #[tokio::test]
    async fn test_create_risk_with_malformed_body_is_bad_request() {
        let (app, store) = app(MockRiskStore::default());

        let (status, body): (_, ErrorBody) = send(app, post_json("{")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "error decoding risk request");
        assert!(store.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_risk_with_invalid_state_is_bad_request() {
        let (app, store) = app(MockRiskStore::default());
        let body = r#"{"title": "threat 1", "description": "DDOS threat", "state": "converted"}"#;

        let (status, body): (_, ErrorBody) = send(app, post_json(body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("converted"));
        assert!(store.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_create_risk_store_failure_hides_details() {
        let (app, _) = app(MockRiskStore::failing());
        let body = r#"{"title": "threat 1", "state": "open"}"#;

        let (status, body): (_, ErrorBody) = send(app, post_json(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "error processing the risk add request");
    }

    #[tokio::test]
    async fn test_get_risk_by_id() {
        let (app, _) = app(MockRiskStore::with_risk(stored_risk()));

        let (status, risk): (_, Risk) = send(app, get(&format!("/v1/risks/{RISK_ID}"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(risk, stored_risk());
    }

    #[tokio::test]
    async fn test_get_risk_with_invalid_id_names_the_input() {
        let (app, store) = app(MockRiskStore::default());

        let (status, body): (_, ErrorBody) = send(app, get("/v1/risks/c7041e22-15c")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body.error,
            "invalid riskID, expected a UUID but received: c7041e22-15c"
        );
        assert!(store.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_utf8_risk_id_gets_json_error() {
        let (app, store) = app(MockRiskStore::default());

        let (status, body): (_, ErrorBody) = send(app.clone(), get("/v1/risks/%FF")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.starts_with("invalid riskID"));

        let request = Request::builder()
            .method("DELETE")
            .uri("/v1/risks/%FF")
            .body(Body::empty())
            .unwrap();
        let (status, _): (_, ErrorBody) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(store.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_cors_preflight_carries_request_id() {
        let (app, store) = app(MockRiskStore::default());
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/v1/risks")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
        let request_id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(request_id).is_ok());
        assert!(store.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_risk_is_not_found() {
        let (app, _) = app(MockRiskStore::default());

        let (status, body): (_, ErrorBody) = send(app, get(&format!("/v1/risks/{RISK_ID}"))).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.error.contains(RISK_ID));
    }

    #[tokio::test]
    async fn test_get_risk_store_failure_is_internal_error() {
        let (app, _) = app(MockRiskStore::failing());

        let (status, body): (_, ErrorBody) = send(app, get(&format!("/v1/risks/{RISK_ID}"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, format!("error fetching risk with ID: {RISK_ID}"));
    }

    #[tokio::test]
    async fn test_list_risks_uses_defaults() {
        let (app, store) = app(MockRiskStore::with_risk(stored_risk()));

        let (status, page): (_, PaginatedResponse) = send(app, get("/v1/risks")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            page,
            PaginatedResponse {
                total_count: 1,
                risks: vec![stored_risk()],
            }
        );
        assert_eq!(*store.calls.lock().await, vec![Call::GetAll(Options::default())]);
    }

    #[tokio::test]
    async fn test_list_risks_reads_query_parameters() {
        let (app, store) = app(MockRiskStore::default());

        let (status, _): (_, PaginatedResponse) = send(
            app,
            get("/v1/risks?offset=-4&limit=abc&sortBy=state&sortOrder=desc"),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            *store.calls.lock().await,
            vec![Call::GetAll(Options {
                offset: 0,
                limit: DEFAULT_LIMIT,
                sort_by: SortColumn::State,
                sort_order: SortOrder::Desc,
            })]
        );
    }

    #[tokio::test]
    async fn test_list_risks_rejects_unknown_sort_column() {
        let (app, store) = app(MockRiskStore::default());

        let (status, body): (_, ErrorBody) =
            send(app, get("/v1/risks?sortBy=title%3BDROP%20TABLE%20risks")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("cannot sort by"));
        assert!(store.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_risks_store_failure_is_internal_error() {
        let (app, _) = app(MockRiskStore::failing());

        let (status, body): (_, ErrorBody) = send(app, get("/v1/risks")).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "error fetching risks");
    }

    #[tokio::test]
    async fn test_delete_risk_returns_no_content() {
        let (app, store) = app(MockRiskStore::default());
        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/v1/risks/{RISK_ID}"))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            *store.calls.lock().await,
            vec![Call::DeleteById(Uuid::parse_str(RISK_ID).unwrap())]
        );
    }

    #[test]
    fn test_options_from_query_sort_order_fallback() {
        let params: HashMap<String, String> = [
            (SORT_ORDER_PARAM.to_string(), "DESC".to_string()),
            (LIMIT_PARAM.to_string(), "3".to_string()),
            (SORT_BY_PARAM.to_string(), String::new()),
        ]
        .into_iter()
        .collect();

        let options = options_from_query(&params).unwrap();
        assert_eq!(options.sort_order, SortOrder::Asc);
        assert_eq!(options.sort_by, SortColumn::Title);
        assert_eq!(options.limit, 3);
    }
}
