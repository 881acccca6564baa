//! JSON API over the recommendation engine, promotion generator and ingestion.
//!
//! - `GET  /users`, `GET /products`, `POST /products`
//! - `POST /views`, `POST /purchases`
//! - `GET  /recommendations/{user_id}`, `GET /recommendations/{user_id}/browse`
//! - `GET  /popular`, `GET /trending`
//! - `GET  /promotions/{user_id}`, `POST /promotions/{user_id}/regenerate`
//! - `POST /promotions/sweep`

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use shopsense_core::config::AppConfig;
use shopsense_core::domain::user::UserId;
use shopsense_core::recommend::{RecommendationSettings, DEFAULT_POPULARITY_LIMIT};
use shopsense_core::store::{BehaviorStore, BoundedStore};
use shopsense_core::{
    ActivityIngestor, EngineError, InterfaceError, NewProduct, NewPurchase, NewView,
    PromotionGenerator, PromotionPolicy, RecommendationEngine, RegenerationScheduler,
};

#[derive(Clone, Debug)]
pub struct ApiState {
    store: BoundedStore,
    engine: RecommendationEngine,
    generator: PromotionGenerator,
    scheduler: RegenerationScheduler,
    ingestor: ActivityIngestor,
}

impl ApiState {
    /// Wires every engine component to one shared store handle.
    pub fn new(store: Arc<dyn BehaviorStore>, config: &AppConfig) -> Self {
        let store = BoundedStore::new(
            store,
            std::time::Duration::from_millis(config.store.call_timeout_ms),
        );
        let settings = RecommendationSettings::from(&config.recommendation);
        let engine = RecommendationEngine::new(store.clone(), settings);
        let generator = PromotionGenerator::new(
            store.clone(),
            PromotionPolicy::from(&config.promotion),
            settings.recent_view_window,
        );
        let scheduler = RegenerationScheduler::new(generator.clone(), &config.scheduler);
        let ingestor = ActivityIngestor::new(store.clone(), scheduler.clone());

        Self { store, engine, generator, scheduler, ingestor }
    }

    pub fn scheduler(&self) -> &RegenerationScheduler {
        &self.scheduler
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub correlation_id: String,
}

#[derive(Debug, Serialize)]
pub struct Accepted {
    pub status: &'static str,
}

/// Interface error rendered as `{error, message, correlation_id}`.
#[derive(Debug)]
pub struct ApiError(InterfaceError);

impl From<EngineError> for ApiError {
    fn from(error: EngineError) -> Self {
        Self(error.into_interface(Uuid::new_v4().to_string()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::from(EngineError::InvalidInput(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        };
        let message = match &self.0 {
            InterfaceError::BadRequest { message, .. } => message.clone(),
            InterfaceError::ServiceUnavailable { .. } => self.0.user_message().to_string(),
        };

        warn!(
            event_name = "api.request.failed",
            correlation_id = %self.0.correlation_id(),
            error_code = self.0.code(),
            error = %self.0,
            "request failed"
        );

        let body = ErrorBody {
            error: self.0.code(),
            message,
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/products", get(list_products).post(create_product))
        .route("/views", post(record_view))
        .route("/purchases", post(record_purchase))
        .route("/recommendations/{user_id}", get(recommend))
        .route("/recommendations/{user_id}/browse", get(browse))
        .route("/popular", get(popular))
        .route("/trending", get(trending))
        .route("/promotions/sweep", post(sweep))
        .route("/promotions/{user_id}", get(live_promotions))
        .route("/promotions/{user_id}/regenerate", post(regenerate))
        .with_state(state)
}

async fn list_users(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let users = state.store.list_users().await.map_err(EngineError::from)?;
    Ok(Json(users))
}

async fn list_products(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    let products = state.store.list_products().await.map_err(EngineError::from)?;
    Ok(Json(products))
}

async fn create_product(
    State(state): State<ApiState>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let product = state.ingestor.create_product(request).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn record_view(
    State(state): State<ApiState>,
    payload: Result<Json<NewView>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let receipt = state.ingestor.record_view(request).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn record_purchase(
    State(state): State<ApiState>,
    payload: Result<Json<NewPurchase>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = payload?;
    let purchase = state.ingestor.record_purchase(request).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}

async fn recommend(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.recommend(&UserId(user_id)).await?))
}

async fn browse(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.browse(&UserId(user_id)).await?))
}

async fn popular(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.popular(DEFAULT_POPULARITY_LIMIT).await?))
}

async fn trending(State(state): State<ApiState>) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.engine.trending(DEFAULT_POPULARITY_LIMIT).await?))
}

async fn live_promotions(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.generator.live_promotions(&UserId(user_id), Utc::now()).await?))
}

async fn regenerate(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.generator.generate_for_user(&UserId(user_id)).await?))
}

async fn sweep(State(state): State<ApiState>) -> impl IntoResponse {
    state.scheduler.spawn_sweep();
    (StatusCode::ACCEPTED, Json(Accepted { status: "accepted" }))
}
