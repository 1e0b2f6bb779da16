//! HTTP server for AgriSmart.
//!
//! Provides REST API endpoints for:
//! - Sign-up, login and logout
//! - The crop recommendation and plant disease forms
//! - Listing and deleting history records

use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, FromRequestParts, Path, Query, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use advisor::{CropRecommendationInput, CROP_INPUT_FIELDS};

use crate::actions::{ActionResult, Actions};
use crate::auth::{IdentityProvider, UserInfo};
use crate::errors::{AppError, AuthError};
use crate::history::HistoryCollection;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub actions: Arc<Actions>,
    /// Request body limit in bytes
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(identity: Arc<dyn IdentityProvider>, actions: Actions, max_body_bytes: usize) -> Self {
        Self {
            identity,
            actions: Arc::new(actions),
            max_body_bytes,
        }
    }
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/signup", post(signup_handler))
        .route("/login", post(login_handler))
        .route("/logout", post(logout_handler))
        .route(
            "/crop-recommendation",
            get(crop_form_handler).post(crop_recommendation_handler),
        )
        .route(
            "/crop-recommendation/simulate",
            post(simulate_crop_handler),
        )
        .route(
            "/plant-disease-detection",
            get(disease_form_handler).post(disease_detection_handler),
        )
        .route("/history", get(history_handler))
        .route("/history/{collection}", get(history_collection_handler))
        .route("/history/{collection}/{id}", delete(delete_history_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CorsLayer::permissive())
                .map_response(IntoResponse::into_response)
                .layer(DefaultBodyLimit::max(max_body_bytes))
                .layer(RequestBodyLimitLayer::new(max_body_bytes)),
        )
        .with_state(state)
}

/// Start the HTTP server and run until Ctrl+C or SIGTERM.
pub async fn run_server(state: AppState, addr: &str) -> Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("AgriSmart server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("AgriSmart server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down gracefully"),
        () = terminate => info!("Received SIGTERM, shutting down gracefully"),
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// The signed-in user, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: UserInfo,
    pub token: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .ok_or(AuthError::MissingToken)?
            .to_string();

        let user = state.identity.verify(&token).await?;
        Ok(Self { user, token })
    }
}

fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    #[serde(default)]
    confirm: bool,
}

#[derive(Debug, Serialize)]
struct FieldDescriptor {
    name: &'static str,
    label: &'static str,
    unit: &'static str,
    min: f64,
    max: f64,
}

fn field_label(field: &str) -> (&'static str, &'static str) {
    match field {
        "nitrogen" => ("Nitrogen (N)", "kg/ha"),
        "phosphorus" => ("Phosphorus (P)", "kg/ha"),
        "potassium" => ("Potassium (K)", "kg/ha"),
        "temperature" => ("Temperature", "°C"),
        "humidity" => ("Humidity", "%"),
        "ph" => ("pH", ""),
        "rainfall" => ("Rainfall", "mm"),
        _ => ("", ""),
    }
}

/// Wrap a successful payload as `{ "data": ... }`.
fn data<T: Serialize>(payload: T) -> Json<Value> {
    Json(json!({ "data": payload }))
}

fn action_response<T: Serialize>(result: ActionResult<T>) -> Response {
    let status = match &result {
        ActionResult::Data(_) => StatusCode::OK,
        failed if failed.is_rate_limited() => StatusCode::TOO_MANY_REQUESTS,
        ActionResult::Error(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(result)).into_response()
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

// ============================================================================
// Handlers
// ============================================================================

async fn index_handler(State(state): State<AppState>) -> Json<Value> {
    let advisor = state.actions.advisor();
    Json(json!({
        "name": "AgriSmart AI",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "AI crop recommendations and plant disease diagnosis for farmers",
        "features": [
            {
                "name": "Crop Recommendation",
                "path": "/crop-recommendation",
                "description": "Enter soil nutrients and climate readings to get the best crop, a fertilizer and cultivation tips"
            },
            {
                "name": "Plant Disease Detection",
                "path": "/plant-disease-detection",
                "description": "Upload a photo of a plant to identify diseases and get cure and prevention advice"
            },
            {
                "name": "History",
                "path": "/history",
                "description": "Review and delete your past recommendations and diagnoses"
            }
        ],
        "ai": { "provider": advisor.provider_name(), "model": advisor.model() },
        "auth": state.identity.name(),
        "storage": state.actions.history().store_name(),
    }))
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "agrismart",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn signup_handler(
    State(state): State<AppState>,
    body: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(request) = body.map_err(|r| AppError::BadRequest(r.body_text()))?;
    let session = state
        .identity
        .sign_up(&request.email, &request.password, request.display_name.as_deref())
        .await?;
    info!(uid = %session.user.uid, "User signed up");
    Ok((StatusCode::CREATED, data(session)))
}

async fn login_handler(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = body.map_err(|r| AppError::BadRequest(r.body_text()))?;
    let session = state
        .identity
        .sign_in(&request.email, &request.password)
        .await?;
    info!(uid = %session.user.uid, "User signed in");
    Ok(data(session))
}

async fn logout_handler(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    state.identity.sign_out(&auth.token).await?;
    info!(uid = %auth.user.uid, "User signed out");
    Ok(data(json!({ "signedOut": true })))
}

async fn crop_form_handler(_auth: AuthUser, State(state): State<AppState>) -> Json<Value> {
    let ranges = state.actions.ranges();
    let fields: Vec<FieldDescriptor> = CROP_INPUT_FIELDS
        .iter()
        .filter_map(|&name| {
            let range = ranges.get(name)?;
            let (label, unit) = field_label(name);
            Some(FieldDescriptor {
                name,
                label,
                unit,
                min: range.min,
                max: range.max,
            })
        })
        .collect();
    data(json!({ "fields": fields }))
}

async fn crop_recommendation_handler(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let input = CropRecommendationInput::from_value(&json_body(body)?)?;
    let result = state.actions.recommend_crop(&auth.user, input).await?;
    Ok(action_response(result))
}

async fn simulate_crop_handler(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let result = state.actions.simulate_crop_recommendation(&auth.user).await?;
    Ok(action_response(result))
}

async fn disease_form_handler(_auth: AuthUser, State(state): State<AppState>) -> Json<Value> {
    let limits = state.actions.image_limits();
    data(json!({
        "acceptedTypes": limits.accepted_types,
        "maxBytes": limits.max_bytes,
    }))
}

async fn disease_detection_handler(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, AppError> {
    let body = json_body(body)?;
    let photo = body
        .get("photoDataUri")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let result = state.actions.diagnose_plant_disease(&auth.user, photo).await?;
    Ok(action_response(result))
}

async fn history_handler(auth: AuthUser, State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let view = state.actions.history().list_all(&auth.user.uid).await?;
    Ok(data(view))
}

async fn history_collection_handler(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> Result<Json<Value>, AppError> {
    let collection = parse_collection(&collection)?;
    let history = state.actions.history();
    let uid = &auth.user.uid;

    Ok(match collection {
        HistoryCollection::CropRecommendations => {
            data(history.list_crop_recommendations(uid).await?)
        }
        HistoryCollection::DiseaseDetections => data(history.list_disease_detections(uid).await?),
    })
}

async fn delete_history_handler(
    auth: AuthUser,
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, AppError> {
    let collection = parse_collection(&collection)?;
    if !query.confirm {
        return Err(AppError::ConfirmationRequired);
    }

    state
        .actions
        .history()
        .delete(&auth.user.uid, collection, &id)
        .await?;
    Ok(data(json!({ "deleted": id, "collection": collection })))
}

fn parse_collection(name: &str) -> Result<HistoryCollection, AppError> {
    name.parse().map_err(AppError::UnknownCollection)
}
