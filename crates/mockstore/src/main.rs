use std::{env, error::Error, net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use mockstore_core::{Bucket, DEFAULT_REGION, MockBackend, NamingPolicy, StorageError};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

type AnyError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(err) = run().await {
        error!("mock storage server failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AnyError> {
    let settings = Settings::from_env()?;
    let backend = Arc::new(MockBackend::with_policy(settings.naming_policy));
    backend.start()?;

    let state = AppState {
        backend: Arc::clone(&backend),
        region: settings.region.clone(),
    };
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.bind_address).await?;
    info!(
        address = %settings.bind_address,
        policy = %settings.naming_policy,
        region = %settings.region,
        "mock storage listening"
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    backend.stop()?;
    info!("mock storage stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }
}

#[derive(Clone)]
struct AppState {
    backend: Arc<MockBackend>,
    region: String,
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_buckets))
        .route(
            "/:bucket",
            put(create_bucket).head(head_bucket).delete(delete_bucket),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ListBucketsBody {
    buckets: Vec<Bucket>,
}

async fn list_buckets(State(state): State<AppState>) -> Result<Json<ListBucketsBody>, ApiError> {
    let buckets = state.backend.list_buckets()?;
    Ok(Json(ListBucketsBody { buckets }))
}

async fn create_bucket(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.backend.create_bucket(&bucket, &state.region)?;
    Ok(StatusCode::CREATED)
}

async fn head_bucket(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.backend.head_bucket(&bucket)?;
    Ok(StatusCode::OK)
}

async fn delete_bucket(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.backend.delete_bucket(&bucket)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
}

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        let msg = value.to_string();
        match value {
            StorageError::InvalidBucketName { .. } | StorageError::InvalidPolicy(_) => {
                Self::BadRequest(msg)
            }
            StorageError::BucketNotFound(_) | StorageError::ProfileNotFound(_) => {
                Self::NotFound(msg)
            }
            StorageError::BucketAlreadyExists(_) => Self::Conflict(msg),
            StorageError::AlreadyActive | StorageError::NotActive => Self::Unavailable(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

#[derive(Debug)]
struct Settings {
    bind_address: SocketAddr,
    naming_policy: NamingPolicy,
    region: String,
}

impl Settings {
    fn from_env() -> Result<Self, AnyError> {
        let bind_address = env::var("MOCKSTORE_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:5000".to_string())
            .parse()?;
        let naming_policy = match env::var("MOCKSTORE_NAMING_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => NamingPolicy::default(),
        };
        let region =
            env::var("MOCKSTORE_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string());
        Ok(Self {
            bind_address,
            naming_policy,
            region,
        })
    }
}
