use crate::catalog::CatalogStore;
use crate::config::Config;
use crate::error::CatalogError;
use crate::metadata::{
    DisabledMetadataSource, FetchError, FixtureMetadataSource, MetadataSource,
};
use crate::models::{EntryDraft, Season};
use crate::poster::{IngestError, JpegDataUrlIngest, PosterIngest};
use crate::query::Filters;
use crate::storage::{FileStore, StorageAdapter};
use crate::view::{AdminView, SharedCatalog, VisitorView};
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024; // poster uploads arrive raw

#[derive(Clone)]
pub struct AppState {
    pub visitor: VisitorView,
    pub admin: AdminView,
}

impl AppState {
    pub fn new(
        store: CatalogStore,
        page_size: usize,
        metadata: Arc<dyn MetadataSource>,
        posters: Arc<dyn PosterIngest>,
    ) -> Self {
        let catalog: SharedCatalog = Arc::new(Mutex::new(store));
        Self {
            visitor: VisitorView::new(catalog.clone(), page_size),
            admin: AdminView::new(catalog, page_size, metadata, posters),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let files = FileStore::new(&config.data_dir);
        info!("Catalog data directory: {}", files.dir().display());
        let store = CatalogStore::load(StorageAdapter::new(files));

        let metadata: Arc<dyn MetadataSource> = match &config.metadata_fixture {
            Some(path) => Arc::new(FixtureMetadataSource::from_file(
                path,
                config.metadata_latency,
            )?),
            None => {
                warn!("METADATA_FIXTURE not set, metadata import is disabled");
                Arc::new(DisabledMetadataSource)
            }
        };

        Ok(Self::new(
            store,
            config.page_size,
            metadata,
            Arc::new(JpegDataUrlIngest::default()),
        ))
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let app = build_router(state);

    info!("Listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let visitor: Router<AppState> = Router::new()
        .route("/seasons", get(list_seasons))
        .route("/seasons/:season/entries", get(browse_season))
        .route("/entries/:id", get(entry_detail))
        .route("/genres", get(list_genres));

    let admin: Router<AppState> = Router::new()
        .route("/entries", post(create_entry))
        .route("/entries/:id", put(update_entry).delete(delete_entry))
        .route("/stats", get(stats))
        .route("/metadata", post(import_metadata))
        .route("/poster", post(upload_poster));

    Router::new()
        .route("/health", get(health))
        .nest("/api", visitor)
        .nest("/api/admin", admin)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Failures mapped onto HTTP statuses with a `{status, message}` body.
#[derive(Debug)]
pub enum ApiError {
    Catalog(CatalogError),
    Fetch(FetchError),
    Ingest(IngestError),
    BadRequest(String),
    UnsupportedMedia(String),
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        ApiError::Catalog(e)
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        ApiError::Fetch(e)
    }
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        ApiError::Ingest(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Catalog(e @ CatalogError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, e.to_string())
            }
            ApiError::Catalog(e @ CatalogError::Validation(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            ApiError::Catalog(e @ CatalogError::Task(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Fetch(e @ FetchError::InvalidUrl(_)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Fetch(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            ApiError::Ingest(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::UnsupportedMedia(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, msg),
        };
        (status, Json(json!({"status": "error", "message": message}))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

async fn list_seasons(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.visitor.seasons().await)
}

#[derive(Debug, Default, Deserialize)]
struct BrowseParams {
    year: Option<String>,
    genre: Option<String>,
    q: Option<String>,
    page: Option<usize>,
}

async fn browse_season(
    State(state): State<AppState>,
    Path(season): Path<String>,
    Query(params): Query<BrowseParams>,
) -> ApiResult<impl IntoResponse> {
    let season: Season = season.parse().map_err(ApiError::BadRequest)?;
    let filters = Filters {
        year: params.year,
        genre: params.genre,
    };
    let page = state
        .visitor
        .browse(season, filters, params.q, params.page.unwrap_or(1))
        .await?;
    Ok(Json(page))
}

async fn entry_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.visitor.detail(&id).await?))
}

async fn list_genres(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.visitor.genres().await)
}

async fn create_entry(
    State(state): State<AppState>,
    Json(draft): Json<EntryDraft>,
) -> ApiResult<impl IntoResponse> {
    let entry = state.admin.create(draft).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn update_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<EntryDraft>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.admin.update(&id, draft).await?))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.admin.delete(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.admin.stats().await)
}

#[derive(Debug, Deserialize)]
struct ImportRequest {
    url: String,
    #[serde(default)]
    draft: Option<EntryDraft>,
}

async fn import_metadata(
    State(state): State<AppState>,
    Json(req): Json<ImportRequest>,
) -> ApiResult<impl IntoResponse> {
    let draft = state.admin.import_metadata(&req.url, req.draft).await?;
    Ok(Json(draft))
}

async fn upload_poster(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let content_type_ok = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("image/") || v.starts_with("application/octet-stream"))
        == Some(true);
    if !content_type_ok {
        warn!(
            "Rejecting poster upload: unsupported content-type {:?}",
            headers.get(header::CONTENT_TYPE)
        );
        return Err(ApiError::UnsupportedMedia(
            "poster uploads must be sent as image/*".to_string(),
        ));
    }
    let poster = state.admin.ingest_poster(body.to_vec()).await?;
    info!("Ingested poster ({} bytes encoded)", poster.len());
    Ok(Json(json!({ "poster": poster })))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
