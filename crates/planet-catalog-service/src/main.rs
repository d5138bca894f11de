use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use planet_catalog_core::{CatalogError, CatalogService, NewPlanet, Planet, PlanetId};
use planet_catalog_store_sqlite::SqliteStore;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct ServiceState {
    db_path: PathBuf,
}

#[derive(Debug)]
enum ServiceError {
    Catalog(CatalogError),
    Body(JsonRejection),
}

#[derive(Debug, Clone, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreatePlanetRequest {
    #[serde(default)]
    id: Option<PlanetId>,
    #[serde(flatten)]
    planet: NewPlanet,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ListQuery {
    terrain: Option<String>,
    climate: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Parser)]
#[command(name = "planet-catalog-service")]
#[command(about = "HTTP service for the planet catalog")]
struct Args {
    #[arg(long, default_value = "./planets.sqlite3")]
    db: PathBuf,
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,
}

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(err)
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection)
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            // Keep axum's status (400, 415 or 422) but use the catalog error envelope.
            Self::Body(rejection) => {
                tracing::debug!("Rejected request body: {}", rejection.body_text());
                (
                    rejection.status(),
                    ErrorBody { error: "validation", message: rejection.body_text() },
                )
            }
            Self::Catalog(err) => {
                let status = match &err {
                    CatalogError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    CatalogError::Conflict(_) => StatusCode::CONFLICT,
                    CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
                    CatalogError::Storage(source) => {
                        tracing::error!("Storage failure: {:#}", source);
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, ErrorBody { error: err.kind(), message: err.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl ServiceState {
    /// Migrate the database once so request handlers can assume the schema.
    fn new(db_path: PathBuf) -> Result<Self> {
        let mut store = SqliteStore::open(&db_path)?;
        store.migrate()?;
        Ok(Self { db_path })
    }

    fn catalog(&self) -> Result<CatalogService<SqliteStore>, ServiceError> {
        let store = SqliteStore::open(&self.db_path).map_err(CatalogError::Storage)?;
        Ok(CatalogService::new(store))
    }
}

fn app(state: ServiceState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/planets", post(create_planet).get(list_planets))
        .route("/api/planets/:id", get(get_planet).delete(remove_planet))
        .route("/api/planets/name/:name", get(get_planet_by_name))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let state = ServiceState::new(args.db)?;
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!("Planet catalog listening on {}", args.bind);
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn create_planet(
    State(state): State<ServiceState>,
    payload: Result<Json<CreatePlanetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Planet>), ServiceError> {
    let Json(request) = payload?;
    if let Some(id) = request.id {
        return Err(CatalogError::Validation(format!(
            "id {id} was supplied; ids are assigned by the catalog"
        ))
        .into());
    }
    let planet = state.catalog()?.create(request.planet)?;
    Ok((StatusCode::CREATED, Json(planet)))
}

async fn get_planet(
    State(state): State<ServiceState>,
    Path(id): Path<PlanetId>,
) -> Result<Json<Planet>, ServiceError> {
    Ok(Json(state.catalog()?.get(id)?))
}

async fn get_planet_by_name(
    State(state): State<ServiceState>,
    Path(name): Path<String>,
) -> Result<Json<Planet>, ServiceError> {
    Ok(Json(state.catalog()?.get_by_name(&name)?))
}

async fn list_planets(
    State(state): State<ServiceState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Planet>>, ServiceError> {
    let planets = state.catalog()?.list(query.climate.as_deref(), query.terrain.as_deref())?;
    Ok(Json(planets))
}

async fn remove_planet(
    State(state): State<ServiceState>,
    Path(id): Path<PlanetId>,
) -> Result<StatusCode, ServiceError> {
    state.catalog()?.remove(id)?;
    Ok(StatusCode::NO_CONTENT)
}
