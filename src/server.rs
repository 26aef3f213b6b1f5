use crate::config::AppConfig;
use crate::error::SearchError;
use crate::geocode::Geocoder;
use crate::overpass::BuildingSource;
use crate::render::LayerSummary;
use crate::search::{SearchPipeline, SearchRequest};
use crate::session::{Commit, MapSession};
use crate::style::{legend, LegendEntry};
use crate::types::{BuildingKind, Coordinate};
use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use geojson::FeatureCollection;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tower_http::cors::CorsLayer;

pub struct AppState<G, B> {
    pub pipeline: SearchPipeline<G, B>,
    pub session: Mutex<MapSession>,
}

#[derive(Deserialize)]
pub struct PointParams {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
pub struct VisibilityBody {
    visible: bool,
}

#[derive(Serialize)]
pub struct MapResponse {
    /// Content of the error region, `None` when it is empty.
    message: Option<String>,
    center: Option<Coordinate>,
    layers: Vec<LayerSummary>,
    features: FeatureCollection,
}

#[derive(Serialize)]
pub struct PopupResponse {
    popup: String,
    color: &'static str,
}

fn snapshot(session: &MapSession) -> MapResponse {
    MapResponse {
        message: session.message().map(str::to_string),
        center: session.center(),
        layers: session.layers().summaries(),
        features: session.layers().to_feature_collection(),
    }
}

pub fn router<G, B>(state: Arc<AppState<G, B>>) -> Router
where
    G: Geocoder + 'static,
    B: BuildingSource + 'static,
{
    Router::new()
        .route("/api/search", get(search_handler::<G, B>))
        .route("/api/layers", get(layers_handler::<G, B>))
        .route("/api/layers/:layer/visibility", post(visibility_handler::<G, B>))
        .route("/api/query", get(query_handler::<G, B>))
        .route("/api/legend", get(legend_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: AppConfig) -> Result<()> {
    let state = Arc::new(AppState {
        pipeline: SearchPipeline::from_config(&config)?,
        session: Mutex::new(MapSession::new()),
    });

    let mut app = router(state);
    if let Some(dir) = &config.server.static_dir {
        tracing::info!("Serving static files from {:?}", dir);
        app = app.fallback_service(ServeDir::new(dir));
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    println!("Starting server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn search_handler<G: Geocoder, B: BuildingSource>(
    State(state): State<Arc<AppState<G, B>>>,
    Query(request): Query<SearchRequest>,
) -> (StatusCode, Json<MapResponse>) {
    let token = state.session.lock().await.begin();

    // Lock is not held while the search waits on the network.
    let result = match state.pipeline.locate(&request).await {
        Ok(center) => {
            state.session.lock().await.recenter(token, center);
            state.pipeline.survey(center, &request).await
        }
        Err(err) => Err(err),
    };
    let status = match &result {
        Ok(_) | Err(SearchError::NoBuildingsFound) => StatusCode::OK,
        Err(SearchError::AddressNotFound) => StatusCode::NOT_FOUND,
        Err(SearchError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
        Err(SearchError::FetchFailure(_)) => StatusCode::BAD_GATEWAY,
    };

    let mut session = state.session.lock().await;
    match session.commit(token, result) {
        Commit::Applied => (status, Json(snapshot(&session))),
        Commit::Stale => (StatusCode::CONFLICT, Json(snapshot(&session))),
    }
}

async fn layers_handler<G, B>(State(state): State<Arc<AppState<G, B>>>) -> Json<MapResponse> {
    let session = state.session.lock().await;
    Json(snapshot(&session))
}

async fn visibility_handler<G, B>(
    State(state): State<Arc<AppState<G, B>>>,
    Path(layer): Path<BuildingKind>,
    Json(body): Json<VisibilityBody>,
) -> Json<Vec<LayerSummary>> {
    let mut session = state.session.lock().await;
    session.layers_mut().set_visible(layer, body.visible);
    Json(session.layers().summaries())
}

async fn query_handler<G, B>(
    State(state): State<Arc<AppState<G, B>>>,
    Query(params): Query<PointParams>,
) -> Json<Option<PopupResponse>> {
    let session = state.session.lock().await;
    let hit = session
        .layers()
        .building_at(Coordinate::new(params.lat, params.lon))
        .map(|drawn| PopupResponse {
            popup: drawn.popup.clone(),
            color: drawn.color,
        });
    Json(hit)
}

async fn legend_handler() -> Json<Vec<LegendEntry>> {
    Json(legend())
}
