use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ethflow_series::{snapshot::SIMULATION_MULTIPLIER, CacheSnapshot, CacheStore, TimeFrameKey};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const INVALID_TIME_FRAME: &str = "Invalid time frame";

#[derive(Clone)]
struct ServerState {
    store: Arc<CacheStore>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQuery {
    pub time_frame: Option<String>,
    pub simulate: Option<String>,
}

impl DataQuery {
    fn simulate(&self) -> bool {
        self.simulate.as_deref() == Some("true")
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: &'static str,
    pub last_refresh: Option<String>,
}

pub fn router(store: Arc<CacheStore>) -> Router {
    Router::new()
        .route("/api/data", get(data))
        .route("/api/cache", get(cache))
        .route("/api/health", get(health))
        .with_state(ServerState { store })
}

/// Serves the read API on `0.0.0.0:port` until `shutdown` fires.
///
/// # Arguments
/// * `port` - Port to listen on.
/// * `store` - Cache the handlers read from.
/// * `shutdown` - Token that stops accepting connections and drains in-flight requests.
pub async fn serve(
    port: u16,
    store: Arc<CacheStore>,
    shutdown: CancellationToken,
) -> crate::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| crate::Error::PortBindingFailed(port, e))?;
    info!(port, "api listening");

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(crate::Error::ServerCrashed)?;

    info!("api stopped");
    Ok(())
}

fn invalid_time_frame() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": INVALID_TIME_FRAME })),
    )
        .into_response()
}

async fn data(
    State(state): State<ServerState>,
    query: Result<Query<DataQuery>, QueryRejection>,
) -> Response {
    let Query(query) = match query {
        Ok(query) => query,
        Err(rejection) => {
            debug!(error = %rejection, "malformed data query");
            return invalid_time_frame();
        }
    };

    let key = query.time_frame.as_deref().unwrap_or_default();
    match state.store.get_str(key) {
        Ok(snapshot) if query.simulate() => {
            Json(snapshot.simulate(SIMULATION_MULTIPLIER)).into_response()
        }
        Ok(snapshot) => Json(snapshot.as_ref()).into_response(),
        Err(err) => {
            debug!(time_frame = key, error = %err, "rejected data request");
            invalid_time_frame()
        }
    }
}

async fn cache(State(state): State<ServerState>) -> Response {
    let entries = state.store.entries();
    let body: BTreeMap<TimeFrameKey, Option<&CacheSnapshot>> = entries
        .iter()
        .map(|(key, snapshot)| (*key, snapshot.as_deref()))
        .collect();
    Json(body).into_response()
}

async fn health(State(state): State<ServerState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        last_refresh: state.store.last_refresh().map(|at| at.to_rfc3339()),
    })
}
