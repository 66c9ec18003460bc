use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use orderly_db::DbPool;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Ready,
    Degraded,
}

#[derive(Clone, Debug, Serialize)]
pub struct Probe {
    pub status: ProbeStatus,
    pub detail: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub status: ProbeStatus,
    pub database: Probe,
    pub checked_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(report)).with_state(HealthState { db_pool })
}

/// Serves the health endpoint on its own port so probes keep answering while
/// the webhook listener is draining.
pub async fn spawn(bind_address: &str, port: u16, db_pool: DbPool) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(event_name = "system.health.start", bind_address = %address, "health endpoint started");

    tokio::spawn(async move {
        if let Err(serve_error) = axum::serve(listener, router(db_pool)).await {
            error!(
                event_name = "system.health.error",
                error = %serve_error,
                "health endpoint terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn report(State(state): State<HealthState>) -> (StatusCode, Json<HealthReport>) {
    let database = probe_database(&state.db_pool).await;

    let (status, code) = match database.status {
        ProbeStatus::Ready => (ProbeStatus::Ready, StatusCode::OK),
        ProbeStatus::Degraded => (ProbeStatus::Degraded, StatusCode::SERVICE_UNAVAILABLE),
    };

    (code, Json(HealthReport { status, database, checked_at: Utc::now() }))
}

async fn probe_database(pool: &DbPool) -> Probe {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => Probe { status: ProbeStatus::Ready, detail: "ledger reachable".to_string() },
        Err(query_error) => Probe {
            status: ProbeStatus::Degraded,
            detail: format!("ledger probe failed: {query_error}"),
        },
    }
}
