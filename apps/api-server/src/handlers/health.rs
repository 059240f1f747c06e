//! Health check endpoint.

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub storage: &'static str,
    pub timestamp: String,
}

/// Health check endpoint - returns server status.
///
/// GET /api/health
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let (status, storage) = match &state.db {
        None => ("ok", "in-memory"),
        Some(db) => match ping(db).await {
            true => ("ok", "postgres"),
            false => ("degraded", "postgres"),
        },
    };

    let response = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        storage,
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    if status == "ok" {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

#[cfg(feature = "postgres")]
async fn ping(db: &quill_infra::DatabaseConnections) -> bool {
    match db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Database ping failed: {}", e);
            false
        }
    }
}

#[cfg(not(feature = "postgres"))]
async fn ping(_db: &quill_infra::DatabaseConnections) -> bool {
    true
}
