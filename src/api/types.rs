//! API response types

use serde::Serialize;

/// Response for `GET /`
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub message: String,
}

/// Response for `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub agent: &'static str,
    pub protocol: &'static str,
    pub backend: String,
    pub model: String,
}
