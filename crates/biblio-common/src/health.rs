//! Health check response shared by every process that exposes a
//! `/healthz` endpoint.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self::healthy()
    }
}

pub fn health_check() -> HealthResponse {
    HealthResponse::healthy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_response_reports_a_version() {
        let response = health_check();
        assert_eq!(response.status, "healthy");
        assert!(!response.version.is_empty());
    }
}
