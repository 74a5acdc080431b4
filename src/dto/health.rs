use serde::Serialize;
use utoipa::ToSchema;

/// Simple health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of tournament clocks currently loaded in memory.
    pub loaded_tournaments: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(loaded_tournaments: usize) -> Self {
        Self {
            status: "ok".to_string(),
            loaded_tournaments,
        }
    }

    /// Create a health response indicating the system is in degraded mode.
    pub fn degraded(loaded_tournaments: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            loaded_tournaments,
        }
    }
}
