use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report storage connectivity and the number of loaded clocks, logging connectivity issues.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let loaded = state.clocks().ids().len();
    if state.is_degraded() {
        HealthResponse::degraded(loaded)
    } else {
        HealthResponse::ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        auth::JwtVerifier, config::AppConfig,
        dao::tournament_store::memory::MemoryTournamentStore, state::AppState,
    };

    #[tokio::test]
    async fn degraded_until_a_store_is_installed() {
        let state = AppState::new(AppConfig::default(), Arc::new(JwtVerifier::new("test")));
        assert_eq!(health_status(&state).await.status, "degraded");

        state
            .install_store(Arc::new(MemoryTournamentStore::new()))
            .await;
        let health = health_status(&state).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.loaded_tournaments, 0);
    }
}
