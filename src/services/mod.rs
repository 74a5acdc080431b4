/// Clock WebSocket message handling: authorization, commands and broadcasts.
pub mod command_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Debounced write-behind of clock state.
pub mod persistence;
/// Player profiles and registration.
pub mod registration_service;
/// Durable store connection and health supervision.
pub mod storage_supervisor;
/// Per-tournament background ticking.
pub mod ticker;
/// Tournament creation, restore and teardown.
pub mod tournament_service;
/// WebSocket connection lifecycle for clock observers.
pub mod websocket_service;
