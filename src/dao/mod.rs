/// Database model definitions.
pub mod models;
/// Storage abstraction layer for database operations.
pub mod storage;
/// Tournament, player and entry persistence.
pub mod tournament_store;
