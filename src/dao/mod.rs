/// Monotonic timestamps for store-assigned fields.
pub mod clock;
/// Session document models shared by every backend.
pub mod models;
/// Session persistence and change delivery.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
