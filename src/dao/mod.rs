/// Database model definitions.
pub mod models;
/// Result storage backends and the `ResultStore` trait.
pub mod result_store;
/// Storage abstraction layer for database operations.
pub mod storage;
