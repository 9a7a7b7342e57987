//! Depot persistence layer
//!
//! The `UploadStore` trait owns session, chunk, and attachment records. Two
//! implementations ship: `PgUploadStore` (PostgreSQL via sqlx, the production
//! backend) and `MemoryUploadStore` (tokio-lock maps with identical
//! semantics, used by tests and embedded deployments).

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryUploadStore;
pub use postgres::PgUploadStore;
pub use store::{ChunkAck, DedupProbe, UploadStore};
