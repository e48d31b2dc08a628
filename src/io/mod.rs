//! IO modules - storage accessors and the HTTP surface
//!
//! - `store` - accessor traits consumed by the matching engine
//! - `memory_store` - in-memory implementation with JSON seeding
//! - `api` - HTTP control and reporting endpoints
//! - `prometheus` - Prometheus text formatting for `/metrics`

pub mod api;
pub mod memory_store;
pub mod prometheus;
pub mod store;

// Re-export commonly used types
pub use api::{start_api_server, ApiState};
pub use memory_store::MemoryStore;
pub use store::{OccupancyStore, RegionStore, StoreError, VehicleStore};
