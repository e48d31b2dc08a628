//! Store accessors consumed by the matching engine
//!
//! The engine never talks to storage directly. Vehicle positions and regions
//! are read-only snapshots; occupancy is the only state the engine writes.
//! `MemoryStore` implements all three traits.

use crate::domain::types::{OccupancyRecord, Region, RegionId, VehicleId, VehiclePosition};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by store accessors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Snapshot could not be read (backend down, query failed)
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Occupancy read or write failed
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Accessor call exceeded its deadline
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

impl StoreError {
    /// Creates an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Creates a write-failed error.
    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::WriteFailed(msg.into())
    }
}

/// Read access to the current vehicle positions
#[async_trait]
pub trait VehicleStore: Send + Sync {
    /// Full snapshot, in a stable order
    async fn list_vehicle_positions(&self) -> Result<Vec<VehiclePosition>, StoreError>;
}

/// Read access to the configured regions
#[async_trait]
pub trait RegionStore: Send + Sync {
    /// Full snapshot, in a stable order
    ///
    /// Order matters: the first containing region wins a vehicle.
    async fn list_regions(&self) -> Result<Vec<Region>, StoreError>;
}

/// Read/write access to occupancy counters
#[async_trait]
pub trait OccupancyStore: Send + Sync {
    async fn get_occupancy(
        &self,
        vehicle: &VehicleId,
        region: RegionId,
    ) -> Result<Option<OccupancyRecord>, StoreError>;

    /// Atomic upsert: create with counter 1 or add 1
    ///
    /// Implementations also drop the vehicle's records for other regions.
    async fn upsert_occupancy_increment(
        &self,
        vehicle: &VehicleId,
        region: RegionId,
        now_ms: u64,
    ) -> Result<OccupancyRecord, StoreError>;

    /// Clear every record held by the vehicle; returns how many were cleared
    async fn reset_occupancy(&self, vehicle: &VehicleId) -> Result<usize, StoreError>;

    /// All live records, for reporting
    async fn list_occupancy(&self) -> Result<Vec<OccupancyRecord>, StoreError>;
}
