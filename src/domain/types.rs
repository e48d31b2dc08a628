//! Shared types for the parking monitor

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable), used as pass id
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Get current epoch milliseconds
#[inline]
pub fn epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

/// Newtype wrapper for vehicle IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for region IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct RegionId(pub i32);

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Planar vertex: x is longitude, y is latitude
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Last reported position of a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehiclePosition {
    pub vehicle_id: VehicleId,
    pub longitude: f64,
    pub latitude: f64,
    /// Epoch ms of the last report (filled in on ingest when absent)
    #[serde(default)]
    pub updated_at_ms: u64,
}

impl VehiclePosition {
    pub fn new(vehicle_id: impl Into<String>, longitude: f64, latitude: f64) -> Self {
        Self { vehicle_id: VehicleId::new(vehicle_id), longitude, latitude, updated_at_ms: 0 }
    }
}

/// Named region with its boundary in raw wire form
///
/// The boundary is parsed on every pass (see `domain::boundary`), so a region
/// with a broken boundary can still be stored and listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub region_id: RegionId,
    pub name: String,
    #[serde(default)]
    pub boundary: serde_json::Value,
}

impl Region {
    pub fn new(region_id: i32, name: impl Into<String>, boundary: serde_json::Value) -> Self {
        Self { region_id: RegionId(region_id), name: name.into(), boundary }
    }
}

/// Dwell counter for one (vehicle, region) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyRecord {
    pub vehicle_id: VehicleId,
    pub region_id: RegionId,
    /// Consecutive passes the vehicle was confirmed inside the region
    pub counter: u32,
    /// Epoch ms of the last confirming pass
    pub last_counted_ms: u64,
}

/// Outcome of matching one vehicle against the region snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    Matched(RegionId),
    Unmatched,
}

/// Summary of one matching pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub pass_id: String,
    pub vehicles_processed: u64,
    pub matched: u64,
    pub unmatched: u64,
    /// Regions whose boundary failed to parse in this pass
    pub malformed_regions: u64,
    /// Region evaluations skipped because of a malformed boundary
    pub boundary_errors: u64,
    /// Occupancy increments/resets that failed
    pub write_failures: u64,
    /// Pass stopped early on shutdown
    pub cancelled: bool,
    pub started_at_ms: u64,
    pub duration_ms: u64,
}

impl PassSummary {
    pub fn new(pass_id: String, started_at_ms: u64) -> Self {
        Self { pass_id, started_at_ms, ..Default::default() }
    }
}

/// Reporting row for the current occupancy view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyView {
    pub vehicle_id: VehicleId,
    pub region_id: RegionId,
    /// None when the region has since been removed from the store
    pub region_name: Option<String>,
    pub counter: u32,
    pub last_counted_ms: u64,
}
