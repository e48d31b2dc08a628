//! In-memory store backing all three accessors
//!
//! Vehicles and regions live in ordered maps so snapshots come back in a
//! stable order (vehicles by id, regions by id). Occupancy is an
//! `OccupancyTable` behind a mutex, which makes each upsert atomic.
//!
//! Can be seeded from a JSON file:
//! `{ "vehicles": [VehiclePosition...], "regions": [Region...] }`

use crate::domain::types::{
    epoch_ms, OccupancyRecord, Region, RegionId, VehicleId, VehiclePosition,
};
use crate::io::store::{OccupancyStore, RegionStore, StoreError, VehicleStore};
use crate::services::occupancy::OccupancyTable;
use anyhow::Context;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

/// Seed file contents
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub vehicles: Vec<VehiclePosition>,
    #[serde(default)]
    pub regions: Vec<Region>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    vehicles: RwLock<BTreeMap<VehicleId, VehiclePosition>>,
    regions: RwLock<BTreeMap<RegionId, Region>>,
    occupancy: Mutex<OccupancyTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON seed file
    pub fn from_seed_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let seed: Seed = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))?;

        let store = Self::new();
        let vehicles = store.upsert_vehicles(seed.vehicles);
        let regions = store.upsert_regions(seed.regions);
        info!(file = %path.display(), vehicles = %vehicles, regions = %regions, "store_seeded");
        Ok(store)
    }

    /// Insert or replace vehicle positions; returns the number written
    ///
    /// Positions without a timestamp are stamped with the current time.
    pub fn upsert_vehicles(&self, positions: Vec<VehiclePosition>) -> usize {
        let now = epoch_ms();
        let mut vehicles = self.vehicles.write();
        let count = positions.len();
        for mut pos in positions {
            if pos.updated_at_ms == 0 {
                pos.updated_at_ms = now;
            }
            vehicles.insert(pos.vehicle_id.clone(), pos);
        }
        count
    }

    /// Insert or replace regions; returns the number written
    ///
    /// Boundaries are stored as given and only parsed during a pass.
    pub fn upsert_regions(&self, regions: Vec<Region>) -> usize {
        let mut stored = self.regions.write();
        let count = regions.len();
        for region in regions {
            stored.insert(region.region_id, region);
        }
        count
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.read().len()
    }

    pub fn region_count(&self) -> usize {
        self.regions.read().len()
    }
}

#[async_trait]
impl VehicleStore for MemoryStore {
    async fn list_vehicle_positions(&self) -> Result<Vec<VehiclePosition>, StoreError> {
        Ok(self.vehicles.read().values().cloned().collect())
    }
}

#[async_trait]
impl RegionStore for MemoryStore {
    async fn list_regions(&self) -> Result<Vec<Region>, StoreError> {
        Ok(self.regions.read().values().cloned().collect())
    }
}

#[async_trait]
impl OccupancyStore for MemoryStore {
    async fn get_occupancy(
        &self,
        vehicle: &VehicleId,
        region: RegionId,
    ) -> Result<Option<OccupancyRecord>, StoreError> {
        Ok(self.occupancy.lock().get(vehicle, region).cloned())
    }

    async fn upsert_occupancy_increment(
        &self,
        vehicle: &VehicleId,
        region: RegionId,
        now_ms: u64,
    ) -> Result<OccupancyRecord, StoreError> {
        Ok(self.occupancy.lock().increment(vehicle, region, now_ms))
    }

    async fn reset_occupancy(&self, vehicle: &VehicleId) -> Result<usize, StoreError> {
        Ok(self.occupancy.lock().reset(vehicle))
    }

    async fn list_occupancy(&self) -> Result<Vec<OccupancyRecord>, StoreError> {
        Ok(self.occupancy.lock().snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_snapshots_are_ordered_by_id() {
        let store = MemoryStore::new();
        store.upsert_vehicles(vec![
            VehiclePosition::new("T3", 0.0, 0.0),
            VehiclePosition::new("T1", 0.0, 0.0),
            VehiclePosition::new("T2", 0.0, 0.0),
        ]);
        store.upsert_regions(vec![
            Region::new(20, "B", json!(null)),
            Region::new(10, "A", json!(null)),
        ]);

        let vehicles = store.list_vehicle_positions().await.unwrap();
        let ids: Vec<&str> = vehicles.iter().map(|v| v.vehicle_id.as_str()).collect();
        assert_eq!(ids, vec!["T1", "T2", "T3"]);

        let regions = store.list_regions().await.unwrap();
        assert_eq!(regions[0].region_id, RegionId(10));
        assert_eq!(regions[1].region_id, RegionId(20));
    }

    #[tokio::test]
    async fn test_upsert_replaces_position_and_stamps_time() {
        let store = MemoryStore::new();
        store.upsert_vehicles(vec![VehiclePosition::new("T1", 1.0, 1.0)]);
        store.upsert_vehicles(vec![VehiclePosition::new("T1", 2.0, 3.0)]);

        let vehicles = store.list_vehicle_positions().await.unwrap();
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].longitude, 2.0);
        assert_eq!(vehicles[0].latitude, 3.0);
        assert!(vehicles[0].updated_at_ms > 0);
    }

    #[tokio::test]
    async fn test_occupancy_round_trip() {
        let store = MemoryStore::new();
        let t1 = VehicleId::new("T1");

        store.upsert_occupancy_increment(&t1, RegionId(1), 100).await.unwrap();
        let record = store.upsert_occupancy_increment(&t1, RegionId(1), 200).await.unwrap();
        assert_eq!(record.counter, 2);

        let fetched = store.get_occupancy(&t1, RegionId(1)).await.unwrap().unwrap();
        assert_eq!(fetched, record);

        assert_eq!(store.reset_occupancy(&t1).await.unwrap(), 1);
        assert!(store.get_occupancy(&t1, RegionId(1)).await.unwrap().is_none());
        assert!(store.list_occupancy().await.unwrap().is_empty());
    }

    #[test]
    fn test_from_seed_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let seed = r#"{
            "vehicles": [
                {"vehicle_id": "T1", "longitude": 5.0, "latitude": 5.0, "updated_at_ms": 42}
            ],
            "regions": [
                {"region_id": 1, "name": "Lot A", "boundary": [[0,0],[0,10],[10,10],[10,0]]},
                {"region_id": 2, "name": "Lot B", "boundary": {"type": "Polygon", "coordinates": []}}
            ]
        }"#;
        temp_file.write_all(seed.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let store = MemoryStore::from_seed_file(temp_file.path()).unwrap();
        assert_eq!(store.vehicle_count(), 1);
        assert_eq!(store.region_count(), 2);
    }

    #[test]
    fn test_from_seed_file_missing() {
        assert!(MemoryStore::from_seed_file("/nonexistent/seed.json").is_err());
    }
}
