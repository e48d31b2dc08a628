//! Per-(vehicle, region) occupancy state machine
//!
//! Holds the dwell counters driven by the matching engine. Each confirmed
//! pass inside a region bumps the pair's counter; a pass that finds the
//! vehicle in no region clears it.
//!
//! Key behaviors:
//! - First confirmed pass creates the pair with counter 1
//! - Each further confirmed pass for the same pair adds 1
//! - Confirming a different region drops the vehicle's other pairs, so a
//!   vehicle holds at most one live counter
//! - Reset drops every pair of the vehicle; re-entry counts from 1 again

use crate::domain::types::{OccupancyRecord, RegionId, VehicleId};
use rustc_hash::FxHashMap;

/// In-memory occupancy table
///
/// Outer key is vehicle, inner key is region
#[derive(Debug, Default)]
pub struct OccupancyTable {
    /// vehicles[vehicle_id][region_id] = OccupancyRecord
    vehicles: FxHashMap<VehicleId, FxHashMap<RegionId, OccupancyRecord>>,
}

impl OccupancyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one confirmed containment of `vehicle` in `region`
    ///
    /// Returns the record as it stands after the transition.
    pub fn increment(
        &mut self,
        vehicle: &VehicleId,
        region: RegionId,
        now_ms: u64,
    ) -> OccupancyRecord {
        let regions = self.vehicles.entry(vehicle.clone()).or_default();

        // Moving straight into another region ends the previous dwell
        regions.retain(|&id, _| id == region);

        let record = regions.entry(region).or_insert_with(|| OccupancyRecord {
            vehicle_id: vehicle.clone(),
            region_id: region,
            counter: 0,
            last_counted_ms: now_ms,
        });
        record.counter = record.counter.saturating_add(1);
        record.last_counted_ms = now_ms;
        record.clone()
    }

    /// Clear all occupancy held by `vehicle`
    ///
    /// Returns the number of records removed (0 if the vehicle held none).
    pub fn reset(&mut self, vehicle: &VehicleId) -> usize {
        self.vehicles.remove(vehicle).map(|regions| regions.len()).unwrap_or(0)
    }

    /// Look up a single pair
    pub fn get(&self, vehicle: &VehicleId, region: RegionId) -> Option<&OccupancyRecord> {
        self.vehicles.get(vehicle)?.get(&region)
    }

    /// All live records, ordered by (vehicle, region)
    pub fn snapshot(&self) -> Vec<OccupancyRecord> {
        let mut records: Vec<OccupancyRecord> =
            self.vehicles.values().flat_map(|regions| regions.values().cloned()).collect();
        records.sort_by(|a, b| {
            a.vehicle_id.cmp(&b.vehicle_id).then_with(|| a.region_id.cmp(&b.region_id))
        });
        records
    }

    /// Number of live records
    pub(crate) fn len(&self) -> usize {
        self.vehicles.values().map(|regions| regions.len()).sum()
    }
}
