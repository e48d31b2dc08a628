//! Geofence matching engine
//!
//! One pass loads the vehicle and region snapshots, matches every vehicle
//! against the regions in snapshot order (first containing region wins) and
//! drives the occupancy transitions:
//! - matched to R: increment (vehicle, R)
//! - matched to nothing: reset the vehicle
//!
//! Passes are serialized by a lock owned by the engine. Under the `queue`
//! policy at most one background trigger waits behind the running pass;
//! later triggers join it and share its pass id. A failed snapshot
//! load aborts the pass before any write; malformed boundaries and failed
//! writes are skipped and counted.


use crate::domain::boundary::{extract_ring, BoundaryError};
use crate::domain::geometry::point_in_polygon;
use crate::domain::types::{
    epoch_ms, new_uuid_v7, MatchResult, OccupancyView, PassSummary, Point, Region, RegionId,
    VehiclePosition,
};
use crate::infra::config::{BusyPolicy, Config};
use crate::infra::metrics::Metrics;
use crate::io::store::{OccupancyStore, RegionStore, StoreError, VehicleStore};
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// Pass-level failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PassError {
    #[error("vehicle snapshot unavailable: {0}")]
    VehiclesUnavailable(StoreError),

    #[error("region snapshot unavailable: {0}")]
    RegionsUnavailable(StoreError),

    /// Another pass holds the lock and the busy policy is `reject`
    #[error("a matching pass is already running")]
    Busy,
}

/// Returned by `trigger_pass` before the pass runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerAck {
    pub pass_id: String,
    /// True when the pass is waiting behind a running one
    pub queued: bool,
}

/// Region with its boundary parsed once for the pass
#[derive(Debug, Clone)]
pub struct PreparedRegion {
    pub region_id: RegionId,
    pub ring: Result<Vec<Point>, BoundaryError>,
}

impl PreparedRegion {
    pub fn from_region(region: &Region) -> Self {
        Self { region_id: region.region_id, ring: extract_ring(region) }
    }
}

/// Match one vehicle against the regions in order
///
/// Returns the first region whose ring contains the position, plus the
/// number of malformed regions skipped before reaching a decision.
pub fn match_vehicle(vehicle: &VehiclePosition, regions: &[PreparedRegion]) -> (MatchResult, u64) {
    let mut skipped = 0;
    for region in regions {
        match &region.ring {
            Ok(ring) => {
                if point_in_polygon(vehicle.longitude, vehicle.latitude, ring) {
                    return (MatchResult::Matched(region.region_id), skipped);
                }
            }
            Err(_) => skipped += 1,
        }
    }
    (MatchResult::Unmatched, skipped)
}

pub struct MatchingEngine {
    vehicles: Arc<dyn VehicleStore>,
    regions: Arc<dyn RegionStore>,
    occupancy: Arc<dyn OccupancyStore>,
    /// Held for the whole of a pass
    pass_lock: Arc<Mutex<()>>,
    busy_policy: BusyPolicy,
    accessor_timeout: Duration,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
    last_summary: parking_lot::Mutex<Option<PassSummary>>,
    /// Pass id of the background trigger waiting for the lock, if any
    queued_pass: parking_lot::Mutex<Option<String>>,
}

impl MatchingEngine {
    pub fn new(
        vehicles: Arc<dyn VehicleStore>,
        regions: Arc<dyn RegionStore>,
        occupancy: Arc<dyn OccupancyStore>,
        config: &Config,
        metrics: Arc<Metrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            vehicles,
            regions,
            occupancy,
            pass_lock: Arc::new(Mutex::new(())),
            busy_policy: config.busy_policy(),
            accessor_timeout: Duration::from_millis(config.accessor_timeout_ms()),
            metrics,
            shutdown,
            last_summary: parking_lot::Mutex::new(None),
            queued_pass: parking_lot::Mutex::new(None),
        }
    }

    /// Run one pass on the caller's task, honouring the busy policy
    pub async fn run_pass(&self) -> Result<PassSummary, PassError> {
        let _guard = match self.busy_policy {
            BusyPolicy::Queue => self.pass_lock.lock().await,
            BusyPolicy::Reject => self.pass_lock.try_lock().map_err(|_| self.reject())?,
        };
        self.execute(new_uuid_v7()).await
    }

    /// Start a pass in the background and acknowledge immediately
    ///
    /// While a pass runs, triggers collapse into a single waiting pass.
    pub fn trigger_pass(self: &Arc<Self>) -> Result<TriggerAck, PassError> {
        let guard = match self.pass_lock.clone().try_lock_owned() {
            Ok(guard) => Some(guard),
            Err(_) if self.busy_policy == BusyPolicy::Reject => return Err(self.reject()),
            Err(_) => None,
        };

        let pass_id = match guard {
            Some(_) => new_uuid_v7(),
            None => {
                let mut queued_pass = self.queued_pass.lock();
                if let Some(waiting) = queued_pass.as_ref() {
                    debug!(pass_id = %waiting, "pass_trigger_coalesced");
                    return Ok(TriggerAck { pass_id: waiting.clone(), queued: true });
                }
                let pass_id = new_uuid_v7();
                *queued_pass = Some(pass_id.clone());
                pass_id
            }
        };
        let queued = guard.is_none();

        info!(pass_id = %pass_id, queued = %queued, "pass_triggered");

        let engine = Arc::clone(self);
        let task_pass_id = pass_id.clone();
        tokio::spawn(async move {
            let _guard = match guard {
                Some(guard) => guard,
                None => {
                    let guard = engine.pass_lock.clone().lock_owned().await;
                    // Triggers from here on wait behind this pass
                    engine.queued_pass.lock().take();
                    guard
                }
            };
            // Failures are logged and counted inside execute
            let _ = engine.execute(task_pass_id).await;
        });

        Ok(TriggerAck { pass_id, queued })
    }

    /// Most recent pass that produced a summary
    pub fn last_summary(&self) -> Option<PassSummary> {
        self.last_summary.lock().clone()
    }

    /// Current occupancy joined with region names
    ///
    /// Reads outside the pass lock; a concurrent pass may be half applied.
    pub async fn occupancy_snapshot(&self) -> Result<Vec<OccupancyView>, StoreError> {
        let records = self.call(self.occupancy.list_occupancy()).await?;
        let regions = self.call(self.regions.list_regions()).await?;

        let names: FxHashMap<RegionId, String> =
            regions.into_iter().map(|r| (r.region_id, r.name)).collect();

        Ok(records
            .into_iter()
            .map(|record| OccupancyView {
                region_name: names.get(&record.region_id).cloned(),
                vehicle_id: record.vehicle_id,
                region_id: record.region_id,
                counter: record.counter,
                last_counted_ms: record.last_counted_ms,
            })
            .collect())
    }

    fn reject(&self) -> PassError {
        self.metrics.record_pass_rejected();
        warn!("pass_rejected_busy");
        PassError::Busy
    }

    #[inline]
    fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wrap a store call in the accessor deadline
    async fn call<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.accessor_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.accessor_timeout.as_millis() as u64)),
        }
    }

    /// Body of a pass; caller holds the pass lock
    async fn execute(&self, pass_id: String) -> Result<PassSummary, PassError> {
        let started = Instant::now();
        let mut summary = PassSummary::new(pass_id, epoch_ms());
        info!(pass_id = %summary.pass_id, "pass_started");

        if self.is_cancelled() {
            summary.cancelled = true;
            warn!(pass_id = %summary.pass_id, "pass_cancelled");
            return Ok(self.finish(summary, started));
        }

        let vehicles = match self.call(self.vehicles.list_vehicle_positions()).await {
            Ok(vehicles) => vehicles,
            Err(e) => {
                self.metrics.record_pass_failed();
                error!(pass_id = %summary.pass_id, error = %e, "vehicle_snapshot_failed");
                return Err(PassError::VehiclesUnavailable(e));
            }
        };
        let regions = match self.call(self.regions.list_regions()).await {
            Ok(regions) => regions,
            Err(e) => {
                self.metrics.record_pass_failed();
                error!(pass_id = %summary.pass_id, error = %e, "region_snapshot_failed");
                return Err(PassError::RegionsUnavailable(e));
            }
        };

        let prepared: Vec<PreparedRegion> = regions.iter().map(PreparedRegion::from_region).collect();
        for (region, prep) in regions.iter().zip(&prepared) {
            if let Err(e) = &prep.ring {
                summary.malformed_regions += 1;
                warn!(
                    pass_id = %summary.pass_id,
                    region_id = %region.region_id,
                    region_name = %region.name,
                    error = %e,
                    "region_boundary_malformed"
                );
            }
        }

        debug!(
            pass_id = %summary.pass_id,
            vehicles = %vehicles.len(),
            regions = %prepared.len(),
            "snapshots_loaded"
        );

        for vehicle in &vehicles {
            if self.is_cancelled() {
                summary.cancelled = true;
                warn!(
                    pass_id = %summary.pass_id,
                    vehicles_processed = %summary.vehicles_processed,
                    "pass_cancelled"
                );
                break;
            }

            let (result, skipped) = match_vehicle(vehicle, &prepared);
            summary.vehicles_processed += 1;
            summary.boundary_errors += skipped;

            match result {
                MatchResult::Matched(region_id) => {
                    summary.matched += 1;
                    let write = self.occupancy.upsert_occupancy_increment(
                        &vehicle.vehicle_id,
                        region_id,
                        summary.started_at_ms,
                    );
                    match self.call(write).await {
                        Ok(record) => debug!(
                            pass_id = %summary.pass_id,
                            vehicle_id = %vehicle.vehicle_id,
                            region_id = %region_id,
                            counter = %record.counter,
                            "occupancy_incremented"
                        ),
                        Err(e) => {
                            summary.write_failures += 1;
                            warn!(
                                pass_id = %summary.pass_id,
                                vehicle_id = %vehicle.vehicle_id,
                                region_id = %region_id,
                                error = %e,
                                "occupancy_write_failed"
                            );
                        }
                    }
                }
                MatchResult::Unmatched => {
                    summary.unmatched += 1;
                    match self.call(self.occupancy.reset_occupancy(&vehicle.vehicle_id)).await {
                        Ok(cleared) if cleared > 0 => debug!(
                            pass_id = %summary.pass_id,
                            vehicle_id = %vehicle.vehicle_id,
                            cleared = %cleared,
                            "occupancy_reset"
                        ),
                        Ok(_) => {}
                        Err(e) => {
                            summary.write_failures += 1;
                            warn!(
                                pass_id = %summary.pass_id,
                                vehicle_id = %vehicle.vehicle_id,
                                error = %e,
                                "occupancy_write_failed"
                            );
                        }
                    }
                }
            }
        }

        Ok(self.finish(summary, started))
    }

    fn finish(&self, mut summary: PassSummary, started: Instant) -> PassSummary {
        summary.duration_ms = started.elapsed().as_millis() as u64;
        self.metrics.record_pass(&summary);

        info!(
            pass_id = %summary.pass_id,
            vehicles_processed = %summary.vehicles_processed,
            matched = %summary.matched,
            unmatched = %summary.unmatched,
            malformed_regions = %summary.malformed_regions,
            boundary_errors = %summary.boundary_errors,
            write_failures = %summary.write_failures,
            cancelled = %summary.cancelled,
            duration_ms = %summary.duration_ms,
            "pass_completed"
        );

        *self.last_summary.lock() = Some(summary.clone());
        summary
    }
}
