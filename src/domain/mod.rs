//! Domain models - core types, geometry kernel and boundary parsing
//!
//! - `types` - vehicles, regions, occupancy records, pass summaries
//! - `geometry` - even-odd point-in-polygon test
//! - `boundary` - region boundary wire shapes to vertex rings

pub mod boundary;
pub mod geometry;
pub mod types;

// Re-export commonly used types at module level
pub use boundary::{extract_ring, BoundaryError};
pub use geometry::point_in_polygon;
pub use types::{
    MatchResult, OccupancyRecord, OccupancyView, PassSummary, Point, Region, RegionId,
    VehicleId, VehiclePosition,
};
