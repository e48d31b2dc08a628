//! Services - business logic and state management
//!
//! - `matcher` - Matching engine: one serialized pass over all vehicles
//! - `occupancy` - Per-(vehicle, region) counter transitions

pub mod matcher;
pub mod occupancy;

// Re-export commonly used types
pub use matcher::{MatchingEngine, PassError, TriggerAck};
pub use occupancy::OccupancyTable;
