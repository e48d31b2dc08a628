//! Region boundary extraction
//!
//! Boundaries arrive in more than one wire shape. They are parsed into a
//! tagged variant in a fixed order and then flattened to the outer ring:
//! 1. Envelope `{"type": "Polygon", "coordinates": [[[x, y], ...], ...]}`
//! 2. Bare ring list `[[[x, y], ...], ...]`
//! 3. Bare ring `[[x, y], ...]`
//!
//! Only the outer ring is used; holes are ignored.

use crate::domain::types::{Point, Region};
use serde::Deserialize;
use thiserror::Error;

/// Minimum number of vertices for a usable ring
pub const MIN_RING_VERTICES: usize = 3;

/// Why a region boundary could not be turned into a ring
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoundaryError {
    #[error("boundary matches no accepted shape: {0}")]
    UnrecognizedShape(String),

    #[error("unsupported geometry type {0:?}")]
    UnsupportedType(String),

    #[error("boundary has no rings")]
    NoRings,

    #[error("vertex {index} has {found} coordinate components, need 2")]
    MissingComponent { index: usize, found: usize },

    #[error("ring has {0} vertices, need at least 3")]
    TooFewVertices(usize),
}

/// Raw vertex: extra components (altitude) are allowed and ignored
type RawRing = Vec<Vec<f64>>;

/// Accepted wire shapes, tried in declaration order
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BoundaryShape {
    Envelope {
        #[serde(rename = "type")]
        kind: String,
        coordinates: Vec<RawRing>,
    },
    Rings(Vec<RawRing>),
    Ring(RawRing),
}

impl BoundaryShape {
    /// Select the outer ring of the shape
    fn into_outer_ring(self) -> Result<RawRing, BoundaryError> {
        match self {
            BoundaryShape::Envelope { kind, coordinates } => {
                if !kind.eq_ignore_ascii_case("polygon") {
                    return Err(BoundaryError::UnsupportedType(kind));
                }
                coordinates.into_iter().next().ok_or(BoundaryError::NoRings)
            }
            // A list of empty arrays also reads as a ring of component-less vertices
            BoundaryShape::Rings(rings)
                if !rings.is_empty() && rings.iter().all(Vec::is_empty) =>
            {
                Ok(vec![Vec::new(); rings.len()])
            }
            BoundaryShape::Rings(rings) => rings.into_iter().next().ok_or(BoundaryError::NoRings),
            BoundaryShape::Ring(ring) => Ok(ring),
        }
    }
}

/// Parse a boundary value into the flat vertex sequence used by the kernel
pub fn parse_ring(value: &serde_json::Value) -> Result<Vec<Point>, BoundaryError> {
    if value.is_null() {
        return Err(BoundaryError::UnrecognizedShape("null".to_string()));
    }

    let shape = BoundaryShape::deserialize(value)
        .map_err(|e| BoundaryError::UnrecognizedShape(e.to_string()))?;
    let raw = shape.into_outer_ring()?;

    let mut ring = Vec::with_capacity(raw.len());
    for (index, vertex) in raw.iter().enumerate() {
        match vertex.as_slice() {
            [x, y, ..] => ring.push(Point::new(*x, *y)),
            _ => return Err(BoundaryError::MissingComponent { index, found: vertex.len() }),
        }
    }

    if ring.len() < MIN_RING_VERTICES {
        return Err(BoundaryError::TooFewVertices(ring.len()));
    }
    Ok(ring)
}

/// Extract the outer ring of a region's stored boundary
#[inline]
pub fn extract_ring(region: &Region) -> Result<Vec<Point>, BoundaryError> {
    parse_ring(&region.boundary)
}
