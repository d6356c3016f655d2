//! Parking place model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Place type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaceType {
    #[default]
    Standard,
    /// Reserved for reduced-mobility clients
    Pmr,
}

impl fmt::Display for PlaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceType::Standard => write!(f, "standard"),
            PlaceType::Pmr => write!(f, "pmr"),
        }
    }
}

impl PlaceType {
    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Some(PlaceType::Standard),
            "pmr" => Some(PlaceType::Pmr),
            _ => None,
        }
    }
}

/// Place entity
///
/// A place is bound to at most one open ticket at any instant; `available`
/// is false exactly while that ticket is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    /// Unique identifier
    pub id: i64,

    /// Number painted on the ground
    pub number: i32,

    /// Place type
    pub place_type: PlaceType,

    /// Free (true) or occupied (false)
    pub available: bool,
}

impl Place {
    #[inline]
    pub fn is_occupied(&self) -> bool {
        !self.available
    }
}

/// Occupancy counters for the whole pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Occupancy {
    pub total: i64,
    pub occupied: i64,
}

impl Occupancy {
    pub fn free(&self) -> i64 {
        self.total - self.occupied
    }
}
