use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod boundary;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod entity;
pub mod error;
pub mod map;
pub mod maze;
pub mod pool;
pub mod registry;

pub use catalog::AssetCatalog;
pub use config::MapConfig;
pub use controller::{MapController, MapState, Phase, Scenario, SessionState};
pub use entity::{Entity, EntityRecord, EntitySpec};
pub use error::MapError;
pub use pool::GridPool;
pub use registry::EntityRegistry;

/// A discrete map coordinate.
///
/// Playable cells live in `[0, width) x [0, height) x {0}`; the boundary ring
/// uses `-1` and the map extent, and stacks walls along `z`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Cell { x, y, z }
    }

    /// A cell on the ground layer.
    pub const fn ground(x: i32, y: i32) -> Self {
        Cell { x, y, z: 0 }
    }

    /// Returns the cell offset by `(dx, dy)` on the same layer.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Cell {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z,
        }
    }

    /// Whether this is a ground cell inside a `width x height` map.
    pub fn is_within(&self, width: i32, height: i32) -> bool {
        self.z == 0 && (0..width).contains(&self.x) && (0..height).contains(&self.y)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// The kinds of entity a map can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Agent,
    Goal,
    Block,
    Boundary,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Agent,
        EntityKind::Goal,
        EntityKind::Block,
        EntityKind::Boundary,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Agent => "agent",
            EntityKind::Goal => "goal",
            EntityKind::Block => "block",
            EntityKind::Boundary => "boundary",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            EntityKind::Agent => 0,
            EntityKind::Goal => 1,
            EntityKind::Block => 2,
            EntityKind::Boundary => 3,
        }
    }

    /// Character used for this kind in the debug grid dump.
    pub fn glyph(self) -> char {
        match self {
            EntityKind::Agent => 'A',
            EntityKind::Goal => 'G',
            EntityKind::Block => 'B',
            EntityKind::Boundary => '#',
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unrecognized entity type '{s}'"))
    }
}
