use serde::{Deserialize, Serialize};

use crate::{Cell, EntityKind, MapError};

/// A placeable map entity.
///
/// Unset fields are filled in when the map is instantiated. Stationary
/// entities (everything but agents) own their `location` exclusively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
    pub location: Option<Cell>,
    /// Yaw in radians.
    pub orientation: Option<f64>,
    pub name: Option<String>,
    pub asset_reference: Option<String>,
    pub color: Option<String>,
}

impl Entity {
    pub fn from_spec(id: impl Into<String>, spec: EntitySpec) -> Self {
        Entity {
            id: id.into(),
            kind: spec.kind,
            location: spec.location,
            orientation: spec.orientation,
            name: spec.name,
            asset_reference: None,
            color: None,
        }
    }

    pub fn is_agent(&self) -> bool {
        self.kind == EntityKind::Agent
    }

    /// The grid cell this entity holds in the free-cell bookkeeping, if any.
    pub fn occupied_cell(&self) -> Option<Cell> {
        if self.is_agent() { None } else { self.location }
    }
}

/// A partially specified entity, as supplied by scenario code.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpec {
    pub kind: EntityKind,
    pub location: Option<Cell>,
    pub orientation: Option<f64>,
    pub name: Option<String>,
}

impl EntitySpec {
    pub fn new(kind: EntityKind) -> Self {
        EntitySpec {
            kind,
            location: None,
            orientation: None,
            name: None,
        }
    }

    pub fn agent() -> Self {
        Self::new(EntityKind::Agent)
    }

    pub fn goal() -> Self {
        Self::new(EntityKind::Goal)
    }

    pub fn block() -> Self {
        Self::new(EntityKind::Block)
    }

    pub fn at(mut self, cell: Cell) -> Self {
        self.location = Some(cell);
        self
    }

    pub fn facing(mut self, yaw: f64) -> Self {
        self.orientation = Some(yaw);
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Flat attribute record exchanged with the simulator.
///
/// `type` is kept as a plain string so that unknown kinds coming from the
/// simulator can be reported instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: Option<Cell>,
    pub orientation: Option<f64>,
    pub name: Option<String>,
    pub asset_reference: Option<String>,
    pub color: Option<String>,
}

impl From<&Entity> for EntityRecord {
    fn from(entity: &Entity) -> Self {
        EntityRecord {
            id: entity.id.clone(),
            kind: entity.kind.as_str().to_string(),
            location: entity.location,
            orientation: entity.orientation,
            name: entity.name.clone(),
            asset_reference: entity.asset_reference.clone(),
            color: entity.color.clone(),
        }
    }
}

impl TryFrom<EntityRecord> for Entity {
    type Error = MapError;

    fn try_from(record: EntityRecord) -> Result<Self, Self::Error> {
        let kind = record
            .kind
            .parse::<EntityKind>()
            .map_err(|reason| MapError::MalformedSnapshot {
                reason: format!("entity '{}': {reason}", record.id),
            })?;
        Ok(Entity {
            id: record.id,
            kind,
            location: record.location,
            orientation: record.orientation,
            name: record.name,
            asset_reference: record.asset_reference,
            color: record.color,
        })
    }
}
