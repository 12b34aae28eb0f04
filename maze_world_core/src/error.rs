use crate::{Cell, EntityKind};

/// Errors raised by map operations.
///
/// All of these are precondition violations detected synchronously; none
/// are retried. A failure during instantiation leaves the map needing a
/// fresh reset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error(
        "Dimensions {height}x{width} are invalid: both must be > 1 and within {max_height}x{max_width}"
    )]
    InvalidDimension {
        height: i32,
        width: i32,
        max_height: i32,
        max_width: i32,
    },
    #[error("Map dimensions have not been set")]
    DimensionsUnset,
    #[error("Cell {cell} is not free")]
    CellOccupied { cell: Cell },
    #[error("No free cell left for entity '{entity}': too many entities for the map")]
    PoolExhausted { entity: String },
    #[error("Cell {cell} is not in the free-cell pool")]
    NotInPool { cell: Cell },
    #[error("Cell {cell} is already in the free-cell pool")]
    DuplicateRestore { cell: Cell },
    #[error("Entity '{id}' at {cell} would be off the map")]
    OffMap { id: String, cell: Cell },
    #[error("No entity with id '{id}'")]
    NotFound { id: String },
    #[error("Maze generation only supports square maps of side >= 2, got {width}x{height}")]
    UnsupportedShape { width: i32, height: i32 },
    #[error("Too many blocks for a valid maze: {requested} requested, {available} wall cells")]
    InsufficientBlocks { requested: usize, available: usize },
    #[error("Asset '{asset}' has no entry in the color table")]
    UnknownAsset { asset: String },
    #[error("Catalog has no {kind} entry{}", named(.name))]
    MissingCatalogEntry { kind: EntityKind, name: Option<String> },
    #[error("Malformed snapshot: {reason}")]
    MalformedSnapshot { reason: String },
    #[error("Path from {cell} to itself is trivial")]
    TrivialPath { cell: Cell },
    #[error("Color table line {line_number} is malformed: '{line}'")]
    CatalogParse { line_number: usize, line: String },
}

fn named(name: &Option<String>) -> String {
    name.as_ref()
        .map(|n| format!(" named '{n}'"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = MapError::CellOccupied {
            cell: Cell::ground(2, 3),
        };
        assert_eq!(err.to_string(), "Cell (2, 3, 0) is not free");

        let err = MapError::MissingCatalogEntry {
            kind: EntityKind::Goal,
            name: Some("apple".into()),
        };
        assert_eq!(err.to_string(), "Catalog has no goal entry named 'apple'");

        let err = MapError::MissingCatalogEntry {
            kind: EntityKind::Block,
            name: None,
        };
        assert_eq!(err.to_string(), "Catalog has no block entry");
    }
}
