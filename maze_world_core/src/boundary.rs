use rand::Rng;
use rand::seq::IndexedRandom;

use crate::{AssetCatalog, Cell, Entity, EntityKind, MapError};

/// Number of wall segments stacked on each ring cell.
pub const WALL_HEIGHT: i32 = 3;
/// Catalog name of the boundary wall assets.
pub const WALL_NAME: &str = "wall";
/// Color label carried by every wall segment.
pub const WALL_COLOR: &str = "na";

/// Ground cells of the one-cell ring just outside `[0, width) x [0, height)`.
///
/// Rows `-1` and `height` are listed first (columns `-1..=width`, corners
/// included), then columns `-1` and `width` for rows `0..height`.
pub fn ring_cells(width: i32, height: i32) -> Vec<Cell> {
    let mut cells = Vec::new();
    for x in -1..=width {
        for y in [-1, height] {
            cells.push(Cell::ground(x, y));
        }
    }
    for x in [-1, width] {
        for y in 0..height {
            cells.push(Cell::ground(x, y));
        }
    }
    cells
}

/// Builds the wall entities surrounding a `width x height` map.
///
/// Ids are `wall_<n>` counting up from `height * width`, so they never
/// collide with the `<name>_<index>` ids handed to regular entities.
pub fn generate<R: Rng + ?Sized>(
    width: i32,
    height: i32,
    catalog: &AssetCatalog,
    rng: &mut R,
) -> Result<Vec<Entity>, MapError> {
    let assets = catalog.variants(EntityKind::Boundary, WALL_NAME);
    let ring = ring_cells(width, height);
    let mut walls = Vec::with_capacity(ring.len() * WALL_HEIGHT as usize);
    let mut next_id = height * width;
    for cell in ring {
        for z in 0..WALL_HEIGHT {
            let asset = assets
                .choose(rng)
                .ok_or_else(|| MapError::MissingCatalogEntry {
                    kind: EntityKind::Boundary,
                    name: Some(WALL_NAME.to_string()),
                })?;
            walls.push(Entity {
                id: format!("{WALL_NAME}_{next_id}"),
                kind: EntityKind::Boundary,
                location: Some(Cell::new(cell.x, cell.y, z)),
                orientation: Some(0.0),
                name: Some(WALL_NAME.to_string()),
                asset_reference: Some(asset.to_string()),
                color: Some(WALL_COLOR.to_string()),
            });
            next_id += 1;
        }
    }
    tracing::debug!(width, height, walls = walls.len(), "generated boundary");
    Ok(walls)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashSet;

    fn catalog() -> AssetCatalog {
        let mut catalog = AssetCatalog::new();
        catalog.insert_variant(EntityKind::Boundary, "wall", "boundary/wall/wall_1.urdf");
        catalog.insert_variant(EntityKind::Boundary, "wall", "boundary/wall/wall_2.urdf");
        catalog
    }

    #[test]
    fn ring_surrounds_map_exactly_once() {
        let ring = ring_cells(3, 2);
        let unique: HashSet<_> = ring.iter().copied().collect();
        assert_eq!(ring.len(), unique.len());
        // (w + 2) * (h + 2) - w * h
        assert_eq!(ring.len(), 5 * 4 - 6);
        assert!(ring.iter().all(|c| !c.is_within(3, 2)));
        assert!(unique.contains(&Cell::ground(-1, -1)));
        assert!(unique.contains(&Cell::ground(3, 2)));
    }

    #[test]
    fn walls_are_stacked_with_sequential_ids() {
        let mut rng = StdRng::seed_from_u64(0);
        let walls = generate(2, 2, &catalog(), &mut rng).unwrap();
        assert_eq!(walls.len(), 12 * WALL_HEIGHT as usize);
        assert_eq!(walls[0].id, "wall_4");
        assert_eq!(walls[0].location, Some(Cell::new(-1, -1, 0)));
        assert_eq!(walls[2].location, Some(Cell::new(-1, -1, 2)));
        assert_eq!(walls.last().unwrap().id, "wall_39");
        assert!(walls.iter().all(|w| w.color.as_deref() == Some("na")
            && w.orientation == Some(0.0)
            && w.kind == EntityKind::Boundary));
    }

    #[test]
    fn missing_wall_assets_fail() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            generate(2, 2, &AssetCatalog::new(), &mut rng),
            Err(MapError::MissingCatalogEntry {
                kind: EntityKind::Boundary,
                name: Some("wall".into())
            })
        );
    }
}
