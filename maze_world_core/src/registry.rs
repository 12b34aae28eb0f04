use std::collections::HashSet;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::{
    AssetCatalog, Cell, Entity, EntityKind, EntitySpec, GridPool, MapError, maze::Maze,
};

/// Owns the live entities of a map and keeps them consistent with the
/// free-cell pool.
///
/// Every stationary entity with a location holds a cell that is absent from
/// the pool; deleting it gives the cell back. Agents move continuously in
/// the simulator and never touch the pool.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: Vec<Entity>,
    counts: [usize; 4],
    pool: GridPool,
    next_pending: usize,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entity and empties the pool.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.counts = [0; 4];
        self.pool.clear();
        self.next_pending = 0;
    }

    /// Rebuilds the pool for a `width x height` map, leaving out cells held
    /// by current entities.
    pub fn reset_pool<R: Rng + ?Sized>(&mut self, width: i32, height: i32, rng: &mut R) {
        let occupied: HashSet<Cell> = self
            .entities
            .iter()
            .filter_map(Entity::occupied_cell)
            .collect();
        self.pool
            .rebuild(width, height, |cell| occupied.contains(&cell), rng);
    }

    /// The first stationary entity whose cell lies outside a
    /// `width x height` map.
    pub fn stranded_by(&self, width: i32, height: i32) -> Option<(&str, Cell)> {
        self.entities.iter().find_map(|entity| {
            entity
                .occupied_cell()
                .filter(|cell| !cell.is_within(width, height))
                .map(|cell| (entity.id.as_str(), cell))
        })
    }

    pub fn pool(&self) -> &GridPool {
        &self.pool
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.counts[kind.index()]
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Adds an entity and returns its provisional id.
    ///
    /// A stationary entity given a location must land on a free cell. The
    /// id is replaced by `<name>_<index>` when the map is instantiated.
    pub fn add(&mut self, spec: EntitySpec) -> Result<String, MapError> {
        let id = format!("pending_{}", self.next_pending);
        self.insert(Entity::from_spec(id.clone(), spec))?;
        self.next_pending += 1;
        Ok(id)
    }

    fn insert(&mut self, entity: Entity) -> Result<(), MapError> {
        if let Some(cell) = entity.occupied_cell() {
            self.pool
                .remove(cell)
                .map_err(|_| MapError::CellOccupied { cell })?;
        }
        self.counts[entity.kind.index()] += 1;
        tracing::debug!(id = %entity.id, kind = %entity.kind, location = ?entity.location, "added entity");
        self.entities.push(entity);
        Ok(())
    }

    /// Removes the entity with `id` and returns it.
    pub fn delete(&mut self, id: &str) -> Result<Entity, MapError> {
        let index = self.position(id)?;
        let entity = &self.entities[index];
        if let Some(cell) = entity.occupied_cell() {
            self.pool.restore(cell)?;
        }
        let entity = self.entities.remove(index);
        self.counts[entity.kind.index()] -= 1;
        tracing::debug!(id, kind = %entity.kind, "deleted entity");
        Ok(entity)
    }

    /// Moves an entity to `location`, keeping its id and attributes.
    ///
    /// The target is checked first, so a rejected move changes nothing.
    pub fn move_entity(&mut self, id: &str, location: Cell) -> Result<(), MapError> {
        let entity = &self.entities[self.position(id)?];
        if !entity.is_agent()
            && entity.location != Some(location)
            && !self.pool.contains(&location)
        {
            return Err(MapError::CellOccupied { cell: location });
        }
        let mut entity = self.delete(id)?;
        entity.location = Some(location);
        self.insert(entity)
    }

    fn position(&self, id: &str) -> Result<usize, MapError> {
        self.entities
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| MapError::NotFound { id: id.to_string() })
    }

    /// Completes every partially specified entity.
    ///
    /// Unplaced blocks take maze wall cells (last wall first); then each
    /// entity gets a name, an id `<name>_<index>`, an asset and its color, a
    /// free cell if it has no location, and an orientation. Agents get a
    /// uniform yaw in `(-pi, pi]`, everything else a right angle.
    ///
    /// A failure part way leaves the registry partially filled; the caller
    /// is expected to reset.
    pub fn instantiate_pending<R: Rng + ?Sized>(
        &mut self,
        maze: &Maze,
        catalog: &AssetCatalog,
        rng: &mut R,
    ) -> Result<(), MapError> {
        let requested = self.entities.iter().filter(|e| awaits_maze(e)).count();
        let mut walls: Vec<Cell> = maze
            .wall_cells()
            .into_iter()
            .filter(|cell| self.pool.contains(cell))
            .collect();
        if walls.len() < requested {
            return Err(MapError::InsufficientBlocks {
                requested,
                available: walls.len(),
            });
        }
        for entity in self.entities.iter_mut().filter(|e| awaits_maze(e)) {
            let cell = walls.pop().ok_or(MapError::InsufficientBlocks {
                requested,
                available: 0,
            })?;
            self.pool.remove(cell)?;
            entity.location = Some(cell);
        }

        let mut agent_cells = Vec::new();
        for (index, entity) in self.entities.iter_mut().enumerate() {
            let kind = entity.kind;
            let name = match entity.name.take() {
                Some(name) => name,
                None => catalog
                    .possible_names(kind)
                    .choose(rng)
                    .map(|name| name.to_string())
                    .ok_or(MapError::MissingCatalogEntry { kind, name: None })?,
            };
            entity.id = format!("{name}_{index}");

            let asset = match entity.asset_reference.take() {
                Some(asset) => asset,
                None => catalog
                    .variants(kind, &name)
                    .choose(rng)
                    .map(|asset| asset.to_string())
                    .ok_or_else(|| MapError::MissingCatalogEntry {
                        kind,
                        name: Some(name.clone()),
                    })?,
            };
            entity.color = Some(catalog.color_of(&asset)?.to_string());
            entity.asset_reference = Some(asset);
            entity.name = Some(name);

            if entity.location.is_none() && kind != EntityKind::Block {
                let cell = self.pool.draw(&entity.id)?;
                if kind == EntityKind::Agent {
                    agent_cells.push(cell);
                }
                entity.location = Some(cell);
            }

            if entity.orientation.is_none() {
                entity.orientation = Some(if kind == EntityKind::Agent {
                    PI - rng.random::<f64>() * TAU
                } else {
                    f64::from(rng.random_range(-1i32..=2)) * FRAC_PI_2
                });
            }
            tracing::debug!(id = %entity.id, location = ?entity.location, "instantiated entity");
        }

        // Agents only borrowed their spawn cells so nothing else lands on them.
        for cell in agent_cells {
            self.pool.restore(cell)?;
        }
        tracing::info!(
            entities = self.entities.len(),
            free = self.pool.len(),
            "instantiated entities"
        );
        Ok(())
    }

    /// Replaces every entity with `entities` and rebuilds the pool from
    /// their occupancy.
    ///
    /// Duplicate ids, boundary walls, stationary entities off the map, or two
    /// stationary entities on one cell reject the whole batch without
    /// touching the registry.
    pub fn replace_all<R: Rng + ?Sized>(
        &mut self,
        entities: Vec<Entity>,
        width: i32,
        height: i32,
        rng: &mut R,
    ) -> Result<(), MapError> {
        let mut ids = HashSet::new();
        let mut occupied = HashSet::new();
        for entity in &entities {
            if !ids.insert(entity.id.as_str()) {
                return Err(MapError::MalformedSnapshot {
                    reason: format!("duplicate id '{}'", entity.id),
                });
            }
            if entity.kind == EntityKind::Boundary {
                return Err(MapError::MalformedSnapshot {
                    reason: format!("unknown boundary entity '{}'", entity.id),
                });
            }
            let Some(cell) = entity.occupied_cell() else {
                continue;
            };
            if !cell.is_within(width, height) {
                return Err(MapError::MalformedSnapshot {
                    reason: format!("entity '{}' at {cell} is off the map", entity.id),
                });
            }
            if !occupied.insert(cell) {
                return Err(MapError::MalformedSnapshot {
                    reason: format!("entity '{}' shares cell {cell}", entity.id),
                });
            }
        }

        self.counts = [0; 4];
        for entity in &entities {
            self.counts[entity.kind.index()] += 1;
        }
        self.entities = entities;
        self.pool
            .rebuild(width, height, |cell| occupied.contains(&cell), rng);
        Ok(())
    }
}

/// Blocks without a location wait for a maze wall cell.
fn awaits_maze(entity: &Entity) -> bool {
    entity.kind == EntityKind::Block && entity.location.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ring_cells;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn test_catalog() -> AssetCatalog {
        let mut catalog = AssetCatalog::new();
        for (kind, name, asset, color) in [
            (EntityKind::Agent, "robot", "agent/robot/robot_1.urdf", "white"),
            (EntityKind::Goal, "apple", "goal/fruit/apple/apple_1.urdf", "red"),
            (EntityKind::Goal, "ball", "goal/toy/ball/ball_1.urdf", "blue"),
            (EntityKind::Block, "brick", "block/brick/brick_1.urdf", "grey"),
            (EntityKind::Boundary, "wall", "boundary/wall/wall_1.urdf", "na"),
        ] {
            catalog.insert_variant(kind, name, asset);
            catalog.insert_color(asset, color);
        }
        catalog
    }

    fn registry(width: i32, height: i32, rng: &mut StdRng) -> EntityRegistry {
        let mut registry = EntityRegistry::new();
        registry.reset_pool(width, height, rng);
        registry
    }

    #[test]
    fn add_claims_cell() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut reg = registry(3, 3, &mut rng);
        let cell = Cell::ground(1, 1);
        reg.add(EntitySpec::goal().at(cell)).unwrap();
        assert!(!reg.pool().contains(&cell));
        assert_eq!(reg.count(EntityKind::Goal), 1);
        assert_eq!(
            reg.add(EntitySpec::block().at(cell)),
            Err(MapError::CellOccupied { cell })
        );
        assert_eq!(reg.count(EntityKind::Block), 0);
        // agents may stand anywhere
        reg.add(EntitySpec::agent().at(cell)).unwrap();
        assert_eq!(reg.pool().len(), 8);
    }

    #[test]
    fn add_outside_map_is_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut reg = registry(3, 3, &mut rng);
        let cell = Cell::ground(5, 0);
        assert_eq!(
            reg.add(EntitySpec::goal().at(cell)),
            Err(MapError::CellOccupied { cell })
        );
    }

    #[test]
    fn delete_unknown_leaves_state() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut reg = registry(3, 3, &mut rng);
        reg.add(EntitySpec::goal().at(Cell::ground(0, 0))).unwrap();
        let free = reg.pool().len();

        assert_eq!(
            reg.delete("ghost"),
            Err(MapError::NotFound { id: "ghost".into() })
        );
        assert_eq!(reg.pool().len(), free);
        assert_eq!(reg.count(EntityKind::Goal), 1);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn delete_restores_cell() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut reg = registry(3, 3, &mut rng);
        let cell = Cell::ground(2, 1);
        let id = reg.add(EntitySpec::block().at(cell)).unwrap();
        let removed = reg.delete(&id).unwrap();
        assert_eq!(removed.location, Some(cell));
        assert!(reg.pool().contains(&cell));
        assert_eq!(reg.count(EntityKind::Block), 0);
    }

    #[test]
    fn move_keeps_id_and_swaps_cells() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut reg = registry(3, 3, &mut rng);
        let from = Cell::ground(0, 0);
        let to = Cell::ground(2, 2);
        let id = reg.add(EntitySpec::goal().at(from).named("apple")).unwrap();

        reg.move_entity(&id, to).unwrap();
        let moved = reg.get(&id).unwrap();
        assert_eq!(moved.location, Some(to));
        assert_eq!(moved.name.as_deref(), Some("apple"));
        assert!(reg.pool().contains(&from));
        assert!(!reg.pool().contains(&to));

        // moving onto its own cell is allowed
        reg.move_entity(&id, to).unwrap();
        assert_eq!(reg.count(EntityKind::Goal), 1);
    }

    #[test]
    fn move_onto_taken_cell_changes_nothing() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut reg = registry(3, 3, &mut rng);
        let a = reg.add(EntitySpec::goal().at(Cell::ground(0, 0))).unwrap();
        reg.add(EntitySpec::block().at(Cell::ground(1, 0))).unwrap();

        assert_eq!(
            reg.move_entity(&a, Cell::ground(1, 0)),
            Err(MapError::CellOccupied {
                cell: Cell::ground(1, 0)
            })
        );
        assert_eq!(reg.get(&a).unwrap().location, Some(Cell::ground(0, 0)));
        assert_eq!(reg.entities()[0].id, a);
    }

    #[test]
    fn instantiate_fills_missing_fields() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut reg = registry(5, 5, &mut rng);
        let catalog = test_catalog();
        reg.add(EntitySpec::agent()).unwrap();
        reg.add(EntitySpec::goal().named("ball")).unwrap();
        reg.add(EntitySpec::block()).unwrap();
        let maze = Maze::generate(5, 5, &mut rng).unwrap();

        reg.instantiate_pending(&maze, &catalog, &mut rng).unwrap();

        let ids: Vec<_> = reg.entities().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["robot_0", "ball_1", "brick_2"]);
        for entity in reg.entities() {
            assert!(entity.location.unwrap().is_within(5, 5));
            assert!(entity.color.is_some());
            let yaw = entity.orientation.unwrap();
            if entity.is_agent() {
                assert!(yaw > -PI && yaw <= PI);
            } else {
                let quarter = yaw / FRAC_PI_2;
                assert!((-1..=2).any(|q| (quarter - f64::from(q)).abs() < 1e-9));
            }
        }
        let block = reg.get("brick_2").unwrap().location.unwrap();
        assert!(!maze.is_open(block.x, block.y));
        // the agent's spawn cell went back to the pool
        let agent = reg.get("robot_0").unwrap().location.unwrap();
        assert!(reg.pool().contains(&agent));
        assert_eq!(reg.pool().len(), 25 - 2);
    }

    #[test]
    fn instantiate_rejects_unknown_color() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut reg = registry(3, 3, &mut rng);
        let mut catalog = test_catalog();
        catalog.insert_variant(EntityKind::Goal, "lamp", "goal/home/lamp/lamp_1.urdf");
        reg.add(EntitySpec::goal().named("lamp")).unwrap();
        let maze = Maze::generate(3, 3, &mut rng).unwrap();
        assert_eq!(
            reg.instantiate_pending(&maze, &catalog, &mut rng),
            Err(MapError::UnknownAsset {
                asset: "goal/home/lamp/lamp_1.urdf".into()
            })
        );
    }

    #[test]
    fn too_many_goals_exhaust_pool() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut reg = registry(2, 2, &mut rng);
        for _ in 0..5 {
            reg.add(EntitySpec::goal().named("apple")).unwrap();
        }
        let maze = Maze::generate(2, 2, &mut rng).unwrap();
        assert_eq!(
            reg.instantiate_pending(&maze, &test_catalog(), &mut rng),
            Err(MapError::PoolExhausted {
                entity: "apple_4".into()
            })
        );
    }

    #[test]
    fn replace_all_rejects_duplicates() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut reg = registry(3, 3, &mut rng);
        let goal = Entity::from_spec("apple_0", EntitySpec::goal().at(Cell::ground(0, 0)));
        let other = Entity::from_spec("apple_0", EntitySpec::goal().at(Cell::ground(1, 0)));
        assert!(matches!(
            reg.replace_all(vec![goal.clone(), other], 3, 3, &mut rng),
            Err(MapError::MalformedSnapshot { .. })
        ));
        let stacked = Entity::from_spec("brick_1", EntitySpec::block().at(Cell::ground(0, 0)));
        assert!(matches!(
            reg.replace_all(vec![goal.clone(), stacked], 3, 3, &mut rng),
            Err(MapError::MalformedSnapshot { .. })
        ));
        assert!(reg.is_empty());

        let agent = Entity::from_spec("robot_1", EntitySpec::agent().at(Cell::ground(0, 0)));
        reg.replace_all(vec![goal, agent], 3, 3, &mut rng).unwrap();
        assert_eq!(reg.count(EntityKind::Goal), 1);
        assert_eq!(reg.count(EntityKind::Agent), 1);
        assert_eq!(reg.pool().len(), 8);
    }

    #[test]
    fn replace_all_rejects_off_map_cells() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut reg = registry(3, 3, &mut rng);
        let far = Entity::from_spec("apple_0", EntitySpec::goal().at(Cell::ground(7, 7)));
        let raised = Entity::from_spec("brick_1", EntitySpec::block().at(Cell::new(1, 1, 1)));
        for entity in [far, raised] {
            assert!(matches!(
                reg.replace_all(vec![entity], 3, 3, &mut rng),
                Err(MapError::MalformedSnapshot { .. })
            ));
        }
        assert!(reg.is_empty());
        assert_eq!(reg.pool().len(), 9);
        assert!(reg.pool().cells().iter().all(|c| c.is_within(3, 3)));

        // agents are free to leave the grid
        let agent = Entity::from_spec("robot_0", EntitySpec::agent().at(Cell::ground(7, 7)));
        reg.replace_all(vec![agent], 3, 3, &mut rng).unwrap();
        reg.delete("robot_0").unwrap();
        assert_eq!(reg.pool().len(), 9);
    }

    #[test]
    fn replace_all_rejects_boundary_walls() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut reg = registry(3, 3, &mut rng);
        let wall = Entity::from_spec(
            "wall_999",
            EntitySpec::new(EntityKind::Boundary).at(Cell::ground(1, 1)),
        );
        assert!(matches!(
            reg.replace_all(vec![wall], 3, 3, &mut rng),
            Err(MapError::MalformedSnapshot { .. })
        ));
        assert_eq!(reg.count(EntityKind::Boundary), 0);
        assert_eq!(reg.pool().len(), 9);
    }

    #[test]
    fn stranded_entities_are_found() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut reg = registry(5, 5, &mut rng);
        reg.add(EntitySpec::agent().at(Cell::ground(4, 4))).unwrap();
        let goal = reg.add(EntitySpec::goal().at(Cell::ground(3, 1))).unwrap();
        assert_eq!(reg.stranded_by(5, 5), None);
        assert_eq!(reg.stranded_by(4, 4), None);
        assert_eq!(
            reg.stranded_by(3, 3),
            Some((goal.as_str(), Cell::ground(3, 1)))
        );
    }

    #[derive(Debug, Clone)]
    enum Op {
        Add(EntityKind, Option<(i32, i32)>),
        Delete(usize),
        Move(usize, (i32, i32)),
    }

    fn op() -> impl Strategy<Value = Op> {
        let kind = prop_oneof![
            Just(EntityKind::Agent),
            Just(EntityKind::Goal),
            Just(EntityKind::Block),
        ];
        let cell = (-1i32..6, -1i32..6);
        prop_oneof![
            (kind, proptest::option::of(cell.clone())).prop_map(|(k, c)| Op::Add(k, c)),
            any::<usize>().prop_map(Op::Delete),
            (any::<usize>(), cell).prop_map(|(i, c)| Op::Move(i, c)),
        ]
    }

    proptest! {
        #[test]
        fn pool_occupancy_and_ring_partition_the_padded_map(
            seed in any::<u64>(),
            ops in proptest::collection::vec(op(), 0..60),
        ) {
            const W: i32 = 5;
            const H: i32 = 5;
            let mut rng = StdRng::seed_from_u64(seed);
            let mut reg = registry(W, H, &mut rng);
            for op in ops {
                let live: Vec<String> = reg.entities().iter().map(|e| e.id.clone()).collect();
                // Rejections are expected; only the invariant matters.
                let _ = match op {
                    Op::Add(kind, cell) => {
                        let mut spec = EntitySpec::new(kind);
                        spec.location = cell.map(|(x, y)| Cell::ground(x, y));
                        reg.add(spec).map(|_| ())
                    }
                    Op::Delete(i) if !live.is_empty() => reg.delete(&live[i % live.len()]).map(|_| ()),
                    Op::Move(i, (x, y)) if !live.is_empty() => {
                        reg.move_entity(&live[i % live.len()], Cell::ground(x, y))
                    }
                    _ => Ok(()),
                };

                let mut seen = HashSet::new();
                let pool_cells = reg.pool().cells().iter().copied();
                let occupied = reg.entities().iter().filter_map(Entity::occupied_cell);
                for cell in pool_cells.chain(occupied).chain(ring_cells(W, H)) {
                    prop_assert!(seen.insert(cell), "cell {} counted twice", cell);
                }
                prop_assert_eq!(seen.len() as i32, (W + 2) * (H + 2));

                for kind in EntityKind::ALL {
                    prop_assert_eq!(reg.count(kind), reg.entities_of(kind).count());
                }
            }
        }
    }
}
