use std::collections::HashSet;

use rand::rngs::StdRng;

use crate::{
    AssetCatalog, Cell, Entity, EntityKind, EntityRecord, EntityRegistry, EntitySpec, MapConfig,
    MapError, boundary, map::Grid, maze, maze::Maze,
};

/// Scenario logic that decides what a fresh map contains.
///
/// `configure` runs exactly once per [`MapController::reset`], on a map with
/// no entities. It usually calls [`MapState::set_dims`] and then adds
/// entities, leaving any attribute it does not care about unset.
pub trait Scenario {
    fn configure(&mut self, map: &mut MapState) -> Result<(), MapError>;
}

impl<F> Scenario for F
where
    F: FnMut(&mut MapState) -> Result<(), MapError>,
{
    fn configure(&mut self, map: &mut MapState) -> Result<(), MapError> {
        self(map)
    }
}

/// Values pushed by the simulator during a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub agent_utterance: String,
    pub last_action_succeeded: bool,
    pub last_event: String,
    /// How well the agent handles the current map; drives curricula.
    pub usage: f64,
}

/// Lifecycle of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    /// Inside a reset. A controller left here by an error needs another reset.
    Configuring,
    /// Freshly built and not yet pulled by the simulator.
    Instantiated,
    Synchronized,
}

/// Everything a map holds: dimensions, entities, boundary, catalog, session
/// values and the random source.
pub struct MapState {
    config: MapConfig,
    /// `(height, width)` once set.
    dims: Option<(i32, i32)>,
    registry: EntityRegistry,
    boundaries: Vec<Entity>,
    boundary_ids: HashSet<String>,
    catalog: AssetCatalog,
    session: SessionState,
    /// Set by every local change; cleared when the simulator asks.
    dirty: bool,
    rng: StdRng,
}

impl MapState {
    pub fn new(config: MapConfig, catalog: AssetCatalog) -> Self {
        let rng = config.make_rng();
        MapState {
            config,
            dims: None,
            registry: EntityRegistry::new(),
            boundaries: Vec::new(),
            boundary_ids: HashSet::new(),
            catalog,
            session: SessionState::default(),
            dirty: false,
            rng,
        }
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    /// `(max_height, max_width)`.
    pub fn max_dims(&self) -> (i32, i32) {
        (self.config.max_height, self.config.max_width)
    }

    /// `(height, width)`, if set.
    pub fn dims(&self) -> Option<(i32, i32)> {
        self.dims
    }

    fn require_dims(&self) -> Result<(i32, i32), MapError> {
        self.dims.ok_or(MapError::DimensionsUnset)
    }

    /// Sets the playable area to `[0, width) x [0, height)`.
    ///
    /// Rebuilds the boundary ring and the free-cell pool; cells already held
    /// by entities stay taken. Shrinking the map under a stationary entity
    /// fails with [`MapError::OffMap`].
    pub fn set_dims(&mut self, height: i32, width: i32) -> Result<(), MapError> {
        let (max_height, max_width) = self.max_dims();
        if height <= 1 || width <= 1 || height > max_height || width > max_width {
            return Err(MapError::InvalidDimension {
                height,
                width,
                max_height,
                max_width,
            });
        }
        if let Some((id, cell)) = self.registry.stranded_by(width, height) {
            return Err(MapError::OffMap {
                id: id.to_string(),
                cell,
            });
        }
        let boundaries = boundary::generate(width, height, &self.catalog, &mut self.rng)?;
        self.boundary_ids = boundaries.iter().map(|b| b.id.clone()).collect();
        self.boundaries = boundaries;
        self.registry.reset_pool(width, height, &mut self.rng);
        self.dims = Some((height, width));
        self.dirty = true;
        tracing::info!(height, width, "set map dimensions");
        Ok(())
    }

    /// Adds an entity; see [`EntityRegistry::add`].
    pub fn add_entity(&mut self, spec: EntitySpec) -> Result<String, MapError> {
        let id = self.registry.add(spec)?;
        self.dirty = true;
        Ok(id)
    }

    pub fn delete_entity(&mut self, id: &str) -> Result<Entity, MapError> {
        let entity = self.registry.delete(id)?;
        self.dirty = true;
        Ok(entity)
    }

    pub fn move_entity(&mut self, id: &str, location: Cell) -> Result<(), MapError> {
        self.registry.move_entity(id, location)?;
        self.dirty = true;
        Ok(())
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.registry.count(kind)
    }

    pub fn entities(&self) -> &[Entity] {
        self.registry.entities()
    }

    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.registry.entities_of(kind)
    }

    pub fn goals(&self) -> Vec<&Entity> {
        self.entities_of(EntityKind::Goal).collect()
    }

    pub fn blocks(&self) -> Vec<&Entity> {
        self.entities_of(EntityKind::Block).collect()
    }

    /// The first agent with the latest utterance and action outcome.
    pub fn agent(&self) -> Option<(&Entity, &str, bool)> {
        self.entities_of(EntityKind::Agent).next().map(|agent| {
            (
                agent,
                self.session.agent_utterance.as_str(),
                self.session.last_action_succeeded,
            )
        })
    }

    pub fn boundaries(&self) -> &[Entity] {
        &self.boundaries
    }

    pub fn free_cells(&self) -> &[Cell] {
        self.registry.pool().cells()
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    /// Catalog changes (such as goal subtrees) apply from the next reset.
    pub fn catalog_mut(&mut self) -> &mut AssetCatalog {
        &mut self.catalog
    }

    pub fn possible_names(&self, kind: EntityKind) -> Vec<&str> {
        self.catalog.possible_names(kind)
    }

    pub fn all_colors(&self) -> Vec<&str> {
        self.catalog.all_colors()
    }

    /// The map's random source, for scenarios that randomize their layout.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn record_usage(&mut self, usage: f64) {
        self.session.usage = usage;
    }

    /// Returns the recorded usage and zeroes it.
    pub fn take_usage(&mut self) -> f64 {
        std::mem::take(&mut self.session.usage)
    }

    /// Shortest route between two cells avoiding `obstacles`; see
    /// [`maze::shortest_path`].
    pub fn shortest_path(
        &mut self,
        start: Cell,
        end: Cell,
        obstacles: &HashSet<Cell>,
    ) -> Result<Option<Vec<Cell>>, MapError> {
        let (height, width) = self.require_dims()?;
        maze::shortest_path(start, end, width, height, obstacles, &mut self.rng)
    }

    /// Shortest route between two cells around the current blocks.
    pub fn path_between(&mut self, start: Cell, end: Cell) -> Result<Option<Vec<Cell>>, MapError> {
        let obstacles: HashSet<Cell> = self
            .entities_of(EntityKind::Block)
            .filter_map(|block| block.location)
            .collect();
        self.shortest_path(start, end, &obstacles)
    }

    /// One character per cell: `A` agent, `G` goal, `B` block, `.` free.
    pub fn grid_dump(&self) -> Result<Grid<char>, MapError> {
        let (height, width) = self.require_dims()?;
        let mut grid = Grid::filled(width as usize, height as usize, '.');
        for entity in self.entities() {
            let Some(cell) = entity.location else {
                continue;
            };
            if let Some(slot) = grid.get_mut(cell.x, cell.y) {
                *slot = entity.kind.glyph();
            }
        }
        Ok(grid)
    }

    /// Whether the map changed since the last call; clears the flag.
    pub fn consume_dirty_flag(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Every live entity followed by the boundary walls.
    pub fn entity_snapshot(&self) -> Vec<EntityRecord> {
        self.entities()
            .iter()
            .chain(&self.boundaries)
            .map(EntityRecord::from)
            .collect()
    }

    /// Replaces the live entities with the simulator's view of them.
    ///
    /// Boundary records are recognized by id and dropped. Counts and the
    /// free-cell pool are rebuilt from the new occupancy.
    pub fn apply_external_snapshot(&mut self, records: Vec<EntityRecord>) -> Result<(), MapError> {
        let (height, width) = self.require_dims()?;
        let entities = records
            .into_iter()
            .filter(|record| !self.boundary_ids.contains(&record.id))
            .map(Entity::try_from)
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|err| tracing::warn!(%err, "rejected snapshot"))?;
        self.registry
            .replace_all(entities, width, height, &mut self.rng)
            .inspect_err(|err| tracing::warn!(%err, "rejected snapshot"))
    }

    pub fn set_agent_utterance(&mut self, utterance: impl Into<String>) {
        self.session.agent_utterance = utterance.into();
    }

    pub fn set_action_succeeded(&mut self, succeeded: bool) {
        self.session.last_action_succeeded = succeeded;
    }

    pub fn set_game_event(&mut self, event: impl Into<String>) {
        self.session.last_event = event.into();
    }

    /// Drops entities, boundary and session values. The pool is refilled
    /// for the current dimensions, if any.
    fn clear(&mut self) {
        self.registry.clear();
        self.boundaries.clear();
        self.boundary_ids.clear();
        self.session = SessionState::default();
        self.dirty = false;
        if let Some((height, width)) = self.dims {
            self.registry.reset_pool(width, height, &mut self.rng);
        }
    }

    /// Builds the boundary, lays out the maze and completes every entity.
    fn instantiate(&mut self) -> Result<(), MapError> {
        let (height, width) = self.require_dims()?;
        let boundaries = boundary::generate(width, height, &self.catalog, &mut self.rng)?;
        self.boundary_ids = boundaries.iter().map(|b| b.id.clone()).collect();
        self.boundaries = boundaries;
        let maze = Maze::generate(width, height, &mut self.rng)?;
        self.registry
            .instantiate_pending(&maze, &self.catalog, &mut self.rng)
    }
}

/// Drives map sessions: reset, scenario configuration, instantiation, and
/// the lock-step exchange with the simulator.
pub struct MapController<S> {
    scenario: S,
    map: MapState,
    phase: Phase,
}

impl<S: Scenario> MapController<S> {
    pub fn new(config: MapConfig, catalog: AssetCatalog, scenario: S) -> Self {
        MapController {
            scenario,
            map: MapState::new(config, catalog),
            phase: Phase::Uninitialized,
        }
    }

    /// Starts a new session.
    ///
    /// On error the controller stays in [`Phase::Configuring`] with a
    /// partially built map and must be reset again.
    pub fn reset(&mut self) -> Result<(), MapError> {
        self.phase = Phase::Configuring;
        self.map.clear();
        self.scenario.configure(&mut self.map)?;
        self.map.instantiate()?;
        self.map.dirty = true;
        self.phase = Phase::Instantiated;
        tracing::info!(
            entities = self.map.entities().len(),
            boundaries = self.map.boundaries().len(),
            "map reset"
        );
        Ok(())
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn map(&self) -> &MapState {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut MapState {
        &mut self.map
    }

    pub fn scenario(&self) -> &S {
        &self.scenario
    }

    pub fn scenario_mut(&mut self) -> &mut S {
        &mut self.scenario
    }

    /// Whether the map changed since the simulator last asked; clears the
    /// flag.
    pub fn consume_dirty_flag(&mut self) -> bool {
        let dirty = self.map.consume_dirty_flag();
        if self.phase == Phase::Instantiated {
            self.phase = Phase::Synchronized;
        }
        dirty
    }

    pub fn entity_snapshot(&self) -> Vec<EntityRecord> {
        self.map.entity_snapshot()
    }

    pub fn apply_external_snapshot(&mut self, records: Vec<EntityRecord>) -> Result<(), MapError> {
        self.map.apply_external_snapshot(records)?;
        if self.phase == Phase::Instantiated {
            self.phase = Phase::Synchronized;
        }
        Ok(())
    }
}
