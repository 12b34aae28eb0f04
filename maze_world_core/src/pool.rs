use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::{Cell, MapError};

/// The set of ground cells not occupied by a stationary entity.
///
/// Cells are kept in a single permutation that is shuffled when the pool is
/// (re)built; draws take from the end of that permutation, so a sequence of
/// draws walks one shuffled order. Restored cells go to the end and are the
/// next to be drawn.
#[derive(Debug, Clone, Default)]
pub struct GridPool {
    order: Vec<Cell>,
    members: HashSet<Cell>,
}

impl GridPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fills the pool with every ground cell of `[0, width) x [0, height)`.
    pub fn initialize<R: Rng + ?Sized>(&mut self, width: i32, height: i32, rng: &mut R) {
        self.rebuild(width, height, |_| false, rng);
    }

    /// Fills the pool with every ground cell of the rectangle for which
    /// `occupied` returns false.
    pub fn rebuild<R, F>(&mut self, width: i32, height: i32, mut occupied: F, rng: &mut R)
    where
        R: Rng + ?Sized,
        F: FnMut(Cell) -> bool,
    {
        self.order.clear();
        self.members.clear();
        for x in 0..width {
            for y in 0..height {
                let cell = Cell::ground(x, y);
                if !occupied(cell) {
                    self.order.push(cell);
                }
            }
        }
        self.order.shuffle(rng);
        self.members.extend(self.order.iter().copied());
        tracing::debug!(width, height, free = self.order.len(), "rebuilt grid pool");
    }

    /// Removes every cell.
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Removes and returns a random free cell.
    ///
    /// `entity` only names the requester in the error.
    pub fn draw(&mut self, entity: &str) -> Result<Cell, MapError> {
        let cell = self.order.pop().ok_or_else(|| MapError::PoolExhausted {
            entity: entity.to_string(),
        })?;
        self.members.remove(&cell);
        Ok(cell)
    }

    /// Removes a specific cell.
    pub fn remove(&mut self, cell: Cell) -> Result<(), MapError> {
        if !self.members.remove(&cell) {
            return Err(MapError::NotInPool { cell });
        }
        // Keep the remaining permutation intact.
        if let Some(position) = self.order.iter().position(|c| *c == cell) {
            self.order.remove(position);
        }
        Ok(())
    }

    /// Puts a cell back into the pool.
    pub fn restore(&mut self, cell: Cell) -> Result<(), MapError> {
        if !self.members.insert(cell) {
            return Err(MapError::DuplicateRestore { cell });
        }
        self.order.push(cell);
        Ok(())
    }

    pub fn contains(&self, cell: &Cell) -> bool {
        self.members.contains(cell)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Free cells in draw order reversed (the next draw is the last item).
    pub fn cells(&self) -> &[Cell] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn initialize_covers_rectangle() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut pool = GridPool::new();
        pool.initialize(3, 2, &mut rng);
        assert_eq!(pool.len(), 6);
        for x in 0..3 {
            for y in 0..2 {
                assert!(pool.contains(&Cell::ground(x, y)));
            }
        }
        assert!(!pool.contains(&Cell::ground(3, 0)));
    }

    #[test]
    fn draws_exhaust_then_fail() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut pool = GridPool::new();
        pool.initialize(2, 2, &mut rng);
        let mut seen = HashSet::new();
        for _ in 0..4 {
            let cell = pool.draw("goal_0").unwrap();
            assert!(seen.insert(cell));
            assert!(!pool.contains(&cell));
        }
        assert_eq!(
            pool.draw("goal_4"),
            Err(MapError::PoolExhausted {
                entity: "goal_4".into()
            })
        );
    }

    #[test]
    fn remove_and_restore_are_checked() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut pool = GridPool::new();
        pool.initialize(2, 2, &mut rng);
        let cell = Cell::ground(1, 1);

        pool.remove(cell).unwrap();
        assert_eq!(pool.remove(cell), Err(MapError::NotInPool { cell }));

        pool.restore(cell).unwrap();
        assert_eq!(pool.restore(cell), Err(MapError::DuplicateRestore { cell }));
        // restored cells are drawn next
        assert_eq!(pool.draw("block_0"), Ok(cell));
    }

    #[test]
    fn rebuild_skips_occupied() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut pool = GridPool::new();
        let taken = Cell::ground(0, 0);
        pool.rebuild(2, 2, |c| c == taken, &mut rng);
        assert_eq!(pool.len(), 3);
        assert!(!pool.contains(&taken));
    }
}
