use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// A generic 2D grid structure.
///
/// Stores elements of type `T` in a flat vector using row-major order, so
/// row `y` occupies `cells[y * width..(y + 1) * width]`. Used for the
/// ephemeral maze layout and for the debug dump of a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> Grid<T> {
    /// Creates a grid filled with clones of `value`.
    ///
    /// # Arguments
    ///
    /// * `width`: The width of the grid.
    /// * `height`: The height of the grid.
    /// * `value`: The initial value of every cell.
    pub fn filled(width: usize, height: usize, value: T) -> Self
    where
        T: Clone,
    {
        Grid {
            width,
            height,
            cells: vec![value; width * height],
        }
    }

    /// Creates a grid whose cells are produced by `f(x, y)`, row by row.
    ///
    /// # Arguments
    ///
    /// * `width`: The width of the grid.
    /// * `height`: The height of the grid.
    /// * `f`: A function `FnMut(usize, usize) -> T` called once per cell.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut cells = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                cells.push(f(x, y));
            }
        }
        Grid {
            width,
            height,
            cells,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn coords_to_index(&self, x: usize, y: usize) -> Option<usize> {
        self.is_valid(x, y).then_some(y * self.width + x)
    }

    /// Checks if the given coordinates are within the grid boundaries.
    #[inline]
    pub fn is_valid(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Signed lookup; negative or out-of-range coordinates yield `None`.
    pub fn get(&self, x: i32, y: i32) -> Option<&T> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        self.coords_to_index(x, y).map(|index| &self.cells[index])
    }

    /// Signed mutable lookup; negative or out-of-range coordinates yield `None`.
    pub fn get_mut(&mut self, x: i32, y: i32) -> Option<&mut T> {
        let x = usize::try_from(x).ok()?;
        let y = usize::try_from(y).ok()?;
        self.coords_to_index(x, y).map(|index| &mut self.cells[index])
    }

    /// Returns an iterator that yields `((x, y), &T)` for each cell in
    /// row-major order.
    pub fn enumerate(&self) -> impl Iterator<Item = ((usize, usize), &T)> {
        let width = self.width;
        self.cells
            .iter()
            .enumerate()
            .map(move |(index, cell)| ((index % width, index / width), cell))
    }

    /// Iterates over the rows of the grid, top (`y = 0`) first.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks() rejects a zero chunk size
        self.cells.chunks(self.width.max(1))
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    /// Accesses the cell at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds. Use [`Grid::get`] for a
    /// checked lookup.
    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        match self.coords_to_index(x, y) {
            Some(idx) => &self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                x, y, self.width, self.height
            ),
        }
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    /// Mutably accesses the cell at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds. Use [`Grid::get_mut`]
    /// for a checked lookup.
    #[inline]
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        match self.coords_to_index(x, y) {
            Some(idx) => &mut self.cells[idx],
            None => panic!(
                "Grid index ({}, {}) out of bounds for grid size ({}, {})",
                x, y, self.width, self.height
            ),
        }
    }
}

/// Prints one row per line.
impl fmt::Display for Grid<char> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.rows() {
            let line: String = row.iter().collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fn_is_row_major() {
        let grid = Grid::from_fn(3, 2, |x, y| x + 10 * y);
        assert_eq!(grid[(2, 0)], 2);
        assert_eq!(grid[(0, 1)], 10);
        let coords: Vec<_> = grid.enumerate().map(|(xy, _)| xy).collect();
        assert_eq!(coords[3], (0, 1));
    }

    #[test]
    fn signed_lookup_rejects_negative() {
        let grid = Grid::filled(2, 2, 'x');
        assert_eq!(grid.get(-1, 0), None);
        assert_eq!(grid.get(1, 2), None);
        assert_eq!(grid.get(1, 1), Some(&'x'));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn index_panics_outside_grid() {
        let grid = Grid::filled(2, 2, 0u8);
        let _ = grid[(2, 0)];
    }

    #[test]
    fn display_prints_rows() {
        let mut grid = Grid::filled(3, 2, '.');
        grid[(1, 1)] = 'A';
        assert_eq!(grid.to_string(), "...\n.A.\n");
    }
}
