//! Spanning-tree maze layout and grid shortest paths.
//!
//! Neither function knows about entities; both work on plain cells so the
//! registry can ask for wall cells and scenarios can ask for routes.

use std::collections::{HashMap, HashSet, VecDeque};

use rand::Rng;
use rand::seq::SliceRandom;

use crate::{Cell, MapError, map::Grid};

/// Four-connected moves; shuffled before each expansion.
const MOVES: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, 1), (0, -1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MazeCell {
    Open,
    Wall,
}

/// A square, loop-free maze.
///
/// Rooms sit at even `(x, y)`; a corridor opens the cell between two rooms
/// joined by a spanning-tree edge. Every open cell is reachable from `(0, 0)`
/// and any two rooms are joined by exactly one route.
#[derive(Debug, Clone)]
pub struct Maze {
    grid: Grid<MazeCell>,
}

/// One pending room on the depth-first walk.
struct Frame {
    room: (usize, usize),
    moves: [(i32, i32); 4],
    next: usize,
}

impl Frame {
    fn new<R: Rng + ?Sized>(room: (usize, usize), rng: &mut R) -> Self {
        let mut moves = MOVES;
        moves.shuffle(rng);
        Frame {
            room,
            moves,
            next: 0,
        }
    }

    fn next_move(&mut self) -> Option<(i32, i32)> {
        let step = self.moves.get(self.next).copied();
        self.next += 1;
        step
    }
}

impl Maze {
    /// Lays out a maze over a `width x height` map.
    ///
    /// Only square maps with a side of at least 2 are supported. Even sides are generated on the odd
    /// `side - 1` grid and then padded with one extra column and row whose
    /// cells alternate open/wall starting with open.
    pub fn generate<R: Rng + ?Sized>(
        width: i32,
        height: i32,
        rng: &mut R,
    ) -> Result<Maze, MapError> {
        let side = match usize::try_from(width) {
            Ok(side) if width == height && side >= 2 => side,
            _ => return Err(MapError::UnsupportedShape { width, height }),
        };
        let pad = side % 2 == 0;
        let trimmed = if pad { side - 1 } else { side };
        let rooms = trimmed.div_ceil(2);

        let mut grid = Grid::from_fn(trimmed, trimmed, |x, y| {
            if x % 2 == 0 && y % 2 == 0 {
                MazeCell::Open
            } else {
                MazeCell::Wall
            }
        });

        let mut visited = Grid::filled(rooms, rooms, false);
        visited[(0, 0)] = true;
        let mut stack = vec![Frame::new((0, 0), rng)];
        let mut edges = 0usize;

        while let Some(frame) = stack.last_mut() {
            let Some((dx, dy)) = frame.next_move() else {
                stack.pop();
                continue;
            };
            let (x, y) = frame.room;
            let (Some(nx), Some(ny)) = (
                x.checked_add_signed(dx as isize),
                y.checked_add_signed(dy as isize),
            ) else {
                continue;
            };
            if nx >= rooms || ny >= rooms || visited[(nx, ny)] {
                continue;
            }
            visited[(nx, ny)] = true;
            // Room (x, y) sits at maze cell (2x, 2y); the corridor is the midpoint.
            grid[(x + nx, y + ny)] = MazeCell::Open;
            edges += 1;
            stack.push(Frame::new((nx, ny), rng));
        }
        tracing::debug!(side, rooms = rooms * rooms, edges, pad, "generated maze");

        if pad {
            grid = Grid::from_fn(side, side, |x, y| {
                if x == trimmed {
                    alternate(y)
                } else if y == trimmed {
                    alternate(x)
                } else {
                    grid[(x, y)]
                }
            });
        }
        Ok(Maze { grid })
    }

    pub fn side(&self) -> usize {
        self.grid.width()
    }

    pub fn grid(&self) -> &Grid<MazeCell> {
        &self.grid
    }

    pub fn is_open(&self, x: i32, y: i32) -> bool {
        matches!(self.grid.get(x, y), Some(MazeCell::Open))
    }

    /// Ground cells marked as wall, in row-major order.
    pub fn wall_cells(&self) -> Vec<Cell> {
        self.grid
            .enumerate()
            .filter(|(_, cell)| **cell == MazeCell::Wall)
            .map(|((x, y), _)| Cell::ground(x as i32, y as i32))
            .collect()
    }
}

fn alternate(i: usize) -> MazeCell {
    if i % 2 == 0 {
        MazeCell::Open
    } else {
        MazeCell::Wall
    }
}

/// Breadth-first shortest path from `start` to `end` inside
/// `[0, width) x [0, height)`, avoiding `obstacles`.
///
/// The returned cells run from the step after `start` up to the step before
/// `end`; they are empty when the two are adjacent. `Ok(None)` means `end` is
/// unreachable. Neighbor order is shuffled at each expansion, which only
/// affects the choice among equally short routes.
pub fn shortest_path<R: Rng + ?Sized>(
    start: Cell,
    end: Cell,
    width: i32,
    height: i32,
    obstacles: &HashSet<Cell>,
    rng: &mut R,
) -> Result<Option<Vec<Cell>>, MapError> {
    if start == end {
        return Err(MapError::TrivialPath { cell: start });
    }

    let mut frontier = VecDeque::from([start]);
    let mut came_from: HashMap<Cell, Option<Cell>> = HashMap::from([(start, None)]);
    let mut goal_reached = false;

    while let Some(current) = frontier.pop_front() {
        if current == end {
            goal_reached = true;
            break;
        }
        let mut moves = MOVES;
        moves.shuffle(rng);
        for (dx, dy) in moves {
            let next = current.offset(dx, dy);
            if !(0..width).contains(&next.x) || !(0..height).contains(&next.y) {
                continue;
            }
            if came_from.contains_key(&next) || obstacles.contains(&next) {
                continue;
            }
            came_from.insert(next, Some(current));
            frontier.push_back(next);
        }
    }

    if !goal_reached {
        return Ok(None);
    }

    let mut path = Vec::new();
    let mut current = came_from.get(&end).copied().flatten();
    while let Some(cell) = current {
        if cell == start {
            break;
        }
        path.push(cell);
        current = came_from.get(&cell).copied().flatten();
    }
    path.reverse();
    Ok(Some(path))
}
