use std::fmt;
use std::str::FromStr;

use rand::Rng;
use thiserror::Error;

use crate::snake::Snake;

/// Largest board a level may describe.
const MAX_LEVEL_CELLS: usize = 1 << 20;

/// A cell coordinate, `x` being the column and `y` the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    None,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
            Direction::None => Direction::None,
        }
    }

    pub fn is_opposite(self, other: Direction) -> bool {
        self != Direction::None && self.opposite() == other
    }
}

/// Width and height of a grid; positions wrap around both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: usize,
    pub height: usize,
}

impl Dimensions {
    /// Neighbor of `pos` in `direction` on the torus.
    ///
    /// Decrements add `dimension - 1` before taking the modulo so that a
    /// coordinate of zero never underflows.
    pub fn step(&self, pos: Position, direction: Direction) -> Position {
        let (w, h) = (self.width, self.height);
        match direction {
            Direction::Up => Position::new(pos.x, (pos.y + h - 1) % h),
            Direction::Down => Position::new(pos.x, (pos.y + 1) % h),
            Direction::Left => Position::new((pos.x + w - 1) % w, pos.y),
            Direction::Right => Position::new((pos.x + 1) % w, pos.y),
            Direction::None => pos,
        }
    }

    /// Shortest number of unit moves between two positions on the torus.
    #[cfg(test)]
    pub(crate) fn wrapped_distance(&self, a: Position, b: Position) -> usize {
        let dx = if a.x > b.x { a.x - b.x } else { b.x - a.x };
        let dy = if a.y > b.y { a.y - b.y } else { b.y - a.y };
        dx.min(self.width - dx) + dy.min(self.height - dy)
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Free,
    Wall,
    /// Blocks movement but is drawn as empty space.
    InvisibleWall,
    Spawn,
    Food,
}

impl Cell {
    fn from_char(ch: char) -> Cell {
        match ch {
            '#' => Cell::Wall,
            '.' => Cell::InvisibleWall,
            '&' => Cell::Spawn,
            _ => Cell::Free,
        }
    }

    pub fn blocks_movement(self) -> bool {
        matches!(self, Cell::Wall | Cell::InvisibleWall)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("level is empty")]
    Empty,
    #[error("malformed level header {0:?}, expected \"<height> <width>\"")]
    MalformedHeader(String),
    #[error("level dimensions must be positive, got {height}x{width}")]
    ZeroSized { height: usize, width: usize },
    #[error("level of {height}x{width} exceeds the {max} cell limit")]
    TooLarge { height: usize, width: usize, max: usize },
    #[error("level has no spawn cell ('&')")]
    MissingSpawn,
    #[error("level has a second spawn cell at {0}")]
    DuplicateSpawn(Position),
    #[error("no free cell left to place food")]
    NoFreeCells,
}

#[derive(Debug, Clone)]
pub struct Grid {
    dims: Dimensions,
    cells: Vec<Cell>,
    spawn: Position,
    food: Option<Position>,
    free_cells: Vec<Position>,
}

impl FromStr for Grid {
    type Err = GridError;

    /// Parses a level: a `"<height> <width>"` header line followed by
    /// `height` rows of `width` characters.
    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut lines = text.lines();
        let header = lines.next().ok_or(GridError::Empty)?;
        let (height, width) = parse_header(header)?;
        let dims = Dimensions { width, height };

        let mut cells = vec![Cell::Free; dims.area()];
        let mut spawn = None;

        for (y, row) in lines.take(height).enumerate() {
            for (x, ch) in row.chars().take(width).enumerate() {
                let cell = Cell::from_char(ch);
                if cell == Cell::Spawn {
                    let pos = Position::new(x, y);
                    if spawn.is_some() {
                        return Err(GridError::DuplicateSpawn(pos));
                    }
                    spawn = Some(pos);
                }
                cells[y * width + x] = cell;
            }
        }

        let spawn = spawn.ok_or(GridError::MissingSpawn)?;
        let free_cells = (0..height)
            .flat_map(|y| (0..width).map(move |x| Position::new(x, y)))
            .filter(|pos| cells[pos.y * width + pos.x] == Cell::Free)
            .collect();

        Ok(Grid { dims, cells, spawn, food: None, free_cells })
    }
}

fn parse_header(line: &str) -> Result<(usize, usize), GridError> {
    let malformed = || GridError::MalformedHeader(line.to_string());
    let mut fields = line.split_whitespace().map(str::parse::<usize>);

    let height = fields.next().and_then(Result::ok).ok_or_else(malformed)?;
    let width = fields.next().and_then(Result::ok).ok_or_else(malformed)?;

    if height == 0 || width == 0 {
        return Err(GridError::ZeroSized { height, width });
    }
    match height.checked_mul(width) {
        Some(area) if area <= MAX_LEVEL_CELLS => Ok((height, width)),
        _ => Err(GridError::TooLarge { height, width, max: MAX_LEVEL_CELLS }),
    }
}

impl Grid {
    pub fn dimensions(&self) -> Dimensions {
        self.dims
    }

    pub fn width(&self) -> usize {
        self.dims.width
    }

    pub fn height(&self) -> usize {
        self.dims.height
    }

    pub fn spawn(&self) -> Position {
        self.spawn
    }

    pub fn food(&self) -> Option<Position> {
        self.food
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x < self.dims.width && pos.y < self.dims.height
    }

    /// Out-of-bounds positions read as walls.
    pub fn cell(&self, pos: Position) -> Cell {
        if self.in_bounds(pos) {
            self.cells[self.index(pos)]
        } else {
            Cell::Wall
        }
    }

    pub fn index(&self, pos: Position) -> usize {
        pos.y * self.dims.width + pos.x
    }

    pub fn step(&self, pos: Position, direction: Direction) -> Position {
        self.dims.step(pos, direction)
    }

    /// Whether the cell reached from `pos` by moving `direction` can't be
    /// entered. `Direction::None` tests `pos` itself.
    pub fn is_blocked(&self, pos: Position, direction: Direction) -> bool {
        self.cell(self.step(pos, direction)).blocks_movement()
    }

    pub fn found_food(&self, pos: Position) -> bool {
        self.food == Some(pos)
    }

    /// Moves the food to a random free cell, preferring cells for which
    /// `occupied` is false. The previous food cell becomes free again.
    pub fn respawn_food<R, F>(&mut self, rng: &mut R, occupied: F) -> Result<Position, GridError>
    where
        R: Rng,
        F: Fn(Position) -> bool,
    {
        if self.free_cells.is_empty() {
            return Err(GridError::NoFreeCells);
        }

        let open: Vec<usize> = (0..self.free_cells.len())
            .filter(|&i| !occupied(self.free_cells[i]))
            .collect();
        let chosen = if open.is_empty() {
            rng.gen_range(0..self.free_cells.len())
        } else {
            open[rng.gen_range(0..open.len())]
        };

        let new_food = self.free_cells.swap_remove(chosen);
        if let Some(old_food) = self.food.take() {
            let idx = self.index(old_food);
            self.cells[idx] = Cell::Free;
            self.free_cells.push(old_food);
        }

        let idx = self.index(new_food);
        self.cells[idx] = Cell::Food;
        self.food = Some(new_food);
        Ok(new_food)
    }

    /// Read-only picture of the grid for the presentation layer. Pass
    /// `None` to show the bare level with its spawn point.
    pub fn snapshot(&self, snake: Option<&Snake>) -> GridView {
        let mut tiles: Vec<Tile> = self
            .cells
            .iter()
            .map(|&cell| Tile { cell, occupant: Occupant::Empty })
            .collect();
        let mut heading = Direction::None;

        if let Some(snake) = snake {
            heading = snake.direction();
            for (i, pos) in snake.body().iter().enumerate().rev() {
                let occupant = if i == 0 { Occupant::Head } else { Occupant::Body };
                tiles[self.index(*pos)].occupant = occupant;
            }
        }

        GridView { width: self.dims.width, height: self.dims.height, tiles, heading }
    }

    #[cfg(test)]
    pub(crate) fn place_food(&mut self, pos: Position) {
        if let Some(i) = self.free_cells.iter().position(|&p| p == pos) {
            self.free_cells.swap_remove(i);
        }
        if let Some(old_food) = self.food.take() {
            let idx = self.index(old_food);
            self.cells[idx] = Cell::Free;
            self.free_cells.push(old_food);
        }
        let idx = self.index(pos);
        self.cells[idx] = Cell::Food;
        self.food = Some(pos);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    Empty,
    Head,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub cell: Cell,
    pub occupant: Occupant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridView {
    pub width: usize,
    pub height: usize,
    pub tiles: Vec<Tile>,
    pub heading: Direction,
}

impl GridView {
    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> {
        self.tiles.chunks(self.width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Direction::{Down, Left, Right, Up};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const BOXED: &str = "4 5\n#####\n#& .#\n#   #\n#####\n";

    #[test]
    fn test_parse_level() {
        let grid: Grid = BOXED.parse().unwrap();

        assert_eq!(grid.height(), 4);
        assert_eq!(grid.width(), 5);
        assert_eq!(grid.spawn(), Position::new(1, 1));
        assert_eq!(grid.cell(Position::new(0, 0)), Cell::Wall);
        assert_eq!(grid.cell(Position::new(3, 1)), Cell::InvisibleWall);
        assert_eq!(grid.cell(Position::new(2, 2)), Cell::Free);
        assert_eq!(grid.food(), None);
    }

    #[test]
    fn test_free_cells_are_exactly_the_free_cells() {
        let grid: Grid = BOXED.parse().unwrap();
        let mut free = grid.free_cells.to_vec();
        free.sort_by_key(|p| (p.y, p.x));

        assert_eq!(
            free,
            vec![
                Position::new(2, 1),
                Position::new(1, 2),
                Position::new(2, 2),
                Position::new(3, 2),
            ]
        );
    }

    #[test]
    fn test_short_rows_are_padded_with_free_cells() {
        let grid: Grid = "2 4\n&\n##\r\n".parse().unwrap();

        assert_eq!(grid.cell(Position::new(3, 0)), Cell::Free);
        assert_eq!(grid.cell(Position::new(1, 1)), Cell::Wall);
        assert_eq!(grid.cell(Position::new(2, 1)), Cell::Free);
        assert_eq!(grid.free_cells.len(), 5);
    }

    #[test]
    fn test_malformed_levels() {
        assert_eq!("".parse::<Grid>().unwrap_err(), GridError::Empty);
        assert_eq!(
            "five by five\n&".parse::<Grid>().unwrap_err(),
            GridError::MalformedHeader("five by five".to_string())
        );
        assert_eq!(
            "3\n&".parse::<Grid>().unwrap_err(),
            GridError::MalformedHeader("3".to_string())
        );
        assert_eq!(
            "0 3\n".parse::<Grid>().unwrap_err(),
            GridError::ZeroSized { height: 0, width: 3 }
        );
        assert_eq!("1 3\n   ".parse::<Grid>().unwrap_err(), GridError::MissingSpawn);
        assert_eq!(
            "1 3\n& &".parse::<Grid>().unwrap_err(),
            GridError::DuplicateSpawn(Position::new(2, 0))
        );
    }

    #[test]
    fn test_oversized_levels_are_rejected() {
        let huge = format!("{} 2\n&", usize::MAX);
        assert_eq!(
            huge.parse::<Grid>().unwrap_err(),
            GridError::TooLarge { height: usize::MAX, width: 2, max: MAX_LEVEL_CELLS }
        );

        assert!(matches!(
            "1025 1025\n&".parse::<Grid>().unwrap_err(),
            GridError::TooLarge { .. }
        ));
        assert!("1024 1024\n&".parse::<Grid>().is_ok());
    }

    #[test]
    fn test_wrap_around_steps() {
        let dims = Dimensions { width: 5, height: 3 };
        let origin = Position::new(0, 0);

        assert_eq!(dims.step(origin, Left), Position::new(4, 0));
        assert_eq!(dims.step(origin, Up), Position::new(0, 2));
        assert_eq!(dims.step(Position::new(4, 2), Right), Position::new(0, 2));
        assert_eq!(dims.step(Position::new(4, 2), Down), Position::new(4, 0));
        assert_eq!(dims.step(Position::new(2, 1), Direction::None), Position::new(2, 1));
    }

    #[test]
    fn test_wrapped_distance() {
        let dims = Dimensions { width: 5, height: 5 };

        assert_eq!(dims.wrapped_distance(Position::new(0, 0), Position::new(4, 4)), 2);
        assert_eq!(dims.wrapped_distance(Position::new(0, 0), Position::new(2, 2)), 4);
        assert_eq!(dims.wrapped_distance(Position::new(1, 3), Position::new(1, 3)), 0);
    }

    #[test]
    fn test_is_blocked() {
        let grid: Grid = BOXED.parse().unwrap();
        let spawn = grid.spawn();

        assert!(grid.is_blocked(spawn, Left));
        assert!(grid.is_blocked(spawn, Up));
        assert!(!grid.is_blocked(spawn, Right));
        assert!(!grid.is_blocked(spawn, Down));
        assert!(grid.is_blocked(Position::new(2, 1), Right)); // invisible wall
        assert!(!grid.is_blocked(spawn, Direction::None));
    }

    #[test]
    fn test_out_of_bounds_reads_as_wall() {
        let grid: Grid = BOXED.parse().unwrap();

        assert!(!grid.in_bounds(Position::new(5, 0)));
        assert!(!grid.in_bounds(Position::new(0, 4)));
        assert_eq!(grid.cell(Position::new(9, 9)), Cell::Wall);
    }

    #[test]
    fn test_respawn_food_moves_food_between_free_cells() {
        let mut grid: Grid = BOXED.parse().unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let total = grid.free_cells.len();

        let first = grid.respawn_food(&mut rng, |_| false).unwrap();
        assert!(grid.found_food(first));
        assert_eq!(grid.cell(first), Cell::Food);
        assert!(!grid.free_cells.contains(&first));
        assert_eq!(grid.free_cells.len(), total - 1);

        for _ in 0..20 {
            let previous = grid.food().unwrap();
            let next = grid.respawn_food(&mut rng, |_| false).unwrap();

            assert_ne!(next, previous);
            assert!(grid.free_cells.contains(&previous));
            assert!(!grid.free_cells.contains(&next));
            assert_eq!(grid.cell(previous), Cell::Free);
            assert_eq!(grid.free_cells.len(), total - 1);
        }
    }

    #[test]
    fn test_respawn_food_avoids_occupied_cells() {
        let mut grid: Grid = BOXED.parse().unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let first = Position::new(3, 2);
        let second = Position::new(1, 2);

        assert_eq!(grid.respawn_food(&mut rng, |p| p != first).unwrap(), first);
        assert_eq!(grid.respawn_food(&mut rng, |p| p != second).unwrap(), second);

        // Everything occupied: any free cell will do.
        let food = grid.respawn_food(&mut rng, |_| true).unwrap();
        assert_ne!(food, second);
        assert_eq!(grid.cell(food), Cell::Food);
    }

    #[test]
    fn test_respawn_food_without_free_cells() {
        let mut grid: Grid = "1 3\n#&#".parse().unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(grid.respawn_food(&mut rng, |_| false), Err(GridError::NoFreeCells));
    }

    #[test]
    fn test_snapshot_marks_head_and_body() {
        let grid: Grid = BOXED.parse().unwrap();
        let mut snake = Snake::new(Position::new(1, 2));
        snake.advance(Right, grid.dimensions(), true);

        let view = grid.snapshot(Some(&snake));
        let at = |x: usize, y: usize| view.tiles[y * view.width + x];

        assert_eq!(at(2, 2).occupant, Occupant::Head);
        assert_eq!(at(1, 2).occupant, Occupant::Body);
        assert_eq!(at(1, 1).occupant, Occupant::Empty);
        assert_eq!(at(1, 1).cell, Cell::Spawn);
        assert_eq!(view.heading, Right);
        assert_eq!(view.rows().count(), 4);

        let bare = grid.snapshot(None);
        assert!(bare.tiles.iter().all(|t| t.occupant == Occupant::Empty));
    }
}
