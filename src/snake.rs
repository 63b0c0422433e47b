use std::collections::VecDeque;

use crate::grid::{Dimensions, Direction, Position};

const HEAD_UP: char = '^';
const HEAD_DOWN: char = 'v';
const HEAD_LEFT: char = '<';
const HEAD_RIGHT: char = '>';
const HEAD_IDLE: char = '@';

/// The snake's body, head first, plus the direction it last moved in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snake {
    body: VecDeque<Position>,
    direction: Direction,
}

impl Snake {
    pub fn new(head: Position) -> Self {
        let mut snake = Snake { body: VecDeque::new(), direction: Direction::None };
        snake.reset(head, Direction::None);
        snake
    }

    pub fn reset(&mut self, head: Position, direction: Direction) {
        self.body.clear();
        self.body.push_back(head);
        self.direction = direction;
    }

    /// Appends a cell behind the tail. Used to lay out the starting body.
    pub fn extend_tail(&mut self, pos: Position) {
        self.body.push_back(pos);
    }

    pub fn body(&self) -> &VecDeque<Position> {
        &self.body
    }

    pub fn head(&self) -> Position {
        self.body[0]
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Moves the head one cell. The tail follows unless `grow` is set, in
    /// which case the body gets one cell longer. Returns the new head.
    pub fn advance(&mut self, direction: Direction, dims: Dimensions, grow: bool) -> Position {
        let new_head = dims.step(self.head(), direction);
        self.body.push_front(new_head);

        if !grow {
            self.body.pop_back();
        }
        if direction != Direction::None {
            self.direction = direction;
        }

        new_head
    }

    /// Whether `pos` is part of the body behind the head.
    pub fn occupies(&self, pos: Position) -> bool {
        self.body.iter().skip(1).any(|&p| p == pos)
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.body.contains(&pos)
    }

    /// Whether `pos` would still be covered by the body after one more move
    /// that doesn't eat: every cell except the tail, which moves away.
    pub fn occupied_after_move(&self, pos: Position) -> bool {
        let keep = self.body.len() - 1;
        self.body.iter().take(keep).any(|&p| p == pos)
    }

    #[cfg(test)]
    pub(crate) fn from_cells(cells: &[(usize, usize)], direction: Direction) -> Snake {
        Snake {
            body: cells.iter().map(|&(x, y)| Position::new(x, y)).collect(),
            direction,
        }
    }
}

/// Character for a head moving in `direction`.
pub fn head_glyph(direction: Direction) -> char {
    match direction {
        Direction::Up => HEAD_UP,
        Direction::Down => HEAD_DOWN,
        Direction::Left => HEAD_LEFT,
        Direction::Right => HEAD_RIGHT,
        Direction::None => HEAD_IDLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: Dimensions = Dimensions { width: 10, height: 10 };

    #[test]
    fn test_advance_keeps_length() {
        let mut snake = Snake::from_cells(&[(5, 5), (4, 5), (3, 5)], Direction::Right);

        let head = snake.advance(Direction::Down, DIMS, false);

        assert_eq!(head, Position::new(5, 6));
        assert_eq!(snake.len(), 3);
        assert_eq!(snake.head(), head);
        assert_eq!(snake.direction(), Direction::Down);
        assert!(!snake.contains(Position::new(3, 5)));
    }

    #[test]
    fn test_advance_grows_by_one_on_eat() {
        let mut snake = Snake::from_cells(&[(5, 5), (4, 5)], Direction::Right);

        snake.advance(Direction::Right, DIMS, true);

        assert_eq!(snake.len(), 3);
        assert_eq!(
            snake.body().iter().copied().collect::<Vec<_>>(),
            vec![Position::new(6, 5), Position::new(5, 5), Position::new(4, 5)]
        );
    }

    #[test]
    fn test_advance_wraps_around() {
        let mut snake = Snake::new(Position::new(0, 0));

        assert_eq!(snake.advance(Direction::Left, DIMS, false), Position::new(9, 0));
        assert_eq!(snake.advance(Direction::Up, DIMS, false), Position::new(9, 9));
    }

    #[test]
    fn test_occupies_excludes_head() {
        let snake = Snake::from_cells(&[(5, 5), (4, 5), (3, 5)], Direction::Right);

        assert!(!snake.occupies(Position::new(5, 5)));
        assert!(snake.occupies(Position::new(4, 5)));
        assert!(snake.occupies(Position::new(3, 5)));
        assert!(!snake.occupies(Position::new(6, 5)));
    }

    #[test]
    fn test_occupied_after_move_excludes_tail() {
        let snake = Snake::from_cells(&[(5, 5), (4, 5), (3, 5)], Direction::Right);

        assert!(snake.occupied_after_move(Position::new(5, 5)));
        assert!(snake.occupied_after_move(Position::new(4, 5)));
        assert!(!snake.occupied_after_move(Position::new(3, 5)));
    }

    #[test]
    fn test_self_collision_after_turning_into_body() {
        let mut snake = Snake::from_cells(&[(5, 5), (4, 5), (3, 5), (2, 5), (1, 5)], Direction::Right);

        snake.advance(Direction::Down, DIMS, false);
        snake.advance(Direction::Left, DIMS, false);
        let head = snake.advance(Direction::Up, DIMS, false);

        assert_eq!(head, Position::new(4, 5));
        assert!(snake.occupies(head));
    }

    #[test]
    fn test_reset() {
        let mut snake = Snake::from_cells(&[(5, 5), (4, 5), (3, 5)], Direction::Right);

        snake.reset(Position::new(1, 1), Direction::None);

        assert_eq!(snake.len(), 1);
        assert_eq!(snake.head(), Position::new(1, 1));
        assert_eq!(snake.direction(), Direction::None);
        assert_eq!(head_glyph(snake.direction()), HEAD_IDLE);
    }
}
