use std::collections::VecDeque;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::grid::{Direction, Grid, Position};
use crate::snake::Snake;

/// How the bot picks its moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Shortest path to the food, greedy step when there is none.
    Smart,
    /// Greedy step every time.
    Dumb,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Smart => write!(f, "smart"),
            AgentKind::Dumb => write!(f, "dumb"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("snake at {head} has nowhere to move")]
    NowhereToMove { head: Position },
}

/// Breadth-first search from the snake's head to the food.
///
/// The body is simulated along every explored path: after `d` moves it is
/// made of the last `d` heads followed by the front of the real body, kept
/// at the real length, so cells the tail has already left count as free.
/// Returns `None` when the food can't be reached.
pub fn shortest_path(grid: &Grid, snake: &Snake) -> Option<VecDeque<Direction>> {
    let food = grid.food()?;
    let start = snake.head();

    let mut came_from: Vec<Option<(Position, Direction)>> = vec![None; grid.dimensions().area()];
    let mut visited = vec![false; grid.dimensions().area()];
    let mut frontier = VecDeque::new();

    visited[grid.index(start)] = true;
    frontier.push_back((start, 0usize));

    while let Some((pos, depth)) = frontier.pop_front() {
        if pos == food {
            return Some(reconstruct_path(grid, &came_from, start, pos));
        }

        for &dir in Direction::ALL.iter() {
            let next = grid.step(pos, dir);
            let idx = grid.index(next);

            if visited[idx] || grid.cell(next).blocks_movement() {
                continue;
            }
            if hits_simulated_body(grid, snake, &came_from, pos, depth, next) {
                continue;
            }

            visited[idx] = true;
            came_from[idx] = Some((pos, dir));
            frontier.push_back((next, depth + 1));
        }
    }

    None
}

/// Whether moving from `pos` (reached after `depth` moves) to `next` would
/// put the head on the simulated body. After the move the body behind the
/// head is `snake.len() - 1` cells long: the path back to the start,
/// then the real body from its head.
fn hits_simulated_body(
    grid: &Grid,
    snake: &Snake,
    came_from: &[Option<(Position, Direction)>],
    pos: Position,
    depth: usize,
    next: Position,
) -> bool {
    let mut remaining = snake.len() - 1;
    let mut cursor = pos;
    let mut depth = depth;

    while depth > 0 && remaining > 0 {
        if cursor == next {
            return true;
        }
        remaining -= 1;
        depth -= 1;
        match came_from[grid.index(cursor)] {
            Some((parent, _)) => cursor = parent,
            None => break,
        }
    }

    snake.body().iter().take(remaining).any(|&p| p == next)
}

fn reconstruct_path(
    grid: &Grid,
    came_from: &[Option<(Position, Direction)>],
    start: Position,
    end: Position,
) -> VecDeque<Direction> {
    let mut path = VecDeque::new();
    let mut current = end;

    while current != start {
        match came_from[grid.index(current)] {
            Some((parent, dir)) => {
                path.push_front(dir);
                current = parent;
            }
            None => break,
        }
    }

    path
}

/// Picks a single safe move: straight onto the food if it is next to the
/// head, otherwise a random safe direction that doesn't turn back.
pub fn greedy_step<R>(grid: &Grid, snake: &Snake, rng: &mut R) -> Result<Direction, PathError>
where
    R: Rng,
{
    let head = snake.head();
    let heading = snake.direction();

    let safe: Vec<Direction> = Direction::ALL
        .iter()
        .copied()
        .filter(|&dir| !grid.is_blocked(head, dir))
        .filter(|&dir| !snake.occupied_after_move(grid.step(head, dir)))
        .collect();
    let forward: Vec<Direction> = safe.iter().copied().filter(|&dir| !dir.is_opposite(heading)).collect();

    if let Some(&dir) = forward.iter().find(|&&dir| grid.found_food(grid.step(head, dir))) {
        return Ok(dir);
    }

    // Turning back only works for a snake of at most two cells, whose neck
    // is the tail that moves away this tick.
    let choices = if forward.is_empty() { &safe } else { &forward };
    choices.choose(rng).copied().ok_or(PathError::NowhereToMove { head })
}

/// Queue of upcoming bot moves, refilled from the pathfinder when empty.
#[derive(Debug, Clone)]
pub struct Autopilot {
    kind: AgentKind,
    plan: VecDeque<Direction>,
}

impl Autopilot {
    pub fn new(kind: AgentKind) -> Self {
        Self { kind, plan: VecDeque::new() }
    }

    /// Drops the remaining moves; the next call replans from scratch.
    pub fn clear(&mut self) {
        self.plan.clear();
    }

    pub fn replan<R>(&mut self, grid: &Grid, snake: &Snake, rng: &mut R) -> Result<(), PathError>
    where
        R: Rng,
    {
        let route = match self.kind {
            AgentKind::Smart => shortest_path(grid, snake).filter(|path| !path.is_empty()),
            AgentKind::Dumb => None,
        };

        self.plan = match route {
            Some(path) => path,
            None => {
                if self.kind == AgentKind::Smart {
                    debug!(head = ?snake.head(), "no route to food, stepping greedily");
                }
                let mut single = VecDeque::with_capacity(1);
                single.push_back(greedy_step(grid, snake, rng)?);
                single
            }
        };

        Ok(())
    }

    pub fn next_move<R>(&mut self, grid: &Grid, snake: &Snake, rng: &mut R) -> Result<Direction, PathError>
    where
        R: Rng,
    {
        if self.plan.is_empty() {
            self.replan(grid, snake, rng)?;
        }
        self.plan.pop_front().ok_or(PathError::NowhereToMove { head: snake.head() })
    }
}
