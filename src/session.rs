use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::grid::{Direction, Grid, GridError, GridView};
use crate::input::{parse_choice, parse_confirmation, Input, InputError, Key};
use crate::levels::{level_name, LevelError, LevelPool, LevelSource};
use crate::pathfinder::{AgentKind, Autopilot, PathError};
use crate::rng::SessionRng;
use crate::snake::Snake;

const POINTS_PER_FOOD: u32 = 10;
const INVALID_OPTION: &str = "Invalid option, try again";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no levels to play")]
    NoLevels,
    #[error("no level is loaded")]
    NoLevelLoaded,
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Input(#[from] InputError),
}

/// Who steers the snake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Player,
    Agent(AgentKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Play,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeChoice {
    Player,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    MainMenu,
    /// Asking whether to leave; `confirmed` ends the session.
    Quit { confirmed: bool },
    ModeSelect,
    AgentSelect,
    /// `fresh` is false when restarting the level after damage.
    RoundStart { mode: Mode, fresh: bool },
    Running { mode: Mode },
    Damage { mode: Mode },
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Started,
    MenuChosen(MenuChoice),
    QuitAnswered(bool),
    ModeChosen(ModeChoice),
    AgentChosen(AgentKind),
    LevelsExhausted { lives_left: u32 },
    RoundReady,
    Collided,
    FoodTargetReached,
    LifeLost { lives_left: u32 },
    Continue(bool),
    Interrupted,
}

/// Next phase for `event`. Events that mean nothing in `phase` leave it
/// unchanged.
pub fn transition(phase: Phase, event: Event) -> Phase {
    use Event::*;

    if event == Interrupted {
        return match phase {
            Phase::Quit { .. } => Phase::Quit { confirmed: true },
            _ => Phase::Quit { confirmed: false },
        };
    }

    match phase {
        Phase::Init => match event {
            Started => Phase::MainMenu,
            _ => phase,
        },
        Phase::MainMenu => match event {
            MenuChosen(MenuChoice::Play) => Phase::ModeSelect,
            MenuChosen(MenuChoice::Quit) => Phase::Quit { confirmed: false },
            _ => phase,
        },
        Phase::Quit { confirmed } => match event {
            QuitAnswered(true) => Phase::Quit { confirmed: true },
            QuitAnswered(false) if !confirmed => Phase::MainMenu,
            _ => phase,
        },
        Phase::ModeSelect => match event {
            ModeChosen(ModeChoice::Player) => Phase::RoundStart { mode: Mode::Player, fresh: true },
            ModeChosen(ModeChoice::Agent) => Phase::AgentSelect,
            AgentChosen(kind) => Phase::RoundStart { mode: Mode::Agent(kind), fresh: true },
            LevelsExhausted { lives_left } if lives_left > 0 => Phase::Won,
            LevelsExhausted { .. } => Phase::Lost,
            _ => phase,
        },
        Phase::AgentSelect => match event {
            AgentChosen(kind) => Phase::RoundStart { mode: Mode::Agent(kind), fresh: true },
            _ => phase,
        },
        Phase::RoundStart { mode, .. } => match event {
            RoundReady => Phase::Running { mode },
            Collided => Phase::Damage { mode },
            _ => phase,
        },
        Phase::Running { mode } => match event {
            Collided => Phase::Damage { mode },
            FoodTargetReached => Phase::Won,
            _ => phase,
        },
        Phase::Damage { mode } => match event {
            LifeLost { lives_left: 0 } => Phase::Lost,
            LifeLost { .. } => Phase::RoundStart { mode, fresh: false },
            _ => phase,
        },
        Phase::Won | Phase::Lost => match event {
            Continue(true) => Phase::ModeSelect,
            Continue(false) => Phase::MainMenu,
            _ => phase,
        },
    }
}

/// What the player answered during the last input step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Menu(MenuChoice),
    Mode(ModeChoice),
    Agent(AgentKind),
    Confirm(bool),
    Steer(Direction),
    Acknowledge,
    Interrupt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hud {
    pub lives: u32,
    pub max_lives: u32,
    pub score: u32,
    pub eaten: u32,
    pub food_target: u32,
    pub level: String,
}

/// Everything the screen shows for the current phase.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct View {
    pub title: Option<String>,
    pub body: Vec<String>,
    pub hud: Option<Hud>,
    pub board: Option<GridView>,
    pub system_message: Option<String>,
    pub prompt: Option<String>,
}

pub struct Session {
    phase: Phase,
    settings: Settings,
    lives: u32,
    eaten: u32,
    score: u32,
    levels: LevelPool,
    source: Box<dyn LevelSource>,
    current_level: Option<String>,
    grid: Option<Grid>,
    snake: Snake,
    autopilot: Option<Autopilot>,
    rng: SessionRng,
    pending: Option<Command>,
    system_message: Option<String>,
}

impl Session {
    pub fn new(
        settings: Settings,
        levels: Vec<String>,
        source: Box<dyn LevelSource>,
        rng: SessionRng,
    ) -> Result<Self, SessionError> {
        if levels.is_empty() {
            return Err(SessionError::NoLevels);
        }
        info!(levels = levels.len(), seed = rng.seed(), "session created");

        Ok(Session {
            phase: Phase::Init,
            lives: settings.lives,
            settings,
            eaten: 0,
            score: 0,
            levels: LevelPool::new(levels),
            source,
            current_level: None,
            grid: None,
            snake: Snake::new(Default::default()),
            autopilot: None,
            rng,
            pending: None,
            system_message: None,
        })
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Quit { confirmed: true }
    }

    /// Pause between frames; only the running game is paced.
    pub fn frame_delay(&self) -> Option<Duration> {
        match self.phase {
            Phase::Running { .. } => Some(Duration::from_millis(
                1000 / u64::from(self.settings.frames_per_second),
            )),
            _ => None,
        }
    }

    /// Reads whatever the current phase is waiting for and records it.
    /// Nothing else in the session changes here.
    pub fn collect_input<I: Input>(&mut self, input: &mut I) -> Result<(), SessionError> {
        self.system_message = None;

        self.pending = match self.phase {
            Phase::Init | Phase::Quit { confirmed: true } => None,
            Phase::MainMenu => self.read_choice(input, |n| {
                Command::Menu(if n == 1 { MenuChoice::Play } else { MenuChoice::Quit })
            })?,
            Phase::ModeSelect => self.read_choice(input, |n| {
                Command::Mode(if n == 1 { ModeChoice::Player } else { ModeChoice::Agent })
            })?,
            Phase::AgentSelect => self.read_choice(input, |n| {
                Command::Agent(if n == 1 { AgentKind::Smart } else { AgentKind::Dumb })
            })?,
            Phase::Quit { confirmed: false } => self.read_confirmation(input, Some(true))?,
            Phase::Won | Phase::Lost => self.read_confirmation(input, None)?,
            Phase::RoundStart { mode: Mode::Player, .. } => match input.read_single_blocking_key()? {
                Key::Interrupt => Some(Command::Interrupt),
                key => match key.direction() {
                    Some(dir) => Some(Command::Steer(dir)),
                    None => {
                        self.system_message = Some("Press w, a, s or d to start".to_string());
                        None
                    }
                },
            },
            Phase::RoundStart { mode: Mode::Agent(_), .. } => None,
            Phase::Running { mode } => match input.poll_keystroke()? {
                Some(Key::Interrupt) => Some(Command::Interrupt),
                Some(key) if mode == Mode::Player => key.direction().map(Command::Steer),
                _ => None,
            },
            Phase::Damage { .. } => match input.read_single_blocking_key()? {
                Key::Interrupt => Some(Command::Interrupt),
                _ => Some(Command::Acknowledge),
            },
        };

        Ok(())
    }

    fn read_choice<I, F>(&mut self, input: &mut I, choose: F) -> Result<Option<Command>, SessionError>
    where
        I: Input,
        F: Fn(usize) -> Command,
    {
        let line = match input.read_blocking_line() {
            Ok(line) => line,
            Err(InputError::Interrupted) => return Ok(Some(Command::Interrupt)),
            Err(err) => return Err(err.into()),
        };

        match parse_choice(&line, 2) {
            Some(n) => Ok(Some(choose(n))),
            None => {
                self.system_message = Some(INVALID_OPTION.to_string());
                Ok(None)
            }
        }
    }

    fn read_confirmation<I: Input>(
        &mut self,
        input: &mut I,
        default: Option<bool>,
    ) -> Result<Option<Command>, SessionError> {
        let line = match input.read_blocking_line() {
            Ok(line) => line,
            Err(InputError::Interrupted) => return Ok(Some(Command::Interrupt)),
            Err(err) => return Err(err.into()),
        };

        match parse_confirmation(&line, default) {
            Some(answer) => Ok(Some(Command::Confirm(answer))),
            None => {
                self.system_message = Some(INVALID_OPTION.to_string());
                Ok(None)
            }
        }
    }

    /// Runs one step of the game for the input recorded last.
    pub fn advance(&mut self) -> Result<(), SessionError> {
        let command = self.pending.take();
        if command == Some(Command::Interrupt) {
            return self.apply(Event::Interrupted);
        }

        let event = match self.phase {
            Phase::Init => Some(Event::Started),
            Phase::MainMenu => match command {
                Some(Command::Menu(choice)) => Some(Event::MenuChosen(choice)),
                _ => None,
            },
            Phase::Quit { .. } => match command {
                Some(Command::Confirm(answer)) => Some(Event::QuitAnswered(answer)),
                _ => None,
            },
            Phase::ModeSelect => match command {
                Some(Command::Mode(ModeChoice::Agent)) => match self.settings.agent_kind {
                    Some(kind) => Some(Event::AgentChosen(kind)),
                    None => Some(Event::ModeChosen(ModeChoice::Agent)),
                },
                Some(Command::Mode(choice)) => Some(Event::ModeChosen(choice)),
                _ => None,
            },
            Phase::AgentSelect => match command {
                Some(Command::Agent(kind)) => Some(Event::AgentChosen(kind)),
                _ => None,
            },
            Phase::RoundStart { mode, .. } => self.start_round(mode, command)?,
            Phase::Running { mode } => self.step(mode, command)?,
            Phase::Damage { .. } => match command {
                Some(Command::Acknowledge) => Some(Event::LifeLost { lives_left: self.lives }),
                _ => None,
            },
            Phase::Won | Phase::Lost => match command {
                Some(Command::Confirm(answer)) => Some(Event::Continue(answer)),
                _ => None,
            },
        };

        match event {
            Some(event) => self.apply(event),
            None => Ok(()),
        }
    }

    /// Moves to the next phase, running entry actions as phases change.
    /// An entry action may raise a follow-up event of its own.
    fn apply(&mut self, event: Event) -> Result<(), SessionError> {
        let mut event = Some(event);

        while let Some(current) = event.take() {
            let next = transition(self.phase, current);
            if next == self.phase {
                continue;
            }
            debug!(from = ?self.phase, to = ?next, event = ?current, "phase change");
            self.phase = next;
            event = self.on_enter()?;
        }

        Ok(())
    }

    fn on_enter(&mut self) -> Result<Option<Event>, SessionError> {
        match self.phase {
            Phase::ModeSelect => {
                self.score = 0;
                self.eaten = 0;
                return self.draw_level();
            }
            Phase::RoundStart { mode, fresh } => {
                let grid = self.grid.as_ref().ok_or(SessionError::NoLevelLoaded)?;
                self.snake.reset(grid.spawn(), Direction::None);
                self.eaten = 0;
                if fresh {
                    self.lives = self.settings.lives;
                }
                self.autopilot = match mode {
                    Mode::Agent(kind) => Some(Autopilot::new(kind)),
                    Mode::Player => None,
                };
            }
            Phase::Damage { .. } => {
                self.lives = self.lives.saturating_sub(1);
                warn!(lives = self.lives, head = %self.snake.head(), "snake crashed");
            }
            Phase::Won => info!(score = self.score, "round won"),
            Phase::Lost => info!(score = self.score, "out of lives"),
            Phase::Quit { confirmed: true } => info!("quitting"),
            _ => {}
        }

        Ok(None)
    }

    fn draw_level(&mut self) -> Result<Option<Event>, SessionError> {
        let level = match self.levels.draw(&mut self.rng) {
            Some(level) => level,
            None => {
                info!(lives = self.lives, "every level has been played");
                return Ok(Some(Event::LevelsExhausted { lives_left: self.lives }));
            }
        };

        let grid = self.source.load(&level)?;
        info!(
            level = %level,
            width = grid.width(),
            height = grid.height(),
            remaining = self.levels.len(),
            "level drawn"
        );
        self.current_level = Some(level_name(&level));
        self.grid = Some(grid);

        Ok(None)
    }

    /// Lays out the starting body and places the first food.
    fn start_round(&mut self, mode: Mode, command: Option<Command>) -> Result<Option<Event>, SessionError> {
        let grid = self.grid.as_mut().ok_or(SessionError::NoLevelLoaded)?;
        let spawn = grid.spawn();

        match mode {
            Mode::Player => {
                let direction = match command {
                    Some(Command::Steer(direction)) => direction,
                    _ => return Ok(None),
                };
                self.snake.reset(grid.step(spawn, direction), direction);
                self.snake.extend_tail(spawn);
            }
            Mode::Agent(_) => self.snake.reset(spawn, Direction::None),
        }

        let snake = &self.snake;
        let food = grid.respawn_food(&mut self.rng, |pos| snake.contains(pos))?;
        info!(?mode, spawn = %spawn, food = %food, "round started");

        if grid.cell(self.snake.head()).blocks_movement() {
            return Ok(Some(Event::Collided));
        }
        if let Some(autopilot) = self.autopilot.as_mut() {
            autopilot.replan(grid, &self.snake, &mut self.rng)?;
        }

        Ok(Some(Event::RoundReady))
    }

    /// One frame of the running game.
    fn step(&mut self, mode: Mode, command: Option<Command>) -> Result<Option<Event>, SessionError> {
        let grid = self.grid.as_mut().ok_or(SessionError::NoLevelLoaded)?;
        let current = self.snake.direction();

        let direction = match (mode, self.autopilot.as_mut()) {
            (Mode::Agent(_), Some(autopilot)) => autopilot.next_move(grid, &self.snake, &mut self.rng)?,
            _ => match command {
                Some(Command::Steer(dir)) if !dir.is_opposite(current) => dir,
                _ => current,
            },
        };
        if direction == Direction::None {
            return Ok(None);
        }

        let ate = grid.found_food(grid.step(self.snake.head(), direction));
        let head = self.snake.advance(direction, grid.dimensions(), ate);

        if grid.is_blocked(head, Direction::None) || self.snake.occupies(head) {
            return Ok(Some(Event::Collided));
        }
        if !ate {
            return Ok(None);
        }

        self.eaten += 1;
        self.score += POINTS_PER_FOOD;
        debug!(eaten = self.eaten, score = self.score, "food eaten");

        if self.eaten >= self.settings.food_target {
            return Ok(Some(Event::FoodTargetReached));
        }

        let snake = &self.snake;
        grid.respawn_food(&mut self.rng, |pos| snake.contains(pos))?;
        if let Some(autopilot) = self.autopilot.as_mut() {
            autopilot.clear();
        }

        Ok(None)
    }

    fn hud(&self) -> Hud {
        Hud {
            lives: self.lives,
            max_lives: self.settings.lives,
            score: self.score,
            eaten: self.eaten,
            food_target: self.settings.food_target,
            level: self.current_level.clone().unwrap_or_default(),
        }
    }

    pub fn view(&self) -> View {
        let mut view = View {
            system_message: self.system_message.clone(),
            ..View::default()
        };

        match self.phase {
            Phase::Init => {}
            Phase::MainMenu => {
                view.title = Some("Snaze".to_string());
                view.body = vec!["[1] - Play".to_string(), "[2] - Quit".to_string()];
                view.prompt = Some("Select one option and press enter".to_string());
            }
            Phase::Quit { confirmed } => {
                view.title = Some("Quitting".to_string());
                if !confirmed {
                    view.body = vec!["Do you want to quit the snaze game?".to_string()];
                    view.prompt = Some("[Y/n]".to_string());
                }
            }
            Phase::ModeSelect => {
                view.title = Some("Snaze Mode".to_string());
                view.body = vec!["[1] - Normal".to_string(), "[2] - Bot".to_string()];
                view.prompt = Some("Select one option and press enter".to_string());
            }
            Phase::AgentSelect => {
                view.title = Some("Select bot type".to_string());
                view.body = vec!["[1] - Smart bot".to_string(), "[2] - Dumb bot".to_string()];
                view.prompt = Some("Select one option and press enter".to_string());
            }
            Phase::RoundStart { mode, .. } => {
                view.hud = Some(self.hud());
                view.board = self.grid.as_ref().map(|grid| grid.snapshot(None));
                view.prompt = match mode {
                    Mode::Player => Some(
                        "Controls: \"w\" - UP \"s\" - DOWN \"d\" - RIGHT \"a\" - LEFT".to_string(),
                    ),
                    Mode::Agent(kind) => Some(format!("The {} bot is getting ready", kind)),
                };
            }
            Phase::Running { .. } => {
                view.hud = Some(self.hud());
                view.board = self.grid.as_ref().map(|grid| grid.snapshot(Some(&self.snake)));
            }
            Phase::Damage { .. } => {
                view.hud = Some(self.hud());
                view.board = self.grid.as_ref().map(|grid| grid.snapshot(Some(&self.snake)));
                view.prompt = Some("You suffered damage!!! Press any key to continue".to_string());
            }
            Phase::Won => {
                view.title = Some("The snake has found its way!".to_string());
                view.body = vec![format!("Final score: {}", self.score)];
                view.prompt = Some("Do you want to continue with the snaze? [y/n]".to_string());
            }
            Phase::Lost => {
                view.title = Some("The snake got wrecked".to_string());
                view.body = vec![format!("Final score: {}", self.score)];
                view.prompt = Some("Do you want to continue with the snaze? [y/n]".to_string());
            }
        }

        view
    }
}
