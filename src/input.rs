use thiserror::Error;

use crate::grid::Direction;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("terminal error: {0}")]
    Terminal(String),
    /// Ctrl+C or Esc while a line was being typed.
    #[error("input interrupted")]
    Interrupted,
}

/// A keystroke, reduced to what the game reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Enter,
    /// Ctrl+C or Esc.
    Interrupt,
    Other,
}

impl Key {
    /// Arrow keys and WASD.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Key::Up | Key::Char('w') | Key::Char('W') => Some(Direction::Up),
            Key::Down | Key::Char('s') | Key::Char('S') => Some(Direction::Down),
            Key::Left | Key::Char('a') | Key::Char('A') => Some(Direction::Left),
            Key::Right | Key::Char('d') | Key::Char('D') => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Where the session gets its answers and keystrokes from.
pub trait Input {
    /// Reads a full line of text, waiting as long as needed.
    fn read_blocking_line(&mut self) -> Result<String, InputError>;

    /// Returns the most recent pending keystroke without waiting.
    fn poll_keystroke(&mut self) -> Result<Option<Key>, InputError>;

    fn read_single_blocking_key(&mut self) -> Result<Key, InputError>;
}

/// Parses a 1-based menu entry in `1..=max`.
pub fn parse_choice(line: &str, max: usize) -> Option<usize> {
    match line.trim().parse::<usize>() {
        Ok(n) if (1..=max).contains(&n) => Some(n),
        _ => None,
    }
}

/// Parses a yes/no answer. An empty line gives `default`.
pub fn parse_confirmation(line: &str, default: Option<bool>) -> Option<bool> {
    match line.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Input double that replays canned lines and keys, then fails with an
/// end-of-file error.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ScriptedInput {
    lines: std::collections::VecDeque<String>,
    keys: std::collections::VecDeque<Key>,
    polls: std::collections::VecDeque<Option<Key>>,
}

#[cfg(test)]
impl ScriptedInput {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn line(mut self, line: &str) -> Self {
        self.lines.push_back(line.to_string());
        self
    }

    pub(crate) fn key(mut self, key: Key) -> Self {
        self.keys.push_back(key);
        self
    }

    pub(crate) fn poll(mut self, key: Option<Key>) -> Self {
        self.polls.push_back(key);
        self
    }
}

#[cfg(test)]
impl Input for ScriptedInput {
    fn read_blocking_line(&mut self) -> Result<String, InputError> {
        self.lines.pop_front().ok_or_else(script_exhausted)
    }

    /// Running out of scripted polls means no key was pressed.
    fn poll_keystroke(&mut self) -> Result<Option<Key>, InputError> {
        Ok(self.polls.pop_front().flatten())
    }

    fn read_single_blocking_key(&mut self) -> Result<Key, InputError> {
        self.keys.pop_front().ok_or_else(script_exhausted)
    }
}

#[cfg(test)]
fn script_exhausted() -> InputError {
    std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "script exhausted").into()
}
