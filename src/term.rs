use std::fmt::Display;
use std::io::{stdout, Stdout, Write};
use std::time::Duration;

use anyhow::{anyhow, Result};
use crossterm::event::{poll, read, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute, queue, terminal};
use tracing::warn;

use crate::grid::{Cell, Direction, Occupant, Tile};
use crate::input::{Input, InputError, Key};
use crate::session::{Hud, View};
use crate::snake::head_glyph;

const BLOCK_CHAR: char = '█';
const FOOD_CHAR: char = 'O';
const SPAWN_CHAR: char = '&';
const LIFE_CHAR: char = '♥';
const LOST_LIFE_CHAR: char = '✗';
const TITLE_PADDING: usize = 10;

/// Owns the terminal while the game runs: alternate screen, raw mode and
/// a hidden cursor, all undone on drop.
pub struct TermManager<W: Write = Stdout> {
    stdout: W,
    raw: bool,
}

impl TermManager<Stdout> {
    pub fn new() -> Result<Self> {
        TermManager::acquire(stdout(), terminal::enable_raw_mode)
    }
}

impl<W: Write> TermManager<W> {
    /// The manager exists before any terminal state changes, so a failure
    /// halfway through setup still restores what was changed.
    fn acquire<F, E>(out: W, enable_raw_mode: F) -> Result<Self>
    where
        F: FnOnce() -> Result<(), E>,
        E: Display,
    {
        let mut term = TermManager { stdout: out, raw: false };
        execute!(term.stdout, EnterAlternateScreen, cursor::Hide, cursor::DisableBlinking)?;
        enable_raw_mode().map_err(|err| anyhow!("enabling raw mode: {}", err))?;
        term.raw = true;
        Ok(term)
    }

    /// Paints `view`, centered horizontally.
    pub fn present(&mut self, view: &View) -> Result<()> {
        let (width, _) = terminal::size()?;
        let width = width as usize;
        let mut row: u16 = 1;

        queue!(self.stdout, terminal::Clear(ClearType::All))?;

        if let Some(title) = &view.title {
            let line = title_line(title);
            queue!(self.stdout, SetAttribute(Attribute::Bold))?;
            self.print_centered(row, width, &line)?;
            queue!(self.stdout, SetAttribute(Attribute::Reset))?;
            row += 2;
        }

        if let Some(hud) = &view.hud {
            self.print_centered(row, width, &hud_line(hud))?;
            row += 2;
        }

        if let Some(board) = &view.board {
            let x = centered_x(width, board.width);
            for tiles in board.rows() {
                queue!(self.stdout, cursor::MoveTo(x, row))?;
                for &tile in tiles {
                    let (ch, color) = glyph(tile, board.heading);
                    queue!(self.stdout, SetForegroundColor(color), Print(ch))?;
                }
                row += 1;
            }
            queue!(self.stdout, ResetColor)?;
            row += 1;
        }

        for line in &view.body {
            self.print_centered(row, width, line)?;
            row += 1;
        }
        if !view.body.is_empty() {
            row += 1;
        }

        if let Some(message) = &view.system_message {
            queue!(self.stdout, SetForegroundColor(Color::Red))?;
            self.print_centered(row, width, &format!("[ERROR: {}]", message))?;
            queue!(self.stdout, ResetColor)?;
            row += 1;
        }

        if let Some(prompt) = &view.prompt {
            self.print_centered(row, width, &format!("{} > ", prompt))?;
        }

        self.stdout.flush()?;
        Ok(())
    }

    fn print_centered(&mut self, row: u16, width: usize, line: &str) -> Result<()> {
        let x = centered_x(width, line.chars().count());
        queue!(self.stdout, cursor::MoveTo(x, row), Print(line))?;
        Ok(())
    }

    fn echo<T: Display>(&mut self, text: T) -> Result<(), InputError> {
        queue!(self.stdout, Print(text)).map_err(terminal_error)?;
        self.stdout.flush()?;
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        let screen = execute!(self.stdout, cursor::Show, cursor::EnableBlinking, LeaveAlternateScreen);
        if self.raw {
            terminal::disable_raw_mode()?;
            self.raw = false;
        }
        screen?;
        Ok(())
    }
}

impl<W: Write> Drop for TermManager<W> {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            warn!("failed to restore the terminal: {}", err);
        }
    }
}

impl<W: Write> Input for TermManager<W> {
    /// Raw mode is kept on, so the line is echoed by hand.
    fn read_blocking_line(&mut self) -> Result<String, InputError> {
        let mut line = String::new();

        loop {
            let ev = match read_key_blocking()? {
                ev if map_key(ev) == Key::Interrupt => return Err(InputError::Interrupted),
                ev => ev,
            };
            match ev.code {
                KeyCode::Enter => return Ok(line),
                KeyCode::Backspace => {
                    if line.pop().is_some() {
                        self.echo("\u{8} \u{8}")?;
                    }
                }
                KeyCode::Char(ch) => {
                    line.push(ch);
                    self.echo(ch)?;
                }
                _ => {}
            }
        }
    }

    /// Drains every pending key event. An interrupt wins over anything
    /// else; otherwise the latest key is returned.
    fn poll_keystroke(&mut self) -> Result<Option<Key>, InputError> {
        let mut latest = None;

        while poll(Duration::from_millis(0)).map_err(terminal_error)? {
            if let Event::Key(ev) = read().map_err(terminal_error)? {
                match map_key(ev) {
                    Key::Interrupt => return Ok(Some(Key::Interrupt)),
                    key => latest = Some(key),
                }
            }
        }

        Ok(latest)
    }

    fn read_single_blocking_key(&mut self) -> Result<Key, InputError> {
        read_key_blocking().map(map_key)
    }
}

fn read_key_blocking() -> Result<KeyEvent, InputError> {
    loop {
        if let Event::Key(ev) = read().map_err(terminal_error)? {
            return Ok(ev);
        }
    }
}

fn terminal_error<E: Display>(err: E) -> InputError {
    InputError::Terminal(err.to_string())
}

pub fn map_key(ev: KeyEvent) -> Key {
    match ev.code {
        KeyCode::Char('c') if ev.modifiers.contains(KeyModifiers::CONTROL) => Key::Interrupt,
        KeyCode::Esc => Key::Interrupt,
        KeyCode::Char(ch) => Key::Char(ch),
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Enter => Key::Enter,
        _ => Key::Other,
    }
}

fn glyph(tile: Tile, heading: Direction) -> (char, Color) {
    match tile.occupant {
        Occupant::Head => (head_glyph(heading), Color::Red),
        Occupant::Body => (BLOCK_CHAR, Color::Yellow),
        Occupant::Empty => match tile.cell {
            Cell::Wall => (BLOCK_CHAR, Color::Green),
            Cell::Food => (FOOD_CHAR, Color::Magenta),
            Cell::Spawn => (SPAWN_CHAR, Color::Yellow),
            Cell::Free | Cell::InvisibleWall => (' ', Color::Reset),
        },
    }
}

fn title_line(title: &str) -> String {
    let padding = "-".repeat(TITLE_PADDING);
    format!("={}[ {} ]{}=", padding, title, padding)
}

fn hud_line(hud: &Hud) -> String {
    let lost = hud.max_lives.saturating_sub(hud.lives) as usize;
    let hearts: Vec<String> = std::iter::repeat(LIFE_CHAR)
        .take(hud.lives as usize)
        .chain(std::iter::repeat(LOST_LIFE_CHAR).take(lost))
        .map(String::from)
        .collect();

    format!(
        "Lives: {} | Score: {} | Food eaten {} of {} | Level: {}",
        hearts.join(" "),
        hud.score,
        hud.eaten,
        hud.food_target,
        hud.level
    )
}

fn centered_x(screen_width: usize, len: usize) -> u16 {
    (screen_width.saturating_sub(len) / 2) as u16
}
