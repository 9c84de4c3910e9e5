//! Reconstruction of a game from the engine's stdout.
//!
//! The engine has no machine-readable output. It prints a start banner, then
//! for every round a bordered grid, a few counters and the action chosen by the
//! player, until a win banner, a loss banner or a crash. [`TelemetryState`]
//! follows that stream token by token and [`TelemetryState::finalize`] turns it
//! into a [`Telemetry`].

mod grammar;
mod state;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use grammar::{strip_ansi, BORDER_LINE, LOSS_BANNER_LINE, START_BANNER, WIN_BANNER_LINE};
pub use state::{RoundUpdate, TelemetryOptions, TelemetryState};

/// Characters the engine uses to draw the board.
pub mod tile {
    pub const PLAYER: char = '@';
    pub const WALL: char = '*';
    pub const BREAKABLE_WALL: char = '=';
    pub const PATH: char = '.';
    pub const EXIT: char = 'E';
    pub const BOMB: char = '#';
    pub const BOMB_BONUS: char = 'B';
    pub const FLAME_BONUS: char = 'F';
    pub const FLAME_ENEMY: char = '&';
    pub const GHOST_ENEMY: char = '%';
}

/// Final classification of a game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Loss,
    Error,
    Timeout,
    #[default]
    Unknown,
}

impl Outcome {
    /// Whether the game ran to one of its own endings.
    pub fn is_valid_game(&self) -> bool {
        matches!(self, Outcome::Win | Outcome::Loss)
    }

    /// Outcomes worth reproducing from their seed.
    pub fn is_problematic(&self) -> bool {
        matches!(self, Outcome::Error | Outcome::Timeout)
    }
}

/// Move returned by the player for one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Bombing,
    North,
    East,
    South,
    West,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Bombing,
        Action::North,
        Action::East,
        Action::South,
        Action::West,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Bombing => "BOMBING",
            Action::North => "NORTH",
            Action::East => "EAST",
            Action::South => "SOUTH",
            Action::West => "WEST",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown action {s:?}"))
    }
}

/// One grid as printed between two border lines, borders included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Rows with escape sequences removed.
    pub rows: Vec<String>,
    /// Rows exactly as printed, terminators included, when color was kept.
    pub raw_rows: Option<Vec<String>>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of cells showing `tile`.
    pub fn count(&self, tile: char) -> usize {
        self.rows
            .iter()
            .map(|row| row.chars().filter(|c| *c == tile).count())
            .sum()
    }

    /// First `(row, column)` showing `tile`, in reading order.
    pub fn find(&self, tile: char) -> Option<(usize, usize)> {
        self.rows.iter().enumerate().find_map(|(y, row)| {
            row.chars()
                .position(|c| c == tile)
                .map(|x| (y, x))
        })
    }

    /// The tile at `(row, column)`, if the grid is that large.
    pub fn cell(&self, row: usize, column: usize) -> Option<char> {
        self.rows.get(row)?.chars().nth(column)
    }

    /// Rows to print: the colored ones when available.
    pub fn display_rows(&self) -> &[String] {
        self.raw_rows.as_deref().unwrap_or(&self.rows)
    }
}

/// Facts derived when a round closes.
///
/// Counts are `None` until they can be computed; the first round never has a
/// previous grid to compare with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Position of this round among the action lines, starting at 1.
    pub index: usize,
    /// Value of the engine's `Rounds:` counter when the round closed.
    pub round: Option<u32>,
    pub remaining_bombs: Option<u32>,
    pub score: Option<u32>,
    pub broken_wall: Option<i32>,
    pub flame_enemy_killed: Option<i32>,
    pub ghost_enemy_killed: Option<i32>,
    pub bomb_bonus_taken: Option<u32>,
    pub flame_bonus_taken: Option<u32>,
    pub action: Action,
}

/// Structured summary of one game.
///
/// Anything the stream never showed stays `None`, so "not observed" can be
/// told apart from zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Telemetry {
    pub seed: Option<u64>,
    pub level: Option<u32>,
    pub outcome: Outcome,
    /// Signal name when the engine crashed, e.g. `SIGSEGV`.
    pub signal: Option<String>,
    /// Function of the faulting stack frame.
    pub signal_trace: Option<String>,
    pub score: Option<u32>,
    /// Last value of the engine's `Rounds:` counter.
    pub round_counter: Option<u32>,
    /// Number of round-boundary markers seen.
    pub rounds: usize,
    pub remaining_bombs: Option<u32>,
    pub total_breakable_wall: Option<u32>,
    pub broken_wall: Option<i32>,
    pub total_flame_enemy: Option<u32>,
    pub flame_enemy_killed: Option<i32>,
    pub total_ghost_enemy: Option<u32>,
    pub ghost_enemy_killed: Option<i32>,
    pub bomb_bonus_taken: Option<u32>,
    pub flame_bonus_taken: Option<u32>,
    pub records: Option<Vec<RoundRecord>>,
    pub actions: Option<Vec<Action>>,
    pub history: Option<Vec<Snapshot>>,
    /// Player stderr, one entry per round.
    pub diagnostics: Vec<String>,
    /// Set once the per-round data has been dropped.
    pub light: bool,
}

impl Telemetry {
    /// Drop per-round data, keeping only the totals.
    pub fn light(mut self) -> Self {
        self.records = None;
        self.actions = None;
        self.history = None;
        self.diagnostics = Vec::new();
        self.light = true;
        self
    }

    /// Diagnostic text printed during round `index` (zero-based).
    pub fn diagnostics_for(&self, index: usize) -> Option<&str> {
        self.diagnostics.get(index).map(String::as_str)
    }
}
