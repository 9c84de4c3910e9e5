use crate::token::Token;

use super::grammar::{classify, strip_ansi, Marker};
use super::{tile, Action, Outcome, RoundRecord, Snapshot, Telemetry};

/// What the state machine keeps besides the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryOptions {
    /// Keep grid rows with their color codes for replay.
    pub keep_ansi: bool,
    /// Keep every round's grid in [`Telemetry::history`].
    pub keep_history: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self {
            keep_ansi: false,
            keep_history: true,
        }
    }
}

/// Emitted by [`TelemetryState::consume`] each time a round closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundUpdate {
    pub snapshot: Snapshot,
    pub record: RoundRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Baseline {
    breakable_walls: u32,
    flame_enemies: u32,
    ghost_enemies: u32,
}

impl Baseline {
    fn of(snapshot: &Snapshot) -> Self {
        Self {
            breakable_walls: count(snapshot, tile::BREAKABLE_WALL),
            flame_enemies: count(snapshot, tile::FLAME_ENEMY),
            ghost_enemies: count(snapshot, tile::GHOST_ENEMY),
        }
    }
}

fn count(snapshot: &Snapshot, tile: char) -> u32 {
    u32::try_from(snapshot.count(tile)).unwrap_or(u32::MAX)
}

fn delta(total: u32, current: u32) -> i32 {
    i32::try_from(i64::from(total) - i64::from(current)).unwrap_or(i32::MIN)
}

/// Accumulator for one game's stdout.
///
/// Feed every stdout token to [`consume`](Self::consume), then call
/// [`finalize`](Self::finalize) once. Malformed input never fails: lines that
/// match nothing are ignored and counts that were never observed stay unset.
#[derive(Debug, Clone, Default)]
pub struct TelemetryState {
    options: TelemetryOptions,
    seed: Option<u64>,
    level: Option<u32>,

    started: bool,
    outcome: Outcome,
    signal: Option<String>,
    signal_trace: Option<String>,
    awaiting_frame: bool,

    score: Option<u32>,
    round_counter: Option<u32>,
    remaining_bombs: Option<u32>,

    baseline: Option<Baseline>,
    broken_wall: Option<i32>,
    flame_enemy_killed: Option<i32>,
    ghost_enemy_killed: Option<i32>,
    bomb_bonus_taken: Option<u32>,
    flame_bonus_taken: Option<u32>,

    inside_grid: bool,
    current: Snapshot,
    last_grid: Option<Snapshot>,
    previous_round_grid: Option<Snapshot>,
    round_grid: Option<Snapshot>,

    rounds: usize,
    actions: Vec<Action>,
    records: Vec<RoundRecord>,
    history: Vec<Snapshot>,
}

impl TelemetryState {
    pub fn new(options: TelemetryOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = Some(level);
        self
    }

    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Record that the session was killed on its deadline.
    pub fn mark_timed_out(&mut self) {
        self.outcome = Outcome::Timeout;
    }

    /// Advance the state machine by one stdout token.
    ///
    /// Returns the round that just closed, if this token was an action line.
    pub fn consume(&mut self, token: &Token) -> Option<RoundUpdate> {
        let line = strip_ansi(&token.text);
        let marker = classify(&line);

        match marker {
            Some(Marker::Crash { signal }) => {
                self.outcome = Outcome::Error;
                self.signal = Some(signal.to_string());
                self.awaiting_frame = true;
                return None;
            }
            Some(Marker::Start) => {
                self.started = true;
                return None;
            }
            Some(Marker::StackFrame { function }) if self.awaiting_frame => {
                self.signal_trace = Some(function.to_string());
                self.awaiting_frame = false;
                return None;
            }
            _ => {}
        }

        if !self.started {
            return None;
        }

        match marker {
            Some(Marker::Rounds(rounds)) => self.round_counter = Some(rounds),
            Some(Marker::Action(action)) => return Some(self.close_round(action)),
            Some(Marker::RemainingBombs(bombs)) => self.remaining_bombs = Some(bombs),
            Some(Marker::Loss) => self.outcome = Outcome::Loss,
            Some(Marker::Win) => self.outcome = Outcome::Win,
            Some(Marker::Score(score)) => self.score = Some(score),
            Some(Marker::Border) => self.on_border(&line, token),
            _ if self.inside_grid => self.push_row(&line, token),
            _ => {}
        }
        None
    }

    fn push_row(&mut self, line: &str, token: &Token) {
        self.current.rows.push(line.to_string());
        if self.options.keep_ansi {
            self.current
                .raw_rows
                .get_or_insert_with(Vec::new)
                .push(token.raw());
        }
    }

    fn on_border(&mut self, line: &str, token: &Token) {
        if !self.inside_grid {
            self.current = Snapshot::default();
            self.push_row(line, token);
            self.inside_grid = true;
            return;
        }

        self.push_row(line, token);
        self.inside_grid = false;
        let grid = std::mem::take(&mut self.current);
        self.close_grid(grid);
    }

    fn close_grid(&mut self, grid: Snapshot) {
        match &self.last_grid {
            None => {
                self.baseline = Some(Baseline::of(&grid));
                self.bomb_bonus_taken = Some(0);
                self.flame_bonus_taken = Some(0);
            }
            Some(previous) => {
                let bomb = count(previous, tile::BOMB_BONUS).saturating_sub(count(&grid, tile::BOMB_BONUS));
                let flame = count(previous, tile::FLAME_BONUS).saturating_sub(count(&grid, tile::FLAME_BONUS));
                self.bomb_bonus_taken = Some(self.bomb_bonus_taken.unwrap_or(0).saturating_add(bomb));
                self.flame_bonus_taken = Some(self.flame_bonus_taken.unwrap_or(0).saturating_add(flame));
            }
        }
        self.last_grid = Some(grid);
    }

    fn close_round(&mut self, action: Action) -> RoundUpdate {
        self.rounds += 1;
        self.actions.push(action);

        let grid = self.last_grid.clone().unwrap_or_default();
        self.previous_round_grid = self.round_grid.replace(grid.clone());
        if self.options.keep_history {
            self.history.push(grid.clone());
        }

        if let (Some(previous), Some(baseline)) = (&self.previous_round_grid, self.baseline) {
            self.broken_wall = Some(broken_walls(baseline, previous, &grid));
            self.flame_enemy_killed = Some(delta(baseline.flame_enemies, count(&grid, tile::FLAME_ENEMY)));
            self.ghost_enemy_killed = Some(delta(baseline.ghost_enemies, count(&grid, tile::GHOST_ENEMY)));
        }

        let record = RoundRecord {
            index: self.rounds,
            round: self.round_counter,
            remaining_bombs: self.remaining_bombs,
            score: self.score,
            broken_wall: self.broken_wall,
            flame_enemy_killed: self.flame_enemy_killed,
            ghost_enemy_killed: self.ghost_enemy_killed,
            bomb_bonus_taken: self.bomb_bonus_taken,
            flame_bonus_taken: self.flame_bonus_taken,
            action,
        };
        self.records.push(record.clone());

        RoundUpdate {
            snapshot: grid,
            record,
        }
    }

    /// Build the summary. Consumes the state, so it can only happen once.
    pub fn finalize(self) -> Telemetry {
        let baseline = self.baseline;
        Telemetry {
            seed: self.seed,
            level: self.level,
            outcome: self.outcome,
            signal: self.signal,
            signal_trace: self.signal_trace,
            score: self.score,
            round_counter: self.round_counter,
            rounds: self.rounds,
            remaining_bombs: self.remaining_bombs,
            total_breakable_wall: baseline.map(|b| b.breakable_walls),
            broken_wall: self.broken_wall,
            total_flame_enemy: baseline.map(|b| b.flame_enemies),
            flame_enemy_killed: self.flame_enemy_killed,
            total_ghost_enemy: baseline.map(|b| b.ghost_enemies),
            ghost_enemy_killed: self.ghost_enemy_killed,
            bomb_bonus_taken: self.bomb_bonus_taken,
            flame_bonus_taken: self.flame_bonus_taken,
            records: Some(self.records),
            actions: Some(self.actions),
            history: self.options.keep_history.then_some(self.history),
            diagnostics: Vec::new(),
            light: false,
        }
    }
}

/// Walls broken since the first grid.
///
/// The engine draws one sprite per cell, so a ghost standing on a breakable
/// wall hides it. When the ghost's cell held a wall in the previous round's
/// grid, that wall is still there and must not count as broken. A ghost on top
/// of a flame enemy hides the enemy the same way, which cannot be told apart
/// from a kill and is left as is.
fn broken_walls(baseline: Baseline, previous: &Snapshot, current: &Snapshot) -> i32 {
    let mut broken = delta(baseline.breakable_walls, count(current, tile::BREAKABLE_WALL));
    if let (Some((row, column)), Some(_)) = (
        current.find(tile::GHOST_ENEMY),
        previous.find(tile::GHOST_ENEMY),
    ) {
        if previous.cell(row, column) == Some(tile::BREAKABLE_WALL) {
            broken -= 1;
        }
    }
    broken
}
