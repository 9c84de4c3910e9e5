//! Many games at once.
//!
//! Games are started in waves as wide as the worker pool. A wave is joined
//! completely before the next one starts, and results are only collected
//! between waves. Games share nothing, so no locking is involved.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::thread;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::HarnessResult;
use crate::executor::Termination;
use crate::game::{self, GameConfig};
use crate::telemetry::{Outcome, Telemetry};

/// Configuration of a batch of games.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Template for every game; level and seed are overwritten per game.
    pub game: GameConfig,
    pub levels: Vec<u32>,
    pub games_per_level: usize,
    /// Number of games running at the same time.
    pub wave_width: usize,
    /// Keep per-round data in the reports instead of light telemetry.
    pub heavy: bool,
    /// Seed of the first game of each level; consecutive games add one.
    /// Random seeds are drawn when unset.
    pub base_seed: Option<u64>,
}

impl BatchConfig {
    pub fn new(game: GameConfig) -> Self {
        Self {
            levels: vec![game.level],
            game,
            games_per_level: 100,
            wave_width: default_wave_width(),
            heavy: false,
            base_seed: None,
        }
    }

    pub fn with_levels(mut self, levels: impl IntoIterator<Item = u32>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    pub fn with_games(mut self, games_per_level: usize) -> Self {
        self.games_per_level = games_per_level;
        self
    }

    pub fn with_wave_width(mut self, width: usize) -> Self {
        self.wave_width = width.max(1);
        self
    }

    pub fn with_heavy(mut self, heavy: bool) -> Self {
        self.heavy = heavy;
        self
    }

    pub fn with_base_seed(mut self, seed: u64) -> Self {
        self.base_seed = Some(seed);
        self
    }

    fn seeds(&self) -> Vec<u64> {
        (0..self.games_per_level)
            .map(|index| match self.base_seed {
                Some(base) => base.wrapping_add(index as u64),
                None => rand::random(),
            })
            .collect()
    }
}

fn default_wave_width() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Games played on one level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub level: u32,
    pub games: Vec<Telemetry>,
    /// Seeds of games that crashed or timed out, for reproduction.
    pub problematic_seeds: Vec<u64>,
}

impl BatchReport {
    fn new(level: u32) -> Self {
        Self {
            level,
            games: Vec::new(),
            problematic_seeds: Vec::new(),
        }
    }

    pub fn outcome_counts(&self) -> BTreeMap<Outcome, usize> {
        let mut counts = BTreeMap::new();
        for telemetry in &self.games {
            *counts.entry(telemetry.outcome).or_insert(0) += 1;
        }
        counts
    }

    fn record(&mut self, seed: u64, telemetry: Telemetry, heavy: bool) {
        if telemetry.outcome.is_problematic() {
            warn!(
                level = self.level,
                seed,
                outcome = ?telemetry.outcome,
                signal = telemetry.signal.as_deref().unwrap_or("-"),
                "problematic seed"
            );
            self.problematic_seeds.push(seed);
        }
        self.games
            .push(if heavy { telemetry } else { telemetry.light() });
    }
}

/// Play every configured game, level by level, one wave at a time.
///
/// A game that cannot be spawned aborts the batch; every other failure is
/// part of that game's telemetry.
pub fn run_batch(config: &BatchConfig) -> HarnessResult<BTreeMap<u32, BatchReport>> {
    let width = config.wave_width.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(width)
        .build()?;

    let mut reports = BTreeMap::new();
    for &level in &config.levels {
        let mut report = BatchReport::new(level);
        let seeds = config.seeds();

        for (wave, seeds) in seeds.chunks(width).enumerate() {
            debug!(level, wave, games = seeds.len(), "starting wave");
            let results: Vec<(u64, HarnessResult<Telemetry>)> = pool.install(|| {
                seeds
                    .par_iter()
                    .map(|&seed| {
                        let game = config.game.clone().with_level(level).with_seed(seed);
                        (seed, game::play(&game).map(Termination::into_inner))
                    })
                    .collect()
            });

            for (seed, result) in results {
                report.record(seed, result?, config.heavy);
            }
        }

        reports.insert(level, report);
    }
    Ok(reports)
}
