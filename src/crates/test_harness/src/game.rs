use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use tracing::debug;

use crate::config::EngineConfig;
use crate::diagnostics::DiagnosticLog;
use crate::error::HarnessResult;
use crate::executor::{self, OutputHandler, Termination};
use crate::telemetry::{RoundRecord, Snapshot, Telemetry, TelemetryOptions, TelemetryState};
use crate::token::{Channel, Token};

/// How the engine draws the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayType {
    #[default]
    BlackAndWhite,
    Color,
}

impl DisplayType {
    pub fn as_cli_arg(&self) -> &'static str {
        match self {
            DisplayType::BlackAndWhite => "bw",
            DisplayType::Color => "color",
        }
    }
}

/// How the engine process is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// Run under a debugger that overwrites the engine's random seed.
    ///
    /// The engine seeds itself from the clock; breaking on `srand` and
    /// rewriting its argument is the only way to replay a game.
    Debugger { program: PathBuf },
    /// Start the executable directly. The seed is recorded but not applied.
    Direct,
}

impl Default for Launcher {
    fn default() -> Self {
        Launcher::Debugger {
            program: PathBuf::from("gdb"),
        }
    }
}

/// Everything needed to play one game.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Compiled engine linked with the player's code.
    pub executable: PathBuf,
    /// Directory holding `level<N>.map` files.
    pub levels_dir: PathBuf,
    pub level: u32,
    pub seed: u64,
    /// Delay between redraws requested from the engine, in milliseconds.
    pub delay: u32,
    pub display: DisplayType,
    /// Wall-clock limit for the game.
    pub timeout: Option<Duration>,
    /// Keep grid rows with their color codes.
    pub keep_ansi: bool,
    /// Keep every round's grid.
    pub keep_history: bool,
    /// Collect the player's stderr per round.
    pub capture_diagnostics: bool,
    pub launcher: Launcher,
    pub working_directory: Option<PathBuf>,
}

impl GameConfig {
    /// Configure a game on `level` with a random seed.
    pub fn new(executable: impl Into<PathBuf>, levels_dir: impl Into<PathBuf>, level: u32) -> Self {
        Self {
            executable: executable.into(),
            levels_dir: levels_dir.into(),
            level,
            seed: rand::random(),
            delay: 0,
            display: DisplayType::BlackAndWhite,
            timeout: None,
            keep_ansi: false,
            keep_history: true,
            capture_diagnostics: false,
            launcher: Launcher::default(),
            working_directory: None,
        }
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_delay(mut self, delay: u32) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_display(mut self, display: DisplayType) -> Self {
        self.display = display;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_ansi(mut self, keep: bool) -> Self {
        self.keep_ansi = keep;
        self
    }

    pub fn with_history(mut self, keep: bool) -> Self {
        self.keep_history = keep;
        self
    }

    /// Keep everything a replay needs: colored grids, history and stderr.
    pub fn with_full_insight(mut self) -> Self {
        self.keep_ansi = true;
        self.keep_history = true;
        self.capture_diagnostics = true;
        self
    }

    pub fn with_diagnostics(mut self, capture: bool) -> Self {
        self.capture_diagnostics = capture;
        self
    }

    pub fn with_launcher(mut self, launcher: Launcher) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn map_path(&self) -> PathBuf {
        self.levels_dir.join(format!("level{}.map", self.level))
    }

    /// Arguments understood by the engine itself.
    pub fn engine_args(&self) -> Vec<String> {
        vec![
            "-delay".to_string(),
            self.delay.to_string(),
            "-debug".to_string(),
            "off".to_string(),
            "-display".to_string(),
            self.display.as_cli_arg().to_string(),
            self.map_path().display().to_string(),
        ]
    }

    /// Debugger commands that pin the engine's seed and run it to the end.
    pub fn seed_script(&self) -> String {
        format!(
            "set confirm off\nb srand\nr\ncall x = {}\nc\nq\n",
            self.seed
        )
    }

    pub fn telemetry_options(&self) -> TelemetryOptions {
        TelemetryOptions {
            keep_ansi: self.keep_ansi,
            keep_history: self.keep_history,
        }
    }

    /// Process configuration for this game.
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = match &self.launcher {
            Launcher::Debugger { program } => EngineConfig::new(program)
                .with_arg("--args")
                .with_arg(self.executable.display().to_string())
                .with_args(self.engine_args())
                .with_stdin(self.seed_script()),
            Launcher::Direct => EngineConfig::new(&self.executable).with_args(self.engine_args()),
        };
        if let Some(timeout) = self.timeout {
            config = config.with_deadline(timeout);
        }
        if let Some(dir) = &self.working_directory {
            config = config.with_working_directory(dir);
        }
        config
    }
}

/// Receives every round as soon as it closes.
pub trait RoundObserver {
    fn on_round(&mut self, snapshot: &Snapshot, record: &RoundRecord);
}

/// Observer that discards rounds.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreRounds;

impl RoundObserver for IgnoreRounds {
    fn on_round(&mut self, _snapshot: &Snapshot, _record: &RoundRecord) {}
}

impl<F> RoundObserver for F
where
    F: FnMut(&Snapshot, &RoundRecord),
{
    fn on_round(&mut self, snapshot: &Snapshot, record: &RoundRecord) {
        self(snapshot, record)
    }
}

/// Output handler for one game: stdout drives the telemetry, stderr is kept
/// as per-round diagnostics.
pub struct GameSession<O = IgnoreRounds> {
    state: TelemetryState,
    diagnostics: Option<DiagnosticLog>,
    observer: O,
}

impl GameSession<IgnoreRounds> {
    pub fn new(config: &GameConfig) -> Self {
        Self::with_observer(config, IgnoreRounds)
    }
}

impl<O: RoundObserver> GameSession<O> {
    pub fn with_observer(config: &GameConfig, observer: O) -> Self {
        Self {
            state: TelemetryState::new(config.telemetry_options())
                .with_seed(config.seed)
                .with_level(config.level),
            diagnostics: config.capture_diagnostics.then(DiagnosticLog::new),
            observer,
        }
    }

    fn into_telemetry(self) -> Telemetry {
        let mut telemetry = self.state.finalize();
        if let Some(log) = self.diagnostics {
            telemetry.diagnostics = log.into_rounds();
        }
        telemetry
    }
}

impl<O: RoundObserver> OutputHandler for GameSession<O> {
    type Output = Telemetry;

    fn on_token(&mut self, channel: Channel, token: Token) {
        match channel {
            Channel::Stdout => {
                if let Some(update) = self.state.consume(&token) {
                    self.observer.on_round(&update.snapshot, &update.record);
                }
            }
            Channel::Stderr => {
                if let Some(log) = self.diagnostics.as_mut() {
                    log.push(&token);
                }
            }
        }
    }

    fn on_finish(self, status: Option<ExitStatus>) -> Telemetry {
        debug!(?status, outcome = ?self.state.outcome(), rounds = self.state.rounds(), "game finished");
        self.into_telemetry()
    }

    fn on_timeout(mut self) -> Telemetry {
        self.state.mark_timed_out();
        self.into_telemetry()
    }
}

/// Play one game to completion or timeout.
pub fn play(config: &GameConfig) -> HarnessResult<Termination<Telemetry>> {
    executor::run(&config.engine_config(), GameSession::new(config))
}

/// Play one game, reporting each round to `observer` as it closes.
pub fn play_observed<O: RoundObserver>(
    config: &GameConfig,
    observer: O,
) -> HarnessResult<Termination<Telemetry>> {
    executor::run(
        &config.engine_config(),
        GameSession::with_observer(config, observer),
    )
}
