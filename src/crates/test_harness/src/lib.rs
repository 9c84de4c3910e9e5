//! Utilities for running a compiled Bomberman engine and reconstructing the
//! game it played from its terminal output.
//!
//! The engine prints a human-oriented display on stdout. [`executor::run`]
//! spawns the process, splits each output stream into [`Token`]s and races a
//! deadline; [`TelemetryState`] turns the stdout tokens into per-round records
//! and a final [`Telemetry`].
//!
//! Typical usage:
//! ```no_run
//! use std::time::Duration;
//! use bomberman_harness::{play, GameConfig, Termination};
//!
//! let config = GameConfig::new("/tmp/bomberman/bomberman", "/tmp/bomberman/levels", 1)
//!     .with_seed(42)
//!     .with_timeout(Duration::from_secs(2));
//!
//! match play(&config).expect("engine should launch") {
//!     Termination::Finished(telemetry) => println!("{:?} in {} rounds", telemetry.outcome, telemetry.rounds),
//!     Termination::TimedOut(telemetry) => println!("timed out after {} rounds", telemetry.rounds),
//! }
//! ```

mod batch;
mod config;
mod diagnostics;
mod error;
pub mod executor;
mod game;
pub mod telemetry;
mod token;

pub use batch::{run_batch, BatchConfig, BatchReport};
pub use config::EngineConfig;
pub use diagnostics::{DiagnosticLog, DIAGNOSTIC_SENTINEL};
pub use error::{HarnessError, HarnessResult};
pub use executor::{capture_output, AbortReason, OutputHandler, StreamEnd, Termination};
pub use game::{
    play, play_observed, DisplayType, GameConfig, GameSession, IgnoreRounds, Launcher,
    RoundObserver,
};
pub use telemetry::{
    Action, Outcome, RoundRecord, RoundUpdate, Snapshot, Telemetry, TelemetryOptions,
    TelemetryState,
};
pub use token::{Boundary, Channel, Segmenter, Terminator, Token};
