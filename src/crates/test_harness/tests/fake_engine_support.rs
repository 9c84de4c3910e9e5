#![cfg(feature = "test-support")]
#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use bomberman_harness::telemetry::{BORDER_LINE, START_BANNER, WIN_BANNER_LINE};
use bomberman_harness::{GameConfig, Launcher};
use tempfile::TempDir;

pub fn fake_engine_path() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_fake_engine") {
        return PathBuf::from(path);
    }

    let mut path = std::env::current_exe().expect("current exe");
    path.pop(); // deps
    path.pop(); // debug or release
    path.push("fake_engine");
    if cfg!(windows) {
        path.set_extension("exe");
    }
    path
}

/// Builder for fake engine transcripts.
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn out(mut self, text: &str) -> Self {
        self.lines.push(format!("out {text}"));
        self
    }

    pub fn err(mut self, text: &str) -> Self {
        self.lines.push(format!("err {text}"));
        self
    }

    pub fn sentinel(mut self) -> Self {
        self.lines.push("sentinel".to_string());
        self
    }

    pub fn sleep(mut self, millis: u64) -> Self {
        self.lines.push(format!("sleep {millis}"));
        self
    }

    pub fn exit(mut self, code: i32) -> Self {
        self.lines.push(format!("exit {code}"));
        self
    }

    pub fn start(self) -> Self {
        self.out(&format!("{START_BANNER}Test Player"))
    }

    pub fn grid(mut self, rows: &[&str]) -> Self {
        self = self.out(BORDER_LINE);
        for row in rows {
            self = self.out(row);
        }
        self.out(BORDER_LINE)
    }

    /// Counters and action line closing one round.
    pub fn round(self, number: u32, bombs: u32, action: &str) -> Self {
        self.out(&format!("Rounds: {number}"))
            .out(&format!("RemainingBombs: {bombs}"))
            .out(&format!("Action is: {action}"))
    }

    pub fn render(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Two rounds, one wall broken, then a win.
pub fn winning_game() -> Transcript {
    Transcript::new()
        .err("loading level")
        .start()
        .sentinel()
        .err("round one")
        .grid(&["*@.=..=.%....E*"])
        .round(1, 3, "EAST")
        .sentinel()
        .err("round two")
        .grid(&["*.@...=.%....E*"])
        .round(2, 3, "WEST")
        .out("SCORE: 60")
        .out(WIN_BANNER_LINE)
}

/// Level directory holding one transcript per level.
pub struct Levels {
    pub dir: TempDir,
}

impl Levels {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn with_level(self, level: u32, transcript: &Transcript) -> Self {
        let path = self.path().join(format!("level{level}.map"));
        fs::write(path, transcript.render()).expect("write transcript");
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Game on `level` started directly, without a debugger.
    pub fn game(&self, level: u32) -> GameConfig {
        GameConfig::new(fake_engine_path(), self.path(), level)
            .with_launcher(Launcher::Direct)
            .with_seed(7)
    }
}
