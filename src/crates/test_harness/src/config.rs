use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::token::Boundary;

/// Process-level configuration for one execution session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Program to spawn.
    pub program: PathBuf,
    /// Arguments passed through to the program.
    pub args: Vec<String>,
    /// Text written to stdin once, before any output is read.
    pub stdin_preamble: String,
    /// Wall-clock limit after which the process is killed.
    pub deadline: Option<Duration>,
    /// Deliver stderr tokens as if they came from stdout.
    pub merge_output: bool,
    /// Extra environment variables applied to the child process.
    pub env: BTreeMap<String, String>,
    /// Optional working directory override for the child process.
    pub working_directory: Option<PathBuf>,
    /// Token boundary predicate shared by both readers.
    pub boundary: Boundary,
    /// How long the timeout path keeps draining already-buffered output.
    pub drain_grace: Duration,
}

impl EngineConfig {
    /// Create a new config targeting a specific program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin_preamble: String::new(),
            deadline: None,
            merge_output: false,
            env: BTreeMap::new(),
            working_directory: None,
            boundary: Boundary::lines(),
            drain_grace: Duration::from_millis(250),
        }
    }

    /// Add a passthrough CLI argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add several passthrough CLI arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Text written to the child's stdin right after spawning.
    pub fn with_stdin(mut self, preamble: impl Into<String>) -> Self {
        self.stdin_preamble = preamble.into();
        self
    }

    /// Kill the process once `deadline` has elapsed.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Report stderr output on the stdout channel.
    pub fn with_merged_output(mut self, merged: bool) -> Self {
        self.merge_output = merged;
        self
    }

    /// Add an environment variable override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Override the working directory for the spawned process.
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Replace the default line-based token boundary.
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    /// Override how long buffered output is drained after a timeout kill.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }
}
