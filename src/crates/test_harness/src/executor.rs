use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::token::{Boundary, Channel, Segmenter, Token};

const EXIT_POLL: Duration = Duration::from_millis(10);

/// Why a session was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    None,
    TimeLimit,
}

/// How a reader thread stopped.
///
/// A failed read is handled exactly like end of stream. The distinct code only
/// exists so it can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Eof,
    Failed(ErrorKind),
}

/// Terminal event of one execution session.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination<T> {
    /// The process exited or closed its output on its own.
    Finished(T),
    /// The deadline elapsed and the process was killed.
    TimedOut(T),
}

impl<T> Termination<T> {
    pub fn value(&self) -> &T {
        match self {
            Termination::Finished(value) | Termination::TimedOut(value) => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Termination::Finished(value) | Termination::TimedOut(value) => value,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Termination::TimedOut(_))
    }

    pub fn abort_reason(&self) -> AbortReason {
        match self {
            Termination::Finished(_) => AbortReason::None,
            Termination::TimedOut(_) => AbortReason::TimeLimit,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Termination<U> {
        match self {
            Termination::Finished(value) => Termination::Finished(f(value)),
            Termination::TimedOut(value) => Termination::TimedOut(f(value)),
        }
    }
}

/// Consumer of the tokens produced by a running process.
///
/// The terminal methods take `self`, so a handler can only ever be finished or
/// timed out, never both.
pub trait OutputHandler {
    type Output;

    fn on_token(&mut self, channel: Channel, token: Token);

    fn on_finish(self, status: Option<ExitStatus>) -> Self::Output;

    fn on_timeout(self) -> Self::Output;
}

enum ReaderEvent {
    Token(Channel, Token),
    Closed(Channel, StreamEnd),
}

/// Spawn the configured process and feed its output to `handler` until it
/// exits or the deadline elapses.
///
/// Failing to spawn is the only error. Everything that happens afterwards is
/// reported through the handler.
pub fn run<H: OutputHandler>(
    config: &EngineConfig,
    handler: H,
) -> HarnessResult<Termination<H::Output>> {
    let execution = Execution::spawn(config)?;
    Ok(execution.drive(handler))
}

/// Run a short-lived command and return its merged stdout/stderr text.
///
/// Without an explicit deadline the command is given one second.
pub fn capture_output(config: &EngineConfig) -> HarnessResult<String> {
    let mut config = config.clone().with_merged_output(true);
    if config.deadline.is_none() {
        config.deadline = Some(Duration::from_secs(1));
    }
    let termination = run(&config, CapturedText::default())?;
    Ok(termination.into_inner())
}

#[derive(Default)]
struct CapturedText(String);

impl OutputHandler for CapturedText {
    type Output = String;

    fn on_token(&mut self, _channel: Channel, token: Token) {
        self.0.push_str(&token.raw());
    }

    fn on_finish(self, _status: Option<ExitStatus>) -> String {
        self.0
    }

    fn on_timeout(self) -> String {
        self.0
    }
}

struct Execution {
    program: PathBuf,
    child: Child,
    events: mpsc::Receiver<ReaderEvent>,
    open_readers: usize,
    deadline: Option<Instant>,
    drain_grace: Duration,
}

impl Execution {
    fn spawn(config: &EngineConfig) -> HarnessResult<Self> {
        let mut cmd = Command::new(&config.program);
        cmd.args(&config.args);
        if let Some(dir) = &config.working_directory {
            cmd.current_dir(dir);
        }
        cmd.envs(&config.env);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|err| HarnessError::engine_start(&config.program, err.to_string()))?;
        let started = Instant::now();
        debug!(
            program = %config.program.display(),
            pid = child.id(),
            "spawned engine process"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::engine_start(&config.program, "failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| HarnessError::engine_start(&config.program, "failed to capture stderr"))?;

        let stderr_as = if config.merge_output {
            Channel::Stdout
        } else {
            Channel::Stderr
        };
        let (tx, events) = mpsc::channel();
        spawn_reader(stdout, Channel::Stdout, Channel::Stdout, config.boundary.clone(), tx.clone());
        spawn_reader(stderr, Channel::Stderr, stderr_as, config.boundary.clone(), tx);

        // Readers must be draining before the preamble goes out, or an echoing
        // child can block on a full pipe while we block on its stdin.
        if let Some(stdin) = child.stdin.take() {
            spawn_writer(stdin, config.stdin_preamble.clone(), config.program.clone());
        }

        Ok(Self {
            program: config.program.clone(),
            child,
            events,
            open_readers: 2,
            deadline: config.deadline.map(|limit| started + limit),
            drain_grace: config.drain_grace,
        })
    }

    fn drive<H: OutputHandler>(mut self, mut handler: H) -> Termination<H::Output> {
        while self.open_readers > 0 {
            let event = match self.deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match self.events.recv_timeout(remaining) {
                        Ok(event) => event,
                        Err(RecvTimeoutError::Timeout) => return self.time_out(handler),
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.events.recv() {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };
            self.dispatch(event, &mut handler);
        }

        // Output is closed but the process may still be running.
        let status = match self.deadline {
            Some(deadline) => loop {
                match self.child.try_wait() {
                    Ok(Some(status)) => break Some(status),
                    Ok(None) if Instant::now() >= deadline => return self.time_out(handler),
                    Ok(None) => thread::sleep(EXIT_POLL),
                    Err(err) => {
                        warn!(program = %self.program.display(), error = %err, "failed to poll engine exit");
                        break None;
                    }
                }
            },
            None => match self.child.wait() {
                Ok(status) => Some(status),
                Err(err) => {
                    warn!(program = %self.program.display(), error = %err, "failed to wait for engine");
                    None
                }
            },
        };

        debug!(program = %self.program.display(), ?status, "engine finished");
        Termination::Finished(handler.on_finish(status))
    }

    fn time_out<H: OutputHandler>(mut self, mut handler: H) -> Termination<H::Output> {
        info!(program = %self.program.display(), "deadline elapsed, killing engine");
        if let Err(err) = self.child.kill() {
            debug!(error = %err, "engine already gone when killed");
        }

        // Whatever was already written to the pipes still gets parsed.
        let grace_end = Instant::now() + self.drain_grace;
        while self.open_readers > 0 {
            let remaining = grace_end.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) => self.dispatch(event, &mut handler),
                Err(_) => break,
            }
        }
        let _ = self.child.wait();

        Termination::TimedOut(handler.on_timeout())
    }

    fn dispatch<H: OutputHandler>(&mut self, event: ReaderEvent, handler: &mut H) {
        match event {
            ReaderEvent::Token(channel, token) => handler.on_token(channel, token),
            ReaderEvent::Closed(source, end) => {
                self.open_readers = self.open_readers.saturating_sub(1);
                match end {
                    StreamEnd::Eof => debug!(?source, "output channel closed"),
                    StreamEnd::Failed(kind) => {
                        warn!(?source, ?kind, "output channel failed, treating as end of stream")
                    }
                }
            }
        }
    }
}

fn spawn_writer(mut stdin: ChildStdin, preamble: String, program: PathBuf) {
    thread::spawn(move || {
        if preamble.is_empty() {
            return;
        }
        let written = stdin
            .write_all(preamble.as_bytes())
            .and_then(|()| stdin.flush());
        if let Err(err) = written {
            warn!(program = %program.display(), error = %err, "failed to write stdin preamble");
        }
        // Dropping stdin closes it.
    });
}

fn spawn_reader<R: Read + Send + 'static>(
    mut reader: R,
    source: Channel,
    deliver_as: Channel,
    boundary: Boundary,
    tx: mpsc::Sender<ReaderEvent>,
) {
    thread::spawn(move || {
        let mut segmenter = Segmenter::new(boundary);
        let mut buf = [0u8; 4096];
        let end = loop {
            match reader.read(&mut buf) {
                Ok(0) => break StreamEnd::Eof,
                Ok(read) => {
                    for &byte in &buf[..read] {
                        if let Some(token) = segmenter.push(byte) {
                            if tx.send(ReaderEvent::Token(deliver_as, token)).is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => break StreamEnd::Failed(err.kind()),
            }
        };

        if let Some(token) = segmenter.finish() {
            let _ = tx.send(ReaderEvent::Token(deliver_as, token));
        }
        let _ = tx.send(ReaderEvent::Closed(source, end));
    });
}
