#![cfg(unix)]

use std::process::ExitStatus;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use bomberman_harness::executor::run;
use bomberman_harness::{
    capture_output, AbortReason, Boundary, Channel, EngineConfig, HarnessError, OutputHandler,
    Termination, Terminator, Token,
};

#[derive(Debug, Default)]
struct Collected {
    stdout: Vec<Token>,
    stderr: Vec<Token>,
    status: Option<ExitStatus>,
}

impl Collected {
    fn stdout_text(&self) -> Vec<&str> {
        self.stdout.iter().map(|token| token.text.as_str()).collect()
    }
}

/// Records everything it sees and counts terminal calls.
#[derive(Default)]
struct Recorder {
    collected: Collected,
    terminal_calls: Arc<AtomicUsize>,
}

impl OutputHandler for Recorder {
    type Output = Collected;

    fn on_token(&mut self, channel: Channel, token: Token) {
        match channel {
            Channel::Stdout => self.collected.stdout.push(token),
            Channel::Stderr => self.collected.stderr.push(token),
        }
    }

    fn on_finish(mut self, status: Option<ExitStatus>) -> Collected {
        self.terminal_calls.fetch_add(1, Ordering::SeqCst);
        self.collected.status = status;
        self.collected
    }

    fn on_timeout(self) -> Collected {
        self.terminal_calls.fetch_add(1, Ordering::SeqCst);
        self.collected
    }
}

fn shell(script: &str) -> EngineConfig {
    EngineConfig::new("/bin/sh").with_arg("-c").with_arg(script)
}

#[test]
fn tokens_carry_their_terminator() {
    let termination = run(&shell(r"printf 'a\nb\rc'"), Recorder::default()).expect("spawn");

    let Termination::Finished(collected) = termination else {
        panic!("expected the process to finish");
    };
    assert_eq!(
        collected.stdout,
        vec![
            Token::new("a", Terminator::Lf),
            Token::new("b", Terminator::Cr),
            Token::new("c", Terminator::EndOfStream),
        ]
    );
    assert!(collected.status.is_some_and(|status| status.success()));
}

#[test]
fn preamble_is_written_to_stdin_then_closed() {
    let config = EngineConfig::new("cat").with_stdin("hello\nworld\n");

    let termination = run(&config, Recorder::default()).expect("spawn");

    assert!(!termination.is_timed_out());
    assert_eq!(termination.into_inner().stdout_text(), vec!["hello", "world"]);
}

#[test]
fn channels_stay_separate_unless_merged() {
    let script = "echo out; echo err 1>&2";

    let separate = run(&shell(script), Recorder::default()).expect("spawn").into_inner();
    assert_eq!(separate.stdout_text(), vec!["out"]);
    assert_eq!(separate.stderr, vec![Token::line("err")]);

    let merged = run(&shell(script).with_merged_output(true), Recorder::default())
        .expect("spawn")
        .into_inner();
    let mut texts = merged.stdout_text();
    texts.sort_unstable();
    assert_eq!(texts, vec!["err", "out"]);
    assert!(merged.stderr.is_empty());
}

#[test]
fn environment_and_working_directory_are_applied() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = shell("echo \"$HARNESS_VALUE\"; pwd")
        .with_env("HARNESS_VALUE", "forty-two")
        .with_working_directory(dir.path());

    let collected = run(&config, Recorder::default()).expect("spawn").into_inner();

    let canonical = dir.path().canonicalize().expect("canonical tempdir");
    assert_eq!(collected.stdout_text()[0], "forty-two");
    assert_eq!(
        std::path::Path::new(collected.stdout_text()[1]).canonicalize().expect("pwd exists"),
        canonical
    );
}

#[test]
fn large_preamble_into_an_echoing_child_still_meets_the_deadline() {
    // Far more than the pipe buffers hold, echoed back before it is all written.
    let config = shell("cat; exec sleep 5")
        .with_stdin("x\n".repeat(1 << 20))
        .with_deadline(Duration::from_millis(1_500));
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let termination = run(&config, Recorder::default()).expect("spawn");
        let _ = tx.send(termination.abort_reason());
    });

    let reason = rx
        .recv_timeout(Duration::from_secs(10))
        .expect("run should return once the deadline elapses");
    assert_eq!(reason, AbortReason::TimeLimit);
}

#[test]
fn deadline_kills_a_silent_process() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = Recorder {
        terminal_calls: Arc::clone(&calls),
        ..Recorder::default()
    };
    let started = Instant::now();

    let termination = run(
        &shell("echo first; exec sleep 5").with_deadline(Duration::from_millis(300)),
        handler,
    )
    .expect("spawn");

    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(termination.abort_reason(), AbortReason::TimeLimit);
    assert_eq!(termination.value().stdout_text(), vec!["first"]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn pending_bytes_are_flushed_after_a_kill() {
    let termination = run(
        &shell("printf partial; exec sleep 5").with_deadline(Duration::from_millis(300)),
        Recorder::default(),
    )
    .expect("spawn");

    assert!(termination.is_timed_out());
    assert_eq!(
        termination.into_inner().stdout,
        vec![Token::new("partial", Terminator::EndOfStream)]
    );
}

#[test]
fn closing_output_early_does_not_escape_the_deadline() {
    let started = Instant::now();

    let termination = run(
        &shell("exec >&- 2>&-; sleep 5").with_deadline(Duration::from_millis(300)),
        Recorder::default(),
    )
    .expect("spawn");

    assert!(termination.is_timed_out());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[test]
fn finishing_fires_exactly_one_terminal_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = Recorder {
        terminal_calls: Arc::clone(&calls),
        ..Recorder::default()
    };

    let termination = run(
        &shell("exit 3").with_deadline(Duration::from_secs(5)),
        handler,
    )
    .expect("spawn");

    assert_eq!(termination.abort_reason(), AbortReason::None);
    assert_eq!(termination.value().status.and_then(|status| status.code()), Some(3));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn custom_boundary_applies_to_both_channels() {
    let config = shell("printf 'a;b;'; printf 'x;y' 1>&2")
        .with_boundary(Boundary::new(|_, byte| byte == b';'));

    let collected = run(&config, Recorder::default()).expect("spawn").into_inner();

    assert_eq!(collected.stdout_text(), vec!["a", "b"]);
    assert_eq!(collected.stdout[0].terminator, Terminator::Other(b';'));
    assert_eq!(
        collected.stderr,
        vec![
            Token::new("x", Terminator::Other(b';')),
            Token::new("y", Terminator::EndOfStream),
        ]
    );
}

#[test]
fn missing_program_is_a_start_error() {
    let err = run(&EngineConfig::new("/nonexistent/bomberman"), Recorder::default())
        .err()
        .expect("spawn must fail");

    match err {
        HarnessError::EngineStart { program, .. } => {
            assert_eq!(program, std::path::PathBuf::from("/nonexistent/bomberman"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn capture_output_returns_both_streams() {
    let text = capture_output(&shell("echo version 1.2; echo warning 1>&2")).expect("spawn");

    assert!(text.contains("version 1.2\n"));
    assert!(text.contains("warning\n"));
}
