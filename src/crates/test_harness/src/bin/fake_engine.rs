//! Stand-in for the compiled engine, used by the integration tests.
//!
//! Accepts the engine's own arguments (`-delay <ms> -debug off -display <mode>
//! <map>`) but treats the map file as a transcript to replay. Each transcript
//! line is a directive:
//!
//! - `out <text>`: line on stdout (`\e` becomes an escape character)
//! - `err <text>`: line on stderr
//! - `sentinel`: the per-round diagnostic sentinel on stderr, no newline
//! - `partial <text>`: stdout text without a newline
//! - `sleep <ms>`: pause
//! - `exit <code>`: stop with that exit code

use std::env;
use std::fs;
use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use bomberman_harness::DIAGNOSTIC_SENTINEL;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let transcript_path = args.last().ok_or("missing map argument")?;
    let transcript = fs::read_to_string(transcript_path)?;

    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();

    for line in transcript.lines() {
        let (directive, rest) = line.split_once(' ').unwrap_or((line, ""));
        match directive {
            "out" => {
                writeln!(stdout, "{}", rest.replace("\\e", "\u{1b}"))?;
                stdout.flush()?;
            }
            "partial" => {
                write!(stdout, "{rest}")?;
                stdout.flush()?;
            }
            "err" => {
                writeln!(stderr, "{rest}")?;
                stderr.flush()?;
            }
            "sentinel" => {
                write!(stderr, "{DIAGNOSTIC_SENTINEL}")?;
                stderr.flush()?;
            }
            "sleep" => {
                let millis: u64 = rest.trim().parse()?;
                thread::sleep(Duration::from_millis(millis));
            }
            "exit" => {
                let code: i32 = rest.trim().parse()?;
                std::process::exit(code);
            }
            "" => {}
            other => return Err(format!("unknown directive {other:?}").into()),
        }
    }

    Ok(())
}
