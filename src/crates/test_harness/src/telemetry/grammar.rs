use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;

use super::Action;

/// Last line of the "Game Over" banner art printed when the player dies.
pub const LOSS_BANNER_LINE: &str = r" \____/\__,_|_| |_| |_|\___|  \___/  \_/ \___|_|   ";

/// Last line of the "Congratulations!" banner art printed on a win.
pub const WIN_BANNER_LINE: &str =
    r" \____/\___/|_| |_|\__, |_|  \__,_|\__|\__,_|_|\__,_|\__|_|\___/|_| |_|___(_)";

/// Banner printed by the engine right before the first grid.
pub const START_BANNER: &str = "Artificial Intelligence by ";

/// Grid border: fifteen wall tiles on a line of their own.
pub const BORDER_LINE: &str = "***************";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    Crash,
    Start,
    StackFrame,
    Rounds,
    Action,
    RemainingBombs,
    Loss,
    Win,
    Score,
    Border,
}

/// A recognized line of engine output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Marker<'a> {
    Crash { signal: &'a str },
    Start,
    StackFrame { function: &'a str },
    Rounds(u32),
    Action(Action),
    RemainingBombs(u32),
    Loss,
    Win,
    Score(u32),
    Border,
}

struct Grammar {
    ansi: Regex,
    rules: Vec<(RuleKind, Regex)>,
}

impl Grammar {
    fn compile() -> Self {
        // Rule order is significant: the first matching rule wins.
        let table = [
            (RuleKind::Crash, r"^Program received signal ([A-Z]*).*$"),
            (RuleKind::Start, r"^Artificial Intelligence by .*$"),
            (RuleKind::StackFrame, r"^0[xX][0-9a-fA-F]+\s+in\s+(.*)\s\(\)$"),
            (RuleKind::Rounds, r"^Rounds: (\d+)$"),
            (
                RuleKind::Action,
                r"^Action is: (BOMBING|NORTH|EAST|SOUTH|WEST)$",
            ),
            (RuleKind::RemainingBombs, r"^RemainingBombs: (\d+)$"),
            (
                RuleKind::Loss,
                r"^\s*\\____/\\__,_\|_\| \|_\| \|_\|\\___\|  \\___/  \\_/ \\___\|_\|\s*$",
            ),
            (
                RuleKind::Win,
                r"^\s*\\____/\\___/\|_\| \|_\|\\__, \|_\|  \\__,_\|\\__\|\\__,_\|_\|\\__,_\|\\__\|_\|\\___/\|_\| \|_\|___\(_\)$",
            ),
            (RuleKind::Score, r"^.*SCORE: (\d+)\s*$"),
            (RuleKind::Border, r"^\*{15}$"),
        ];

        Self {
            ansi: Regex::new(r"\x1b\[[;\d]*[a-zA-Z]").expect("ansi pattern compiles"),
            rules: table
                .into_iter()
                .map(|(kind, pattern)| {
                    (kind, Regex::new(pattern).expect("grammar pattern compiles"))
                })
                .collect(),
        }
    }
}

fn grammar() -> &'static Grammar {
    static GRAMMAR: OnceLock<Grammar> = OnceLock::new();
    GRAMMAR.get_or_init(Grammar::compile)
}

/// Remove terminal color and cursor escape sequences.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    grammar().ansi.replace_all(text, "")
}

/// Match a stripped line against the rule table, first match wins.
///
/// A rule whose capture does not convert (a counter that overflows, say) is
/// skipped as if it had not matched.
pub(crate) fn classify(line: &str) -> Option<Marker<'_>> {
    for (kind, pattern) in &grammar().rules {
        let Some(captures) = pattern.captures(line) else {
            continue;
        };
        let group = captures.get(1).map(|m| m.as_str()).unwrap_or("");
        let marker = match kind {
            RuleKind::Crash => Some(Marker::Crash { signal: group }),
            RuleKind::Start => Some(Marker::Start),
            RuleKind::StackFrame => Some(Marker::StackFrame { function: group }),
            RuleKind::Rounds => group.parse().ok().map(Marker::Rounds),
            RuleKind::Action => group.parse().ok().map(Marker::Action),
            RuleKind::RemainingBombs => group.parse().ok().map(Marker::RemainingBombs),
            RuleKind::Loss => Some(Marker::Loss),
            RuleKind::Win => Some(Marker::Win),
            RuleKind::Score => group.parse().ok().map(Marker::Score),
            RuleKind::Border => Some(Marker::Border),
        };
        if marker.is_some() {
            return marker;
        }
    }
    None
}
