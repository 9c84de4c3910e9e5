use crate::token::Token;

/// Marker written to stderr once per round by the instrumented player code.
///
/// It only delimits rounds and must never occur in real diagnostic output.
pub const DIAGNOSTIC_SENTINEL: &str =
    "fDxIBRnzQAhqI2AkZihEFzPCh0LQta7d2dJ5heSWwwVqf3Z1RjX26Cvndv2srO2U";

/// Raw stderr of one game, split into rounds on demand.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticLog {
    text: String,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a token verbatim, terminator included.
    pub fn push(&mut self, token: &Token) {
        self.text.push_str(&token.raw());
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Text written after each sentinel, one entry per round.
    ///
    /// Whatever was printed before the first sentinel belongs to no round and
    /// is dropped.
    pub fn into_rounds(self) -> Vec<String> {
        self.text
            .split(DIAGNOSTIC_SENTINEL)
            .skip(1)
            .map(str::to_string)
            .collect()
    }
}
