use std::fmt;
use std::sync::Arc;

/// Origin stream of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Stdout,
    Stderr,
}

/// The unit that closed a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    Lf,
    Cr,
    /// Any other byte accepted by a custom [`Boundary`].
    Other(u8),
    /// The stream ended before a terminator was seen.
    EndOfStream,
}

impl Terminator {
    fn from_byte(byte: u8) -> Self {
        match byte {
            b'\n' => Terminator::Lf,
            b'\r' => Terminator::Cr,
            other => Terminator::Other(other),
        }
    }

    /// The terminator as text, empty for [`Terminator::EndOfStream`].
    pub fn to_text(&self) -> String {
        match self {
            Terminator::Lf => "\n".to_string(),
            Terminator::Cr => "\r".to_string(),
            Terminator::Other(byte) => String::from_utf8_lossy(&[*byte]).into_owned(),
            Terminator::EndOfStream => String::new(),
        }
    }
}

/// One terminator-delimited unit of process output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub terminator: Terminator,
}

impl Token {
    pub fn new(text: impl Into<String>, terminator: Terminator) -> Self {
        Self {
            text: text.into(),
            terminator,
        }
    }

    /// Shorthand for a line closed by `\n`.
    pub fn line(text: impl Into<String>) -> Self {
        Self::new(text, Terminator::Lf)
    }

    /// Text with its terminator re-appended.
    pub fn raw(&self) -> String {
        let mut raw = self.text.clone();
        raw.push_str(&self.terminator.to_text());
        raw
    }
}

/// Predicate deciding whether the next byte closes the pending token.
///
/// The predicate sees the bytes buffered so far and the incoming byte. It is
/// shared between the reader threads of a session.
#[derive(Clone)]
pub struct Boundary(Arc<dyn Fn(&[u8], u8) -> bool + Send + Sync>);

impl Boundary {
    pub fn new(predicate: impl Fn(&[u8], u8) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Split on `\n` and `\r`.
    pub fn lines() -> Self {
        Self::new(|_, byte| byte == b'\n' || byte == b'\r')
    }

    pub fn is_boundary(&self, pending: &[u8], next: u8) -> bool {
        (self.0)(pending, next)
    }
}

impl Default for Boundary {
    fn default() -> Self {
        Self::lines()
    }
}

impl fmt::Debug for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Boundary(..)")
    }
}

/// Incremental splitter for one output channel.
#[derive(Debug)]
pub struct Segmenter {
    boundary: Boundary,
    pending: Vec<u8>,
}

impl Segmenter {
    pub fn new(boundary: Boundary) -> Self {
        Self {
            boundary,
            pending: Vec::new(),
        }
    }

    /// Feed one byte, returning the completed token if it was a boundary.
    pub fn push(&mut self, byte: u8) -> Option<Token> {
        if self.boundary.is_boundary(&self.pending, byte) {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            Some(Token::new(text, Terminator::from_byte(byte)))
        } else {
            self.pending.push(byte);
            None
        }
    }

    /// Flush whatever is buffered as a final [`Terminator::EndOfStream`] token.
    pub fn finish(&mut self) -> Option<Token> {
        if self.pending.is_empty() {
            return None;
        }
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(Token::new(text, Terminator::EndOfStream))
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new(Boundary::lines())
    }
}
