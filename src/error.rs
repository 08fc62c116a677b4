//! Error types shared by the machine and the assembler.

use std::fmt::{self, Display};
use std::io;

use nom::error::ErrorKind;

use crate::segments::{Handle, SegmentError};

/// A program image could not be turned into segment 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// The image length is not a multiple of four bytes.
    MalformedImage {
        /// Length of the rejected image in bytes.
        length: usize,
    },
}

impl Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ImageError::MalformedImage { length } => write!(
                f,
                "malformed program image: {} bytes is not a whole number of 32-bit words",
                length,
            ),
        }
    }
}

impl std::error::Error for ImageError {}

/// The reason a machine stopped abnormally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultKind {
    /// The opcode field held a value outside `0..=13`.
    IllegalOpcode(u32),

    /// A segment operation named a handle that is vacant or was never issued.
    InvalidHandle(Handle),

    /// A word index at or past the end of a segment, including a fetch past the end of segment 0.
    OutOfBounds {
        handle: Handle,
        index: u32,
        size: usize,
    },

    /// The program unmapped a handle that is already vacant.
    DoubleUnmap(Handle),

    /// The program tried to unmap segment 0.
    ProtectedSegment,

    /// The divide instruction was given a zero divisor.
    DivisionByZero,

    /// The host could not provide the words of a segment the program asked for.
    OutOfMemory {
        size: usize,
    },

    /// Reading from or writing to the host streams failed.
    Io(io::ErrorKind),
}

impl From<SegmentError> for FaultKind {
    fn from(err: SegmentError) -> FaultKind {
        match err {
            SegmentError::InvalidHandle(handle) => FaultKind::InvalidHandle(handle),
            SegmentError::DoubleUnmap(handle) => FaultKind::DoubleUnmap(handle),
            SegmentError::ProtectedSegment => FaultKind::ProtectedSegment,
            SegmentError::OutOfBounds { handle, index, size } => {
                FaultKind::OutOfBounds { handle, index, size }
            }
            SegmentError::OutOfMemory { size } => FaultKind::OutOfMemory { size },
        }
    }
}

impl From<io::Error> for FaultKind {
    fn from(err: io::Error) -> FaultKind {
        FaultKind::Io(err.kind())
    }
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FaultKind::IllegalOpcode(op) => write!(f, "illegal opcode {}", op),
            FaultKind::InvalidHandle(handle) => write!(f, "segment {} is not mapped", handle),
            FaultKind::OutOfBounds { handle, index, size } => write!(
                f,
                "word {} is out of bounds for segment {} of {} words",
                index, handle, size,
            ),
            FaultKind::DoubleUnmap(handle) => write!(f, "segment {} is already unmapped", handle),
            FaultKind::ProtectedSegment => write!(f, "segment 0 cannot be unmapped"),
            FaultKind::DivisionByZero => write!(f, "division by zero"),
            FaultKind::OutOfMemory { size } => {
                write!(f, "out of memory mapping a segment of {} words", size)
            }
            FaultKind::Io(kind) => write!(f, "host i/o failed: {:?}", kind),
        }
    }
}

/// A terminal machine fault, with the location it happened at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Why the machine stopped.
    pub kind: FaultKind,

    /// Address of the instruction that faulted.
    pub pc: u32,

    /// The raw instruction word, if the fetch itself succeeded.
    pub word: Option<u32>,
}

impl Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.word {
            Some(word) => write!(f, "at pc {} (0x{:08x}): {}", self.pc, word, self.kind),
            None => write!(f, "at pc {}: {}", self.pc, self.kind),
        }
    }
}

impl std::error::Error for Fault {}

#[derive(Debug, Clone)]
enum Reason<Kind> {
    Incomplete,
    Context(&'static str),
    Nom(ErrorKind),
    Other(Kind),
}

impl<Kind: Display> Display for Reason<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reason::Incomplete => write!(f, "expected more input"),
            Reason::Context(ctx) => write!(f, "invalid {}", ctx),
            Reason::Nom(kind) => write!(f, "unexpected input ({})", kind.description()),
            Reason::Other(kind) => Display::fmt(kind, f),
        }
    }
}

/// Parse failure holding the reason and the input that was left unconsumed.
///
/// The innermost reason comes first. Use [ParseError::verbose] to get a line and a column.
#[derive(Debug, Clone)]
pub struct ParseError<Kind> {
    stack: Vec<(String, Reason<Kind>)>,
}

impl<Kind> ParseError<Kind> {
    pub(crate) fn from_kind(rest: &str, kind: Kind) -> ParseError<Kind> {
        ParseError {
            stack: vec![(rest.to_string(), Reason::Other(kind))],
        }
    }

    pub(crate) fn incomplete() -> ParseError<Kind> {
        ParseError {
            stack: vec![(String::new(), Reason::Incomplete)],
        }
    }

    /// The crate specific reason of the error, if it wasn't a plain syntax error.
    pub fn kind(&self) -> Option<&Kind> {
        self.stack.iter().find_map(|(_, reason)| match reason {
            Reason::Other(kind) => Some(kind),
            _ => None,
        })
    }

    /// Locates the error inside the original source.
    ///
    /// # Parameters
    /// - `input`: The complete source that was given to the parser.
    pub fn verbose(self, input: &str) -> VerboseParseError<'_, Kind> {
        let (rest, reason) = self
            .stack
            .into_iter()
            .next()
            .unwrap_or((String::new(), Reason::Incomplete));

        let start = input.len().saturating_sub(rest.len());
        let consumed = &input[..start];

        let line = consumed.matches('\n').count() + 1;
        let column = consumed
            .rfind('\n')
            .map(|nl| consumed.len() - nl)
            .unwrap_or(consumed.len() + 1);

        let snippet = input[start..]
            .lines()
            .next()
            .unwrap_or("");

        VerboseParseError {
            line,
            column,
            reason,
            snippet,
        }
    }
}

impl<Kind: Display> Display for ParseError<Kind> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.stack.first() {
            Some((rest, reason)) => {
                let snippet: String = rest
                    .chars()
                    .take_while(|c| *c != '\n')
                    .take(20)
                    .collect();

                write!(f, "{} at '{}'", reason, snippet)
            }
            None => write!(f, "unknown parse error"),
        }
    }
}

impl<Kind: Display + fmt::Debug> std::error::Error for ParseError<Kind> {}

impl<Kind> nom::error::ParseError<&str> for ParseError<Kind> {
    fn from_error_kind(input: &str, kind: ErrorKind) -> Self {
        ParseError {
            stack: vec![(input.to_string(), Reason::Nom(kind))],
        }
    }

    fn append(input: &str, kind: ErrorKind, mut other: Self) -> Self {
        other.stack.push((input.to_string(), Reason::Nom(kind)));
        other
    }

    fn add_context(input: &str, ctx: &'static str, mut other: Self) -> Self {
        other.stack.push((input.to_string(), Reason::Context(ctx)));
        other
    }
}

/// A [ParseError] resolved against its source: line and column are 1-based.
#[derive(Debug, Clone)]
pub struct VerboseParseError<'a, Kind> {
    /// The line number of the error location.
    pub line: usize,
    /// The column number of the error location.
    pub column: usize,
    reason: Reason<Kind>,
    snippet: &'a str,
}

impl<'a, Kind: Display> Display for VerboseParseError<'a, Kind> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {} col {}: {}, at '{}'", self.line, self.column, self.reason, self.snippet)
    }
}
