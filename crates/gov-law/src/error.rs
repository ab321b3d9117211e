//! Error types for the rule language.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed law text.
///
/// `line` is 1-based; `0` means the problem is about the text as a whole
/// (for example a missing `scope:` line), in which case `text` is empty.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", render_parse_error(*.line, .text, .reason))]
pub struct ParseError {
    /// 1-based line number, or 0 for whole-text errors.
    pub line: usize,
    /// The offending line, trimmed.
    pub text: String,
    /// What is wrong.
    pub reason: String,
}

impl ParseError {
    /// An error attached to a specific line.
    pub fn at(line: usize, text: &str, reason: impl Into<String>) -> Self {
        Self {
            line,
            text: text.trim().to_string(),
            reason: reason.into(),
        }
    }

    /// An error about the text as a whole.
    pub fn whole(reason: impl Into<String>) -> Self {
        Self {
            line: 0,
            text: String::new(),
            reason: reason.into(),
        }
    }
}

fn render_parse_error(line: usize, text: &str, reason: &str) -> String {
    if line == 0 {
        format!("law text: {reason}")
    } else {
        format!("line {line}: {reason} (in `{text}`)")
    }
}

/// A condition expression that cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    /// A character that starts no token.
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar {
        /// Offending character.
        ch: char,
        /// Byte offset.
        offset: usize,
    },

    /// A quoted string without its closing quote.
    #[error("unterminated string starting at offset {0}")]
    UnterminatedString(usize),

    /// A numeric literal that does not parse.
    #[error("invalid number \"{0}\"")]
    InvalidNumber(String),

    /// A token where the grammar does not allow one.
    #[error("unexpected {found} at token {index}")]
    UnexpectedToken {
        /// Description of the token.
        found: String,
        /// Token index.
        index: usize,
    },

    /// Input ended where more was required.
    #[error("unexpected end of expression")]
    UnexpectedEnd,

    /// An identifier outside the variable namespace.
    #[error("unknown variable \"{0}\"")]
    UnknownVariable(String),

    /// Nesting of parentheses and `not` beyond the supported depth.
    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Failure to load law text.
#[derive(Error, Debug)]
pub enum LawSourceError {
    /// No law is known under the identifier.
    #[error("law not found: {0}")]
    NotFound(String),

    /// The identifier cannot name a law file.
    #[error("invalid law identifier \"{0}\"")]
    InvalidId(String),

    /// Reading the law file failed.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that could not be read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Failure to assemble a law book. Always a configuration-time error.
#[derive(Error, Debug)]
pub enum LawBookError {
    /// The source could not supply the text.
    #[error(transparent)]
    Source(#[from] LawSourceError),

    /// The text did not parse.
    #[error("law {id}: {error}")]
    Parse {
        /// Identifier requested from the source.
        id: String,
        /// Parse failure.
        #[source]
        error: ParseError,
    },

    /// The text's header names a different law than requested.
    #[error("requested law {requested} but text declares {declared}")]
    IdMismatch {
        /// Identifier requested from the source.
        requested: String,
        /// Identifier in the law header.
        declared: String,
    },

    /// Two laws with the same identifier.
    #[error("duplicate law {0}")]
    Duplicate(String),
}
