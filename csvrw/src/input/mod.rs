//! Reading route files: decoding, splitting into expressions, directive
//! expansion and sorting by track position.

pub mod encoding;
pub mod expression;
pub mod numbers;
pub mod preprocess;

use std::str::FromStr;

/// The two command languages a route may be written in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// Comma separated, dotted namespaces (`Track.Rail 1;2`).
    Csv,
    /// Legacy row syntax with `[Section]` headers and `key = value` rows.
    Rw,
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::Csv
    }
}

impl FromStr for Dialect {
    type Err = String;
    fn from_str(s: &str) -> Result<Dialect, String> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Dialect::Csv),
            "rw" => Ok(Dialect::Rw),
            x => Err(format!("unknown dialect \"{}\"", x)),
        }
    }
}

/// Broken directive structure; the expression list cannot be laid out.
#[derive(Debug, Fail)]
#[fail(display = "{} at line {}, column {} in file {}", reason, line, column, file)]
pub struct PreprocessError {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub reason: String,
}

impl PreprocessError {
    pub fn at(expr: &expression::Expression, reason: &str) -> Self {
        PreprocessError {
            file: expr.file.display().to_string(),
            line: expr.line,
            column: expr.column,
            reason: reason.to_string(),
        }
    }
}
