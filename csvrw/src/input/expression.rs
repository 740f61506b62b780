use std::path::PathBuf;
use std::sync::Arc;
use smallvec::SmallVec;

use super::numbers::parse_number;

pub type Arguments = SmallVec<[String; 4]>;

/// One unit of route source with its provenance.
#[derive(Clone, Debug, PartialEq)]
pub struct Expression {
    pub file: Arc<PathBuf>,
    pub line: usize,
    pub column: usize,
    pub text: String,
}

impl Expression {
    pub fn new(file: &Arc<PathBuf>, line: usize, column: usize, text: &str) -> Self {
        Expression {
            file: file.clone(),
            line: line,
            column: column,
            text: text.to_string(),
        }
    }

    /// The section name if this expression is a `[section]` header.
    pub fn section_header(&self) -> Option<&str> {
        let t = self.text.trim();
        if t.len() >= 2 && t.starts_with('[') && t.ends_with(']') {
            Some(t[1..t.len() - 1].trim())
        } else {
            None
        }
    }

    /// Rewrites legacy RW syntax into CSV syntax, in place.
    ///
    /// `@Command(args)` loses its `@`, and `key = value` becomes
    /// `key value`. Numeric keys in the cycle and signal sections get the
    /// implicit command name those sections use.
    pub fn convert_rw_to_csv(&mut self, section: &str, always_prefix: bool) {
        let mut text = self.text.trim();
        if text.starts_with('@') {
            text = text[1..].trim_start();
        }
        let converted = match find_at_depth_zero(text, |c| c == '=') {
            Some(eq) => {
                let key = text[..eq].trim();
                let value = text[eq + 1..].trim();
                let key = if always_prefix && parse_number(key).is_some() {
                    if section.eq_ignore_ascii_case("cycle") {
                        format!(".Ground({})", key)
                    } else if section.eq_ignore_ascii_case("signal") {
                        format!(".Void({})", key)
                    } else {
                        key.to_string()
                    }
                } else {
                    key.to_string()
                };
                if value.is_empty() { key } else { format!("{} {}", key, value) }
            }
            None => text.to_string(),
        };
        self.text = converted;
    }

    /// Splits the text into the command part and the raw argument sequence.
    ///
    /// Arguments follow the first whitespace outside parentheses, or, when
    /// there is none, they are the content of a trailing parenthesized group.
    pub fn separate_command_and_arguments(&self) -> (String, String) {
        let text = self.text.trim();
        if let Some(ws) = find_at_depth_zero(text, |c| c.is_whitespace()) {
            let command = text[..ws].trim_end();
            let mut arguments = text[ws..].trim();
            if arguments.starts_with('(') && arguments.ends_with(')')
                && matching_open(arguments) == Some(0) {
                arguments = arguments[1..arguments.len() - 1].trim();
            }
            return (command.to_string(), arguments.to_string());
        }
        if text.ends_with(')') {
            if let Some(open) = matching_open(text) {
                if open > 0 {
                    return (text[..open].trim_end().to_string(),
                            text[open + 1..text.len() - 1].trim().to_string());
                }
            }
        }
        (text.to_string(), String::new())
    }
}

/// Byte index of the first char matching `f` at parenthesis depth 0.
fn find_at_depth_zero<F: Fn(char) -> bool>(text: &str, f: F) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if depth == 0 && f(c) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Byte index of the `(` matching the final `)` of `text`.
fn matching_open(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices().rev() {
        match c {
            ')' => depth += 1,
            '(' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits an argument sequence on `;` and `,`.
pub fn split_arguments(sequence: &str) -> Arguments {
    let sequence = sequence.trim();
    if sequence.is_empty() {
        return SmallVec::new();
    }
    sequence.split(|c| c == ';' || c == ',').map(|a| a.trim().to_string()).collect()
}
