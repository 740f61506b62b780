use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ordered_float::OrderedFloat;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use regex::Regex;

use super::encoding::{self, Encoding};
use super::expression::{split_arguments, Expression};
use super::numbers::{is_valid_length, parse_int, parse_number};
use super::{Dialect, PreprocessError};
use crate::diagnostics;
use crate::host::Host;

const MAX_INCLUDE_DEPTH: usize = 16;

fn is_track_section(name: &str) -> bool {
    name.eq_ignore_ascii_case("track") || name.eq_ignore_ascii_case("railway")
}

/// Splits source lines into expressions.
///
/// CSV lines are cut at commas outside parentheses. RW lines are only cut
/// inside the railway section; elsewhere a line is a single `key = value` row.
pub fn split_into_expressions(file: &Arc<PathBuf>, lines: &[String], dialect: Dialect) -> Vec<Expression> {
    let mut expressions = Vec::new();
    let mut rw_track_section = false;
    for (line_idx, line) in lines.iter().enumerate() {
        let chars: Vec<char> = line.chars().collect();
        let trimmed = line.trim();
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            let lead = chars.iter().take_while(|c| c.is_whitespace()).count();
            let header = Expression::new(file, line_idx + 1, lead + 1, trimmed);
            if let Some(name) = header.section_header() {
                rw_track_section = is_track_section(name);
            }
            expressions.push(header);
            continue;
        }

        let split = dialect == Dialect::Csv || rw_track_section;
        let mut pieces: Vec<(usize, usize)> = Vec::new();
        let mut start = 0;
        let mut depth = 0usize;
        for (i, &c) in chars.iter().enumerate() {
            match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if split && depth == 0 => {
                    pieces.push((start, i));
                    start = i + 1;
                }
                _ => {}
            }
        }
        pieces.push((start, chars.len()));

        for (a, b) in pieces {
            let piece = &chars[a..b];
            let lead = piece.iter().take_while(|c| c.is_whitespace()).count();
            let text: String = piece.iter().collect();
            let text = text.trim();
            if text.is_empty() || text.starts_with(';') {
                continue;
            }
            expressions.push(Expression::new(file, line_idx + 1, a + lead + 1, text));
        }
    }
    expressions
}

enum DirectiveFailure {
    /// The expression is dropped, compilation continues.
    Invalid(String),
    /// The expression list cannot be laid out.
    Fatal(String),
}

struct Conditional {
    expr: Expression,
    parent_active: bool,
    taken: bool,
    active: bool,
    seen_else: bool,
}

fn directive_re(pattern: &str) -> Result<Regex, PreprocessError> {
    Regex::new(pattern).map_err(|e| PreprocessError {
        file: String::new(),
        line: 0,
        column: 0,
        reason: format!("{:?}", e),
    })
}

/// Expands `$Chr`, `$Rnd`, `$Sub`, `$Include` and `$If`/`$Else`/`$EndIf`.
pub struct DirectiveExpander<'a> {
    dialect: Dialect,
    encoding: Encoding,
    rng: ChaCha8Rng,
    subs: HashMap<i64, String>,
    host: &'a mut dyn Host,
    inline_re: Regex,
    block_re: Regex,
    sub_def_re: Regex,
}

impl<'a> DirectiveExpander<'a> {
    pub fn new(dialect: Dialect, encoding: Encoding, seed: u64, host: &'a mut dyn Host)
               -> Result<Self, PreprocessError> {
        Ok(DirectiveExpander {
            dialect: dialect,
            encoding: encoding,
            rng: ChaCha8Rng::seed_from_u64(seed),
            subs: HashMap::new(),
            host: host,
            inline_re: directive_re(r"(?i)\$(chr|rnd|sub)\s*\(")?,
            block_re: directive_re(r"(?i)^\$(if|else|endif|include)\s*\(")?,
            sub_def_re: directive_re(r"(?i)^\$sub\s*\(([^()]*)\)\s*=(.*)$")?,
        })
    }

    pub fn expand(&mut self, expressions: Vec<Expression>) -> Result<Vec<Expression>, PreprocessError> {
        self.expand_at_depth(expressions, 0)
    }

    fn expand_at_depth(&mut self, expressions: Vec<Expression>, depth: usize)
                       -> Result<Vec<Expression>, PreprocessError> {
        let mut output = Vec::with_capacity(expressions.len());
        let mut stack: Vec<Conditional> = Vec::new();

        for expr in expressions {
            let active = stack.last().map(|c| c.active).unwrap_or(true);
            let text = expr.text.trim().to_string();

            if let Some(caps) = self.block_re.captures(&text) {
                let name = caps[1].to_ascii_lowercase();
                let open = caps.get(0).map(|m| m.end() - 1).unwrap_or(0);
                let close = match matching_close(&text, open) {
                    Some(c) if text[c + 1..].trim().is_empty() => c,
                    _ => return Err(PreprocessError::at(&expr, &format!(
                        "${} directive is not terminated by a closing parenthesis", caps[1].to_string()))),
                };
                let inner = text[open + 1..close].to_string();
                match name.as_str() {
                    "if" => {
                        let value = if active {
                            match self.expand_text(&inner) {
                                Ok(x) => match parse_number(&x) {
                                    Some(v) => v != 0.0,
                                    None => {
                                        diagnostics::error(self.host, &expr,
                                            format!("The $If condition \"{}\" is not a number", x));
                                        false
                                    }
                                },
                                Err(DirectiveFailure::Invalid(msg)) => {
                                    diagnostics::error(self.host, &expr, msg);
                                    false
                                }
                                Err(DirectiveFailure::Fatal(msg)) => return Err(PreprocessError::at(&expr, &msg)),
                            }
                        } else {
                            false
                        };
                        stack.push(Conditional {
                            expr: expr.clone(),
                            parent_active: active,
                            taken: value,
                            active: active && value,
                            seen_else: false,
                        });
                    }
                    "else" => {
                        let top = match stack.last_mut() {
                            Some(top) => top,
                            None => return Err(PreprocessError::at(&expr, "$Else without a preceding $If")),
                        };
                        if top.seen_else {
                            return Err(PreprocessError::at(&expr, "Duplicate $Else in the same $If block"));
                        }
                        top.seen_else = true;
                        top.active = top.parent_active && !top.taken;
                    }
                    "endif" => {
                        if stack.pop().is_none() {
                            return Err(PreprocessError::at(&expr, "$EndIf without a preceding $If"));
                        }
                    }
                    _ => {
                        if active {
                            let included = self.include(&expr, &inner, depth)?;
                            output.extend(included);
                        }
                    }
                }
                continue;
            }

            if !active {
                continue;
            }

            if let Some(caps) = self.sub_def_re.captures(&text) {
                let index = caps[1].to_string();
                let value = caps[2].trim().to_string();
                match (self.expand_text(&index), self.expand_text(&value)) {
                    (Err(DirectiveFailure::Fatal(msg)), _) | (_, Err(DirectiveFailure::Fatal(msg))) =>
                        return Err(PreprocessError::at(&expr, &msg)),
                    (Err(DirectiveFailure::Invalid(msg)), _) | (_, Err(DirectiveFailure::Invalid(msg))) =>
                        diagnostics::error(self.host, &expr, msg),
                    (Ok(index), Ok(value)) => match parse_int(&index) {
                        Some(i) if i >= 0 => { self.subs.insert(i, value); }
                        _ => diagnostics::error(self.host, &expr,
                                format!("Invalid $Sub index \"{}\"", index)),
                    },
                }
                continue;
            }

            match self.expand_text(&text) {
                Ok(expanded) => {
                    if !expanded.trim().is_empty() {
                        let mut e = expr;
                        e.text = expanded.trim().to_string();
                        output.push(e);
                    }
                }
                Err(DirectiveFailure::Invalid(msg)) => diagnostics::error(self.host, &expr, msg),
                Err(DirectiveFailure::Fatal(msg)) => return Err(PreprocessError::at(&expr, &msg)),
            }
        }

        if let Some(open) = stack.pop() {
            return Err(PreprocessError::at(&open.expr, "$If without a matching $EndIf"));
        }
        Ok(output)
    }

    /// Replaces inline directives, innermost first. Substituted values are
    /// not scanned again.
    fn expand_text(&mut self, text: &str) -> Result<String, DirectiveFailure> {
        let mut result = String::new();
        let mut rest = text;
        loop {
            let (start, open, name) = match self.inline_re.captures(rest) {
                Some(caps) => {
                    let (start, end) = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
                    (start, end - 1, caps[1].to_ascii_lowercase())
                }
                None => {
                    result.push_str(rest);
                    return Ok(result);
                }
            };
            let close = matching_close(rest, open).ok_or_else(|| DirectiveFailure::Fatal(
                format!("${} directive is not terminated by a closing parenthesis", name)))?;
            let inner = self.expand_text(&rest[open + 1..close])?;
            result.push_str(&rest[..start]);
            result.push_str(&self.evaluate(&name, &inner)?);
            rest = &rest[close + 1..];
        }
    }

    fn evaluate(&mut self, name: &str, argument: &str) -> Result<String, DirectiveFailure> {
        match name {
            "chr" => match parse_number(argument) {
                Some(x) if x.fract() == 0.0 && x >= 1.0 && x <= 127.0 => Ok(((x as u8) as char).to_string()),
                _ => Err(DirectiveFailure::Invalid(format!("Invalid character code \"{}\" in $Chr", argument))),
            },
            "rnd" => {
                let args = split_arguments(argument);
                let bounds = if args.len() == 2 {
                    match (parse_number(&args[0]), parse_number(&args[1])) {
                        (Some(a), Some(b)) if a.fract() == 0.0 && b.fract() == 0.0 && a <= b =>
                            Some((a as i64, b as i64)),
                        _ => None,
                    }
                } else {
                    None
                };
                match bounds {
                    Some((a, b)) => Ok(self.rng.gen_range(a..=b).to_string()),
                    None => Err(DirectiveFailure::Invalid(
                        format!("$Rnd expects two integers a;b with a <= b, found \"{}\"", argument))),
                }
            }
            _ => match parse_number(argument) {
                Some(x) if x.fract() == 0.0 => match self.subs.get(&(x as i64)) {
                    Some(value) => Ok(value.clone()),
                    None => Err(DirectiveFailure::Invalid(format!("$Sub({}) is not defined", argument))),
                },
                _ => Err(DirectiveFailure::Invalid(format!("Invalid $Sub index \"{}\"", argument))),
            },
        }
    }

    fn include(&mut self, expr: &Expression, argument: &str, depth: usize)
               -> Result<Vec<Expression>, PreprocessError> {
        let argument = match self.expand_text(argument) {
            Ok(a) => a,
            Err(DirectiveFailure::Invalid(msg)) => {
                diagnostics::error(self.host, expr, msg);
                return Ok(vec![]);
            }
            Err(DirectiveFailure::Fatal(msg)) => return Err(PreprocessError::at(expr, &msg)),
        };
        if depth >= MAX_INCLUDE_DEPTH {
            diagnostics::error(self.host, expr, format!(
                "$Include nesting is deeper than {} files", MAX_INCLUDE_DEPTH));
            return Ok(vec![]);
        }

        let args = split_arguments(&argument);
        let mut candidates: Vec<(String, f64)> = Vec::new();
        let mut i = 0;
        while i < args.len() {
            let weight = match args.get(i + 1) {
                Some(w) => match parse_number(w) {
                    Some(w) if w >= 0.0 => w,
                    _ => {
                        diagnostics::error(self.host, expr, format!("Invalid $Include weight \"{}\"", w));
                        return Ok(vec![]);
                    }
                },
                None => 1.0,
            };
            if !args[i].is_empty() {
                candidates.push((args[i].clone(), weight));
            }
            i += 2;
        }
        let total: f64 = candidates.iter().map(|c| c.1).sum();
        if candidates.is_empty() || total <= 0.0 {
            diagnostics::error(self.host, expr, "$Include names no file with a positive weight".to_string());
            return Ok(vec![]);
        }

        let mut pick = self.rng.gen_range(0.0..total);
        let mut chosen = &candidates[candidates.len() - 1].0;
        for (file, weight) in &candidates {
            if pick < *weight {
                chosen = file;
                break;
            }
            pick -= weight;
        }

        let base = expr.file.parent().unwrap_or_else(|| Path::new(""));
        let path = crate::compiler::resolve_path(base, chosen);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) => {
                diagnostics::error(self.host, expr, format!(
                    "The included file {} could not be read: {}", path.display(), e));
                return Ok(vec![]);
            }
        };
        debug!("including {}", path.display());
        let lines = encoding::split_lines(&encoding::decode(&bytes, self.encoding));
        let included = split_into_expressions(&Arc::new(path), &lines, self.dialect);
        self.expand_at_depth(included, depth + 1)
    }
}

/// Byte index of the `)` matching the `(` at byte index `open`.
fn matching_close(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Stable sort of each section run by the most recent track position marker.
pub fn sort_by_track_position(expressions: Vec<Expression>, unit_factors: &[f64], dialect: Dialect)
                              -> Vec<Expression> {
    let mut output = Vec::with_capacity(expressions.len());
    let mut run: Vec<(OrderedFloat<f64>, Expression)> = Vec::new();
    let mut position = OrderedFloat(std::f64::NEG_INFINITY);
    let mut numbers_allowed = dialect == Dialect::Csv;

    fn flush(run: &mut Vec<(OrderedFloat<f64>, Expression)>, output: &mut Vec<Expression>) {
        run.sort_by_key(|&(p, _)| p);
        output.extend(run.drain(..).map(|(_, e)| e));
    }

    for expr in expressions {
        if let Some(name) = expr.section_header() {
            if dialect == Dialect::Rw {
                numbers_allowed = is_track_section(name);
            }
            flush(&mut run, &mut output);
            position = OrderedFloat(std::f64::NEG_INFINITY);
            output.push(expr);
            continue;
        }
        if numbers_allowed && is_valid_length(expr.text.trim(), unit_factors) {
            if let Some(p) = super::numbers::parse_length(expr.text.trim(), unit_factors) {
                position = OrderedFloat(p);
            }
        }
        run.push((position, expr));
    }
    flush(&mut run, &mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CollectingHost;

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(|l| l.to_string()).collect()
    }

    fn file() -> Arc<PathBuf> {
        Arc::new(PathBuf::from("route.csv"))
    }

    fn texts(e: &[Expression]) -> Vec<String> {
        e.iter().map(|e| e.text.clone()).collect()
    }

    #[test]
    fn csv_splitting_keeps_columns() {
        let e = split_into_expressions(&file(), &lines("100, Track.Rail(1,2) ,;comment"), Dialect::Csv);
        assert_eq!(texts(&e), vec!["100", "Track.Rail(1,2)"]);
        assert_eq!((e[0].line, e[0].column), (1, 1));
        assert_eq!((e[1].line, e[1].column), (1, 6));
    }

    #[test]
    fn rw_splits_only_railway_rows() {
        let src = "[Route]\nComment = a, b\n[Railway]\n100, @Rail(1;2)";
        let e = split_into_expressions(&file(), &lines(src), Dialect::Rw);
        assert_eq!(texts(&e), vec!["[Route]", "Comment = a, b", "[Railway]", "100", "@Rail(1;2)"]);
    }

    #[test]
    fn chr_rnd_sub() {
        let mut host = CollectingHost::new();
        let src = "$Sub(1) = Track.Pitch\n$Sub(1) 5$Chr(48)\nTrack.Curve $Rnd(3;3)00";
        let e = split_into_expressions(&file(), &lines(src), Dialect::Csv);
        let out = DirectiveExpander::new(Dialect::Csv, Encoding::Utf8, 0, &mut host).unwrap().expand(e).unwrap();
        assert_eq!(texts(&out), vec!["Track.Pitch 50", "Track.Curve 300"]);
        assert!(host.messages.is_empty());
    }

    #[test]
    fn invalid_values_drop_the_expression() {
        let mut host = CollectingHost::new();
        let src = "a $Chr(300)\nb $Sub(9)\nc";
        let e = split_into_expressions(&file(), &lines(src), Dialect::Csv);
        let out = DirectiveExpander::new(Dialect::Csv, Encoding::Utf8, 0, &mut host).unwrap().expand(e).unwrap();
        assert_eq!(texts(&out), vec!["c"]);
        assert_eq!(host.errors().count(), 2);
    }

    #[test]
    fn conditionals() {
        let mut host = CollectingHost::new();
        let src = "$If(1)\na\n$If(0)\nb\n$Else()\nc\n$EndIf()\n$Else()\nd\n$EndIf()\ne";
        let e = split_into_expressions(&file(), &lines(src), Dialect::Csv);
        let out = DirectiveExpander::new(Dialect::Csv, Encoding::Utf8, 0, &mut host).unwrap().expand(e).unwrap();
        assert_eq!(texts(&out), vec!["a", "c", "e"]);
    }

    #[test]
    fn broken_structure_is_fatal() {
        for src in &["$If(1)\na", "$EndIf()", "$If(1)\n$Else()\n$Else()\n$EndIf()", "x $Chr(65"] {
            let mut host = CollectingHost::new();
            let e = split_into_expressions(&file(), &lines(src), Dialect::Csv);
            assert!(DirectiveExpander::new(Dialect::Csv, Encoding::Utf8, 0, &mut host).unwrap().expand(e).is_err(),
                    "{:?} should fail", src);
        }
    }

    #[test]
    fn rnd_is_repeatable_for_a_seed() {
        let run = |seed| {
            let mut host = CollectingHost::new();
            let e = split_into_expressions(&file(), &lines("$Rnd(1;1000)\n$Rnd(1;1000)"), Dialect::Csv);
            texts(&DirectiveExpander::new(Dialect::Csv, Encoding::Utf8, seed, &mut host).unwrap().expand(e).unwrap())
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn stable_sort_within_runs() {
        let src = "Track.A\n50\nTrack.B\n25\nTrack.C\n50\nTrack.D\n[Other]\n10\nX";
        let e = split_into_expressions(&file(), &lines(src), Dialect::Csv);
        let sorted = sort_by_track_position(e, &[1.0], Dialect::Csv);
        assert_eq!(texts(&sorted), vec!["Track.A", "25", "Track.C", "50", "Track.B", "50", "Track.D",
                                        "[Other]", "10", "X"]);
    }

    #[test]
    fn rw_numbers_outside_railway_are_not_markers() {
        let src = "[Signal]\n5\n1\n[Railway]\n20\n@A\n10\n@B";
        let e = split_into_expressions(&file(), &lines(src), Dialect::Rw);
        let sorted = sort_by_track_position(e, &[1.0], Dialect::Rw);
        assert_eq!(texts(&sorted), vec!["[Signal]", "5", "1", "[Railway]", "10", "@B", "20", "@A"]);
    }
}
