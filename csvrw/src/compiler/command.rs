//! Turning one expression into something the passes can act on.

use smallvec::SmallVec;

use crate::diagnostics;
use crate::host::Host;
use crate::input::expression::{split_arguments, Arguments, Expression};
use crate::input::numbers::{parse_int, parse_length, parse_lenient};
use crate::input::Dialect;

pub type Indices = SmallVec<[i64; 2]>;

/// Normalized command: `Structure.Rail(3) rail.x` becomes namespace
/// `structure`, name `rail`, indices `[3]`, arguments `["rail.x"]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    /// Lower case. Signal commands live in the empty namespace.
    pub namespace: String,
    pub name: String,
    pub indices: Indices,
    pub arguments: Arguments,
    /// The unsplit argument text, for commands taking free text.
    pub raw_arguments: String,
}

impl Command {
    pub fn index(&self, i: usize) -> Option<i64> {
        self.indices.get(i).cloned()
    }

    pub fn argument(&self, i: usize) -> Option<&str> {
        self.arguments.get(i).map(|s| s.as_str()).filter(|s| !s.is_empty())
    }

    /// `namespace.name` as written in diagnostics.
    pub fn qualified_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Lenient numeric argument. Missing gives `default` silently, garbage
    /// gives `default` with an error.
    pub fn number(&self, i: usize, default: f64, what: &str, expr: &Expression, host: &mut dyn Host) -> f64 {
        match self.argument(i) {
            None => default,
            Some(a) => match parse_lenient(a) {
                Some(x) => x,
                None => {
                    diagnostics::error(host, expr, format!(
                        "{} is invalid in {}", what, self.qualified_name()));
                    default
                }
            },
        }
    }

    pub fn int(&self, i: usize, default: i64, what: &str, expr: &Expression, host: &mut dyn Host) -> i64 {
        match self.argument(i) {
            None => default,
            Some(a) => match parse_int(a) {
                Some(x) => x,
                None => {
                    diagnostics::error(host, expr, format!(
                        "{} is invalid in {}", what, self.qualified_name()));
                    default
                }
            },
        }
    }

    /// Non-negative index taken from the command indices.
    pub fn required_index(&self, i: usize, expr: &Expression, host: &mut dyn Host) -> Option<usize> {
        match self.index(i) {
            Some(x) if x >= 0 => Some(x as usize),
            Some(_) => {
                diagnostics::error(host, expr, format!(
                    "Index is expected to be non-negative in {}", self.qualified_name()));
                None
            }
            None => {
                diagnostics::error(host, expr, format!(
                    "An index is expected in {}", self.qualified_name()));
                None
            }
        }
    }

    pub fn unsupported(&self, expr: &Expression, host: &mut dyn Host) {
        diagnostics::warning(host, expr, format!("The command {} is not supported", self.qualified_name()));
    }
}

/// The active `[section]` and whether bare commands get it as prefix.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scope {
    pub section: String,
    pub always_prefix: bool,
}

impl Scope {
    pub fn enter_header(&mut self, name: &str) {
        self.section = if name.eq_ignore_ascii_case("object") {
            "Structure".to_string()
        } else if name.eq_ignore_ascii_case("railway") {
            "Track".to_string()
        } else {
            name.to_string()
        };
        self.always_prefix = true;
    }

    pub fn is_track(&self) -> bool {
        self.section.eq_ignore_ascii_case("track")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Interpretation {
    /// A header or `With`; the scope has been updated.
    Scope,
    Position { value: f64, has_arguments: bool },
    Command(Command),
}

/// Interprets an expression under the current scope. The error is the
/// diagnostic text for a malformed command.
pub fn interpret(expr: &Expression, scope: &mut Scope, dialect: Dialect, unit_factors: &[f64])
                 -> Result<Interpretation, String> {
    if let Some(name) = expr.section_header() {
        scope.enter_header(name);
        return Ok(Interpretation::Scope);
    }

    let (command, raw_arguments) = expr.separate_command_and_arguments();
    let number_check = dialect == Dialect::Csv || scope.is_track();
    if number_check {
        if let Some(value) = parse_length(&command, unit_factors) {
            return Ok(Interpretation::Position { value, has_arguments: !raw_arguments.is_empty() });
        }
    }

    let arguments = split_arguments(&raw_arguments);
    if command.eq_ignore_ascii_case("with") {
        scope.section = arguments.get(0).cloned().unwrap_or_default();
        scope.always_prefix = false;
        return Ok(Interpretation::Scope);
    }

    let mut name = apply_aliases(&prefix_command(&command, scope));
    let indices = find_indices(&mut name)?;
    let (namespace, name) = match name.find('.') {
        Some(p) => (name[..p].to_string(), name[p + 1..].to_string()),
        None => (String::new(), name),
    };
    let namespace = if namespace.starts_with("signal") { String::new() } else { namespace };

    Ok(Interpretation::Command(Command {
        namespace: namespace,
        name: name,
        indices: indices,
        arguments: arguments,
        raw_arguments: raw_arguments,
    }))
}

/// Applies the scope prefix and lower-cases. `.void` parts are dropped.
fn prefix_command(command: &str, scope: &Scope) -> String {
    let command = command.to_ascii_lowercase();
    let section = scope.section.to_ascii_lowercase();
    let prefixed = if command.starts_with('.') {
        format!("{}{}", section, command)
    } else if scope.always_prefix && !command.starts_with(&format!("{}.", section)) {
        format!("{}.{}", section, command)
    } else {
        command
    };
    prefixed.replace(".void", "")
}

fn strip_suffix<'a>(c: &'a str, suffix: &str) -> Option<&'a str> {
    if c.ends_with(suffix) { Some(c[..c.len() - suffix.len()].trim_end()) } else { None }
}

/// Rewrites legacy spellings to the canonical command. The first matching
/// rule wins; a remaining `texture.` root then becomes `structure.`.
pub fn apply_aliases(c: &str) -> String {
    let rewritten = alias(c).unwrap_or_else(|| c.to_string());
    if rewritten.starts_with("texture.") {
        format!("structure.{}", &rewritten["texture.".len()..])
    } else {
        rewritten
    }
}

fn alias(c: &str) -> Option<String> {
    const BACKGROUNDS: [&str; 3] = ["texture.background", "structure.background", "structure.back"];

    if c.starts_with("structure") && !c.starts_with("structure.back") {
        if let Some(s) = strip_suffix(c, ".load") { return Some(s.to_string()); }
    }
    for prefix in BACKGROUNDS.iter() {
        if !c.starts_with(prefix) {
            continue;
        }
        let rest = &c[prefix.len()..];
        if let Some(index) = strip_suffix(rest, ".load") {
            return Some(format!("texture.background{}", index));
        }
        if let Some(index) = strip_suffix(rest, ".x") {
            return Some(format!("texture.background.x{}", index));
        }
        if let Some(index) = strip_suffix(rest, ".aspect") {
            return Some(format!("texture.background.aspect{}", index));
        }
        break;
    }
    if c.starts_with("cycle") {
        if let Some(s) = strip_suffix(c, ".params") { return Some(s.to_string()); }
    }
    if c.starts_with("signal") {
        if let Some(s) = strip_suffix(c, ".load") { return Some(s.to_string()); }
    }
    if c.starts_with("train.run") || c.starts_with("train.flange") || c.starts_with("route.signal") {
        if let Some(s) = strip_suffix(c, ".set") { return Some(s.to_string()); }
    }
    if c.starts_with("train.timetable") {
        let rest = &c["train.timetable".len()..];
        for &(suffix, canonical) in &[(".day.load", "day"), (".night.load", "night"),
                                      (".day", "day"), (".night", "night")] {
            if let Some(index) = strip_suffix(rest, suffix) {
                return Some(format!("train.timetable.{}{}", canonical, index.trim()));
            }
        }
    }
    if c.starts_with("route.runinterval") {
        return Some(format!("train.interval{}", &c["route.runinterval".len()..]));
    }
    if c.starts_with("train.gauge") {
        return Some(format!("route.gauge{}", &c["train.gauge".len()..]));
    }
    None
}

/// Removes the first parenthesized group from the command and parses it as
/// `;`-separated integer indices.
fn find_indices(command: &mut String) -> Result<Indices, String> {
    let open = match command.find('(') {
        Some(o) => o,
        None => return Ok(SmallVec::new()),
    };
    let close = match command[open..].find(')') {
        Some(c) => open + c,
        None => return Err(format!("Invalid index in command {}", command)),
    };
    let mut indices = SmallVec::new();
    for part in command[open + 1..close].split(';') {
        match parse_int(part) {
            Some(i) => indices.push(i),
            None => return Err(format!("Invalid index \"{}\" in command {}", part.trim(), command)),
        }
    }
    let rest = command[close + 1..].to_string();
    command.truncate(open);
    command.push_str(rest.trim());
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn command(text: &str, scope: &mut Scope) -> Command {
        let e = Expression::new(&Arc::new(PathBuf::from("t.csv")), 1, 1, text);
        match interpret(&e, scope, Dialect::Csv, &[1.0]).unwrap() {
            Interpretation::Command(c) => c,
            x => panic!("not a command: {:?}", x),
        }
    }

    fn parts(c: &Command) -> (String, String, Vec<i64>, Vec<String>) {
        (c.namespace.clone(), c.name.clone(), c.indices.to_vec(), c.arguments.to_vec())
    }

    #[test]
    fn aliases() {
        assert_eq!(apply_aliases("structure.rail(0).load"), "structure.rail(0)");
        assert_eq!(apply_aliases("texture.background(1).load"), "structure.background(1)");
        assert_eq!(apply_aliases("texture.background(1).x"), "structure.background.x(1)");
        assert_eq!(apply_aliases("structure.back(1).aspect"), "structure.background.aspect(1)");
        assert_eq!(apply_aliases("structure.background(1).x"), "structure.background.x(1)");
        assert_eq!(apply_aliases("cycle.ground(2).params"), "cycle.ground(2)");
        assert_eq!(apply_aliases("signal(3).load"), "signal(3)");
        assert_eq!(apply_aliases("train.run(1).set"), "train.run(1)");
        assert_eq!(apply_aliases("route.signal(2).set"), "route.signal(2)");
        assert_eq!(apply_aliases("train.timetable(0).day.load"), "train.timetable.day(0)");
        assert_eq!(apply_aliases("train.timetable(1).night"), "train.timetable.night(1)");
        assert_eq!(apply_aliases("route.runinterval"), "train.interval");
        assert_eq!(apply_aliases("train.gauge"), "route.gauge");
        assert_eq!(apply_aliases("texture.ground(0)"), "structure.ground(0)");
    }

    #[test]
    fn load_suffix_is_optional() {
        let mut scope = Scope::default();
        let a = command("Signal(1).Load(sig.csv)", &mut scope);
        let b = command("Signal(1)(sig.csv)", &mut scope);
        let c = command("signal(1) sig.csv", &mut scope);
        assert_eq!(parts(&a), parts(&b));
        assert_eq!(parts(&a), parts(&c));
        assert_eq!(parts(&a), ("".to_string(), "signal".to_string(), vec![1], vec!["sig.csv".to_string()]));
    }

    #[test]
    fn section_prefixes() {
        let mut scope = Scope::default();
        scope.enter_header("Railway");
        let c = command("Rail(1;3.8)", &mut scope);
        assert_eq!(parts(&c), ("track".to_string(), "rail".to_string(), vec![], vec!["1".to_string(), "3.8".to_string()]));
        let c = command("Track.Rail(1)", &mut scope);
        assert_eq!((c.namespace.as_str(), c.name.as_str()), ("track", "rail"));

        let e = Expression::new(&Arc::new(PathBuf::from("t.csv")), 1, 1, "With Structure");
        assert_eq!(interpret(&e, &mut scope, Dialect::Csv, &[1.0]).unwrap(), Interpretation::Scope);
        assert!(!scope.always_prefix);
        let c = command(".Rail(2) r.x", &mut scope);
        assert_eq!(parts(&c), ("structure".to_string(), "rail".to_string(), vec![2], vec!["r.x".to_string()]));
        let c = command("Options.BlockLength 50", &mut scope);
        assert_eq!(c.namespace, "options");
    }

    #[test]
    fn void_is_removed() {
        let mut scope = Scope::default();
        scope.enter_header("Signal");
        let c = command(".Void(4) signal", &mut scope);
        assert_eq!(parts(&c), ("".to_string(), "signal".to_string(), vec![4], vec!["signal".to_string()]));
    }

    #[test]
    fn positions() {
        let mut scope = Scope::default();
        let e = Expression::new(&Arc::new(PathBuf::from("t.csv")), 1, 1, "1:250");
        assert_eq!(interpret(&e, &mut scope, Dialect::Csv, &[1000.0, 1.0]).unwrap(),
                   Interpretation::Position { value: 1250.0, has_arguments: false });
        let e = Expression::new(&Arc::new(PathBuf::from("t.csv")), 1, 1, "25 x");
        assert_eq!(interpret(&e, &mut scope, Dialect::Csv, &[1.0]).unwrap(),
                   Interpretation::Position { value: 25.0, has_arguments: true });
    }

    #[test]
    fn two_indices() {
        let mut scope = Scope::default();
        let c = command("Structure.Pole(1;2) pole.csv", &mut scope);
        assert_eq!(c.indices.to_vec(), vec![1, 2]);
        let e = Expression::new(&Arc::new(PathBuf::from("t.csv")), 1, 1, "Structure.Rail(x) r.x");
        assert!(interpret(&e, &mut scope, Dialect::Csv, &[1.0]).is_err());
    }
}
