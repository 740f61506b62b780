use crate::diagnostics;
use crate::host::Host;
use crate::input::expression::Expression;
use crate::input::numbers::parse_lenient;
use crate::input::Dialect;

use super::command::{interpret, Command, Interpretation, Scope};
use super::tables::{CantBehavior, FogBehavior, ObjectVisibility, RouteOptions, SectionBehavior};

/// Reads every `options.*` command ahead of sorting, which needs the unit
/// of length to recognize track positions.
pub fn scan(expressions: &[Expression], dialect: Dialect, host: &mut dyn Host) -> RouteOptions {
    let mut options = RouteOptions::default();
    let mut scope = Scope::default();
    for expr in expressions {
        let mut expr = expr.clone();
        if dialect == Dialect::Rw && expr.section_header().is_none() {
            expr.convert_rw_to_csv(&scope.section, scope.always_prefix);
        }
        let unit_factors = options.unit_of_length.clone();
        match interpret(&expr, &mut scope, dialect, &unit_factors) {
            Ok(Interpretation::Command(ref cmd)) if cmd.namespace == "options" => {
                handle(cmd, &expr, &mut options, host)
            }
            // Malformed commands are reported by the first pass.
            _ => {}
        }
    }
    debug!("options: {:?}", options);
    options
}

fn flag(cmd: &Command, what: &str, expr: &Expression, host: &mut dyn Host) -> Option<bool> {
    match cmd.int(0, 0, what, expr, host) {
        0 => Some(false),
        1 => Some(true),
        _ => {
            diagnostics::error(host, expr, format!("{} is expected to be either 0 or 1 in {}",
                                                   what, cmd.qualified_name()));
            None
        }
    }
}

pub fn handle(cmd: &Command, expr: &Expression, options: &mut RouteOptions, host: &mut dyn Host) {
    match cmd.name.as_str() {
        "unitoflength" => {
            if cmd.arguments.is_empty() {
                diagnostics::error(host, expr, "At least one argument is expected in options.unitoflength".to_string());
                return;
            }
            let mut factors = Vec::with_capacity(cmd.arguments.len());
            for (i, a) in cmd.arguments.iter().enumerate() {
                let default = if i + 1 == cmd.arguments.len() { 1.0 } else { 0.0 };
                match parse_lenient(a) {
                    Some(f) if f > 0.0 => factors.push(f),
                    None if a.is_empty() => factors.push(default),
                    _ => {
                        diagnostics::error(host, expr, format!(
                            "FactorInMeters{} is invalid in options.unitoflength", i));
                        factors.push(default);
                    }
                }
            }
            options.unit_of_length = factors;
        }
        "unitofspeed" => {
            let factor = cmd.number(0, 1.0, "FactorInKmph", expr, host);
            if factor <= 0.0 {
                diagnostics::error(host, expr, "FactorInKmph is expected to be positive in options.unitofspeed".to_string());
            } else {
                options.unit_of_speed = factor / 3.6;
            }
        }
        "blocklength" => {
            let unit = options.unit_of_length.last().cloned().unwrap_or(1.0);
            let length = cmd.number(0, 25.0, "Length", expr, host) * unit;
            if length <= 0.0 {
                diagnostics::error(host, expr, "Length is expected to be positive in options.blocklength".to_string());
            } else {
                options.block_interval = length;
            }
        }
        "objectvisibility" => if let Some(f) = flag(cmd, "Mode", expr, host) {
            options.object_visibility = if f { ObjectVisibility::TrackBased } else { ObjectVisibility::Legacy };
        },
        "sectionbehavior" => if let Some(f) = flag(cmd, "Mode", expr, host) {
            options.section_behavior = if f { SectionBehavior::Simplified } else { SectionBehavior::Default };
        },
        "cantbehavior" => if let Some(f) = flag(cmd, "Mode", expr, host) {
            options.cant_behavior = if f { CantBehavior::Signed } else { CantBehavior::Unsigned };
        },
        "fogbehavior" => if let Some(f) = flag(cmd, "Mode", expr, host) {
            options.fog_behavior = if f { FogBehavior::Interpolated } else { FogBehavior::BlockBased };
        },
        "compatibletransparency" => if let Some(f) = flag(cmd, "Mode", expr, host) {
            options.compatible_transparency = f;
        },
        "enablebvetshacks" => if let Some(f) = flag(cmd, "Mode", expr, host) {
            options.enable_bve_ts_hacks = f;
        },
        _ => cmd.unsupported(expr, host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CollectingHost;
    use crate::input::preprocess::split_into_expressions;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn scan_str(src: &str, dialect: Dialect) -> (RouteOptions, CollectingHost) {
        let lines: Vec<String> = src.lines().map(|l| l.to_string()).collect();
        let e = split_into_expressions(&Arc::new(PathBuf::from("r.csv")), &lines, dialect);
        let mut host = CollectingHost::new();
        (scan(&e, dialect, &mut host), host)
    }

    #[test]
    fn units() {
        let (o, host) = scan_str("Options.UnitOfLength 1000;1\nOptions.UnitOfSpeed 1.609\nOptions.BlockLength 50", Dialect::Csv);
        assert!(host.messages.is_empty());
        assert_eq!(o.unit_of_length, vec![1000.0, 1.0]);
        assert!((o.unit_of_speed - 1.609 / 3.6).abs() < 1e-12);
        assert_eq!(o.block_interval, 50.0);
    }

    #[test]
    fn rw_options_section() {
        let (o, _) = scan_str("[Options]\nBlockLength = 20\nCantBehavior = 1", Dialect::Rw);
        assert_eq!(o.block_interval, 20.0);
        assert_eq!(o.cant_behavior, CantBehavior::Signed);
    }

    #[test]
    fn bad_flags_keep_defaults() {
        let (o, host) = scan_str("Options.FogBehavior 3\nOptions.Unknown 1", Dialect::Csv);
        assert_eq!(o.fog_behavior, FogBehavior::BlockBased);
        assert_eq!(host.errors().count(), 1);
        assert_eq!(host.warnings().count(), 1);
    }
}
