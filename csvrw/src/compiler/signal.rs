use crate::diagnostics;
use crate::host::Host;
use crate::input::expression::Expression;

use super::command::Command;
use super::tables::{RouteTables, SignalDefinition};
use super::{resolve_path, Paths};

/// Commands of the empty namespace: `signal(i) file[;glow]`.
pub fn handle(cmd: &Command, expr: &Expression, tables: &mut RouteTables, paths: &Paths, host: &mut dyn Host) {
    if cmd.name != "signal" {
        cmd.unsupported(expr, host);
        return;
    }
    let index = match cmd.required_index(0, expr, host) {
        Some(i) => i,
        None => return,
    };
    let file = match cmd.argument(0) {
        Some(f) => f,
        None => {
            diagnostics::error(host, expr, "SignalFileWithoutExtension is expected in signal".to_string());
            return;
        }
    };

    let definition = if file.to_ascii_lowercase().ends_with(".animated") {
        if cmd.argument(1).is_some() {
            diagnostics::warning(host, expr, "GlowFileWithoutExtension is ignored for animated signals".to_string());
        }
        let path = resolve_path(&paths.objects, file);
        match host.load_object(&path) {
            Ok(object) => SignalDefinition::Animated(object),
            Err(e) => {
                diagnostics::error(host, expr, format!("Could not load {}: {}", path.display(), e));
                return;
            }
        }
    } else {
        let glow = match cmd.argument(1) {
            Some(g) => {
                let path = resolve_path(&paths.objects, g);
                match host.load_object(&path) {
                    Ok(object) => Some(object),
                    Err(e) => {
                        diagnostics::error(host, expr, format!("Could not load {}: {}", path.display(), e));
                        None
                    }
                }
            }
            None => None,
        };
        SignalDefinition::Textured { base: resolve_path(&paths.objects, file), glow: glow }
    };
    tables.signals.0.insert(index, definition);
}
