use crate::diagnostics;
use crate::host::Host;
use crate::input::expression::Expression;
use crate::input::numbers::parse_lenient;

use super::command::Command;
use super::tables::RouteTables;
use super::{resolve_path, Paths};

pub fn handle(cmd: &Command, expr: &Expression, tables: &mut RouteTables, paths: &Paths, host: &mut dyn Host) {
    let speed_unit = tables.options.unit_of_speed;
    let train = &mut tables.train;
    match cmd.name.as_str() {
        "folder" | "file" => match cmd.argument(0) {
            Some(f) => train.folder = Some(f.to_string()),
            None => diagnostics::error(host, expr, format!("FolderName is expected in {}", cmd.qualified_name())),
        },
        "run" | "rail" | "flange" => {
            let rail_type = match cmd.required_index(0, expr, host) {
                Some(i) => i,
                None => return,
            };
            let sound = cmd.int(0, 0, "SoundIndex", expr, host);
            if sound < 0 {
                diagnostics::error(host, expr, format!("SoundIndex is expected to be non-negative in {}", cmd.qualified_name()));
                return;
            }
            let map = if cmd.name == "flange" { &mut train.flange_sounds } else { &mut train.run_sounds };
            map.insert(rail_type, sound as usize);
        }
        "timetable.day" | "timetable.night" => {
            let index = match cmd.required_index(0, expr, host) {
                Some(i) => i,
                None => return,
            };
            let file = match cmd.argument(0) {
                Some(f) => resolve_path(&paths.objects, f),
                None => {
                    diagnostics::error(host, expr, format!("FileName is expected in {}", cmd.qualified_name()));
                    return;
                }
            };
            match host.load_texture(&file) {
                Ok(texture) => {
                    let map = if cmd.name == "timetable.day" { &mut train.day_timetables } else { &mut train.night_timetables };
                    map.insert(index, texture);
                }
                Err(e) => diagnostics::error(host, expr, format!("Could not load {}: {}", file.display(), e)),
            }
        }
        "velocity" => {
            let speed = cmd.number(0, 0.0, "Speed", expr, host);
            train.max_ai_speed = if speed <= 0.0 { None } else { Some(speed * speed_unit) };
        }
        "interval" => {
            let mut intervals = Vec::with_capacity(cmd.arguments.len());
            for (i, a) in cmd.arguments.iter().enumerate() {
                match parse_lenient(a) {
                    Some(x) if x > 0.0 => intervals.push(x),
                    _ => diagnostics::error(host, expr, format!("Interval{} is invalid in {}", i, cmd.qualified_name())),
                }
            }
            train.intervals = intervals;
        }
        _ => cmd.unsupported(expr, host),
    }
}
