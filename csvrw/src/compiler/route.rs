use crate::diagnostics;
use crate::host::Host;
use crate::input::expression::Expression;
use crate::input::numbers::parse_time;

use super::command::Command;
use super::tables::RouteTables;
use super::{resolve_path, Paths};

fn color(cmd: &Command, expr: &Expression, host: &mut dyn Host, default: [u8; 3]) -> [u8; 3] {
    let mut c = default;
    for i in 0..3 {
        let x = cmd.int(i, default[i] as i64, "Color component", expr, host);
        if x < 0 || x > 255 {
            diagnostics::error(host, expr, format!(
                "Color component {} is expected to be in the range from 0 to 255 in {}", i, cmd.qualified_name()));
        }
        c[i] = x.max(0).min(255) as u8;
    }
    c
}

pub fn handle(cmd: &Command, expr: &Expression, tables: &mut RouteTables, paths: &Paths, host: &mut dyn Host) {
    let length_unit = tables.options.unit_of_length.last().cloned().unwrap_or(1.0);
    let speed_unit = tables.options.unit_of_speed;
    let route = &mut tables.route;
    match cmd.name.as_str() {
        "comment" => route.comment = cmd.raw_arguments.clone(),
        "image" => match cmd.argument(0) {
            Some(f) => route.image = Some(resolve_path(&paths.route, f)),
            None => diagnostics::error(host, expr, "FileName is expected in route.image".to_string()),
        },
        "timetable" => route.timetable = cmd.raw_arguments.clone(),
        "change" => {
            let mode = cmd.int(0, 0, "Mode", expr, host);
            if mode < -1 || mode > 1 {
                diagnostics::error(host, expr, "Mode is expected to be -1, 0 or 1 in route.change".to_string());
            } else {
                route.change = mode;
            }
        }
        "gauge" => {
            let mm = cmd.number(0, 1435.0, "ValueInMillimeters", expr, host);
            if mm <= 0.0 {
                diagnostics::error(host, expr, "ValueInMillimeters is expected to be positive in route.gauge".to_string());
            } else {
                route.gauge = 0.001 * mm;
            }
        }
        "signal" => {
            let aspect = match cmd.required_index(0, expr, host) {
                Some(a) => a,
                None => return,
            };
            if cmd.argument(0).is_none() {
                diagnostics::error(host, expr, "Speed is expected in route.signal".to_string());
                return;
            }
            let speed = cmd.number(0, 0.0, "Speed", expr, host);
            if speed < 0.0 {
                diagnostics::error(host, expr, "Speed is expected to be non-negative in route.signal".to_string());
            } else {
                let speed = if speed == 0.0 { std::f64::INFINITY } else { speed * speed_unit };
                route.signal_speeds.insert(aspect, speed);
            }
        }
        "accelerationduetogravity" => {
            let g = cmd.number(0, 9.80665, "Value", expr, host);
            if g <= 0.0 {
                diagnostics::error(host, expr, "Value is expected to be positive in route.accelerationduetogravity".to_string());
            } else {
                route.acceleration_due_to_gravity = g;
            }
        }
        "elevation" => route.elevation = cmd.number(0, 0.0, "Height", expr, host) * length_unit,
        "temperature" => {
            let t = cmd.number(0, 20.0, "ValueInCelsius", expr, host);
            if t <= -273.15 {
                diagnostics::error(host, expr, "ValueInCelsius is expected to be greater than -273.15 in route.temperature".to_string());
            } else {
                route.temperature = t;
            }
        }
        "pressure" => {
            let p = cmd.number(0, 101.325, "ValueInKPa", expr, host);
            if p <= 0.0 {
                diagnostics::error(host, expr, "ValueInKPa is expected to be positive in route.pressure".to_string());
            } else {
                route.pressure = p;
            }
        }
        "displayspeed" => match (cmd.argument(0), cmd.argument(1)) {
            (Some(unit), Some(_)) => {
                let factor = cmd.number(1, 1.0, "ConversionFactor", expr, host);
                route.display_speed = Some((unit.to_string(), factor));
            }
            _ => diagnostics::error(host, expr, "Unit and ConversionFactor are expected in route.displayspeed".to_string()),
        },
        "loadingscreen" => match cmd.argument(0) {
            Some(f) => route.loading_screen = Some(resolve_path(&paths.route, f)),
            None => diagnostics::error(host, expr, "FileName is expected in route.loadingscreen".to_string()),
        },
        "starttime" => match cmd.argument(0).and_then(parse_time) {
            Some(t) => route.start_time = Some(t),
            None => diagnostics::error(host, expr, "Time is invalid in route.starttime".to_string()),
        },
        "ambientlight" => route.ambient_light = color(cmd, expr, host, route.ambient_light),
        "directionallight" => route.directional_light = color(cmd, expr, host, route.directional_light),
        "lightdirection" => {
            let theta = cmd.number(0, route.light_direction.0, "Theta", expr, host);
            let phi = cmd.number(1, route.light_direction.1, "Phi", expr, host);
            route.light_direction = (theta, phi);
        }
        "initialviewpoint" => {
            let v = cmd.int(0, 0, "Value", expr, host);
            if v < 0 || v > 3 {
                diagnostics::error(host, expr, "Value is expected to be in the range from 0 to 3 in route.initialviewpoint".to_string());
            } else {
                route.initial_viewpoint = v;
            }
        }
        "developerid" => route.developer_id = cmd.raw_arguments.clone(),
        _ => cmd.unsupported(expr, host),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::command::{interpret, Interpretation, Scope};
    use crate::host::CollectingHost;
    use crate::input::Dialect;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    fn run(lines: &[&str]) -> (RouteTables, CollectingHost) {
        let mut tables = RouteTables::default();
        let mut host = CollectingHost::new();
        let paths = Paths {
            route: PathBuf::from("routes"),
            objects: PathBuf::from("objects"),
            sounds: PathBuf::from("sounds"),
            train: PathBuf::from("train"),
        };
        let mut scope = Scope::default();
        for l in lines {
            let e = Expression::new(&Arc::new(PathBuf::from("r.csv")), 1, 1, l);
            if let Ok(Interpretation::Command(cmd)) = interpret(&e, &mut scope, Dialect::Csv, &[1.0]) {
                handle(&cmd, &e, &mut tables, &paths, &mut host);
            }
        }
        (tables, host)
    }

    #[test]
    fn metadata() {
        let (t, host) = run(&["Route.Comment A line; with separators",
                              "Route.Image title.png",
                              "Train.Gauge 1067",
                              "Route.StartTime 5.3000",
                              "Route.AmbientLight 100;110;120"]);
        assert!(host.messages.is_empty(), "{:?}", host.messages);
        assert_eq!(t.route.comment, "A line; with separators");
        assert_eq!(t.route.image.as_ref().map(|p| p.as_path()), Some(Path::new("routes/title.png")));
        assert!((t.route.gauge - 1.067).abs() < 1e-12);
        assert_eq!(t.route.start_time, Some(5.5 * 3600.0));
        assert_eq!(t.route.ambient_light, [100, 110, 120]);
    }

    #[test]
    fn signal_speeds_use_unit_of_speed() {
        let (t, _) = run(&["Route.Signal(1).Set 36", "Route.Signal(0) 0"]);
        assert!((t.route.signal_speeds[&1] - 10.0).abs() < 1e-9);
        assert!(t.route.signal_speeds[&0].is_infinite());
    }

    #[test]
    fn range_errors() {
        let (t, host) = run(&["Route.Change 4", "Route.AmbientLight 300;0;0", "Route.Foo"]);
        assert_eq!(t.route.change, 0);
        assert_eq!(t.route.ambient_light[0], 255);
        assert_eq!(host.errors().count(), 2);
        assert_eq!(host.warnings().count(), 1);
    }
}
