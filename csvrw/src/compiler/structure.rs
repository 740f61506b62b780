use crate::diagnostics;
use crate::host::Host;
use crate::input::expression::Expression;
use crate::input::numbers::parse_int;

use super::command::Command;
use super::tables::{RouteTables, StructureKind};
use super::{resolve_path, Paths};

/// Poles for one to four rails, index 0, shipped with the host's
/// compatibility objects. Missing ones are simply not available.
pub fn register_default_poles(tables: &mut RouteTables, paths: &Paths, host: &mut dyn Host) {
    for additional in 0..4 {
        let file = paths.objects.join("Compatibility").join("Poles").join(format!("pole_{}.csv", additional + 1));
        match host.load_object(&file) {
            Ok(object) => { tables.structures.poles.insert((additional, 0), object); }
            Err(e) => debug!("default pole {} unavailable: {}", file.display(), e),
        }
    }
}

pub fn handle(cmd: &Command, expr: &Expression, tables: &mut RouteTables, paths: &Paths, host: &mut dyn Host) {
    let structures = &mut tables.structures;
    match cmd.name.as_str() {
        "pole" => {
            let additional = match cmd.required_index(0, expr, host) {
                Some(i) => i,
                None => return,
            };
            let index = match cmd.index(1) {
                Some(i) if i >= 0 => i as usize,
                _ => {
                    diagnostics::error(host, expr, "PoleStructureIndex is expected in structure.pole".to_string());
                    return;
                }
            };
            if let Some(object) = load(cmd, expr, paths, host) {
                structures.poles.insert((additional, index), object);
            }
        }
        "background" => {
            let index = match cmd.required_index(0, expr, host) {
                Some(i) => i,
                None => return,
            };
            let file = match cmd.argument(0) {
                Some(f) => resolve_path(&paths.objects, f),
                None => {
                    diagnostics::error(host, expr, "FileName is expected in structure.background".to_string());
                    return;
                }
            };
            match host.load_texture(&file) {
                Ok(texture) => structures.backgrounds.entry(index).or_insert_with(Default::default).texture = Some(texture),
                Err(e) => diagnostics::error(host, expr, format!("Could not load {}: {}", file.display(), e)),
            }
        }
        "background.x" => {
            let index = match cmd.required_index(0, expr, host) {
                Some(i) => i,
                None => return,
            };
            let n = cmd.int(0, 6, "RepetitionCount", expr, host);
            if n <= 0 {
                diagnostics::error(host, expr, "RepetitionCount is expected to be positive in structure.background.x".to_string());
            } else {
                structures.backgrounds.entry(index).or_insert_with(Default::default).repetitions = n as u32;
            }
        }
        "background.aspect" => {
            let index = match cmd.required_index(0, expr, host) {
                Some(i) => i,
                None => return,
            };
            match cmd.int(0, 0, "Mode", expr, host) {
                m @ 0 | m @ 1 => structures.backgrounds.entry(index).or_insert_with(Default::default)
                    .keep_aspect_ratio = m == 1,
                _ => diagnostics::error(host, expr, "Mode is expected to be either 0 or 1 in structure.background.aspect".to_string()),
            }
        }
        name => match StructureKind::from_name(name) {
            Some(kind) => {
                let index = match cmd.required_index(0, expr, host) {
                    Some(i) => i,
                    None => return,
                };
                if let Some(object) = load(cmd, expr, paths, host) {
                    structures.insert(kind, index, object);
                }
            }
            None => cmd.unsupported(expr, host),
        },
    }
}

fn load(cmd: &Command, expr: &Expression, paths: &Paths, host: &mut dyn Host) -> Option<crate::host::ObjectHandle> {
    let file = match cmd.argument(0) {
        Some(f) => resolve_path(&paths.objects, f),
        None => {
            diagnostics::error(host, expr, format!("FileName is expected in {}", cmd.qualified_name()));
            return None;
        }
    };
    match host.load_object(&file) {
        Ok(object) => Some(object),
        Err(e) => {
            diagnostics::error(host, expr, format!("Could not load {}: {}", file.display(), e));
            None
        }
    }
}

/// `cycle.ground(i) a;b;...` and `cycle.rail(i) a;b;...`: structure indices
/// repeated block after block.
pub fn handle_cycle(cmd: &Command, expr: &Expression, tables: &mut RouteTables, host: &mut dyn Host) {
    let cycles = match cmd.name.as_str() {
        "ground" => &mut tables.structures.ground_cycles,
        "rail" => &mut tables.structures.rail_cycles,
        _ => {
            cmd.unsupported(expr, host);
            return;
        }
    };
    let index = match cmd.required_index(0, expr, host) {
        Some(i) => i,
        None => return,
    };
    let mut entries = Vec::with_capacity(cmd.arguments.len());
    for (i, a) in cmd.arguments.iter().enumerate() {
        match parse_int(a) {
            Some(x) if x >= 0 => entries.push(x as usize),
            _ => diagnostics::error(host, expr, format!(
                "{}StructureIndex{} is invalid in {}", if cmd.name == "ground" { "Ground" } else { "Rail" },
                i, cmd.qualified_name())),
        }
    }
    cycles.insert(index, entries);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::command::{interpret, Interpretation, Scope};
    use crate::host::CollectingHost;
    use crate::input::Dialect;
    use std::path::PathBuf;
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
                match cmd.namespace.as_str() {
                    "cycle" => handle_cycle(&cmd, &e, &mut tables, &mut host),
                    _ => handle(&cmd, &e, &mut tables, &paths, &mut host),
                }
            }
        }
        (tables, host)
    }

    #[test]
    fn objects_and_poles() {
        let (t, host) = run(&["Structure.Rail(0).Load rails\\rail.csv",
                              "Structure.Ground(1) ground.csv",
                              "Structure.Pole(0;1) pole.csv",
                              "Structure.WallL(2)"]);
        assert_eq!(host.errors().count(), 1);
        assert!(t.structures.contains(StructureKind::Rail, 0));
        assert!(t.structures.contains(StructureKind::Ground, 1));
        assert!(!t.structures.contains(StructureKind::WallL, 2));
        assert!(t.structures.poles.contains_key(&(0, 1)));
    }

    #[test]
    fn backgrounds_in_every_spelling() {
        let (t, host) = run(&["Texture.Background(0).Load sky.png",
                              "Texture.Background(0).X 4",
                              "Structure.Back(0).Aspect 1",
                              "Structure.Background(1) sky2.png"]);
        assert!(host.messages.is_empty(), "{:?}", host.messages);
        let b = &t.structures.backgrounds[&0];
        assert!(b.texture.is_some());
        assert_eq!(b.repetitions, 4);
        assert!(b.keep_aspect_ratio);
        assert!(t.structures.backgrounds[&1].texture.is_some());
    }

    #[test]
    fn cycles() {
        let (t, host) = run(&["Cycle.Ground(0).Params 1;2;3", "Cycle.Rail(1) 4;x"]);
        assert_eq!(t.structures.ground_cycles[&0], vec![1, 2, 3]);
        assert_eq!(t.structures.rail_cycles[&1], vec![4]);
        assert_eq!(host.errors().count(), 1);
    }
}
