//! `track.*` commands of the second pass. Every command acts on the block
//! holding the current track position.

use crate::diagnostics;
use crate::host::Host;
use crate::input::expression::Expression;
use crate::input::numbers::parse_time;
use crate::track::math::Vector2;

use super::blocks::*;
use super::command::Command;
use super::tables::{RouteTables, StructureKind};
use super::{resolve_path, ParseContext, Paths};

/// Everything a track command reads or writes.
struct TrackCommand<'a> {
    cmd: &'a Command,
    expr: &'a Expression,
    tables: &'a RouteTables,
    unit: f64,
}

impl<'a> TrackCommand<'a> {
    fn error(&self, host: &mut dyn Host, what: &str) {
        diagnostics::error(host, self.expr, format!("{} in {}", what, self.cmd.qualified_name()));
    }

    fn length(&self, i: usize, default: f64, what: &str, host: &mut dyn Host) -> f64 {
        self.cmd.number(i, default, what, self.expr, host) * self.unit
    }

    fn number(&self, i: usize, default: f64, what: &str, host: &mut dyn Host) -> f64 {
        self.cmd.number(i, default, what, self.expr, host)
    }

    fn int(&self, i: usize, default: i64, what: &str, host: &mut dyn Host) -> i64 {
        self.cmd.int(i, default, what, self.expr, host)
    }

    /// Non-negative integer argument.
    fn index(&self, i: usize, default: i64, what: &str, host: &mut dyn Host) -> Option<usize> {
        let x = self.int(i, default, what, host);
        if x < 0 {
            self.error(host, &format!("{} is expected to be non-negative", what));
            None
        } else {
            Some(x as usize)
        }
    }

    /// Structure index that must name a loaded object of `kind`.
    fn structure(&self, i: usize, kind: StructureKind, what: &str, host: &mut dyn Host) -> Option<usize> {
        let s = self.index(i, 0, what, host)?;
        if self.tables.structures.contains(kind, s) {
            Some(s)
        } else {
            self.error(host, &format!("{} {} references an object not loaded", what, s));
            None
        }
    }

    /// Rail index that must name a rail running in `block`.
    fn running_rail(&self, i: usize, block: &Block, host: &mut dyn Host) -> Option<usize> {
        let r = self.index(i, 0, "RailIndex", host)?;
        match block.rail(r) {
            Some(rail) if rail.started && !rail.ended => Some(r),
            _ => {
                self.error(host, &format!("RailIndex {} references a non-existing rail", r));
                None
            }
        }
    }

    /// Offset and orientation arguments starting at `i`: x; y; yaw; pitch; roll.
    fn placement(&self, i: usize, host: &mut dyn Host) -> (Vector2, f64, f64, f64) {
        let x = self.length(i, 0.0, "X", host);
        let y = self.length(i + 1, 0.0, "Y", host);
        let yaw = self.number(i + 2, 0.0, "Yaw", host).to_radians();
        let pitch = self.number(i + 3, 0.0, "Pitch", host).to_radians();
        let roll = self.number(i + 4, 0.0, "Roll", host).to_radians();
        (Vector2::new(x, y), yaw, pitch, roll)
    }
}

pub fn handle(cmd: &Command, expr: &Expression, ctx: &mut ParseContext, tables: &RouteTables,
              data: &mut RouteData, paths: &Paths, host: &mut dyn Host) {
    let t = TrackCommand {
        cmd: cmd,
        expr: expr,
        tables: tables,
        unit: tables.options.unit_of_length.last().cloned().unwrap_or(1.0),
    };
    let position = data.track_position;
    let b = ctx.block;
    match cmd.name.as_str() {
        "rail" if cmd.argument(1).map(|a| a.eq_ignore_ascii_case("ended")).unwrap_or(false) => {
            rail_end(&t, data, b, true, host)
        }
        "rail" | "railstart" => rail_start(&t, data, b, cmd.name == "railstart", host),
        "railend" => rail_end(&t, data, b, false, host),
        "railtype" => {
            let rail = match t.index(0, 0, "RailIndex", host) {
                Some(r) => r,
                None => return,
            };
            let rail_type = match t.index(1, 0, "RailStructureIndex", host) {
                Some(s) => s,
                None => return,
            };
            if !tables.structures.contains(StructureKind::Rail, rail_type)
                && !tables.structures.rail_cycles.contains_key(&rail_type) {
                t.error(host, &format!("RailStructureIndex {} references an object not loaded", rail_type));
                return;
            }
            data.blocks[b].rail_types.insert(rail, rail_type);
        }
        "accuracy" => {
            let r = t.number(0, 2.0, "Value", host);
            data.blocks[b].accuracy = r.max(0.0).min(4.0);
        }
        "pitch" => data.blocks[b].pitch = 0.001 * t.number(0, 0.0, "ValueInPermille", host),
        "curve" => {
            let radius = t.length(0, 0.0, "Radius", host);
            let cant = 0.001 * t.number(1, 0.0, "CantInMillimeters", host);
            let block = &mut data.blocks[b];
            block.curve_radius = radius;
            block.curve_cant = cant;
        }
        "turn" => data.blocks[b].turn = t.number(0, 0.0, "Ratio", host),
        "adhesion" => {
            let rate = t.number(0, 100.0, "Rate", host);
            if rate < 0.0 {
                t.error(host, "Rate is expected to be non-negative");
            } else {
                data.blocks[b].adhesion_multiplier = 0.01 * rate;
            }
        }
        "height" => data.blocks[b].height = t.length(0, 0.0, "Height", host),
        "ground" => {
            let g = match t.index(0, 0, "CycleIndex", host) {
                Some(g) => g,
                None => return,
            };
            if tables.structures.contains(StructureKind::Ground, g) || tables.structures.ground_cycles.contains_key(&g) {
                data.blocks[b].ground = g;
            } else {
                t.error(host, &format!("CycleIndex {} references an object not loaded", g));
            }
        }
        "freeobj" => {
            let rail = match t.running_rail(0, &data.blocks[b], host) {
                Some(r) => r,
                None => return,
            };
            let structure = match t.structure(1, StructureKind::FreeObj, "FreeObjStructureIndex", host) {
                Some(s) => s,
                None => return,
            };
            let (p, yaw, pitch, roll) = t.placement(2, host);
            data.blocks[b].free_objects.push(FreeObject {
                track_position: position,
                rail: rail,
                structure: structure,
                position: p,
                yaw: yaw,
                pitch: pitch,
                roll: roll,
            });
        }
        "wall" | "dike" => {
            let rail = match t.running_rail(0, &data.blocks[b], host) {
                Some(r) => r,
                None => return,
            };
            let side = match Side::from_arg(t.int(1, 0, "Direction", host)) {
                Some(s) => s,
                None => {
                    t.error(host, "Direction is expected to be -1, 0 or 1");
                    return;
                }
            };
            let (left, right) = if cmd.name == "wall" {
                (StructureKind::WallL, StructureKind::WallR)
            } else {
                (StructureKind::DikeL, StructureKind::DikeR)
            };
            let what = if cmd.name == "wall" { "WallStructureIndex" } else { "DikeStructureIndex" };
            let structure = match side {
                Side::Left => t.structure(2, left, what, host),
                Side::Right => t.structure(2, right, what, host),
                Side::Both => t.structure(2, left, what, host).and_then(|_| t.structure(2, right, what, host)),
            };
            if let Some(s) = structure {
                let entry = WallDike { side: side, structure: s };
                let map = if cmd.name == "wall" { &mut data.blocks[b].walls } else { &mut data.blocks[b].dikes };
                map.insert(rail, entry);
            }
        }
        "wallend" | "dikeend" | "poleend" => {
            let rail = match t.running_rail(0, &data.blocks[b], host) {
                Some(r) => r,
                None => return,
            };
            let block = &mut data.blocks[b];
            let removed = match cmd.name.as_str() {
                "wallend" => block.walls.remove(&rail).is_some(),
                "dikeend" => block.dikes.remove(&rail).is_some(),
                _ => block.poles.remove(&rail).is_some(),
            };
            if !removed {
                t.error(host, &format!("RailIndex {} has nothing to end", rail));
            }
        }
        "pole" => {
            let rail = match t.running_rail(0, &data.blocks[b], host) {
                Some(r) => r,
                None => return,
            };
            let additional = match t.index(1, 0, "AdditionalRailsCovered", host) {
                Some(a) => a,
                None => return,
            };
            let location = t.int(2, 0, "Location", host);
            let interval = t.number(3, 1.0, "Interval", host);
            if interval <= 0.0 {
                t.error(host, "Interval is expected to be positive");
                return;
            }
            let structure = match t.index(4, 0, "PoleStructureIndex", host) {
                Some(s) => s,
                None => return,
            };
            if !tables.structures.poles.contains_key(&(additional, structure)) {
                t.error(host, &format!("PoleStructureIndex {} references an object not loaded", structure));
                return;
            }
            data.blocks[b].poles.insert(rail, Pole {
                additional_rails: additional,
                location: location,
                interval: interval,
                structure: structure,
            });
        }
        "back" | "background" => {
            let i = match t.index(0, 0, "BackgroundTextureIndex", host) {
                Some(i) => i,
                None => return,
            };
            if tables.structures.backgrounds.contains_key(&i) {
                data.blocks[b].background = i;
            } else {
                t.error(host, &format!("BackgroundTextureIndex {} references a texture not loaded", i));
            }
        }
        "fog" => {
            let start = t.length(0, 0.0, "StartingDistance", host);
            let end = t.length(1, 0.0, "EndingDistance", host);
            let mut color = [128u8; 3];
            for (i, c) in color.iter_mut().enumerate() {
                let x = t.int(2 + i, 128, "Color component", host);
                if x < 0 || x > 255 {
                    t.error(host, "Color component is expected to be in the range from 0 to 255");
                }
                *c = x.max(0).min(255) as u8;
            }
            let block = &mut data.blocks[b];
            block.fog = Fog { start: start, end: end, color: color };
            block.fog_defined = true;
        }
        "section" | "sections" => {
            let mut aspects = Vec::with_capacity(cmd.arguments.len());
            for i in 0..cmd.arguments.len() {
                if let Some(a) = t.index(i, 0, &format!("Aspect{}", i), host) {
                    aspects.push(a);
                }
            }
            if aspects.is_empty() {
                aspects.push(0);
            }
            let kind = if cmd.name == "sections" { SectionKind::ValueBased } else { SectionKind::IndexBased };
            add_section(ctx, data, b, position, aspects, kind);
        }
        "sigf" => {
            let signal = match t.index(0, 0, "SignalIndex", host) {
                Some(s) => s,
                None => return,
            };
            if tables.signals.get(signal).is_none() {
                t.error(host, &format!("SignalIndex {} references a signal not loaded", signal));
                return;
            }
            let section = match t.index(1, 0, "Section", host) {
                Some(s) => ctx.section + s,
                None => return,
            };
            let (p, yaw, pitch, roll) = t.placement(2, host);
            data.blocks[b].signals.push(SignalPlacement {
                track_position: position,
                section: section,
                kind: SignalKind::Custom(signal),
                position: p,
                yaw: yaw,
                pitch: pitch,
                roll: roll,
                show_object: true,
                show_post: false,
            });
        }
        "signal" | "sig" => {
            let num = t.int(0, -2, "Aspects", host);
            let aspects = match compatibility_aspects(num) {
                Some(a) => a,
                None => {
                    t.error(host, "Aspects has an unsupported value");
                    return;
                }
            };
            let (p, yaw, pitch, roll) = t.placement(2, host);
            let section = add_section(ctx, data, b, position, aspects, SectionKind::IndexBased);
            data.blocks[b].signals.push(post_signal(position, section, SignalKind::Compatibility(num),
                                                    p, yaw, pitch, roll));
        }
        "relay" => {
            let (p, yaw, pitch, roll) = t.placement(1, host);
            let section = ctx.section + 1;
            data.blocks[b].signals.push(post_signal(position, section, SignalKind::Relay, p, yaw, pitch, roll));
        }
        "sta" => station(&t, ctx, data, b, position, paths, host),
        "stop" => {
            let s = match ctx.station {
                Some(s) => s,
                None => {
                    t.error(host, "A stop without a station is invalid");
                    return;
                }
            };
            let direction = t.int(0, 0, "Direction", host);
            if direction < -1 || direction > 1 {
                t.error(host, "Direction is expected to be -1, 0 or 1");
                return;
            }
            let backward = t.length(1, 5.0, "BackwardTolerance", host);
            let forward = t.length(2, 5.0, "ForwardTolerance", host);
            let cars = match t.index(3, 0, "Cars", host) {
                Some(c) => c,
                None => return,
            };
            let stops = &mut data.stations[s].stops;
            stops.push(StopPoint {
                track_position: position,
                direction: direction,
                backward_tolerance: backward.abs(),
                forward_tolerance: forward.abs(),
                cars: cars,
            });
            let stop = stops.len() - 1;
            data.blocks[b].stops.push((s, stop));
        }
        "requeststop" => {
            let probability = t.number(0, 50.0, "Probability", host);
            if probability < 0.0 || probability > 100.0 {
                t.error(host, "Probability is expected to be in the range from 0 to 100");
                return;
            }
            let max_cars = match t.index(1, 0, "MaxCars", host) {
                Some(c) => c,
                None => return,
            };
            let full_speed = t.int(2, 0, "FullSpeed", host) != 0;
            data.request_stops.push(RequestStop {
                track_position: position,
                station: ctx.station,
                probability: probability,
                max_cars: max_cars,
                full_speed: full_speed,
            });
        }
        "limit" => {
            let speed = t.number(0, 0.0, "Speed", host);
            if speed < 0.0 {
                t.error(host, "Speed is expected to be non-negative");
                return;
            }
            let post_side = t.int(1, 0, "Post", host);
            let course = t.int(2, 0, "Course", host);
            if post_side < -1 || post_side > 1 || course < -1 || course > 1 {
                t.error(host, "Post and Course are expected to be -1, 0 or 1");
                return;
            }
            data.blocks[b].limits.push(SpeedLimit {
                track_position: position,
                speed: if speed == 0.0 { std::f64::INFINITY } else { speed * tables.options.unit_of_speed },
                post_side: post_side,
                course: course,
            });
        }
        "beacon" => {
            let kind = t.int(0, 0, "Type", host);
            let structure = match t.int(1, -1, "BeaconStructureIndex", host) {
                s if s < 0 => None,
                _ => match t.structure(1, StructureKind::Beacon, "BeaconStructureIndex", host) {
                    Some(s) => Some(s),
                    None => return,
                },
            };
            let section = t.int(2, 0, "Section", host);
            let value = t.int(3, 0, "Data", host);
            let (p, _, _, _) = t.placement(4, host);
            data.blocks[b].transponders.push(Transponder {
                track_position: position,
                kind: kind,
                data: value,
                section: relative_section(ctx, section),
                beacon_structure: structure,
                position: p,
            });
        }
        "transponder" | "tr" => {
            let kind = t.int(0, 0, "Type", host);
            let section = t.int(1, 0, "Signal", host);
            let switch_system = t.int(2, 0, "SwitchSystem", host);
            let (p, _, _, _) = t.placement(3, host);
            data.blocks[b].transponders.push(Transponder {
                track_position: position,
                kind: kind,
                data: switch_system,
                section: relative_section(ctx, section),
                beacon_structure: None,
                position: p,
            });
        }
        "announce" | "doppler" => {
            let file = match cmd.argument(0) {
                Some(f) => resolve_path(&paths.sounds, f),
                None => {
                    t.error(host, "FileName is expected");
                    return;
                }
            };
            let sound = match host.load_sound(&file) {
                Ok(s) => s,
                Err(e) => {
                    t.error(host, &format!("Could not load {}: {}", file.display(), e));
                    return;
                }
            };
            let placement = if cmd.name == "announce" {
                SoundPlacement {
                    track_position: position,
                    sound: sound,
                    kind: SoundKind::Announce,
                    position: Vector2::ZERO,
                    speed: t.number(1, 0.0, "Speed", host) * tables.options.unit_of_speed,
                }
            } else {
                SoundPlacement {
                    track_position: position,
                    sound: sound,
                    kind: SoundKind::Doppler,
                    position: Vector2::new(t.length(1, 0.0, "X", host), t.length(2, 0.0, "Y", host)),
                    speed: 0.0,
                }
            };
            data.blocks[b].sounds.push(placement);
        }
        "marker" | "textmarker" => {
            let content = if cmd.name == "marker" {
                let file = match cmd.argument(0) {
                    Some(f) => resolve_path(&paths.route, f),
                    None => {
                        t.error(host, "FileName is expected");
                        return;
                    }
                };
                match host.load_texture(&file) {
                    Ok(texture) => MarkerContent::Image(texture),
                    Err(e) => {
                        t.error(host, &format!("Could not load {}: {}", file.display(), e));
                        return;
                    }
                }
            } else {
                let text = match cmd.argument(0) {
                    Some(s) => s.to_string(),
                    None => {
                        t.error(host, "Text is expected");
                        return;
                    }
                };
                MarkerContent::Text { text: text, color: t.int(2, 0, "FontColor", host) }
            };
            let distance = t.length(1, 0.0, "Distance", host);
            if distance == 0.0 {
                t.error(host, "Distance is expected to be non-zero");
                return;
            }
            let (start, end) = if distance < 0.0 {
                ((position + distance).max(0.0), position)
            } else {
                (position, position + distance)
            };
            data.markers.push(Marker { start: start, end: end, content: content });
        }
        "buffer" => data.buffers.push(position),
        "pointofinterest" | "poi" => {
            let rail = match t.running_rail(0, &data.blocks[b], host) {
                Some(r) => r,
                None => return,
            };
            let (p, yaw, pitch, roll) = t.placement(1, host);
            data.points_of_interest.push(PointOfInterest {
                track_position: position,
                rail: rail,
                position: p,
                yaw: yaw,
                pitch: pitch,
                roll: roll,
                text: cmd.argument(6).unwrap_or("").to_string(),
            });
        }
        _ => cmd.unsupported(expr, host),
    }
}

fn rail_index(t: &TrackCommand, host: &mut dyn Host) -> Option<usize> {
    match t.int(0, 0, "RailIndex", host) {
        r if r < 1 => {
            t.error(host, "RailIndex is expected to be positive");
            None
        }
        r => Some(r as usize),
    }
}

fn rail_start(t: &TrackCommand, data: &mut RouteData, b: usize, strict: bool, host: &mut dyn Host) {
    let index = match rail_index(t, host) {
        Some(i) => i,
        None => return,
    };
    let existing = data.blocks[b].rail(index).cloned();
    if strict {
        if let Some(r) = existing {
            if r.started && !r.ended && !r.start_refreshed {
                t.error(host, &format!("RailIndex {} references an already running rail", index));
                return;
            }
        }
    }
    let previous = existing.map(|r| r.start).unwrap_or(Vector2::ZERO);
    let offset = Vector2::new(t.length(1, previous.x / t.unit, "X", host), t.length(2, previous.y / t.unit, "Y", host));
    data.blocks[b].rails.insert(index, Rail {
        started: true,
        start_refreshed: true,
        ended: false,
        start: offset,
        end: offset,
    });
    // The rail runs from wherever it was in the previous block to the new offset.
    if b > 0 {
        if let Some(prev) = data.blocks[b - 1].rails.get_mut(&index) {
            if prev.started && !prev.ended {
                prev.end = offset;
            }
        }
    }
}

fn rail_end(t: &TrackCommand, data: &mut RouteData, b: usize, shorthand: bool, host: &mut dyn Host) {
    let index = match rail_index(t, host) {
        Some(i) => i,
        None => return,
    };
    let block = &mut data.blocks[b];
    let rail = match block.rails.get_mut(&index) {
        Some(r) if r.started && !r.ended => r,
        _ => {
            t.error(host, &format!("RailIndex {} references a non-existing rail", index));
            return;
        }
    };
    rail.ended = true;
    if !shorthand {
        let x = t.cmd.number(1, rail.end.x / t.unit, "X", t.expr, host) * t.unit;
        let y = t.cmd.number(2, rail.end.y / t.unit, "Y", t.expr, host) * t.unit;
        rail.end = Vector2::new(x, y);
    }
}

fn add_section(ctx: &mut ParseContext, data: &mut RouteData, b: usize, position: f64, aspects: Vec<usize>,
               kind: SectionKind) -> usize {
    let departure_station = ctx.station
        .filter(|&s| data.stations[s].forced_red_signal)
        .filter(|&s| !data.sections.iter().any(|sec| sec.departure_station == Some(s)));
    data.sections.push(Section {
        track_position: position,
        aspects: aspects,
        kind: kind,
        departure_station: departure_station,
        invisible: false,
    });
    let index = data.sections.len() - 1;
    data.blocks[b].sections.push(index);
    ctx.section = index;
    index
}

/// Sections an aspect count stands for in `track.signal`. Negative counts
/// start from yellow instead of green.
fn compatibility_aspects(num: i64) -> Option<Vec<usize>> {
    Some(match num {
        2 => vec![0, 4],
        -2 => vec![0, 2],
        3 | -3 => vec![0, 2, 4],
        4 => vec![0, 1, 2, 4],
        -4 => vec![0, 2, 3, 4],
        5 => vec![0, 1, 2, 3, 4],
        -5 => vec![0, 2, 3, 4, 5],
        6 => vec![0, 1, 2, 3, 4, 5],
        _ => return None,
    })
}

/// A signal on a post. `x == 0` hides it; a negative `y` drops the post.
fn post_signal(track_position: f64, section: usize, kind: SignalKind, p: Vector2, yaw: f64, pitch: f64,
               roll: f64) -> SignalPlacement {
    SignalPlacement {
        track_position: track_position,
        section: section,
        kind: kind,
        position: Vector2::new(p.x, p.y.abs()),
        yaw: yaw,
        pitch: pitch,
        roll: roll,
        show_object: p.x != 0.0,
        show_post: p.x != 0.0 && p.y >= 0.0,
    }
}

fn relative_section(ctx: &ParseContext, offset: i64) -> Option<usize> {
    if offset < 0 { None } else { Some(ctx.section + offset as usize) }
}

fn station(t: &TrackCommand, ctx: &mut ParseContext, data: &mut RouteData, b: usize, position: f64, paths: &Paths,
           host: &mut dyn Host) {
    let cmd = t.cmd;
    let name = cmd.argument(0).unwrap_or("").to_string();
    let arrival = match cmd.argument(1) {
        None => Arrival::Unspecified,
        Some(a) if a.eq_ignore_ascii_case("p") || a.eq_ignore_ascii_case("l") => Arrival::Pass,
        Some(a) => match parse_time(a) {
            Some(time) => Arrival::At(time),
            None => {
                t.error(host, "ArrivalTime is invalid");
                Arrival::Unspecified
            }
        },
    };
    let departure = match cmd.argument(2) {
        None => Departure::Unspecified,
        Some(d) if d.eq_ignore_ascii_case("t") || d == "=" => Departure::Terminal,
        Some(d) => match parse_time(d) {
            Some(time) => Departure::At(time),
            None => {
                t.error(host, "DepartureTime is invalid");
                Departure::Unspecified
            }
        },
    };
    let pass_alarm = t.int(3, 0, "PassAlarm", host) == 1;
    let doors = match cmd.argument(4) {
        Some(d) if d.eq_ignore_ascii_case("l") => -1,
        Some(d) if d.eq_ignore_ascii_case("r") => 1,
        Some(d) if d.eq_ignore_ascii_case("n") || d.eq_ignore_ascii_case("b") => 0,
        _ => t.int(4, 0, "Doors", host).max(-1).min(1),
    };
    let forced_red_signal = t.int(5, 0, "ForcedRedSignal", host) == 1;
    let safety_system = match cmd.argument(6) {
        Some(s) if s.eq_ignore_ascii_case("ats") => 0,
        Some(s) if s.eq_ignore_ascii_case("atc") => 1,
        _ => t.int(6, 0, "System", host),
    };
    let sound = |i: usize, host: &mut dyn Host| cmd.argument(i).and_then(|f| {
        let file = resolve_path(&paths.sounds, f);
        match host.load_sound(&file) {
            Ok(s) => Some(s),
            Err(e) => {
                t.error(host, &format!("Could not load {}: {}", file.display(), e));
                None
            }
        }
    });
    let arrival_sound = sound(7, host);
    let departure_sound = sound(10, host);
    let stop_time = t.number(8, 15.0, "StopDuration", host);
    let passenger_ratio = t.number(9, 100.0, "PassengerRatio", host);
    let timetable = match cmd.argument(11) {
        Some(_) => t.index(11, 0, "TimetableIndex", host),
        None => None,
    };

    data.stations.push(Station {
        name: name,
        track_position: position,
        arrival: arrival,
        departure: departure,
        pass_alarm: pass_alarm,
        doors: doors,
        forced_red_signal: forced_red_signal,
        safety_system: safety_system,
        arrival_sound: arrival_sound,
        stop_time: stop_time.max(0.0),
        passenger_ratio: passenger_ratio.max(0.0),
        departure_sound: departure_sound,
        timetable: timetable,
        stops: Vec::new(),
    });
    let s = data.stations.len() - 1;
    data.blocks[b].station = Some(s);
    ctx.station = Some(s);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::command::{interpret, Interpretation, Scope};
    use crate::compiler::tables::SignalDefinition;
    use crate::host::{CollectingHost, ObjectHandle};
    use crate::input::Dialect;
    use assert_approx_eq::assert_approx_eq;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn tables() -> RouteTables {
        let mut t = RouteTables::default();
        t.structures.insert(StructureKind::Rail, 0, ObjectHandle(PathBuf::from("r0.csv")));
        t.structures.insert(StructureKind::Rail, 1, ObjectHandle(PathBuf::from("r1.csv")));
        t.structures.insert(StructureKind::FreeObj, 2, ObjectHandle(PathBuf::from("tree.csv")));
        t.structures.insert(StructureKind::WallL, 0, ObjectHandle(PathBuf::from("wall.csv")));
        t.signals.0.insert(0, SignalDefinition::Textured { base: PathBuf::from("sig"), glow: None });
        t
    }

    /// Runs `lines` as a track pass, each line either a position or a command.
    fn run(lines: &[&str], tables: &RouteTables) -> (RouteData, CollectingHost) {
        let mut data = RouteData::new(25.0, 0.0, false);
        let mut ctx = ParseContext::default();
        let mut host = CollectingHost::new();
        let paths = Paths {
            route: PathBuf::from("routes"),
            objects: PathBuf::from("objects"),
            sounds: PathBuf::from("sounds"),
            train: PathBuf::from("train"),
        };
        for l in lines {
            let e = Expression::new(&Arc::new(PathBuf::from("r.csv")), 1, 1, l);
            match interpret(&e, &mut ctx.scope, Dialect::Csv, &[1.0]) {
                Ok(Interpretation::Position { value, .. }) => {
                    data.track_position = value;
                    ctx.block = data.block_index(value);
                    data.create_missing_blocks(ctx.block);
                }
                Ok(Interpretation::Command(cmd)) => handle(&cmd, &e, &mut ctx, tables, &mut data, &paths, &mut host),
                x => panic!("{:?}", x),
            }
        }
        (data, host)
    }

    #[test]
    fn rails_start_move_and_end() {
        let (d, host) = run(&["0", "Track.Rail 1;3.8", "50", "Track.Rail 1;4.0", "75", "Track.RailEnd 1;4.2",
                              "Track.Rail 0;1", "Track.RailStart 2", "Track.RailStart 2"], &tables());
        assert_eq!(host.errors().count(), 1, "{:?}", host.messages);
        let r = d.blocks[0].rail(1).unwrap();
        assert_eq!((r.start.x, r.end.x), (3.8, 3.8));
        let r = d.blocks[1].rail(1).unwrap();
        assert_eq!((r.start.x, r.end.x), (3.8, 4.0));
        let r = d.blocks[3].rail(1).unwrap();
        assert!(r.ended);
        assert_eq!(r.end.x, 4.2);
        assert!(d.blocks[3].rail(2).unwrap().started);
    }

    #[test]
    fn geometry_commands() {
        let (d, host) = run(&["0", "Track.Curve 600;105", "Track.Pitch -5", "Track.Turn 0.01",
                              "Track.Adhesion 80", "Track.Accuracy 7", "25"], &tables());
        assert!(host.messages.is_empty(), "{:?}", host.messages);
        let b = &d.blocks[0];
        assert_eq!(b.curve_radius, 600.0);
        assert_approx_eq!(b.curve_cant, 0.105, 1e-12);
        assert_approx_eq!(b.pitch, -0.005, 1e-12);
        assert_eq!(b.turn, 0.01);
        assert_approx_eq!(b.adhesion_multiplier, 0.8, 1e-12);
        assert_eq!(b.accuracy, 4.0);
        let next = &d.blocks[1];
        assert_eq!(next.curve_radius, 600.0);
        assert_eq!(next.turn, 0.0);
    }

    #[test]
    fn objects_need_loaded_structures() {
        let (d, host) = run(&["0", "Track.FreeObj 0;2;1;0;90", "Track.FreeObj 0;3", "Track.FreeObj 4;2",
                              "Track.Wall 0;-1;0", "Track.Wall 0;1;0", "Track.RailType 0;1", "Track.RailType 0;9"],
                            &tables());
        assert_eq!(host.errors().count(), 4, "{:?}", host.messages);
        assert_eq!(d.blocks[0].free_objects.len(), 1);
        assert_approx_eq!(d.blocks[0].free_objects[0].yaw, std::f64::consts::FRAC_PI_2, 1e-12);
        assert_eq!(d.blocks[0].walls[&0].side, Side::Left);
        assert_eq!(d.blocks[0].rail_types[&0], 1);
    }

    #[test]
    fn stations_stops_and_sections() {
        let (d, host) = run(&["0", "Track.Stop 1", "100", "Track.Sta Alpha;10.30;10.3030;1;L;1;ATS;;20",
                              "Track.Stop 1;5;5;6", "150", "Track.Signal 3", "Track.SigF 0;0;-3;2",
                              "Track.Section 0;2;4"], &tables());
        assert_eq!(host.errors().count(), 1, "{:?}", host.messages);
        let s = &d.stations[0];
        assert_eq!(s.name, "Alpha");
        assert_eq!(s.arrival, Arrival::At(10.5 * 3600.0));
        assert_eq!(s.doors, -1);
        assert!(s.pass_alarm && s.forced_red_signal);
        assert_eq!(s.stop_time, 20.0);
        assert_eq!(s.stops.len(), 1);
        assert_eq!(d.blocks[4].stops, vec![(0, 0)]);
        assert_eq!(d.sections.len(), 3);
        assert_eq!(d.sections[1].aspects, vec![0, 2, 4]);
        assert_eq!(d.sections[1].departure_station, Some(0));
        assert_eq!(d.sections[2].departure_station, None);
        assert_eq!(d.blocks[6].sections, vec![1, 2]);
        assert_eq!(d.blocks[6].signals.len(), 2);
        assert_eq!(d.blocks[6].signals[1].section, 1);
    }

    #[test]
    fn limits_markers_and_buffers() {
        let (d, host) = run(&["0", "Track.Limit 36", "Track.Limit 0", "Track.Marker stop.png;-50",
                              "100", "Track.TextMarker Slow;200;1", "Track.Buffer"], &tables());
        assert!(host.messages.is_empty(), "{:?}", host.messages);
        assert_approx_eq!(d.blocks[0].limits[0].speed, 10.0, 1e-12);
        assert!(d.blocks[0].limits[1].speed.is_infinite());
        assert_eq!((d.markers[0].start, d.markers[0].end), (0.0, 0.0));
        assert_eq!((d.markers[1].start, d.markers[1].end), (100.0, 300.0));
        assert_eq!(d.buffers, vec![100.0]);
    }

    #[test]
    fn rail_zero_cannot_be_started_or_ended() {
        let (_, host) = run(&["0", "Track.RailStart 0", "Track.RailEnd 0"], &tables());
        assert_eq!(host.errors().count(), 2);
    }
}
