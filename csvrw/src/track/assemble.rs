//! Integrates the blocks of a compiled route into track elements.

use ordered_float::OrderedFloat;

use crate::compiler::blocks::{RouteData, SoundKind};
use crate::compiler::tables::{CantBehavior, RouteTables};

use super::events::{Event, EventKind};
use super::geometry::{advance, Frame};
use super::math::Vector3;
use super::{Track, TrackElement};

/// Distance before a station at which the pass alarm sounds.
const PASS_ALARM_DISTANCE: f64 = 50.0;

pub fn assemble(data: &RouteData, tables: &RouteTables, progress: &mut dyn FnMut(f64)) -> Track {
    let n = data.blocks.len();
    if n == 0 {
        return Track::default();
    }
    let interval = data.block_interval;
    let mut elements = Vec::with_capacity(n);
    let mut position = Vector3::ZERO;
    let mut heading = Vector3::FORWARD;

    for (i, block) in data.blocks.iter().enumerate() {
        progress(i as f64 / n as f64);
        if block.turn != 0.0 {
            let a = block.turn.atan();
            heading = heading.rotate(Vector3::DOWN, a.cos(), a.sin());
        }
        let frame = Frame::from_heading(position, heading, block.pitch);
        let radius = block.curve_radius;
        let cant = match tables.options.cant_behavior {
            CantBehavior::Signed => block.curve_cant,
            CantBehavior::Unsigned => block.curve_cant.abs() * sign(radius),
        };
        elements.push(TrackElement {
            starting_track_position: i as f64 * interval,
            world_position: frame.position,
            world_direction: frame.direction,
            world_up: frame.up,
            world_side: frame.side,
            curve_radius: radius,
            curve_cant: cant,
            curve_cant_tangent: 0.0,
            pitch: block.pitch,
            adhesion_multiplier: block.adhesion_multiplier,
            accuracy: block.accuracy,
            events: Vec::new(),
        });
        let next = advance(&frame, radius, interval);
        position = next.position;
        heading = next.heading();
    }

    cant_tangents(&mut elements);

    let mut pending = collect_events(data, tables);
    pending.sort_by_key(|&(p, _)| OrderedFloat(p));
    for (p, kind) in pending {
        let i = ((p / interval).floor().max(0.0) as usize).min(n - 1);
        let start = elements[i].starting_track_position;
        elements[i].events.push(Event::new(p - start, kind));
    }
    // Track end sits one interval past the last start, after everything else.
    elements[n - 1].events.push(Event::new(interval, EventKind::TrackEnd));
    debug!("assembled {} elements, {} events", n, elements.iter().map(|e| e.events.len()).sum::<usize>());

    Track { elements: elements }
}

fn sign(x: f64) -> f64 {
    if x > 0.0 { 1.0 } else if x < 0.0 { -1.0 } else { 0.0 }
}

/// Finite-difference Hermite tangents, one-sided at both ends.
fn cant_tangents(elements: &mut [TrackElement]) {
    let n = elements.len();
    if n < 2 {
        return;
    }
    let cants: Vec<f64> = elements.iter().map(|e| e.curve_cant).collect();
    for i in 0..n {
        elements[i].curve_cant_tangent = if i == 0 {
            cants[1] - cants[0]
        } else if i == n - 1 {
            cants[n - 1] - cants[n - 2]
        } else {
            0.5 * (cants[i + 1] - cants[i - 1])
        };
    }
}

/// Every event of the route with its absolute track position, in block
/// order. The caller sorts stably, so equal positions keep this order.
fn collect_events(data: &RouteData, tables: &RouteTables) -> Vec<(f64, EventKind)> {
    let mut out = Vec::new();
    let interval = data.block_interval;
    let rail_sounds = |rail_type: usize| {
        (tables.train.run_sounds.get(&rail_type).cloned().unwrap_or(rail_type),
         tables.train.flange_sounds.get(&rail_type).cloned().unwrap_or(rail_type))
    };
    let mut previous_speed = std::f64::INFINITY;
    let mut previous_rail_type = data.blocks.first().and_then(|b| b.rail_types.get(&0).cloned()).unwrap_or(0);

    for (i, block) in data.blocks.iter().enumerate() {
        let start = i as f64 * interval;

        let rail_type = block.rail_types.get(&0).cloned().unwrap_or(0);
        if rail_type != previous_rail_type {
            let (previous_run, previous_flange) = rail_sounds(previous_rail_type);
            let (next_run, next_flange) = rail_sounds(rail_type);
            out.push((start, EventKind::RailSoundsChange {
                previous_run: previous_run,
                previous_flange: previous_flange,
                next_run: next_run,
                next_flange: next_flange,
            }));
            previous_rail_type = rail_type;
        }

        if let Some(s) = block.station {
            let station = &data.stations[s];
            if station.pass_alarm {
                let p = (station.track_position - PASS_ALARM_DISTANCE).max(0.0);
                out.push((p, EventKind::StationPassAlarm { station: s }));
            }
            out.push((station.track_position, EventKind::StationStart { station: s }));
            let end = station.stops.iter()
                .map(|stop| stop.track_position)
                .fold(station.track_position, f64::max);
            out.push((end, EventKind::StationEnd { station: s }));
        }

        for &section in &block.sections {
            out.push((data.sections[section].track_position, EventKind::SectionChange {
                previous: if section > 0 { Some(section - 1) } else { None },
                next: section,
            }));
        }

        for limit in &block.limits {
            out.push((limit.track_position, EventKind::Limit {
                previous_speed: previous_speed,
                next_speed: limit.speed,
            }));
            previous_speed = limit.speed;
        }

        for sound in &block.sounds {
            let (player_train_only, once, dynamic) = match sound.kind {
                SoundKind::Announce => (true, true, sound.speed != 0.0),
                SoundKind::Doppler => (false, false, true),
            };
            out.push((sound.track_position, EventKind::Sound {
                sound: sound.sound.clone(),
                player_train_only: player_train_only,
                once: once,
                dynamic: dynamic,
                position: Vector3::new(sound.position.x, sound.position.y, 0.0),
                speed: sound.speed,
            }));
        }

        for t in &block.transponders {
            out.push((t.track_position, EventKind::Transponder { kind: t.kind, data: t.data, section: t.section }));
        }
    }

    for (m, marker) in data.markers.iter().enumerate() {
        out.push((marker.start, EventKind::Marker { marker: m, start: true }));
        out.push((marker.end, EventKind::Marker { marker: m, start: false }));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::blocks::{Arrival, Departure, SpeedLimit, Station, StopPoint};
    use assert_approx_eq::assert_approx_eq;

    fn data(blocks: usize) -> RouteData {
        let mut d = RouteData::new(25.0, 0.0, false);
        d.create_missing_blocks(blocks - 1);
        d
    }

    fn build(d: &RouteData) -> Track {
        assemble(d, &RouteTables::default(), &mut |_| {})
    }

    #[test]
    fn straight_elements_are_continuous() {
        let t = build(&data(4));
        assert_eq!(t.elements.len(), 4);
        for (i, e) in t.elements.iter().enumerate() {
            assert_eq!(e.starting_track_position, i as f64 * 25.0);
            assert_eq!(e.world_position, Vector3::new(0.0, 0.0, i as f64 * 25.0));
        }
        let last = &t.elements[3];
        assert_eq!(last.events.len(), 1);
        assert_eq!(last.events[0].kind, EventKind::TrackEnd);
        assert_eq!(last.events[0].track_position_delta, 25.0);
    }

    #[test]
    fn curve_end_matches_next_element() {
        let mut d = data(3);
        d.blocks[1].curve_radius = 200.0;
        let t = build(&d);
        let end = advance(&t.elements[1].frame(), 200.0, 25.0);
        assert_approx_eq!(end.position.x, t.elements[2].world_position.x, 1e-9);
        assert_approx_eq!(end.position.z, t.elements[2].world_position.z, 1e-9);
        assert_approx_eq!(end.direction.x, t.elements[2].world_direction.x, 1e-9);
    }

    #[test]
    fn turn_rotates_heading() {
        let mut d = data(2);
        d.blocks[1].turn = 1.0;
        let t = build(&d);
        let dir = t.elements[1].world_direction;
        let a = std::f64::consts::FRAC_PI_4;
        assert_approx_eq!(dir.x, -a.sin(), 1e-12);
        assert_approx_eq!(dir.z, a.cos(), 1e-12);
    }

    #[test]
    fn unsigned_cant_follows_curve() {
        let mut d = data(3);
        d.blocks[0].curve_cant = 0.1;
        d.blocks[1].curve_radius = -300.0;
        d.blocks[1].curve_cant = 0.1;
        d.blocks[2].curve_radius = -300.0;
        d.blocks[2].curve_cant = 0.1;
        let t = build(&d);
        let cants: Vec<f64> = t.elements.iter().map(|e| e.curve_cant).collect();
        assert_eq!(cants, vec![0.0, -0.1, -0.1]);
        assert_approx_eq!(t.elements[0].curve_cant_tangent, -0.1, 1e-12);
        assert_approx_eq!(t.elements[1].curve_cant_tangent, -0.05, 1e-12);
        assert_approx_eq!(t.elements[2].curve_cant_tangent, 0.0, 1e-12);
    }

    #[test]
    fn station_and_limit_events() {
        let mut d = data(6);
        d.stations.push(Station {
            name: "A".to_string(),
            track_position: 60.0,
            arrival: Arrival::At(0.0),
            departure: Departure::Unspecified,
            pass_alarm: true,
            doors: 1,
            forced_red_signal: false,
            safety_system: 0,
            arrival_sound: None,
            stop_time: 15.0,
            passenger_ratio: 100.0,
            departure_sound: None,
            timetable: None,
            stops: vec![StopPoint {
                track_position: 110.0, direction: 0, backward_tolerance: 5.0, forward_tolerance: 5.0, cars: 0,
            }],
        });
        d.blocks[2].station = Some(0);
        d.blocks[2].limits.push(SpeedLimit { track_position: 60.0, speed: 20.0, post_side: 0, course: 0 });
        d.blocks[3].limits.push(SpeedLimit { track_position: 80.0, speed: 30.0, post_side: 0, course: 0 });
        let t = build(&d);
        let events: Vec<(f64, EventKind)> = t.events().map(|(p, e)| (p, e.kind.clone())).collect();
        assert_eq!(events, vec![
            (10.0, EventKind::StationPassAlarm { station: 0 }),
            (60.0, EventKind::StationStart { station: 0 }),
            (60.0, EventKind::Limit { previous_speed: std::f64::INFINITY, next_speed: 20.0 }),
            (80.0, EventKind::Limit { previous_speed: 20.0, next_speed: 30.0 }),
            (110.0, EventKind::StationEnd { station: 0 }),
            (150.0, EventKind::TrackEnd),
        ]);
        assert_eq!(t.elements[4].events[0].track_position_delta, 10.0);
    }

    #[test]
    fn rail_type_change_of_the_main_rail() {
        let mut d = data(3);
        d.blocks[2].rail_types.insert(0, 2);
        d.blocks[2].rail_types.insert(1, 5);
        let mut tables = RouteTables::default();
        tables.train.run_sounds.insert(2, 7);
        let t = assemble(&d, &tables, &mut |_| {});
        assert_eq!(t.elements[2].events[0].kind, EventKind::RailSoundsChange {
            previous_run: 0, previous_flange: 0, next_run: 7, next_flange: 2,
        });
    }

    #[test]
    fn progress_stays_in_range() {
        let mut seen = Vec::new();
        assemble(&data(5), &RouteTables::default(), &mut |p| seen.push(p));
        assert_eq!(seen, vec![0.0, 0.2, 0.4, 0.6, 0.8]);
    }
}
