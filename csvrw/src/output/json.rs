use failure::Error;
use std::io;

use crate::compiler::RouteModel;
use crate::track::events::EventKind;
use crate::track::math::Vector3;

fn vector<W: io::Write>(f: &mut W, v: &Vector3) -> Result<(), Error> {
    write!(f, "[{}, {}, {}]", v.x, v.y, v.z)?;
    Ok(())
}

/// JSON numbers cannot be infinite; an absent limit is written as null.
fn speed(v: f64) -> String {
    if v.is_finite() { format!("{}", v) } else { "null".to_string() }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn event_json(kind: &EventKind) -> String {
    match *kind {
        EventKind::StationStart { station } => format!("\"type\": \"station_start\", \"station\": {}", station),
        EventKind::StationEnd { station } => format!("\"type\": \"station_end\", \"station\": {}", station),
        EventKind::StationPassAlarm { station } => format!("\"type\": \"pass_alarm\", \"station\": {}", station),
        EventKind::SectionChange { previous, next } => format!(
            "\"type\": \"section\", \"previous\": {}, \"next\": {}",
            previous.map(|p| p.to_string()).unwrap_or_else(|| "null".to_string()), next),
        EventKind::Sound { ref sound, once, dynamic, .. } => format!(
            "\"type\": \"sound\", \"file\": \"{}\", \"once\": {}, \"dynamic\": {}",
            escape(&sound.0.display().to_string()), once, dynamic),
        EventKind::RailSoundsChange { next_run, next_flange, .. } => format!(
            "\"type\": \"rail_sounds\", \"run\": {}, \"flange\": {}", next_run, next_flange),
        EventKind::Limit { next_speed, .. } => format!("\"type\": \"limit\", \"speed\": {}", speed(next_speed)),
        EventKind::Transponder { kind, data, .. } => format!(
            "\"type\": \"transponder\", \"kind\": {}, \"data\": {}", kind, data),
        EventKind::Marker { marker, start } => format!(
            "\"type\": \"marker\", \"marker\": {}, \"start\": {}", marker, start),
        EventKind::TrackEnd => "\"type\": \"track_end\"".to_string(),
    }
}

/// Writes the stations and the assembled track elements with their events.
pub fn json_track<W: io::Write>(model: &RouteModel, f: &mut W) -> Result<(), Error> {
    write!(f, "{{ \"block_interval\": {},\n", model.block_interval)?;

    write!(f, "\"stations\": [")?;
    let mut first = true;
    for s in &model.stations {
        if first { first = false; } else { write!(f, ", ")?; }
        write!(f, "{{ \"name\": \"{}\", \"position\": {}, \"stops\": [", escape(&s.name), s.track_position)?;
        let stops: Vec<String> = s.stops.iter().map(|p| p.track_position.to_string()).collect();
        write!(f, "{}] }}", stops.join(", "))?;
    }
    write!(f, "],\n")?;

    write!(f, "\"elements\": [\n")?;
    let mut first = true;
    for e in &model.track.elements {
        if first { first = false; } else { write!(f, ",\n")?; }
        write!(f, "{{ \"start\": {}, \"position\": ", e.starting_track_position)?;
        vector(f, &e.world_position)?;
        write!(f, ", \"direction\": ")?;
        vector(f, &e.world_direction)?;
        write!(f, ", \"radius\": {}, \"cant\": {}, \"pitch\": {}, \"events\": [",
               e.curve_radius, e.curve_cant, e.pitch)?;
        let mut first_event = true;
        for ev in &e.events {
            if first_event { first_event = false; } else { write!(f, ", ")?; }
            write!(f, "{{ \"offset\": {}, {} }}", ev.track_position_delta, event_json(&ev.kind))?;
        }
        write!(f, "] }}")?;
    }
    write!(f, "\n] }}\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes() {
        assert_eq!(escape("a\"b\\c\n"), "a\\\"b\\\\c\\n");
        assert_eq!(speed(std::f64::INFINITY), "null");
        assert_eq!(event_json(&EventKind::SectionChange { previous: None, next: 1 }),
                   "\"type\": \"section\", \"previous\": null, \"next\": 1");
    }
}
