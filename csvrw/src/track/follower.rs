use super::events::{CarRef, EventObserver, EventTriggerType};
use super::geometry::{advance, hermite, Frame};
use super::inaccuracy::inaccuracies;
use super::math::Vector3;
use super::Track;

/// Cursor on a track. Moving it recomputes the local frame and cant and
/// fires the events crossed on the way.
#[derive(Clone, Debug)]
pub struct TrackFollower {
    pub last_element: usize,
    pub track_position: f64,
    pub world_position: Vector3,
    pub world_direction: Vector3,
    pub world_up: Vector3,
    pub world_side: Vector3,
    pub curve_radius: f64,
    pub curve_cant: f64,
    pub cant_due_to_inaccuracy: f64,
    /// Per mille.
    pub pitch: f64,
    pub adhesion_multiplier: f64,
    pub trigger_type: EventTriggerType,
    pub car: Option<CarRef>,
}

impl TrackFollower {
    pub fn new(trigger_type: EventTriggerType, car: Option<CarRef>) -> TrackFollower {
        let frame = Frame::default();
        TrackFollower {
            last_element: 0,
            track_position: 0.0,
            world_position: frame.position,
            world_direction: frame.direction,
            world_up: frame.up,
            world_side: frame.side,
            curve_radius: 0.0,
            curve_cant: 0.0,
            cant_due_to_inaccuracy: 0.0,
            pitch: 0.0,
            adhesion_multiplier: 1.0,
            trigger_type: trigger_type,
            car: car,
        }
    }

    pub fn update_relative(&mut self, track: &Track, delta: f64, update_world: bool, add_inaccuracy: bool,
                           observer: &mut dyn EventObserver) {
        let target = self.track_position + delta;
        self.update_absolute(track, target, update_world, add_inaccuracy, observer);
    }

    pub fn update_absolute(&mut self, track: &Track, new_position: f64, update_world: bool,
                           add_inaccuracy: bool, observer: &mut dyn EventObserver) {
        if track.elements.is_empty() {
            return;
        }
        let elements = &track.elements;
        let old = self.track_position;
        let mut i = self.last_element.min(elements.len() - 1);

        // Leave elements behind, firing their events backwards.
        loop {
            let start = elements[i].starting_track_position;
            if new_position >= start {
                break;
            }
            self.check_events(track, i, -1, old - start, -0.01, observer);
            if i == 0 {
                break;
            }
            i -= 1;
        }
        while let Some(next) = track.next_start(i) {
            if new_position < next {
                break;
            }
            let start = elements[i].starting_track_position;
            self.check_events(track, i, 1, old - start, next - start + 0.01, observer);
            i += 1;
        }

        let element = &elements[i];
        let start = element.starting_track_position;
        let da = old - start;
        let db = new_position - start;
        let t = match track.next_start(i) {
            Some(next) => (db / (next - start)).max(0.0).min(1.0),
            None => 1.0,
        };

        if update_world {
            let frame = advance(&element.frame(), element.curve_radius, db);
            self.world_position = frame.position;
            self.world_direction = frame.direction;
            self.world_up = frame.up;
            self.world_side = frame.side;
        }
        self.curve_radius = element.curve_radius;
        self.curve_cant = match elements.get(i + 1) {
            Some(next) => hermite(t, element.curve_cant, element.curve_cant_tangent,
                                  next.curve_cant, next.curve_cant_tangent),
            None => element.curve_cant,
        };
        self.adhesion_multiplier = element.adhesion_multiplier;
        self.pitch = element.pitch * 1000.0;

        if add_inaccuracy {
            let a = inaccuracies(new_position, element.accuracy);
            let b = match elements.get(i + 1) {
                Some(next) => inaccuracies(new_position, next.accuracy),
                None => a,
            };
            let blend = a.lerp(&b, t);
            if update_world {
                self.world_position += self.world_side * blend.x + self.world_up * blend.y;
            }
            self.curve_cant += blend.cant;
            self.cant_due_to_inaccuracy = blend.cant;
        } else {
            self.cant_due_to_inaccuracy = 0.0;
        }

        let direction = if db > da { 1 } else if db < da { -1 } else { 0 };
        self.check_events(track, i, direction, da, db, observer);
        self.last_element = i;
        self.track_position = new_position;
    }

    /// Fires the events of element `i` whose offset lies between `old` and
    /// `new` in the given direction.
    fn check_events(&self, track: &Track, i: usize, direction: i32, old: f64, new: f64,
                    observer: &mut dyn EventObserver) {
        let element = &track.elements[i];
        for event in &element.events {
            let d = event.track_position_delta;
            let crossed = if direction < 0 {
                old > d && new <= d
            } else if direction > 0 {
                old < d && new >= d
            } else {
                false
            };
            if crossed {
                event.trigger(direction, self.trigger_type, self.car, observer);
            }
        }
    }
}
