//! The assembled track: a polyline of elements carrying frames and events,
//! and the followers that walk it.

pub mod assemble;
pub mod events;
pub mod follower;
pub mod geometry;
pub mod inaccuracy;
pub mod math;

use self::events::{Event, EventKind};
use self::geometry::Frame;
use self::math::Vector3;

#[derive(Clone, Debug)]
pub struct TrackElement {
    pub starting_track_position: f64,
    pub world_position: Vector3,
    pub world_direction: Vector3,
    pub world_up: Vector3,
    pub world_side: Vector3,
    /// Signed, 0 for straight track.
    pub curve_radius: f64,
    pub curve_cant: f64,
    pub curve_cant_tangent: f64,
    /// Gradient as rise per unit of run.
    pub pitch: f64,
    pub adhesion_multiplier: f64,
    pub accuracy: f64,
    /// Ordered by offset from the element start.
    pub events: Vec<Event>,
}

impl TrackElement {
    pub fn frame(&self) -> Frame {
        Frame {
            position: self.world_position,
            direction: self.world_direction,
            up: self.world_up,
            side: self.world_side,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Track {
    pub elements: Vec<TrackElement>,
}

impl Track {
    /// Start of element `i + 1`, or `None` at the last element.
    fn next_start(&self, i: usize) -> Option<f64> {
        self.elements.get(i + 1).map(|e| e.starting_track_position)
    }

    /// Absolute position of the track end event.
    pub fn end_position(&self) -> Option<f64> {
        self.events()
            .find(|(_, e)| e.kind == EventKind::TrackEnd)
            .map(|(p, _)| p)
    }

    pub fn events(&self) -> impl Iterator<Item = (f64, &Event)> {
        self.elements.iter().flat_map(|e| {
            let start = e.starting_track_position;
            e.events.iter().map(move |ev| (start + ev.track_position_delta, ev))
        })
    }
}
