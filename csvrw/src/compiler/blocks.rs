//! The block accumulator filled by the track pass.

use std::collections::BTreeMap;

use crate::host::{SoundHandle, TextureHandle};
use crate::track::math::Vector2;

/// Rail state within one block.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Rail {
    pub started: bool,
    /// Set when the rail is (re)started in this very block.
    pub start_refreshed: bool,
    pub ended: bool,
    pub start: Vector2,
    pub end: Vector2,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side { Left, Both, Right }

impl Side {
    pub fn from_arg(x: i64) -> Option<Side> {
        match x {
            -1 => Some(Side::Left),
            0 => Some(Side::Both),
            1 => Some(Side::Right),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WallDike {
    pub side: Side,
    pub structure: usize,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pole {
    pub additional_rails: usize,
    pub location: i64,
    /// Multiple of the block interval between two poles.
    pub interval: f64,
    pub structure: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FreeObject {
    pub track_position: f64,
    pub rail: usize,
    pub structure: usize,
    pub position: Vector2,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Fog {
    pub start: f64,
    pub end: f64,
    pub color: [u8; 3],
}

impl Default for Fog {
    fn default() -> Self {
        Fog { start: 0.0, end: 0.0, color: [128, 128, 128] }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SignalKind {
    /// `track.sigf`: a signal head from the route's own signal table.
    Custom(usize),
    /// `track.signal`: a head from the compatibility signal set, by aspect count.
    Compatibility(i64),
    Relay,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SignalPlacement {
    pub track_position: f64,
    pub section: usize,
    pub kind: SignalKind,
    pub position: Vector2,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub show_object: bool,
    pub show_post: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SectionKind { IndexBased, ValueBased }

#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub track_position: f64,
    pub aspects: Vec<usize>,
    pub kind: SectionKind,
    /// Station the section holds its signal for until departure.
    pub departure_station: Option<usize>,
    pub invisible: bool,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Arrival { Unspecified, At(f64), Pass }

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Departure { Unspecified, At(f64), Terminal }

#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub name: String,
    pub track_position: f64,
    pub arrival: Arrival,
    pub departure: Departure,
    pub pass_alarm: bool,
    /// -1 left, 0 none, 1 right.
    pub doors: i64,
    pub forced_red_signal: bool,
    pub safety_system: i64,
    pub arrival_sound: Option<SoundHandle>,
    pub stop_time: f64,
    pub passenger_ratio: f64,
    pub departure_sound: Option<SoundHandle>,
    pub timetable: Option<usize>,
    pub stops: Vec<StopPoint>,
}

impl Station {
    pub fn passes(&self) -> bool {
        self.arrival == Arrival::Pass
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StopPoint {
    pub track_position: f64,
    pub direction: i64,
    pub backward_tolerance: f64,
    pub forward_tolerance: f64,
    pub cars: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RequestStop {
    pub track_position: f64,
    pub station: Option<usize>,
    /// Probability in percent that the stop is requested.
    pub probability: f64,
    pub max_cars: usize,
    pub full_speed: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpeedLimit {
    pub track_position: f64,
    /// m/s, infinite for no limit.
    pub speed: f64,
    pub post_side: i64,
    pub course: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SoundKind {
    /// Played once for the player train.
    Announce,
    /// Attached to the world at an offset from the rail.
    Doppler,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SoundPlacement {
    pub track_position: f64,
    pub sound: SoundHandle,
    pub kind: SoundKind,
    pub position: Vector2,
    pub speed: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transponder {
    pub track_position: f64,
    pub kind: i64,
    pub data: i64,
    pub section: Option<usize>,
    pub beacon_structure: Option<usize>,
    pub position: Vector2,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MarkerContent {
    Image(TextureHandle),
    Text { text: String, color: i64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub start: f64,
    pub end: f64,
    pub content: MarkerContent,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointOfInterest {
    pub track_position: f64,
    pub rail: usize,
    pub position: Vector2,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub text: String,
}

/// One block interval of route.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub rails: BTreeMap<usize, Rail>,
    pub rail_types: BTreeMap<usize, usize>,
    pub turn: f64,
    pub pitch: f64,
    pub curve_radius: f64,
    /// Cant in meters.
    pub curve_cant: f64,
    pub height: f64,
    pub adhesion_multiplier: f64,
    pub accuracy: f64,
    pub background: usize,
    pub fog: Fog,
    pub fog_defined: bool,
    pub ground: usize,
    pub walls: BTreeMap<usize, WallDike>,
    pub dikes: BTreeMap<usize, WallDike>,
    pub poles: BTreeMap<usize, Pole>,
    pub free_objects: Vec<FreeObject>,
    pub signals: Vec<SignalPlacement>,
    pub sections: Vec<usize>,
    pub station: Option<usize>,
    pub stops: Vec<(usize, usize)>,
    pub limits: Vec<SpeedLimit>,
    pub sounds: Vec<SoundPlacement>,
    pub transponders: Vec<Transponder>,
}

impl Block {
    /// The first block of every route: rail 0 running, default accuracy and adhesion.
    pub fn initial(height: f64) -> Block {
        let mut rails = BTreeMap::new();
        rails.insert(0, Rail { started: true, start_refreshed: true, ..Default::default() });
        let mut rail_types = BTreeMap::new();
        rail_types.insert(0, 0);
        Block {
            rails: rails,
            rail_types: rail_types,
            turn: 0.0,
            pitch: 0.0,
            curve_radius: 0.0,
            curve_cant: 0.0,
            height: height,
            adhesion_multiplier: 1.0,
            accuracy: 2.0,
            background: 0,
            fog: Fog::default(),
            fog_defined: false,
            ground: 0,
            walls: BTreeMap::new(),
            dikes: BTreeMap::new(),
            poles: BTreeMap::new(),
            free_objects: Vec::new(),
            signals: Vec::new(),
            sections: Vec::new(),
            station: None,
            stops: Vec::new(),
            limits: Vec::new(),
            sounds: Vec::new(),
            transponders: Vec::new(),
        }
    }

    /// A successor carrying the open state of this block forward.
    pub fn inherit(&self) -> Block {
        let rails = self.rails.iter()
            .filter(|(_, r)| r.started && !r.ended)
            .map(|(&i, r)| (i, Rail {
                started: true,
                start_refreshed: false,
                ended: false,
                start: r.end,
                end: r.end,
            }))
            .collect();
        Block {
            rails: rails,
            rail_types: self.rail_types.clone(),
            turn: 0.0,
            pitch: self.pitch,
            curve_radius: self.curve_radius,
            curve_cant: self.curve_cant,
            height: self.height,
            adhesion_multiplier: self.adhesion_multiplier,
            accuracy: self.accuracy,
            background: self.background,
            fog: self.fog,
            fog_defined: false,
            ground: self.ground,
            walls: self.walls.clone(),
            dikes: self.dikes.clone(),
            poles: self.poles.clone(),
            free_objects: Vec::new(),
            signals: Vec::new(),
            sections: Vec::new(),
            station: None,
            stops: Vec::new(),
            limits: Vec::new(),
            sounds: Vec::new(),
            transponders: Vec::new(),
        }
    }

    pub fn rail(&self, index: usize) -> Option<&Rail> {
        self.rails.get(&index)
    }
}

/// Mutable model of the track pass.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteData {
    pub blocks: Vec<Block>,
    pub block_interval: f64,
    pub first_used_block: Option<usize>,
    pub stations: Vec<Station>,
    pub request_stops: Vec<RequestStop>,
    pub sections: Vec<Section>,
    pub markers: Vec<Marker>,
    pub points_of_interest: Vec<PointOfInterest>,
    pub buffers: Vec<f64>,
    pub line_ending_fix: bool,
    pub track_position: f64,
}

impl RouteData {
    pub fn new(block_interval: f64, initial_height: f64, line_ending_fix: bool) -> RouteData {
        RouteData {
            blocks: vec![Block::initial(initial_height)],
            block_interval: block_interval,
            first_used_block: None,
            stations: Vec::new(),
            request_stops: Vec::new(),
            sections: vec![Section {
                track_position: 0.0,
                aspects: vec![0, 4],
                kind: SectionKind::IndexBased,
                departure_station: None,
                invisible: false,
            }],
            markers: Vec::new(),
            points_of_interest: Vec::new(),
            buffers: Vec::new(),
            line_ending_fix: line_ending_fix,
            track_position: 0.0,
        }
    }

    /// Block index of a track position, with the historical 0.001 bias at
    /// block boundaries.
    pub fn block_index(&self, track_position: f64) -> usize {
        (track_position / self.block_interval + 0.001).floor().max(0.0) as usize
    }

    /// Extends the block array up to `index`, each new block inheriting
    /// from its predecessor.
    pub fn create_missing_blocks(&mut self, index: usize) {
        while self.blocks.len() <= index {
            let next = match self.blocks.last() {
                Some(last) => last.inherit(),
                None => Block::initial(0.0),
            };
            self.blocks.push(next);
        }
    }

    pub fn blocks_used(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_start(&self, index: usize) -> f64 {
        index as f64 * self.block_interval
    }

    /// Drops any spare capacity once the track pass is done.
    pub fn finish(&mut self) {
        self.blocks.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_index_bias() {
        let data = RouteData::new(25.0, 0.0, false);
        assert_eq!(data.block_index(0.0), 0);
        assert_eq!(data.block_index(24.9), 0);
        assert_eq!(data.block_index(24.99), 1);
        assert_eq!(data.block_index(25.0), 1);
        assert_eq!(data.block_index(74.0), 2);
    }

    #[test]
    fn block_index_is_monotone() {
        let data = RouteData::new(25.0, 0.0, false);
        let mut last = 0;
        for i in 0..5000 {
            let b = data.block_index(i as f64 * 0.173);
            assert!(b >= last);
            last = b;
        }
    }

    #[test]
    fn missing_blocks_inherit_open_rails() {
        let mut data = RouteData::new(25.0, 0.0, false);
        data.blocks[0].rails.insert(1, Rail {
            started: true, start_refreshed: true, ended: false,
            start: Vector2::new(3.8, 0.0), end: Vector2::new(3.8, 0.0),
        });
        data.blocks[0].rails.insert(2, Rail {
            started: true, start_refreshed: true, ended: true,
            start: Vector2::new(-3.8, 0.0), end: Vector2::new(-3.8, 0.0),
        });
        data.blocks[0].pitch = 0.01;
        data.blocks[0].turn = 0.2;
        data.create_missing_blocks(3);
        assert_eq!(data.blocks_used(), 4);
        for block in &data.blocks[1..] {
            assert!(block.rail(1).map(|r| r.started && !r.start_refreshed).unwrap_or(false));
            assert!(block.rail(2).is_none());
            assert_eq!(block.pitch, 0.01);
            assert_eq!(block.turn, 0.0);
        }
    }
}
