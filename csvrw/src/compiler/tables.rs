//! Everything pass 1 learns about a route. Built once, then only read.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::host::{ObjectHandle, SoundHandle, TextureHandle};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectVisibility { Legacy, TrackBased }

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SectionBehavior { Default, Simplified }

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CantBehavior { Unsigned, Signed }

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FogBehavior { BlockBased, Interpolated }

#[derive(Clone, Debug, PartialEq)]
pub struct RouteOptions {
    /// Factors of the `a:b:c` length notation, the last one applies to `c`.
    pub unit_of_length: Vec<f64>,
    /// Meters per second for one unit of speed.
    pub unit_of_speed: f64,
    pub block_interval: f64,
    pub object_visibility: ObjectVisibility,
    pub section_behavior: SectionBehavior,
    pub cant_behavior: CantBehavior,
    pub fog_behavior: FogBehavior,
    pub compatible_transparency: bool,
    pub enable_bve_ts_hacks: bool,
}

impl Default for RouteOptions {
    fn default() -> Self {
        RouteOptions {
            unit_of_length: vec![1.0],
            unit_of_speed: 1.0 / 3.6,
            block_interval: 25.0,
            object_visibility: ObjectVisibility::Legacy,
            section_behavior: SectionBehavior::Default,
            cant_behavior: CantBehavior::Unsigned,
            fog_behavior: FogBehavior::BlockBased,
            compatible_transparency: false,
            enable_bve_ts_hacks: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RouteInfo {
    pub comment: String,
    pub image: Option<PathBuf>,
    pub timetable: String,
    pub change: i64,
    /// Track gauge in meters.
    pub gauge: f64,
    /// Speed limit in m/s per signal aspect.
    pub signal_speeds: BTreeMap<usize, f64>,
    pub acceleration_due_to_gravity: f64,
    pub elevation: f64,
    pub temperature: f64,
    pub pressure: f64,
    pub display_speed: Option<(String, f64)>,
    pub loading_screen: Option<PathBuf>,
    /// Seconds since midnight.
    pub start_time: Option<f64>,
    pub ambient_light: [u8; 3],
    pub directional_light: [u8; 3],
    /// Theta and phi in degrees.
    pub light_direction: (f64, f64),
    pub initial_viewpoint: i64,
    pub developer_id: String,
}

impl Default for RouteInfo {
    fn default() -> Self {
        RouteInfo {
            comment: String::new(),
            image: None,
            timetable: String::new(),
            change: 0,
            gauge: 1.435,
            signal_speeds: BTreeMap::new(),
            acceleration_due_to_gravity: 9.80665,
            elevation: 0.0,
            temperature: 20.0,
            pressure: 101.325,
            display_speed: None,
            loading_screen: None,
            start_time: None,
            ambient_light: [160, 160, 160],
            directional_light: [160, 160, 160],
            light_direction: (60.0, -26.57),
            initial_viewpoint: 0,
            developer_id: String::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainInfo {
    pub folder: Option<String>,
    /// Rail type to run sound index.
    pub run_sounds: BTreeMap<usize, usize>,
    /// Rail type to flange sound index.
    pub flange_sounds: BTreeMap<usize, usize>,
    pub day_timetables: BTreeMap<usize, TextureHandle>,
    pub night_timetables: BTreeMap<usize, TextureHandle>,
    /// Top speed of the preceding AI train in m/s.
    pub max_ai_speed: Option<f64>,
    /// Departure intervals of preceding trains in seconds.
    pub intervals: Vec<f64>,
}

/// The object tables addressed by `structure.<kind>(index)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StructureKind {
    Rail, Ground,
    WallL, WallR, DikeL, DikeR,
    FormL, FormR, FormCL, FormCR,
    RoofL, RoofR, RoofCL, RoofCR,
    CrackL, CrackR,
    FreeObj, Beacon,
}

impl StructureKind {
    pub fn from_name(name: &str) -> Option<StructureKind> {
        use self::StructureKind::*;
        Some(match name {
            "rail" => Rail,
            "ground" => Ground,
            "walll" => WallL,
            "wallr" => WallR,
            "dikel" => DikeL,
            "diker" => DikeR,
            "forml" => FormL,
            "formr" => FormR,
            "formcl" => FormCL,
            "formcr" => FormCR,
            "roofl" => RoofL,
            "roofr" => RoofR,
            "roofcl" => RoofCL,
            "roofcr" => RoofCR,
            "crackl" => CrackL,
            "crackr" => CrackR,
            "freeobj" => FreeObj,
            "beacon" => Beacon,
            _ => return None,
        })
    }
}

/// Index to loaded object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectDictionary(pub BTreeMap<usize, ObjectHandle>);

impl ObjectDictionary {
    pub fn insert(&mut self, index: usize, object: ObjectHandle) {
        self.0.insert(index, object);
    }

    pub fn get(&self, index: usize) -> Option<&ObjectHandle> {
        self.0.get(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Background {
    pub texture: Option<TextureHandle>,
    pub repetitions: u32,
    pub keep_aspect_ratio: bool,
}

impl Default for Background {
    fn default() -> Self {
        Background { texture: None, repetitions: 6, keep_aspect_ratio: false }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StructureTables {
    pub objects: HashMap<StructureKind, ObjectDictionary>,
    /// Keyed by number of additional rails, then pole index.
    pub poles: BTreeMap<(usize, usize), ObjectHandle>,
    pub backgrounds: BTreeMap<usize, Background>,
    pub ground_cycles: BTreeMap<usize, Vec<usize>>,
    pub rail_cycles: BTreeMap<usize, Vec<usize>>,
}

impl StructureTables {
    pub fn dictionary(&self, kind: StructureKind) -> Option<&ObjectDictionary> {
        self.objects.get(&kind)
    }

    pub fn contains(&self, kind: StructureKind, index: usize) -> bool {
        self.objects.get(&kind).map(|d| d.contains(index)).unwrap_or(false)
    }

    pub fn insert(&mut self, kind: StructureKind, index: usize, object: ObjectHandle) {
        self.objects.entry(kind).or_insert_with(ObjectDictionary::default).insert(index, object);
    }
}

/// A signal head defined by `signal(i)`.
#[derive(Clone, Debug, PartialEq)]
pub enum SignalDefinition {
    /// An animated object that selects its own state from the section aspect.
    Animated(ObjectHandle),
    /// Textures `<base>0.bmp`, `<base>1.bmp`, ... with an optional glow object.
    Textured { base: PathBuf, glow: Option<ObjectHandle> },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SignalTable(pub BTreeMap<usize, SignalDefinition>);

impl SignalTable {
    pub fn get(&self, index: usize) -> Option<&SignalDefinition> {
        self.0.get(&index)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteTables {
    pub options: RouteOptions,
    pub route: RouteInfo,
    pub train: TrainInfo,
    pub structures: StructureTables,
    pub signals: SignalTable,
    pub compatibility_signal_set: Option<PathBuf>,
    pub sounds: BTreeMap<PathBuf, SoundHandle>,
}
