//! Events attached to track elements and what they do when crossed.

use std::sync::atomic::{AtomicBool, Ordering};

use smallvec::SmallVec;

use crate::host::SoundHandle;
use crate::track::math::Vector3;

/// Which point of a train (or the camera) a follower stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventTriggerType {
    None,
    FrontCarFrontAxle,
    FrontCarRearAxle,
    OtherCarFrontAxle,
    OtherCarRearAxle,
    RearCarFrontAxle,
    RearCarRearAxle,
    Camera,
}

impl EventTriggerType {
    pub fn is_axle(self) -> bool {
        match self {
            EventTriggerType::None | EventTriggerType::Camera => false,
            _ => true,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CarRef {
    pub train: usize,
    pub car: usize,
    pub player: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    StationStart { station: usize },
    StationEnd { station: usize },
    StationPassAlarm { station: usize },
    SectionChange { previous: Option<usize>, next: usize },
    Sound {
        sound: SoundHandle,
        player_train_only: bool,
        once: bool,
        /// Follows the train instead of staying at its world position.
        dynamic: bool,
        position: Vector3,
        speed: f64,
    },
    RailSoundsChange { previous_run: usize, previous_flange: usize, next_run: usize, next_flange: usize },
    Limit { previous_speed: f64, next_speed: f64 },
    Transponder { kind: i64, data: i64, section: Option<usize> },
    Marker { marker: usize, start: bool },
    TrackEnd,
}

/// What a crossing asks of the simulation.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    SetStation(usize),
    ClearStation(usize),
    PassAlarm(usize),
    EnterSection(usize),
    PlaySound { sound: SoundHandle, position: Vector3, speed: f64 },
    SetRailSounds { run: usize, flange: usize },
    SpeedLimit(f64),
    Beacon { kind: i64, data: i64, section: Option<usize> },
    ShowMarker(usize),
    HideMarker(usize),
    DisposeTrain(usize),
    Derail(CarRef),
    ToggleWorldEnd,
}

pub type Effects = SmallVec<[Effect; 2]>;

/// Receives every event a follower crosses.
pub trait EventObserver {
    fn on_event(&mut self, event: &Event, direction: i32, effects: &[Effect]);
}

impl<F: FnMut(&Event, i32, &[Effect])> EventObserver for F {
    fn on_event(&mut self, event: &Event, direction: i32, effects: &[Effect]) {
        self(event, direction, effects)
    }
}

/// Observer that drops everything.
pub struct IgnoreEvents;

impl EventObserver for IgnoreEvents {
    fn on_event(&mut self, _: &Event, _: i32, _: &[Effect]) {}
}

#[derive(Debug)]
pub struct Event {
    /// Offset from the start of the owning element.
    pub track_position_delta: f64,
    dont_trigger_anymore: AtomicBool,
    pub kind: EventKind,
}

impl Clone for Event {
    fn clone(&self) -> Self {
        Event {
            track_position_delta: self.track_position_delta,
            dont_trigger_anymore: AtomicBool::new(self.dont_trigger_anymore.load(Ordering::Relaxed)),
            kind: self.kind.clone(),
        }
    }
}

impl Event {
    pub fn new(track_position_delta: f64, kind: EventKind) -> Event {
        Event {
            track_position_delta: track_position_delta,
            dont_trigger_anymore: AtomicBool::new(false),
            kind: kind,
        }
    }

    pub fn is_latched(&self) -> bool {
        self.dont_trigger_anymore.load(Ordering::Acquire)
    }

    /// Fires the event for a crossing in `direction` (-1 or 1). Latched
    /// events stay silent. The observer sees the event even when the
    /// crossing has no effect for this trigger type.
    pub fn trigger(&self, direction: i32, trigger: EventTriggerType, car: Option<CarRef>,
                   observer: &mut dyn EventObserver) {
        if self.is_latched() {
            return;
        }
        let effects = self.effects(direction, trigger, car);
        if self.latches() && !effects.is_empty() {
            self.dont_trigger_anymore.store(true, Ordering::Release);
        }
        trace!("event {:?} dir {} by {:?}: {} effects", self.kind, direction, trigger, effects.len());
        observer.on_event(self, direction, &effects);
    }

    fn latches(&self) -> bool {
        match self.kind {
            EventKind::Sound { once, .. } => once,
            _ => false,
        }
    }

    pub fn effects(&self, direction: i32, trigger: EventTriggerType, car: Option<CarRef>) -> Effects {
        use self::EventTriggerType::*;
        let mut out = Effects::new();
        let player = car.map(|c| c.player).unwrap_or(false);
        let forward = direction > 0;
        match self.kind {
            EventKind::StationStart { station } => if trigger == Camera {
                out.push(if forward { Effect::SetStation(station) } else { Effect::ClearStation(station) });
            },
            EventKind::StationEnd { station } => if trigger == Camera {
                out.push(if forward { Effect::ClearStation(station) } else { Effect::SetStation(station) });
            },
            EventKind::StationPassAlarm { station } => if trigger == FrontCarFrontAxle && player && forward {
                out.push(Effect::PassAlarm(station));
            },
            EventKind::SectionChange { previous, next } => if trigger == FrontCarFrontAxle {
                if forward {
                    out.push(Effect::EnterSection(next));
                } else if let Some(p) = previous {
                    out.push(Effect::EnterSection(p));
                }
            },
            EventKind::Sound { ref sound, player_train_only, dynamic, position, speed, .. } => {
                let audible = if dynamic { trigger.is_axle() } else { trigger == FrontCarFrontAxle };
                if audible && (player || !player_train_only) {
                    out.push(Effect::PlaySound { sound: sound.clone(), position: position, speed: speed });
                }
            }
            EventKind::RailSoundsChange { previous_run, previous_flange, next_run, next_flange } => {
                if trigger.is_axle() {
                    out.push(if forward {
                        Effect::SetRailSounds { run: next_run, flange: next_flange }
                    } else {
                        Effect::SetRailSounds { run: previous_run, flange: previous_flange }
                    });
                }
            }
            EventKind::Limit { previous_speed, next_speed } => if trigger == FrontCarFrontAxle {
                out.push(Effect::SpeedLimit(if forward { next_speed } else { previous_speed }));
            },
            EventKind::Transponder { kind, data, section } => if trigger == FrontCarFrontAxle && forward {
                out.push(Effect::Beacon { kind: kind, data: data, section: section });
            },
            EventKind::Marker { marker, start } => if trigger == FrontCarFrontAxle && player {
                out.push(if forward == start { Effect::ShowMarker(marker) } else { Effect::HideMarker(marker) });
            },
            EventKind::TrackEnd => match (trigger, car) {
                (Camera, _) => out.push(Effect::ToggleWorldEnd),
                (RearCarRearAxle, Some(c)) if !c.player && forward => out.push(Effect::DisposeTrain(c.train)),
                (_, Some(c)) if c.player && forward && trigger.is_axle() => out.push(Effect::Derail(c)),
                _ => {}
            },
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn car(player: bool) -> Option<CarRef> {
        Some(CarRef { train: 1, car: 0, player: player })
    }

    #[test]
    fn track_end() {
        let e = Event::new(25.0, EventKind::TrackEnd);
        assert_eq!(e.effects(1, EventTriggerType::RearCarRearAxle, car(false)).to_vec(),
                   vec![Effect::DisposeTrain(1)]);
        assert_eq!(e.effects(1, EventTriggerType::FrontCarFrontAxle, car(true)).to_vec(),
                   vec![Effect::Derail(CarRef { train: 1, car: 0, player: true })]);
        assert_eq!(e.effects(-1, EventTriggerType::Camera, None).to_vec(), vec![Effect::ToggleWorldEnd]);
        assert!(e.effects(1, EventTriggerType::FrontCarFrontAxle, car(false)).is_empty());
    }

    #[test]
    fn station_end_sets_station_when_reversing() {
        let e = Event::new(0.0, EventKind::StationEnd { station: 3 });
        assert_eq!(e.effects(-1, EventTriggerType::Camera, None).to_vec(), vec![Effect::SetStation(3)]);
        assert_eq!(e.effects(1, EventTriggerType::Camera, None).to_vec(), vec![Effect::ClearStation(3)]);
    }

    #[test]
    fn one_shot_sound_latches() {
        let e = Event::new(0.0, EventKind::Sound {
            sound: SoundHandle(PathBuf::from("a.wav")),
            player_train_only: true,
            once: true,
            dynamic: false,
            position: Vector3::ZERO,
            speed: 0.0,
        });
        let mut played = 0;
        {
            let mut count = |_: &Event, _: i32, fx: &[Effect]| played += fx.len();
            e.trigger(1, EventTriggerType::FrontCarFrontAxle, car(false), &mut count);
            assert!(!e.is_latched());
            e.trigger(1, EventTriggerType::FrontCarFrontAxle, car(true), &mut count);
            e.trigger(1, EventTriggerType::FrontCarFrontAxle, car(true), &mut count);
        }
        assert!(e.is_latched());
        assert_eq!(played, 1);
    }
}
