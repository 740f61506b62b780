extern crate csvrw;
extern crate tempfile;
#[macro_use] extern crate assert_approx_eq;

use csvrw::host::Message;
use csvrw::track::events::{CarRef, Effect, Event, EventKind, EventTriggerType};
use csvrw::track::follower::TrackFollower;
use csvrw::*;
use std::io::Write;
use std::path::Path;

fn lines(s: &str) -> Vec<String> {
    s.lines().map(|l| l.to_string()).collect()
}

fn compile_str(src: &str, options: &CompileOptions) -> (RouteModel, CollectingHost) {
    let mut host = CollectingHost::new();
    let model = compile_lines(Path::new("route.csv"), &lines(src), options, &mut host).unwrap();
    (model, host)
}

#[test]
fn two_blocks_from_a_track_section() {
    let (model, host) = compile_str("[Track]\n0\ntrack.rail(1)\n25\ntrack.rail(1,ended)", &CompileOptions::default());
    assert_eq!(host.errors().count(), 0, "{:?}", host.messages);
    assert_eq!(model.first_used_block, Some(0));
    assert_eq!(model.blocks_used(), 2);
    assert_eq!(model.track.elements.len(), 2);
}

#[test]
fn signal_load_suffix_is_equivalent() {
    let (a, ha) = compile_str("signal1.load(sig.csv)", &CompileOptions::default());
    let (b, hb) = compile_str("signal1(sig.csv)", &CompileOptions::default());
    assert_eq!(a.tables.signals, b.tables.signals);
    assert_eq!(ha.messages.len(), hb.messages.len());

    let (c, _) = compile_str("Signal(1).Load sig.csv", &CompileOptions::default());
    let (d, _) = compile_str("Signal(1)(sig.csv)", &CompileOptions::default());
    assert_eq!(c.tables.signals, d.tables.signals);
    assert!(c.tables.signals.get(1).is_some());
}

#[test]
fn negative_position_leaves_blocks_alone() {
    let (model, host) = compile_str("0\nTrack.Curve 400\n-25\nTrack.Pitch 3", &CompileOptions::default());
    assert_eq!(host.errors().count(), 1);
    assert_eq!(model.blocks_used(), 1);
    assert_approx_eq!(model.blocks[0].pitch, 0.003, 1e-12);
    assert_eq!(model.blocks[0].curve_radius, 400.0);
}

/// Cancels the compilation from inside the progress callback.
struct CancellingHost {
    token: CancelToken,
    cancel_at: usize,
    calls: usize,
    last_progress: f64,
    loading: bool,
}

impl Host for CancellingHost {
    fn add_message(&mut self, _: Message) {}

    fn report_progress(&mut self, progress: f64) {
        self.calls += 1;
        self.last_progress = progress;
        if self.calls == self.cancel_at {
            self.token.cancel();
        }
    }

    fn set_loading(&mut self, loading: bool) {
        self.loading = loading;
    }
}

#[test]
fn cancellation_stops_within_one_check_interval() {
    let src: Vec<String> = (0..1000).map(|i| format!("{}", i * 25)).collect();
    let options = CompileOptions::default();
    let mut host = CancellingHost {
        token: options.cancel.clone(),
        cancel_at: 300,
        calls: 0,
        last_progress: 0.0,
        loading: false,
    };
    let result = compile_lines(Path::new("route.csv"), &src, &options, &mut host);
    match result {
        Err(CompileError::Cancelled) => {}
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("compilation was not cancelled"),
    }
    assert!(host.calls > 300 && host.calls <= 300 + 256 + 1, "{}", host.calls);
    assert!(host.last_progress < 1.0 / 3.0);
    assert!(!host.loading);
}

#[test]
fn hermite_cant_is_exact_at_elements() {
    let src = "0\nTrack.Curve 300;100\n25\nTrack.Curve 300;40\n50\nTrack.Curve 0;0\n75";
    let (model, _) = compile_str(src, &CompileOptions::default());
    let track = &model.track;
    let mut follower = TrackFollower::new(EventTriggerType::None, None);
    let mut ignore = csvrw::track::events::IgnoreEvents;
    for (i, e) in track.elements.iter().enumerate() {
        follower.update_absolute(track, e.starting_track_position, true, false, &mut ignore);
        assert_eq!(follower.last_element, i);
        assert_approx_eq!(follower.curve_cant, e.curve_cant, 1e-15);
        assert_approx_eq!(follower.world_position.x, e.world_position.x, 1e-9);
        assert_approx_eq!(follower.world_position.z, e.world_position.z, 1e-9);
    }
}

fn fired(track: &csvrw::track::Track, step: f64) -> Vec<(String, i32)> {
    let car = CarRef { train: 0, car: 0, player: true };
    let mut follower = TrackFollower::new(EventTriggerType::FrontCarFrontAxle, Some(car));
    let mut out = Vec::new();
    {
        let mut record = |e: &Event, d: i32, _: &[Effect]| out.push((format!("{:?}", e.kind), d));
        walk(track, &mut follower, step, &mut record);
    }
    out
}

#[test]
fn events_fire_once_for_any_step() {
    let src = "0\n10\nTrack.Limit 60\n80\nTrack.Sta A;;;1\n95\nTrack.Stop 1\n110\nTrack.Limit 0\n\
               Track.Section 0;4\n160\nTrack.Beacon 3;-1;0;7\n190";
    let (model, host) = compile_str(src, &CompileOptions::default());
    assert_eq!(host.errors().count(), 0, "{:?}", host.messages);
    let coarse = fired(&model.track, 40.0);
    let fine = fired(&model.track, 0.5);
    assert_eq!(coarse, fine);
    let kinds: Vec<&str> = coarse.iter().map(|(k, _)| k.split(|c: char| c == ' ' || c == '{').next().unwrap()).collect();
    assert_eq!(kinds, vec!["Limit", "StationPassAlarm", "StationStart", "StationEnd", "SectionChange",
                           "Limit", "Transponder", "TrackEnd"]);
    assert!(coarse.iter().all(|&(_, d)| d == 1));
    let end = model.track.events().filter(|(_, e)| e.kind == EventKind::TrackEnd).count();
    assert_eq!(end, 1);
}

#[test]
fn included_files_are_compiled() {
    let dir = tempfile::tempdir().unwrap();
    let route = dir.path().join("route.csv");
    let part = dir.path().join("part.csv");
    {
        let mut f = std::fs::File::create(&route).unwrap();
        writeln!(f, "Route.Comment included").unwrap();
        writeln!(f, "0").unwrap();
        writeln!(f, "$Include(part.csv)").unwrap();
        writeln!(f, "50").unwrap();
    }
    {
        let mut f = std::fs::File::create(&part).unwrap();
        writeln!(f, "Track.Pitch 10").unwrap();
        writeln!(f, "Track.Curve -500").unwrap();
    }
    let (model, host) = compile_file(&route, &CompileOptions::default()).unwrap();
    assert_eq!(host.errors().count(), 0, "{:?}", host.messages);
    assert_eq!(model.tables.route.comment, "included");
    assert_eq!(model.blocks_used(), 3);
    assert_eq!(model.blocks[2].curve_radius, -500.0);
    assert_approx_eq!(model.blocks[1].pitch, 0.01, 1e-12);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut host = CollectingHost::new();
    match compile(&dir.path().join("nothing.csv"), &CompileOptions::default(), &mut host) {
        Err(CompileError::Io(..)) => {}
        x => panic!("{:?}", x.map(|_| ())),
    }
}
