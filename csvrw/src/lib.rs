extern crate smallvec;
extern crate ordered_float;
extern crate regex;
extern crate rand;
extern crate rand_chacha;
extern crate failure;
#[macro_use] extern crate failure_derive;
#[macro_use] extern crate log;

pub mod compiler;
pub mod diagnostics;
pub mod host;
pub mod input;
pub mod output;
pub mod track;

pub use compiler::{compile, compile_lines, CompileError, CompileOptions, RouteModel};
pub use host::{CancelToken, CollectingHost, Host, Message, Severity};
pub use input::encoding::Encoding;
pub use input::Dialect;

use std::path::Path;
use track::events::EventObserver;
use track::follower::TrackFollower;
use track::Track;

pub type AppResult<T> = Result<T, failure::Error>;

/// Compiles a route file, collecting the diagnostics in memory.
pub fn compile_file(path: &Path, options: &CompileOptions) -> AppResult<(RouteModel, CollectingHost)> {
    let mut host = CollectingHost::new();
    let model = compile(path, options, &mut host)?;
    Ok((model, host))
}

/// Moves `follower` from its current position to the end of the track in
/// steps of `step` until just past the track end, reporting every crossed event.
pub fn walk(track: &Track, follower: &mut TrackFollower, step: f64, observer: &mut dyn EventObserver) {
    let step = step.max(0.001);
    let end = match track.end_position() {
        Some(p) => p + step,
        None => return,
    };
    while follower.track_position < end {
        follower.update_relative(track, step, true, true, observer);
    }
}
