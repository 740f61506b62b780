extern crate csvrw;
extern crate failure;
extern crate structopt;
#[macro_use] extern crate log;

use csvrw::track::events::{CarRef, Effect, Event, EventTriggerType};
use csvrw::track::follower::TrackFollower;
use csvrw::*;
use std::path::PathBuf;
use structopt::StructOpt;

/// csvrw -- compile CSV/RW route files into a track
#[derive(StructOpt, Debug)]
#[structopt(name = "csvrw")]
struct Opt {
    /// Verbose mode (-v, -vv, -vvv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u8,

    /// Route file
    #[structopt(parse(from_os_str))]
    route: PathBuf,

    /// Read the route as the legacy row-based dialect
    #[structopt(long = "rw")]
    rw: bool,

    /// Text encoding: utf8 | latin1 | utf16le | utf16be
    #[structopt(short = "e", long = "encoding", default_value = "utf8")]
    encoding: Encoding,

    /// Directory objects are resolved against (default: the route's folder)
    #[structopt(long = "objects", parse(from_os_str))]
    objects: Option<PathBuf>,

    /// Directory sounds are resolved against (default: the route's folder)
    #[structopt(long = "sounds", parse(from_os_str))]
    sounds: Option<PathBuf>,

    /// Train folder
    #[structopt(long = "train", parse(from_os_str))]
    train: Option<PathBuf>,

    /// Compatibility signal set
    #[structopt(long = "signal-set", parse(from_os_str))]
    signal_set: Option<PathBuf>,

    /// Only read route options and metadata
    #[structopt(long = "preview")]
    preview: bool,

    /// Enable the corrections for known broken legacy routes
    #[structopt(long = "hacks")]
    hacks: bool,

    /// Strip a trailing underscore from every expression
    #[structopt(long = "line-ending-fix")]
    line_ending_fix: bool,

    /// Seed for $Rnd and weighted $Include
    #[structopt(short = "s", long = "seed", default_value = "0")]
    seed: u64,

    /// Output the assembled track as JSON
    #[structopt(short = "j", long = "json", parse(from_os_str))]
    json: Option<PathBuf>,

    /// Walk a player train along the track in steps of this length and print the events
    #[structopt(short = "w", long = "walk")]
    walk: Option<f64>,
}

struct StderrLogger {
    level: log::LevelFilter,
}

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let logger = Box::new(StderrLogger { level: level });
    if log::set_boxed_logger(logger).is_ok() {
        log::set_max_level(level);
    }
}

fn run(opt: &Opt) -> AppResult<()> {
    let folder = opt.route.parent().map(|p| p.to_path_buf()).unwrap_or_default();
    let options = CompileOptions {
        dialect: if opt.rw { Dialect::Rw } else { Dialect::Csv },
        encoding: opt.encoding,
        train_path: opt.train.clone().unwrap_or_else(|| folder.clone()),
        object_path: opt.objects.clone().unwrap_or_else(|| folder.clone()),
        sound_path: opt.sounds.clone().unwrap_or_else(|| folder.clone()),
        compatibility_signal_set: opt.signal_set.clone(),
        preview_only: opt.preview,
        enable_bve_ts_hacks: opt.hacks,
        line_ending_fix: opt.line_ending_fix,
        seed: opt.seed,
        ..Default::default()
    };
    info!("compiling {}", opt.route.display());
    let (model, host) = compile_file(&opt.route, &options)?;

    for m in &host.messages {
        if m.severity >= Severity::Warning || opt.verbose >= 1 {
            println!("{}", m);
        }
    }
    println!("# Route");
    if !model.tables.route.comment.is_empty() {
        println!("  {}", model.tables.route.comment);
    }
    println!("  blocks: {} (first used: {:?})", model.blocks_used(), model.first_used_block);
    println!("  track elements: {}", model.track.elements.len());
    println!("  stations: {}", model.stations.len());
    for s in &model.stations {
        println!("    - {} at {}", s.name, s.track_position);
    }
    println!("  sections: {}", model.sections.len());
    println!("  errors: {}, warnings: {}", host.errors().count(), host.warnings().count());

    if let Some(ref json) = opt.json {
        use std::fs::File;
        use std::io::BufWriter;
        let file = File::create(json)?;
        let mut writer = BufWriter::new(&file);
        csvrw::output::json::json_track(&model, &mut writer)?;
    }

    if let Some(step) = opt.walk {
        println!("# Walk");
        let car = CarRef { train: 0, car: 0, player: true };
        let mut follower = TrackFollower::new(EventTriggerType::FrontCarFrontAxle, Some(car));
        let mut print = |event: &Event, direction: i32, effects: &[Effect]| {
            println!("> {:?} dir {} {:?}", event.kind, direction, effects);
        };
        walk(&model.track, &mut follower, step, &mut print);
    }

    Ok(())
}

pub fn main() {
    let opt = Opt::from_args();
    init_logging(opt.verbose);
    debug!("{:?}", opt);
    match run(&opt) {
        Ok(()) => {}
        Err(e) => {
            println!("Error:\n{}", e.as_fail());
            std::process::exit(1);
        }
    }
}
