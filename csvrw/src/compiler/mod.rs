//! The route compiler: preprocessing, the two dispatch passes and assembly.

pub mod blocks;
pub mod command;
pub mod options;
pub mod route;
pub mod signal;
pub mod structure;
pub mod tables;
pub mod track;
pub mod train;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::diagnostics;
use crate::host::{CancelToken, Host};
use crate::input::encoding::{self, Encoding};
use crate::input::expression::Expression;
use crate::input::preprocess::{sort_by_track_position, split_into_expressions, DirectiveExpander};
use crate::input::{Dialect, PreprocessError};
use crate::track::Track;

use self::blocks::{Marker, PointOfInterest, RequestStop, RouteData, Section, Station};
use self::command::{interpret, Interpretation, Scope};
use self::tables::RouteTables;

/// How often, in expressions, the passes look at the cancel token.
const CANCEL_CHECK_INTERVAL: usize = 256;

/// The literal position of a known-bad legacy route and its intended value.
const BROKEN_TRACK_POSITION: f64 = 4535545100.0;
const FIXED_TRACK_POSITION: f64 = 45355.0;

#[derive(Clone, Debug)]
pub struct CompileOptions {
    pub dialect: Dialect,
    pub encoding: Encoding,
    pub train_path: PathBuf,
    pub object_path: PathBuf,
    pub sound_path: PathBuf,
    pub compatibility_signal_set: Option<PathBuf>,
    /// Only read options and route metadata; no blocks and no track.
    pub preview_only: bool,
    pub enable_bve_ts_hacks: bool,
    /// Strip a trailing `_` from expressions in the track pass.
    pub line_ending_fix: bool,
    /// Seed for `$Rnd` and weighted `$Include`.
    pub seed: u64,
    pub cancel: CancelToken,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            dialect: Dialect::Csv,
            encoding: Encoding::Utf8,
            train_path: PathBuf::new(),
            object_path: PathBuf::new(),
            sound_path: PathBuf::new(),
            compatibility_signal_set: None,
            preview_only: false,
            enable_bve_ts_hacks: false,
            line_ending_fix: false,
            seed: 0,
            cancel: CancelToken::new(),
        }
    }
}

#[derive(Debug, Fail)]
pub enum CompileError {
    #[fail(display = "could not read {}: {}", _0, _1)]
    Io(String, #[cause] std::io::Error),
    #[fail(display = "{}", _0)]
    Preprocessing(#[cause] PreprocessError),
    #[fail(display = "compilation was cancelled")]
    Cancelled,
}

/// The compiled route.
#[derive(Debug)]
pub struct RouteModel {
    pub tables: RouteTables,
    pub blocks: Vec<blocks::Block>,
    pub first_used_block: Option<usize>,
    pub block_interval: f64,
    pub track: Track,
    pub stations: Vec<Station>,
    pub sections: Vec<Section>,
    pub request_stops: Vec<RequestStop>,
    pub markers: Vec<Marker>,
    pub points_of_interest: Vec<PointOfInterest>,
    pub buffers: Vec<f64>,
}

impl RouteModel {
    pub fn blocks_used(&self) -> usize {
        self.blocks.len()
    }
}

/// Per-pass state threaded through every handler.
#[derive(Clone, Debug, Default)]
pub struct ParseContext {
    pub scope: Scope,
    pub block: usize,
    pub station: Option<usize>,
    pub section: usize,
}

/// Directories commands resolve their files against.
#[derive(Clone, Debug)]
pub struct Paths {
    pub route: PathBuf,
    pub objects: PathBuf,
    pub sounds: PathBuf,
    pub train: PathBuf,
}

/// Joins a file named in the route to a base directory. Backslashes are
/// taken as separators.
pub fn resolve_path(base: &Path, file: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for part in file.trim().split(|c| c == '\\' || c == '/') {
        if !part.is_empty() {
            path.push(part);
        }
    }
    path
}

pub fn compile(path: &Path, options: &CompileOptions, host: &mut dyn Host) -> Result<RouteModel, CompileError> {
    let bytes = std::fs::read(path)
        .map_err(|e| CompileError::Io(path.display().to_string(), e))?;
    let lines = encoding::split_lines(&encoding::decode(&bytes, options.encoding));
    compile_lines(path, &lines, options, host)
}

/// Compiles route text already split into lines. `path` names the route file
/// for diagnostics and relative includes.
pub fn compile_lines(path: &Path, lines: &[String], options: &CompileOptions, host: &mut dyn Host)
                     -> Result<RouteModel, CompileError> {
    host.set_loading(true);
    let result = run(path, lines, options, host);
    host.set_loading(false);
    match result {
        Err(CompileError::Cancelled) => info!("compilation of {} cancelled", path.display()),
        Err(ref e) => info!("compilation of {} failed: {}", path.display(), e),
        Ok(_) => {}
    }
    result
}

fn run(path: &Path, lines: &[String], options: &CompileOptions, host: &mut dyn Host)
       -> Result<RouteModel, CompileError> {
    let file = Arc::new(path.to_path_buf());
    let paths = Paths {
        route: path.parent().map(|p| p.to_path_buf()).unwrap_or_default(),
        objects: options.object_path.clone(),
        sounds: options.sound_path.clone(),
        train: options.train_path.clone(),
    };

    let expressions = split_into_expressions(&file, lines, options.dialect);
    debug!("{} expressions in {}", expressions.len(), path.display());
    let expressions = DirectiveExpander::new(options.dialect, options.encoding, options.seed, host)
        .and_then(|mut expander| expander.expand(expressions))
        .map_err(CompileError::Preprocessing)?;

    let mut route_options = options::scan(&expressions, options.dialect, host);
    route_options.enable_bve_ts_hacks |= options.enable_bve_ts_hacks;
    let mut expressions = sort_by_track_position(expressions, &route_options.unit_of_length, options.dialect);
    debug!("{} expressions after preprocessing", expressions.len());

    let mut tables = RouteTables::default();
    tables.options = route_options;
    tables.compatibility_signal_set = options.compatibility_signal_set.clone();
    first_pass(&mut expressions, &mut tables, options, &paths, host)?;
    info!("first pass done: {} signals, {} backgrounds", tables.signals.0.len(), tables.structures.backgrounds.len());

    if options.preview_only {
        let mut data = RouteData::new(tables.options.block_interval, 0.0, false);
        data.blocks.clear();
        return Ok(into_model(tables, data, Track::default()));
    }

    let data = second_pass(&mut expressions, &tables, options, &paths, host)?;
    info!("track pass done: {} blocks, {} stations", data.blocks_used(), data.stations.len());

    let track = {
        let mut progress = |fraction: f64| host.report_progress(2.0 / 3.0 + fraction / 3.0);
        crate::track::assemble::assemble(&data, &tables, &mut progress)
    };
    info!("assembled {} track elements", track.elements.len());
    Ok(into_model(tables, data, track))
}

fn into_model(tables: RouteTables, data: RouteData, track: Track) -> RouteModel {
    RouteModel {
        tables: tables,
        blocks: data.blocks,
        first_used_block: data.first_used_block,
        block_interval: data.block_interval,
        track: track,
        stations: data.stations,
        sections: data.sections,
        request_stops: data.request_stops,
        markers: data.markers,
        points_of_interest: data.points_of_interest,
        buffers: data.buffers,
    }
}

fn check_cancel(j: usize, options: &CompileOptions) -> Result<(), CompileError> {
    if j % CANCEL_CHECK_INTERVAL == 0 && options.cancel.is_cancelled() {
        return Err(CompileError::Cancelled);
    }
    Ok(())
}

/// Everything except track positions: builds the route tables.
fn first_pass(expressions: &mut [Expression], tables: &mut RouteTables, options: &CompileOptions,
              paths: &Paths, host: &mut dyn Host) -> Result<(), CompileError> {
    let n = expressions.len().max(1) as f64;
    let mut ctx = ParseContext::default();
    if !options.preview_only {
        structure::register_default_poles(tables, paths, host);
    }

    for j in 0..expressions.len() {
        host.report_progress(j as f64 / n / 3.0);
        check_cancel(j, options)?;

        let expr = &mut expressions[j];
        if options.dialect == Dialect::Rw && expr.section_header().is_none() {
            expr.convert_rw_to_csv(&ctx.scope.section, ctx.scope.always_prefix);
        }
        let expr = &*expr;
        let cmd = match interpret(expr, &mut ctx.scope, options.dialect, &tables.options.unit_of_length) {
            Ok(Interpretation::Command(cmd)) => cmd,
            Ok(_) => continue,
            Err(msg) => {
                diagnostics::error(host, expr, msg);
                continue;
            }
        };

        match cmd.namespace.as_str() {
            "route" => route::handle(&cmd, expr, tables, paths, host),
            _ if options.preview_only => {}
            "train" => train::handle(&cmd, expr, tables, paths, host),
            "structure" | "texture" => structure::handle(&cmd, expr, tables, paths, host),
            "" => signal::handle(&cmd, expr, tables, paths, host),
            "cycle" => structure::handle_cycle(&cmd, expr, tables, host),
            _ => {}
        }
    }
    Ok(())
}

/// Track positions and `track.*` commands: fills the blocks.
fn second_pass(expressions: &mut [Expression], tables: &RouteTables, options: &CompileOptions,
               paths: &Paths, host: &mut dyn Host) -> Result<RouteData, CompileError> {
    let n = expressions.len().max(1) as f64;
    let initial_height = if options.dialect == Dialect::Rw { 0.3 } else { 0.0 };
    let mut data = RouteData::new(tables.options.block_interval, initial_height, options.line_ending_fix);
    let mut ctx = ParseContext::default();

    for j in 0..expressions.len() {
        host.report_progress(1.0 / 3.0 + j as f64 / n / 3.0);
        check_cancel(j, options)?;

        let expr = &mut expressions[j];
        if data.line_ending_fix && expr.text.ends_with('_') {
            let fixed = expr.text[..expr.text.len() - 1].trim().to_string();
            expr.text = fixed;
        }
        let expr = &*expr;
        let cmd = match interpret(expr, &mut ctx.scope, options.dialect, &tables.options.unit_of_length) {
            Ok(Interpretation::Command(cmd)) => cmd,
            Ok(Interpretation::Position { value, has_arguments }) => {
                set_track_position(value, has_arguments, expr, &mut ctx, &mut data, tables, options, host);
                continue;
            }
            Ok(Interpretation::Scope) | Err(_) => continue,
        };

        match cmd.namespace.as_str() {
            "track" => track::handle(&cmd, expr, &mut ctx, tables, &mut data, paths, host),
            "options" | "route" | "train" | "structure" | "texture" | "" | "cycle" => {}
            _ => diagnostics::warning(host, expr, format!(
                "The command {} is not supported", cmd.qualified_name())),
        }
    }
    data.finish();
    Ok(data)
}

fn set_track_position(value: f64, has_arguments: bool, expr: &Expression, ctx: &mut ParseContext,
                      data: &mut RouteData, tables: &RouteTables, options: &CompileOptions,
                      host: &mut dyn Host) {
    if has_arguments {
        diagnostics::error(host, expr, "A track position must not contain any arguments".to_string());
        return;
    }
    if value < 0.0 {
        diagnostics::error(host, expr, "Negative track position encountered".to_string());
        return;
    }
    let value = if tables.options.enable_bve_ts_hacks && options.dialect == Dialect::Rw
        && value == BROKEN_TRACK_POSITION {
        FIXED_TRACK_POSITION
    } else {
        value
    };
    data.track_position = value;
    ctx.block = data.block_index(value);
    if data.first_used_block.is_none() {
        data.first_used_block = Some(ctx.block);
    }
    data.create_missing_blocks(ctx.block);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CollectingHost;

    fn lines(s: &str) -> Vec<String> {
        s.lines().map(|l| l.to_string()).collect()
    }

    fn compile_str(src: &str, options: &CompileOptions) -> (Result<RouteModel, CompileError>, CollectingHost) {
        let mut host = CollectingHost::new();
        let result = compile_lines(Path::new("route.csv"), &lines(src), options, &mut host);
        (result, host)
    }

    #[test]
    fn two_block_track_scenario() {
        let (model, host) = compile_str("[Track]\n0\ntrack.rail(1)\n25\ntrack.rail(1,ended)",
                                        &CompileOptions::default());
        let model = model.unwrap();
        assert!(host.errors().next().is_none(), "{:?}", host.messages);
        assert_eq!(model.first_used_block, Some(0));
        assert_eq!(model.blocks_used(), 2);
        assert!(model.blocks[0].rail(1).unwrap().started);
        assert!(model.blocks[1].rail(1).unwrap().ended);
    }

    #[test]
    fn negative_position_is_an_error_without_mutation() {
        let (model, host) = compile_str("-50\nTrack.Pitch 5", &CompileOptions::default());
        let model = model.unwrap();
        assert_eq!(host.errors().count(), 1);
        assert_eq!(model.first_used_block, None);
        assert_eq!(model.blocks_used(), 1);
    }

    #[test]
    fn position_with_arguments_is_an_error() {
        let (model, host) = compile_str("0\n100 x", &CompileOptions::default());
        assert_eq!(host.errors().count(), 1);
        assert_eq!(model.unwrap().blocks_used(), 1);
    }

    #[test]
    fn legacy_position_hack() {
        let src = "[Railway]\n4535545100";
        let mut options = CompileOptions::default();
        options.dialect = Dialect::Rw;
        options.enable_bve_ts_hacks = true;
        let (model, _) = compile_str(src, &options);
        assert_eq!(model.unwrap().blocks_used(), 45355 / 25 + 1);
    }

    #[test]
    fn unknown_namespace_warns_in_track_pass_only() {
        let (_, host) = compile_str("Foo.Bar 1", &CompileOptions::default());
        assert_eq!(host.warnings().count(), 1);
        assert!(host.loading == false);
    }

    #[test]
    fn broken_directives_are_fatal() {
        let (model, host) = compile_str("$If(1)\n0", &CompileOptions::default());
        match model {
            Err(CompileError::Preprocessing(_)) => {}
            x => panic!("{:?}", x.map(|_| ())),
        }
        assert!(!host.loading);
    }

    #[test]
    fn preview_skips_the_track() {
        let mut options = CompileOptions::default();
        options.preview_only = true;
        let (model, _) = compile_str("Route.Comment hello, world\n0\nTrack.Curve 300", &options);
        let model = model.unwrap();
        assert_eq!(model.tables.route.comment, "hello");
        assert!(model.blocks.is_empty());
        assert!(model.track.elements.is_empty());
    }

    #[test]
    fn progress_is_monotone_and_below_one() {
        let (_, host) = compile_str("0\nTrack.Curve 300\n50\nTrack.Pitch 2\n100", &CompileOptions::default());
        assert!(!host.progress.is_empty());
        for w in host.progress.windows(2) {
            assert!(w[0] <= w[1]);
        }
        assert!(host.progress.iter().all(|&p| p >= 0.0 && p < 1.0));
    }

    #[test]
    fn paths_use_both_separators() {
        let p = resolve_path(Path::new("objects"), "rails\\rail_1.csv");
        assert_eq!(p, Path::new("objects").join("rails").join("rail_1.csv"));
    }
}
