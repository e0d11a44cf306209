// In src/main.rs

//! Main entry point for `subserial`.
//!
//! Expands a function into its Taylor series about `a`, feeds the terms at
//! `z0` through a `2^k`-lane engine, then writes the final lane Points as a PNG
//! and a JSON dump.

use subserial::{
    config::{Config, CONFIG},
    engine::{
        dispatch::{BackendKind, LaneDispatch},
        lane_count, ComputeEngine, TraceFlags,
    },
    monitor::SnapshotMonitor,
    render::{PointDump, PointRenderer},
    series::{parse_complex, SeriesFunction, TaylorSeries},
    sink::{HostSink, PointSink, SharedPointBuffer, SharedSink},
    spectral, Point,
};

use anyhow::Context;
use clap::Parser;
use log::{info, warn};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use num_complex::Complex64;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Set from the SIGINT handler; the engine stops requesting terms once it flips.
static CANCELLED: AtomicBool = AtomicBool::new(false);

/// Spectral evaluation of a power series across 2^k accumulation lanes.
#[derive(Parser, Debug)]
#[command(name = "subserial", author, version, about)]
struct Args {
    /// Function to expand: exp(z), 1/(1-z), sin(z), cos(z) or log(1+z).
    function: Option<SeriesFunction>,

    /// Number of series terms to feed the engine.
    degree: Option<usize>,

    /// Expansion base point, e.g. 0 or 0.1+0.2j.
    #[arg(value_parser = parse_complex, allow_hyphen_values = true)]
    a: Option<Complex64>,

    /// Point at which to perform the spectral evaluation.
    #[arg(value_parser = parse_complex, allow_hyphen_values = true)]
    z0: Option<Complex64>,

    /// Parallelism exponent k (2^k lanes, reset every k terms).
    #[arg(short = 'k', long)]
    parallelism: Option<u32>,

    /// JSON configuration file (defaults to $SUBSERIAL_CONFIG, then built-ins).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Lane dispatch backend: serial or parallel.
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Worker threads for the parallel backend.
    #[arg(long)]
    threads: Option<usize>,

    /// Accumulate into a buffer shared with a monitor thread.
    #[arg(long)]
    shared: bool,

    /// Disable per-step re-centring of the shared buffer.
    #[arg(long)]
    no_recenter: bool,

    /// Output PNG path.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Output JSON dump path.
    #[arg(long, conflicts_with = "no_dump")]
    dump: Option<PathBuf>,

    /// Skip the JSON dump.
    #[arg(long)]
    no_dump: bool,

    /// Buffers to log after every step, e.g. "codes,switches,points".
    #[arg(long, value_parser = TraceFlags::parse)]
    trace: Option<TraceFlags>,
}

impl Args {
    fn apply_to(&self, config: &mut Config) {
        if let Some(function) = self.function {
            config.series.function = function;
        }
        if let Some(degree) = self.degree {
            config.series.terms = degree;
        }
        if let Some(a) = self.a {
            config.series.base_point = a;
        }
        if let Some(z0) = self.z0 {
            config.series.eval_point = z0;
        }
        if let Some(k) = self.parallelism {
            config.engine.parallelism = k;
        }
        if let Some(backend) = self.backend {
            config.engine.backend = backend;
        }
        if self.threads.is_some() {
            config.engine.threads = self.threads;
        }
        if let Some(trace) = self.trace {
            config.engine.trace = trace;
        }
        if self.shared {
            config.sink.shared = true;
        }
        if self.no_recenter {
            config.sink.recenter = Some(false);
        }
        if let Some(image) = &self.image {
            config.output.image_path = image.clone();
        }
        if self.dump.is_some() {
            config.output.dump_path = self.dump.clone();
        }
        if self.no_dump {
            config.output.dump_path = None;
        }
    }
}

extern "C" fn handle_sigint(_: nix::libc::c_int) {
    CANCELLED.store(true, Ordering::SeqCst);
}

fn install_sigint_handler() -> anyhow::Result<()> {
    let action = SigAction::new(
        SigHandler::Handler(handle_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // SAFETY: the handler only stores to an atomic.
    unsafe { sigaction(Signal::SIGINT, &action) }.context("Failed to install SIGINT handler")?;
    Ok(())
}

/// Feeds the configured series through `engine`; returns the final Points and
/// the number of steps taken.
fn drive<S: PointSink>(
    engine: ComputeEngine<S>,
    config: &Config,
) -> anyhow::Result<(Vec<Point>, u64)> {
    let mut engine = engine.with_trace(config.engine.trace);
    if let Some(recenter) = config.sink.recenter {
        engine = engine.with_recentering(recenter);
    }

    let series = &config.series;
    let mut source = TaylorSeries::new(series.function, series.base_point, series.eval_point);
    info!(
        "Expanding {} about {} at {} for {} terms",
        series.function, series.base_point, series.eval_point, series.terms
    );

    let processed = engine
        .process_terms(&mut source, series.terms, &CANCELLED)
        .context("Engine step failed")?;
    if processed < series.terms {
        warn!("Interrupted after {} of {} terms", processed, series.terms);
    }

    let points = engine.snapshot().context("Failed to read final points")?;
    let recovered = spectral::series_sum(&points, engine.parallelism())?;
    info!(
        "Partial sum {} (recovered from lanes: {}), f(z0) = {}",
        source.partial_sum(),
        recovered,
        series.function.evaluate(series.eval_point)
    );
    Ok((points, engine.iteration()))
}

fn main() -> anyhow::Result<()> {
    // Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => (*CONFIG).clone(),
    };
    args.apply_to(&mut config);
    info!("Starting subserial with {:?}", config);

    install_sigint_handler()?;

    let k = config.engine.parallelism;
    let lanes = lane_count(k).context("Invalid parallelism")?;
    let dispatch = LaneDispatch::new(
        config.engine.backend,
        config.engine.threads,
        config.engine.parallel_threshold,
    )
    .context("Failed to initialise lane dispatch")?;

    let (points, iterations) = if config.sink.shared {
        let buffer =
            SharedPointBuffer::try_new(lanes).context("Failed to allocate shared buffer")?;
        let monitor = SnapshotMonitor::spawn(
            buffer.clone(),
            Duration::from_millis(config.sink.monitor_interval_ms),
        )
        .context("Failed to spawn SnapshotMonitor")?;
        let engine = ComputeEngine::new(k, dispatch, SharedSink::new(buffer))
            .context("Failed to build shared-buffer engine")?;
        let result = drive(engine, &config);
        let report = monitor.finish();
        info!(
            "SnapshotMonitor observed {} frames, last: {:?}",
            report.frames_observed, report.last
        );
        result?
    } else {
        let sink = HostSink::try_new(lanes).context("Failed to allocate host points")?;
        let engine = ComputeEngine::new(k, dispatch, sink)
            .context("Failed to build host engine")?;
        drive(engine, &config)?
    };

    let output = &config.output;
    PointRenderer::new(output.width, output.height, output.radius_px)
        .save(&points, &output.image_path)?;
    if let Some(dump_path) = &output.dump_path {
        PointDump {
            parallelism: k,
            iterations,
            points,
        }
        .write(dump_path)?;
    }

    info!("subserial exited successfully.");
    Ok(())
}
