//! laser-track - follow detected objects with a Helios laser.
//!
//! Reads a detection recording, maps every detection onto the DAC coordinate
//! space and writes frames to all attached Helios DACs (or to the built-in
//! simulator with `--dry-run`).

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use laser_tracker::{
    DeviceDriver, DeviceSet, Error, FrameSink, JsonlSink, LogSink, Pipeline, PointPattern,
    ReplayDetector, ReplayFrame, ReplaySource, Result, SimulatedDriver, TrackerConfig,
};

#[derive(Parser)]
#[command(
    name = "laser-track",
    about = "Track detected objects with a Helios laser DAC"
)]
struct Args {
    /// Input stream (a .jsonl detection recording)
    #[arg(default_value = "/dev/video0")]
    input: String,

    /// Output stream; empty logs the status line instead
    #[arg(default_value = "")]
    output: String,

    /// Detection network name [default: ssd-mobilenet-v2]
    #[arg(long)]
    network: Option<String>,

    /// Detection overlay flags, recorded with each rendered frame ("none" to omit)
    #[arg(long, default_value = "box,labels,conf")]
    overlay: String,

    /// Minimum detection confidence [default: 0.5]
    #[arg(long)]
    threshold: Option<f32>,

    /// Camera frame width in pixels [default: 800]
    #[arg(long)]
    width: Option<u32>,

    /// Camera frame height in pixels [default: 600]
    #[arg(long)]
    height: Option<u32>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to libHeliosDacAPI
    #[arg(long, default_value = "./libHeliosDacAPI.so")]
    library: PathBuf,

    /// Which points of each detection to project [default: corners]
    #[arg(long, value_enum)]
    pattern: Option<PatternArg>,

    /// Point rate for detection frames [default: 64000]
    #[arg(long)]
    pps: Option<u32>,

    /// Write to simulated DACs instead of loading the vendor library
    #[arg(long)]
    dry_run: bool,

    /// Number of simulated DACs for --dry-run
    #[arg(long, default_value_t = 1)]
    simulated_devices: usize,

    /// Stop after this many captured frames
    #[arg(long)]
    max_frames: Option<u64>,
}

#[derive(Copy, Clone, ValueEnum)]
enum PatternArg {
    Center,
    Corners,
    Outline,
}

impl From<PatternArg> for PointPattern {
    fn from(arg: PatternArg) -> Self {
        match arg {
            PatternArg::Center => PointPattern::Center,
            PatternArg::Corners => PointPattern::Corners,
            PatternArg::Outline => PointPattern::Outline,
        }
    }
}

/// Render target chosen from the `output` argument.
enum Output {
    Log(LogSink),
    Jsonl(JsonlSink<BufWriter<File>>),
}

impl Output {
    fn open(output: &str, overlay: &str) -> Result<Self> {
        if output.is_empty() {
            Ok(Output::Log(LogSink::new()))
        } else {
            log::info!("Writing render records to {}", output);
            Ok(Output::Jsonl(JsonlSink::create(output)?.with_overlay(overlay)))
        }
    }

    fn finish(&mut self) -> Result<()> {
        match self {
            Output::Log(_) => Ok(()),
            Output::Jsonl(sink) => sink.finish(),
        }
    }
}

impl FrameSink<ReplayFrame> for Output {
    fn render(&mut self, image: &ReplayFrame) -> Result<()> {
        match self {
            Output::Log(sink) => FrameSink::<ReplayFrame>::render(sink, image),
            Output::Jsonl(sink) => sink.render(image),
        }
    }

    fn set_status(&mut self, status: &str) -> Result<()> {
        match self {
            Output::Log(sink) => FrameSink::<ReplayFrame>::set_status(sink, status),
            Output::Jsonl(sink) => sink.set_status(status),
        }
    }
}

fn build_config(args: &Args) -> Result<TrackerConfig> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };
    if let Some(network) = &args.network {
        config.network = network.clone();
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(width) = args.width {
        config.mapping.frame_width = width;
    }
    if let Some(height) = args.height {
        config.mapping.frame_height = height;
    }
    if let Some(pattern) = args.pattern {
        config.pattern = pattern.into();
    }
    if let Some(pps) = args.pps {
        config.output.point_rate = pps;
    }
    if args.max_frames.is_some() {
        config.max_frames = args.max_frames;
    }
    config.validate()?;
    Ok(config)
}

fn open_driver(args: &Args) -> Result<Box<dyn DeviceDriver>> {
    if args.dry_run {
        log::info!("Dry run with {} simulated DAC(s)", args.simulated_devices);
        return Ok(Box::new(SimulatedDriver::new(args.simulated_devices)));
    }
    load_helios(&args.library)
}

#[cfg(feature = "helios")]
fn load_helios(path: &Path) -> Result<Box<dyn DeviceDriver>> {
    Ok(Box::new(laser_tracker::HeliosBackend::load(path)?))
}

#[cfg(not(feature = "helios"))]
fn load_helios(path: &Path) -> Result<Box<dyn DeviceDriver>> {
    Err(Error::msg(format!(
        "built without the `helios` feature, cannot load {}; use --dry-run",
        path.display()
    )))
}

fn open_source(input: &str) -> Result<ReplaySource<std::io::BufReader<File>>> {
    let path = Path::new(input);
    if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
        return Err(Error::msg(format!(
            "unsupported input '{}': only .jsonl detection recordings can be read",
            input
        )));
    }
    ReplaySource::open(path)
}

fn run(args: Args) -> Result<()> {
    let config = build_config(&args)?;
    let pipeline = Pipeline::new(config)?;

    let mut source = open_source(&args.input)?;
    let mut output = Output::open(&args.output, &args.overlay)?;
    let mut detector = ReplayDetector::new(pipeline.config().threshold);

    let mut devices = DeviceSet::open(open_driver(&args)?)?;
    let summary = pipeline.run(&mut source, &mut detector, &mut output, &mut devices)?;
    output.finish()?;
    devices.close()?;

    let stats = &summary.stats;
    println!(
        "{}: {} frame(s), {} timeout(s), {} detection(s), {} frame(s) dispatched, {} idle",
        summary.exit,
        stats.frames_captured,
        stats.capture_timeouts,
        stats.detections,
        stats.frames_dispatched,
        stats.idle_frames
    );
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
