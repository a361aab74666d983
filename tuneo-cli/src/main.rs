//! # Tuneo - Command-line Tuner
//!
//! Runs a tuner session against the default microphone (or a synthetic
//! test signal) and prints one line per processed frame.
//!
//! ## Architecture
//! - **Main Thread**: argument parsing, then reads published states
//! - **Pipeline Thread**: owned by the [`Session`], processes audio frames
//! - **Communication**: bounded crossbeam channel of [`tuneo_core::PipelineState`]

mod gauge;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use crossbeam_channel::RecvTimeoutError;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tuneo_core::synthetic::SyntheticCapture;
use tuneo_core::{
    CpalCapture, GuitarTuning, InstrumentKind, PerformanceMode, PipelineConfig, Session, TunerConfig,
    TunerError, TuningReference, YinEstimator, state_channel,
};

/// Sample rate of the synthetic test signal.
const SYNTHETIC_SAMPLE_RATE: f32 = 44100.0;
/// Published states kept while the terminal catches up.
const STATE_QUEUE_DEPTH: usize = 16;

#[derive(Parser)]
#[command(name = "tuneo")]
#[command(about = "Adaptive instrument tuner for the terminal")]
#[command(version)]
struct Cli {
    /// Instrument to tune
    #[arg(long, value_enum, default_value = "guitar")]
    instrument: InstrumentArg,

    /// Reference frequency of A4 in Hz
    #[arg(long, value_enum, default_value = "440")]
    reference: ReferenceArg,

    /// Guitar tuning preset
    #[arg(long, value_enum, default_value = "standard")]
    guitar_tuning: GuitarTuningArg,

    /// Tune a fixed string (0 = lowest) instead of detecting it
    #[arg(long)]
    string: Option<usize>,

    /// Load the tuner selection from a JSON file instead of the flags above
    #[arg(long)]
    config: Option<PathBuf>,

    /// Performance preset for the pitch tracker
    #[arg(long, value_enum)]
    performance: Option<PerformanceArg>,

    /// Refine pitch estimates with an FFT peak search
    #[arg(long)]
    refine: bool,

    /// Use a synthetic sweep instead of the microphone
    #[arg(long)]
    synthetic: bool,

    /// Stop after this many seconds (runs until killed otherwise)
    #[arg(long)]
    duration: Option<u64>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum InstrumentArg {
    Guitar,
    Chromatic,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReferenceArg {
    #[value(name = "440")]
    Ref440,
    #[value(name = "432")]
    Ref432,
    #[value(name = "444")]
    Ref444,
}

#[derive(Clone, Copy, ValueEnum)]
enum GuitarTuningArg {
    Standard,
    DropD,
    DSharpStandard,
    DStandard,
    CSharpStandard,
    DropC,
    OpenE7,
    OpenEMinor7,
}

#[derive(Clone, Copy, ValueEnum)]
enum PerformanceArg {
    HighPerformance,
    Balanced,
    HighQuality,
}

impl From<InstrumentArg> for InstrumentKind {
    fn from(arg: InstrumentArg) -> Self {
        match arg {
            InstrumentArg::Guitar => InstrumentKind::Guitar,
            InstrumentArg::Chromatic => InstrumentKind::Chromatic,
        }
    }
}

impl From<ReferenceArg> for TuningReference {
    fn from(arg: ReferenceArg) -> Self {
        match arg {
            ReferenceArg::Ref440 => TuningReference::Ref440,
            ReferenceArg::Ref432 => TuningReference::Ref432,
            ReferenceArg::Ref444 => TuningReference::Ref444,
        }
    }
}

impl From<GuitarTuningArg> for GuitarTuning {
    fn from(arg: GuitarTuningArg) -> Self {
        match arg {
            GuitarTuningArg::Standard => GuitarTuning::Standard,
            GuitarTuningArg::DropD => GuitarTuning::DropD,
            GuitarTuningArg::DSharpStandard => GuitarTuning::DSharpStandard,
            GuitarTuningArg::DStandard => GuitarTuning::DStandard,
            GuitarTuningArg::CSharpStandard => GuitarTuning::CSharpStandard,
            GuitarTuningArg::DropC => GuitarTuning::DropC,
            GuitarTuningArg::OpenE7 => GuitarTuning::OpenE7,
            GuitarTuningArg::OpenEMinor7 => GuitarTuning::OpenEMinor7,
        }
    }
}

impl From<PerformanceArg> for PerformanceMode {
    fn from(arg: PerformanceArg) -> Self {
        match arg {
            PerformanceArg::HighPerformance => PerformanceMode::HighPerformance,
            PerformanceArg::Balanced => PerformanceMode::Balanced,
            PerformanceArg::HighQuality => PerformanceMode::HighQuality,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn tuner_config(cli: &Cli) -> Result<TunerConfig> {
    if let Some(path) = &cli.config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: TunerConfig =
            serde_json::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))?;
        return Ok(config.normalized());
    }

    Ok(TunerConfig {
        instrument: cli.instrument.into(),
        reference: cli.reference.into(),
        guitar_tuning: cli.guitar_tuning.into(),
        manual: cli.string,
    }
    .normalized())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let tuner = tuner_config(&cli)?;
    let mut pipeline = PipelineConfig::default();
    if let Some(mode) = cli.performance {
        pipeline = pipeline.with_performance_mode(mode.into());
    }
    pipeline.validate()?;

    let instrument = tuner.instrument();
    if instrument.has_strings() {
        let strings: Vec<String> = instrument.strings().iter().map(|s| s.note.to_string()).collect();
        info!("Tuning {:?} ({}): {}", tuner.instrument, tuner.guitar_tuning.display_name(), strings.join(" "));
    } else {
        info!("Tuning chromatic @ A4 = {} Hz", tuner.reference.frequency());
    }

    let estimator = YinEstimator::default().with_refinement(cli.refine);
    let frames_per_second = pipeline.frames_per_second;
    let (states_tx, states_rx) = state_channel(STATE_QUEUE_DEPTH);

    let started = if cli.synthetic {
        Session::start(
            move || SyntheticCapture::new(SYNTHETIC_SAMPLE_RATE, frames_per_second),
            estimator,
            tuner,
            pipeline,
            states_tx,
        )
    } else {
        Session::start(
            move || CpalCapture::new(frames_per_second),
            estimator,
            tuner,
            pipeline,
            states_tx,
        )
    };

    let session = started.map_err(|e| session_error(e, "Failed to start tuner session"))?;

    let deadline = cli.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        match states_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(state) => println!("{}", gauge::render(&state)),
            Err(RecvTimeoutError::Timeout) => {
                if !session.is_running() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    session.stop().map_err(|e| session_error(e, "Tuner session failed"))?;
    info!("Tuner stopped");
    Ok(())
}

/// Capture failures, at startup or mid-session, read as a missing microphone.
fn session_error(e: TunerError, context: &'static str) -> anyhow::Error {
    if e.is_access_error() {
        anyhow!("Microphone access required: {}", e)
    } else {
        anyhow::Error::new(e).context(context)
    }
}
