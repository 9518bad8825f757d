use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use theftwatch::{
    Annotator, ImageSequenceSource, JsonLinesSink, LogSink, MultiSink, ReplayLog, WatchConfig,
    WatchPipeline,
};

#[derive(Parser, Debug)]
#[command(name = "theftwatch", about = "Flag objects carried off by a running person")]
struct Args {
    /// Directory of decoded frames, read in file name order
    #[arg(long, value_name = "DIR")]
    frames: PathBuf,
    /// YAML configuration; defaults apply when omitted
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Recorded inference log, overrides `detector.model`
    #[arg(long, value_name = "PATH")]
    replay: Option<PathBuf>,
    /// Nominal frame rate of the sequence
    #[arg(long)]
    fps: Option<f32>,
    /// Append emitted events to this JSON-lines file
    #[arg(long, value_name = "PATH")]
    events: Option<PathBuf>,
    /// Write annotated frames into this directory
    #[arg(long, value_name = "DIR")]
    annotate_dir: Option<PathBuf>,
    /// Font for overlay labels
    #[arg(long, value_name = "PATH", requires = "annotate_dir")]
    font: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => WatchConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => WatchConfig::default(),
    };
    if let Some(replay) = &args.replay {
        config.detector.model = replay.clone();
    }

    let replay = ReplayLog::open(&config.detector.model)
        .with_context(|| format!("loading detector model {}", config.detector.model.display()))?;
    let mut source = ImageSequenceSource::open(&args.frames, args.fps)?;
    let fps = args.fps.unwrap_or(config.frame_rate);

    let mut pipeline = WatchPipeline::new(replay.detector(), replay.pose_estimator(), &config, Some(fps))?;

    let mut sink = MultiSink::new().with(LogSink);
    if let Some(path) = &args.events {
        let file = File::options()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening event log {}", path.display()))?;
        sink = sink.with(JsonLinesSink::new(BufWriter::new(file)));
    }

    let mut annotator = match &args.annotate_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let annotator = Annotator::new(config.correlation.person_class);
            Some(match &args.font {
                Some(font) => annotator.with_font_file(font)?,
                None => annotator,
            })
        }
        None => None,
    };

    let summary = pipeline.run(&mut source, &mut sink, |frame, report| {
        let (Some(annotator), Some(dir)) = (annotator.as_mut(), args.annotate_dir.as_ref()) else {
            return;
        };
        let canvas = annotator.annotate(frame, report, Instant::now());
        let path = dir.join(format!("frame_{:06}.png", frame.index));
        if let Err(err) = canvas.save(&path) {
            error!("failed to write {}: {err}", path.display());
        }
    })?;

    info!(
        "done: {} frames, {} skipped, {} confirmed, {} alerts",
        summary.frames, summary.skipped, summary.confirmed, summary.emitted
    );
    Ok(())
}
