use std::{error::Error, path::PathBuf, sync::Arc};

use clap::Parser;
use colored::Colorize;
use ffmpeg_next::util::log::Level as FfmpegLevel;
use gpsframes::{
    ExtractOptions, ExtractorError, OperationType, ProgressCallback, ProgressInfo, Session,
    SessionHeader, SkippedFramePolicy,
    configuration::{DEFAULT_FRAME_RATE, DEFAULT_IMAGE_EXTENSION, DEFAULT_MAX_DECODE_RETRIES},
    database, paths,
};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

const CLI_AFTER_HELP: &str = "Examples:\n  gpsframes -i GH010042.MP4 -o frames\n  gpsframes -i recordings/ -o frames -f 2 --progress\n  gpsframes -i GH010042.MP4 -o frames --ext png --skip-unreadable-frames -v";

#[derive(Debug, Parser)]
#[command(
    name = "gpsframes",
    version,
    about = "Extract frames from GoPro videos and tag them with interpolated GPS positions",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Input video, or a directory of .mp4 chapter files.
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for frames and metadata.json. Replaced if it exists.
    #[arg(short, long)]
    output: PathBuf,

    /// Frames to extract per second of video.
    #[arg(short = 'f', long = "framerate", default_value_t = DEFAULT_FRAME_RATE)]
    frame_rate: f64,

    /// Log per-payload and per-frame details and print the metadata.
    #[arg(short, long)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long)]
    progress: bool,

    /// Extra read attempts before a frame is declared unreadable.
    #[arg(long, default_value_t = DEFAULT_MAX_DECODE_RETRIES)]
    retries: u32,

    /// Leave out unreadable frames instead of stopping.
    #[arg(long)]
    skip_unreadable_frames: bool,

    /// Output image extension (jpg, png, bmp, tiff).
    #[arg(long, default_value = DEFAULT_IMAGE_EXTENSION)]
    ext: String,
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn Error>> {
        let bar = ProgressBar::new(0);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let stage = match info.operation {
            OperationType::TelemetryExtraction => "telemetry",
            OperationType::FrameSampling => "frames",
            _ => "working",
        };
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        let file = info
            .file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.bar.set_message(format!(
            "[{}/{}] {file} {stage}",
            info.file_index + 1,
            info.file_count
        ));
    }
}

fn init_logging(verbose: bool) {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.init();

    if !verbose {
        ffmpeg_next::util::log::set_level(FfmpegLevel::Error);
    }
}

fn build_options(cli: &Cli) -> ExtractOptions {
    let policy = if cli.skip_unreadable_frames {
        SkippedFramePolicy::Skip
    } else {
        SkippedFramePolicy::Abort
    };
    ExtractOptions::new()
        .with_frame_rate(cli.frame_rate)
        .with_image_extension(&cli.ext)
        .with_max_decode_retries(cli.retries)
        .with_skipped_frame_policy(policy)
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let mut options = build_options(cli);
    options.validate()?;

    let inputs = paths::collect_inputs(&cli.input)?;
    paths::prepare_output_dir(&cli.output)?;

    let progress = if cli.progress {
        let progress = Arc::new(TerminalProgress::new()?);
        options = options.with_progress(progress.clone());
        Some(progress)
    } else {
        None
    };

    let mut session = Session::new(&cli.output, options);
    let frames = session.run(&inputs)?;

    if let Some(progress) = progress {
        progress.bar.finish_with_message("done");
    }

    let header = SessionHeader {
        source: cli.input.display().to_string(),
        frame_rate: cli.frame_rate,
    };
    let path = database::write(&frames, &header, &cli.output)?;

    if cli.verbose {
        println!("{}", database::to_json_string(&frames, &header)?);
    }

    println!(
        "{} {}",
        "success:".green().bold(),
        format!(
            "Extracted {} frame(s) from {} file(s); metadata in {}",
            frames.len(),
            inputs.len(),
            path.display()
        )
        .green()
    );
    Ok(())
}

/// Process exit status for a failed run.
fn exit_code(error: &(dyn Error + 'static)) -> i32 {
    match error.downcast_ref::<ExtractorError>() {
        Some(ExtractorError::InputMissing { .. }) => 2,
        Some(ExtractorError::OutputMissing { .. }) => 3,
        Some(ExtractorError::NoPayload(_)) => 4,
        Some(ExtractorError::CannotCreateOutput { .. }) => 5,
        Some(ExtractorError::InvalidStructure(_)) => 6,
        _ => 1,
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(error) = run(&cli) {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(exit_code(error.as_ref()));
    }
}
