use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use playcheck::{
    BatchScheduler, Classification, DEFAULT_WORKERS, DeviceHint, FfmpegFrameSource,
    FfmpegLogLevel, FrameClassifier, InspectOptions, LumaClassifier, ProgressCallback,
    ProgressInfo, VideoTask, VideoVerdict, parse_source_list, scan_folder,
};

const CLI_AFTER_HELP: &str = "Examples:\n  playcheck check --folder videos --ext mp4\n  playcheck check --model models/playcheck-vit --device cuda:0\n  playcheck check --url https://cdn.example.com/a.mp4,https://cdn.example.com/b.mp4 --json\n  playcheck check --folder clips --interval 8 --device cpu --workers 8 --progress\n  playcheck completions zsh > _playcheck";

#[derive(Debug, Parser)]
#[command(
    name = "playcheck",
    version,
    about = "Detect black screens and distorted playback in video files",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output for every video.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while videos are inspected.
    #[arg(long, global = true)]
    progress: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Inspect every video in a folder, or a list of URLs.
    #[command(
        about = "Inspect videos for playback faults",
        after_help = "Examples:\n  playcheck check --folder videos\n  playcheck check --url a.mp4,b.mp4 --compressed false --json"
    )]
    Check {
        /// Folder scanned (non-recursively) for videos.
        #[arg(long, default_value = "videos", conflicts_with = "url")]
        folder: PathBuf,

        /// Comma-separated list of video paths or URLs. Live streams have no
        /// known length and are reported as unreadable.
        #[arg(long)]
        url: Option<String>,

        /// File extension matched in --folder.
        #[arg(long, default_value = playcheck::discovery::DEFAULT_EXTENSION)]
        ext: String,

        /// Classify every Nth frame of long videos.
        #[arg(long, default_value_t = 4)]
        interval: u64,

        /// Classifier model: a directory with model.safetensors and config.json.
        /// Without it frames are labelled by brightness and noise statistics.
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Inference device for --model: cpu, N, cuda:N.
        #[arg(long, default_value = "0")]
        device: String,

        /// Halve frame dimensions before classification.
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        compressed: bool,

        /// Maximum number of videos inspected at once.
        #[arg(long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,

        /// Give up on a video after this many seconds.
        #[arg(long)]
        timeout: Option<f64>,

        /// Mean luma at or below which a frame counts as black (no --model).
        #[arg(long)]
        black_luma: Option<f32>,

        /// Neighbour-difference energy above which a frame counts as distorted (no --model).
        #[arg(long)]
        noise_energy: Option<f32>,

        /// Print one JSON object per video.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level.parse()?;
        playcheck::set_ffmpeg_log_level(parsed);
    } else {
        // Damaged inputs make FFmpeg very chatty.
        playcheck::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    }

    Ok(())
}

fn build_classifier(
    model: Option<&Path>,
    device: DeviceHint,
    black_luma: Option<f32>,
    noise_energy: Option<f32>,
) -> Result<Arc<dyn FrameClassifier>, Box<dyn std::error::Error>> {
    if let Some(path) = model {
        if black_luma.is_some() || noise_energy.is_some() {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                "--black-luma and --noise-energy are ignored with --model".yellow()
            );
        }
        return load_model(path, device);
    }

    let mut classifier = LumaClassifier::new();
    if let Some(threshold) = black_luma {
        classifier = classifier.with_black_threshold(threshold);
    }
    if let Some(threshold) = noise_energy {
        classifier = classifier.with_noise_threshold(threshold);
    }
    Ok(Arc::new(classifier))
}

#[cfg(feature = "model")]
fn load_model(
    path: &Path,
    device: DeviceHint,
) -> Result<Arc<dyn FrameClassifier>, Box<dyn std::error::Error>> {
    Ok(Arc::new(playcheck::ModelClassifier::load(path, device)?))
}

#[cfg(not(feature = "model"))]
fn load_model(
    _path: &Path,
    _device: DeviceHint,
) -> Result<Arc<dyn FrameClassifier>, Box<dyn std::error::Error>> {
    Err("--model requires building with the `model` feature".into())
}

fn parse_timeout(seconds: f64) -> Result<Duration, Box<dyn std::error::Error>> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(format!("--timeout must be a positive number of seconds, got {seconds}").into());
    }
    Ok(Duration::from_secs_f64(seconds))
}

fn colored_class(classification: Classification) -> ColoredString {
    let tag = classification.tag();
    match classification {
        Classification::Normal => tag.green().bold(),
        Classification::Black | Classification::Distort => tag.red().bold(),
        Classification::Unreadable | Classification::NoSignal => tag.yellow().bold(),
        Classification::UnknownError => tag.magenta().bold(),
    }
}

/// Drives an `indicatif` bar from batch progress.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(total: u64) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(total);
        let style =
            ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_position(info.completed);
        self.bar.set_message(info.last_source.clone());
    }
}

fn print_verdict(verdict: &VideoVerdict, json: bool, verbose: bool, bar: Option<&ProgressBar>) {
    let line = if json {
        verdict.to_json().to_string()
    } else if verbose {
        format!(
            "{} {} ({} read, {} classified)",
            colored_class(verdict.classification),
            verdict.message,
            verdict.frames_read,
            verdict.frames_classified,
        )
    } else {
        format!("{} {}", colored_class(verdict.classification), verdict.message)
    };

    match bar {
        Some(bar) => bar.println(line),
        None => println!("{line}"),
    }
}

fn print_summary(counts: &BTreeMap<&'static str, u64>, total: u64) {
    let breakdown = counts
        .iter()
        .map(|(tag, count)| format!("{count} {tag}"))
        .collect::<Vec<_>>()
        .join(", ");
    eprintln!(
        "{} {total} video(s) inspected: {breakdown}",
        "summary:".cyan().bold()
    );
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Check {
            folder,
            url,
            ext,
            interval,
            model,
            device,
            compressed,
            workers,
            timeout,
            black_luma,
            noise_energy,
            json,
        } => {
            let tasks: Vec<VideoTask> = match &url {
                Some(list) => parse_source_list(list),
                None => scan_folder(&folder, &ext)?,
            };

            if tasks.is_empty() {
                eprintln!(
                    "{} {}",
                    "warning:".yellow().bold(),
                    match &url {
                        Some(_) => "--url lists no videos".to_string(),
                        None => format!("no .{ext} files in {}", folder.display()),
                    }
                    .yellow()
                );
                return Ok(());
            }

            let device: DeviceHint = device.parse()?;
            let classifier =
                build_classifier(model.as_deref(), device, black_luma, noise_energy)?;

            let mut options = InspectOptions::new()
                .with_skip_interval(interval)?
                .with_compressed(compressed)
                .with_device(device);
            if let Some(seconds) = timeout {
                options = options.with_timeout(parse_timeout(seconds)?);
            }

            let progress = if cli.global.progress {
                let progress = Arc::new(TerminalProgress::new(tasks.len() as u64)?);
                options = options.with_progress(progress.clone());
                Some(progress)
            } else {
                None
            };

            if cli.global.verbose {
                eprintln!(
                    "inspecting {} video(s) on {workers} worker(s), classifier {}, device {device}",
                    tasks.len(),
                    classifier.name()
                );
            }

            let scheduler = BatchScheduler::new(FfmpegFrameSource::new(), classifier)
                .with_workers(workers)
                .with_options(options);

            let mut counts = BTreeMap::new();
            let mut total = 0_u64;
            for verdict in scheduler.run(tasks)? {
                print_verdict(
                    &verdict,
                    json,
                    cli.global.verbose,
                    progress.as_ref().map(|progress| &progress.bar),
                );
                *counts.entry(verdict.classification.tag()).or_insert(0) += 1;
                total += 1;
            }

            if let Some(progress) = progress {
                progress.bar.finish_with_message("done");
            }
            print_summary(&counts, total);
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "playcheck", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use playcheck::DeviceHint;

    use super::{CLI_AFTER_HELP, Cli, Commands, build_classifier, parse_timeout};

    #[test]
    fn check_defaults() {
        let cli = Cli::try_parse_from(["playcheck", "check"]).unwrap();
        let Commands::Check {
            folder,
            url,
            ext,
            interval,
            device,
            compressed,
            workers,
            ..
        } = cli.command
        else {
            panic!("expected check");
        };
        assert_eq!(folder.to_str(), Some("videos"));
        assert!(url.is_none());
        assert_eq!(ext, "mp4");
        assert_eq!(interval, 4);
        assert_eq!(device, "0");
        assert!(compressed);
        assert_eq!(workers, 5);
    }

    #[test]
    fn compressed_takes_a_value() {
        let cli = Cli::try_parse_from(["playcheck", "check", "--compressed", "false"]).unwrap();
        let Commands::Check { compressed, .. } = cli.command else {
            panic!("expected check");
        };
        assert!(!compressed);
    }

    #[test]
    fn folder_and_url_conflict() {
        let result =
            Cli::try_parse_from(["playcheck", "check", "--folder", "a", "--url", "b.mp4"]);
        assert!(result.is_err());
    }

    #[test]
    fn help_examples_parse() {
        let examples: Vec<&str> = CLI_AFTER_HELP
            .lines()
            .filter_map(|line| line.trim().strip_prefix("playcheck "))
            .filter(|line| !line.contains('>'))
            .collect();
        assert!(!examples.is_empty());
        for example in examples {
            let arguments = std::iter::once("playcheck").chain(example.split_whitespace());
            assert!(Cli::try_parse_from(arguments).is_ok(), "{example}");
            // Live streams report no frame count and come back unreadable.
            assert!(!example.contains("rtsp://"), "{example}");
        }
    }

    #[test]
    fn model_flag_is_parsed() {
        let cli = Cli::try_parse_from(["playcheck", "check", "-m", "models/vit", "--device", "cpu"])
            .unwrap();
        let Commands::Check { model, device, .. } = cli.command else {
            panic!("expected check");
        };
        assert_eq!(model.as_deref().and_then(|path| path.to_str()), Some("models/vit"));
        assert_eq!(device, "cpu");
    }

    #[test]
    fn luma_classifier_without_model() {
        let classifier = build_classifier(None, DeviceHint::Cpu, Some(20.0), None).unwrap();
        assert_eq!(classifier.name(), "luma");
    }

    #[test]
    fn missing_model_fails_to_load() {
        let result = build_classifier(
            Some(std::path::Path::new("no/such/model")),
            DeviceHint::Cpu,
            None,
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn timeout_must_be_positive() {
        assert!(parse_timeout(1.5).is_ok());
        assert!(parse_timeout(0.0).is_err());
        assert!(parse_timeout(f64::NAN).is_err());
    }
}
