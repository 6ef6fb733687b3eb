// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use log::{error, info, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use subfetch::app_config::{Config, LogLevel};
use subfetch::charset::{self, DetectionMode};
use subfetch::{Controller, FetchOutcome, MediaFingerprint, NullPlayer, PlayerControl, SlaveCommandPlayer};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => LogLevel::Error,
            CliLogLevel::Warn => LogLevel::Warn,
            CliLogLevel::Info => LogLevel::Info,
            CliLogLevel::Debug => LogLevel::Debug,
            CliLogLevel::Trace => LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch subtitles for media files or directories (default command)
    #[command(alias = "get")]
    Fetch(FetchArgs),

    /// Print the fingerprint key of media files
    Hash {
        /// Media files to fingerprint
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Detect the encoding of subtitle files
    Detect {
        /// Rewrite files as UTF-8 when they are not already
        #[arg(long)]
        convert: bool,

        /// Use pair statistics to tell GB2312, GBK and BIG5 apart
        #[arg(long)]
        statistical: bool,

        /// Subtitle files to inspect
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Generate shell completions for subfetch
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
struct FetchArgs {
    /// Media files or directories to process
    #[arg(value_name = "PATH")]
    inputs: Vec<PathBuf>,

    /// Save subtitles here instead of next to the media file
    #[arg(long, value_name = "DIR")]
    savedir: Option<PathBuf>,

    /// Build and log requests without sending them
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Fetch even when subtitles already sit next to the media file
    #[arg(short, long)]
    force: bool,

    /// MPlayer command FIFO to load fetched subtitles into
    #[arg(long, value_name = "PATH")]
    fifo: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long)]
    config_path: Option<PathBuf>,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// subfetch - automatic subtitle acquisition
///
/// Fingerprints media files, looks them up on the shooter.cn subtitle
/// repository and saves the results next to the media.
#[derive(Parser, Debug)]
#[command(name = "subfetch")]
#[command(version)]
#[command(about = "Fetch subtitles for local media files")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "subfetch fingerprints media files, looks them up on the shooter.cn subtitle
repository and saves the subtitles it finds next to the media.

EXAMPLES:
    subfetch movie.mkv                         # Fetch subtitles for one file
    subfetch --dry-run movie.mkv               # Show the request without sending it
    subfetch --savedir ~/subs /movies/         # Walk a directory, save elsewhere
    subfetch fetch -f movie.mkv                # Fetch even if subtitles exist
    subfetch hash movie.mkv                    # Print the fingerprint key
    subfetch detect --convert movie.chs.srt    # Detect encoding, convert to UTF-8
    subfetch completions bash > subfetch.bash  # Generate bash completions

CONFIGURATION:
    Configuration is read from conf.json in the working directory, or from
    subfetch/conf.json in the user config directory. Use --config-path for a
    different file. A default config is written when none exists.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    fetch: FetchArgs,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Tag and ANSI color for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("ERROR", "1;31"),
            Level::Warn => ("WARN ", "1;33"),
            Level::Info => ("INFO ", "1;32"),
            Level::Debug => ("DEBUG", "1;36"),
            Level::Trace => ("TRACE", "1;35"),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (tag, color) = Self::style_for_level(record.level());
            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "\x1B[{}m{} {} {}\x1B[0m", color, now, tag, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Start at info; the config or the CLI adjusts the level later
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "subfetch", &mut std::io::stdout());
            Ok(())
        }
        Some(Commands::Hash { files }) => run_hash(&files),
        Some(Commands::Detect { convert, statistical, files }) => {
            let mode = if statistical { DetectionMode::Statistical } else { DetectionMode::Naive };
            run_detect(&files, convert, mode)
        }
        Some(Commands::Fetch(args)) => run_fetch(args).await,
        // Default behavior - bare paths mean fetch
        None => run_fetch(cli.fetch).await,
    }
}

async fn run_fetch(options: FetchArgs) -> Result<()> {
    if options.inputs.is_empty() {
        return Err(anyhow!("PATH is required when no subcommand is specified"));
    }

    let config_path = options.config_path.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override config with CLI options if provided
    if options.dry_run {
        config.dry_run = true;
    }
    if let Some(dir) = &options.savedir {
        config.save_dir = Some(dir.clone());
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    } else if options.debug || options.dry_run {
        config.log_level = LogLevel::Debug;
    }

    config.validate().context("Configuration validation failed")?;
    log::set_max_level(config.log_level.into());

    let player: Arc<dyn PlayerControl> = match &options.fifo {
        Some(fifo) => Arc::new(SlaveCommandPlayer::new(fifo)),
        None => Arc::new(NullPlayer),
    };

    let controller = Controller::with_config(config)?;
    let results = controller.run(&options.inputs, options.force, player).await?;

    let fetched = results
        .iter()
        .filter(|(_, outcome)| matches!(outcome, FetchOutcome::Fetched(bundle) if !bundle.is_empty()))
        .count();
    info!("Finished: {} of {} file(s) got subtitles", fetched, results.len());
    Ok(())
}

fn run_hash(files: &[PathBuf]) -> Result<()> {
    let mut failures = 0;
    for file in files {
        match MediaFingerprint::compute(file) {
            Ok(fingerprint) => println!("{}\t{}", fingerprint.key(), file.display()),
            Err(e) => {
                error!("{}", e);
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(anyhow!("{} file(s) could not be fingerprinted", failures));
    }
    Ok(())
}

fn run_detect(files: &[PathBuf], convert: bool, mode: DetectionMode) -> Result<()> {
    for file in files {
        let detection = if convert {
            charset::convert_file_to_utf8(file, mode)
                .with_context(|| format!("Failed to convert {:?}", file))?
        } else {
            let bytes = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
            charset::detect_with_mode(&bytes, mode)
        };
        println!("{}\t{}\t{}", detection.charset, detection.language, file.display());
    }
    Ok(())
}
