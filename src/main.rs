// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, error, info};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use codeferry::app_config::{self, Config, DEFAULT_CONFIG_FILE};
use codeferry::backends::worker::run_worker;
use codeferry::errors::{AppError, EX_CONFIG, EX_SOFTWARE};
use codeferry::Controller;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Migrate a source project (default command)
    Migrate(MigrateArgs),

    /// Generate shell completions for codeferry
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Serve backend queries over stdin/stdout (started by the worker pool)
    #[command(hide = true)]
    Worker {
        /// JSON declaration of the backend to serve
        #[arg(long)]
        backend: String,
    },
}

#[derive(Args, Debug, Clone)]
struct MigrateArgs {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Source project folder
    #[arg(short, long)]
    source: PathBuf,

    /// Destination project folder, created if missing
    #[arg(short, long)]
    destination: PathBuf,

    /// Secret key of the configured LLM backend
    #[arg(short = 'k', long, env = "CODEFERRY_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Print debug information about the migration
    #[arg(short, long)]
    verbose: bool,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// codeferry - LLM-backed source migration
///
/// Walks a source project, translates each file through the configured
/// backend and writes the results into a destination project.
#[derive(Parser, Debug)]
#[command(name = "codeferry")]
#[command(version)]
#[command(about = "LLM-backed source code migration tool")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "codeferry migrates a Unity C# project by translating every file through an LLM backend.

EXAMPLES:
    codeferry -s ~/Unity/Game -d ~/Godot/Game                 # Migrate using codeferry.json
    codeferry -c godot.json -k sk-... -s ./Game -d ./Out      # Use another config and API key
    codeferry migrate -v -s ./Game -d ./Out                   # Verbose migration
    codeferry completions bash > codeferry.bash               # Generate bash completions

CONFIGURATION:
    Configuration is stored in codeferry.json by default. If the file doesn't
    exist, a default one is created automatically.

BACKENDS:
    trivial  - Echoes prompts back (dry runs)
    open_ai  - OpenAI chat completions (requires API key)
    ollama   - Local Ollama server
    pooled   - Runs another backend in isolated worker processes")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    migrate: Option<MigrateArgs>,
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
        // Filtering happens through log::set_max_level so the level can change later
        let logger = Box::new(CustomLogger::new(LevelFilter::Trace));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: Emoji for log level
    fn get_emoji_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "❌ ",
            Level::Warn => "🚧 ",
            Level::Info => " ",
            Level::Debug => "🔍 ",
            Level::Trace => "📋 ",
        }
    }

    // @returns: ANSI colour for log level
    fn get_color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    // stdout belongs to the worker protocol, so everything goes to stderr
    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::get_color_for_level(record.level());
            let emoji = Self::get_emoji_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(stderr, "{}{} {} {}\x1B[0m", color, now, emoji, record.args());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = CustomLogger::init(LevelFilter::Info) {
        eprintln!("Unable to install logger: {}", e);
    }

    let cli = CommandLineOptions::parse();

    let code = match cli.command {
        Some(Commands::Completions { shell }) => {
            let mut cmd = CommandLineOptions::command();
            generate(shell, &mut cmd, "codeferry", &mut std::io::stdout());
            0
        }
        Some(Commands::Worker { backend }) => {
            // Workers only report problems; their requests are logged by the parent
            log::set_max_level(LevelFilter::Warn);
            match run_worker(&backend).await {
                Ok(()) => 0,
                Err(e) => {
                    error!("Worker stopped: {:#}", e);
                    EX_SOFTWARE
                }
            }
        }
        Some(Commands::Migrate(args)) => run_migration(args).await,
        None => match cli.migrate {
            Some(args) => run_migration(args).await,
            None => {
                let _ = CommandLineOptions::command().print_help();
                EX_CONFIG
            }
        },
    };

    ExitCode::from(code as u8)
}

fn apply_log_level(args: &MigrateArgs, config: &Config) {
    let level = if let Some(level) = &args.log_level {
        app_config::LogLevel::from(level.clone()).to_level_filter()
    } else if args.verbose {
        LevelFilter::Debug
    } else {
        config.log_level.to_level_filter()
    };

    // Just update the max level without reinitializing the logger
    log::set_max_level(level);
}

async fn run_migration(args: MigrateArgs) -> i32 {
    if args.verbose {
        log::set_max_level(LevelFilter::Debug);
    }

    let mut config = match Config::load_or_create(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Unable to start: {} is invalid: {:#}", args.config.display(), e);
            return EX_CONFIG;
        }
    };

    if let Some(key) = &args.secret_key {
        config.backend.set_secret_key(key);
    }
    apply_log_level(&args, &config);

    let controller = match Controller::with_config(config) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Unable to start: {}", e);
            return e.exit_code();
        }
    };

    match controller.run(&args.source, &args.destination).await {
        Ok(report) => {
            for (file, reason) in &report.failed {
                error!("{}: {}", file.display(), reason);
            }
            info!("Migration completed");
            0
        }
        Err(e) => {
            report_error(&e);
            e.exit_code()
        }
    }
}

fn report_error(error: &AppError) {
    match error {
        AppError::Config(_) => error!("Unable to start: {}", error),
        AppError::File(_) => error!("Unable to create destination folder: {}", error),
        _ => error!("Unable to migrate: {}", error),
    }
}
