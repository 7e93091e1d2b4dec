// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_arguments)]

use anyhow::{Result, anyhow, Context};
use log::{info, warn, LevelFilter, Log, Metadata, Record, Level, SetLoggerError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use clap::{Parser, ValueEnum, CommandFactory, Subcommand};
use clap_complete::{generate, Shell};

use lingotrack::app_config::{Config, LogLevel};
use lingotrack::database::{DatabaseConnection, Repository};
use lingotrack::exchange::ExportOptions;
use lingotrack::file_utils::FileManager;
use lingotrack::job::{JobManager, RequestOutcome, Settings};
use lingotrack::providers::MemoryLanguageCache;
use lingotrack::sources::json_file::JsonFileSource;
use lingotrack::{get_language_name, Registry};

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
    /// Create, submit and review translation jobs
    #[command(subcommand)]
    Job(JobCommand),

    /// Write a job as an exchange file
    Export {
        /// Job id
        job_id: i64,

        /// Exchange format (xlf or html)
        #[arg(short = 'F', long, default_value = "xlf")]
        format: String,

        /// Output file; defaults to the export directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep markup as plain text instead of XLIFF inline elements
        #[arg(long)]
        no_xliff_processing: bool,
    },

    /// Import a translated exchange file
    Import {
        /// Exchange file to import
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Job the file must belong to
        #[arg(short, long)]
        job: Option<i64>,

        /// Exchange format; derived from the file extension when omitted
        #[arg(short = 'F', long)]
        format: Option<String>,
    },

    /// List the configured translators
    Translators,

    /// Show database statistics
    Stats,

    /// Generate shell completions for lingotrack
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand, Debug)]
enum JobCommand {
    /// Create a job
    Create {
        /// Source language code (e.g., 'en', 'es', 'fr')
        #[arg(short, long)]
        source_language: Option<String>,

        /// Target language code (e.g., 'en', 'es', 'fr')
        #[arg(short, long)]
        target_language: Option<String>,

        /// Translator id; the configured default when omitted
        #[arg(long)]
        translator: Option<String>,

        /// Job setting as key=value, may be repeated
        #[arg(long = "setting", value_name = "KEY=VALUE")]
        settings: Vec<String>,
    },

    /// Add a JSON document to a job
    Add {
        /// Job id
        job_id: i64,

        /// JSON document to translate
        #[arg(value_name = "DOCUMENT")]
        document: PathBuf,

        /// Allow a second item for the same document
        #[arg(long)]
        allow_duplicate: bool,
    },

    /// Hand a job to its translator
    Submit { job_id: i64 },

    /// Submit an aborted job again
    Resubmit { job_id: i64 },

    /// Abort a job
    Abort { job_id: i64 },

    /// Reject an active job
    Reject {
        job_id: i64,

        /// Why the job is rejected
        #[arg(short, long)]
        reason: String,
    },

    /// Accept the translations of a job or of one of its items
    Accept {
        job_id: i64,

        /// Only accept this item
        #[arg(short, long)]
        item: Option<i64>,
    },

    /// Show a job with its items and messages
    Show { job_id: i64 },

    /// List all jobs
    List,

    /// Delete a job
    Delete { job_id: i64 },

    /// Show related content that could be added to a job
    Suggestions {
        job_id: i64,

        /// Add every suggestion to the job
        #[arg(long)]
        add: bool,
    },
}

/// lingotrack - translation job management
///
/// Tracks translation jobs from creation through human or machine
/// translation, review and acceptance.
#[derive(Parser, Debug)]
#[command(name = "lingotrack")]
#[command(version)]
#[command(about = "Translation job management")]
#[command(long_about = "lingotrack tracks the translation of structured content through human and machine translators.

EXAMPLES:
    lingotrack job create -s en -t de             # Create a job with the default translator
    lingotrack job add 1 content/home.json        # Add a JSON document to job 1
    lingotrack job submit 1                       # Export job 1 for translation
    lingotrack import exports/JobID1_en_de.xlf    # Import the translated file
    lingotrack job accept 1                       # Accept the translations
    lingotrack completions bash > lingotrack.bash # Generate bash completions

CONFIGURATION:
    Configuration is stored in lingotrack.json by default. You can specify a
    different config file with --config. If the config file doesn't exist, a
    default one will be created automatically.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long = "config", default_value = "lingotrack.json", global = true)]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
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
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color and emoji for log level
    fn style_for_level(level: Level) -> (&'static str, &'static str) {
        match level {
            Level::Error => ("1;31", "\u{274c} "),
            Level::Warn => ("1;33", "\u{1f6a7} "),
            Level::Info => ("1;32", " "),
            Level::Debug => ("1;36", "\u{1f50d} "),
            Level::Trace => ("1;35", "\u{1f4cb} "),
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let (color, emoji) = Self::style_for_level(record.level());
            let _ = writeln!(
                std::io::stderr(),
                "\x1B[{}m{} {} {}\x1B[0m",
                color, now, emoji, record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger at trace so the max level alone decides what is shown
    CustomLogger::init(LevelFilter::Trace)?;
    log::set_max_level(LevelFilter::Info);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "lingotrack", &mut std::io::stdout());
        return Ok(());
    }

    // If log level is set via command line, apply it immediately
    if let Some(level) = &cli.log_level {
        log::set_max_level(LogLevel::from(level.clone()).to_level_filter());
    }

    let mut config = Config::load_or_create(&cli.config_path)?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone().into();
    } else {
        log::set_max_level(config.log_level.to_level_filter());
    }

    // Validate the configuration after loading and overriding
    config.validate()
        .context("Configuration validation failed")?;

    let manager = build_manager(&config)?;
    run_command(cli.command, &config, &manager).await
}

// @creates: Job manager over the configured database and plugins
fn build_manager(config: &Config) -> Result<JobManager> {
    let connection = match &config.database_path {
        Some(path) => DatabaseConnection::new(path)?,
        None => DatabaseConnection::new_default()?,
    };
    let registry = Registry::with_defaults(config)?;
    Ok(JobManager::new(
        Repository::new(connection),
        Arc::new(registry),
        Arc::new(MemoryLanguageCache::new()),
    ))
}

async fn run_command(command: Commands, config: &Config, manager: &JobManager) -> Result<()> {
    match command {
        Commands::Job(job_command) => run_job_command(job_command, config, manager).await,
        Commands::Export { job_id, format, output, no_xliff_processing } => {
            let options = ExportOptions { xliff_processing: !no_xliff_processing };
            let bytes = manager.export(job_id, &format, &options).await?;
            let path = match output {
                Some(path) => path,
                None => {
                    let job = manager.get_job(job_id).await?;
                    FileManager::export_path(
                        &config.export_directory,
                        &lingotrack::exchange::export_file_name(&job, &format),
                    )
                }
            };
            FileManager::write_bytes(&path, &bytes)?;
            info!("Exported job {} to {:?} (sha256 {})", job_id, path, FileManager::digest(&bytes));
            Ok(())
        }
        Commands::Import { file, job, format } => {
            let format = match format {
                Some(format) => format,
                None => format_from_extension(&file)?,
            };
            let bytes = FileManager::read_bytes(&file)?;
            let report = manager.import(job, &format, &bytes).await?;
            info!("Imported {:?}: {}", file, report);
            for issue in &report.violations {
                warn!("{}", issue.error);
            }
            Ok(())
        }
        Commands::Translators => {
            for translator in manager.registry().translators() {
                let default = config.default_translator.as_deref() == Some(translator.id.as_str());
                println!(
                    "{:<16} {:<24} plugin={}{}",
                    translator.id,
                    translator.label,
                    translator.plugin,
                    if default { " (default)" } else { "" }
                );
            }
            Ok(())
        }
        Commands::Stats => {
            let connection = match &config.database_path {
                Some(path) => DatabaseConnection::new(path)?,
                None => DatabaseConnection::new_default()?,
            };
            println!("{}", connection.stats()?);
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

async fn run_job_command(command: JobCommand, config: &Config, manager: &JobManager) -> Result<()> {
    match command {
        JobCommand::Create { source_language, target_language, translator, settings } => {
            let source = source_language.unwrap_or_else(|| config.source_language.clone());
            let target = target_language.unwrap_or_else(|| config.target_language.clone());
            let translator = translator.or_else(|| config.default_translator.clone());
            let settings = parse_settings(&settings)?;
            let job = manager
                .create_job(&source, &target, translator.as_deref(), settings)
                .await?;
            println!("{}", job.id);
        }
        JobCommand::Add { job_id, document, allow_duplicate } => {
            let path = std::fs::canonicalize(&document)
                .with_context(|| format!("Document not found: {:?}", document))?;
            let item = manager
                .add_item(job_id, JsonFileSource::reference(path), allow_duplicate)
                .await?;
            info!("Added item {} ({} words)", item.id, item.word_count());
        }
        JobCommand::Submit { job_id } => report_outcome(job_id, manager.request_translation(job_id).await?),
        JobCommand::Resubmit { job_id } => report_outcome(job_id, manager.resubmit(job_id).await?),
        JobCommand::Abort { job_id } => {
            manager.abort_job(job_id).await?;
            info!("Job {} aborted", job_id);
        }
        JobCommand::Reject { job_id, reason } => {
            manager.reject_job(job_id, &reason).await?;
            info!("Job {} rejected", job_id);
        }
        JobCommand::Accept { job_id, item } => {
            let job = match item {
                Some(item_id) => manager.accept_item(job_id, item_id).await?,
                None => manager.accept_job(job_id).await?,
            };
            info!("Job {} is {}", job_id, job.state);
        }
        JobCommand::Show { job_id } => show_job(manager, job_id).await?,
        JobCommand::List => {
            for summary in manager.list_jobs().await? {
                println!(
                    "{:>5}  {} -> {}  {:<12} {:>4} items {:>6} words {:>5.1}%{}  {}",
                    summary.id,
                    summary.source_language,
                    summary.target_language,
                    summary.state,
                    summary.item_count,
                    summary.word_count,
                    summary.progress_percentage(),
                    if summary.busy { " busy" } else { "" },
                    summary.translator.as_deref().unwrap_or("-"),
                );
            }
        }
        JobCommand::Delete { job_id } => {
            manager.delete_job(job_id).await?;
            info!("Job {} deleted", job_id);
        }
        JobCommand::Suggestions { job_id, add } => {
            for suggestion in manager.suggestions(job_id).await? {
                println!(
                    "{}  {} ({} words): {}",
                    suggestion.item.source,
                    suggestion.item.label,
                    suggestion.item.word_count(),
                    suggestion.reason
                );
                if add {
                    manager.add_existing_item(job_id, suggestion.item).await?;
                }
            }
        }
    }
    Ok(())
}

fn report_outcome(job_id: i64, outcome: RequestOutcome) {
    match outcome {
        RequestOutcome::Translated { updated, finished } => {
            info!("Job {}: {} leaves translated{}", job_id, updated, if finished { ", finished" } else { "" });
        }
        RequestOutcome::Submitted { location, reexport } => {
            info!(
                "Job {} submitted{}{}",
                job_id,
                location.map(|l| format!(" to {}", l)).unwrap_or_default(),
                if reexport { " (unchanged re-export)" } else { "" }
            );
        }
        RequestOutcome::Rejected(reason) => warn!("Job {} rejected: {}", job_id, reason),
    }
}

async fn show_job(manager: &JobManager, job_id: i64) -> Result<()> {
    let job = manager.get_job(job_id).await?;
    let source_name = get_language_name(&job.source_language).unwrap_or_else(|_| job.source_language.clone());
    let target_name = get_language_name(&job.target_language).unwrap_or_else(|_| job.target_language.clone());

    println!("Job {}: {} -> {} ({})", job.id, source_name, target_name, job.state);
    println!("Translator: {}", job.translator.as_deref().unwrap_or("-"));
    for item in &job.items {
        let counts = item.counts();
        println!(
            "  [{}] {} ({}) {} words: {} pending, {} translated, {} reviewed, {} accepted",
            item.id, item.label, item.state, item.word_count(),
            counts.pending, counts.translated, counts.reviewed, counts.accepted
        );
    }
    for message in manager.messages(job_id).await? {
        println!("  {} {:<7} {}", message.created_at, message.severity, message.message);
    }
    Ok(())
}

// @parses: key=value pairs, values as JSON when possible
fn parse_settings(pairs: &[String]) -> Result<Settings> {
    let mut settings = Settings::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid setting '{}', expected KEY=VALUE", pair))?;
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        settings.insert(key.trim().to_string(), value);
    }
    Ok(settings)
}

fn format_from_extension(path: &Path) -> Result<String> {
    match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref() {
        Some("xlf") | Some("xliff") => Ok("xlf".to_string()),
        Some("html") | Some("htm") => Ok("html".to_string()),
        _ => Err(anyhow!("Cannot tell the exchange format of {:?}, use --format", path)),
    }
}
