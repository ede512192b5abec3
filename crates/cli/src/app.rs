//! CLI application entry point and configuration.
//!
//! Loads the monitor configuration, sets up logging and dispatches the parsed
//! subcommand onto a Tokio runtime.

use crate::commands::{
    BackfillArgs, Cli, Commands, DbArgs, DbCommand, IngestArgs, PurgeArgs, WordsArgs,
    WordsCommand,
};
use crate::error::{CliError, Result};
use clap::Parser;
use dirtonyou_core::config::{LogFormat, LogLevel};
use dirtonyou_core::{ChatMessage, MonitorConfig};
use dirtonyou_ingest::{
    connect, AdminCommands, DiscordClient, Dispatcher, Ingestor, LogNotifier, MessagePersister,
    Monitor, OperatorNotifier, Repository, SpaceRegistry, TriggerStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn, Level};

/// Issuer id the CLI uses for admin commands; the local operator is always
/// the admin.
const CLI_ISSUER: &str = "cli";

/// Main CLI application.
#[derive(Debug)]
pub struct App {
    /// Effective configuration after file and environment overrides.
    pub config: MonitorConfig,
    /// Parsed CLI arguments.
    pub cli: Cli,
}

impl App {
    /// Create a new application instance from command line arguments.
    pub fn new() -> Result<Self> {
        let cli = Cli::parse();
        let config = Self::load_config(&cli)?;
        Ok(Self { config, cli })
    }

    /// Load configuration from file and environment.
    fn load_config(cli: &Cli) -> Result<MonitorConfig> {
        let mut config = match &cli.config {
            Some(path) if path.exists() => MonitorConfig::load(path)?,
            Some(path) => {
                return Err(CliError::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )))
            }
            None => {
                let default_path = MonitorConfig::default_path()?;
                if default_path.exists() {
                    MonitorConfig::load(&default_path)?
                } else {
                    MonitorConfig::default()
                }
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Run the application.
    pub fn run(self) -> Result<()> {
        self.setup_logging();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Internal(e.to_string()))?;

        runtime.block_on(async {
            match &self.cli.command {
                Commands::Db(args) => self.handle_db(args).await,
                Commands::Words(args) => self.handle_words(args).await,
                Commands::Purge(args) => self.handle_purge(args).await,
                Commands::Backfill(args) => self.handle_backfill(args).await,
                Commands::Ingest(args) => self.handle_ingest(args).await,
            }
        })
    }

    /// Set up logging from the configured level, raised by `-v` flags.
    fn setup_logging(&self) {
        let level = match self.cli.verbose {
            0 => level_of(self.config.logging.level),
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let builder = tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .with_writer(std::io::stderr);

        let _ = match self.config.logging.format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Text => builder.try_init(),
        };
    }

    async fn handle_db(&self, args: &DbArgs) -> Result<()> {
        match &args.command {
            DbCommand::Init => {
                let pool = connect(&self.config.database).await?;
                pool.close().await;
                println!("database ready");
                println!("path: {}", self.config.database.sqlite_path.display());
                Ok(())
            }
        }
    }

    async fn handle_words(&self, args: &WordsArgs) -> Result<()> {
        let pipeline = Pipeline::open(&self.config).await?;
        let admin = pipeline.admin();

        let reply = match &args.command {
            WordsCommand::List => admin.list_words().await,
            WordsCommand::Add { word } => admin.add_word(CLI_ISSUER, word).await,
            WordsCommand::Remove { word } => admin.remove_word(CLI_ISSUER, word).await,
        };
        println!("{}", reply);
        Ok(())
    }

    async fn handle_purge(&self, args: &PurgeArgs) -> Result<()> {
        if !args.yes {
            return Err(CliError::Command(
                "purge deletes every flagged message; pass --yes to confirm".to_string(),
            ));
        }
        let pipeline = Pipeline::open(&self.config).await?;
        let counts = pipeline.admin().purge_all().await?;
        println!("All data from messages has been deleted !!!");
        println!("messages: {}, spaces: {}", counts.messages, counts.spaces);
        Ok(())
    }

    async fn handle_backfill(&self, args: &BackfillArgs) -> Result<()> {
        let pipeline = Pipeline::open(&self.config).await?;
        pipeline.triggers.reload().await?;

        let monitor = pipeline.monitor(&self.config)?;
        let report = monitor.backfill_now(&args.space_id).await?;
        let rendered = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::Internal(e.to_string()))?;
        println!("{}", rendered);
        Ok(())
    }

    async fn handle_ingest(&self, args: &IngestArgs) -> Result<()> {
        let pipeline = Pipeline::open(&self.config).await?;
        if let Err(err) = pipeline.triggers.reload().await {
            warn!(error = %err, "starting without a trigger snapshot");
        }

        let monitor = Arc::new(pipeline.monitor(&self.config)?);
        let (tx, rx) = mpsc::channel::<ChatMessage>(args.lane_capacity.max(1));
        let dispatcher = Dispatcher::new(Arc::clone(&monitor)).with_lane_capacity(args.lane_capacity);
        let dispatch = tokio::spawn(dispatcher.run(rx));

        {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, stopping backfills at the next page");
                    monitor.request_shutdown();
                }
            });
        }

        let reader = open_input(args.input.as_ref()).await?;
        let mut lines = reader.lines();
        let mut line_no = 0usize;
        let mut malformed = 0usize;
        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let msg = match serde_json::from_str::<ChatMessage>(line) {
                Ok(msg) => msg,
                Err(err) => {
                    malformed += 1;
                    warn!(line = line_no, error = %err, "skipping malformed event");
                    continue;
                }
            };
            if tx.send(msg).await.is_err() {
                warn!("dispatcher stopped early");
                break;
            }
        }
        drop(tx);

        let stats = dispatch
            .await
            .map_err(|e| CliError::Internal(e.to_string()))?;
        let reports = monitor.wait_for_backfills().await;
        let interrupted = reports.iter().filter(|r| !r.finished).count();

        println!(
            "events: {}, flagged: {}, dropped: {}, overflowed: {}, malformed: {}",
            stats.events, stats.flagged, stats.dropped, stats.overflowed, malformed
        );
        println!(
            "backfills: {} started, {} completed, {} interrupted",
            stats.backfills_started,
            reports.len() - interrupted,
            interrupted
        );
        Ok(())
    }
}

/// Components wired to one database pool.
struct Pipeline {
    repo: Arc<Repository>,
    triggers: TriggerStore,
    persister: MessagePersister,
    registry: SpaceRegistry,
    op_timeout: Duration,
}

impl Pipeline {
    async fn open(config: &MonitorConfig) -> Result<Self> {
        let pool = connect(&config.database).await?;
        let op_timeout = config.database.operation_timeout();
        let repo = Arc::new(Repository::new(pool));
        Ok(Self {
            triggers: TriggerStore::new(repo.clone(), op_timeout),
            persister: MessagePersister::new(repo.clone(), op_timeout),
            registry: SpaceRegistry::new(repo.clone(), op_timeout),
            repo,
            op_timeout,
        })
    }

    fn admin(&self) -> AdminCommands {
        AdminCommands::new(
            Some(CLI_ISSUER.to_string()),
            self.triggers.clone(),
            self.repo.clone(),
            self.op_timeout,
        )
    }

    fn monitor(&self, config: &MonitorConfig) -> Result<Monitor> {
        let client = Arc::new(DiscordClient::new(&config.discord)?);
        let notifier: Arc<dyn OperatorNotifier> = if config.discord.admin_id.is_some() {
            client.clone()
        } else {
            Arc::new(LogNotifier)
        };
        let ingestor = Ingestor::new(
            self.triggers.clone(),
            self.persister.clone(),
            config.discord.bot_user_id.clone(),
        );
        Ok(Monitor::new(
            self.registry.clone(),
            ingestor,
            client,
            notifier,
            config.backfill.page_size,
        ))
    }
}

async fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    Ok(match path {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    })
}

fn level_of(level: LogLevel) -> Level {
    match level {
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    }
}

/// Parse arguments and run the selected command.
pub fn run() -> Result<()> {
    let app = App::new()?;
    app.run()
}
