use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use edward::config::Config;
use edward::credentials::RedditCredentials;
use edward::harvest::Shutdown;
use edward::store::StatementStore;
use edward::trainer;

/// A small bot trainer that learns conversations from Reddit comment chains.
///
/// Reddit training needs REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET,
/// REDDIT_USERNAME and REDDIT_PASSWORD exported first.
#[derive(Debug, Parser)]
#[command(name = "edward", version, about)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, default_value = "info")]
    level: String,

    /// Training mode
    #[arg(short, long, value_enum)]
    training: Option<Mode>,

    /// Subreddit to harvest
    #[arg(short, long)]
    subreddit: Option<String>,

    /// Number of threads to harvest
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Corpus file for `--training corpus`
    #[arg(long, required_if_eq("training", "corpus"))]
    corpus: Option<PathBuf>,

    /// Write learned conversations to this file when done
    #[arg(short, long)]
    export: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Harvest comment chains from a subreddit
    Reddit,
    /// Talk to the bot and teach it each answer
    Manual,
    /// Approve or reject each reply the bot gives
    Feedback,
    /// Train from a JSON corpus file
    Corpus,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(subreddit) = cli.subreddit.clone() {
        config.harvest.topic = subreddit;
    }
    if let Some(limit) = cli.limit {
        config.harvest.limit = limit;
    }
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    // Guard must live until exit so buffered file logs are flushed.
    let guard = match setup_logging(&config, &cli.level) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("Failed to set up logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Credentials are checked before anything touches the network.
    let credentials = if cli.training == Some(Mode::Reddit) {
        match RedditCredentials::from_env() {
            Ok(c) => Some(c),
            Err(e) => {
                error!("{e}");
                eprintln!("{}", e.hint());
                return ExitCode::FAILURE;
            }
        }
    } else {
        None
    };

    let mut store = match StatementStore::open(&config.database_path) {
        Ok(s) => s,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (trigger, mut shutdown) = Shutdown::channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            trigger.trigger();
        }
    });

    let result = match (cli.training, credentials) {
        (Some(Mode::Reddit), Some(credentials)) => {
            trainer::reddit(&config, credentials, &mut store, &mut shutdown)
                .await
                .map(|report| info!("Harvest report: {:?}", report))
        }
        (Some(Mode::Manual), _) => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            trainer::manual(&mut store, &config.responder, stdin, tokio::io::stdout(), &mut shutdown)
                .await
                .map(|n| info!("Learned {} exchanges", n))
        }
        (Some(Mode::Feedback), _) => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            trainer::feedback(&mut store, &config.responder, stdin, tokio::io::stdout(), &mut shutdown)
                .await
                .map(|n| info!("Learned {} approved replies", n))
        }
        (Some(Mode::Corpus), _) => match cli.corpus.as_deref() {
            Some(path) => trainer::corpus(&mut store, path).map(|_| ()),
            None => {
                error!("--training corpus needs --corpus <file>");
                return ExitCode::FAILURE;
            }
        },
        (Some(Mode::Reddit), None) | (None, _) => {
            if cli.export.is_none() {
                warn!("Nothing to do: pass --training or --export");
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    if let Some(path) = cli.export.as_deref()
        && let Err(e) = trainer::export(&store, path)
    {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    if shutdown.is_triggered() {
        // A blocking stdin read cannot be cancelled and would hold the runtime open.
        drop(guard);
        std::process::exit(0);
    }

    ExitCode::SUCCESS
}

fn setup_logging(config: &Config, level: &str) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("edward.log"))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("warn,edward={level}")))
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(filter()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(filter()),
        )
        .init();

    Ok(guard)
}
