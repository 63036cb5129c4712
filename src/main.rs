use anyhow::{bail, Context, Result};
use appinv::config::Config;
use appinv::docs::{GcsDocumentStore, Publisher};
use appinv::gcp::client::{format_gcp_error, GcpClient};
use appinv::inventory::{AppId, ReportFormat};
use appinv::resource::{gcp_aggregator, BucketTagger, GcsBucketTagger};
use appinv::router::{AgentRequest, Router};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Inventory and documentation of the GCP resources owned by an application
#[derive(Parser, Debug)]
#[command(name = "appinv", version, about, long_about = None)]
struct Args {
    /// GCP project to use
    #[arg(short, long, global = true)]
    project: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the resources labelled with an application id
    Details {
        #[arg(long)]
        app_id: String,

        #[arg(long, value_enum, default_value = "yaml")]
        format: ReportFormat,
    },
    /// Publish the HTML documentation and print its link
    Publish {
        #[arg(long)]
        app_id: String,
    },
    /// Add a label to a bucket, keeping its other labels
    Tag {
        #[arg(long)]
        bucket: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        value: String,
    },
    /// Answer an agent request envelope read from a file or stdin
    Invoke {
        /// Route to the bucket tagging helper
        #[arg(long)]
        tagging: bool,

        /// Envelope file, `-` for stdin
        #[arg(long, default_value = "-")]
        event: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Logging disabled, cannot open {}: {}", log_path.display(), e);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("appinv {} started with log level: {:?}", appinv::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("appinv").join("appinv.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".appinv").join("appinv.log");
    }
    PathBuf::from("appinv.log")
}

fn read_event(source: &str) -> Result<AgentRequest> {
    let content = if source == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read event from stdin")?;
        buf
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read event file {}", source))?
    };
    serde_json::from_str(&content).context("Invalid agent request envelope")
}

async fn connect(args: &Args, config: &Config) -> Result<GcpClient> {
    let Some(project) = config.effective_project(args.project.as_deref()) else {
        bail!("No GCP project configured. Set GOOGLE_CLOUD_PROJECT or use --project flag");
    };
    tracing::info!("Using project: {}", project);
    GcpClient::new(&project).await
}

fn build_router(client: &GcpClient, config: &Config) -> Router {
    let store = GcsDocumentStore::new(client.clone(), config.signer_service_account.clone());
    Router::new(
        gcp_aggregator(client),
        Publisher::new(Box::new(store), config.publish_settings()),
        Box::new(GcsBucketTagger::new(client.clone())),
    )
}

fn parse_app_id(raw: &str) -> Result<AppId> {
    AppId::new(raw).context("app_id must not be empty")
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load()?.with_env();
    let client = connect(&args, &config).await?;

    match &args.command {
        Command::Details { app_id, format } => {
            let report = gcp_aggregator(&client).aggregate(&parse_app_id(app_id)?).await?;
            println!("{}", report.encode(*format)?);
        },
        Command::Publish { app_id } => {
            let report = gcp_aggregator(&client).aggregate(&parse_app_id(app_id)?).await?;
            let store =
                GcsDocumentStore::new(client.clone(), config.signer_service_account.clone());
            let document = Publisher::new(Box::new(store), config.publish_settings())
                .publish(&report)
                .await?;
            println!("{}", document.url);
        },
        Command::Tag {
            bucket,
            name,
            value,
        } => {
            GcsBucketTagger::new(client.clone())
                .put_bucket_tag(bucket, name, value)
                .await?;
            println!("Labelled bucket {} with {}={}", bucket, name, value);
        },
        Command::Invoke { tagging, event } => {
            let request = read_event(event)?;
            let router = build_router(&client, &config);
            let response = if *tagging {
                router.handle_tagging(&request).await
            } else {
                router.handle(&request).await
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        },
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_guard = setup_logging(args.log_level);

    if let Err(err) = run(args).await {
        tracing::error!("{:#}", err);
        eprintln!("Error: {}", format_gcp_error(&err));
        drop(log_guard);
        std::process::exit(1);
    }
}
