//! clinic-assistant CLI entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinic_assistant::agent::{Agent, AgentConfig, Checkpointer, MemoryCheckpointer, SqliteCheckpointer};
use clinic_assistant::cli::{expand_path, run_repl};
use clinic_assistant::config::{AppConfig, Backend};
use clinic_assistant::gateway::{Gateway, GatewayServer, SessionManagerConfig};
use clinic_assistant::llm::{ChatModel, OpenAiCompatible};
use clinic_assistant::schedule::SlotService;
use clinic_assistant::store::{self, AppointmentCrud, CsvSlotStore, DocumentStore, SeedMode};
use clinic_assistant::tools::ToolRegistry;

/// Conversational assistant for booking clinic appointments.
#[derive(Parser)]
#[command(name = "clinic-assistant")]
#[command(about = "Check doctor availability and book appointments by chatting.")]
#[command(version)]
struct Cli {
    /// Config file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store the tools run against
    #[arg(short, long, global = true, value_enum)]
    backend: Option<Backend>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat in the terminal (default)
    Chat,

    /// Start the web chat server
    Serve {
        /// Address to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load availability rows from a CSV file into the document store
    Seed {
        /// CSV file to read
        csv: PathBuf,

        /// Clear the collection first instead of skipping known doctors
        #[arg(long)]
        replace: bool,
    },

    /// Show free slots on a date
    Availability {
        /// Date as DD-MM-YYYY
        #[arg(long)]
        date: String,

        /// Doctor name
        #[arg(long, conflicts_with = "specialization", required_unless_present = "specialization")]
        doctor: Option<String>,

        /// Specialization
        #[arg(long)]
        specialization: Option<String>,
    },

    /// Book a slot
    Book {
        /// DD-MM-YYYY or DD-MM-YYYY HH:MM
        #[arg(long)]
        date: String,

        /// Doctor name
        #[arg(long)]
        doctor: String,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current config
    Show,

    /// Validate config
    Validate,
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(expand_path(path))
            .with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };
    config.apply_env();
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    Ok(config)
}

fn init_logging(config: &AppConfig, verbose: bool) {
    let log_level = if verbose { "debug" } else { config.logging.level.as_str() };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_agent(config: &AppConfig) -> anyhow::Result<Agent> {
    let api_key = config.api_key()?;
    let model: Arc<dyn ChatModel> = Arc::new(OpenAiCompatible::new(&config.llm, api_key)?);

    let tools = match config.storage.backend {
        Backend::Csv => {
            ToolRegistry::csv_toolset(slot_service(config), model.clone())?
        }
        Backend::Document => {
            let db = DocumentStore::open(config.database_path()?)?;
            let crud = AppointmentCrud::new(Arc::new(db), config.storage.collection.clone());
            ToolRegistry::document_toolset(crud, model.clone())?
        }
    };

    let checkpointer: Arc<dyn Checkpointer> = match &config.storage.checkpoint_path {
        Some(path) => Arc::new(SqliteCheckpointer::open(path)?),
        None => Arc::new(MemoryCheckpointer::new()),
    };

    tracing::info!(
        "Agent ready: model {}, {} backend, tools [{}]",
        model.model_name(),
        config.storage.backend,
        tools.names().join(", ")
    );

    Ok(Agent::new(
        model,
        tools,
        checkpointer,
        AgentConfig {
            max_steps: config.agent.max_steps,
            ..Default::default()
        },
    ))
}

fn slot_service(config: &AppConfig) -> SlotService {
    SlotService::new(Arc::new(CsvSlotStore::new(config.storage.csv_path.clone())))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = load_config(&cli)?;
    init_logging(&config, cli.verbose);

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            config.validate()?;
            let agent = build_agent(&config)?;
            println!("🩺 Clinic assistant. Type 'exit' or 'quit' to leave.");
            run_repl(&agent, &config.agent.thread_id).await?;
        }

        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;

            let agent = build_agent(&config)?;
            let gateway = Gateway::new(Arc::new(agent), SessionManagerConfig::from(&config.session));
            let server = GatewayServer::new(
                gateway,
                &config.server.host,
                config.server.port,
                config.server.cors_enabled,
            );
            println!("🩺 Chat page at http://{}", config.server_addr());
            server.start().await?;
        }

        Commands::Seed { csv, replace } => {
            let db = DocumentStore::open(config.database_path()?)?;
            let mode = if replace { SeedMode::Replace } else { SeedMode::SkipExistingDoctors };
            let report = store::seed(&db, &csv, &config.storage.collection, mode)?;
            println!("{}", report);
        }

        Commands::Availability { date, doctor, specialization } => {
            let slots = slot_service(&config);
            let text = match (doctor, specialization) {
                (Some(doctor), _) => slots.availability_by_doctor(&date, &doctor)?,
                (None, Some(specialization)) => {
                    slots.availability_by_specialization(&date, &specialization)?
                }
                (None, None) => anyhow::bail!("--doctor or --specialization is required"),
            };
            println!("{}", text);
        }

        Commands::Book { date, doctor } => {
            let outcome = slot_service(&config).set_appointment(&date, &doctor)?;
            println!("{}", outcome);
        }

        Commands::Config { action } => match action {
            ConfigCommands::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigCommands::Validate => {
                config.validate()?;
                println!("✓ Configuration is valid ({} backend)", config.storage.backend);
            }
        },
    }

    Ok(())
}
