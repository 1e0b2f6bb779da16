//! AgriSmart CLI - run the web service or the advisor flows from a terminal.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use advisor::{CropRecommendationInput, DataUri, ProviderRegistry};
use agrismart::actions::{ActionResult, Actions, CropRecommendationResult, DiseaseDetectionResult};
use agrismart::app;
use agrismart::auth::UserInfo;
use agrismart::config::{AuthBackend, Config, StorageBackend};
use agrismart::history::HistoryCollection;
use agrismart::server::{run_server, AppState};

const DEFAULT_LOG_FILTER: &str = "agrismart=info,advisor=info,warn";
const VERBOSE_LOG_FILTER: &str = "agrismart=debug,advisor=debug,info";

/// AgriSmart - AI crop recommendations and plant disease diagnosis.
#[derive(Parser)]
#[command(name = "agrismart")]
#[command(about = "AI crop recommendations and plant disease diagnosis for farmers")]
#[command(version)]
pub struct Cli {
    /// Config file (TOML)
    #[arg(short, long, global = true, env = "AGRISMART_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long)]
        bind: Option<String>,

        /// Identity backend
        #[arg(long, value_enum)]
        auth: Option<AuthBackend>,

        /// History storage backend
        #[arg(long, value_enum)]
        storage: Option<StorageBackend>,

        /// Directory for the file storage backend
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Recommend a crop for soil and climate readings
    Recommend {
        #[command(flatten)]
        readings: Readings,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Recommend a crop for a random, in-range set of readings
    Simulate {
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Diagnose a plant disease from a photo
    Diagnose {
        /// Image file (png, jpg/jpeg or webp)
        image: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// List or delete saved history records
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Args)]
pub struct Readings {
    /// Nitrogen (N) in the soil
    #[arg(long, short = 'n')]
    nitrogen: f64,
    /// Phosphorus (P) in the soil
    #[arg(long, short = 'p')]
    phosphorus: f64,
    /// Potassium (K) in the soil
    #[arg(long, short = 'k')]
    potassium: f64,
    /// Temperature in degrees Celsius
    #[arg(long, allow_negative_numbers = true)]
    temperature: f64,
    /// Relative humidity in percent
    #[arg(long)]
    humidity: f64,
    /// Soil pH
    #[arg(long)]
    ph: f64,
    /// Rainfall in mm
    #[arg(long)]
    rainfall: f64,
}

impl From<Readings> for CropRecommendationInput {
    fn from(r: Readings) -> Self {
        Self {
            nitrogen: r.nitrogen,
            phosphorus: r.phosphorus,
            potassium: r.potassium,
            temperature: r.temperature,
            humidity: r.humidity,
            ph: r.ph,
            rainfall: r.rainfall,
        }
    }
}

#[derive(Args)]
pub struct OutputArgs {
    /// User id the result is saved under
    #[arg(long, env = "AGRISMART_USER", default_value = "cli")]
    user: String,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List records, newest first
    List {
        /// User id
        #[arg(long, env = "AGRISMART_USER", default_value = "cli")]
        user: String,

        /// Only this collection (cropRecommendations or diseaseDetections)
        #[arg(long)]
        collection: Option<HistoryCollection>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete one record
    Delete {
        /// User id
        #[arg(long, env = "AGRISMART_USER", default_value = "cli")]
        user: String,

        /// Collection (cropRecommendations or diseaseDetections)
        #[arg(long)]
        collection: HistoryCollection,

        /// Record id
        id: String,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve {
            bind,
            auth,
            storage,
            data_dir,
        } => {
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
            }
            if let Some(auth) = auth {
                config.auth.backend = auth;
            }
            if let Some(storage) = storage {
                config.storage.backend = storage;
            }
            if let Some(dir) = data_dir {
                config.storage.data_dir = dir;
            }
            serve(config).await
        }
        Commands::Recommend { readings, output } => {
            let actions = cli_actions(&config)?;
            let result = actions
                .recommend_crop(&cli_user(&output.user), readings.into())
                .await?;
            print_crop_result(result, output.json)
        }
        Commands::Simulate { output } => {
            let actions = cli_actions(&config)?;
            let result = actions
                .simulate_crop_recommendation(&cli_user(&output.user))
                .await?;
            print_crop_result(result, output.json)
        }
        Commands::Diagnose { image, output } => {
            let photo = DataUri::from_file(&image)?;
            let actions = cli_actions(&config)?;
            let result = actions
                .diagnose_plant_disease(&cli_user(&output.user), &photo.to_string())
                .await?;
            print_disease_result(result, output.json)
        }
        Commands::History { action } => history_command(&config, action).await,
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            VERBOSE_LOG_FILTER
        } else {
            DEFAULT_LOG_FILTER
        })
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(config: Config) -> Result<()> {
    let registry = ProviderRegistry::with_defaults();
    let state = AppState::new(
        app::build_identity(&config)?,
        app::build_actions(&config, &registry)?,
        config.server.max_body_bytes,
    );
    run_server(state, &config.server.bind_addr).await
}

fn cli_actions(config: &Config) -> Result<Actions> {
    app::build_actions(config, &ProviderRegistry::with_defaults())
}

fn cli_user(uid: &str) -> UserInfo {
    UserInfo {
        uid: uid.to_string(),
        email: String::new(),
        display_name: None,
    }
}

fn print_crop_result(result: ActionResult<CropRecommendationResult>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    let result = match result {
        ActionResult::Data(result) => result,
        ActionResult::Error(message) => bail!(message),
    };
    if json {
        return Ok(());
    }

    let i = &result.inputs;
    println!("{}", "Readings".bold());
    println!(
        "  N {}  P {}  K {}  {} °C  {}% humidity  pH {}  {} mm rain",
        i.nitrogen, i.phosphorus, i.potassium, i.temperature, i.humidity, i.ph, i.rainfall
    );
    println!();
    println!(
        "{} {}",
        "Recommended crop:".bold(),
        result.output.recommended_crop.green().bold()
    );
    println!("{} {}", "Fertilizer:".bold(), result.output.fertilizer);
    println!("{}", "Tips:".bold());
    for tip in &result.tip_list {
        println!("  • {tip}");
    }
    if let Some(id) = &result.record_id {
        println!();
        println!("{}", format!("Saved as {id}").dimmed());
    }
    Ok(())
}

fn print_disease_result(result: ActionResult<DiseaseDetectionResult>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    let result = match result {
        ActionResult::Data(result) => result,
        ActionResult::Error(message) => bail!(message),
    };
    if json {
        return Ok(());
    }

    let output = &result.output;
    println!(
        "{} {} ({})",
        "Disease:".bold(),
        output.disease.red().bold(),
        output.confidence
    );
    println!();
    println!("{}", "Cure".bold());
    println!("{}", output.cure_instructions);
    println!();
    println!("{}", "Prevention".bold());
    println!("{}", output.prevention_tips);
    if let Some(id) = &result.record_id {
        println!();
        println!("{}", format!("Saved as {id}").dimmed());
    }
    Ok(())
}

async fn history_command(config: &Config, action: HistoryAction) -> Result<()> {
    let history = agrismart::History::new(app::build_store(config));

    match action {
        HistoryAction::List {
            user,
            collection,
            json,
        } => {
            let view = history.list_all(&user).await?;
            let show_crops = collection != Some(HistoryCollection::DiseaseDetections);
            let show_diseases = collection != Some(HistoryCollection::CropRecommendations);

            if json {
                let value = match collection {
                    Some(HistoryCollection::CropRecommendations) => {
                        serde_json::to_value(&view.crop_recommendations)?
                    }
                    Some(HistoryCollection::DiseaseDetections) => {
                        serde_json::to_value(&view.disease_detections)?
                    }
                    None => serde_json::to_value(&view)?,
                };
                println!("{}", serde_json::to_string_pretty(&value)?);
                return Ok(());
            }

            if show_crops {
                println!(
                    "{} ({})",
                    "Crop recommendations".bold(),
                    view.crop_recommendations.len()
                );
                for record in &view.crop_recommendations {
                    println!(
                        "  {}  {}  {}  {}",
                        record.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                        record.id.cyan(),
                        record.output.recommended_crop.green(),
                        record.output.fertilizer
                    );
                }
            }
            if show_diseases {
                println!(
                    "{} ({})",
                    "Disease detections".bold(),
                    view.disease_detections.len()
                );
                for record in &view.disease_detections {
                    println!(
                        "  {}  {}  {}  {}",
                        record.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                        record.id.cyan(),
                        record.output.disease.red(),
                        record.output.confidence
                    );
                }
            }
            Ok(())
        }
        HistoryAction::Delete {
            user,
            collection,
            id,
            yes,
        } => {
            if !yes {
                bail!("Refusing to delete {collection}/{id} without --yes");
            }
            history
                .delete(&user, collection, &id)
                .await
                .with_context(|| format!("Failed to delete {collection}/{id}"))?;
            println!("{} {collection}/{id}", "Deleted".green());
            Ok(())
        }
    }
}
