//! `devices-api` operator CLI
//!
//! Runs pairing, unpairing and template application against the configured
//! record store and collaborator services.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use devices_core::TokenId;
use devices_core::config::{default_database_path, load_settings};
use devices_core::tracing_init::init_tracing;
use tracing::info;

use devices_api::autopi::{AutoPiApi, AutoPiClient};
use devices_api::definitions::DeviceDefinitionsClient;
use devices_api::pairing::{Collaborators, PairingOrchestrator, Vendor};
use devices_api::sinks::{HttpDeviceDefinitionRegistrar, HttpEventEmitter, HttpIngestRegistrar};
use devices_api::storage::Database;
use devices_api::template::{ApplyHardwareTemplateRequest, HardwareTemplateService};

#[derive(Parser, Debug)]
#[command(name = "devices-api")]
#[command(version, about = "devices-api - aftermarket device pairing")]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true, env = "DEVICES_API_CONFIG")]
    config: Option<PathBuf>,

    /// Database file path
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, global = true, env = "DEVICES_API_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or upgrade the database schema
    Migrate,
    /// Pair a hardware token with a vehicle token
    Pair(PairArgs),
    /// Remove a hardware/vehicle pairing
    Unpair(PairArgs),
    /// Force a hardware template onto a paired AutoPi unit
    ApplyTemplate {
        #[arg(long)]
        vehicle_id: String,
        #[arg(long)]
        unit_id: String,
        #[arg(long)]
        template_id: String,
    },
}

#[derive(clap::Args, Debug)]
struct PairArgs {
    #[arg(long, value_enum)]
    vendor: VendorArg,
    #[arg(long)]
    hardware_token: TokenId,
    #[arg(long)]
    vehicle_token: TokenId,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum VendorArg {
    Autopi,
    Generic,
    Macaron,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.config.as_deref())?;
    let log_filter = format!("devices_api={}", settings.log.level);
    init_tracing(&log_filter, cli.log_json || settings.log.json);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting devices-api");

    let db_path = cli
        .db_path
        .or_else(|| settings.database.path.clone())
        .or_else(default_database_path)
        .context("Cannot determine database path")?;
    info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).await?;

    match cli.command {
        Command::Migrate => {
            info!("Schema is up to date");
        }
        Command::Pair(args) => {
            let orchestrator = orchestrator(&settings, db, args.vendor)?;
            orchestrator
                .pair(args.hardware_token, args.vehicle_token)
                .await?;
            println!("Paired hardware {} with vehicle {}", args.hardware_token, args.vehicle_token);
        }
        Command::Unpair(args) => {
            let orchestrator = orchestrator(&settings, db, args.vendor)?;
            orchestrator
                .unpair(args.hardware_token, args.vehicle_token)
                .await?;
            println!("Unpaired hardware {} from vehicle {}", args.hardware_token, args.vehicle_token);
        }
        Command::ApplyTemplate {
            vehicle_id,
            unit_id,
            template_id,
        } => {
            let service = HardwareTemplateService::new(db, autopi_client(&settings)?);
            let resp = service
                .apply_hardware_template(&ApplyHardwareTemplateRequest {
                    user_device_id: vehicle_id,
                    unit_id,
                    hardware_template_id: template_id,
                })
                .await?;
            println!("Template applied: {}", resp.applied);
        }
    }

    Ok(())
}

fn autopi_client(settings: &devices_core::Settings) -> anyhow::Result<Arc<dyn AutoPiApi>> {
    Ok(Arc::new(AutoPiClient::new(
        &settings.autopi.api_url,
        &settings.autopi.api_token,
    )?))
}

fn orchestrator(
    settings: &devices_core::Settings,
    db: Database,
    vendor: VendorArg,
) -> anyhow::Result<PairingOrchestrator> {
    let services = &settings.services;
    let deps = Collaborators {
        db,
        definitions: Arc::new(DeviceDefinitionsClient::new(&services.device_definitions_url)?),
        ingest: Arc::new(HttpIngestRegistrar::new(&services.ingest_registrar_url)?),
        events: Arc::new(HttpEventEmitter::new(&services.events_sink_url)?),
        dd_registrar: Arc::new(HttpDeviceDefinitionRegistrar::new(&services.dd_registrar_url)?),
    };

    let vendor = match vendor {
        VendorArg::Autopi => Vendor::AutoPi(autopi_client(settings)?),
        VendorArg::Generic => Vendor::GenericAftermarket,
        VendorArg::Macaron => Vendor::Macaron,
    };
    Ok(PairingOrchestrator::new(deps, vendor))
}
