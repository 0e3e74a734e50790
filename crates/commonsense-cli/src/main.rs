//! CommonSense CLI - Command-line tool for the CommonSense sensor-data service
//!
//! Every command logs in, runs, and logs out again.

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commonsense_client::{ClientConfig, DataQuery, SenseClient, Sensor};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, MergedConfig};
use crate::output::{OutputContext, OutputFormat};

#[derive(Parser)]
#[command(name = "commonsense-cli")]
#[command(author, version, about = "CommonSense sensor-data CLI")]
#[command(propagate_version = true)]
struct Cli {
    /// Server URL
    #[arg(short, long, env = "COMMONSENSE_SERVER")]
    server: Option<String>,

    /// Account name
    #[arg(short, long, env = "COMMONSENSE_USER")]
    username: Option<String>,

    /// Account password
    #[arg(short, long, env = "COMMONSENSE_PASSWORD", hide_env_values = true)]
    password: String,

    /// Configuration file path
    #[arg(short, long, env = "COMMONSENSE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Minimal output (for scripting)
    #[arg(short, long)]
    quiet: bool,

    /// Verbose logging, including full request and response dumps
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List owned sensors
    Sensors {
        /// Walk every page instead of the first 1000 physical sensors
        #[arg(long)]
        all: bool,
    },

    /// List sensors with their metatags
    Metatags {
        /// Metatag namespace
        namespace: String,
    },

    /// Create a sensor
    Create {
        name: String,
        device_type: String,
        display_name: String,
        /// Data type: float, int, bool, string, json
        data_type: String,

        /// Structure hint for json sensors
        #[arg(long)]
        data_structure: Option<String>,

        /// Do not persist raw values
        #[arg(long)]
        no_storage: bool,
    },

    /// Delete a sensor
    Delete {
        /// Sensor ID
        id: String,
    },

    /// Upload a data point
    Upload {
        /// Sensor ID
        id: String,

        /// Value to store
        value: String,

        /// Seconds since the epoch (default: now)
        #[arg(long)]
        date: Option<f64>,
    },

    /// Read data points of one or more sensors
    Data {
        /// Sensor ID(s)
        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        per_page: Option<u32>,

        /// Start date, seconds since the epoch
        #[arg(long)]
        start: Option<f64>,

        /// End date, seconds since the epoch
        #[arg(long)]
        end: Option<f64>,

        /// Only the latest point
        #[arg(long)]
        last: bool,
    },

    /// Exercise listing, sensor creation and upload once
    Smoke,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    // Load config file
    let config = if let Some(config_path) = &cli.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_default()
    };

    let merged = config.merge_with_args(
        cli.server.as_deref(),
        cli.username.as_deref(),
        cli.output,
        cli.no_color,
    )?;

    let ctx = OutputContext::new(merged.output, merged.no_color, cli.quiet);

    let username = merged
        .username
        .clone()
        .context("No username given (use --username or COMMONSENSE_USER)")?;

    let mut client = create_client(&merged, cli.verbose)?;
    client
        .login(&username, &cli.password)
        .await
        .context("Login failed")?;

    let result = run(&client, &cli.command, &ctx).await;

    if let Err(e) = client.logout().await {
        ctx.warn(&format!("Logout failed: {}", e));
    }

    result
}

async fn run(client: &SenseClient, command: &Commands, ctx: &OutputContext) -> Result<()> {
    match command {
        Commands::Sensors { all } => commands::sensors(client, *all, ctx).await,

        Commands::Metatags { namespace } => commands::metatags(client, namespace, ctx).await,

        Commands::Create {
            name,
            device_type,
            display_name,
            data_type,
            data_structure,
            no_storage,
        } => {
            let mut sensor = Sensor::new(name, device_type, display_name, data_type)
                .with_data_storage(!no_storage);
            if let Some(structure) = data_structure {
                sensor = sensor.with_data_structure(structure);
            }
            commands::create(client, &sensor, ctx).await
        }

        Commands::Delete { id } => commands::delete(client, id, ctx).await,

        Commands::Upload { id, value, date } => {
            commands::upload(client, id, value, *date, ctx).await
        }

        Commands::Data {
            ids,
            page,
            per_page,
            start,
            end,
            last,
        } => {
            let query = DataQuery {
                page: *page,
                per_page: *per_page,
                start_date: *start,
                end_date: *end,
                last: last.then_some(true),
                ..Default::default()
            };
            commands::data(client, ids, &query, ctx).await
        }

        Commands::Smoke => commands::smoke(client, ctx).await,
    }
}

/// Create a CommonSense client from the merged configuration
fn create_client(merged: &MergedConfig, verbose: bool) -> Result<SenseClient> {
    let mut builder = ClientConfig::builder(&merged.server)
        .date_precision(merged.date_precision)
        .verbose(verbose);
    if let Some(path) = &merged.diagnostics_file {
        builder = builder.diagnostics_file(path);
    }

    SenseClient::with_config(builder.build()).context("Failed to create CommonSense client")
}
