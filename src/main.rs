//! Terminal front end for the sensor dashboard.
//!
//! Usage:
//!   sensor-dashboard watch
//!   sensor-dashboard arm <source>
//!   sensor-dashboard timeout <source> [--set <minutes>]
//!   sensor-dashboard report <sensor> [--page <n>]

use clap::{Parser, Subcommand};
use log::{error, info, warn};
use sensor_dashboard::api::{HttpSensorApi, SensorApi};
use sensor_dashboard::commands::SensorCommands;
use sensor_dashboard::config::{self, Config};
use sensor_dashboard::error::Result;
use sensor_dashboard::live::{EngineHandle, RegistryView, SyncEngine, WebSocketTransport};
use sensor_dashboard::sensors::derive::{format_timestamp, truncate_version};
use std::sync::Arc;
use tokio::signal;

#[derive(Parser)]
#[command(name = "sensor-dashboard")]
#[command(about = "Live view and control of door/garage sensors")]
struct Cli {
    /// Dashboard origin; REST and live URLs derive from it
    #[arg(long, env = "DASHBOARD_ORIGIN")]
    origin: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow live sensor state until Ctrl+C
    Watch,
    /// List every sensor the server knows
    Sensors,
    /// Show status history for a sensor
    Report {
        sensor: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Restart a sensor
    Restart { source: String },
    /// Toggle arm/disarm for a sensor
    Arm { source: String },
    /// Show or change a sensor's open timeout (minutes)
    Timeout {
        source: String,
        #[arg(long)]
        set: Option<u32>,
    },
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Environment writes must happen before any runtime threads exist.
    config::load_dotenv();
    init_logger();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(origin) = cli.origin {
        config.server.origin = origin;
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli.command, config)) {
        if e.is_command_error() {
            eprintln!("Error: {e}");
        } else {
            error!("{}", e);
        }
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: Config) -> Result<()> {
    let api: Arc<dyn SensorApi> = Arc::new(HttpSensorApi::new(config.server.api_base()));

    match command {
        Commands::Watch => watch(&config, api).await,
        Commands::Sensors => list_sensors(api.as_ref()).await,
        Commands::Report { sensor, page } => report(api.as_ref(), &sensor, page).await,
        Commands::Restart { source } => api.restart(&source).await.map(|()| {
            println!("Restart requested for {source}");
        }),
        Commands::Arm { source } => api.toggle_arming(&source).await.map(|armed| {
            println!("{source}: {}", if armed { "Armed" } else { "Disarmed" });
        }),
        Commands::Timeout { source, set } => timeout(api.as_ref(), &source, set).await,
    }
}

async fn watch(config: &Config, api: Arc<dyn SensorApi>) -> Result<()> {
    let url = config.server.ws_url();
    info!("Starting live sync against {}", url);

    let (engine, handle) = SyncEngine::new(WebSocketTransport, url, &config.sync);
    let engine_task = tokio::spawn(engine.run());
    let commands = SensorCommands::new(api, handle.clone());
    let render_task = tokio::spawn(render_loop(handle.clone(), commands));

    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }

    handle.shutdown();
    render_task.abort();
    if let Err(e) = engine_task.await {
        warn!("Sync engine task ended abnormally: {}", e);
    }
    Ok(())
}

/// Redraw on every published view. Open timeouts are fetched once per sensor
/// the first time it shows up.
async fn render_loop(handle: EngineHandle, commands: SensorCommands) {
    let mut view = handle.subscribe();
    let mut fetched = std::collections::HashSet::new();

    loop {
        let current = view.borrow_and_update().clone();
        render(&current);

        for sensor in current.sensors.iter() {
            if fetched.insert(sensor.source.clone())
                && let Err(e) = commands.load_open_timeout(&sensor.source).await
            {
                warn!("Could not load open timeout for {}: {}", sensor.source, e);
            }
        }

        if view.changed().await.is_err() {
            break;
        }
    }
}

fn render(view: &RegistryView) {
    println!();
    if view.is_stale() {
        println!("[{}] showing last known state", view.connection);
    }
    if view.sensors.is_empty() {
        println!("No sensors currently connected");
        return;
    }

    for sensor in view.sensors.iter() {
        let armed = match sensor.armed {
            Some(true) => "armed",
            Some(false) => "disarmed",
            None => "-",
        };
        let timeout = sensor
            .open_timeout_minutes
            .map(|m| format!("{m}m"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<8} {:<8} {:<6} {:<18} {:<9} {:<4} {}",
            sensor.source,
            sensor.status,
            sensor.icon,
            sensor.color,
            sensor.relative_age,
            armed,
            timeout,
            sensor.short_version
        );
    }
}

async fn list_sensors(api: &dyn SensorApi) -> Result<()> {
    for sensor in api.list_sensors().await? {
        println!("{sensor}");
    }
    Ok(())
}

async fn report(api: &dyn SensorApi, sensor: &str, page: u32) -> Result<()> {
    let page_data = api.report(sensor, page).await?;
    println!("Page {} of {}", page, page_data.num_pages);
    for entry in page_data.messages {
        println!(
            "{:<20} {:<20} {:<8} {}",
            format_timestamp(entry.timestamp, &chrono::Local),
            entry.source,
            entry.status,
            truncate_version(&entry.version)
        );
    }
    Ok(())
}

async fn timeout(api: &dyn SensorApi, source: &str, set: Option<u32>) -> Result<()> {
    match set {
        Some(minutes) => {
            api.set_open_timeout(source, minutes).await?;
            println!("Successfully updated open timeout for {source} to {minutes} minutes");
        }
        None => {
            let minutes = api.open_timeout(source).await?;
            println!("{source}: open timeout {minutes} minutes");
        }
    }
    Ok(())
}
