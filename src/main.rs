//! Power Probe binary
//!
//! Calibrates the current sensor, then serves the readings page. With no
//! arguments it behaves like the fixed-configuration firmware: port 8080,
//! ACS712-5A, 30k/7.5k divider.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use power_probe::{
    sensors::adc, start_web_server, ReadingSnapshot, SensorPipeline, SensorSettings,
    SensorVariant, WebConfig, ZeroCalibrator, ACCESS_POINT_PASSWORD, ACCESS_POINT_SSID,
    DEFAULT_REFRESH_MS, DEFAULT_WEB_PORT,
};
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "power_probe")]
#[command(about = "⚡ Power Probe - voltage and current readings over HTTP")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Serves voltage divider and ACS712 current sensor readings as a web page")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Current sensor variant: 5a, 20a or 30a
    #[arg(long, default_value_t = SensorVariant::default())]
    variant: SensorVariant,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate and serve the readings page (default)
    Serve,

    /// Calibrate, take a single reading and exit
    Snapshot(SnapshotArgs),

    /// Calibrate and print a reading every refresh interval
    Watch(WatchArgs),

    /// Show the fixed configuration
    Info,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

#[derive(Args)]
struct WatchArgs {
    /// Interval between readings in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_REFRESH_MS)]
    interval: u64,

    /// Stop after this many readings
    #[arg(short, long)]
    count: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    init_logging(&cli)?;

    // Print banner
    print_banner();

    match &cli.command {
        Some(Commands::Serve) | None => serve_command(&cli).await?,
        Some(Commands::Snapshot(args)) => snapshot_command(&cli, args).await?,
        Some(Commands::Watch(args)) => watch_command(&cli, args).await?,
        Some(Commands::Info) => info_command(&cli),
    }

    Ok(())
}

/// Level used when `RUST_LOG` is unset. `--debug` wins over `--verbose`.
fn default_log_level(cli: &Cli) -> LevelFilter {
    if cli.debug {
        LevelFilter::DEBUG
    } else if cli.verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(default_log_level(cli).into())
        .from_env_lossy();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    Ok(())
}

fn print_banner() {
    println!("⚡ Power Probe - voltage and current readings");
    println!("   Version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "   Join access point '{}' (passphrase '{}') to view the page",
        ACCESS_POINT_SSID, ACCESS_POINT_PASSWORD
    );
    println!();
}

fn sensor_settings(cli: &Cli) -> SensorSettings {
    SensorSettings::default().with_variant(cli.variant)
}

/// Run the zero-current pass off the async runtime, then build the pipeline.
async fn calibrated_pipeline(cli: &Cli) -> anyhow::Result<SensorPipeline> {
    let inputs = adc::open_inputs().context("failed to open analog inputs")?;
    let settings = sensor_settings(cli);
    let calibrator = ZeroCalibrator::default();

    println!(
        "Calibrating current sensor over {} samples, keep the load disconnected...",
        calibrator.samples()
    );
    let pipeline = tokio::task::spawn_blocking(move || {
        SensorPipeline::calibrate(settings, &calibrator, inputs.voltage, inputs.current)
    })
    .await
    .context("calibration task panicked")?
    .context("zero-current calibration failed")?;

    println!(
        "Zero offset: {:.4} V",
        pipeline.calibration().zero_offset_voltage()
    );
    Ok(pipeline)
}

async fn serve_command(cli: &Cli) -> anyhow::Result<()> {
    info!("Starting power probe...");

    let pipeline = Arc::new(calibrated_pipeline(cli).await?);
    let config = WebConfig::new(&cli.host, cli.port);

    info!("Web server configuration:");
    info!("  - Bind address: {}", config.bind_address());
    info!("  - Listen backlog: {}", config.backlog);
    info!("  - Sensor variant: {}", cli.variant);

    println!("Web server started. Visit http://{}/", config.bind_address());

    tokio::select! {
        result = start_web_server(config, pipeline) => result.context("web server stopped")?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, exiting"),
    }

    Ok(())
}

async fn snapshot_command(cli: &Cli, args: &SnapshotArgs) -> anyhow::Result<()> {
    let pipeline = calibrated_pipeline(cli).await?;
    let snapshot = pipeline.capture().context("failed to read sensors")?;

    match args.format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&snapshot)?;
            println!("{}", json);
        }
        "pretty" => print_pretty_snapshot(&snapshot),
        other => anyhow::bail!("Unsupported format: {}. Use 'json' or 'pretty'", other),
    }

    Ok(())
}

async fn watch_command(cli: &Cli, args: &WatchArgs) -> anyhow::Result<()> {
    let pipeline = Arc::new(calibrated_pipeline(cli).await?);
    let limit = args.count.unwrap_or(usize::MAX);
    let mut stream = pipeline.stream(args.interval).take(limit);

    while let Some(snapshot) = stream.next().await {
        println!(
            "[{}] {:>7.2} V {:>7.2} A {:>8.2} W",
            chrono::Local::now().format("%H:%M:%S"),
            snapshot.voltage,
            snapshot.current,
            snapshot.power_watts()
        );
    }

    Ok(())
}

fn info_command(cli: &Cli) {
    let settings = sensor_settings(cli);
    let config = WebConfig::new(&cli.host, cli.port);

    println!("⚡ Power Probe Configuration");
    println!("===========================");
    println!();
    println!("Analog front end:");
    println!("  ADC reference: {:.2} V", settings.reference_voltage());
    println!("  ADC full scale: {}", settings.max_raw_value());
    println!(
        "  Divider: {:.0} Ω / {:.0} Ω (ratio {:.3})",
        settings.divider().r1_ohms,
        settings.divider().r2_ohms,
        settings.divider().ratio()
    );
    println!(
        "  Current sensor: ACS712-{} ({} mV/A)",
        settings.variant().to_string().to_uppercase(),
        settings.variant().sensitivity_mv_per_amp()
    );
    println!();
    println!("Web server:");
    println!("  Bind address: {}", config.bind_address());
    println!("  Listen backlog: {}", config.backlog);
    println!("  Page refresh: {} ms", config.refresh_ms);
    println!();
    println!("Features compiled:");
    #[cfg(feature = "gpio")]
    println!("  - MCP3208 SPI ADC: ✓");
    #[cfg(not(feature = "gpio"))]
    println!("  - MCP3208 SPI ADC: ✗ (synthetic inputs)");
}

fn print_pretty_snapshot(snapshot: &ReadingSnapshot) {
    println!(
        "⚡ Reading ({})",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("==============================");
    println!("  Voltage: {:.2} V", snapshot.voltage);
    println!("  Current: {:.2} A", snapshot.current);
    println!("  Power:   {:.2} W", snapshot.power_watts());
}
