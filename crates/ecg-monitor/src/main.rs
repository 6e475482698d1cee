//! ECG Monitor - live heart-rate and signal-quality readout
//!
//! Signal flow: sample source (simulator or TCP) -> stream controller -> console

mod console;
mod monitor_service;
mod tcp_source;
mod view;

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use ecg_core::TransportEvent;
use ecg_processing::{ControlAction, MonitorConfig, MonitorProfile};
use ecg_simulation::{start_ecg_stream, EcgConfig, EcgPattern, NoiseConfig, StreamConfig};
use monitor_service::{start_monitor_service, Link, MonitorUpdate};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use view::{ConsoleCommand, YAxisZoom};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    /// Built-in ECG simulator
    Simulate,
    /// Newline-delimited samples over TCP
    Tcp,
}

#[derive(Parser, Debug)]
#[command(name = "ecg-monitor", about = "Real-time ECG stream monitor")]
struct Args {
    /// Where samples come from
    #[arg(long, value_enum, default_value = "simulate")]
    source: SourceKind,

    /// Device address for the TCP source
    #[arg(long, default_value = "127.0.0.1:9000")]
    addr: String,

    /// Monitor configuration file (JSON); overrides --profile
    #[arg(long)]
    config: Option<PathBuf>,

    /// Built-in configuration profile: standard or responsive
    #[arg(long, default_value = "standard")]
    profile: String,

    /// Simulator waveform preset
    #[arg(long, default_value = "resting")]
    pattern: String,

    /// Simulator random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Per-sample probability of a simulated lead-off episode
    #[arg(long, default_value = "0.0")]
    dropout: f32,

    /// Stop after this many seconds
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Print the display trace on every redraw
    #[arg(long)]
    print_trace: bool,

    /// Print updates as JSON lines instead of text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    info!(config = %config.name, source = ?args.source, "Starting ECG monitor");

    let (events, link) = open_source(&args, &config)?;
    let (mut updates, controls, service) = start_monitor_service(config.clone(), events, link)
        .context("Failed to start monitor service")?;

    // The reader thread is never joined; returning from main ends the process
    let (console_sender, mut console) = mpsc::channel(8);
    console::spawn_console_reader(std::io::BufReader::new(std::io::stdin()), console_sender)
        .context("Failed to start console reader")?;

    let mut zoom = YAxisZoom::new(config.sample_range);
    let deadline = sleep(Duration::from_secs(args.duration_secs.unwrap_or(0)));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => render(&update, &args, &zoom)?,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Display lagged behind the monitor");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            Some(command) = console.recv() => match command {
                ConsoleCommand::Control(action) => {
                    if controls.send(action).await.is_err() {
                        break;
                    }
                }
                ConsoleCommand::ZoomIn => zoom.zoom_in(),
                ConsoleCommand::ZoomOut => zoom.zoom_out(),
                ConsoleCommand::ZoomReset => zoom.reset(),
                ConsoleCommand::Quit => break,
            },

            _ = &mut deadline, if args.duration_secs.is_some() => {
                info!("Run duration reached");
                break;
            }

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // Leave the link cleanly, then let the service wind down
    let _ = controls.send(ControlAction::Disconnect).await;
    drop(controls);

    let stats = service.await.context("Monitor service panicked")?;
    info!(
        accepted = stats.accepted,
        disconnects = stats.disconnect_signals,
        rejected = stats.rejected,
        evaluations = stats.evaluations,
        skipped = stats.skipped_evaluations,
        "Session summary"
    );
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<MonitorConfig> {
    if let Some(path) = &args.config {
        return MonitorConfig::from_json_file(path)
            .with_context(|| format!("Invalid configuration {}", path.display()));
    }

    let profile = match args.profile.to_ascii_lowercase().as_str() {
        "standard" => MonitorProfile::Standard,
        "responsive" => MonitorProfile::Responsive,
        other => return Err(anyhow!("Unknown profile '{}'", other)),
    };
    Ok(MonitorConfig::for_profile(profile))
}

fn open_source(
    args: &Args,
    config: &MonitorConfig,
) -> anyhow::Result<(mpsc::Receiver<TransportEvent>, Link)> {
    match args.source {
        SourceKind::Simulate => {
            let pattern = EcgPattern::preset(&args.pattern).ok_or_else(|| {
                let known: Vec<_> = EcgPattern::presets().into_iter().map(|(n, _)| n).collect();
                anyhow!("Unknown pattern '{}', expected one of {}", args.pattern, known.join(", "))
            })?;

            let stream_config = StreamConfig {
                ecg_config: EcgConfig {
                    sample_range: config.sample_range,
                    sample_interval_ms: config.analysis.sample_interval_ms,
                    pattern,
                    noise: NoiseConfig {
                        dropout_prob: args.dropout,
                        ..NoiseConfig::default()
                    },
                    seed: args.seed,
                },
                autostart: true,
                ..StreamConfig::default()
            };
            let (events, commands) =
                start_ecg_stream(stream_config).context("Failed to start simulator")?;
            info!(pattern = pattern.description(), "Simulated source started");
            Ok((events, Link::Simulated(commands)))
        }
        SourceKind::Tcp => {
            let (events, commands) = tcp_source::start_tcp_source(args.addr.clone(), 256);
            info!(addr = %args.addr, "TCP source started");
            Ok((events, Link::Tcp(commands)))
        }
    }
}

fn render(update: &MonitorUpdate, args: &Args, zoom: &YAxisZoom) -> anyhow::Result<()> {
    if args.json {
        if matches!(update, MonitorUpdate::Trace(_)) && !args.print_trace {
            return Ok(());
        }
        println!("{}", serde_json::to_string(update)?);
        return Ok(());
    }

    match update {
        MonitorUpdate::Status(status) => println!("status: {}", status),
        MonitorUpdate::State { state, controls_enabled } => {
            println!("state: {:?} (controls {})", state, if *controls_enabled { "on" } else { "off" });
        }
        MonitorUpdate::Metrics(metrics) => println!("{}", view::format_metrics(metrics)),
        MonitorUpdate::Trace(trace) if args.print_trace => {
            println!("{}", view::format_trace(trace, zoom, 80));
        }
        MonitorUpdate::Trace(_) => {}
    }
    Ok(())
}
