//! 60 GHz DMG/EDMG Scenario Runner
//!
//! This CLI drives the wigig simulation stack:
//! - Run a two-node beamforming-training scenario (BTI + A-BFT)
//! - Run a full beacon-interval schedule with application traffic
//! - Run a dual-band fast-session-transfer scenario
//! - Query a loaded SNR→BER table

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use wigig_core::error_model::DmgErrorModel;
use wigig_core::types::{AllocationId, AllocationKind, Mcs, StationId};
use wigig_core::SimTime;
use wigig_sim::{
    AllocationConfig, FstConfig, FstSession, Network, NetworkConfig, StationConfig,
    TrafficGenerator,
};

#[derive(Parser)]
#[command(name = "wigig")]
#[command(version, about = "60 GHz DMG/EDMG beamforming and channel-access simulator", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run BTI + A-BFT beamforming training between two nodes
    Sls {
        /// Sectors per antenna on each node
        #[arg(long, default_value = "8")]
        sectors: usize,

        /// Distance between the nodes in metres
        #[arg(long, default_value = "5.0")]
        distance: f64,

        /// Simulated duration in seconds
        #[arg(long, default_value = "0.5")]
        duration: f64,

        /// Directory for beamforming trace CSV output
        #[arg(long)]
        trace_dir: Option<PathBuf>,
    },

    /// Run a full beacon-interval schedule with application traffic
    Simulate {
        /// Application type (onoff, bulk)
        #[arg(long, default_value = "bulk")]
        app: String,

        /// Application data rate in Mb/s
        #[arg(long, default_value = "100.0")]
        rate: f64,

        /// Application payload size in bytes
        #[arg(long, default_value = "1448")]
        payload: usize,

        /// DMG single-carrier MCS index for data transfers
        #[arg(long, default_value = "4")]
        mcs: u8,

        /// Station position as "x,y" metres (AP sits at the origin)
        #[arg(long, default_value = "5.0,0.5")]
        position: String,

        /// Simulated duration in seconds
        #[arg(long, default_value = "1.0")]
        duration: f64,

        /// Service-period length per beacon interval, milliseconds
        #[arg(long, default_value = "40")]
        sp_ms: u64,

        /// JSON network configuration; overrides the flag-derived defaults
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory for beamforming trace CSV output
        #[arg(long)]
        trace_dir: Option<PathBuf>,
    },

    /// Run a dual-band fast-session-transfer scenario
    Fst {
        /// Instant of the session transfer in seconds
        #[arg(long, default_value = "5.0")]
        switch_at: f64,

        /// Simulated duration in seconds
        #[arg(long, default_value = "10.0")]
        duration: f64,

        /// 60 GHz link rate in Mb/s
        #[arg(long, default_value = "1000.0")]
        rate60: f64,

        /// 5 GHz link rate in Mb/s
        #[arg(long, default_value = "300.0")]
        rate5: f64,
    },

    /// Query a loaded SNR-BER table
    Ber {
        /// Table file in the DMG error-model format
        #[arg(short, long)]
        table: PathBuf,

        /// MCS index to query
        #[arg(long)]
        mcs: u8,

        /// SNR in dB
        #[arg(long)]
        snr: f64,
    },
}

fn parse_position(s: &str) -> Result<(f64, f64)> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        anyhow::bail!("position must be \"x,y\", got {s:?}");
    }
    Ok((
        parts[0].trim().parse().context("bad x coordinate")?,
        parts[1].trim().parse().context("bad y coordinate")?,
    ))
}

fn run_sls(
    sectors: usize,
    distance: f64,
    duration: f64,
    trace_dir: Option<PathBuf>,
) -> Result<()> {
    let config = NetworkConfig::default();
    let stations = vec![
        StationConfig::new(StationId(1), (0.0, 0.0), sectors),
        StationConfig::new(StationId(2), (distance, distance * 0.1), sectors),
    ];
    let mut network = Network::new(config, &stations)?;
    if let Some(dir) = trace_dir {
        network = network.with_trace_dir(&dir)?;
    }
    network.run(Duration::from_secs_f64(duration))?;

    for (at, station, event) in network.training_log() {
        println!("{at}  {station}  {event:?}");
    }
    let completions = network.sls_completions().len();
    println!("SLS completions: {completions}");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_simulate(
    app: String,
    rate: f64,
    payload: usize,
    mcs: u8,
    position: String,
    duration: f64,
    sp_ms: u64,
    config_path: Option<PathBuf>,
    trace_dir: Option<PathBuf>,
) -> Result<()> {
    let position = parse_position(&position)?;
    let config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => NetworkConfig {
            data_mcs: Mcs(mcs),
            allocations: vec![AllocationConfig {
                id: AllocationId(1),
                kind: AllocationKind::ServicePeriod,
                source: StationId(1),
                destination: StationId(2),
                offset: Duration::from_millis(2),
                duration: Duration::from_millis(sp_ms),
            }],
            ..Default::default()
        },
    };
    let stations = vec![
        StationConfig::new(StationId(1), (0.0, 0.0), 8),
        StationConfig::new(StationId(2), position, 8),
    ];
    let mut network = Network::new(config, &stations)?;
    if let Some(dir) = trace_dir {
        network = network.with_trace_dir(&dir)?;
    }

    let generator = match app.as_str() {
        "bulk" => TrafficGenerator::bulk(rate, payload),
        "onoff" => TrafficGenerator::on_off(
            rate,
            payload,
            Duration::from_millis(50),
            Duration::from_millis(50),
        ),
        other => anyhow::bail!("unknown app type {other:?} (use onoff or bulk)"),
    };
    network.add_traffic(StationId(1), StationId(2), generator)?;
    network.run(Duration::from_secs_f64(duration))?;

    let station = network.station(StationId(2))?;
    let summary = serde_json::json!({
        "sls_completions": network.sls_completions().len(),
        "delivered_bytes": station.delivered_bytes,
        "delivered_packets": station.delivered_packets,
        "throughput_mbps": network.throughput_mbps(StationId(2))?,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_fst(switch_at: f64, duration: f64, rate60: f64, rate5: f64) -> Result<()> {
    let config = FstConfig {
        rate_60ghz_mbps: rate60,
        rate_5ghz_mbps: rate5,
        ..Default::default()
    };
    let mut session = FstSession::new(config);
    session.establish_fst_session(SimTime::from_secs_f64(switch_at));
    session.run(SimTime::from_secs_f64(duration));

    let summary = serde_json::json!({
        "final_band": format!("{:?}", session.active_band()),
        "deliveries": session.deliveries().len(),
        "max_gap_us": session.max_delivery_gap().as_micros() as u64,
        "bytes_before_switch": session.bytes_between(
            SimTime::ZERO,
            SimTime::from_secs_f64(switch_at),
        ),
        "bytes_after_switch": session.bytes_between(
            SimTime::from_secs_f64(switch_at),
            SimTime::from_secs_f64(duration),
        ),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_ber(table: PathBuf, mcs: u8, snr: f64) -> Result<()> {
    let model = DmgErrorModel::from_file(&table)
        .with_context(|| format!("loading {}", table.display()))?;
    let ber = model.bit_error_rate(Mcs(mcs), snr)?;
    println!("MCS {mcs} @ {snr} dB: BER = {ber:e}");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();
    info!("wigig scenario runner starting");

    match cli.command {
        Commands::Sls {
            sectors,
            distance,
            duration,
            trace_dir,
        } => run_sls(sectors, distance, duration, trace_dir),
        Commands::Simulate {
            app,
            rate,
            payload,
            mcs,
            position,
            duration,
            sp_ms,
            config,
            trace_dir,
        } => run_simulate(
            app, rate, payload, mcs, position, duration, sp_ms, config, trace_dir,
        ),
        Commands::Fst {
            switch_at,
            duration,
            rate60,
            rate5,
        } => run_fst(switch_at, duration, rate60, rate5),
        Commands::Ber { table, mcs, snr } => run_ber(table, mcs, snr),
    }
}
