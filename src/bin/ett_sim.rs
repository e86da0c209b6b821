//! 无线网状网 ETT/DSDV 仿真
//!
//! 按场景文件（或内置的链状/网格拓扑）构建网络，运行一段时间后打印每个节点的路由表。

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use ettsim_rs::config::{
    ConfigError, EttConfig, EttMetricConfig, LinkDefaults, LinkStatConfig, ProbeSchedule,
    ReplyMode, RouteTableConfig, ScenarioSpec, TopologySpec,
};
use ettsim_rs::net::NetWorld;
use ettsim_rs::route::RouteLogRecord;
use ettsim_rs::sim::{SimTime, Simulator};
use ettsim_rs::topo::{build_from_scenario, start_all};
use tracing::info;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Topology {
    Line,
    Grid,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    Direct,
    Piggyback,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Schedule {
    Staggered,
    Batch,
}

#[derive(Debug, Parser)]
#[command(name = "ett-sim", about = "ETT link estimation + DSDV routing on a simulated mesh")]
struct Args {
    /// Path to a scenario JSON file; overrides the built-in topology flags
    #[arg(long)]
    scenario: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Topology::Line)]
    topology: Topology,

    /// Number of nodes in the built-in topology
    #[arg(long, default_value_t = 3)]
    nodes: usize,

    /// Grid width (grid topology only)
    #[arg(long, default_value_t = 3)]
    cols: usize,

    /// Link bandwidth for the built-in topology (kbps)
    #[arg(long, default_value_t = 2_000)]
    bandwidth_kbps: u64,

    /// Per-link loss for the built-in topology (percent)
    #[arg(long, default_value_t = 0)]
    loss_pct: u8,

    /// Packet size used to turn measured bandwidth into transmission time
    #[arg(long)]
    metric_packet_size: Option<u32>,

    /// Run until this time (ms)
    #[arg(long)]
    until_ms: Option<u64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Write route log records to this file as a JSON array
    #[arg(long)]
    routes_json: Option<PathBuf>,

    #[arg(long, value_enum)]
    variant: Option<Variant>,

    #[arg(long, value_enum)]
    schedule: Option<Schedule>,
}

const DEFAULT_UNTIL_MS: u64 = 40_000;

fn builtin_scenario(args: &Args) -> Result<ScenarioSpec, ConfigError> {
    let topology = match args.topology {
        Topology::Line => TopologySpec::Line { nodes: args.nodes },
        Topology::Grid => {
            if args.cols == 0 || args.nodes % args.cols != 0 {
                return Err(ConfigError::Invalid(format!(
                    "--nodes {} is not a multiple of --cols {}",
                    args.nodes, args.cols
                )));
            }
            TopologySpec::Grid {
                rows: args.nodes / args.cols,
                cols: args.cols,
            }
        }
    };
    Ok(ScenarioSpec {
        schema_version: 1,
        topology,
        link: LinkDefaults {
            bandwidth_kbps: args.bandwidth_kbps,
            loss_pct: args.loss_pct,
            ..LinkDefaults::default()
        },
        ett: EttConfig::default(),
        linkstat: LinkStatConfig::default(),
        metric: EttMetricConfig::default(),
        routes: RouteTableConfig::default(),
        seed: 1,
        until_ms: None,
    })
}

fn run(args: Args) -> Result<(), ConfigError> {
    let mut spec = match &args.scenario {
        Some(path) => ScenarioSpec::from_path(path)?,
        None => builtin_scenario(&args)?,
    };
    if let Some(seed) = args.seed {
        spec.seed = seed;
    }
    if let Some(v) = args.variant {
        spec.ett.reply = match v {
            Variant::Direct => ReplyMode::Direct,
            Variant::Piggyback => ReplyMode::Piggyback,
        };
    }
    if let Some(s) = args.schedule {
        spec.ett.schedule = match s {
            Schedule::Staggered => ProbeSchedule::Staggered,
            Schedule::Batch => ProbeSchedule::Batch,
        };
    }
    if let Some(size) = args.metric_packet_size {
        spec.metric.packet_size = size;
    }
    let until_ms = args.until_ms.or(spec.until_ms).unwrap_or(DEFAULT_UNTIL_MS);

    let mut sim = Simulator::default();
    let mut world = NetWorld::default();
    let topo = build_from_scenario(&mut world, &spec, args.routes_json.is_some())?;
    info!(nodes = topo.nodes.len(), until_ms, "网络已构建");

    start_all(&mut world, &mut sim);
    let until = SimTime::from_millis(until_ms);
    sim.run_until(until, &mut world);

    for id in &topo.nodes {
        let Some(node) = world.net.node(*id) else {
            continue;
        };
        let routes = node.routes.get_all_entries(until);
        let good = routes.iter().filter(|r| r.good()).count();
        println!(
            "node {} ip={} eth={} seq={} routes={} good={} neighbors={} heard={}",
            node.name(),
            node.ip(),
            node.eth(),
            node.routes.seq_no(),
            routes.len(),
            good,
            node.ett.neighbors().len(),
            node.linkstat.neighbors(until).len(),
        );
        for r in routes {
            let metric = r
                .metric
                .val()
                .map_or_else(|| "bad".to_string(), |v| v.to_string());
            println!(
                "route {} {} via {} hops={} seq={} metric={}",
                node.name(),
                r.dest_ip,
                r.next_hop_ip,
                r.num_hops,
                r.seq_no,
                metric
            );
        }
    }

    let stats = &world.net.stats;
    println!(
        "done @ {:?}, sent_frames={}, delivered_frames={}, dropped_loss={}, dropped_no_link={}, dropped_invalid={}",
        sim.now(),
        stats.sent_frames,
        stats.delivered_frames,
        stats.dropped_loss,
        stats.dropped_no_link,
        stats.dropped_invalid
    );

    if let Some(path) = args.routes_json {
        let mut records: Vec<RouteLogRecord> = Vec::new();
        for id in &topo.nodes {
            if let Some(node) = world.net.node_mut(*id) {
                records.extend(node.routes.drain_log());
            }
        }
        records.sort_by_key(|r| r.t_ns);
        let json = serde_json::to_string_pretty(&records)?;
        fs::write(&path, json)?;
        eprintln!("wrote {} route log records to {}", records.len(), path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
