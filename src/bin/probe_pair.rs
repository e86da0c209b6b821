//! 两节点包对探测
//!
//! a <-> b 一条链路，运行一段时间后打印双方测得的时延以及 a 到 b 的度量。

use clap::Parser;
use ettsim_rs::config::{NodeConfig, ReplyMode};
use ettsim_rs::metric::DeliveryRatioSource;
use ettsim_rs::net::NetWorld;
use ettsim_rs::sim::{SimTime, Simulator};
use ettsim_rs::topo::{LinkOpts, add_mesh_node, connect, start_all};

#[derive(Debug, Parser)]
#[command(name = "probe-pair", about = "单条链路上的包对探测")]
struct Args {
    #[arg(long, default_value_t = 2_000)]
    bandwidth_kbps: u64,
    /// 单向传播时延（微秒）
    #[arg(long, default_value_t = 2)]
    latency_us: u64,
    #[arg(long, default_value_t = 0)]
    loss_pct: u8,
    #[arg(long, default_value_t = 30)]
    first_size: u32,
    #[arg(long, default_value_t = 30)]
    second_size: u32,
    /// 搭载回报（默认直接回复）
    #[arg(long)]
    piggyback: bool,
    #[arg(long, default_value_t = 12_000)]
    until_ms: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let args = Args::parse();

    let mut sim = Simulator::default();
    let mut world = NetWorld::default();

    let node_cfg = |idx: usize| {
        let mut cfg = NodeConfig::for_index(idx);
        cfg.ett.first_size = args.first_size;
        cfg.ett.second_size = args.second_size;
        if args.piggyback {
            cfg.ett.reply = ReplyMode::Piggyback;
        }
        cfg
    };
    let a = match add_mesh_node(&mut world, node_cfg(0), false) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    let b = match add_mesh_node(&mut world, node_cfg(1), false) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };
    connect(
        &mut world,
        a,
        b,
        &LinkOpts {
            latency: SimTime::from_micros(args.latency_us),
            bandwidth_bps: args.bandwidth_kbps.saturating_mul(1_000),
            loss_pct: args.loss_pct,
        },
    );

    start_all(&mut world, &mut sim);
    let until = SimTime::from_millis(args.until_ms);
    sim.run_until(until, &mut world);

    let (Some(eth_a), Some(eth_b)) = (
        world.net.node(a).map(|n| n.eth()),
        world.net.node(b).map(|n| n.eth()),
    ) else {
        return;
    };
    for (id, peer) in [(a, eth_b), (b, eth_a)] {
        let Some(node) = world.net.node_mut(id) else {
            continue;
        };
        let fwd = node.ett.forward_delay(peer, until);
        let rev = node.ett.reverse_delay(peer, until);
        let r_fwd = node.linkstat.forward_rate(peer, until);
        let r_rev = node.linkstat.reverse_rate(peer, until);
        let metric = node.link_metric(peer, until);
        println!(
            "{} -> {}: forward_delay_us={} reverse_delay_us={} r_fwd={:?} r_rev={:?} metric={:?}",
            node.eth(),
            peer,
            fwd.delay_us,
            rev.delay_us,
            r_fwd,
            r_rev,
            metric
        );
    }
    println!(
        "done @ {:?}, sent_frames={}, delivered_frames={}, dropped_loss={}",
        sim.now(),
        world.net.stats.sent_frames,
        world.net.stats.delivered_frames,
        world.net.stats.dropped_loss
    );
}
