use crate::config::{NodeConfig, ReplyMode};
use crate::metric::DeliveryRatioSource;
use crate::net::{Frame, NetWorld};
use crate::node::MeshNode;
use crate::sim::{SimTime, Simulator};
use crate::topo::{LineOpts, LinkOpts, MeshTopology, add_mesh_node, build_line, connect, start_all};

/// 2400 kbps 下 30 字节帧恰好 100 µs：校正后的时延截到 1 µs，度量等于 ETX
fn fast_link() -> LinkOpts {
    LinkOpts {
        latency: SimTime::from_micros(2),
        bandwidth_bps: 2_400_000,
        loss_pct: 0,
    }
}

fn mesh_cfg(idx: usize) -> NodeConfig {
    let mut cfg = NodeConfig::for_index(idx);
    cfg.metric.packet_size = 30;
    cfg.routes.period_ms = 5_000;
    cfg
}

fn run_line(nodes: usize, until: SimTime) -> (Simulator, NetWorld, MeshTopology) {
    let mut sim = Simulator::default();
    let mut world = NetWorld::default();
    let topo = build_line(
        &mut world,
        &LineOpts {
            nodes,
            link: fast_link(),
            route_log: true,
        },
        &mesh_cfg,
    )
    .expect("line");
    start_all(&mut world, &mut sim);
    sim.run_until(until, &mut world);
    (sim, world, topo)
}

fn node<'a>(world: &'a NetWorld, topo: &MeshTopology, idx: usize) -> &'a MeshNode {
    world.net.node(topo.nodes[idx]).expect("node")
}

#[test]
fn line_of_three_converges_to_two_hop_routes() {
    let until = SimTime::from_secs(40);
    let (sim, world, topo) = run_line(3, until);

    let ips: Vec<_> = (0..3).map(|i| node(&world, &topo, i).ip()).collect();
    let n0 = node(&world, &topo, 0);

    let to1 = n0.routes.lookup_route(ips[1], until).expect("route to n1");
    assert_eq!(to1.num_hops, 1);
    let to2 = n0.routes.lookup_route(ips[2], until).expect("route to n2");
    assert_eq!(to2.num_hops, 2);
    assert_eq!(to2.next_hop_ip, ips[1]);
    let m = to2.metric.val().expect("good metric");
    assert!((200..=600).contains(&m), "metric {m}");

    let n2 = node(&world, &topo, 2);
    let back = n2.routes.lookup_route(ips[0], until).expect("route to n0");
    assert_eq!(back.next_hop_ip, ips[1]);

    for idx in 0..3 {
        let n = node(&world, &topo, idx);
        n.routes.check_invariants(&sim);
        assert_eq!(n.routes.live_expiry_dests(&sim), n.routes.good_dests());
        assert_eq!(n.routes.seq_no() % 2, 0);
    }
    assert_eq!(world.net.stats.dropped_invalid, 0);
    assert_eq!(world.net.stats.dropped_no_link, 0);
}

#[test]
fn neighbors_measure_pair_gap_and_full_delivery() {
    let until = SimTime::from_secs(15);
    let (_sim, mut world, topo) = run_line(2, until);
    let peer = node(&world, &topo, 1).eth();
    let n0 = world.net.node_mut(topo.nodes[0]).expect("node");

    assert_eq!(n0.ett.reverse_delay(peer, until).delay_us, 100);
    assert!(n0.ett.neighbors().get(peer).is_some());
    let r_rev = n0.linkstat.reverse_rate(peer, until).expect("rate");
    assert!(r_rev >= 90, "r_rev {r_rev}");
    let r_fwd = n0.linkstat.forward_rate(peer, until).expect("rate");
    assert!(r_fwd >= 90, "r_fwd {r_fwd}");
    let metric = n0.link_metric(peer, until).val().expect("good");
    assert!((100..=124).contains(&metric), "metric {metric}");
}

#[test]
fn piggyback_mode_learns_reverse_delay() {
    let mut sim = Simulator::default();
    let mut world = NetWorld::default();
    let cfg = |idx: usize| {
        let mut c = mesh_cfg(idx);
        c.ett.reply = ReplyMode::Piggyback;
        c
    };
    let a = add_mesh_node(&mut world, cfg(0), false).expect("a");
    let b = add_mesh_node(&mut world, cfg(1), false).expect("b");
    connect(&mut world, a, b, &fast_link());
    start_all(&mut world, &mut sim);
    let until = SimTime::from_secs(10);
    sim.run_until(until, &mut world);

    let eth_b = world.net.node(b).expect("b").eth();
    let na = world.net.node_mut(a).expect("a");
    assert_eq!(na.ett.reverse_delay(eth_b, until).delay_us, 100);
    assert_eq!(world.net.stats.dropped_invalid, 0);
}

#[test]
fn same_seed_gives_same_tables() {
    let until = SimTime::from_secs(25);
    let (_, w1, t1) = run_line(3, until);
    let (_, w2, t2) = run_line(3, until);
    for idx in 0..3 {
        assert_eq!(
            node(&w1, &t1, idx).routes.get_all_entries(until),
            node(&w2, &t2, idx).routes.get_all_entries(until)
        );
    }
    assert_eq!(w1.net.stats.sent_frames, w2.net.stats.sent_frames);
}

#[test]
fn route_log_records_additions() {
    let until = SimTime::from_secs(20);
    let (_, mut world, topo) = run_line(2, until);
    let n0 = world.net.node_mut(topo.nodes[0]).expect("node");
    let log = n0.routes.drain_log();
    assert!(!log.is_empty());
    assert!(log.windows(2).all(|w| w[0].t_ns <= w[1].t_ns));
    let json = serde_json::to_value(&log).expect("json");
    let kinds: Vec<&str> = json
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|r| r["kind"].as_str())
        .collect();
    assert!(kinds.contains(&"added_route"));
    assert!(kinds.contains(&"metric_update"));
}

#[test]
fn unknown_frames_are_counted_invalid() {
    let mut sim = Simulator::default();
    let mut world = NetWorld::default();
    let a = add_mesh_node(&mut world, mesh_cfg(0), false).expect("a");
    let b = add_mesh_node(&mut world, mesh_cfg(1), false).expect("b");
    connect(&mut world, a, b, &fast_link());
    let (eth_a, eth_b) = (
        world.net.node(a).expect("a").eth(),
        world.net.node(b).expect("b").eth(),
    );

    let junk = Frame {
        id: 1,
        dst: eth_b,
        src: eth_a,
        ethertype: 0x0800,
        payload: vec![0; 20],
    };
    world.net.deliver(b, junk, &mut sim);
    let bad_advert = Frame {
        id: 2,
        dst: eth_b,
        src: eth_a,
        ethertype: crate::wire::ETHERTYPE_ROUTE_ADVERT,
        payload: vec![0, 3, 1],
    };
    world.net.deliver(b, bad_advert, &mut sim);
    assert_eq!(world.net.stats.dropped_invalid, 2);
}

#[test]
fn shutdown_disarms_every_timer() {
    let until = SimTime::from_secs(12);
    let (mut sim, mut world, topo) = run_line(2, until);
    for id in &topo.nodes {
        let n = world.net.node_mut(*id).expect("node");
        assert!(n.linkstat.is_armed(&sim));
        n.shutdown(&mut sim);
        assert!(!n.linkstat.is_armed(&sim));
        assert!(!n.ett.scheduler().round_armed(&sim));
        assert!(!n.ett.scheduler().probe_armed(&sim));
        assert!(n.routes.is_empty());
        assert!(n.routes.live_expiry_dests(&sim).is_empty());
    }
}

#[test]
fn invalid_node_config_is_rejected() {
    let mut world = NetWorld::default();
    let mut cfg = mesh_cfg(0);
    cfg.ett.second_size = 8;
    assert!(add_mesh_node(&mut world, cfg, false).is_err());
    assert_eq!(world.net.node_count(), 0);
}
