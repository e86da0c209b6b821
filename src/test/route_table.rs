use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;

use super::{RecordingNet, advance, eth};
use crate::config::RouteTableConfig;
use crate::metric::{LinkMetric, Metric};
use crate::net::{EtherAddress, NodeId};
use crate::route::{JsonRouteLogger, Reason, RouteLogEvent, RouteTable, RtEntry};
use crate::sim::{SimTime, Simulator, SplitMix64};
use crate::wire::{AdvertEntry, RouteAdvert};

/// 每个邻居一个固定度量，未登记的邻居为 100
#[derive(Default)]
struct FixedMetric(HashMap<EtherAddress, Metric>);

impl LinkMetric for FixedMetric {
    fn link_metric(&mut self, peer: EtherAddress, _now: SimTime) -> Metric {
        self.0.get(&peer).copied().unwrap_or(Metric::Good(100))
    }
}

fn ip(idx: usize) -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, idx as u8 + 1)
}

fn table_with(cfg: RouteTableConfig) -> RouteTable {
    RouteTable::new(NodeId(0), ip(0), eth(0), cfg, Box::new(SplitMix64::new(11))).expect("cfg")
}

fn table() -> RouteTable {
    table_with(RouteTableConfig::default())
}

fn own(idx: usize, seq_no: u32) -> AdvertEntry {
    AdvertEntry {
        dest_ip: ip(idx),
        dest_eth: eth(idx),
        seq_no,
        num_hops: 0,
        metric: 0,
        ttl_ms: 60_000,
    }
}

fn far(idx: usize, seq_no: u32, num_hops: u8, metric: u8) -> AdvertEntry {
    AdvertEntry {
        dest_ip: ip(idx),
        dest_eth: eth(idx),
        seq_no,
        num_hops,
        metric,
        ttl_ms: 60_000,
    }
}

fn hear(
    t: &mut RouteTable,
    from: usize,
    entries: Vec<AdvertEntry>,
    metric: &mut FixedMetric,
    sim: &mut Simulator,
) -> bool {
    let adv = RouteAdvert { entries };
    t.handle_advert(eth(from), &adv, Some(metric as &mut dyn LinkMetric), sim)
}

fn assert_timers_match_good_routes(t: &RouteTable, sim: &Simulator) {
    t.check_invariants(sim);
    assert_eq!(t.live_expiry_dests(sim), t.good_dests());
}

#[test]
fn neighbor_advert_installs_one_hop_route() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    assert!(hear(&mut t, 1, vec![own(1, 2)], &mut m, &mut sim));

    let r = t.current(ip(1)).expect("route");
    assert_eq!(r.num_hops, 1);
    assert_eq!(r.seq_no, 2);
    assert_eq!(r.next_hop_ip, ip(1));
    assert_eq!(r.next_hop_eth, eth(1));
    assert_eq!(r.metric, Metric::Good(100));
    assert_eq!(r.advertise_ok_at, SimTime::from_secs(3));
    assert_eq!(t.good_dests(), BTreeSet::from([ip(1)]));
    assert_timers_match_good_routes(&t, &sim);
}

#[test]
fn advert_without_sender_entry_is_ignored() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    assert!(!hear(&mut t, 1, vec![far(2, 4, 1, 10)], &mut m, &mut sim));
    // 发送者条目的序号必须为偶数
    assert!(!hear(&mut t, 1, vec![own(1, 3)], &mut m, &mut sim));
    assert!(t.is_empty());
}

#[test]
fn own_advert_is_ignored() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    assert!(!hear(&mut t, 0, vec![own(0, 2)], &mut m, &mut sim));
    assert!(t.is_empty());
}

#[test]
fn two_hop_route_adds_link_metric() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(2, 4, 1, 10)], &mut m, &mut sim);

    let r = t.current(ip(2)).expect("route");
    assert_eq!(r.num_hops, 2);
    assert_eq!(r.next_hop_ip, ip(1));
    assert_eq!(r.next_hop_eth, eth(1));
    assert_eq!(r.metric, Metric::Good(200));
    assert_eq!(t.lookup_route(ip(2), sim.now()), Some(r.clone()));
    assert_timers_match_good_routes(&t, &sim);
}

#[test]
fn entries_about_us_are_skipped() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(0, 8, 1, 10)], &mut m, &mut sim);
    assert!(t.current(ip(0)).is_none());
    assert_eq!(t.len(), 1);
}

#[test]
fn malformed_entries_are_skipped() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    // 跳数为 0 但序号为偶数 / 跳数非 0 但序号为奇数
    hear(
        &mut t,
        1,
        vec![own(1, 2), far(2, 4, 0, 10), far(3, 5, 2, 10)],
        &mut m,
        &mut sim,
    );
    assert_eq!(t.len(), 1);
}

#[test]
fn without_metric_source_routes_are_not_good() {
    let mut sim = Simulator::default();
    let mut t = table();
    let adv = RouteAdvert {
        entries: vec![own(1, 2), far(2, 4, 1, 10)],
    };
    assert!(t.handle_advert(eth(1), &adv, None, &mut sim));
    assert_eq!(t.current(ip(1)).expect("row").metric, Metric::Bad);
    assert_eq!(t.current(ip(2)).expect("row").metric, Metric::Bad);
    assert_eq!(t.lookup_route(ip(1), sim.now()), None);
    assert!(t.good_dests().is_empty());
    assert_timers_match_good_routes(&t, &sim);
}

#[test]
fn init_metric_logs_the_update() {
    let mut t = table();
    t.set_logger(Box::new(JsonRouteLogger::new(ip(0))));
    let now = SimTime::from_secs(1);
    let mut r = RtEntry::one_hop(ip(1), eth(1), 2, SimTime::from_secs(60), now);
    let mut m = FixedMetric::default();
    m.0.insert(eth(1), Metric::Good(250));
    t.init_metric(&mut r, Some(&mut m as &mut dyn LinkMetric), now);
    assert_eq!(r.metric, Metric::Good(250));
    t.init_metric(&mut r, None, now);
    assert_eq!(r.metric, Metric::Bad);

    let log = t.drain_log();
    assert_eq!(log.len(), 2);
    assert!(matches!(
        log[0].event,
        RouteLogEvent::MetricUpdate {
            metric: Some(250),
            ..
        }
    ));
    assert!(t.drain_log().is_empty());
}

#[test]
fn newer_sequence_wins_even_with_worse_metric() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 10)], &mut m, &mut sim);
    hear(&mut t, 2, vec![own(2, 2), far(3, 6, 3, 90)], &mut m, &mut sim);

    let r = t.current(ip(3)).expect("route");
    assert_eq!(r.seq_no, 6);
    assert_eq!(r.next_hop_ip, ip(2));
    assert_eq!(r.metric, Metric::Good(1_000));
    assert_eq!(t.old_route(ip(3)).expect("old").seq_no, 4);
    assert_timers_match_good_routes(&t, &sim);
}

#[test]
fn stale_sequence_is_rejected() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(3, 6, 1, 10)], &mut m, &mut sim);
    hear(&mut t, 2, vec![own(2, 2), far(3, 4, 1, 0)], &mut m, &mut sim);
    assert_eq!(t.current(ip(3)).expect("route").next_hop_ip, ip(1));
}

#[test]
fn same_sequence_needs_better_metric() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 20)], &mut m, &mut sim);
    let settled_at = t.current(ip(3)).expect("route").advertise_ok_at;

    advance(&mut sim, SimTime::from_secs(1));
    hear(&mut t, 2, vec![own(2, 2), far(3, 4, 1, 30)], &mut m, &mut sim);
    assert_eq!(t.current(ip(3)).expect("route").next_hop_ip, ip(1));

    hear(&mut t, 2, vec![own(2, 2), far(3, 4, 1, 5)], &mut m, &mut sim);
    let r = t.current(ip(3)).expect("route");
    assert_eq!(r.next_hop_ip, ip(2));
    assert_eq!(r.metric, Metric::Good(150));
    // 同序号的替换不推迟通告时间
    assert_eq!(r.advertise_ok_at, settled_at);
    assert!(t.old_route(ip(3)).is_none());
    assert_timers_match_good_routes(&t, &sim);
}

#[test]
fn same_next_hop_refresh_is_accepted() {
    let mut sim = Simulator::default();
    let mut t = table();
    t.set_logger(Box::new(JsonRouteLogger::new(ip(0))));
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 10)], &mut m, &mut sim);
    advance(&mut sim, SimTime::from_secs(2));
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 40)], &mut m, &mut sim);
    assert_eq!(t.current(ip(3)).expect("route").metric, Metric::Good(500));

    let reasons: Vec<Reason> = t
        .drain_log()
        .into_iter()
        .filter_map(|rec| match rec.event {
            RouteLogEvent::AddedRoute { reason, .. } => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(
        reasons,
        vec![
            Reason::NewDest,
            Reason::NewDest,
            Reason::SameNextHop,
            Reason::SameNextHop
        ]
    );
}

#[test]
fn old_route_is_served_until_settled() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    advance(&mut sim, SimTime::from_secs(1));
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 10)], &mut m, &mut sim);
    advance(&mut sim, SimTime::from_secs(10));
    hear(&mut t, 2, vec![own(2, 2), far(3, 6, 2, 30)], &mut m, &mut sim);

    let now = sim.now();
    assert!(t.use_old_route(ip(3), now));
    let served = t.lookup_route(ip(3), now).expect("route");
    assert_eq!(served.next_hop_ip, ip(1));
    assert_eq!(served.seq_no, 4);
    let snapshot = t.get_all_entries(now);
    let r3 = snapshot.iter().find(|r| r.dest_ip == ip(3)).expect("row");
    assert_eq!(r3.seq_no, 4);

    // 稳定期（3 s）过后改用新路由
    let later = SimTime::from_millis(13_001);
    assert!(!t.use_old_route(ip(3), later));
    assert_eq!(t.lookup_route(ip(3), later).expect("route").next_hop_ip, ip(2));
}

#[test]
fn old_route_overlay_can_be_disabled() {
    let mut sim = Simulator::default();
    let mut t = table_with(RouteTableConfig {
        use_old_route: false,
        ..RouteTableConfig::default()
    });
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 10)], &mut m, &mut sim);
    hear(&mut t, 2, vec![own(2, 2), far(3, 6, 2, 30)], &mut m, &mut sim);
    assert!(t.old_route(ip(3)).is_none());
    assert_eq!(
        t.lookup_route(ip(3), sim.now()).expect("route").next_hop_ip,
        ip(2)
    );
}

#[test]
fn newer_broken_advert_breaks_our_route() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 10)], &mut m, &mut sim);
    assert!(hear(&mut t, 1, vec![own(1, 2), far(3, 5, 0, 0xff)], &mut m, &mut sim));

    let r = t.current(ip(3)).expect("row");
    assert!(r.broken());
    assert_eq!(r.seq_no, 5);
    assert_eq!(r.metric, Metric::Bad);
    assert_eq!(t.lookup_route(ip(3), sim.now()), None);
    assert_timers_match_good_routes(&t, &sim);

    // 不更新的断开通告不起作用
    hear(&mut t, 1, vec![own(1, 2), far(3, 6, 1, 10)], &mut m, &mut sim);
    hear(&mut t, 2, vec![own(2, 2), far(3, 5, 0, 0xff)], &mut m, &mut sim);
    assert!(t.current(ip(3)).expect("row").good());
}

#[test]
fn broken_advert_for_unknown_dest_is_ignored() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(3, 5, 0, 0xff)], &mut m, &mut sim);
    assert!(t.current(ip(3)).is_none());
}

#[test]
fn expiry_breaks_neighbor_and_routes_through_it() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    let mut short = own(1, 2);
    short.ttl_ms = 5_000;
    hear(&mut t, 1, vec![short, far(3, 4, 1, 10)], &mut m, &mut sim);
    hear(&mut t, 2, vec![own(2, 2)], &mut m, &mut sim);

    // 到期事件在空世界里触发，只让定时器失效
    advance(&mut sim, SimTime::from_secs(5));
    assert!(!t.live_expiry_dests(&sim).contains(&ip(1)));
    t.expire_hook(ip(1), &mut sim);

    let n1 = t.current(ip(1)).expect("row");
    assert!(n1.broken());
    assert_eq!(n1.seq_no, 3);
    let r3 = t.current(ip(3)).expect("row");
    assert!(r3.broken());
    assert_eq!(r3.seq_no, 5);
    assert!(t.current(ip(2)).expect("row").good());
    assert_eq!(t.good_dests(), BTreeSet::from([ip(2)]));
    assert_timers_match_good_routes(&t, &sim);
}

#[test]
fn expiry_with_live_timer_is_ignored() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2)], &mut m, &mut sim);
    t.expire_hook(ip(1), &mut sim);
    t.expire_hook(ip(9), &mut sim);
    assert!(t.current(ip(1)).expect("row").good());
    assert_timers_match_good_routes(&t, &sim);
}

#[test]
fn timer_waits_for_the_shorter_of_ttl_and_timeout() {
    let mut sim = Simulator::default();
    let mut t = table_with(RouteTableConfig {
        timeout_ms: 4_000,
        ..RouteTableConfig::default()
    });
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2)], &mut m, &mut sim);
    advance(&mut sim, SimTime::from_millis(3_999));
    assert!(t.live_expiry_dests(&sim).contains(&ip(1)));
    advance(&mut sim, SimTime::from_secs(4));
    assert!(t.live_expiry_dests(&sim).is_empty());
}

#[test]
fn ignoring_invalid_routes_drops_them() {
    let mut sim = Simulator::default();
    let mut t = table_with(RouteTableConfig {
        ignore_invalid_routes: true,
        ..RouteTableConfig::default()
    });
    let adv = RouteAdvert {
        entries: vec![own(1, 2)],
    };
    assert!(!t.handle_advert(eth(1), &adv, None, &mut sim));
    assert!(t.is_empty());

    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 10)], &mut m, &mut sim);
    hear(&mut t, 1, vec![own(1, 2), far(3, 5, 0, 0xff)], &mut m, &mut sim);
    assert!(t.current(ip(3)).is_none());
    assert_timers_match_good_routes(&t, &sim);
}

#[test]
#[should_panic(expected = "route table invariant violated")]
fn ignoring_invalid_routes_rejects_direct_insert() {
    let mut sim = Simulator::default();
    let mut t = table_with(RouteTableConfig {
        ignore_invalid_routes: true,
        ..RouteTableConfig::default()
    });
    let r = RtEntry::one_hop(ip(1), eth(1), 2, SimTime::from_secs(60), SimTime::ZERO);
    t.insert_route(r, Reason::NewDest, &mut sim);
}

#[test]
#[should_panic(expected = "route table invariant violated")]
fn inconsistent_row_is_rejected() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut r = RtEntry::one_hop(ip(1), eth(1), 2, SimTime::from_secs(60), SimTime::ZERO);
    r.seq_no = 3;
    t.insert_route(r, Reason::NewDest, &mut sim);
}

#[test]
fn advert_lists_self_first_then_table() {
    let mut sim = Simulator::default();
    let mut net = RecordingNet::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 10)], &mut m, &mut sim);
    advance(&mut sim, SimTime::from_secs(2));

    t.on_advert_timer(&mut sim, &mut net);
    assert_eq!(t.seq_no(), 2);
    assert_eq!(net.broadcast.len(), 1);
    let adv = RouteAdvert::decode(&net.broadcast[0].payload).expect("advert");
    assert_eq!(adv.entries.len(), 3);
    assert_eq!(adv.entries[0].dest_ip, ip(0));
    assert_eq!(adv.entries[0].num_hops, 0);
    assert_eq!(adv.entries[0].seq_no, 2);
    assert_eq!(adv.entries[0].ttl_ms, 60_000);

    let e1 = adv.entries.iter().find(|e| e.dest_ip == ip(1)).expect("n1");
    assert_eq!((e1.num_hops, e1.seq_no, e1.metric), (1, 2, 10));
    assert_eq!(e1.ttl_ms, 58_000);
    let e3 = adv.entries.iter().find(|e| e.dest_ip == ip(3)).expect("n3");
    assert_eq!((e3.num_hops, e3.seq_no, e3.metric), (2, 4, 20));

    t.on_advert_timer(&mut sim, &mut net);
    assert_eq!(t.seq_no(), 4);
}

#[test]
fn trigger_sends_without_bumping_sequence() {
    let mut sim = Simulator::default();
    let mut net = RecordingNet::default();
    let mut t = table();
    t.on_trigger_timer(&mut sim, &mut net);
    assert_eq!(t.seq_no(), 0);
    let adv = RouteAdvert::decode(&net.broadcast[0].payload).expect("advert");
    assert_eq!(adv.entries.len(), 1);
}

#[test]
fn switching_next_hop_requests_triggered_advert() {
    let mut sim = Simulator::default();
    let mut net = RecordingNet::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 50)], &mut m, &mut sim);
    hear(&mut t, 2, vec![own(2, 2)], &mut m, &mut sim);
    // 周期通告清掉已排队的触发
    t.on_advert_timer(&mut sim, &mut net);
    let before = sim.pending();

    hear(&mut t, 2, vec![own(2, 2), far(3, 4, 1, 10)], &mut m, &mut sim);
    let r = t.current(ip(3)).expect("route");
    assert_eq!(r.next_hop_ip, ip(2));
    assert_eq!(r.metric, Metric::Good(200));
    assert_eq!(sim.pending(), before + 1);
    assert_timers_match_good_routes(&t, &sim);
}

#[test]
fn unchanged_refresh_does_not_request_triggered_advert() {
    let mut sim = Simulator::default();
    let mut net = RecordingNet::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 50)], &mut m, &mut sim);
    t.on_advert_timer(&mut sim, &mut net);
    let before = sim.pending();

    advance(&mut sim, SimTime::from_secs(2));
    assert!(hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 50)], &mut m, &mut sim));
    assert_eq!(sim.pending(), before);

    // 新序号但路径不变也只是刷新
    hear(&mut t, 1, vec![own(1, 4), far(3, 6, 1, 50)], &mut m, &mut sim);
    assert_eq!(t.current(ip(3)).expect("route").seq_no, 6);
    assert_eq!(sim.pending(), before);
}

#[test]
fn log_dump_records_snapshot() {
    let mut sim = Simulator::default();
    let mut t = table_with(RouteTableConfig {
        log_dump_ms: Some(5_000),
        ..RouteTableConfig::default()
    });
    t.set_logger(Box::new(JsonRouteLogger::new(ip(0))));
    let mut m = FixedMetric::default();
    hear(&mut t, 1, vec![own(1, 2)], &mut m, &mut sim);
    t.drain_log();

    t.on_log_dump(&mut sim);
    let log = t.drain_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].node, ip(0));
    match &log[0].event {
        RouteLogEvent::RouteDump { routes } => {
            assert_eq!(routes.len(), 1);
            assert_eq!(routes[0].dest_ip, ip(1));
            assert_eq!(routes[0].metric, Some(100));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn stop_clears_routes_and_timers() {
    let mut sim = Simulator::default();
    let mut t = table();
    let mut m = FixedMetric::default();
    t.start(&mut sim);
    hear(&mut t, 1, vec![own(1, 2), far(3, 4, 1, 10)], &mut m, &mut sim);
    t.stop(&mut sim);
    assert!(t.is_empty());
    assert!(t.live_expiry_dests(&sim).is_empty());
    assert_eq!(sim.pending(), 0);
}
