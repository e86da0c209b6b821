//! 拓扑构建
//!
//! 节点地址由序号派生（`02:00:00:00:hi:lo`、`10.0.hi.lo`），链路均为双向对称。

pub mod grid;
pub mod line;

use crate::config::{ConfigError, LinkSpec, NodeConfig, ScenarioSpec, TopologySpec};
use crate::net::{NetWorld, NodeId};
use crate::node::MeshNode;
use crate::sim::{SimTime, Simulator};

pub use grid::{GridOpts, build_grid};
pub use line::{LineOpts, build_line};

/// 链路参数
#[derive(Debug, Clone, Copy)]
pub struct LinkOpts {
    pub latency: SimTime,
    pub bandwidth_bps: u64,
    pub loss_pct: u8,
}

impl Default for LinkOpts {
    fn default() -> Self {
        Self {
            latency: SimTime::from_micros(2),
            bandwidth_bps: 2_000_000,
            loss_pct: 0,
        }
    }
}

/// 已构建的网状网
#[derive(Debug, Clone, Default)]
pub struct MeshTopology {
    pub nodes: Vec<NodeId>,
}

/// 添加一个节点；`route_log` 为真时启用 JSON 路由日志
pub fn add_mesh_node(
    world: &mut NetWorld,
    cfg: NodeConfig,
    route_log: bool,
) -> Result<NodeId, ConfigError> {
    world.net.add_node(|id| {
        let node = MeshNode::new(id, cfg)?;
        Ok(if route_log { node.with_route_log() } else { node })
    })
}

pub fn connect(world: &mut NetWorld, a: NodeId, b: NodeId, link: &LinkOpts) {
    world
        .net
        .connect_pair(a, b, link.latency, link.bandwidth_bps, link.loss_pct);
}

/// 启动所有节点
pub fn start_all(world: &mut NetWorld, sim: &mut Simulator) {
    let ids: Vec<NodeId> = world.net.node_ids().collect();
    for id in ids {
        if let Some(node) = world.net.node_mut(id) {
            node.start(sim);
        }
    }
}

/// 按场景描述构建
pub fn build_from_scenario(
    world: &mut NetWorld,
    spec: &ScenarioSpec,
    route_log: bool,
) -> Result<MeshTopology, ConfigError> {
    spec.validate()?;
    let link = LinkOpts {
        latency: SimTime::from_micros(spec.link.latency_us),
        bandwidth_bps: spec.link.bandwidth_kbps.saturating_mul(1_000),
        loss_pct: spec.link.loss_pct,
    };
    let node_cfg = |idx: usize| spec.node_config(idx);
    match &spec.topology {
        TopologySpec::Line { nodes } => build_line(
            world,
            &LineOpts {
                nodes: *nodes,
                link,
                route_log,
            },
            &node_cfg,
        ),
        TopologySpec::Grid { rows, cols } => build_grid(
            world,
            &GridOpts {
                rows: *rows,
                cols: *cols,
                link,
                route_log,
            },
            &node_cfg,
        ),
        TopologySpec::Explicit { nodes, links } => {
            let mut topo = MeshTopology::default();
            for idx in 0..*nodes {
                topo.nodes.push(add_mesh_node(world, node_cfg(idx), route_log)?);
            }
            for l in links {
                let opts = explicit_link(l, &link);
                connect(world, topo.nodes[l.a], topo.nodes[l.b], &opts);
            }
            Ok(topo)
        }
    }
}

fn explicit_link(l: &LinkSpec, defaults: &LinkOpts) -> LinkOpts {
    LinkOpts {
        latency: l.latency_us.map_or(defaults.latency, SimTime::from_micros),
        bandwidth_bps: l
            .bandwidth_kbps
            .map_or(defaults.bandwidth_bps, |k| k.saturating_mul(1_000)),
        loss_pct: l.loss_pct.unwrap_or(defaults.loss_pct),
    }
}
