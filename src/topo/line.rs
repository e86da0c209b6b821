//! 链状拓扑：n0 <-> n1 <-> ... <-> n(k-1)

use super::{LinkOpts, MeshTopology, add_mesh_node, connect};
use crate::config::{ConfigError, NodeConfig};
use crate::net::NetWorld;

#[derive(Debug, Clone)]
pub struct LineOpts {
    pub nodes: usize,
    pub link: LinkOpts,
    pub route_log: bool,
}

impl Default for LineOpts {
    fn default() -> Self {
        Self {
            nodes: 4,
            link: LinkOpts::default(),
            route_log: false,
        }
    }
}

pub fn build_line(
    world: &mut NetWorld,
    opts: &LineOpts,
    node_cfg: &dyn Fn(usize) -> NodeConfig,
) -> Result<MeshTopology, ConfigError> {
    if opts.nodes == 0 {
        return Err(ConfigError::Invalid("line topology needs at least one node".into()));
    }
    let mut topo = MeshTopology::default();
    for idx in 0..opts.nodes {
        topo.nodes.push(add_mesh_node(world, node_cfg(idx), opts.route_log)?);
    }
    for pair in topo.nodes.windows(2) {
        connect(world, pair[0], pair[1], &opts.link);
    }
    Ok(topo)
}
