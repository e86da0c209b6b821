//! 网格拓扑：每个节点与上下左右相邻节点相连（行优先编号）

use super::{LinkOpts, MeshTopology, add_mesh_node, connect};
use crate::config::{ConfigError, NodeConfig};
use crate::net::{NetWorld, NodeId};

#[derive(Debug, Clone)]
pub struct GridOpts {
    pub rows: usize,
    pub cols: usize,
    pub link: LinkOpts,
    pub route_log: bool,
}

impl Default for GridOpts {
    fn default() -> Self {
        Self {
            rows: 3,
            cols: 3,
            link: LinkOpts::default(),
            route_log: false,
        }
    }
}

impl MeshTopology {
    /// 网格中 (row, col) 处的节点
    pub fn at(&self, cols: usize, row: usize, col: usize) -> NodeId {
        self.nodes[row * cols + col]
    }
}

pub fn build_grid(
    world: &mut NetWorld,
    opts: &GridOpts,
    node_cfg: &dyn Fn(usize) -> NodeConfig,
) -> Result<MeshTopology, ConfigError> {
    if opts.rows == 0 || opts.cols == 0 {
        return Err(ConfigError::Invalid(format!(
            "grid topology {}x{} has no nodes",
            opts.rows, opts.cols
        )));
    }
    let mut topo = MeshTopology::default();
    for idx in 0..opts.rows * opts.cols {
        topo.nodes.push(add_mesh_node(world, node_cfg(idx), opts.route_log)?);
    }
    for row in 0..opts.rows {
        for col in 0..opts.cols {
            let here = topo.at(opts.cols, row, col);
            if col + 1 < opts.cols {
                connect(world, here, topo.at(opts.cols, row, col + 1), &opts.link);
            }
            if row + 1 < opts.rows {
                connect(world, here, topo.at(opts.cols, row + 1, col), &opts.link);
            }
        }
    }
    Ok(topo)
}
