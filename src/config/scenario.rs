use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{
    ConfigError, EttConfig, EttMetricConfig, LinkStatConfig, NodeConfig, RouteTableConfig,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub schema_version: u32,
    pub topology: TopologySpec,
    #[serde(default)]
    pub link: LinkDefaults,
    #[serde(default)]
    pub ett: EttConfig,
    #[serde(default)]
    pub linkstat: LinkStatConfig,
    #[serde(default)]
    pub metric: EttMetricConfig,
    #[serde(default)]
    pub routes: RouteTableConfig,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub until_ms: Option<u64>,
}

fn default_seed() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    Line {
        nodes: usize,
    },
    Grid {
        rows: usize,
        cols: usize,
    },
    Explicit {
        nodes: usize,
        #[serde(default)]
        links: Vec<LinkSpec>,
    },
}

impl TopologySpec {
    pub fn node_count(&self) -> usize {
        match self {
            TopologySpec::Line { nodes } => *nodes,
            TopologySpec::Grid { rows, cols } => rows.saturating_mul(*cols),
            TopologySpec::Explicit { nodes, .. } => *nodes,
        }
    }
}

/// 显式拓扑中的一条双向链路，未给出的字段取 [`LinkDefaults`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSpec {
    pub a: usize,
    pub b: usize,
    #[serde(default)]
    pub latency_us: Option<u64>,
    #[serde(default)]
    pub bandwidth_kbps: Option<u64>,
    #[serde(default)]
    pub loss_pct: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkDefaults {
    pub latency_us: u64,
    pub bandwidth_kbps: u64,
    pub loss_pct: u8,
}

impl Default for LinkDefaults {
    fn default() -> Self {
        Self {
            latency_us: 2,
            bandwidth_kbps: 2_000,
            loss_pct: 0,
        }
    }
}

impl ScenarioSpec {
    pub fn from_json_str(raw: &str) -> Result<ScenarioSpec, ConfigError> {
        let spec: ScenarioSpec = serde_json::from_str(raw)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn from_path(path: &Path) -> Result<ScenarioSpec, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.topology.node_count();
        if n == 0 {
            return Err(ConfigError::Invalid("topology has no nodes".into()));
        }
        if n > u16::MAX as usize - 1 {
            return Err(ConfigError::Invalid(format!("too many nodes: {n}")));
        }
        if let TopologySpec::Explicit { links, .. } = &self.topology {
            for l in links {
                if l.a >= n || l.b >= n || l.a == l.b {
                    return Err(ConfigError::Invalid(format!(
                        "link {}-{} is out of range for {n} nodes",
                        l.a, l.b
                    )));
                }
            }
        }
        if self.link.bandwidth_kbps == 0 {
            return Err(ConfigError::Invalid("link.bandwidth_kbps must be positive".into()));
        }
        // 地址由拓扑派生，这里用一个占位地址检查其余 ETT 参数
        let mut ett = self.ett.clone();
        ett.eth.get_or_insert(crate::net::EtherAddress::for_index(0));
        ett.validate()?;
        self.linkstat.validate()?;
        self.routes.validate()?;
        Ok(())
    }

    /// 序号为 `idx` 的节点配置
    pub fn node_config(&self, idx: usize) -> NodeConfig {
        let base = NodeConfig::for_index(idx);
        NodeConfig {
            ett: EttConfig {
                eth: Some(base.eth),
                ..self.ett.clone()
            },
            linkstat: self.linkstat.clone(),
            metric: self.metric.clone(),
            routes: self.routes.clone(),
            seed: self.seed,
            ..base
        }
    }
}
