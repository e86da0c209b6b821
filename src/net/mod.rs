//! 网络模拟模块
//!
//! 此模块包含无线网络模拟的核心组件，如地址、帧、链路和网络拓扑。

// 子模块声明
mod api;
mod deliver_frame;
mod frame;
mod id;
mod link;
mod net_world;
mod network;
mod stats;

// 重新导出公共接口
pub use api::NetApi;
pub use deliver_frame::DeliverFrame;
pub use frame::Frame;
pub use id::{EtherAddress, LinkId, NodeId};
pub use link::Link;
pub(crate) use net_world::with_node;
pub use net_world::NetWorld;
pub use network::Network;
pub use stats::Stats;
