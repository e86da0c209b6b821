pub mod config;
pub mod ett;
pub mod linkstat;
pub mod metric;
pub mod net;
pub mod node;
pub mod route;
pub mod sim;
pub mod topo;
pub mod wire;

#[cfg(test)]
mod test;
