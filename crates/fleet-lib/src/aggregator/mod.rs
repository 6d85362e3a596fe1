//! Aggregation of raw cluster data into reports
//!
//! - [`ClusterAggregator`] builds one [`ClusterReport`](crate::models::ClusterReport)
//!   per cluster
//! - [`FleetAggregator`] folds cluster reports into a
//!   [`FleetReport`](crate::models::FleetReport)

mod cluster;
mod fleet;

pub use cluster::{
    parse_deployment_line, parse_node_line, parse_pod_line, parse_usage, top_by,
    ClusterAggregator, NodeLine, PodLine,
};
pub use fleet::FleetAggregator;
