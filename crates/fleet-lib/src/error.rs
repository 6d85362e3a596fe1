//! Error and warning types for the inventory engine
//!
//! Only [`ConfigurationError`] is fatal. Parse failures and collection
//! problems are recorded as [`CollectionWarning`]s on the reports and the
//! run carries on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to interpret a raw CPU or memory quantity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty quantity")]
    Empty,
    #[error("invalid numeric quantity '{raw}'")]
    InvalidNumber { raw: String },
    #[error("negative quantity '{raw}'")]
    Negative { raw: String },
}

/// Static misconfiguration, surfaced before any collection starts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("no environments configured")]
    NoEnvironments,
    #[error("environment name must not be empty")]
    EmptyEnvironmentName,
    #[error("environment '{0}' is defined more than once")]
    DuplicateEnvironment(String),
    #[error("environment '{0}' has no region")]
    MissingRegion(String),
    #[error("environment '{0}' contains an empty suffix")]
    EmptySuffix(String),
    #[error("environment '{environment}' lists suffix '{suffix}' more than once")]
    DuplicateSuffix { environment: String, suffix: String },
    #[error("environment '{environment}' uses reserved group label '{suffix}' as a suffix")]
    ReservedSuffix { environment: String, suffix: String },
    #[error("unknown environment '{0}'")]
    UnknownEnvironment(String),
    #[error("concurrency must be at least 1")]
    InvalidConcurrency,
    #[error("{0} is required")]
    Missing(&'static str),
}

/// Non-fatal condition recorded while collecting a cluster or the fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollectionWarning {
    #[error("malformed node line '{line}'")]
    MalformedNodeLine { line: String },

    #[error("malformed pod line '{line}'")]
    MalformedPodLine { line: String },

    #[error("malformed deployment line '{line}'")]
    MalformedDeploymentLine { line: String },

    #[error("node {node}: invalid capacity ({reason})")]
    InvalidNodeCapacity { node: String, reason: String },

    #[error("node {node}: utilization metrics unavailable")]
    NodeMetricsUnavailable { node: String },

    #[error("pod {namespace}/{pod}: utilization metrics unavailable")]
    PodMetricsUnavailable { namespace: String, pod: String },

    #[error("pod {namespace}/{pod}: invalid utilization metrics ({reason})")]
    InvalidPodMetrics {
        namespace: String,
        pod: String,
        reason: String,
    },

    #[error("deployments unavailable ({reason})")]
    DeploymentsUnavailable { reason: String },

    #[error("cluster {cluster} unreachable ({reason})")]
    ClusterUnreachable { cluster: String, reason: String },

    #[error("could not list clusters for environment {environment} ({reason})")]
    ClusterListingFailed { environment: String, reason: String },

    #[error("run interrupted: {completed} clusters completed, {abandoned} abandoned")]
    RunInterrupted { completed: usize, abandoned: usize },
}

impl CollectionWarning {
    /// Returns true for warnings that cost the report a whole cluster
    pub fn is_cluster_level(&self) -> bool {
        matches!(
            self,
            CollectionWarning::ClusterUnreachable { .. }
                | CollectionWarning::ClusterListingFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_display() {
        let warning = CollectionWarning::PodMetricsUnavailable {
            namespace: "app-dev".to_string(),
            pod: "api-0".to_string(),
        };
        assert_eq!(
            warning.to_string(),
            "pod app-dev/api-0: utilization metrics unavailable"
        );
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let warning = CollectionWarning::RunInterrupted {
            completed: 2,
            abandoned: 3,
        };
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "run_interrupted");
        assert_eq!(json["completed"], 2);
    }

    #[test]
    fn test_cluster_level_warnings() {
        assert!(CollectionWarning::ClusterUnreachable {
            cluster: "c1".to_string(),
            reason: "timeout".to_string(),
        }
        .is_cluster_level());
        assert!(!CollectionWarning::MalformedPodLine {
            line: "x".to_string()
        }
        .is_cluster_level());
    }
}
