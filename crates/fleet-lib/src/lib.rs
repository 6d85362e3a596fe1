//! Fleet inventory library for EKS clusters
//!
//! This crate provides the core functionality for:
//! - Parsing raw node, pod and deployment listings into typed samples
//! - Classifying namespaces into per-environment suffix groups
//! - Per-cluster and fleet-wide aggregation
//! - Concurrent collection across environments with cancellation
//! - Metrics and structured logging of collection runs

pub mod aggregator;
pub mod classifier;
pub mod collector;
pub mod config;
pub mod error;
pub mod models;
pub mod observability;
pub mod units;

pub use classifier::{NamespaceClassifier, OTHERS_GROUP};
pub use config::{EnvironmentCatalog, FleetConfig};
pub use error::{CollectionWarning, ConfigurationError, ParseError};
pub use models::*;
pub use observability::{FleetMetrics, RunLogger};
