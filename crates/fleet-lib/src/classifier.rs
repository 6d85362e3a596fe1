//! Namespace to environment group classification
//!
//! Each environment declares an ordered list of namespace suffixes. A
//! namespace belongs to the first suffix it ends with, in configured order,
//! so a short `"b"` listed before `"devb"` shadows it. Environments
//! without suffixes put every namespace into one bucket named after the
//! environment.

use crate::models::Environment;

/// Catch-all group for namespaces that match no configured suffix
pub const OTHERS_GROUP: &str = "others";

/// Classify a namespace against an ordered suffix list
pub fn classify<'a>(namespace: &str, suffixes: &'a [String], sentinel: &'a str) -> &'a str {
    if suffixes.is_empty() {
        return sentinel;
    }

    suffixes
        .iter()
        .find(|suffix| namespace.ends_with(suffix.as_str()))
        .map(String::as_str)
        .unwrap_or(OTHERS_GROUP)
}

/// Classifier bound to one environment's suffix convention
#[derive(Debug, Clone)]
pub struct NamespaceClassifier {
    suffixes: Vec<String>,
    sentinel: String,
}

impl NamespaceClassifier {
    pub fn new(suffixes: Vec<String>, sentinel: impl Into<String>) -> Self {
        Self {
            suffixes,
            sentinel: sentinel.into(),
        }
    }

    pub fn for_environment(environment: &Environment) -> Self {
        Self::new(environment.suffixes.clone(), environment.name.clone())
    }

    /// Group label for a namespace
    pub fn classify(&self, namespace: &str) -> &str {
        classify(namespace, &self.suffixes, &self.sentinel)
    }

    /// Whether this classifier puts everything into a single bucket
    pub fn is_single_bucket(&self) -> bool {
        self.suffixes.is_empty()
    }

    /// Group labels in report order: suffixes as configured, then `others`
    pub fn group_labels(&self) -> Vec<String> {
        if self.is_single_bucket() {
            return vec![self.sentinel.clone()];
        }

        let mut labels = self.suffixes.clone();
        labels.push(OTHERS_GROUP.to_string());
        labels
    }
}
