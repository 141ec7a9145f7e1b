use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Default values for clusters created on a seed.
///
/// The spec is a partial cluster spec: only the fields the template wants to default are set. It
/// is referenced by name from [`crate::seed::SeedSpec::default_cluster_template`] and lives in the
/// kubermatic namespace.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "ClusterTemplate",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
pub struct ClusterTemplateSpec {
    #[serde(flatten)]
    pub cluster: serde_json::Map<String, serde_json::Value>,
}
