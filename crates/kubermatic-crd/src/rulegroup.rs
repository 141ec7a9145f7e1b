use k8s_openapi::ByteString;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::addon::ClusterReference;

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
pub enum RuleGroupType {
    #[default]
    Metrics,
    Logs,
}

/// A Prometheus or Loki rule group for one user cluster, stored in the cluster namespace.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "RuleGroup",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroupSpec {
    #[serde(default)]
    pub is_default: bool,
    pub rule_group_type: RuleGroupType,
    #[serde(default)]
    pub cluster: ClusterReference,
    /// The rule group in YAML, base64 encoded on the wire.
    pub data: ByteString,
}
