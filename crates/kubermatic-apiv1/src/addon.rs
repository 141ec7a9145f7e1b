use kubermatic_crd::addon::AddonConfigSpec;
use serde::{Deserialize, Serialize};

use crate::ObjectMeta;

/// An addon installed into a user cluster.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Addon {
    #[serde(flatten)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: AddonSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonSpec {
    /// Free-form template variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub continuously_reconcile: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AddonConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub spec: AddonConfigSpec,
}
