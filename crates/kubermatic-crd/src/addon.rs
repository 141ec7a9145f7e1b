use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Reference from an addon to the cluster it is installed into.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterReference {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

/// An addon installed into a user cluster. Lives in the cluster namespace on the seed.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "Addon",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct AddonSpec {
    /// Name of the addon manifest set, equal to the resource name.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cluster: ClusterReference,
    /// Raw template variables. Stored as an arbitrary JSON document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<serde_json::Value>,
    #[serde(default)]
    pub is_default: bool,
}

/// UI metadata for an addon, cluster-scoped and named after the addon.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "AddonConfig",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct AddonConfigSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub short_description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub logo: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub logo_format: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<AddonFormControl>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonFormControl {
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type", default)]
    pub type_: String,
    #[serde(default)]
    pub internal_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help_text: String,
    #[serde(default)]
    pub required: bool,
}
