//! Presets: named credentials users can reference instead of entering secrets.

use std::collections::BTreeMap;

use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::cloud::ProviderType;

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "Preset",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct PresetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Email domains (or full addresses) allowed to use the preset. Empty allows everybody.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_emails: Vec<String>,
    /// Projects allowed to use the preset. Empty allows every project.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<String>,
    /// Provider settings keyed by provider, e.g. `openstack: {username: .., network: ..}`.
    #[serde(flatten)]
    pub providers: BTreeMap<ProviderType, ProviderPreset>,
}

impl PresetSpec {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}

/// Settings of one provider inside a preset. The remaining keys are copied into the cluster's
/// provider cloud spec.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPreset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub datacenter: String,
    /// Whether users may change the network settings without losing the preset link.
    #[serde(default)]
    pub is_customizable: bool,
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl ProviderPreset {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }
}
