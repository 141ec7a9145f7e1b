//! Global product configuration.

use std::collections::BTreeMap;

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Semver, cloud::ProviderType, seed::MachineFlavorFilter};

/// The installation wide configuration, a single object in the kubermatic namespace.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "KubermaticConfiguration",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct KubermaticConfigurationSpec {
    #[serde(default)]
    pub versions: KubermaticVersioningConfiguration,
    #[serde(default)]
    pub api: KubermaticApiConfiguration,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub feature_gates: BTreeMap<String, bool>,
}

impl KubermaticConfigurationSpec {
    pub fn feature_gate(&self, gate: &str) -> bool {
        self.feature_gates.get(gate).copied().unwrap_or_default()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubermaticApiConfiguration {
    /// Addons users may install through the API.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessible_addons: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubermaticVersioningConfiguration {
    /// Control plane versions offered for new clusters.
    #[serde(default)]
    pub versions: Vec<Semver>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Semver>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_incompatibilities: Vec<Incompatibility>,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
pub enum ConditionType {
    #[default]
    #[serde(rename = "always")]
    #[strum(serialize = "always")]
    Always,
    #[serde(rename = "externalCloudProvider")]
    #[strum(serialize = "externalCloudProvider")]
    ExternalCloudProvider,
    #[serde(rename = "inTreeCloudProvider")]
    #[strum(serialize = "inTreeCloudProvider")]
    InTreeCloudProvider,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum OperationType {
    #[default]
    Create,
    Upgrade,
    Support,
}

/// Versions a provider cannot run under a given condition.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Incompatibility {
    /// The affected provider, `None` matches every provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderType>,
    /// A semver requirement such as `>= 1.31` or `1.29.*`.
    pub version: String,
    #[serde(default)]
    pub condition: ConditionType,
    #[serde(default)]
    pub operation: OperationType,
}

/// Installation wide settings editable by admins at runtime, a single object named
/// `globalsettings`.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "KubermaticSetting",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct SettingSpec {
    #[serde(
        rename = "machineDeploymentVMResourceQuota",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub machine_deployment_vm_resource_quota: Option<MachineFlavorFilter>,
}

pub const GLOBAL_SETTINGS_NAME: &str = "globalsettings";
