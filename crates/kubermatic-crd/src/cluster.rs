//! The `Cluster` resource: a user cluster whose control plane runs on a seed.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Semver, cloud::CloudSpec, constants};

/// Describes a user cluster. Clusters are cluster-scoped and named with a random ID.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "Cluster",
    status = "ClusterStatus",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub human_readable_name: String,

    pub version: Semver,

    #[serde(default)]
    pub cloud: CloudSpec,

    #[serde(default)]
    pub cluster_network: ClusterNetworkingConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub machine_networks: Vec<MachineNetworkingConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose_strategy: Option<ExposeStrategy>,

    #[serde(
        rename = "apiServerAllowedIPRanges",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub api_server_allowed_ip_ranges: Option<NetworkRanges>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc: Option<OidcSettings>,

    /// Feature flags, for example `externalCloudProvider`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub features: BTreeMap<String, bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_window: Option<UpdateWindow>,

    #[serde(default)]
    pub use_pod_security_policy_admission_plugin: bool,
    #[serde(default)]
    pub use_pod_node_selector_admission_plugin: bool,
    #[serde(default)]
    pub use_event_rate_limit_admission_plugin: bool,

    #[serde(
        rename = "enableUserSSHKeyAgent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub enable_user_ssh_key_agent: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_dashboard: Option<KubernetesDashboard>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelb: Option<KubeLb>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admission_plugins: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pod_node_selector_admission_plugin_config: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_rate_limit_config: Option<EventRateLimitConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_logging: Option<AuditLoggingSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opa_integration: Option<OpaIntegrationSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<ServiceAccountSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mla: Option<MlaSettings>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_runtime: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cni_plugin: Option<CniPluginSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_config: Option<BackupConfig>,

    #[serde(default)]
    pub disable_csi_driver: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyverno: Option<KyvernoSettings>,
}

impl ClusterSpec {
    pub fn feature_enabled(&self, feature: &str) -> bool {
        self.features.get(feature).copied().unwrap_or_default()
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
pub enum ExposeStrategy {
    NodePort,
    LoadBalancer,
    Tunneling,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRanges {
    #[serde(default)]
    pub cidr_blocks: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterNetworkingConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ip_family: String,
    #[serde(default)]
    pub pods: NetworkRanges,
    #[serde(default)]
    pub services: NetworkRanges,
    #[serde(default)]
    pub dns_domain: String,
    #[serde(default)]
    pub proxy_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipvs: Option<IpvsConfiguration>,
    #[serde(
        rename = "nodeLocalDNSCacheEnabled",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub node_local_dns_cache_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub konnectivity_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpvsConfiguration {
    #[serde(rename = "strictArp", default, skip_serializing_if = "Option::is_none")]
    pub strict_arp: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineNetworkingConfig {
    #[serde(rename = "cidr", default)]
    pub cidr: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub dns_servers: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OidcSettings {
    #[serde(rename = "issuerURL", default, skip_serializing_if = "String::is_empty")]
    pub issuer_url: String,
    #[serde(rename = "clientID", default, skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username_claim: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub groups_claim: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub required_claim: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extra_scopes: String,
}

impl OidcSettings {
    pub fn is_set(&self) -> bool {
        *self != Self::default()
    }
}

/// A recurring maintenance window, `start` is `[Weekday ]HH:MM` and `length` a duration.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWindow {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub start: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub length: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubernetesDashboard {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeLb {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub use_load_balancer_class: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRateLimitConfigItem {
    pub qps: i32,
    pub burst: i32,
    #[serde(default)]
    pub cache_size: i32,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRateLimitConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<EventRateLimitConfigItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<EventRateLimitConfigItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<EventRateLimitConfigItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_and_object: Option<EventRateLimitConfigItem>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLoggingSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub policy_preset: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpaIntegrationSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_timeout_seconds: Option<i32>,
    #[serde(default)]
    pub experimental_enable_mutation: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountSettings {
    #[serde(default)]
    pub token_volume_projection_enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_audiences: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MlaSettings {
    #[serde(default)]
    pub monitoring_enabled: bool,
    #[serde(default)]
    pub logging_enabled: bool,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CniPluginType {
    Canal,
    #[default]
    Cilium,
    None,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CniPluginSettings {
    #[serde(rename = "type")]
    pub type_: CniPluginType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalObjectReference {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_storage_location: Option<LocalObjectReference>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KyvernoSettings {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default)]
    pub address: ClusterAddress,
    #[serde(default)]
    pub versions: ClusterVersionsStatus,
    #[serde(default)]
    pub extended_health: ExtendedClusterHealth,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conditions: BTreeMap<String, ClusterCondition>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inherited_labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_email: String,
}

impl ClusterStatus {
    pub fn condition_true(&self, condition: &str) -> bool {
        self.conditions
            .get(condition)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAddress {
    #[serde(rename = "url", default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub external_name: String,
    #[serde(rename = "internalURL", default, skip_serializing_if = "String::is_empty")]
    pub internal_name: String,
    #[serde(rename = "ip", default, skip_serializing_if = "String::is_empty")]
    pub ip: String,
    #[serde(default)]
    pub port: i32,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterVersionsStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane: Option<Semver>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apiserver: Option<Semver>,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
pub enum ConditionStatus {
    True,
    #[default]
    False,
    Unknown,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubermatic_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_time: Option<Time>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
pub enum HealthStatus {
    #[default]
    HealthStatusDown,
    HealthStatusUp,
    HealthStatusProvisioning,
}

/// Health of every control plane component, maintained by the seed controllers.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedClusterHealth {
    #[serde(default)]
    pub apiserver: HealthStatus,
    #[serde(default)]
    pub application_controller: HealthStatus,
    #[serde(default)]
    pub scheduler: HealthStatus,
    #[serde(default)]
    pub controller: HealthStatus,
    #[serde(default)]
    pub machine_controller: HealthStatus,
    #[serde(default)]
    pub etcd: HealthStatus,
    #[serde(default)]
    pub cloud_provider_infrastructure: HealthStatus,
    #[serde(default)]
    pub user_cluster_controller_manager: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gatekeeper_controller: Option<HealthStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gatekeeper_audit: Option<HealthStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring: Option<HealthStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<HealthStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alertmanager_config: Option<HealthStatus>,
    #[serde(rename = "mlaGateway", default, skip_serializing_if = "Option::is_none")]
    pub mla_gateway: Option<HealthStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operating_system_manager: Option<HealthStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubernetes_dashboard: Option<HealthStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelb: Option<HealthStatus>,
}

impl Cluster {
    /// The namespace on the seed which holds the control plane and per-cluster resources.
    pub fn namespace_name(&self) -> String {
        match &self.status {
            Some(status) if !status.namespace_name.is_empty() => status.namespace_name.clone(),
            _ => constants::cluster_namespace(self.metadata.name.as_deref().unwrap_or_default()),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(constants::PROJECT_ID_LABEL))
            .map(String::as_str)
    }

    pub fn condition_true(&self, condition: &str) -> bool {
        self.status
            .as_ref()
            .is_some_and(|status| status.condition_true(condition))
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn deserialize_stored_cluster() {
        let cluster: Cluster = serde_yaml::from_str(indoc! {r#"
            apiVersion: kubermatic.k8c.io/v1
            kind: Cluster
            metadata:
              name: abcd1234
              labels:
                project-id: my-project
            spec:
              humanReadableName: production
              version: 1.30.2
              cloud:
                dc: hetzner-fsn1
                hetzner:
                  token: secret
              clusterNetwork:
                pods:
                  cidrBlocks: ["172.25.0.0/16"]
                services:
                  cidrBlocks: ["10.240.16.0/20"]
                dnsDomain: cluster.local
                proxyMode: ipvs
              exposeStrategy: Tunneling
              features:
                externalCloudProvider: true
              cniPlugin:
                type: cilium
                version: "1.15"
            status:
              namespaceName: cluster-abcd1234
              conditions:
                ClusterInitialized:
                  status: "True"
        "#})
        .expect("test YAML is valid");

        assert_eq!(cluster.spec.version, Semver::new(1, 30, 2));
        assert_eq!(cluster.spec.expose_strategy, Some(ExposeStrategy::Tunneling));
        assert!(cluster.spec.feature_enabled(constants::CLUSTER_FEATURE_EXTERNAL_CLOUD_PROVIDER));
        assert!(!cluster.spec.feature_enabled(constants::CLUSTER_FEATURE_VSPHERE_CSI_CLUSTER_ID));
        assert_eq!(cluster.project_id(), Some("my-project"));
        assert_eq!(cluster.namespace_name(), "cluster-abcd1234");
        assert!(cluster.condition_true(constants::CLUSTER_CONDITION_CLUSTER_INITIALIZED));
        assert_eq!(
            cluster.spec.cni_plugin,
            Some(CniPluginSettings {
                type_: CniPluginType::Cilium,
                version: "1.15".to_owned()
            })
        );
    }

    #[test]
    fn namespace_name_falls_back_to_cluster_name() {
        let spec: ClusterSpec =
            serde_json::from_value(serde_json::json!({"version": "1.29.0"})).expect("valid spec");
        let cluster = Cluster::new("xyz", spec);
        assert_eq!(cluster.namespace_name(), "cluster-xyz");
        assert_eq!(cluster.project_id(), None);
    }
}
