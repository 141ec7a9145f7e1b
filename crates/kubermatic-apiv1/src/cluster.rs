//! External cluster representation.

use std::collections::BTreeMap;

use kubermatic_crd::{
    Semver,
    cloud::CloudSpec,
    cluster::{
        AuditLoggingSettings, BackupConfig, ClusterNetworkingConfig, CniPluginSettings,
        EventRateLimitConfig, ExposeStrategy, HealthStatus, KubeLb, KubernetesDashboard,
        KyvernoSettings, MachineNetworkingConfig, MlaSettings, NetworkRanges, OidcSettings,
        OpaIntegrationSettings, ServiceAccountSettings, UpdateWindow,
    },
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

use crate::{ObjectMeta, SerializationMode, node::NodeDeployment};

/// The only cluster type the API accepts.
pub const KUBERNETES_CLUSTER_TYPE: &str = "kubernetes";

/// A user cluster as returned by the API.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(flatten)]
    pub metadata: ObjectMeta,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inherited_labels: BTreeMap<String, String>,

    #[serde(rename = "type", default)]
    pub type_: String,

    /// Name of the preset the credentials were taken from.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub credential: String,

    #[serde(default)]
    pub spec: ClusterSpec,

    #[serde(default)]
    pub status: ClusterStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_deployment_count: Option<usize>,
}

impl Cluster {
    /// Serializes the cluster, keeping or clearing the provider credentials according to `mode`.
    pub fn to_value(&self, mode: SerializationMode) -> serde_json::Result<serde_json::Value> {
        let mut value = serde_json::to_value(self)?;
        if mode == SerializationMode::Unredacted {
            if let Some(object) = value.as_object_mut() {
                object.insert(
                    "spec".to_owned(),
                    self.spec.to_value(SerializationMode::Unredacted)?,
                );
            }
        }
        Ok(value)
    }
}

/// The user facing part of the cluster spec.
///
/// The [`Serialize`] implementation always clears the provider credentials of [`Self::cloud`].
/// Use [`ClusterSpec::to_value`] with [`SerializationMode::Unredacted`] to keep them.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub cloud: CloudSpec,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub machine_networks: Vec<MachineNetworkingConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_network: Option<ClusterNetworkingConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cni_plugin: Option<CniPluginSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Semver>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oidc: Option<OidcSettings>,

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
    pub audit_logging: Option<AuditLoggingSettings>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admission_plugins: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opa_integration: Option<OpaIntegrationSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account: Option<ServiceAccountSettings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mla: Option<MlaSettings>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container_runtime: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_rate_limit_config: Option<EventRateLimitConfig>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pod_node_selector_admission_plugin_config: BTreeMap<String, String>,

    #[serde(
        rename = "apiServerAllowedIPRanges",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub api_server_allowed_ip_ranges: Option<NetworkRanges>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose_strategy: Option<ExposeStrategy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_config: Option<BackupConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelb: Option<KubeLb>,

    #[serde(default)]
    pub disable_csi_driver: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyverno: Option<KyvernoSettings>,
}

impl ClusterSpec {
    /// Serializes the spec, keeping or clearing the provider credentials according to `mode`.
    pub fn to_value(&self, mode: SerializationMode) -> serde_json::Result<serde_json::Value> {
        match mode {
            SerializationMode::Redacted => serde_json::to_value(self),
            SerializationMode::Unredacted => Self::serialize(self, serde_json::value::Serializer),
        }
    }
}

impl Serialize for ClusterSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut redacted = self.clone();
        redacted.cloud.redact_credentials();
        Self::serialize(&redacted, serializer)
    }
}

impl<'de> Deserialize<'de> for ClusterSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::deserialize(deserializer)
    }
}

/// Progress of switching a cluster from the in-tree to the external cloud controller manager.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
pub enum ExternalCcmMigrationStatus {
    /// The provider or version cannot run the external CCM.
    #[default]
    Unsupported,
    /// The migration can be started.
    Supported,
    /// The cluster already runs the external CCM.
    NotNeeded,
    /// The migration was started and nodes still have to be rotated.
    InProgress,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Semver>,
    #[serde(rename = "url", default)]
    pub url: String,
    #[serde(rename = "externalCCMMigration", default)]
    pub external_ccm_migration: ExternalCcmMigrationStatus,
}

/// Body of the cluster creation request.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClusterSpec {
    pub cluster: Cluster,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_deployment: Option<NodeDeployment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applications: Vec<Application>,
}

/// An application to install into the cluster once it is ready.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub spec: ApplicationSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSpec {
    #[serde(rename = "applicationRef", default)]
    pub application_ref: ApplicationRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ApplicationRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Health of the control plane components.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterHealth {
    pub apiserver: HealthStatus,
    pub application_controller: HealthStatus,
    pub scheduler: HealthStatus,
    pub controller: HealthStatus,
    pub machine_controller: HealthStatus,
    pub etcd: HealthStatus,
    pub cloud_provider_infrastructure: HealthStatus,
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

#[cfg(test)]
mod tests {
    use kubermatic_crd::cloud::{
        AwsCloudSpec, AzureCloudSpec, DigitaloceanCloudSpec, HetznerCloudSpec,
        OpenstackCloudSpec, VSphereCloudSpec, VSphereCredentials,
    };
    use rstest::rstest;

    use super::*;

    const SECRET: &str = "_______VALUE_TO_BE_FILTERED_______";

    fn spec_with(cloud: CloudSpec) -> ClusterSpec {
        ClusterSpec {
            version: Some(Semver::new(1, 2, 3)),
            cloud,
            ..Default::default()
        }
    }

    #[rstest]
    #[case::openstack(CloudSpec {
        datacenter_name: "OpenstackDatacenter".to_owned(),
        openstack: Some(OpenstackCloudSpec {
            username: SECRET.to_owned(),
            password: SECRET.to_owned(),
            subnet_id: "subnetID".to_owned(),
            domain: "domain".to_owned(),
            floating_ip_pool: "floatingIPPool".to_owned(),
            network: "network".to_owned(),
            router_id: "routerID".to_owned(),
            security_groups: "securityGroups".to_owned(),
            project: "project".to_owned(),
            ..Default::default()
        }),
        ..Default::default()
    })]
    #[case::azure(CloudSpec {
        azure: Some(AzureCloudSpec {
            client_id: SECRET.to_owned(),
            client_secret: SECRET.to_owned(),
            tenant_id: "tenantID".to_owned(),
            availability_set: "availabilitySet".to_owned(),
            resource_group: "resourceGroup".to_owned(),
            route_table_name: "routeTableName".to_owned(),
            security_group: "securityGroup".to_owned(),
            subnet_name: "subnetName".to_owned(),
            subscription_id: "subscriptionID".to_owned(),
            vnet_name: "vnetname".to_owned(),
            ..Default::default()
        }),
        ..Default::default()
    })]
    #[case::hetzner(CloudSpec {
        hetzner: Some(HetznerCloudSpec { token: SECRET.to_owned(), ..Default::default() }),
        ..Default::default()
    })]
    #[case::digitalocean(CloudSpec {
        digitalocean: Some(DigitaloceanCloudSpec { token: SECRET.to_owned(), ..Default::default() }),
        ..Default::default()
    })]
    #[case::vsphere(CloudSpec {
        vsphere: Some(VSphereCloudSpec {
            username: SECRET.to_owned(),
            password: SECRET.to_owned(),
            infra_management_user: VSphereCredentials {
                username: SECRET.to_owned(),
                password: SECRET.to_owned(),
            },
            vm_net_name: "vmNetName".to_owned(),
            datastore: "testDataStore".to_owned(),
            ..Default::default()
        }),
        ..Default::default()
    })]
    #[case::aws(CloudSpec {
        aws: Some(AwsCloudSpec {
            access_key_id: SECRET.to_owned(),
            secret_access_key: SECRET.to_owned(),
            security_group_id: "securityGroupID".to_owned(),
            instance_profile_name: "instanceProfileName".to_owned(),
            route_table_id: "routeTableID".to_owned(),
            vpc_id: "vpcID".to_owned(),
            ..Default::default()
        }),
        ..Default::default()
    })]
    fn default_serialization_redacts_credentials(#[case] cloud: CloudSpec) {
        let spec = spec_with(cloud);

        let output = serde_json::to_string(&spec).expect("spec serializes");
        assert!(!output.contains(SECRET), "output {output} leaks a credential");

        let back: ClusterSpec = serde_json::from_str(&output).expect("output deserializes");
        assert_eq!(back.version, spec.version);

        let unredacted = spec
            .to_value(SerializationMode::Unredacted)
            .expect("spec serializes");
        assert!(unredacted.to_string().contains(SECRET));
        let back: ClusterSpec = serde_json::from_value(unredacted).expect("value deserializes");
        assert_eq!(back, spec);
    }

    #[test]
    fn cluster_serialization_modes() {
        let cluster = Cluster {
            metadata: ObjectMeta {
                id: "abc".to_owned(),
                name: "prod".to_owned(),
                ..Default::default()
            },
            type_: KUBERNETES_CLUSTER_TYPE.to_owned(),
            spec: spec_with(CloudSpec {
                hetzner: Some(HetznerCloudSpec {
                    token: SECRET.to_owned(),
                    network: "net".to_owned(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let redacted = cluster
            .to_value(SerializationMode::Redacted)
            .expect("cluster serializes");
        assert_eq!(
            redacted["spec"]["cloud"]["hetzner"],
            serde_json::json!({"network": "net"})
        );
        assert_eq!(redacted["id"], "abc");
        assert_eq!(redacted["status"]["externalCCMMigration"], "Unsupported");

        let unredacted = cluster
            .to_value(SerializationMode::Unredacted)
            .expect("cluster serializes");
        assert_eq!(unredacted["spec"]["cloud"]["hetzner"]["token"], SECRET);
        let back: Cluster = serde_json::from_value(unredacted).expect("value deserializes");
        assert_eq!(back, cluster);
    }
}
