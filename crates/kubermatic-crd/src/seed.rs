//! The `Seed` resource and the datacenters it hosts.
//!
//! A seed is a Kubernetes cluster running the control planes of user clusters. Each seed declares a
//! set of datacenters, one per cloud location users can create clusters in.

use std::collections::BTreeMap;

use kube::CustomResource;
use serde::{Deserialize, Serialize};

use crate::{
    cloud::ProviderType,
    cluster::{ExposeStrategy, NetworkRanges},
};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "Seed",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct SeedSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    /// Datacenters keyed by their (globally unique) name.
    #[serde(default)]
    pub datacenters: BTreeMap<String, Datacenter>,
    /// Name of the `ClusterTemplate` holding defaults for clusters created on this seed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_cluster_template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expose_strategy: Option<ExposeStrategy>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Datacenter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub country: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeSettings>,
    #[serde(default)]
    pub spec: DatacenterSpec,
}

/// Node level settings shared by all clusters of a datacenter.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSettings {
    #[serde(rename = "httpProxy", default, skip_serializing_if = "String::is_empty")]
    pub http_proxy: String,
    #[serde(rename = "noProxy", default, skip_serializing_if = "String::is_empty")]
    pub no_proxy: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insecure_registries: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pause_image: String,
}

/// Bounds on the machine sizes offered to users. A maximum of `0` means unlimited.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineFlavorFilter {
    #[serde(rename = "minCPU", default)]
    pub min_cpu: i32,
    #[serde(rename = "maxCPU", default)]
    pub max_cpu: i32,
    #[serde(rename = "minRAM", default)]
    pub min_ram: i32,
    #[serde(rename = "maxRAM", default)]
    pub max_ram: i32,
    #[serde(rename = "enableGPU", default)]
    pub enable_gpu: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digitalocean: Option<DatacenterSpecDigitalocean>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bringyourown: Option<DatacenterSpecBringYourOwn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<DatacenterSpecEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<DatacenterSpecAws>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<DatacenterSpecAzure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<DatacenterSpecOpenstack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet: Option<DatacenterSpecPacket>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hetzner: Option<DatacenterSpecHetzner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vsphere: Option<DatacenterSpecVSphere>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baremetal: Option<DatacenterSpecBaremetal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<DatacenterSpecGcp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubevirt: Option<DatacenterSpecKubevirt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alibaba: Option<DatacenterSpecAlibaba>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anexia: Option<DatacenterSpecAnexia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutanix: Option<DatacenterSpecNutanix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmwareclouddirector: Option<DatacenterSpecVmwareCloudDirector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fake: Option<DatacenterSpecFake>,

    /// Only users whose email domain is listed may use the datacenter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_emails: Vec<String>,
    #[serde(default)]
    pub enforce_audit_logging: bool,
    #[serde(default)]
    pub enforce_pod_security_policy: bool,
    #[serde(rename = "ipv6Enabled", default)]
    pub ipv6_enabled: bool,
    #[serde(default)]
    pub disable_csi_driver: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_flavor_filter: Option<MachineFlavorFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_network: Option<NetworkRanges>,
}

impl DatacenterSpec {
    /// All providers configured on this datacenter, in detection order.
    pub fn providers(&self) -> Vec<ProviderType> {
        [
            (self.alibaba.is_some(), ProviderType::Alibaba),
            (self.bringyourown.is_some(), ProviderType::Bringyourown),
            (self.digitalocean.is_some(), ProviderType::Digitalocean),
            (self.aws.is_some(), ProviderType::Aws),
            (self.openstack.is_some(), ProviderType::Openstack),
            (self.packet.is_some(), ProviderType::Packet),
            (self.hetzner.is_some(), ProviderType::Hetzner),
            (self.vsphere.is_some(), ProviderType::Vsphere),
            (self.baremetal.is_some(), ProviderType::Baremetal),
            (self.azure.is_some(), ProviderType::Azure),
            (self.edge.is_some(), ProviderType::Edge),
            (self.gcp.is_some(), ProviderType::Gcp),
            (self.kubevirt.is_some(), ProviderType::Kubevirt),
            (self.anexia.is_some(), ProviderType::Anexia),
            (self.nutanix.is_some(), ProviderType::Nutanix),
            (
                self.vmwareclouddirector.is_some(),
                ProviderType::Vmwareclouddirector,
            ),
            (self.fake.is_some(), ProviderType::Fake),
        ]
        .into_iter()
        .filter_map(|(set, provider)| set.then_some(provider))
        .collect()
    }

    /// The first configured provider, if any.
    pub fn provider(&self) -> Option<ProviderType> {
        self.providers().into_iter().next()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DatacenterSpecDigitalocean {
    #[serde(default)]
    pub region: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DatacenterSpecBringYourOwn {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DatacenterSpecEdge {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DatacenterSpecBaremetal {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DatacenterSpecAws {
    #[serde(default)]
    pub region: String,
    /// Operating system to AMI mapping.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DatacenterSpecAzure {
    #[serde(default)]
    pub location: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterSpecOpenstack {
    #[serde(rename = "authURL", default)]
    pub auth_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub availability_zone: String,
    #[serde(default)]
    pub region: String,
    #[serde(rename = "ignoreVolumeAZ", default, skip_serializing_if = "Option::is_none")]
    pub ignore_volume_az: Option<bool>,
    #[serde(rename = "enforceFloatingIP", default)]
    pub enforce_floating_ip: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_servers: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manage_security_groups: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_octavia: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_device_path: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DatacenterSpecPacket {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facilities: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub metro: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DatacenterSpecHetzner {
    #[serde(default)]
    pub datacenter: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterSpecVSphere {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub allow_insecure: bool,
    #[serde(default)]
    pub datastore: String,
    #[serde(default)]
    pub datacenter: String,
    #[serde(default)]
    pub cluster: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub storage_policy: String,
    #[serde(default)]
    pub root_path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterSpecGcp {
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub zone_suffixes: Vec<String>,
    #[serde(default)]
    pub regional: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterSpecKubevirt {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dns_policy: String,
    #[serde(default)]
    pub enable_default_network_policies: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DatacenterSpecAlibaba {
    #[serde(default)]
    pub region: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DatacenterSpecAnexia {
    #[serde(rename = "locationID", default)]
    pub location_id: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterSpecNutanix {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default)]
    pub allow_insecure: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterSpecVmwareCloudDirector {
    #[serde(rename = "url", default)]
    pub url: String,
    #[serde(default)]
    pub allow_insecure: bool,
    #[serde(default)]
    pub catalog: String,
    #[serde(default)]
    pub storage_profile: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterSpecFake {
    #[serde(default)]
    pub fake_property: String,
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn seed_with_datacenters() {
        let seed: Seed = serde_yaml::from_str(indoc! {"
            apiVersion: kubermatic.k8c.io/v1
            kind: Seed
            metadata:
              name: europe-west
              namespace: kubermatic
            spec:
              country: DE
              location: Hamburg
              defaultClusterTemplate: seed-defaults
              datacenters:
                hetzner-fsn1:
                  country: DE
                  location: Falkenstein
                  spec:
                    hetzner:
                      datacenter: fsn1-dc8
                    requiredEmails:
                      - example.com
                    machineFlavorFilter:
                      minCPU: 2
                      maxRAM: 64
        "})
        .expect("test YAML is valid");

        let dc = &seed.spec.datacenters["hetzner-fsn1"];
        assert_eq!(dc.spec.provider(), Some(ProviderType::Hetzner));
        assert_eq!(dc.spec.required_emails, vec!["example.com".to_owned()]);
        assert_eq!(
            dc.spec.machine_flavor_filter,
            Some(MachineFlavorFilter {
                min_cpu: 2,
                max_ram: 64,
                ..Default::default()
            })
        );
        assert_eq!(seed.spec.default_cluster_template, "seed-defaults");
    }

    #[test]
    fn provider_detection_order() {
        let spec = DatacenterSpec {
            fake: Some(DatacenterSpecFake::default()),
            aws: Some(DatacenterSpecAws::default()),
            alibaba: Some(DatacenterSpecAlibaba::default()),
            ..Default::default()
        };
        assert_eq!(spec.providers(), vec![
            ProviderType::Alibaba,
            ProviderType::Aws,
            ProviderType::Fake
        ]);
        assert_eq!(DatacenterSpec::default().provider(), None);
    }
}
