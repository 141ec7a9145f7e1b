//! Cloud provider settings of a cluster.
//!
//! The same [`CloudSpec`] is used by the internal `Cluster` resource and the external API. Provider
//! credentials are plain string fields here. [`CloudSpec::redact_credentials`] clears all of them,
//! empty credential fields are omitted when serializing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use snafu::Snafu;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display(
        "only one cloud provider can be set in CloudSpec, but found the following providers: [{}]",
        providers.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
    ))]
    MultipleProviders { providers: Vec<ProviderType> },
}

/// All cloud providers known to the platform.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderType {
    Alibaba,
    Anexia,
    Aws,
    Azure,
    Baremetal,
    Bringyourown,
    Digitalocean,
    Edge,
    Fake,
    Gcp,
    Hetzner,
    Kubevirt,
    Nutanix,
    Openstack,
    Packet,
    Vmwareclouddirector,
    Vsphere,
}

impl ProviderType {
    pub fn all() -> Vec<Self> {
        Self::iter().collect()
    }
}

/// A reference to a key of a secret in an arbitrary namespace.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSecretKeySelector {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
}

/// Exactly one provider field is expected to be set, see [`CloudSpec::provider_name`].
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSpec {
    /// Name of the datacenter the cluster runs in.
    #[serde(rename = "dc", default)]
    pub datacenter_name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fake: Option<FakeCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digitalocean: Option<DigitaloceanCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bringyourown: Option<BringYourOwnCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge: Option<EdgeCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenstackCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet: Option<PacketCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hetzner: Option<HetznerCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vsphere: Option<VSphereCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<GcpCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubevirt: Option<KubevirtCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alibaba: Option<AlibabaCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anexia: Option<AnexiaCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nutanix: Option<NutanixCloudSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vmwareclouddirector: Option<VmwareCloudDirectorCloudSpec>,
}

impl CloudSpec {
    /// Returns the single configured provider, `None` when no provider is set.
    pub fn provider_name(&self) -> Result<Option<ProviderType>, Error> {
        let configured = [
            (self.aws.is_some(), ProviderType::Aws),
            (self.azure.is_some(), ProviderType::Azure),
            (self.bringyourown.is_some(), ProviderType::Bringyourown),
            (self.edge.is_some(), ProviderType::Edge),
            (self.digitalocean.is_some(), ProviderType::Digitalocean),
            (self.fake.is_some(), ProviderType::Fake),
            (self.gcp.is_some(), ProviderType::Gcp),
            (self.hetzner.is_some(), ProviderType::Hetzner),
            (self.kubevirt.is_some(), ProviderType::Kubevirt),
            (self.openstack.is_some(), ProviderType::Openstack),
            (self.packet.is_some(), ProviderType::Packet),
            (self.vsphere.is_some(), ProviderType::Vsphere),
            (self.alibaba.is_some(), ProviderType::Alibaba),
            (self.anexia.is_some(), ProviderType::Anexia),
            (self.nutanix.is_some(), ProviderType::Nutanix),
            (
                self.vmwareclouddirector.is_some(),
                ProviderType::Vmwareclouddirector,
            ),
        ];

        let providers: Vec<ProviderType> = configured
            .into_iter()
            .filter_map(|(set, provider)| set.then_some(provider))
            .collect();

        match providers.as_slice() {
            [] => Ok(None),
            [provider] => Ok(Some(*provider)),
            _ => MultipleProvidersSnafu { providers }.fail(),
        }
    }

    /// The credentials reference of whichever provider is configured.
    pub fn credentials_reference(&self) -> Option<&GlobalSecretKeySelector> {
        [
            self.aws.as_ref().and_then(|s| s.credentials_reference.as_ref()),
            self.azure.as_ref().and_then(|s| s.credentials_reference.as_ref()),
            self.digitalocean
                .as_ref()
                .and_then(|s| s.credentials_reference.as_ref()),
            self.gcp.as_ref().and_then(|s| s.credentials_reference.as_ref()),
            self.hetzner.as_ref().and_then(|s| s.credentials_reference.as_ref()),
            self.kubevirt.as_ref().and_then(|s| s.credentials_reference.as_ref()),
            self.openstack
                .as_ref()
                .and_then(|s| s.credentials_reference.as_ref()),
            self.packet.as_ref().and_then(|s| s.credentials_reference.as_ref()),
            self.vsphere.as_ref().and_then(|s| s.credentials_reference.as_ref()),
            self.alibaba.as_ref().and_then(|s| s.credentials_reference.as_ref()),
            self.anexia.as_ref().and_then(|s| s.credentials_reference.as_ref()),
            self.nutanix.as_ref().and_then(|s| s.credentials_reference.as_ref()),
            self.vmwareclouddirector
                .as_ref()
                .and_then(|s| s.credentials_reference.as_ref()),
        ]
        .into_iter()
        .flatten()
        .next()
    }

    /// Every secret value of every configured provider, keyed by `provider.field`.
    fn credential_fields_mut(&mut self) -> Vec<(&'static str, &mut String)> {
        let mut fields = Vec::new();
        if let Some(fake) = &mut self.fake {
            fields.push(("fake.token", &mut fake.token));
        }
        if let Some(digitalocean) = &mut self.digitalocean {
            fields.push(("digitalocean.token", &mut digitalocean.token));
        }
        if let Some(aws) = &mut self.aws {
            fields.push(("aws.accessKeyID", &mut aws.access_key_id));
            fields.push(("aws.secretAccessKey", &mut aws.secret_access_key));
        }
        if let Some(azure) = &mut self.azure {
            fields.push(("azure.clientID", &mut azure.client_id));
            fields.push(("azure.clientSecret", &mut azure.client_secret));
        }
        if let Some(openstack) = &mut self.openstack {
            fields.push(("openstack.username", &mut openstack.username));
            fields.push(("openstack.password", &mut openstack.password));
            fields.push((
                "openstack.applicationCredentialID",
                &mut openstack.application_credential_id,
            ));
            fields.push((
                "openstack.applicationCredentialSecret",
                &mut openstack.application_credential_secret,
            ));
            fields.push(("openstack.token", &mut openstack.token));
        }
        if let Some(packet) = &mut self.packet {
            fields.push(("packet.apiKey", &mut packet.api_key));
        }
        if let Some(hetzner) = &mut self.hetzner {
            fields.push(("hetzner.token", &mut hetzner.token));
        }
        if let Some(vsphere) = &mut self.vsphere {
            fields.push(("vsphere.username", &mut vsphere.username));
            fields.push(("vsphere.password", &mut vsphere.password));
            fields.push((
                "vsphere.infraManagementUser.username",
                &mut vsphere.infra_management_user.username,
            ));
            fields.push((
                "vsphere.infraManagementUser.password",
                &mut vsphere.infra_management_user.password,
            ));
        }
        if let Some(gcp) = &mut self.gcp {
            fields.push(("gcp.serviceAccount", &mut gcp.service_account));
        }
        if let Some(kubevirt) = &mut self.kubevirt {
            fields.push(("kubevirt.kubeconfig", &mut kubevirt.kubeconfig));
            fields.push(("kubevirt.csiKubeconfig", &mut kubevirt.csi_kubeconfig));
        }
        if let Some(alibaba) = &mut self.alibaba {
            fields.push(("alibaba.accessKeyID", &mut alibaba.access_key_id));
            fields.push(("alibaba.accessKeySecret", &mut alibaba.access_key_secret));
        }
        if let Some(anexia) = &mut self.anexia {
            fields.push(("anexia.token", &mut anexia.token));
        }
        if let Some(nutanix) = &mut self.nutanix {
            fields.push(("nutanix.username", &mut nutanix.username));
            fields.push(("nutanix.password", &mut nutanix.password));
            fields.push(("nutanix.proxyURL", &mut nutanix.proxy_url));
        }
        if let Some(vcd) = &mut self.vmwareclouddirector {
            fields.push(("vmwareclouddirector.username", &mut vcd.username));
            fields.push(("vmwareclouddirector.password", &mut vcd.password));
            fields.push(("vmwareclouddirector.apiToken", &mut vcd.api_token));
        }
        fields
    }

    /// Clears every secret value of every configured provider.
    pub fn redact_credentials(&mut self) {
        for (_, value) in self.credential_fields_mut() {
            value.clear();
        }
    }

    /// The non-empty secret values, keyed by `provider.field`.
    pub fn credentials(&self) -> BTreeMap<&'static str, String> {
        let mut copy = self.clone();
        copy.credential_fields_mut()
            .into_iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(key, value)| (key, value.clone()))
            .collect()
    }

    /// Whether the secrets (or the secret reference) differ between the two specs.
    pub fn credentials_differ(&self, other: &Self) -> bool {
        self.credentials() != other.credentials()
            || self.credentials_reference() != other.credentials_reference()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FakeCloudSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct BringYourOwnCloudSpec {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct EdgeCloudSpec {}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitaloceanCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(rename = "accessKeyID", default, skip_serializing_if = "String::is_empty")]
    pub access_key_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_access_key: String,
    #[serde(rename = "assumeRoleARN", default, skip_serializing_if = "String::is_empty")]
    pub assume_role_arn: String,
    #[serde(
        rename = "assumeRoleExternalID",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub assume_role_external_id: String,
    #[serde(rename = "vpcID", default)]
    pub vpc_id: String,
    #[serde(rename = "roleARN", default, skip_serializing_if = "String::is_empty")]
    pub control_plane_role_arn: String,
    #[serde(rename = "routeTableID", default)]
    pub route_table_id: String,
    #[serde(default)]
    pub instance_profile_name: String,
    #[serde(rename = "securityGroupID", default)]
    pub security_group_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_ports_allowed_ip_range: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disable_iam_reconciling: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(rename = "tenantID", default)]
    pub tenant_id: String,
    #[serde(rename = "subscriptionID", default)]
    pub subscription_id: String,
    #[serde(rename = "clientID", default, skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub client_secret: String,
    #[serde(default)]
    pub resource_group: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vnet_resource_group: String,
    #[serde(rename = "vnet", default)]
    pub vnet_name: String,
    #[serde(rename = "subnet", default)]
    pub subnet_name: String,
    #[serde(rename = "routeTable", default)]
    pub route_table_name: String,
    #[serde(default)]
    pub security_group: String,
    #[serde(default)]
    pub availability_set: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assign_availability_set: Option<bool>,
    #[serde(rename = "loadBalancerSKU", default, skip_serializing_if = "String::is_empty")]
    pub load_balancer_sku: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenstackCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,
    #[serde(rename = "projectID", default, skip_serializing_if = "String::is_empty")]
    pub project_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(
        rename = "applicationCredentialID",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub application_credential_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub application_credential_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_token: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub security_groups: String,
    #[serde(rename = "floatingIPPool", default)]
    pub floating_ip_pool: String,
    #[serde(rename = "routerID", default)]
    pub router_id: String,
    #[serde(rename = "subnetID", default)]
    pub subnet_id: String,
    #[serde(rename = "ipv6SubnetID", default, skip_serializing_if = "String::is_empty")]
    pub ipv6_subnet_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_octavia: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_ingress_hostname: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PacketCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(rename = "projectID", default)]
    pub project_id: String,
    #[serde(default)]
    pub billing_cycle: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HetznerCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(default)]
    pub network: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VSphereCredentials {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VSphereCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default)]
    pub vm_net_name: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub datastore: String,
    #[serde(default)]
    pub datastore_cluster: String,
    #[serde(default)]
    pub storage_policy: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_pool: String,
    /// Separate account used by the cloud controller manager for infrastructure management.
    #[serde(default)]
    pub infra_management_user: VSphereCredentials,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub service_account: String,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub subnetwork: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_ports_allowed_ip_range: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubevirtCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kubeconfig: String,
    #[serde(rename = "csiKubeconfig", default, skip_serializing_if = "String::is_empty")]
    pub csi_kubeconfig: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlibabaCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(rename = "accessKeyID", default, skip_serializing_if = "String::is_empty")]
    pub access_key_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub access_key_secret: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnexiaCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NutanixCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_name: String,
    #[serde(rename = "proxyURL", default, skip_serializing_if = "String::is_empty")]
    pub proxy_url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmwareCloudDirectorCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_reference: Option<GlobalSecretKeySelector>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(rename = "apiToken", default, skip_serializing_if = "String::is_empty")]
    pub api_token: String,
    #[serde(default)]
    pub organization: String,
    #[serde(rename = "vdc", default)]
    pub vdc: String,
    #[serde(rename = "ovdcNetwork", default)]
    pub ovdc_network: String,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const SECRET: &str = "_______VALUE_TO_BE_FILTERED_______";

    fn cloud_with_all_credentials() -> CloudSpec {
        CloudSpec {
            datacenter_name: "dc".to_owned(),
            aws: Some(AwsCloudSpec {
                access_key_id: SECRET.to_owned(),
                secret_access_key: SECRET.to_owned(),
                vpc_id: "vpc".to_owned(),
                ..Default::default()
            }),
            openstack: Some(OpenstackCloudSpec {
                username: SECRET.to_owned(),
                password: SECRET.to_owned(),
                application_credential_secret: SECRET.to_owned(),
                network: "network".to_owned(),
                ..Default::default()
            }),
            vsphere: Some(VSphereCloudSpec {
                username: SECRET.to_owned(),
                password: SECRET.to_owned(),
                infra_management_user: VSphereCredentials {
                    username: SECRET.to_owned(),
                    password: SECRET.to_owned(),
                },
                ..Default::default()
            }),
            nutanix: Some(NutanixCloudSpec {
                password: SECRET.to_owned(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn redaction_removes_every_secret() {
        let mut cloud = cloud_with_all_credentials();
        cloud.redact_credentials();

        let output = serde_json::to_string(&cloud).expect("serializable");
        assert!(!output.contains(SECRET), "{output}");
        assert!(output.contains("\"vpcID\":\"vpc\""), "{output}");

        let back: CloudSpec = serde_json::from_str(&output).expect("deserializable");
        assert_eq!(back, cloud);
    }

    #[test]
    fn credential_changes_are_detected() {
        let old = cloud_with_all_credentials();
        let mut new = old.clone();
        new.aws.as_mut().expect("aws is set").vpc_id = "other".to_owned();
        assert!(!old.credentials_differ(&new));

        new.aws.as_mut().expect("aws is set").secret_access_key = "rotated".to_owned();
        assert!(old.credentials_differ(&new));
        assert_eq!(new.credentials()["aws.secretAccessKey"], "rotated");
    }

    #[rstest]
    #[case(CloudSpec::default(), Ok(None))]
    #[case(
        CloudSpec { hetzner: Some(HetznerCloudSpec::default()), ..Default::default() },
        Ok(Some(ProviderType::Hetzner))
    )]
    #[case(
        CloudSpec {
            aws: Some(AwsCloudSpec::default()),
            gcp: Some(GcpCloudSpec::default()),
            ..Default::default()
        },
        Err(Error::MultipleProviders { providers: vec![ProviderType::Aws, ProviderType::Gcp] })
    )]
    fn provider_name(
        #[case] cloud: CloudSpec,
        #[case] expected: Result<Option<ProviderType>, Error>,
    ) {
        assert_eq!(cloud.provider_name(), expected);
    }

    #[test]
    fn multiple_providers_message() {
        let err = Error::MultipleProviders {
            providers: vec![ProviderType::Aws, ProviderType::Gcp],
        };
        assert_eq!(
            err.to_string(),
            "only one cloud provider can be set in CloudSpec, but found the following providers: [aws gcp]"
        );
    }

    #[test]
    fn provider_type_strings() {
        assert_eq!(ProviderType::Vmwareclouddirector.to_string(), "vmwareclouddirector");
        assert_eq!("aws".parse::<ProviderType>(), Ok(ProviderType::Aws));
    }
}
