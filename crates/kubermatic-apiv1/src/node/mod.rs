//! Node deployments and the provider specific node specs.
//!
//! Every provider node spec refuses to serialize unless its required fields are set, see
//! [`RequiredFields`]. Deserialization stays lenient so partial specs can still be patched.

use std::collections::BTreeMap;

use kubermatic_crd::Semver;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::ObjectMeta;

mod providers;

pub use providers::*;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("missing or invalid required parameter(s): {}", fields.join(", ")))]
    MissingRequired { fields: Vec<&'static str> },

    #[snafu(display(
        "{} can not be set at the same time in template (instancetype/flavor) and node spec",
        fields.join(", ")
    ))]
    TemplateConflict { fields: Vec<&'static str> },
}

/// Collects the identifiers of every failing required-field check, in declaration order.
#[derive(Debug, Default)]
pub struct RequiredFields {
    failed: Vec<&'static str>,
}

impl RequiredFields {
    /// Records `field` as failing unless `ok` holds.
    pub fn check(mut self, field: &'static str, ok: bool) -> Self {
        if !ok {
            self.failed.push(field);
        }
        self
    }

    pub fn non_empty(self, field: &'static str, value: &str) -> Self {
        self.check(field, !value.is_empty())
    }

    pub fn positive(self, field: &'static str, value: i64) -> Self {
        self.check(field, value > 0)
    }

    pub fn finish(self) -> Result<(), Error> {
        if self.failed.is_empty() {
            Ok(())
        } else {
            MissingRequiredSnafu {
                fields: self.failed,
            }
            .fail()
        }
    }
}

/// Implements [`Serialize`] by running `validate()` before the derived (remote) serializer, and
/// [`Deserialize`] by plain delegation.
macro_rules! guarded_serde {
    ($($ty:ty),+ $(,)?) => {$(
        impl ::serde::Serialize for $ty {
            fn serialize<S: ::serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                self.validate().map_err(::serde::ser::Error::custom)?;
                <$ty>::serialize(self, serializer)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $ty {
            fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                <$ty>::deserialize(deserializer)
            }
        }
    )+};
}

pub(crate) use guarded_serde;

/// A set of identical worker nodes.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDeployment {
    #[serde(flatten)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: NodeDeploymentSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDeploymentSpec {
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub template: NodeSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic_config: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replicas: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replicas: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpec {
    #[serde(default)]
    pub cloud: NodeCloudSpec,
    #[serde(default)]
    pub operating_system: OperatingSystemSpec,
    #[serde(rename = "sshUserName", default, skip_serializing_if = "String::is_empty")]
    pub ssh_user_name: String,
    #[serde(default)]
    pub versions: NodeVersionInfo,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub taints: Vec<TaintSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct NodeVersionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubelet: Option<Semver>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct TaintSpec {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub effect: String,
}

/// Exactly one provider is expected to be set.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct NodeCloudSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digitalocean: Option<DigitaloceanNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<AzureNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openstack: Option<OpenstackNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet: Option<PacketNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hetzner: Option<HetznerNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vsphere: Option<VSphereNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<GcpNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubevirt: Option<KubevirtNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alibaba: Option<AlibabaNodeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anexia: Option<AnexiaNodeSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatingSystemSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ubuntu: Option<UbuntuSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flatcar: Option<FlatcarSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhel: Option<RhelSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rockylinux: Option<RockyLinuxSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amzn2: Option<AmazonLinuxSpec>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UbuntuSpec {
    #[serde(default)]
    pub dist_upgrade_on_boot: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatcarSpec {
    #[serde(default)]
    pub disable_auto_update: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provisioning_utility: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RhelSpec {
    #[serde(default)]
    pub dist_upgrade_on_boot: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rhel_subscription_manager_user: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rhel_subscription_manager_password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub rhsm_offline_token: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RockyLinuxSpec {
    #[serde(default)]
    pub dist_upgrade_on_boot: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmazonLinuxSpec {
    #[serde(default)]
    pub dist_upgrade_on_boot: bool,
}
