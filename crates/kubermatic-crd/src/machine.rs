//! A read view of the machine-controller's `MachineDeployment`, as found in user clusters.
//!
//! Only the fields the dashboard needs are modelled; the provider specific part stays raw JSON.

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::cloud::ProviderType;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("machine deployment has no provider spec"))]
    MissingProviderSpec,

    #[snafu(display("failed to decode the machine provider config"))]
    DecodeProviderConfig { source: serde_json::Error },
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "cluster.k8s.io",
    version = "v1alpha1",
    kind = "MachineDeployment",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct MachineDeploymentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(default)]
    pub template: MachineTemplateSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MachineTemplateSpec {
    #[serde(default)]
    pub spec: MachineSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    #[serde(default)]
    pub provider_spec: ProviderSpec,
    #[serde(default)]
    pub versions: MachineVersionInfo,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ProviderSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MachineVersionInfo {
    #[serde(default)]
    pub kubelet: String,
}

/// The machine-controller provider config stored in [`ProviderSpec::value`].
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    pub cloud_provider: ProviderType,
    #[serde(default)]
    pub cloud_provider_spec: serde_json::Value,
    #[serde(default)]
    pub operating_system: String,
}

impl ProviderConfig {
    /// Reads a string field of the cloud provider spec. Values may be given directly or as a
    /// `{value: ..}` object.
    pub fn string_field(&self, field: &str) -> Option<&str> {
        match self.cloud_provider_spec.get(field)? {
            serde_json::Value::String(value) => Some(value),
            serde_json::Value::Object(object) => object.get("value")?.as_str(),
            _ => None,
        }
    }
}

impl MachineDeployment {
    pub fn provider_config(&self) -> Result<ProviderConfig, Error> {
        let value = self
            .spec
            .template
            .spec
            .provider_spec
            .value
            .clone()
            .context(MissingProviderSpecSnafu)?;
        serde_json::from_value(value).context(DecodeProviderConfigSnafu)
    }

    /// Desired replicas, an unset count counts as zero.
    pub fn replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_config_fields() {
        let md: MachineDeployment = serde_json::from_value(serde_json::json!({
            "apiVersion": "cluster.k8s.io/v1alpha1",
            "kind": "MachineDeployment",
            "metadata": {"name": "workers", "namespace": "kube-system"},
            "spec": {
                "replicas": 3,
                "template": {"spec": {"providerSpec": {"value": {
                    "cloudProvider": "aws",
                    "cloudProviderSpec": {
                        "availabilityZone": "eu-central-1a",
                        "instanceType": {"value": "t3.medium"}
                    },
                    "operatingSystem": "ubuntu"
                }}}}
            }
        }))
        .expect("valid machine deployment");

        let config = md.provider_config().expect("provider config decodes");
        assert_eq!(config.cloud_provider, ProviderType::Aws);
        assert_eq!(config.string_field("availabilityZone"), Some("eu-central-1a"));
        assert_eq!(config.string_field("instanceType"), Some("t3.medium"));
        assert_eq!(config.string_field("subnetId"), None);
        assert_eq!(md.replicas(), 3);
    }

    #[test]
    fn missing_provider_spec() {
        let md = MachineDeployment::new("empty", MachineDeploymentSpec::default());
        assert!(matches!(md.provider_config(), Err(Error::MissingProviderSpec)));
        assert_eq!(md.replicas(), 0);
    }
}
