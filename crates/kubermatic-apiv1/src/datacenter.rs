use serde::{Deserialize, Serialize};

use kubermatic_crd::seed::{self, NodeSettings};

/// A datacenter as presented to users, flattened out of its seed.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Datacenter {
    #[serde(default)]
    pub metadata: DatacenterMeta,
    #[serde(default)]
    pub spec: DatacenterSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DatacenterMeta {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatacenterSpec {
    /// Name of the seed hosting the datacenter.
    #[serde(default)]
    pub seed: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub location: String,
    /// Derived from the configured provider, ignored on input.
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeSettings>,

    /// Provider settings and policies, identical to the stored datacenter spec.
    #[serde(flatten)]
    pub datacenter: seed::DatacenterSpec,
}

/// Body of the datacenter creation request.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CreateDatacenter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub spec: DatacenterSpec,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_settings_are_flattened() {
        let dc: Datacenter = serde_json::from_value(serde_json::json!({
            "metadata": {"name": "hetzner-fsn1"},
            "spec": {
                "seed": "europe",
                "country": "DE",
                "location": "Falkenstein",
                "provider": "hetzner",
                "hetzner": {"datacenter": "fsn1-dc14", "network": "", "location": ""},
                "requiredEmails": ["example.com"],
                "enforceAuditLogging": true
            }
        }))
        .expect("valid datacenter");

        assert_eq!(dc.spec.datacenter.required_emails, vec!["example.com"]);
        assert!(dc.spec.datacenter.enforce_audit_logging);
        let hetzner = dc.spec.datacenter.hetzner.as_ref().expect("hetzner is set");
        assert_eq!(hetzner.datacenter, "fsn1-dc14");

        let value = serde_json::to_value(&dc).expect("serializable");
        assert_eq!(value["spec"]["hetzner"]["datacenter"], "fsn1-dc14");
        assert_eq!(value["spec"]["seed"], "europe");
    }
}
