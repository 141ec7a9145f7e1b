use k8s_openapi::ByteString;
use kubermatic_crd::rulegroup::RuleGroupType;
use serde::{Deserialize, Serialize};

/// A Prometheus or Loki rule group. `data` holds the YAML rule group document.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleGroup {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    pub data: ByteString,
    #[serde(rename = "type", default)]
    pub type_: RuleGroupType,
}
