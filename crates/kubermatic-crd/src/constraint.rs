//! Gatekeeper constraints managed per user cluster, and the templates they instantiate.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A policy constraint for one user cluster, stored in the cluster namespace.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "Constraint",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSpec {
    /// Kind of the Gatekeeper constraint, equal to the `ConstraintTemplate` CRD kind.
    pub constraint_type: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(rename = "match", default)]
    pub match_: ConstraintMatch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<ConstraintSelector>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub enforcement_action: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintMatch {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<MatchKind>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<LabelSelector>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchKind {
    #[serde(default)]
    pub kinds: Vec<String>,
    #[serde(default)]
    pub api_groups: Vec<String>,
}

/// Restricts a default constraint to clusters of certain providers or labels.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintSelector {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "ConstraintTemplate",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintTemplateSpec {
    #[serde(default)]
    pub crd: ConstraintTemplateCrd,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConstraintTemplateCrd {
    #[serde(default)]
    pub spec: ConstraintTemplateCrdSpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConstraintTemplateCrdSpec {
    #[serde(default)]
    pub names: ConstraintTemplateNames,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ConstraintTemplateNames {
    #[serde(default)]
    pub kind: String,
}
