use kube::Resource;
use kubermatic_apiv1::rulegroup::RuleGroup;
use kubermatic_crd::{addon::ClusterReference, cluster::Cluster, rulegroup as internal};
use serde::Deserialize;
use snafu::{ResultExt, Snafu, ensure};

use crate::error::HttpError;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot parse rule group data"))]
    ParseData { source: serde_yaml::Error },

    #[snafu(display("rule group name cannot be empty"))]
    MissingName,
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        Self::bad_request(crate::error::error_chain(&err))
    }
}

#[derive(Deserialize)]
struct RuleGroupHeader {
    #[serde(default)]
    name: String,
}

/// The name declared by the `name:` key of a rule group document.
pub fn rule_group_name(data: &[u8]) -> Result<String, Error> {
    let header: RuleGroupHeader = serde_yaml::from_slice(data).context(ParseDataSnafu)?;
    ensure!(!header.name.is_empty(), MissingNameSnafu);
    Ok(header.name)
}

pub fn to_external(rule_group: &internal::RuleGroup) -> RuleGroup {
    RuleGroup {
        name: rule_group.metadata.name.clone().unwrap_or_default(),
        is_default: rule_group.spec.is_default,
        data: rule_group.spec.data.clone(),
        type_: rule_group.spec.rule_group_type,
    }
}

/// A rule group for `cluster`, named after its document.
pub fn to_internal(rule_group: &RuleGroup, cluster: &Cluster) -> Result<internal::RuleGroup, Error> {
    let name = rule_group_name(&rule_group.data.0)?;
    let mut internal = internal::RuleGroup::new(&name, internal::RuleGroupSpec {
        is_default: rule_group.is_default,
        rule_group_type: rule_group.type_,
        cluster: ClusterReference {
            name: cluster.metadata.name.clone().unwrap_or_default(),
            kind: "Cluster".to_owned(),
            api_version: Cluster::api_version(&()).into_owned(),
            uid: cluster.metadata.uid.clone().unwrap_or_default(),
        },
        data: rule_group.data.clone(),
    });
    internal.metadata.namespace = Some(cluster.namespace_name());
    Ok(internal)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use k8s_openapi::ByteString;
    use kubermatic_crd::rulegroup::RuleGroupType;
    use rstest::rstest;

    use super::*;
    use crate::convert::cluster::tests::{aws, cluster};

    const RULES: &str = indoc! {"
        name: node-alerts
        rules:
          - alert: NodeDown
            expr: up == 0
    "};

    #[test]
    fn name_comes_from_the_document() {
        let external = RuleGroup {
            name: "ignored".to_owned(),
            is_default: false,
            data: ByteString(RULES.as_bytes().to_vec()),
            type_: RuleGroupType::Logs,
        };
        let internal =
            to_internal(&external, &cluster("abcd1234", aws())).expect("valid rule group");
        assert_eq!(internal.metadata.name.as_deref(), Some("node-alerts"));
        assert_eq!(internal.metadata.namespace.as_deref(), Some("cluster-abcd1234"));

        let back = to_external(&internal);
        assert_eq!(back.name, "node-alerts");
        assert_eq!(back.type_, RuleGroupType::Logs);
    }

    #[rstest]
    #[case("rules: []", "rule group name cannot be empty")]
    #[case("name: [unclosed", "cannot parse rule group data")]
    fn invalid_documents(#[case] data: &str, #[case] message: &str) {
        let err = rule_group_name(data.as_bytes()).expect_err("invalid document");
        assert_eq!(err.to_string(), message);
    }
}
