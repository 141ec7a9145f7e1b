//! Resolves a named preset into concrete provider settings of a cloud spec.

use std::collections::BTreeMap;

use http::StatusCode;
use kubermatic_crd::{
    cloud::{CloudSpec, ProviderType},
    cluster::Cluster,
    constants::{IS_CREDENTIAL_PRESET_LABEL, PRESET_INVALIDATED_ANNOTATION, PRESET_NAME_ANNOTATION},
    preset::Preset,
};
use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::{
    auth::UserInfo,
    datacenter::email_matches,
    error::{HttpError, error_chain},
    store::{self, ObjectStore},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to get preset {name:?}"))]
    GetPreset { source: store::Error, name: String },

    #[snafu(display("preset {name:?} is disabled"))]
    Disabled { name: String },

    #[snafu(display("preset {name:?} is not available for {email:?}"))]
    EmailRequirements { name: String, email: String },

    #[snafu(display("preset {name:?} is not available in project {project:?}"))]
    WrongProject { name: String, project: String },

    #[snafu(display("the cloud spec has no provider"))]
    NoProvider,

    #[snafu(display("invalid cloud spec"))]
    CloudSpec {
        source: kubermatic_crd::cloud::Error,
    },

    #[snafu(display("preset {name:?} has no settings for provider {provider}"))]
    MissingProvider { name: String, provider: ProviderType },

    #[snafu(display("the {provider} settings of preset {name:?} are disabled"))]
    ProviderDisabled { name: String, provider: ProviderType },

    #[snafu(display("preset {name:?} is restricted to datacenter {datacenter:?}"))]
    WrongDatacenter { name: String, datacenter: String },

    #[snafu(display("failed to apply the {provider} settings of preset {name:?}"))]
    Merge {
        source: serde_json::Error,
        name: String,
        provider: ProviderType,
    },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        match &err {
            Error::GetPreset { source, .. } if !source.is_not_found() => Self::internal_from(&err),
            Error::Merge { .. } => Self::internal_from(&err),
            _ => Self::new(
                StatusCode::BAD_REQUEST,
                format!("invalid credentials: {}", error_chain(&err)),
            ),
        }
    }
}

/// Fields users may override without losing the link to a customizable preset.
fn customizable_fields(provider: ProviderType) -> &'static [&'static str] {
    match provider {
        ProviderType::Openstack => &["network", "routerID", "floatingIPPool", "securityGroups"],
        _ => &[],
    }
}

/// Copies the settings of preset `name` into `cloud`.
///
/// Returns whether the request customized one of the preset's customizable fields. A customized
/// cluster keeps the caller's values and is no longer linked to the preset.
pub async fn apply_preset<S: ObjectStore>(
    privileged: &S,
    user: &UserInfo,
    project_id: &str,
    name: &str,
    cloud: &mut CloudSpec,
) -> Result<bool> {
    let preset: Preset = privileged
        .get(None, name)
        .await
        .context(GetPresetSnafu { name })?;
    let spec = &preset.spec;

    ensure!(spec.is_enabled(), DisabledSnafu { name });
    ensure!(
        user.is_admin || email_matches(&user.email, &spec.required_emails),
        EmailRequirementsSnafu {
            name,
            email: &user.email
        }
    );
    ensure!(
        spec.projects.is_empty() || spec.projects.iter().any(|p| p == project_id),
        WrongProjectSnafu {
            name,
            project: project_id
        }
    );

    let provider = cloud
        .provider_name()
        .context(CloudSpecSnafu)?
        .context(NoProviderSnafu)?;
    let settings = spec
        .providers
        .get(&provider)
        .context(MissingProviderSnafu { name, provider })?;
    ensure!(
        settings.is_enabled(),
        ProviderDisabledSnafu { name, provider }
    );
    ensure!(
        settings.datacenter.is_empty() || settings.datacenter == cloud.datacenter_name,
        WrongDatacenterSnafu {
            name,
            datacenter: &settings.datacenter
        }
    );

    let customizable = if settings.is_customizable {
        customizable_fields(provider)
    } else {
        &[]
    };

    let mut encoded = serde_json::to_value(&*cloud).context(MergeSnafu { name, provider })?;
    let requested = encoded
        .get(provider.to_string())
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    let (merged, customized) = merge_settings(requested, &settings.settings, customizable);
    if let Value::Object(fields) = &mut encoded {
        fields.insert(provider.to_string(), Value::Object(merged));
    }
    *cloud = serde_json::from_value(encoded).context(MergeSnafu { name, provider })?;

    tracing::debug!(preset.name = name, %provider, customized, "applied preset");
    Ok(customized)
}

/// Overlays preset `settings` onto the `requested` provider spec.
///
/// Customizable fields the request already sets to a non-empty value are left alone, and count as
/// customized when they differ from the preset. A customizable field that is missing, null or an
/// empty string is filled from the preset and keeps the cluster linked to it.
fn merge_settings(
    mut requested: Map<String, Value>,
    settings: &Map<String, Value>,
    customizable: &[&str],
) -> (Map<String, Value>, bool) {
    let mut customized = false;
    for (key, value) in settings {
        if customizable.contains(&key.as_str()) {
            match requested.get(key) {
                Some(current) if !is_empty(current) => {
                    customized |= current != value;
                    continue;
                }
                _ => {}
            }
        }
        requested.insert(key.clone(), value.clone());
    }
    (requested, customized)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(string) => string.is_empty(),
        _ => false,
    }
}

/// Labels and annotations linking a new cluster to preset `name`.
pub fn preset_linkage(name: &str) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    (
        BTreeMap::from([(IS_CREDENTIAL_PRESET_LABEL.to_owned(), "true".to_owned())]),
        BTreeMap::from([(PRESET_NAME_ANNOTATION.to_owned(), name.to_owned())]),
    )
}

/// Drops the preset bookkeeping of a cluster whose credentials no longer come from the preset.
pub fn clear_preset_linkage(cluster: &mut Cluster) {
    if let Some(labels) = cluster.metadata.labels.as_mut() {
        labels.remove(IS_CREDENTIAL_PRESET_LABEL);
    }
    if let Some(annotations) = cluster.metadata.annotations.as_mut() {
        annotations.remove(PRESET_NAME_ANNOTATION);
        annotations.remove(PRESET_INVALIDATED_ANNOTATION);
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use kubermatic_crd::cloud::OpenstackCloudSpec;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::{
        convert::cluster::tests::{aws, cluster},
        store::InMemoryStore,
    };

    fn user(email: &str, is_admin: bool) -> UserInfo {
        UserInfo {
            email: email.to_owned(),
            is_admin,
            ..Default::default()
        }
    }

    async fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        for yaml in [
            indoc! {"
                apiVersion: kubermatic.k8c.io/v1
                kind: Preset
                metadata:
                  name: team-openstack
                spec:
                  requiredEmails: [example.com]
                  projects: [my-project]
                  openstack:
                    isCustomizable: true
                    datacenter: os-hamburg
                    username: bob
                    password: preset-password
                    network: preset-net
                    routerID: preset-router
            "},
            indoc! {"
                apiVersion: kubermatic.k8c.io/v1
                kind: Preset
                metadata:
                  name: team-aws
                spec:
                  aws:
                    accessKeyID: preset-key
                    secretAccessKey: preset-secret
            "},
            indoc! {"
                apiVersion: kubermatic.k8c.io/v1
                kind: Preset
                metadata:
                  name: retired
                spec:
                  enabled: false
                  aws:
                    accessKeyID: old-key
            "},
        ] {
            let preset: Preset = serde_yaml::from_str(yaml).expect("test YAML is valid");
            store.insert(preset).await.expect("preset is stored");
        }
        store
    }

    fn openstack(network: &str) -> CloudSpec {
        CloudSpec {
            datacenter_name: "os-hamburg".to_owned(),
            openstack: Some(OpenstackCloudSpec {
                network: network.to_owned(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn settings_are_copied() {
        let store = store().await;
        let mut cloud = aws();
        let customized = apply_preset(&store, &user("jane@corp.io", false), "p1", "team-aws", &mut cloud)
            .await
            .expect("preset applies");

        assert!(!customized);
        let spec = cloud.aws.expect("aws spec is kept");
        assert_eq!(spec.access_key_id, "preset-key");
        assert_eq!(spec.secret_access_key, "preset-secret");
        assert_eq!(spec.vpc_id, "vpc-1");
        assert_eq!(cloud.datacenter_name, "aws-eu-central-1a");
    }

    #[rstest]
    #[case::empty_request("", "preset-net", false)]
    #[case::same_value("preset-net", "preset-net", false)]
    #[case::customized("my-net", "my-net", true)]
    #[tokio::test]
    async fn customizable_fields(
        #[case] requested: &str,
        #[case] network: &str,
        #[case] expected: bool,
    ) {
        let store = store().await;
        let mut cloud = openstack(requested);
        let customized = apply_preset(
            &store,
            &user("jane@example.com", false),
            "my-project",
            "team-openstack",
            &mut cloud,
        )
        .await
        .expect("preset applies");

        assert_eq!(customized, expected);
        let spec = cloud.openstack.expect("openstack spec is kept");
        assert_eq!(spec.network, network);
        assert_eq!(spec.router_id, "preset-router");
        assert_eq!(spec.password, "preset-password");
    }

    fn object(value: Value) -> Map<String, Value> {
        let Value::Object(fields) = value else {
            panic!("objects expected");
        };
        fields
    }

    #[rstest]
    #[case::missing(json!({}), "preset-net", false)]
    #[case::null(json!({"network": null}), "preset-net", false)]
    #[case::empty_string(json!({"network": ""}), "preset-net", false)]
    #[case::same_value(json!({"network": "preset-net"}), "preset-net", false)]
    #[case::other_value(json!({"network": "my-net"}), "my-net", true)]
    fn empty_customizable_fields_take_the_preset_value(
        #[case] requested: Value,
        #[case] network: &str,
        #[case] customized: bool,
    ) {
        let settings = object(json!({"network": "preset-net", "password": "secret"}));
        let (merged, is_customized) = merge_settings(object(requested), &settings, &["network"]);
        assert_eq!(is_customized, customized);
        assert_eq!(merged["network"], network);
        assert_eq!(merged["password"], "secret");
    }

    #[test]
    fn fields_that_are_not_customizable_are_overwritten() {
        let (merged, customized) = merge_settings(
            object(json!({"password": "mine"})),
            &object(json!({"password": "secret"})),
            &["network"],
        );
        assert!(!customized);
        assert_eq!(merged["password"], "secret");
    }

    #[rstest]
    #[case::disabled("retired", "jane@example.com", "my-project", aws(), "is disabled")]
    #[case::email("team-openstack", "jane@corp.io", "my-project", openstack(""), "is not available for")]
    #[case::project("team-openstack", "jane@example.com", "other", openstack(""), "is not available in project")]
    #[case::provider("team-aws", "jane@example.com", "my-project", openstack(""), "has no settings for provider openstack")]
    #[case::datacenter("team-openstack", "jane@example.com", "my-project", CloudSpec { datacenter_name: "os-berlin".to_owned(), ..openstack("") }, "restricted to datacenter")]
    #[case::missing("nope", "jane@example.com", "my-project", aws(), "failed to get preset")]
    #[tokio::test]
    async fn unusable_presets(
        #[case] name: &str,
        #[case] email: &str,
        #[case] project: &str,
        #[case] mut cloud: CloudSpec,
        #[case] message: &str,
    ) {
        let store = store().await;
        let err = apply_preset(&store, &user(email, false), project, name, &mut cloud)
            .await
            .expect_err("preset is unusable");
        let err = HttpError::from(err);
        assert_eq!(err.code(), StatusCode::BAD_REQUEST);
        assert!(err.message().starts_with("invalid credentials: "));
        assert!(err.message().contains(message), "{}", err.message());
    }

    #[tokio::test]
    async fn admins_bypass_email_requirements() {
        let store = store().await;
        let mut cloud = openstack("");
        apply_preset(
            &store,
            &user("root@corp.io", true),
            "my-project",
            "team-openstack",
            &mut cloud,
        )
        .await
        .expect("admins may use every preset");
    }

    #[test]
    fn linkage_is_cleared() {
        let mut cluster = cluster("abcd1234", aws());
        let (labels, annotations) = preset_linkage("team-aws");
        cluster.metadata.labels.get_or_insert_default().extend(labels);
        let mut annotations = annotations;
        annotations.insert(PRESET_INVALIDATED_ANNOTATION.to_owned(), "true".to_owned());
        annotations.insert("keep".to_owned(), "me".to_owned());
        cluster.metadata.annotations = Some(annotations);

        clear_preset_linkage(&mut cluster);

        let labels = cluster.metadata.labels.expect("labels are kept");
        assert!(!labels.contains_key(IS_CREDENTIAL_PRESET_LABEL));
        assert_eq!(labels["team"], "blue");
        assert_eq!(
            cluster.metadata.annotations,
            Some(BTreeMap::from([("keep".to_owned(), "me".to_owned())]))
        );
    }
}
