use std::collections::BTreeMap;

use kube::{Resource, ResourceExt};
use kubermatic_apiv1::{
    ObjectMeta,
    addon::{Addon, AddonConfig, AddonSpec},
};
use kubermatic_crd::{
    addon::{self as internal, ClusterReference},
    cluster::Cluster,
    constants,
};
use snafu::{OptionExt, Snafu};

use crate::error::HttpError;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("variables of addon {name:?} are not a JSON object"))]
    InvalidVariables { name: String },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        Self::internal(err.to_string())
    }
}

pub fn to_external(addon: &internal::Addon) -> Result<Addon, Error> {
    let name = addon.metadata.name.clone().unwrap_or_default();
    let variables = match &addon.spec.variables {
        None | Some(serde_json::Value::Null) => None,
        Some(value) => Some(
            value
                .as_object()
                .cloned()
                .context(InvalidVariablesSnafu { name: &name })?,
        ),
    };

    Ok(Addon {
        metadata: ObjectMeta {
            id: name.clone(),
            name,
            annotations: BTreeMap::new(),
            creation_timestamp: addon.metadata.creation_timestamp.clone(),
            deletion_timestamp: addon.metadata.deletion_timestamp.clone(),
        },
        spec: AddonSpec {
            variables,
            is_default: addon.spec.is_default,
            continuously_reconcile: addon
                .labels()
                .get(constants::ADDON_ENSURE_LABEL)
                .is_some_and(|value| value == "true"),
        },
    })
}

/// A new addon for `cluster`, stored in the cluster namespace.
pub fn to_internal(addon: &Addon, cluster: &Cluster) -> internal::Addon {
    let mut internal = internal::Addon::new(&addon.metadata.name, internal::AddonSpec {
        name: addon.metadata.name.clone(),
        cluster: cluster_reference(cluster),
        variables: addon.spec.variables.clone().map(serde_json::Value::Object),
        is_default: addon.spec.is_default,
    });
    internal.metadata.namespace = Some(cluster.namespace_name());
    if addon.spec.continuously_reconcile {
        set_ensure_label(&mut internal, true);
    }
    internal
}

pub fn set_ensure_label(addon: &mut internal::Addon, ensure: bool) {
    addon
        .labels_mut()
        .insert(constants::ADDON_ENSURE_LABEL.to_owned(), ensure.to_string());
}

fn cluster_reference(cluster: &Cluster) -> ClusterReference {
    ClusterReference {
        name: cluster.metadata.name.clone().unwrap_or_default(),
        kind: "Cluster".to_owned(),
        api_version: Cluster::api_version(&()).into_owned(),
        uid: cluster.metadata.uid.clone().unwrap_or_default(),
    }
}

pub fn config_to_external(config: &internal::AddonConfig) -> AddonConfig {
    AddonConfig {
        name: config.metadata.name.clone().unwrap_or_default(),
        spec: config.spec.clone(),
    }
}
