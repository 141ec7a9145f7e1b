//! Fills the fields a caller left unset from the seed's default cluster template.

use kubermatic_crd::{
    cloud::ProviderType,
    cluster::ClusterSpec,
    seed::Seed,
    template::ClusterTemplate,
};
use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu};

use crate::{
    error::HttpError,
    store::{self, ObjectStore},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to get the default cluster template {name:?}"))]
    GetTemplate { source: store::Error, name: String },

    #[snafu(display("failed to encode the cluster spec"))]
    EncodeSpec { source: serde_json::Error },

    #[snafu(display("failed to apply the default cluster template {name:?}"))]
    DecodeSpec {
        source: serde_json::Error,
        name: String,
    },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        Self::internal_from(&err)
    }
}

/// The defaulting template of `seed`, `None` when the seed does not name one.
pub async fn default_template<S: ObjectStore>(
    store: &S,
    namespace: &str,
    seed: &Seed,
) -> Result<Option<ClusterTemplate>> {
    let name = &seed.spec.default_cluster_template;
    if name.is_empty() {
        return Ok(None);
    }
    store
        .get(Some(namespace), name)
        .await
        .map(Some)
        .context(GetTemplateSnafu { name })
}

/// Copies every value of `template` into `spec` where `spec` has nothing set.
pub fn apply_template(spec: &mut ClusterSpec, template: &ClusterTemplate) -> Result<()> {
    let Value::Object(mut target) = serde_json::to_value(&*spec).context(EncodeSpecSnafu)? else {
        return Ok(());
    };
    fill_unset(&mut target, &template.spec.cluster, false);
    *spec = serde_json::from_value(Value::Object(target)).context(DecodeSpecSnafu {
        name: template.metadata.name.clone().unwrap_or_default(),
    })?;
    Ok(())
}

/// `null`, `""`, `false`, `0` and `[]` count as unset.
fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(set) => !set,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(string) => string.is_empty(),
        Value::Array(array) => array.is_empty(),
        Value::Object(_) => false,
    }
}

/// Recursively fills unset keys of `target` from `defaults`.
///
/// Inside the cloud spec the datacenter name is never defaulted, and settings of providers the
/// target does not use are skipped.
pub fn fill_unset(target: &mut Map<String, Value>, defaults: &Map<String, Value>, cloud: bool) {
    for (key, default) in defaults {
        if cloud && (key == "dc" || is_unused_provider(target, key)) {
            continue;
        }
        match (target.get_mut(key), default) {
            (Some(Value::Object(nested)), Value::Object(nested_defaults)) => {
                fill_unset(nested, nested_defaults, !cloud && key == "cloud");
            }
            (Some(value), _) if !is_unset(value) => {}
            _ => {
                target.insert(key.clone(), default.clone());
            }
        }
    }
}

fn is_unused_provider(cloud: &Map<String, Value>, key: &str) -> bool {
    key.parse::<ProviderType>().is_ok() && cloud.get(key).is_none_or(Value::is_null)
}
