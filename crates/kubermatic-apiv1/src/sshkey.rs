use serde::{Deserialize, Serialize};

use crate::ObjectMeta;

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SshKey {
    #[serde(flatten)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: SshKeySpec,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshKeySpec {
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub public_key: String,
}
