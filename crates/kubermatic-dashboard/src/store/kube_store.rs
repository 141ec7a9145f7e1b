use async_trait::async_trait;
use kube::{
    Api, Client, Config,
    api::{ApiResource, DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams},
};
use snafu::ResultExt;

use super::{
    Error, ImpersonateSnafu, Object, ObjectStore, Result, Selector,
    SerializationSnafu, resource_name,
};
use crate::auth::UserInfo;

/// An [`ObjectStore`] backed by the Kubernetes API server.
///
/// Requests go through the dynamic API so the same code path serves cluster scoped and
/// namespaced resources.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    config: Config,
}

impl KubeStore {
    pub fn new(config: Config) -> Result<Self, kube::Error> {
        let client = Client::try_from(config.clone())?;
        Ok(Self { client, config })
    }

    /// The underlying client, acting with the identity this store was created with.
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    fn api<K: Object>(&self, namespace: Option<&str>) -> Api<DynamicObject> {
        let resource = ApiResource::erase::<K>(&());
        match namespace {
            Some(namespace) => Api::namespaced_with(self.client.clone(), namespace, &resource),
            None => Api::all_with(self.client.clone(), &resource),
        }
    }
}

fn to_dynamic<K: Object>(object: &K) -> Result<DynamicObject> {
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .context(SerializationSnafu {
            resource: resource_name::<K>(),
        })
}

fn from_dynamic<K: Object>(object: DynamicObject) -> Result<K> {
    serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .context(SerializationSnafu {
            resource: resource_name::<K>(),
        })
}

/// Translates API server status responses into store errors.
fn map_error<K: Object>(source: kube::Error, name: &str) -> Error {
    let kube::Error::Api(response) = &source else {
        return Error::Request { source };
    };
    let (code, reason, message) = (
        response.code,
        response.reason.clone(),
        response.message.clone(),
    );
    classify::<K>(code, &reason, message, name).unwrap_or(Error::Request { source })
}

/// The store error for a status response, `None` for codes without a dedicated variant.
fn classify<K: Object>(code: u16, reason: &str, message: String, name: &str) -> Option<Error> {
    let resource = resource_name::<K>();
    let name = name.to_owned();
    match code {
        404 => Some(Error::NotFound { resource, name }),
        409 if reason == "AlreadyExists" => Some(Error::AlreadyExists { resource, name }),
        409 => Some(Error::Conflict {
            resource,
            name,
            message,
        }),
        403 => Some(Error::Forbidden { message }),
        400 | 422 => Some(Error::Invalid { message }),
        _ => None,
    }
}

fn object_ref<K: Object>(object: &K) -> (Option<String>, String) {
    let meta = object.meta();
    (meta.namespace.clone(), meta.name.clone().unwrap_or_default())
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: Object>(&self, namespace: Option<&str>, name: &str) -> Result<K> {
        let object = self
            .api::<K>(namespace)
            .get(name)
            .await
            .map_err(|err| map_error::<K>(err, name))?;
        from_dynamic(object)
    }

    async fn list<K: Object>(
        &self,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<K>> {
        let mut params = ListParams::default();
        if let Some(labels) = selector.to_query() {
            params = params.labels(&labels);
        }

        let list = self
            .api::<K>(namespace)
            .list(&params)
            .await
            .map_err(|err| map_error::<K>(err, ""))?;
        list.items.into_iter().map(from_dynamic).collect()
    }

    async fn create<K: Object>(&self, object: &K) -> Result<K> {
        let (namespace, name) = object_ref(object);
        let created = self
            .api::<K>(namespace.as_deref())
            .create(&PostParams::default(), &to_dynamic(object)?)
            .await
            .map_err(|err| map_error::<K>(err, &name))?;
        from_dynamic(created)
    }

    async fn update<K: Object>(&self, object: &K) -> Result<K> {
        let (namespace, name) = object_ref(object);
        let updated = self
            .api::<K>(namespace.as_deref())
            .replace(&name, &PostParams::default(), &to_dynamic(object)?)
            .await
            .map_err(|err| map_error::<K>(err, &name))?;
        from_dynamic(updated)
    }

    async fn patch<K: Object>(&self, object: &K, patch: &serde_json::Value) -> Result<K> {
        let (namespace, name) = object_ref(object);
        let patched = self
            .api::<K>(namespace.as_deref())
            .patch(&name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|err| map_error::<K>(err, &name))?;
        from_dynamic(patched)
    }

    async fn delete<K: Object>(&self, namespace: Option<&str>, name: &str) -> Result<()> {
        self.api::<K>(namespace)
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|err| map_error::<K>(err, name))?;
        Ok(())
    }

    fn impersonate(&self, user: &UserInfo) -> Result<Self> {
        let mut config = self.config.clone();
        config.auth_info.impersonate = Some(user.email.clone());
        config.auth_info.impersonate_groups = Some(user.groups.clone());
        Self::new(config).context(ImpersonateSnafu { user: &user.email })
    }
}

#[cfg(test)]
mod tests {
    use kubermatic_crd::{cluster::Cluster, sshkey::UserSSHKey};

    use super::*;

    #[test]
    fn status_codes_map_to_store_errors() {
        let message = || "message".to_owned();
        assert!(matches!(
            classify::<Cluster>(404, "NotFound", message(), "abc"),
            Some(Error::NotFound { resource, name }) if resource == "clusters.kubermatic.k8c.io" && name == "abc"
        ));
        assert!(matches!(
            classify::<Cluster>(409, "AlreadyExists", message(), "abc"),
            Some(Error::AlreadyExists { .. })
        ));
        assert!(matches!(
            classify::<UserSSHKey>(409, "Conflict", message(), "key"),
            Some(Error::Conflict { .. })
        ));
        assert!(
            classify::<Cluster>(403, "Forbidden", message(), "abc")
                .is_some_and(|err| err.is_forbidden())
        );
        assert!(matches!(
            classify::<Cluster>(422, "Invalid", message(), "abc"),
            Some(Error::Invalid { message }) if message == "message"
        ));
        assert!(classify::<Cluster>(500, "InternalError", message(), "abc").is_none());
    }
}
