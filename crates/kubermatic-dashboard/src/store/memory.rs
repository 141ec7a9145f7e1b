use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use snafu::ResultExt;
use tokio::sync::RwLock;

use super::{Error, Object, ObjectStore, Result, Selector, SerializationSnafu, resource_name};
use crate::auth::UserInfo;

type Key = (String, Option<String>, String);

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<Key, serde_json::Value>,
    /// `(email, resource, name)`, a `None` name denies every object of the resource.
    denied: BTreeSet<(String, String, Option<String>)>,
    /// `(email, resource)` pairs that may write objects of the resource but not get them.
    write_only: BTreeSet<(String, String)>,
    resource_version: u64,
}

impl State {
    fn authorize(&self, user: Option<&str>, resource: &str, name: &str) -> Result<()> {
        let Some(user) = user else {
            return Ok(());
        };
        let denied = |name: Option<String>| {
            self.denied
                .contains(&(user.to_owned(), resource.to_owned(), name))
        };
        if denied(None) || (!name.is_empty() && denied(Some(name.to_owned()))) {
            return Err(forbidden(user, resource, name));
        }
        Ok(())
    }

    fn authorize_get(&self, user: Option<&str>, resource: &str, name: &str) -> Result<()> {
        self.authorize(user, resource, name)?;
        match user {
            Some(user)
                if self
                    .write_only
                    .contains(&(user.to_owned(), resource.to_owned())) =>
            {
                Err(forbidden(user, resource, name))
            }
            _ => Ok(()),
        }
    }

    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

/// An [`ObjectStore`] keeping serialized objects in memory.
///
/// Resource versions are maintained like the API server does, so stale updates fail with
/// [`Error::Conflict`]. Impersonated stores share the data and honour the rules registered with
/// [`InMemoryStore::deny`]; the non-impersonated store is never denied anything.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
    user: Option<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `object` with the store's own identity, replacing any existing object.
    pub async fn insert<K: Object>(&self, mut object: K) -> Result<K> {
        let key = key_of(&object);
        let mut state = self.state.write().await;
        object.meta_mut().resource_version = Some(state.next_version());
        state.objects.insert(key, encode(&object)?);
        Ok(object)
    }

    /// Forbids `user` to access objects of `K`, either a single one or all of them.
    pub async fn deny<K: Object>(&self, user: &str, name: Option<&str>) {
        self.state.write().await.denied.insert((
            user.to_owned(),
            resource_name::<K>(),
            name.map(str::to_owned),
        ));
    }

    /// Lets `user` create and list objects of `K` but not get them by name, like a user whose
    /// role bindings have not been created yet.
    pub async fn deny_get<K: Object>(&self, user: &str) {
        self.state
            .write()
            .await
            .write_only
            .insert((user.to_owned(), resource_name::<K>()));
    }

    /// The number of stored objects of `K`, regardless of namespace.
    pub async fn count<K: Object>(&self) -> usize {
        let resource = resource_name::<K>();
        self.state
            .read()
            .await
            .objects
            .keys()
            .filter(|(r, _, _)| *r == resource)
            .count()
    }
}

fn forbidden(user: &str, resource: &str, name: &str) -> Error {
    Error::Forbidden {
        message: format!("{resource} {name:?} is forbidden: User {user:?} cannot access the resource"),
    }
}

fn key_of<K: Object>(object: &K) -> Key {
    let meta = object.meta();
    (
        resource_name::<K>(),
        meta.namespace.clone(),
        meta.name.clone().unwrap_or_default(),
    )
}

fn encode<K: Object>(object: &K) -> Result<serde_json::Value> {
    serde_json::to_value(object).context(SerializationSnafu {
        resource: resource_name::<K>(),
    })
}

fn decode<K: Object>(value: serde_json::Value) -> Result<K> {
    serde_json::from_value(value).context(SerializationSnafu {
        resource: resource_name::<K>(),
    })
}

fn not_found(key: &Key) -> Error {
    Error::NotFound {
        resource: key.0.clone(),
        name: key.2.clone(),
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get<K: Object>(&self, namespace: Option<&str>, name: &str) -> Result<K> {
        let key = (
            resource_name::<K>(),
            namespace.map(str::to_owned),
            name.to_owned(),
        );
        let state = self.state.read().await;
        state.authorize_get(self.user.as_deref(), &key.0, name)?;
        let value = state.objects.get(&key).ok_or_else(|| not_found(&key))?;
        decode(value.clone())
    }

    async fn list<K: Object>(
        &self,
        namespace: Option<&str>,
        selector: &Selector,
    ) -> Result<Vec<K>> {
        let resource = resource_name::<K>();
        let state = self.state.read().await;
        state.authorize(self.user.as_deref(), &resource, "")?;

        let mut objects = Vec::new();
        for ((r, ns, _), value) in &state.objects {
            if *r != resource || (namespace.is_some() && ns.as_deref() != namespace) {
                continue;
            }
            let object: K = decode(value.clone())?;
            if selector.matches(object.meta().labels.as_ref()) {
                objects.push(object);
            }
        }
        Ok(objects)
    }

    async fn create<K: Object>(&self, object: &K) -> Result<K> {
        let key = key_of(object);
        let mut state = self.state.write().await;
        state.authorize(self.user.as_deref(), &key.0, &key.2)?;
        if state.objects.contains_key(&key) {
            return Err(Error::AlreadyExists {
                resource: key.0,
                name: key.2,
            });
        }

        let mut created = object.clone();
        let meta = created.meta_mut();
        meta.resource_version = Some(state.next_version());
        meta.creation_timestamp = Some(Time(jiff::Timestamp::now()));
        state.objects.insert(key, encode(&created)?);
        Ok(created)
    }

    async fn update<K: Object>(&self, object: &K) -> Result<K> {
        let key = key_of(object);
        let mut state = self.state.write().await;
        state.authorize(self.user.as_deref(), &key.0, &key.2)?;
        let stored: K = decode(state.objects.get(&key).ok_or_else(|| not_found(&key))?.clone())?;

        if object.meta().resource_version.is_some()
            && object.meta().resource_version != stored.meta().resource_version
        {
            return Err(Error::Conflict {
                resource: key.0,
                name: key.2,
                message: "the object has been modified; please apply your changes to the latest version and try again".to_owned(),
            });
        }

        let mut updated = object.clone();
        updated.meta_mut().resource_version = Some(state.next_version());
        state.objects.insert(key, encode(&updated)?);
        Ok(updated)
    }

    async fn patch<K: Object>(&self, object: &K, patch: &serde_json::Value) -> Result<K> {
        let key = key_of(object);
        let mut state = self.state.write().await;
        state.authorize(self.user.as_deref(), &key.0, &key.2)?;
        let mut value = state
            .objects
            .get(&key)
            .ok_or_else(|| not_found(&key))?
            .clone();

        json_patch::merge(&mut value, patch);
        let mut patched: K = decode(value)?;
        patched.meta_mut().resource_version = Some(state.next_version());
        state.objects.insert(key, encode(&patched)?);
        Ok(patched)
    }

    async fn delete<K: Object>(&self, namespace: Option<&str>, name: &str) -> Result<()> {
        let key = (
            resource_name::<K>(),
            namespace.map(str::to_owned),
            name.to_owned(),
        );
        let mut state = self.state.write().await;
        state.authorize(self.user.as_deref(), &key.0, name)?;
        let mut stored: K = decode(state.objects.get(&key).ok_or_else(|| not_found(&key))?.clone())?;

        // Objects with finalizers are only marked for deletion.
        if stored
            .meta()
            .finalizers
            .as_ref()
            .is_some_and(|finalizers| !finalizers.is_empty())
        {
            let meta = stored.meta_mut();
            meta.deletion_timestamp
                .get_or_insert_with(|| Time(jiff::Timestamp::now()));
            meta.resource_version = Some(state.next_version());
            state.objects.insert(key, encode(&stored)?);
        } else {
            state.objects.remove(&key);
        }
        Ok(())
    }

    fn impersonate(&self, user: &UserInfo) -> Result<Self> {
        Ok(Self {
            state: Arc::clone(&self.state),
            user: Some(user.email.clone()),
        })
    }
}

#[cfg(test)]
mod tests {
    use kubermatic_crd::{
        addon::{Addon, AddonSpec},
        sshkey::{SshKeySpec, UserSSHKey},
    };

    use super::*;

    fn user(email: &str) -> UserInfo {
        UserInfo {
            email: email.to_owned(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stale_updates_conflict() {
        let store = InMemoryStore::new();
        let created = store
            .create(&UserSSHKey::new("key", SshKeySpec::default()))
            .await
            .expect("create succeeds");
        assert!(created.metadata.creation_timestamp.is_some());

        let mut first = created.clone();
        first.spec.name = "first".to_owned();
        store.update(&first).await.expect("first update succeeds");

        let mut second = created;
        second.spec.name = "second".to_owned();
        let err = store.update(&second).await.expect_err("version is stale");
        assert!(matches!(err, Error::Conflict { .. }));

        let stored: UserSSHKey = store.get(None, "key").await.expect("key exists");
        assert_eq!(stored.spec.name, "first");
    }

    #[tokio::test]
    async fn duplicate_creates_and_missing_objects() {
        let store = InMemoryStore::new();
        let key = UserSSHKey::new("key", SshKeySpec::default());
        store.create(&key).await.expect("create succeeds");
        let err = store.create(&key).await.expect_err("already exists");
        assert_eq!(
            err.to_string(),
            r#"usersshkeys.kubermatic.k8c.io "key" already exists"#
        );

        let err = store
            .get::<UserSSHKey>(None, "other")
            .await
            .expect_err("missing");
        assert_eq!(
            err.to_string(),
            r#"usersshkeys.kubermatic.k8c.io "other" not found"#
        );
    }

    #[tokio::test]
    async fn impersonated_access_is_denied() {
        let store = InMemoryStore::new();
        store
            .insert(UserSSHKey::new("key", SshKeySpec::default()))
            .await
            .expect("insert succeeds");
        store.deny::<UserSSHKey>("bob@example.com", Some("key")).await;

        let bob = store
            .impersonate(&user("bob@example.com"))
            .expect("impersonation succeeds");
        let err = bob
            .get::<UserSSHKey>(None, "key")
            .await
            .expect_err("bob is denied");
        assert!(err.is_forbidden());

        let alice = store
            .impersonate(&user("alice@example.com"))
            .expect("impersonation succeeds");
        alice
            .get::<UserSSHKey>(None, "key")
            .await
            .expect("alice may read");
        store
            .get::<UserSSHKey>(None, "key")
            .await
            .expect("the privileged store may read");
    }

    #[tokio::test]
    async fn write_only_access() {
        let store = InMemoryStore::new();
        store.deny_get::<UserSSHKey>("bob@example.com").await;
        let bob = store
            .impersonate(&user("bob@example.com"))
            .expect("impersonation succeeds");

        bob.create(&UserSSHKey::new("key", SshKeySpec::default()))
            .await
            .expect("bob may create");
        let keys: Vec<UserSSHKey> = bob
            .list(None, &Selector::default())
            .await
            .expect("bob may list");
        assert_eq!(keys.len(), 1);
        let err = bob
            .get::<UserSSHKey>(None, "key")
            .await
            .expect_err("bob may not get");
        assert!(err.is_forbidden());
    }

    #[tokio::test]
    async fn merge_patch_and_namespaced_listing() {
        let store = InMemoryStore::new();
        let mut addon = Addon::new("dns", AddonSpec::default());
        addon.metadata.namespace = Some("cluster-a".to_owned());
        store.insert(addon.clone()).await.expect("insert succeeds");
        addon.metadata.namespace = Some("cluster-b".to_owned());
        store.insert(addon.clone()).await.expect("insert succeeds");

        let patched = store
            .patch(
                &addon,
                &serde_json::json!({"metadata": {"labels": {"a": "b"}}, "spec": {"isDefault": true}}),
            )
            .await
            .expect("patch succeeds");
        assert!(patched.spec.is_default);

        let all: Vec<Addon> = store
            .list(None, &Selector::default())
            .await
            .expect("list succeeds");
        assert_eq!(all.len(), 2);
        let labelled: Vec<Addon> = store
            .list(Some("cluster-b"), &Selector::default().with("a", "b"))
            .await
            .expect("list succeeds");
        assert_eq!(labelled.len(), 1);
        let none: Vec<Addon> = store
            .list(Some("cluster-a"), &Selector::default().with("a", "b"))
            .await
            .expect("list succeeds");
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn finalizers_delay_deletion() {
        let store = InMemoryStore::new();
        let mut key = UserSSHKey::new("key", SshKeySpec::default());
        key.metadata.finalizers = Some(vec!["cleanup".to_owned()]);
        store.insert(key).await.expect("insert succeeds");

        store
            .delete::<UserSSHKey>(None, "key")
            .await
            .expect("delete succeeds");
        let stored: UserSSHKey = store.get(None, "key").await.expect("still present");
        assert!(stored.metadata.deletion_timestamp.is_some());

        store
            .insert(UserSSHKey::new("plain", SshKeySpec::default()))
            .await
            .expect("insert succeeds");
        store
            .delete::<UserSSHKey>(None, "plain")
            .await
            .expect("delete succeeds");
        assert_eq!(store.count::<UserSSHKey>().await, 1);
    }
}
