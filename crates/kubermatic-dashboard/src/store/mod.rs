//! Typed access to the resources persisted in the Kubernetes API server.
//!
//! Handlers never talk to Kubernetes directly. They receive an [`ObjectStore`] which either acts
//! with the server's own (privileged) identity or, after [`ObjectStore::impersonate`], with the
//! identity of the calling user so that the API server enforces RBAC.

use std::{collections::BTreeMap, fmt::Debug};

use async_trait::async_trait;
use itertools::Itertools;
use kube::Resource;
use serde::{Serialize, de::DeserializeOwned};
use snafu::Snafu;

use crate::auth::UserInfo;

mod kube_store;
mod memory;

pub use kube_store::KubeStore;
pub use memory::InMemoryStore;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{resource} {name:?} not found"))]
    NotFound { resource: String, name: String },

    #[snafu(display("{resource} {name:?} already exists"))]
    AlreadyExists { resource: String, name: String },

    #[snafu(display("operation cannot be fulfilled on {resource} {name:?}: {message}"))]
    Conflict {
        resource: String,
        name: String,
        message: String,
    },

    #[snafu(display("{message}"))]
    Forbidden { message: String },

    #[snafu(display("{message}"))]
    Invalid { message: String },

    #[snafu(display("failed to build a client impersonating {user:?}"))]
    Impersonate { source: kube::Error, user: String },

    #[snafu(display("request to the Kubernetes API server failed"))]
    Request { source: kube::Error },

    #[snafu(display("failed to convert {resource}"))]
    Serialization {
        source: serde_json::Error,
        resource: String,
    },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }
}

/// Any custom or built-in resource the store can handle.
pub trait Object:
    Resource<DynamicType = ()> + Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<K> Object for K where
    K: Resource<DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

/// The fully qualified resource name used in error messages, e.g. `clusters.kubermatic.k8c.io`.
pub fn resource_name<K: Object>() -> String {
    let group = K::group(&());
    let plural = K::plural(&());
    if group.is_empty() {
        plural.into_owned()
    } else {
        format!("{plural}.{group}")
    }
}

/// An equality based label selector. The default selects everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selector(BTreeMap<String, String>);

impl Selector {
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.0
            .iter()
            .all(|(key, value)| labels.and_then(|l| l.get(key)) == Some(value))
    }

    /// The selector in the `key=value,..` syntax of the Kubernetes API.
    pub fn to_query(&self) -> Option<String> {
        (!self.0.is_empty()).then(|| {
            self.0
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .join(",")
        })
    }
}

/// Get, list, create, update, patch and delete typed resources.
///
/// `namespace` is `None` for cluster scoped resources. Updates are full replacements and fail with
/// [`Error::Conflict`] when the object's resource version is stale; nothing is retried.
#[async_trait]
pub trait ObjectStore: Clone + Send + Sync + 'static {
    async fn get<K: Object>(&self, namespace: Option<&str>, name: &str) -> Result<K>;

    async fn list<K: Object>(&self, namespace: Option<&str>, selector: &Selector)
    -> Result<Vec<K>>;

    async fn create<K: Object>(&self, object: &K) -> Result<K>;

    async fn update<K: Object>(&self, object: &K) -> Result<K>;

    /// Applies a JSON merge patch to the stored object.
    async fn patch<K: Object>(&self, object: &K, patch: &serde_json::Value) -> Result<K>;

    async fn delete<K: Object>(&self, namespace: Option<&str>, name: &str) -> Result<()>;

    /// Returns a store acting as `user`, whose requests are subject to the user's RBAC rights.
    fn impersonate(&self, user: &UserInfo) -> Result<Self>;
}
