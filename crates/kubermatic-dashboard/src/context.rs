use std::sync::Arc;

use kubermatic_crd::{configuration::KubermaticConfiguration, seed::Seed};

use crate::{
    aws::InstanceTypeCatalog,
    mutation::MutationRegistry,
    options::ReadinessPolicy,
    store::{self, ObjectStore, Selector, resource_name},
    usercluster::UserClusterConnector,
};

/// Everything a handler needs, shared by all requests.
///
/// `store` acts with the server's own identity. Handlers derive the store for the caller through
/// [`crate::auth::authorize`].
#[derive(Clone)]
pub struct Context<S> {
    pub store: S,
    pub kubermatic_namespace: String,
    pub user_clusters: Arc<dyn UserClusterConnector>,
    pub instance_types: Option<Arc<InstanceTypeCatalog>>,
    pub mutations: Arc<MutationRegistry>,
    pub share_kubeconfig: bool,
    pub readiness: ReadinessPolicy,
}

impl<S: ObjectStore> Context<S> {
    pub fn new(
        store: S,
        kubermatic_namespace: impl Into<String>,
        user_clusters: Arc<dyn UserClusterConnector>,
    ) -> Self {
        Self {
            store,
            kubermatic_namespace: kubermatic_namespace.into(),
            user_clusters,
            instance_types: None,
            mutations: Arc::new(MutationRegistry::default()),
            share_kubeconfig: false,
            readiness: ReadinessPolicy::default(),
        }
    }

    /// The global configuration. Exactly one is expected in the kubermatic namespace.
    pub async fn configuration(&self) -> store::Result<KubermaticConfiguration> {
        let configurations: Vec<KubermaticConfiguration> = self
            .store
            .list(Some(&self.kubermatic_namespace), &Selector::default())
            .await?;
        configurations
            .into_iter()
            .next()
            .ok_or_else(|| store::Error::NotFound {
                resource: resource_name::<KubermaticConfiguration>(),
                name: self.kubermatic_namespace.clone(),
            })
    }

    pub async fn seeds(&self) -> store::Result<Vec<Seed>> {
        self.store
            .list(Some(&self.kubermatic_namespace), &Selector::default())
            .await
    }
}
