//! Access to the workload ("user") clusters and to their control plane namespace on the seed.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::{
    api::core::v1::{Namespace, Node, Secret},
    apimachinery::pkg::api::resource::Quantity,
};
use kube::{
    Api, Client, Config,
    api::{ApiResource, DynamicObject, GroupVersionKind, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
};
use kubermatic_crd::{cluster::Cluster, machine::MachineDeployment};
use serde::Deserialize;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::error::HttpError;

/// Secret in the cluster namespace holding the admin kubeconfig of the user cluster.
pub const ADMIN_KUBECONFIG_SECRET: &str = "admin-kubeconfig";
const KUBECONFIG_KEY: &str = "kubeconfig";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read the admin kubeconfig of cluster {cluster:?}"))]
    ReadKubeconfig { source: kube::Error, cluster: String },

    #[snafu(display("the admin kubeconfig of cluster {cluster:?} is missing"))]
    MissingKubeconfig { cluster: String },

    #[snafu(display("the admin kubeconfig of cluster {cluster:?} is invalid"))]
    InvalidKubeconfig {
        source: kube::config::KubeconfigError,
        cluster: String,
    },

    #[snafu(display("failed to create a client for cluster {cluster:?}"))]
    CreateClient { source: kube::Error, cluster: String },

    #[snafu(display("failed to list {resource} of cluster {cluster:?}"))]
    List {
        source: kube::Error,
        resource: String,
        cluster: String,
    },

    #[snafu(display("failed to decode {resource} of cluster {cluster:?}"))]
    Decode {
        source: serde_json::Error,
        resource: String,
        cluster: String,
    },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        Self::internal_from(&err)
    }
}

/// Current usage of one node, as reported by the metrics API.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct NodeMetrics {
    pub metadata: kube::api::ObjectMeta,
    #[serde(default)]
    pub usage: BTreeMap<String, Quantity>,
}

/// Current usage of one pod, as reported by the metrics API.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct PodMetrics {
    pub metadata: kube::api::ObjectMeta,
    #[serde(default)]
    pub containers: Vec<ContainerMetrics>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ContainerMetrics {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub usage: BTreeMap<String, Quantity>,
}

/// Reads resources living inside a user cluster, or in its namespace on the seed.
///
/// Metrics are optional: while the metrics API is not installed the lists are empty.
#[async_trait]
pub trait UserClusterConnector: Send + Sync {
    async fn machine_deployments(&self, cluster: &Cluster) -> Result<Vec<MachineDeployment>>;

    async fn nodes(&self, cluster: &Cluster) -> Result<Vec<Node>>;

    async fn node_metrics(&self, cluster: &Cluster) -> Result<Vec<NodeMetrics>>;

    async fn namespaces(&self, cluster: &Cluster) -> Result<Vec<String>>;

    /// Usage of the control plane pods in the cluster namespace on the seed.
    async fn control_plane_metrics(&self, cluster: &Cluster) -> Result<Vec<PodMetrics>>;
}

/// Connects to user clusters with the admin kubeconfig stored on the seed.
#[derive(Clone)]
pub struct KubeUserClusters {
    seed: Client,
}

impl KubeUserClusters {
    pub fn new(seed: Client) -> Self {
        Self { seed }
    }

    async fn client_for(&self, cluster: &Cluster) -> Result<Client> {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        let secrets: Api<Secret> = Api::namespaced(self.seed.clone(), &cluster.namespace_name());
        let secret = secrets
            .get(ADMIN_KUBECONFIG_SECRET)
            .await
            .context(ReadKubeconfigSnafu { cluster: &name })?;

        let raw = secret
            .data
            .as_ref()
            .and_then(|data| data.get(KUBECONFIG_KEY))
            .and_then(|value| std::str::from_utf8(&value.0).ok())
            .context(MissingKubeconfigSnafu { cluster: &name })?;
        let kubeconfig =
            Kubeconfig::from_yaml(raw).context(InvalidKubeconfigSnafu { cluster: &name })?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .context(InvalidKubeconfigSnafu { cluster: &name })?;
        Client::try_from(config).context(CreateClientSnafu { cluster: name })
    }
}

fn metrics_resource(kind: &str, plural: &str) -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("metrics.k8s.io", "v1beta1", kind),
        plural,
    )
}

/// Lists metrics objects, treating a missing metrics API as "no metrics yet".
async fn list_metrics<T: for<'de> Deserialize<'de>>(
    api: Api<DynamicObject>,
    resource: &str,
    cluster: &str,
) -> Result<Vec<T>> {
    let objects = match api.list(&ListParams::default()).await {
        Ok(list) => list.items,
        Err(kube::Error::Api(status)) if status.code == 404 => return Ok(Vec::new()),
        Err(source) => {
            return Err(Error::List {
                source,
                resource: resource.to_owned(),
                cluster: cluster.to_owned(),
            });
        }
    };

    objects
        .into_iter()
        .map(|object| {
            serde_json::to_value(object)
                .and_then(serde_json::from_value)
                .context(DecodeSnafu { resource, cluster })
        })
        .collect()
}

#[async_trait]
impl UserClusterConnector for KubeUserClusters {
    async fn machine_deployments(&self, cluster: &Cluster) -> Result<Vec<MachineDeployment>> {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        let api: Api<MachineDeployment> =
            Api::namespaced(self.client_for(cluster).await?, "kube-system");
        let list = api.list(&ListParams::default()).await.context(ListSnafu {
            resource: "machinedeployments",
            cluster: name,
        })?;
        Ok(list.items)
    }

    async fn nodes(&self, cluster: &Cluster) -> Result<Vec<Node>> {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        let api: Api<Node> = Api::all(self.client_for(cluster).await?);
        let list = api.list(&ListParams::default()).await.context(ListSnafu {
            resource: "nodes",
            cluster: name,
        })?;
        Ok(list.items)
    }

    async fn node_metrics(&self, cluster: &Cluster) -> Result<Vec<NodeMetrics>> {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        let api = Api::all_with(
            self.client_for(cluster).await?,
            &metrics_resource("NodeMetrics", "nodes"),
        );
        list_metrics(api, "node metrics", &name).await
    }

    async fn namespaces(&self, cluster: &Cluster) -> Result<Vec<String>> {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        let api: Api<Namespace> = Api::all(self.client_for(cluster).await?);
        let list = api.list(&ListParams::default()).await.context(ListSnafu {
            resource: "namespaces",
            cluster: name,
        })?;
        Ok(list
            .items
            .into_iter()
            .filter_map(|namespace| namespace.metadata.name)
            .collect())
    }

    async fn control_plane_metrics(&self, cluster: &Cluster) -> Result<Vec<PodMetrics>> {
        let name = cluster.metadata.name.clone().unwrap_or_default();
        let api = Api::namespaced_with(
            self.seed.clone(),
            &cluster.namespace_name(),
            &metrics_resource("PodMetrics", "pods"),
        );
        list_metrics(api, "pod metrics", &name).await
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    /// Serves the same canned resources for every cluster.
    #[derive(Clone, Debug, Default)]
    pub(crate) struct StaticUserClusters {
        pub machine_deployments: Vec<MachineDeployment>,
        pub nodes: Vec<Node>,
        pub node_metrics: Vec<NodeMetrics>,
        pub namespaces: Vec<String>,
        pub control_plane_metrics: Vec<PodMetrics>,
    }

    #[async_trait]
    impl UserClusterConnector for StaticUserClusters {
        async fn machine_deployments(&self, _: &Cluster) -> Result<Vec<MachineDeployment>> {
            Ok(self.machine_deployments.clone())
        }

        async fn nodes(&self, _: &Cluster) -> Result<Vec<Node>> {
            Ok(self.nodes.clone())
        }

        async fn node_metrics(&self, _: &Cluster) -> Result<Vec<NodeMetrics>> {
            Ok(self.node_metrics.clone())
        }

        async fn namespaces(&self, _: &Cluster) -> Result<Vec<String>> {
            Ok(self.namespaces.clone())
        }

        async fn control_plane_metrics(&self, _: &Cluster) -> Result<Vec<PodMetrics>> {
            Ok(self.control_plane_metrics.clone())
        }
    }
}
