//! Resource usage of a user cluster, aggregated from the metrics API.

use std::collections::BTreeMap;

use k8s_openapi::{
    api::core::v1::Node, apimachinery::pkg::api::resource::Quantity as K8sQuantity,
};
use kubermatic_apiv1::metrics::{ClusterMetrics, ControlPlaneMetrics, NodesMetric};
use kubermatic_crd::cluster::Cluster;
use snafu::{ResultExt, Snafu, ensure};

use crate::{
    error::HttpError,
    quantity::{ParseQuantityError, Quantity},
    usercluster::{self, NodeMetrics, PodMetrics, UserClusterConnector},
};

const CPU: &str = "cpu";
const MEMORY: &str = "memory";
const MIB: i64 = 1024 * 1024;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("no nodes found"))]
    NoNodes,

    #[snafu(display("invalid {resource} quantity of {object:?}"))]
    InvalidQuantity {
        source: ParseQuantityError,
        resource: String,
        object: String,
    },

    #[snafu(transparent)]
    UserCluster { source: usercluster::Error },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        match err {
            Error::NoNodes => Self::not_found(err.to_string()),
            Error::UserCluster { source } => source.into(),
            Error::InvalidQuantity { .. } => Self::internal_from(&err),
        }
    }
}

/// Fetches nodes and usage of `cluster` and sums them up.
pub async fn cluster_metrics(
    clusters: &dyn UserClusterConnector,
    cluster: &Cluster,
) -> Result<ClusterMetrics> {
    let nodes = clusters.nodes(cluster).await?;
    ensure!(!nodes.is_empty(), NoNodesSnafu);

    let node_metrics = clusters.node_metrics(cluster).await?;
    let control_plane = clusters.control_plane_metrics(cluster).await?;
    aggregate(
        cluster.metadata.name.as_deref().unwrap_or_default(),
        &nodes,
        &node_metrics,
        &control_plane,
    )
}

/// Sums up node and control plane usage.
///
/// Only nodes which report both allocatable CPU and memory are counted.
pub fn aggregate(
    name: &str,
    nodes: &[Node],
    node_metrics: &[NodeMetrics],
    control_plane: &[PodMetrics],
) -> Result<ClusterMetrics> {
    let allocatable: BTreeMap<&str, &BTreeMap<String, K8sQuantity>> = nodes
        .iter()
        .filter_map(|node| {
            let name = node.metadata.name.as_deref()?;
            let allocatable = node.status.as_ref()?.allocatable.as_ref()?;
            Some((name, allocatable))
        })
        .collect();

    let mut nodes_metrics = NodesMetric::default();
    for metrics in node_metrics {
        let node = metrics.metadata.name.as_deref().unwrap_or_default();
        let Some(available) = allocatable.get(node) else {
            continue;
        };
        let (Some(available_cpu), Some(available_memory)) = (available.get(CPU), available.get(MEMORY))
        else {
            continue;
        };

        nodes_metrics.cpu_total_millicores += parse(metrics.usage.get(CPU), CPU, node)?.milli_value();
        nodes_metrics.cpu_available_millicores += parse(Some(available_cpu), CPU, node)?.milli_value();
        nodes_metrics.memory_total_bytes += parse(metrics.usage.get(MEMORY), MEMORY, node)?.value() / MIB;
        nodes_metrics.memory_available_bytes += parse(Some(available_memory), MEMORY, node)?.value() / MIB;
    }
    nodes_metrics.cpu_used_percentage = percentage(
        nodes_metrics.cpu_total_millicores,
        nodes_metrics.cpu_available_millicores,
    );
    nodes_metrics.memory_used_percentage = percentage(
        nodes_metrics.memory_total_bytes,
        nodes_metrics.memory_available_bytes,
    );

    let mut control_plane_metrics = ControlPlaneMetrics::default();
    for pod in control_plane {
        let pod_name = pod.metadata.name.as_deref().unwrap_or_default();
        for container in &pod.containers {
            control_plane_metrics.cpu_total_millicores +=
                parse(container.usage.get(CPU), CPU, pod_name)?.milli_value();
            control_plane_metrics.memory_total_bytes +=
                parse(container.usage.get(MEMORY), MEMORY, pod_name)?.value() / MIB;
        }
    }

    Ok(ClusterMetrics {
        name: name.to_owned(),
        nodes_metrics,
        control_plane_metrics,
    })
}

/// A missing quantity counts as zero.
fn parse(quantity: Option<&K8sQuantity>, resource: &str, object: &str) -> Result<Quantity> {
    quantity.map_or(Ok(Quantity::default()), |quantity| {
        Quantity::try_from(quantity).context(InvalidQuantitySnafu { resource, object })
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn percentage(used: i64, capacity: i64) -> i64 {
    if capacity == 0 {
        return 0;
    }
    (used as f64 / capacity as f64 * 100.0) as i64
}
