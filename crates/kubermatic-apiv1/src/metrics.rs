use serde::{Deserialize, Serialize};

/// Resource usage of a user cluster.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterMetrics {
    pub name: String,
    pub nodes_metrics: NodesMetric,
    pub control_plane_metrics: ControlPlaneMetrics,
}

/// Aggregated usage of all nodes. Memory is in MiB, CPU in millicores.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodesMetric {
    pub memory_total_bytes: i64,
    pub memory_available_bytes: i64,
    pub memory_used_percentage: i64,
    pub cpu_total_millicores: i64,
    pub cpu_available_millicores: i64,
    pub cpu_used_percentage: i64,
}

/// Usage of the control plane pods on the seed.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneMetrics {
    pub memory_total_bytes: i64,
    pub cpu_total_millicores: i64,
}

/// A namespace of a user cluster.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Namespace {
    pub name: String,
}
