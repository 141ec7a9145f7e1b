//! Well-known label, annotation, finalizer and feature keys.

/// Label carrying the owning project of a cluster.
pub const PROJECT_ID_LABEL: &str = "project-id";

/// Label added to machine deployments by the machine controller.
pub const WORKER_NAME_LABEL: &str = "worker-name";

/// Labels with this prefix are managed by the platform and hidden from users.
pub const SYSTEM_LABEL_PREFIX: &str = "system/";

/// Label marking a cluster whose credentials come from a preset.
pub const IS_CREDENTIAL_PRESET_LABEL: &str = "is-credential-preset";

/// Annotation naming the preset a cluster's credentials were taken from.
pub const PRESET_NAME_ANNOTATION: &str = "presetName";

/// Annotation set once the linked preset has been invalidated.
pub const PRESET_INVALIDATED_ANNOTATION: &str = "presetInvalidated";

pub const INITIAL_MACHINE_DEPLOYMENT_REQUEST_ANNOTATION: &str =
    "kubermatic.io/initial-machinedeployment-request";
pub const INITIAL_APPLICATION_INSTALLATIONS_REQUEST_ANNOTATION: &str =
    "kubermatic.io/initial-application-installations-request";
pub const INITIAL_CNI_VALUES_REQUEST_ANNOTATION: &str = "kubermatic.io/initial-cni-values-request";

/// Annotation set on applications that users may not remove.
pub const APPLICATION_ENFORCED_ANNOTATION: &str = "apps.kubermatic.k8c.io/enforced";

/// Label controlling whether the addon controller keeps reconciling an addon.
pub const ADDON_ENSURE_LABEL: &str = "addons.kubermatic.io/ensure";

pub const NODE_DELETION_FINALIZER: &str = "kubermatic.k8c.io/delete-nodes";
pub const IN_CLUSTER_LB_CLEANUP_FINALIZER: &str = "kubermatic.k8c.io/cleanup-in-cluster-lb";
pub const IN_CLUSTER_PV_CLEANUP_FINALIZER: &str = "kubermatic.k8c.io/cleanup-in-cluster-pv";

/// Cluster feature switching the cluster to the external cloud controller manager.
pub const CLUSTER_FEATURE_EXTERNAL_CLOUD_PROVIDER: &str = "externalCloudProvider";

/// Cluster feature recording that the vSphere CSI driver uses the cluster ID.
pub const CLUSTER_FEATURE_VSPHERE_CSI_CLUSTER_ID: &str = "vsphereCSIClusterID";

/// Annotations marking a pending in-tree to external CCM/CSI migration.
pub const CCM_MIGRATION_NEEDED_ANNOTATION: &str = "ccm-migration.k8c.io/migration-needed";
pub const CSI_MIGRATION_NEEDED_ANNOTATION: &str = "csi-migration.k8c.io/migration-needed";

/// Cluster condition which is `True` once every kubelet finished the CSI migration.
pub const CSI_KUBELET_MIGRATION_COMPLETED_CONDITION: &str = "CSIKubeletMigrationCompleted";

/// Cluster condition which is `True` once the cluster's RBAC bindings are in place.
pub const CLUSTER_CONDITION_CLUSTER_INITIALIZED: &str = "ClusterInitialized";

/// Cluster namespaces on the seed are named after the cluster.
pub fn cluster_namespace(cluster_name: &str) -> String {
    format!("cluster-{cluster_name}")
}
