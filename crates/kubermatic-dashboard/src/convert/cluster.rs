//! Mapping between the stored `Cluster` resource and its external shape.

use std::collections::BTreeMap;

use kubermatic_apiv1::{
    ObjectMeta,
    cluster::{
        Cluster, ClusterHealth, ClusterSpec, ClusterStatus, ExternalCcmMigrationStatus,
        KUBERNETES_CLUSTER_TYPE,
    },
};
use kubermatic_crd::{
    Semver,
    cloud::ProviderType,
    cluster::{self as internal, ExtendedClusterHealth},
    configuration::{ConditionType, Incompatibility, OperationType},
    constants,
};

/// Providers which can run the external cloud controller manager.
pub const EXTERNAL_CCM_PROVIDERS: [ProviderType; 10] = [
    ProviderType::Openstack,
    ProviderType::Hetzner,
    ProviderType::Vsphere,
    ProviderType::Anexia,
    ProviderType::Azure,
    ProviderType::Aws,
    ProviderType::Gcp,
    ProviderType::Kubevirt,
    ProviderType::Digitalocean,
    ProviderType::Vmwareclouddirector,
];

/// Converts a stored cluster into its external shape.
///
/// Labels with the system prefix are dropped when `filter_system_labels` is set. The merge-patch
/// path passes `false` so every label survives the round trip.
pub fn to_external(
    cluster: &internal::Cluster,
    incompatibilities: &[Incompatibility],
    filter_system_labels: bool,
) -> Cluster {
    let meta = &cluster.metadata;
    let annotations = meta.annotations.clone().unwrap_or_default();
    let credential = annotations
        .get(constants::PRESET_NAME_ANNOTATION)
        .cloned()
        .unwrap_or_default();

    let labels = meta
        .labels
        .iter()
        .flatten()
        .filter(|(key, _)| {
            !filter_system_labels || !key.starts_with(constants::SYSTEM_LABEL_PREFIX)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let status = cluster.status.clone().unwrap_or_default();

    Cluster {
        metadata: ObjectMeta {
            id: meta.name.clone().unwrap_or_default(),
            name: cluster.spec.human_readable_name.clone(),
            annotations,
            creation_timestamp: meta.creation_timestamp.clone(),
            deletion_timestamp: meta.deletion_timestamp.clone(),
        },
        labels,
        inherited_labels: status.inherited_labels,
        type_: KUBERNETES_CLUSTER_TYPE.to_owned(),
        credential,
        spec: spec_to_external(&cluster.spec),
        status: ClusterStatus {
            version: status.versions.control_plane,
            url: status.address.url,
            external_ccm_migration: external_ccm_migration_status(
                cluster
                    .spec
                    .feature_enabled(constants::CLUSTER_FEATURE_EXTERNAL_CLOUD_PROVIDER),
                migration_supported(cluster, incompatibilities),
                migration_pending(cluster),
            ),
        },
        machine_deployment_count: None,
    }
}

pub fn spec_to_external(spec: &internal::ClusterSpec) -> ClusterSpec {
    ClusterSpec {
        cloud: spec.cloud.clone(),
        machine_networks: spec.machine_networks.clone(),
        cluster_network: Some(spec.cluster_network.clone()),
        cni_plugin: spec.cni_plugin.clone(),
        version: Some(spec.version.clone()),
        oidc: spec.oidc.clone(),
        update_window: spec.update_window.clone(),
        use_pod_security_policy_admission_plugin: spec.use_pod_security_policy_admission_plugin,
        use_pod_node_selector_admission_plugin: spec.use_pod_node_selector_admission_plugin,
        use_event_rate_limit_admission_plugin: spec.use_event_rate_limit_admission_plugin,
        enable_user_ssh_key_agent: spec.enable_user_ssh_key_agent,
        kubernetes_dashboard: spec.kubernetes_dashboard.clone(),
        audit_logging: spec.audit_logging.clone(),
        admission_plugins: spec.admission_plugins.clone(),
        opa_integration: spec.opa_integration.clone(),
        service_account: spec.service_account.clone(),
        mla: spec.mla.clone(),
        container_runtime: spec.container_runtime.clone(),
        event_rate_limit_config: spec.event_rate_limit_config.clone(),
        pod_node_selector_admission_plugin_config: spec
            .pod_node_selector_admission_plugin_config
            .clone(),
        api_server_allowed_ip_ranges: spec.api_server_allowed_ip_ranges.clone(),
        expose_strategy: spec.expose_strategy,
        backup_config: spec.backup_config.clone(),
        kubelb: spec.kubelb.clone(),
        disable_csi_driver: spec.disable_csi_driver,
        kyverno: spec.kyverno.clone(),
    }
}

/// Builds the stored spec of a new cluster from the request body.
///
/// `version` has already been checked to be present by the caller.
pub fn spec_to_internal(
    human_readable_name: &str,
    spec: ClusterSpec,
    version: Semver,
) -> internal::ClusterSpec {
    internal::ClusterSpec {
        human_readable_name: human_readable_name.to_owned(),
        version,
        cloud: spec.cloud,
        cluster_network: spec.cluster_network.unwrap_or_default(),
        machine_networks: spec.machine_networks,
        expose_strategy: spec.expose_strategy,
        api_server_allowed_ip_ranges: spec.api_server_allowed_ip_ranges,
        oidc: spec.oidc,
        features: BTreeMap::new(),
        update_window: spec.update_window,
        use_pod_security_policy_admission_plugin: spec.use_pod_security_policy_admission_plugin,
        use_pod_node_selector_admission_plugin: spec.use_pod_node_selector_admission_plugin,
        use_event_rate_limit_admission_plugin: spec.use_event_rate_limit_admission_plugin,
        enable_user_ssh_key_agent: spec.enable_user_ssh_key_agent,
        kubernetes_dashboard: spec.kubernetes_dashboard,
        kubelb: spec.kubelb,
        admission_plugins: spec.admission_plugins,
        pod_node_selector_admission_plugin_config: spec.pod_node_selector_admission_plugin_config,
        event_rate_limit_config: spec.event_rate_limit_config,
        audit_logging: spec.audit_logging,
        opa_integration: spec.opa_integration,
        service_account: spec.service_account,
        mla: spec.mla,
        container_runtime: spec.container_runtime,
        cni_plugin: spec.cni_plugin,
        backup_config: spec.backup_config,
        disable_csi_driver: spec.disable_csi_driver,
        kyverno: spec.kyverno,
    }
}

/// Copies the user editable fields of `patched` onto a copy of `current`.
///
/// Identity, resource version, status and feature flags always come from `current`. Of the
/// cluster network only the konnectivity switch and the proxy mode can be changed. Without a
/// version in `patched` the current version is kept.
pub fn apply_patched(current: &internal::Cluster, patched: Cluster) -> internal::Cluster {
    let mut cluster = current.clone();
    let spec = &mut cluster.spec;
    let new = patched.spec;

    spec.human_readable_name = patched.metadata.name;
    cluster.metadata.labels = (!patched.labels.is_empty()).then_some(patched.labels);
    cluster.metadata.annotations =
        (!patched.metadata.annotations.is_empty()).then_some(patched.metadata.annotations);

    spec.cloud = new.cloud;
    spec.machine_networks = new.machine_networks;
    if let Some(version) = new.version {
        spec.version = version;
    }
    spec.oidc = new.oidc;
    spec.use_pod_security_policy_admission_plugin = new.use_pod_security_policy_admission_plugin;
    spec.use_pod_node_selector_admission_plugin = new.use_pod_node_selector_admission_plugin;
    spec.use_event_rate_limit_admission_plugin = new.use_event_rate_limit_admission_plugin;
    spec.admission_plugins = new.admission_plugins;
    spec.audit_logging = new.audit_logging;
    spec.update_window = new.update_window;
    spec.opa_integration = new.opa_integration;
    spec.pod_node_selector_admission_plugin_config = new.pod_node_selector_admission_plugin_config;
    spec.event_rate_limit_config = new.event_rate_limit_config;
    spec.service_account = new.service_account;
    spec.mla = new.mla;
    spec.container_runtime = new.container_runtime;
    if let Some(network) = new.cluster_network {
        spec.cluster_network.konnectivity_enabled = network.konnectivity_enabled;
        spec.cluster_network.proxy_mode = network.proxy_mode;
    }
    spec.cni_plugin = new.cni_plugin;
    spec.expose_strategy = new.expose_strategy;
    spec.backup_config = new.backup_config;
    spec.kubernetes_dashboard = new.kubernetes_dashboard;
    spec.api_server_allowed_ip_ranges = new.api_server_allowed_ip_ranges;
    spec.kubelb = new.kubelb;
    spec.disable_csi_driver = new.disable_csi_driver;
    spec.kyverno = new.kyverno;
    cluster
}

pub fn health_to_external(health: &ExtendedClusterHealth) -> ClusterHealth {
    ClusterHealth {
        apiserver: health.apiserver,
        application_controller: health.application_controller,
        scheduler: health.scheduler,
        controller: health.controller,
        machine_controller: health.machine_controller,
        etcd: health.etcd,
        cloud_provider_infrastructure: health.cloud_provider_infrastructure,
        user_cluster_controller_manager: health.user_cluster_controller_manager,
        gatekeeper_controller: health.gatekeeper_controller,
        gatekeeper_audit: health.gatekeeper_audit,
        monitoring: health.monitoring,
        logging: health.logging,
        alertmanager_config: health.alertmanager_config,
        mla_gateway: health.mla_gateway,
        operating_system_manager: health.operating_system_manager,
        kubernetes_dashboard: health.kubernetes_dashboard,
        kubelb: health.kubelb,
    }
}

pub fn external_ccm_migration_status(
    enabled: bool,
    supported: bool,
    pending: bool,
) -> ExternalCcmMigrationStatus {
    match (enabled, pending) {
        (true, true) => ExternalCcmMigrationStatus::InProgress,
        (true, false) => ExternalCcmMigrationStatus::NotNeeded,
        (false, _) if supported => ExternalCcmMigrationStatus::Supported,
        (false, _) => ExternalCcmMigrationStatus::Unsupported,
    }
}

/// Whether the provider of `cluster` can run the external CCM at the cluster's version.
pub fn migration_supported(
    cluster: &internal::Cluster,
    incompatibilities: &[Incompatibility],
) -> bool {
    let Ok(Some(provider)) = cluster.spec.cloud.provider_name() else {
        return false;
    };
    EXTERNAL_CCM_PROVIDERS.contains(&provider)
        && !incompatibilities.iter().any(|incompatibility| {
            incompatibility.condition == ConditionType::ExternalCloudProvider
                && incompatibility.operation == OperationType::Support
                && incompatibility.provider.is_none_or(|p| p == provider)
                && version_matches(&incompatibility.version, &cluster.spec.version)
        })
}

/// Both migration annotations are set and the kubelets have not finished migrating yet.
pub fn migration_pending(cluster: &internal::Cluster) -> bool {
    let annotated = cluster.metadata.annotations.as_ref().is_some_and(|annotations| {
        annotations.contains_key(constants::CCM_MIGRATION_NEEDED_ANNOTATION)
            && annotations.contains_key(constants::CSI_MIGRATION_NEEDED_ANNOTATION)
    });
    annotated && !cluster.condition_true(constants::CSI_KUBELET_MIGRATION_COMPLETED_CONDITION)
}

/// Matches `version` against a semver constraint such as `>= 1.29` or `1.27.*`.
pub fn version_matches(constraint: &str, version: &Semver) -> bool {
    match semver::VersionReq::parse(constraint) {
        Ok(requirement) => requirement.matches(version.inner()),
        Err(error) => {
            tracing::warn!(constraint, %error, "ignoring unparsable version constraint");
            false
        }
    }
}
