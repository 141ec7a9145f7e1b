//! Create and update hooks adjusting a cluster before it is validated and stored.
//!
//! Hooks are registered either for every cluster or for a single cloud provider. The
//! [`Default`] registry carries the platform defaults.

use std::collections::BTreeMap;

use kubermatic_crd::{
    cloud::ProviderType,
    cluster::{AuditLoggingSettings, Cluster, ExposeStrategy, IpvsConfiguration},
    configuration::KubermaticConfigurationSpec,
    constants,
    seed::{self, Seed},
};
use snafu::{Snafu, ensure};

use crate::{convert::cluster::migration_supported, error::HttpError};

pub const DEFAULT_PODS_CIDR: &str = "172.25.0.0/16";
pub const DEFAULT_SERVICES_CIDR: &str = "10.240.16.0/20";
pub const DEFAULT_PODS_CIDR_KUBEVIRT: &str = "172.26.0.0/16";
pub const DEFAULT_SERVICES_CIDR_KUBEVIRT: &str = "10.241.0.0/20";
pub const DEFAULT_DNS_DOMAIN: &str = "cluster.local";
pub const DEFAULT_PROXY_MODE: &str = "ipvs";
pub const DEFAULT_CONTAINER_RUNTIME: &str = "containerd";

/// Feature gate required for the `Tunneling` expose strategy.
pub const TUNNELING_FEATURE_GATE: &str = "TunnelingExposeStrategy";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "cannot create cluster with Tunneling expose strategy because the {TUNNELING_FEATURE_GATE} feature gate is not enabled"
    ))]
    TunnelingDisabled,
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        Self::bad_request(err.to_string())
    }
}

/// What a hook may look at besides the cluster itself.
#[derive(Clone, Copy, Debug)]
pub struct MutationContext<'a> {
    pub seed: &'a Seed,
    pub datacenter: &'a seed::Datacenter,
    pub config: &'a KubermaticConfigurationSpec,
}

pub trait ClusterMutator: Send + Sync {
    fn mutate_create(&self, _cluster: &mut Cluster, _context: &MutationContext<'_>) -> Result<()> {
        Ok(())
    }

    fn mutate_update(
        &self,
        _old: &Cluster,
        _new: &mut Cluster,
        _context: &MutationContext<'_>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Runs the common hooks first, then the ones registered for the cluster's provider.
pub struct MutationRegistry {
    common: Vec<Box<dyn ClusterMutator>>,
    providers: BTreeMap<ProviderType, Vec<Box<dyn ClusterMutator>>>,
}

impl MutationRegistry {
    /// A registry without any hooks.
    pub fn empty() -> Self {
        Self {
            common: Vec::new(),
            providers: BTreeMap::new(),
        }
    }

    /// The platform defaults.
    pub fn with_defaults() -> Self {
        Self::empty()
            .register(NetworkDefaults)
            .register(ExposeStrategyDefault)
            .register(ContainerRuntimeDefault)
            .register(DatacenterEnforcements)
            .register(ExternalCloudProvider)
            .register_for(ProviderType::Hetzner, HetznerNetwork)
            .register_for(ProviderType::Vsphere, VsphereCsiClusterId)
    }

    pub fn register(mut self, mutator: impl ClusterMutator + 'static) -> Self {
        self.common.push(Box::new(mutator));
        self
    }

    pub fn register_for(
        mut self,
        provider: ProviderType,
        mutator: impl ClusterMutator + 'static,
    ) -> Self {
        self.providers
            .entry(provider)
            .or_default()
            .push(Box::new(mutator));
        self
    }

    fn hooks_for<'a>(&'a self, cluster: &Cluster) -> Vec<&'a dyn ClusterMutator> {
        let provider = cluster.spec.cloud.provider_name().ok().flatten();
        self.common
            .iter()
            .chain(provider.and_then(|p| self.providers.get(&p)).into_iter().flatten())
            .map(|hook| hook.as_ref())
            .collect()
    }

    pub fn mutate_create(&self, cluster: &mut Cluster, context: &MutationContext<'_>) -> Result<()> {
        for hook in self.hooks_for(cluster) {
            hook.mutate_create(cluster, context)?;
        }
        Ok(())
    }

    pub fn mutate_update(
        &self,
        old: &Cluster,
        new: &mut Cluster,
        context: &MutationContext<'_>,
    ) -> Result<()> {
        for hook in self.hooks_for(new) {
            hook.mutate_update(old, new, context)?;
        }
        Ok(())
    }
}

impl Default for MutationRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

struct NetworkDefaults;

impl ClusterMutator for NetworkDefaults {
    fn mutate_create(&self, cluster: &mut Cluster, _: &MutationContext<'_>) -> Result<()> {
        let kubevirt = cluster.spec.cloud.kubevirt.is_some();
        let network = &mut cluster.spec.cluster_network;
        if network.pods.cidr_blocks.is_empty() {
            let cidr = if kubevirt {
                DEFAULT_PODS_CIDR_KUBEVIRT
            } else {
                DEFAULT_PODS_CIDR
            };
            network.pods.cidr_blocks.push(cidr.to_owned());
        }
        if network.services.cidr_blocks.is_empty() {
            let cidr = if kubevirt {
                DEFAULT_SERVICES_CIDR_KUBEVIRT
            } else {
                DEFAULT_SERVICES_CIDR
            };
            network.services.cidr_blocks.push(cidr.to_owned());
        }
        if network.dns_domain.is_empty() {
            DEFAULT_DNS_DOMAIN.clone_into(&mut network.dns_domain);
        }
        if network.proxy_mode.is_empty() {
            DEFAULT_PROXY_MODE.clone_into(&mut network.proxy_mode);
        }
        if network.proxy_mode == DEFAULT_PROXY_MODE && network.ipvs.is_none() {
            network.ipvs = Some(IpvsConfiguration {
                strict_arp: Some(true),
            });
        }
        network.node_local_dns_cache_enabled.get_or_insert(true);
        network.konnectivity_enabled.get_or_insert(true);
        Ok(())
    }
}

struct ExposeStrategyDefault;

impl ClusterMutator for ExposeStrategyDefault {
    fn mutate_create(&self, cluster: &mut Cluster, context: &MutationContext<'_>) -> Result<()> {
        let strategy = *cluster.spec.expose_strategy.get_or_insert(
            context
                .seed
                .spec
                .expose_strategy
                .unwrap_or(ExposeStrategy::NodePort),
        );
        ensure!(
            strategy != ExposeStrategy::Tunneling
                || context.config.feature_gate(TUNNELING_FEATURE_GATE),
            TunnelingDisabledSnafu
        );
        Ok(())
    }
}

struct ContainerRuntimeDefault;

impl ClusterMutator for ContainerRuntimeDefault {
    fn mutate_create(&self, cluster: &mut Cluster, _: &MutationContext<'_>) -> Result<()> {
        if cluster.spec.container_runtime.is_empty() {
            DEFAULT_CONTAINER_RUNTIME.clone_into(&mut cluster.spec.container_runtime);
        }
        Ok(())
    }
}

/// Settings a datacenter forces on all of its clusters.
struct DatacenterEnforcements;

impl DatacenterEnforcements {
    fn enforce(cluster: &mut Cluster, datacenter: &seed::Datacenter) {
        let spec = &datacenter.spec;
        if spec.enforce_audit_logging {
            cluster
                .spec
                .audit_logging
                .get_or_insert_with(AuditLoggingSettings::default)
                .enabled = true;
        }
        if spec.enforce_pod_security_policy {
            cluster.spec.use_pod_security_policy_admission_plugin = true;
        }
        if spec.disable_csi_driver {
            cluster.spec.disable_csi_driver = true;
        }
    }
}

impl ClusterMutator for DatacenterEnforcements {
    fn mutate_create(&self, cluster: &mut Cluster, context: &MutationContext<'_>) -> Result<()> {
        Self::enforce(cluster, context.datacenter);
        Ok(())
    }

    fn mutate_update(
        &self,
        _: &Cluster,
        new: &mut Cluster,
        context: &MutationContext<'_>,
    ) -> Result<()> {
        Self::enforce(new, context.datacenter);
        Ok(())
    }
}

/// New clusters run the external CCM wherever it is supported. Switching it on later starts the
/// migration, which the seed controllers pick up through the annotations.
struct ExternalCloudProvider;

impl ClusterMutator for ExternalCloudProvider {
    fn mutate_create(&self, cluster: &mut Cluster, context: &MutationContext<'_>) -> Result<()> {
        if migration_supported(cluster, &context.config.versions.provider_incompatibilities) {
            cluster.spec.features.insert(
                constants::CLUSTER_FEATURE_EXTERNAL_CLOUD_PROVIDER.to_owned(),
                true,
            );
        }
        Ok(())
    }

    fn mutate_update(
        &self,
        old: &Cluster,
        new: &mut Cluster,
        _: &MutationContext<'_>,
    ) -> Result<()> {
        let feature = constants::CLUSTER_FEATURE_EXTERNAL_CLOUD_PROVIDER;
        if !old.spec.feature_enabled(feature) && new.spec.feature_enabled(feature) {
            let annotations = new.metadata.annotations.get_or_insert_with(BTreeMap::new);
            for annotation in [
                constants::CCM_MIGRATION_NEEDED_ANNOTATION,
                constants::CSI_MIGRATION_NEEDED_ANNOTATION,
            ] {
                annotations.insert(annotation.to_owned(), String::new());
            }
        }
        Ok(())
    }
}

struct HetznerNetwork;

impl ClusterMutator for HetznerNetwork {
    fn mutate_create(&self, cluster: &mut Cluster, context: &MutationContext<'_>) -> Result<()> {
        let dc_network = context
            .datacenter
            .spec
            .hetzner
            .as_ref()
            .map(|hetzner| hetzner.network.as_str())
            .unwrap_or_default();
        if let Some(hetzner) = &mut cluster.spec.cloud.hetzner {
            if hetzner.network.is_empty() {
                dc_network.clone_into(&mut hetzner.network);
            }
        }
        Ok(())
    }
}

struct VsphereCsiClusterId;

impl ClusterMutator for VsphereCsiClusterId {
    fn mutate_create(&self, cluster: &mut Cluster, _: &MutationContext<'_>) -> Result<()> {
        cluster.spec.features.insert(
            constants::CLUSTER_FEATURE_VSPHERE_CSI_CLUSTER_ID.to_owned(),
            true,
        );
        Ok(())
    }
}
