//! Cluster operations of the project scoped API.
//!
//! Every operation resolves the caller with [`authorize`] first and reads the cluster through the
//! caller's store. Clusters are cluster scoped resources, the owning project is only recorded in
//! the [`PROJECT_ID_LABEL`] label.

use futures::future::join_all;
use kubermatic_apiv1::{
    cluster::{Cluster as ExternalCluster, ClusterHealth},
    metrics::{ClusterMetrics, Namespace},
};
use kubermatic_crd::{
    cloud::ProviderType,
    cluster::Cluster,
    configuration::KubermaticConfigurationSpec,
    constants::{
        CLUSTER_FEATURE_EXTERNAL_CLOUD_PROVIDER, CLUSTER_FEATURE_VSPHERE_CSI_CLUSTER_ID,
        IN_CLUSTER_LB_CLEANUP_FINALIZER, IN_CLUSTER_PV_CLEANUP_FINALIZER, NODE_DELETION_FINALIZER,
        PROJECT_ID_LABEL,
    },
    seed::{self, Seed},
};
use serde_json::{Map, Value, json};
use snafu::Snafu;
use tracing::debug;

use crate::{
    auth::{Authorized, authorize, get_with_fallback, validate_user_can_modify_project},
    context::Context,
    convert::cluster::{health_to_external, migration_supported, to_external},
    datacenter::{self, datacenter_from_seed_map},
    error::{HttpError, error_chain},
    metrics::cluster_metrics,
    store::{self, ObjectStore, Selector, resource_name},
};

mod create;
mod patch;
mod sshkey;

pub use create::create;
pub use patch::patch;
pub use sshkey::{assign_ssh_key, detach_ssh_key, list_ssh_keys};

pub type Result<T, E = HttpError> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cluster {name:?} already exists"))]
    DuplicateName { name: String },

    /// The cluster was created, but its creator could not read it in time.
    #[snafu(display("timed out waiting for cluster to become ready"))]
    NotReady {
        name: String,
        cluster: Box<ExternalCluster>,
    },

    #[snafu(display("invalid node deployment"))]
    EncodeNodeDeployment { source: serde_json::Error },

    #[snafu(display("failed to encode the initial applications"))]
    EncodeApplications { source: serde_json::Error },

    #[snafu(display("cannot decode existing cluster"))]
    EncodeExisting { source: serde_json::Error },

    #[snafu(display("cannot decode patched cluster"))]
    DecodePatched { source: serde_json::Error },

    #[snafu(display("external CCM not supported by the given provider"))]
    CcmNotSupported,

    #[snafu(display("external CCM already enabled, cannot be disabled"))]
    CcmAlreadyEnabled,

    #[snafu(display("please provide an SSH key"))]
    MissingSshKey,

    #[snafu(display(
        "the given ssh key {key} does not belong to the given project {project_name} ({project_id})"
    ))]
    ForeignSshKey {
        key: String,
        project_name: String,
        project_id: String,
    },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        match &err {
            Error::DuplicateName { .. } => Self::conflict(err.to_string()),
            Error::NotReady { name, cluster } => {
                let error = Self::internal(err.to_string()).with_details([format!(
                    "cluster {name:?} was created but is not accessible yet"
                )]);
                match serde_json::to_value(cluster) {
                    Ok(cluster) => error.with_resource(cluster),
                    Err(_) => error,
                }
            }
            Error::EncodeApplications { .. } => Self::internal_from(&err),
            Error::EncodeNodeDeployment { .. } | Error::DecodePatched { .. } => {
                Self::bad_request(error_chain(&err))
            }
            Error::EncodeExisting { .. }
            | Error::CcmNotSupported
            | Error::CcmAlreadyEnabled
            | Error::MissingSshKey
            | Error::ForeignSshKey { .. } => Self::bad_request(err.to_string()),
        }
    }
}

/// Options of a cluster deletion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub delete_volumes: bool,
    pub delete_load_balancers: bool,
}

/// Reads a cluster and checks that it belongs to `project_id`.
///
/// A cluster of another project is reported as not found.
pub(crate) async fn get_internal_cluster<S: ObjectStore>(
    ctx: &Context<S>,
    authorized: &Authorized<S>,
    project_id: &str,
    cluster_id: &str,
) -> Result<Cluster> {
    let cluster: Cluster = get_with_fallback(authorized, &ctx.store, None, cluster_id).await?;
    if cluster.project_id() != Some(project_id) {
        return Err(store::Error::NotFound {
            resource: resource_name::<Cluster>(),
            name: cluster_id.to_owned(),
        }
        .into());
    }
    Ok(cluster)
}

/// The seed and datacenter `cluster` runs in, as seen by the caller.
pub(crate) fn locate<'a>(
    authorized: &Authorized<impl ObjectStore>,
    seeds: &'a [Seed],
    cluster: &Cluster,
) -> datacenter::Result<(&'a Seed, &'a seed::Datacenter)> {
    datacenter_from_seed_map(&authorized.user, seeds, &cluster.spec.cloud.datacenter_name)
}

pub(crate) async fn configuration<S: ObjectStore>(
    ctx: &Context<S>,
) -> Result<KubermaticConfigurationSpec> {
    Ok(ctx.configuration().await?.spec)
}

pub async fn get<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
) -> Result<ExternalCluster> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let config = configuration(ctx).await?;
    Ok(to_external(
        &cluster,
        &config.versions.provider_incompatibilities,
        true,
    ))
}

/// Lists the clusters of a project.
///
/// Clusters in datacenters the caller may not use, or which no longer exist, are left out. With
/// `with_machine_deployment_count` every cluster is asked for its machine deployments
/// concurrently; the first failure fails the listing once all requests are done.
pub async fn list<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    with_machine_deployment_count: bool,
) -> Result<Vec<ExternalCluster>> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let clusters: Vec<Cluster> = authorized
        .store
        .list(None, &Selector::default().with(PROJECT_ID_LABEL, project_id))
        .await?;
    let seeds = ctx.seeds().await?;
    let config = configuration(ctx).await?;

    let mut visible = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        match locate(&authorized, &seeds, &cluster) {
            Ok(_) => visible.push(cluster),
            Err(
                err @ (datacenter::Error::EmailRequirements { .. }
                | datacenter::Error::DatacenterNotFound { .. }),
            ) => {
                debug!(
                    cluster = cluster.metadata.name.as_deref(),
                    error = %err,
                    "leaving out cluster"
                );
            }
            Err(err) => return Err(err.into()),
        }
    }

    let mut external: Vec<ExternalCluster> = visible
        .iter()
        .map(|cluster| to_external(cluster, &config.versions.provider_incompatibilities, true))
        .collect();

    if with_machine_deployment_count {
        let counts = join_all(
            visible
                .iter()
                .map(|cluster| ctx.user_clusters.machine_deployments(cluster)),
        )
        .await;
        for (cluster, count) in external.iter_mut().zip(counts) {
            cluster.machine_deployment_count = Some(count?.len());
        }
    }
    Ok(external)
}

/// Deletes a cluster, optionally asking for the cleanup of its volumes and load balancers.
///
/// The cleanup finalizers are only added while nodes are still being deleted, otherwise there is
/// nothing left that could own such resources.
pub async fn delete<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    options: DeleteOptions,
) -> Result<()> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let mut cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;

    let finalizers = cluster.metadata.finalizers.get_or_insert_default();
    if finalizers.iter().any(|f| f == NODE_DELETION_FINALIZER) {
        let mut changed = false;
        for (requested, finalizer) in [
            (options.delete_volumes, IN_CLUSTER_PV_CLEANUP_FINALIZER),
            (options.delete_load_balancers, IN_CLUSTER_LB_CLEANUP_FINALIZER),
        ] {
            if requested && !finalizers.iter().any(|f| f == finalizer) {
                finalizers.push(finalizer.to_owned());
                changed = true;
            }
        }
        if changed {
            authorized.store.update(&cluster).await?;
        }
    }

    authorized.store.delete::<Cluster>(None, cluster_id).await?;
    Ok(())
}

pub async fn health<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
) -> Result<ClusterHealth> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let status = cluster.status.unwrap_or_default();
    Ok(health_to_external(&status.extended_health))
}

pub async fn metrics<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
) -> Result<ClusterMetrics> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    Ok(cluster_metrics(ctx.user_clusters.as_ref(), &cluster).await?)
}

pub async fn namespaces<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
) -> Result<Vec<Namespace>> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let names = ctx.user_clusters.namespaces(&cluster).await?;
    Ok(names.into_iter().map(|name| Namespace { name }).collect())
}

/// Switches a cluster to the external cloud controller manager.
///
/// The switch is one-way. vSphere clusters additionally get the CSI cluster ID feature.
pub async fn migrate_to_external_ccm<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
) -> Result<()> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let config = configuration(ctx).await?;

    if !migration_supported(&cluster, &config.versions.provider_incompatibilities) {
        return Err(Error::CcmNotSupported.into());
    }
    if cluster
        .spec
        .feature_enabled(CLUSTER_FEATURE_EXTERNAL_CLOUD_PROVIDER)
    {
        return Err(Error::CcmAlreadyEnabled.into());
    }

    let mut features = Map::from_iter([(
        CLUSTER_FEATURE_EXTERNAL_CLOUD_PROVIDER.to_owned(),
        Value::Bool(true),
    )]);
    if matches!(
        cluster.spec.cloud.provider_name(),
        Ok(Some(ProviderType::Vsphere))
    ) {
        features.insert(
            CLUSTER_FEATURE_VSPHERE_CSI_CLUSTER_ID.to_owned(),
            Value::Bool(true),
        );
    }
    ctx.store
        .patch(&cluster, &json!({"spec": {"features": features}}))
        .await?;
    Ok(())
}
