use kubermatic_apiv1::{SerializationMode, cluster::Cluster as ExternalCluster};
use kubermatic_crd::{Semver, cluster::Cluster, configuration::OperationType};
use serde_json::Value;
use snafu::ResultExt;
use tracing::{instrument, warn};

use super::{
    DecodePatchedSnafu, EncodeExistingSnafu, Result, configuration, get_internal_cluster, locate,
};
use crate::{
    auth::{authorize, validate_user_can_modify_project},
    context::Context,
    convert::cluster::{apply_patched, to_external},
    defaulting::{apply_template, default_template},
    mutation::MutationContext,
    preset::clear_preset_linkage,
    store::ObjectStore,
    validation::{self, validate_cluster, validate_kubelet_versions, validate_oidc},
};

/// Applies a JSON merge patch to the external representation of a cluster.
///
/// The patch is applied to the unredacted cluster, so credentials the caller does not send are
/// kept. Only the user editable fields of the result are copied onto the stored cluster, which is
/// then defaulted, mutated and validated like an upgrade. A patch removing the version is
/// rejected.
///
/// Unless `skip_kubelet_version_validation` is set the nodes of the user cluster are checked
/// against the new control plane version, which needs a connection to the user cluster.
#[instrument(skip(ctx, patch))]
pub async fn patch<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    patch: &Value,
    skip_kubelet_version_validation: bool,
) -> Result<ExternalCluster> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let old = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let seeds = ctx.seeds().await?;
    let (seed, datacenter) = locate(&authorized, &seeds, &old)?;
    let config = configuration(ctx).await?;
    let incompatibilities = &config.versions.provider_incompatibilities;

    let mut document = to_external(&old, incompatibilities, false)
        .to_value(SerializationMode::Unredacted)
        .context(EncodeExistingSnafu)?;
    json_patch::merge(&mut document, patch);
    let patched: ExternalCluster = serde_json::from_value(document).context(DecodePatchedSnafu)?;
    if patched.spec.version.is_none() {
        return Err(validation::Error::MissingVersion.into());
    }
    let mut new = apply_patched(&old, patched);

    if !skip_kubelet_version_validation {
        let nodes = ctx.user_clusters.nodes(&new).await?;
        let kubelets = nodes.iter().filter_map(|node| {
            let name = node.metadata.name.as_deref().unwrap_or_default();
            let version = &node.status.as_ref()?.node_info.as_ref()?.kubelet_version;
            match version.parse::<Semver>() {
                Ok(version) => Some(version),
                Err(error) => {
                    warn!(node = name, version, %error, "ignoring unparsable kubelet version");
                    None
                }
            }
        });
        validate_kubelet_versions(&new.spec.version, kubelets)?;
    }

    if let Some(template) = default_template(&ctx.store, &ctx.kubermatic_namespace, seed).await? {
        apply_template(&mut new.spec, &template)?;
    }
    if credentials_changed(&old, &new) {
        clear_preset_linkage(&mut new);
    }

    let mutation = MutationContext {
        seed,
        datacenter,
        config: &config,
    };
    ctx.mutations.mutate_update(&old, &mut new, &mutation)?;
    validate_cluster(&new, datacenter, &config, OperationType::Upgrade)?;
    validate_oidc(&new, ctx.share_kubeconfig)?;

    let updated = authorized.store.update(&new).await?;
    Ok(to_external(&updated, incompatibilities, true))
}

/// Any change of the provider specific cloud settings counts as a credential change, as does a
/// switch of the provider.
fn credentials_changed(old: &Cluster, new: &Cluster) -> bool {
    let (old, new) = (&old.spec.cloud, &new.spec.cloud);
    let provider_settings = |cloud: &kubermatic_crd::cloud::CloudSpec| {
        let mut cloud = cloud.clone();
        cloud.datacenter_name.clear();
        cloud
    };
    provider_settings(old) != provider_settings(new)
}
