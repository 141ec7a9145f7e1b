//! Addons installed into user clusters and the UI metadata describing them.

use std::collections::BTreeSet;

use kubermatic_apiv1::addon::{Addon as ExternalAddon, AddonConfig as ExternalAddonConfig};
use kubermatic_crd::addon::{Addon, AddonConfig};
use tracing::instrument;

use crate::{
    auth::{authorize, validate_user_can_modify_project},
    cluster::{Result, configuration, get_internal_cluster},
    context::Context,
    convert::addon::{config_to_external, set_ensure_label, to_external, to_internal},
    store::{ObjectStore, Selector},
};

/// Installs an addon into a cluster.
#[instrument(skip(ctx, addon), fields(addon = %addon.metadata.name))]
pub async fn create<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    addon: &ExternalAddon,
) -> Result<ExternalAddon> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;

    let created = authorized.store.create(&to_internal(addon, &cluster)).await?;
    Ok(to_external(&created)?)
}

pub async fn get<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    addon_id: &str,
) -> Result<ExternalAddon> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let addon: Addon = authorized
        .store
        .get(Some(&cluster.namespace_name()), addon_id)
        .await?;
    Ok(to_external(&addon)?)
}

pub async fn list<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
) -> Result<Vec<ExternalAddon>> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let addons: Vec<Addon> = authorized
        .store
        .list(Some(&cluster.namespace_name()), &Selector::default())
        .await?;
    Ok(addons
        .iter()
        .map(to_external)
        .collect::<Result<_, _>>()?)
}

/// Replaces the variables of an addon and sets whether it is continuously reconciled.
///
/// Everything else of `addon` is ignored.
pub async fn patch<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    addon_id: &str,
    addon: &ExternalAddon,
) -> Result<ExternalAddon> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;

    let mut stored: Addon = authorized
        .store
        .get(Some(&cluster.namespace_name()), addon_id)
        .await?;
    stored.spec.variables = addon
        .spec
        .variables
        .clone()
        .map(serde_json::Value::Object);
    set_ensure_label(&mut stored, addon.spec.continuously_reconcile);

    let updated = authorized.store.update(&stored).await?;
    Ok(to_external(&updated)?)
}

pub async fn delete<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    addon_id: &str,
) -> Result<()> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    authorized
        .store
        .delete::<Addon>(Some(&cluster.namespace_name()), addon_id)
        .await?;
    Ok(())
}

/// The accessible addons not yet installed into the cluster, sorted by name.
pub async fn list_installable<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
) -> Result<Vec<String>> {
    let config = configuration(ctx).await?;
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let installed: BTreeSet<String> = authorized
        .store
        .list::<Addon>(Some(&cluster.namespace_name()), &Selector::default())
        .await?
        .into_iter()
        .filter_map(|addon| addon.metadata.name)
        .collect();

    let accessible: BTreeSet<String> = config.api.accessible_addons.into_iter().collect();
    Ok(accessible.difference(&installed).cloned().collect())
}

pub async fn list_configs<S: ObjectStore>(ctx: &Context<S>) -> Result<Vec<ExternalAddonConfig>> {
    let configs: Vec<AddonConfig> = ctx.store.list(None, &Selector::default()).await?;
    Ok(configs.iter().map(config_to_external).collect())
}

pub async fn get_config<S: ObjectStore>(
    ctx: &Context<S>,
    addon_id: &str,
) -> Result<ExternalAddonConfig> {
    let config: AddonConfig = ctx.store.get(None, addon_id).await?;
    Ok(config_to_external(&config))
}

#[cfg(test)]
mod tests {
    use kube::ResourceExt;
    use kubermatic_apiv1::{ObjectMeta, addon::AddonSpec};
    use kubermatic_crd::{
        addon::AddonConfigSpec,
        configuration::KubermaticConfiguration,
        constants::ADDON_ENSURE_LABEL,
    };
    use serde_json::json;

    use super::*;
    use crate::{
        auth::tests::{OWNER, PROJECT, VIEWER},
        cluster::tests::{context, hetzner, stored_cluster},
    };

    fn addon(name: &str, continuously_reconcile: bool) -> ExternalAddon {
        ExternalAddon {
            metadata: ObjectMeta {
                name: name.to_owned(),
                ..Default::default()
            },
            spec: AddonSpec {
                variables: json!({"replicas": 1}).as_object().cloned(),
                is_default: false,
                continuously_reconcile,
            },
        }
    }

    #[tokio::test]
    async fn addon_lifecycle() {
        let ctx = context().await;
        stored_cluster(&ctx, "abcd1234", hetzner()).await;

        let err = create(&ctx, VIEWER, PROJECT, "abcd1234", &addon("dns", false))
            .await
            .expect_err("viewers cannot install addons");
        assert_eq!(err.code(), http::StatusCode::FORBIDDEN);

        let created = create(&ctx, OWNER, PROJECT, "abcd1234", &addon("dns", true))
            .await
            .expect("owner installs an addon");
        assert_eq!(created.metadata.id, "dns");
        assert!(created.spec.continuously_reconcile);
        assert!(created.metadata.creation_timestamp.is_some());

        let err = create(&ctx, OWNER, PROJECT, "abcd1234", &addon("dns", true))
            .await
            .expect_err("addon is installed already");
        assert_eq!(err.code(), http::StatusCode::CONFLICT);

        let mut update = addon("ignored", false);
        update.spec.variables = json!({"replicas": 3}).as_object().cloned();
        let patched = patch(&ctx, OWNER, PROJECT, "abcd1234", "dns", &update)
            .await
            .expect("addon is patched");
        assert_eq!(patched.metadata.name, "dns");
        assert!(!patched.spec.continuously_reconcile);
        assert_eq!(patched.spec.variables, json!({"replicas": 3}).as_object().cloned());

        let stored: Addon = ctx
            .store
            .get(Some("cluster-abcd1234"), "dns")
            .await
            .expect("addon is stored in the cluster namespace");
        assert_eq!(stored.labels()[ADDON_ENSURE_LABEL], "false");

        let listed = list(&ctx, VIEWER, PROJECT, "abcd1234")
            .await
            .expect("viewers may list");
        assert_eq!(listed.len(), 1);

        delete(&ctx, OWNER, PROJECT, "abcd1234", "dns")
            .await
            .expect("addon is deleted");
        let err = get(&ctx, OWNER, PROJECT, "abcd1234", "dns")
            .await
            .expect_err("addon is gone");
        assert_eq!(err.code(), http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn installable_addons_exclude_installed_ones() {
        let ctx = context().await;
        stored_cluster(&ctx, "abcd1234", hetzner()).await;
        let mut config: KubermaticConfiguration = ctx.configuration().await.expect("config");
        config.spec.api.accessible_addons = vec![
            "node-exporter".to_owned(),
            "dns".to_owned(),
            "multus".to_owned(),
        ];
        ctx.store.update(&config).await.expect("config is updated");
        create(&ctx, OWNER, PROJECT, "abcd1234", &addon("dns", false))
            .await
            .expect("addon is installed");

        let installable = list_installable(&ctx, VIEWER, PROJECT, "abcd1234")
            .await
            .expect("installable addons");
        assert_eq!(installable, ["multus", "node-exporter"]);
    }

    #[tokio::test]
    async fn addon_configs() {
        let ctx = context().await;
        ctx.store
            .insert(AddonConfig::new("multus", AddonConfigSpec {
                short_description: "Multus CNI".to_owned(),
                ..Default::default()
            }))
            .await
            .expect("addon config is stored");

        let configs = list_configs(&ctx).await.expect("configs");
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "multus");

        let config = get_config(&ctx, "multus").await.expect("config");
        assert_eq!(config.spec.short_description, "Multus CNI");
        let err = get_config(&ctx, "dns").await.expect_err("unknown config");
        assert_eq!(err.code(), http::StatusCode::NOT_FOUND);
    }
}
