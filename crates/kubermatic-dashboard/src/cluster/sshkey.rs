use kubermatic_apiv1::sshkey::SshKey;
use kubermatic_crd::sshkey::UserSSHKey;

use super::{Error, Result, get_internal_cluster};
use crate::{
    auth::{Authorized, authorize, get_project, validate_user_can_modify_project},
    context::Context,
    convert::sshkey::to_external,
    store::{self, ObjectStore, Selector},
};

/// The SSH keys owned by `project_id`.
async fn project_keys<S: ObjectStore>(
    authorized: &Authorized<S>,
    project_id: &str,
) -> Result<Vec<UserSSHKey>> {
    let keys: Vec<UserSSHKey> = authorized.store.list(None, &Selector::default()).await?;
    Ok(keys
        .into_iter()
        .filter(|key| key.spec.project == project_id)
        .collect())
}

fn find_key(keys: Vec<UserSSHKey>, key_id: &str) -> Option<UserSSHKey> {
    keys.into_iter()
        .find(|key| key.metadata.name.as_deref() == Some(key_id))
}

/// Deploys a project SSH key to a cluster.
pub async fn assign_ssh_key<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    key_id: &str,
) -> Result<SshKey> {
    if key_id.is_empty() {
        return Err(Error::MissingSshKey.into());
    }
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let project = get_project(&ctx.store, email, project_id).await?;
    get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;

    let Some(mut key) = find_key(project_keys(&authorized, project_id).await?, key_id) else {
        return Err(Error::ForeignSshKey {
            key: key_id.to_owned(),
            project_name: project.spec.name,
            project_id: project_id.to_owned(),
        }
        .into());
    };

    if !key.is_used_by_cluster(cluster_id) {
        key.add_to_cluster(cluster_id);
        key = authorized.store.update(&key).await?;
    }
    Ok(to_external(&key))
}

/// Removes a project SSH key from a cluster.
pub async fn detach_ssh_key<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    key_id: &str,
) -> Result<()> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;

    let Some(mut key) = find_key(project_keys(&authorized, project_id).await?, key_id) else {
        return Err(store::Error::NotFound {
            resource: "sshkey".to_owned(),
            name: key_id.to_owned(),
        }
        .into());
    };
    if key.is_used_by_cluster(cluster_id) {
        key.remove_from_cluster(cluster_id);
        authorized.store.update(&key).await?;
    }
    Ok(())
}

/// The project SSH keys deployed to a cluster.
pub async fn list_ssh_keys<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
) -> Result<Vec<SshKey>> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    Ok(project_keys(&authorized, project_id)
        .await?
        .iter()
        .filter(|key| key.is_used_by_cluster(cluster_id))
        .map(to_external)
        .collect())
}
