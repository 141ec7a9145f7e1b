//! Prometheus and Loki rule groups of a user cluster, stored in the cluster namespace.

use kubermatic_apiv1::rulegroup::RuleGroup as ExternalRuleGroup;
use kubermatic_crd::rulegroup::{RuleGroup, RuleGroupType};
use snafu::Snafu;

use crate::{
    auth::{authorize, validate_user_can_modify_project},
    cluster::{Result, get_internal_cluster},
    context::Context,
    convert::rulegroup::{to_external, to_internal},
    error::HttpError,
    store::{ObjectStore, Selector},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot rename rule group {name:?} to {requested:?}"))]
    Rename { name: String, requested: String },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        Self::bad_request(err.to_string())
    }
}

pub async fn get<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    name: &str,
) -> Result<ExternalRuleGroup> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let rule_group: RuleGroup = authorized
        .store
        .get(Some(&cluster.namespace_name()), name)
        .await?;
    Ok(to_external(&rule_group))
}

/// The rule groups of a cluster, restricted to `type_` if given.
pub async fn list<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    type_: Option<RuleGroupType>,
) -> Result<Vec<ExternalRuleGroup>> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let rule_groups: Vec<RuleGroup> = authorized
        .store
        .list(Some(&cluster.namespace_name()), &Selector::default())
        .await?;
    Ok(rule_groups
        .iter()
        .filter(|group| type_.is_none_or(|type_| group.spec.rule_group_type == type_))
        .map(to_external)
        .collect())
}

/// Creates a rule group named after the `name` its document declares.
pub async fn create<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    rule_group: &ExternalRuleGroup,
) -> Result<ExternalRuleGroup> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let created = authorized
        .store
        .create(&to_internal(rule_group, &cluster)?)
        .await?;
    Ok(to_external(&created))
}

/// Replaces a rule group. The document must keep declaring the same name.
pub async fn update<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    name: &str,
    rule_group: &ExternalRuleGroup,
) -> Result<ExternalRuleGroup> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;

    let requested = to_internal(rule_group, &cluster)?;
    let requested_name = requested.metadata.name.unwrap_or_default();
    if requested_name != name {
        return Err(Error::Rename {
            name: name.to_owned(),
            requested: requested_name,
        }
        .into());
    }

    let mut stored: RuleGroup = authorized
        .store
        .get(Some(&cluster.namespace_name()), name)
        .await?;
    stored.spec = requested.spec;
    let updated = authorized.store.update(&stored).await?;
    Ok(to_external(&updated))
}

pub async fn delete<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    name: &str,
) -> Result<()> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    authorized
        .store
        .delete::<RuleGroup>(Some(&cluster.namespace_name()), name)
        .await?;
    Ok(())
}
