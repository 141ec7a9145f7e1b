//! Gatekeeper constraints of a user cluster.
//!
//! Constraints are stored in the cluster namespace on the seed. A constraint may only be created
//! for a kind some `ConstraintTemplate` provides; templates are named after the lowercased kind.

use kubermatic_apiv1::constraint::Constraint as ExternalConstraint;
use kubermatic_crd::constraint::{Constraint, ConstraintTemplate};
use serde_json::Value;
use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::{
    auth::{authorize, validate_user_can_modify_project},
    cluster::{Result, get_internal_cluster},
    context::Context,
    convert::constraint::{to_external, to_internal},
    error::{HttpError, error_chain},
    store::{ObjectStore, Selector},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("Constraint's kind {kind:?} is not supported; ConstraintTemplate not found"))]
    UnsupportedKind { kind: String },

    #[snafu(display("cannot encode existing constraint"))]
    EncodeExisting { source: serde_json::Error },

    #[snafu(display("cannot decode patched constraint"))]
    DecodePatched { source: serde_json::Error },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        match &err {
            Error::UnsupportedKind { .. } => Self::bad_request(err.to_string()),
            Error::EncodeExisting { .. } => Self::internal_from(&err),
            Error::DecodePatched { .. } => Self::bad_request(error_chain(&err)),
        }
    }
}

async fn ensure_template<S: ObjectStore>(ctx: &Context<S>, kind: &str) -> Result<()> {
    match ctx
        .store
        .get::<ConstraintTemplate>(None, &kind.to_lowercase())
        .await
    {
        Ok(_) => Ok(()),
        Err(err) if err.is_not_found() => Err(Error::UnsupportedKind {
            kind: kind.to_owned(),
        }
        .into()),
        Err(err) => Err(err.into()),
    }
}

#[instrument(skip(ctx, constraint), fields(constraint = %constraint.name))]
pub async fn create<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    constraint: &ExternalConstraint,
) -> Result<ExternalConstraint> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    ensure_template(ctx, &constraint.spec.constraint_type).await?;

    let created = authorized
        .store
        .create(&to_internal(constraint, &cluster.namespace_name()))
        .await?;
    Ok(to_external(&created))
}

pub async fn get<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    name: &str,
) -> Result<ExternalConstraint> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let constraint: Constraint = authorized
        .store
        .get(Some(&cluster.namespace_name()), name)
        .await?;
    Ok(to_external(&constraint))
}

pub async fn list<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
) -> Result<Vec<ExternalConstraint>> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let constraints: Vec<Constraint> = authorized
        .store
        .list(Some(&cluster.namespace_name()), &Selector::default())
        .await?;
    Ok(constraints.iter().map(to_external).collect())
}

/// Applies a JSON merge patch to the external representation of a constraint.
///
/// The name cannot be changed. A changed kind must again be provided by a template.
pub async fn patch<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    name: &str,
    patch: &Value,
) -> Result<ExternalConstraint> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    let stored: Constraint = authorized
        .store
        .get(Some(&cluster.namespace_name()), name)
        .await?;

    let mut document = serde_json::to_value(to_external(&stored)).context(EncodeExistingSnafu)?;
    json_patch::merge(&mut document, patch);
    let patched: ExternalConstraint =
        serde_json::from_value(document).context(DecodePatchedSnafu)?;
    if patched.spec.constraint_type != stored.spec.constraint_type {
        ensure_template(ctx, &patched.spec.constraint_type).await?;
    }

    let mut updated = stored;
    updated.spec = patched.spec;
    updated.metadata.labels = (!patched.labels.is_empty()).then_some(patched.labels);
    let updated = authorized.store.update(&updated).await?;
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
        .delete::<Constraint>(Some(&cluster.namespace_name()), name)
        .await?;
    Ok(())
}
