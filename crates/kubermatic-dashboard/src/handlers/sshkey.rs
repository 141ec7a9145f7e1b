use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use http::StatusCode;
use kubermatic_apiv1::sshkey::SshKey;

use super::{ClusterItemPath, ClusterPath, Result};
use crate::{auth::Caller, cluster, context::Context, store::ObjectStore};

pub(super) fn routes<S: ObjectStore>() -> Router<Context<S>> {
    Router::new()
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/sshkeys",
            get(list::<S>),
        )
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/sshkeys/{name}",
            put(assign::<S>).delete(detach::<S>),
        )
}

async fn list<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
) -> Result<Json<Vec<SshKey>>> {
    let keys =
        cluster::list_ssh_keys(&ctx, &caller.email, &path.project_id, &path.cluster_id).await?;
    Ok(Json(keys))
}

async fn assign<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterItemPath>,
) -> Result<(StatusCode, Json<SshKey>)> {
    let key = cluster::assign_ssh_key(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &path.name,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(key)))
}

async fn detach<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterItemPath>,
) -> Result<StatusCode> {
    cluster::detach_ssh_key(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &path.name,
    )
    .await?;
    Ok(StatusCode::OK)
}
