use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use http::StatusCode;
use kubermatic_apiv1::constraint::Constraint;
use serde_json::Value;

use super::{Body, ClusterItemPath, ClusterPath, Result};
use crate::{auth::Caller, constraint, context::Context, store::ObjectStore};

pub(super) fn routes<S: ObjectStore>() -> Router<Context<S>> {
    Router::new()
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/constraints",
            get(list::<S>).post(create::<S>),
        )
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/constraints/{name}",
            get(get_constraint::<S>)
                .patch(patch::<S>)
                .delete(delete::<S>),
        )
}

async fn list<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
) -> Result<Json<Vec<Constraint>>> {
    let constraints =
        constraint::list(&ctx, &caller.email, &path.project_id, &path.cluster_id).await?;
    Ok(Json(constraints))
}

async fn create<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
    body: Body<Constraint>,
) -> Result<(StatusCode, Json<Constraint>)> {
    let Json(body) = body?;
    let created =
        constraint::create(&ctx, &caller.email, &path.project_id, &path.cluster_id, &body)
            .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_constraint<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterItemPath>,
) -> Result<Json<Constraint>> {
    let constraint = constraint::get(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &path.name,
    )
    .await?;
    Ok(Json(constraint))
}

async fn patch<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterItemPath>,
    body: Body<Value>,
) -> Result<Json<Constraint>> {
    let Json(patch) = body?;
    let patched = constraint::patch(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &path.name,
        &patch,
    )
    .await?;
    Ok(Json(patched))
}

async fn delete<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterItemPath>,
) -> Result<StatusCode> {
    constraint::delete(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &path.name,
    )
    .await?;
    Ok(StatusCode::OK)
}
