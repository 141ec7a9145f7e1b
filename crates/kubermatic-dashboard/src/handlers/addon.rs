use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use http::StatusCode;
use kubermatic_apiv1::addon::{Addon, AddonConfig};

use super::{Body, ClusterItemPath, ClusterPath, Result};
use crate::{addon, auth::Caller, context::Context, store::ObjectStore};

pub(super) fn routes<S: ObjectStore>() -> Router<Context<S>> {
    Router::new()
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/addons",
            get(list::<S>).post(create::<S>),
        )
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/addons/{name}",
            get(get_addon::<S>).patch(patch::<S>).delete(delete::<S>),
        )
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/installableaddons",
            get(list_installable::<S>),
        )
        .route("/api/v1/addonconfigs", get(list_configs::<S>))
        .route("/api/v1/addonconfigs/{name}", get(get_config::<S>))
}

async fn list<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
) -> Result<Json<Vec<Addon>>> {
    let addons = addon::list(&ctx, &caller.email, &path.project_id, &path.cluster_id).await?;
    Ok(Json(addons))
}

async fn create<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
    body: Body<Addon>,
) -> Result<(StatusCode, Json<Addon>)> {
    let Json(body) = body?;
    let created =
        addon::create(&ctx, &caller.email, &path.project_id, &path.cluster_id, &body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_addon<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterItemPath>,
) -> Result<Json<Addon>> {
    let addon = addon::get(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &path.name,
    )
    .await?;
    Ok(Json(addon))
}

async fn patch<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterItemPath>,
    body: Body<Addon>,
) -> Result<Json<Addon>> {
    let Json(body) = body?;
    let patched = addon::patch(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &path.name,
        &body,
    )
    .await?;
    Ok(Json(patched))
}

async fn delete<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterItemPath>,
) -> Result<StatusCode> {
    addon::delete(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &path.name,
    )
    .await?;
    Ok(StatusCode::OK)
}

async fn list_installable<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
) -> Result<Json<Vec<String>>> {
    let names =
        addon::list_installable(&ctx, &caller.email, &path.project_id, &path.cluster_id).await?;
    Ok(Json(names))
}

async fn list_configs<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    _caller: Caller,
) -> Result<Json<Vec<AddonConfig>>> {
    Ok(Json(addon::list_configs(&ctx).await?))
}

async fn get_config<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    _caller: Caller,
    Path(name): Path<String>,
) -> Result<Json<AddonConfig>> {
    Ok(Json(addon::get_config(&ctx, &name).await?))
}
