use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use http::StatusCode;
use kubermatic_apiv1::datacenter::{CreateDatacenter, Datacenter};
use serde::Deserialize;
use serde_json::Value;

use super::{Body, Result};
use crate::{
    auth::{Caller, UserInfo, ensure_admin, user_info},
    context::Context,
    datacenter,
    store::ObjectStore,
};

pub(super) fn routes<S: ObjectStore>() -> Router<Context<S>> {
    Router::new()
        .route("/api/v1/dc", get(list::<S>))
        .route("/api/v1/dc/{dc}", get(get_datacenter::<S>))
        .route("/api/v1/providers/{provider}/dc", get(list_for_provider::<S>))
        .route(
            "/api/v1/providers/{provider}/dc/{dc}",
            get(get_for_provider::<S>),
        )
        .route(
            "/api/v1/seed/{seed}/dc",
            get(list_for_seed::<S>).post(create::<S>),
        )
        .route(
            "/api/v1/seed/{seed}/dc/{dc}",
            get(get_for_seed::<S>)
                .put(update::<S>)
                .patch(patch::<S>)
                .delete(delete::<S>),
        )
}

#[derive(Debug, Deserialize)]
struct ProviderPath {
    provider: String,
}

#[derive(Debug, Deserialize)]
struct ProviderDatacenterPath {
    provider: String,
    dc: String,
}

#[derive(Debug, Deserialize)]
struct SeedPath {
    seed: String,
}

#[derive(Debug, Deserialize)]
struct SeedDatacenterPath {
    seed: String,
    dc: String,
}

/// The unscoped identity of the caller. Datacenters are not part of a project.
async fn caller_info<S: ObjectStore>(ctx: &Context<S>, caller: &Caller) -> Result<UserInfo> {
    Ok(user_info(&ctx.store, &caller.email, "").await?)
}

async fn admin_info<S: ObjectStore>(ctx: &Context<S>, caller: &Caller) -> Result<UserInfo> {
    let user = caller_info(ctx, caller).await?;
    ensure_admin(&user)?;
    Ok(user)
}

async fn list<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
) -> Result<Json<Vec<Datacenter>>> {
    let user = caller_info(&ctx, &caller).await?;
    let seeds = ctx.seeds().await?;
    Ok(Json(datacenter::list(&user, &seeds)))
}

async fn get_datacenter<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(dc): Path<String>,
) -> Result<Json<Datacenter>> {
    let user = caller_info(&ctx, &caller).await?;
    let seeds = ctx.seeds().await?;
    Ok(Json(datacenter::get(&user, &seeds, &dc)?))
}

async fn list_for_provider<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ProviderPath>,
) -> Result<Json<Vec<Datacenter>>> {
    let user = caller_info(&ctx, &caller).await?;
    let seeds = ctx.seeds().await?;
    Ok(Json(datacenter::list_for_provider(
        &user,
        &seeds,
        &path.provider,
    )))
}

async fn get_for_provider<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ProviderDatacenterPath>,
) -> Result<Json<Datacenter>> {
    let user = caller_info(&ctx, &caller).await?;
    let seeds = ctx.seeds().await?;
    Ok(Json(datacenter::get_for_provider(
        &user,
        &seeds,
        &path.provider,
        &path.dc,
    )?))
}

async fn list_for_seed<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<SeedPath>,
) -> Result<Json<Vec<Datacenter>>> {
    let user = caller_info(&ctx, &caller).await?;
    let seeds = ctx.seeds().await?;
    Ok(Json(datacenter::list_for_seed(&user, &seeds, &path.seed)?))
}

async fn get_for_seed<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<SeedDatacenterPath>,
) -> Result<Json<Datacenter>> {
    let user = caller_info(&ctx, &caller).await?;
    let seeds = ctx.seeds().await?;
    Ok(Json(datacenter::get_for_seed(
        &user, &seeds, &path.seed, &path.dc,
    )?))
}

async fn create<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<SeedPath>,
    body: Body<CreateDatacenter>,
) -> Result<(StatusCode, Json<Datacenter>)> {
    admin_info(&ctx, &caller).await?;
    let Json(body) = body?;
    let seeds = ctx.seeds().await?;
    let created = datacenter::create(&ctx.store, &seeds, &path.seed, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<SeedDatacenterPath>,
    body: Body<CreateDatacenter>,
) -> Result<Json<Datacenter>> {
    admin_info(&ctx, &caller).await?;
    let Json(body) = body?;
    let seeds = ctx.seeds().await?;
    let updated = datacenter::update(&ctx.store, &seeds, &path.seed, &path.dc, body).await?;
    Ok(Json(updated))
}

async fn patch<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<SeedDatacenterPath>,
    body: Body<Value>,
) -> Result<Json<Datacenter>> {
    admin_info(&ctx, &caller).await?;
    let Json(patch) = body?;
    let seeds = ctx.seeds().await?;
    let patched = datacenter::patch(&ctx.store, &seeds, &path.seed, &path.dc, &patch).await?;
    Ok(Json(patched))
}

async fn delete<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<SeedDatacenterPath>,
) -> Result<StatusCode> {
    admin_info(&ctx, &caller).await?;
    let seeds = ctx.seeds().await?;
    datacenter::delete(&ctx.store, &seeds, &path.seed, &path.dc).await?;
    Ok(StatusCode::OK)
}
