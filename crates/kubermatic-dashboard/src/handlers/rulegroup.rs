use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use http::StatusCode;
use kubermatic_apiv1::rulegroup::RuleGroup;
use kubermatic_crd::rulegroup::RuleGroupType;
use serde::Deserialize;

use super::{Body, ClusterItemPath, ClusterPath, Query, Result};
use crate::{auth::Caller, context::Context, rulegroup, store::ObjectStore};

pub(super) fn routes<S: ObjectStore>() -> Router<Context<S>> {
    Router::new()
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/rulegroups",
            get(list::<S>).post(create::<S>),
        )
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/rulegroups/{name}",
            get(get_rule_group::<S>)
                .put(update::<S>)
                .delete(delete::<S>),
        )
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(rename = "type", default)]
    type_: Option<RuleGroupType>,
}

async fn list<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
    query: Query<ListQuery>,
) -> Result<Json<Vec<RuleGroup>>> {
    let query = query?.0;
    let rule_groups = rulegroup::list(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        query.type_,
    )
    .await?;
    Ok(Json(rule_groups))
}

async fn create<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
    body: Body<RuleGroup>,
) -> Result<(StatusCode, Json<RuleGroup>)> {
    let Json(body) = body?;
    let created =
        rulegroup::create(&ctx, &caller.email, &path.project_id, &path.cluster_id, &body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_rule_group<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterItemPath>,
) -> Result<Json<RuleGroup>> {
    let rule_group = rulegroup::get(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &path.name,
    )
    .await?;
    Ok(Json(rule_group))
}

async fn update<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterItemPath>,
    body: Body<RuleGroup>,
) -> Result<Json<RuleGroup>> {
    let Json(body) = body?;
    let updated = rulegroup::update(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &path.name,
        &body,
    )
    .await?;
    Ok(Json(updated))
}

async fn delete<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterItemPath>,
) -> Result<StatusCode> {
    rulegroup::delete(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &path.name,
    )
    .await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use http::Method;
    use serde_json::json;

    use crate::{
        auth::tests::OWNER,
        cluster::tests::{context, hetzner, stored_cluster},
        handlers::tests::{json, send},
    };

    #[tokio::test]
    async fn type_filter_from_the_query() {
        let ctx = context().await;
        stored_cluster(&ctx, "abcd1234", hetzner()).await;

        // "name: logs\n" in base64
        let response = send(
            ctx.clone(),
            Method::POST,
            "/api/v2/projects/my-project/clusters/abcd1234/rulegroups",
            Some(OWNER),
            Some(json!({"data": "bmFtZTogbG9ncwo=", "type": "Logs"})),
        )
        .await;
        assert_eq!(response.status(), http::StatusCode::CREATED);
        assert_eq!(json(response).await["name"], "logs");

        let response = send(
            ctx.clone(),
            Method::GET,
            "/api/v2/projects/my-project/clusters/abcd1234/rulegroups?type=Metrics",
            Some(OWNER),
            None,
        )
        .await;
        assert_eq!(json(response).await, json!([]));

        let response = send(
            ctx,
            Method::GET,
            "/api/v2/projects/my-project/clusters/abcd1234/rulegroups?type=Traces",
            Some(OWNER),
            None,
        )
        .await;
        assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
    }
}
