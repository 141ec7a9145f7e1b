use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use http::{HeaderMap, StatusCode};
use kubermatic_apiv1::{
    cluster::{Cluster, ClusterHealth, CreateClusterSpec},
    metrics::{ClusterMetrics, Namespace},
};
use serde::Deserialize;
use serde_json::Value;

use super::{Body, ClusterPath, Query, Result};
use crate::{
    auth::Caller,
    cluster::{self, DeleteOptions},
    context::Context,
    store::ObjectStore,
};

const DELETE_VOLUMES_HEADER: &str = "DeleteVolumes";
const DELETE_LOAD_BALANCERS_HEADER: &str = "DeleteLoadBalancers";

pub(super) fn routes<S: ObjectStore>() -> Router<Context<S>> {
    Router::new()
        .route(
            "/api/v2/projects/{project_id}/clusters",
            get(list::<S>).post(create::<S>),
        )
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}",
            get(get_cluster::<S>).patch(patch::<S>).delete(delete::<S>),
        )
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/health",
            get(health::<S>),
        )
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/metrics",
            get(metrics::<S>),
        )
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/namespaces",
            get(namespaces::<S>),
        )
        .route(
            "/api/v2/projects/{project_id}/clusters/{cluster_id}/externalccmmigration",
            post(migrate_to_external_ccm::<S>),
        )
}

#[derive(Debug, Deserialize)]
struct ProjectPath {
    project_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    show_dm_count: bool,
}

#[derive(Debug, Default, Deserialize)]
struct PatchQuery {
    #[serde(default)]
    skip_kubelet_version_validation: bool,
}

fn header_flag(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("true"))
}

async fn list<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ProjectPath>,
    query: Query<ListQuery>,
) -> Result<Json<Vec<Cluster>>> {
    let query = query?.0;
    let clusters = cluster::list(&ctx, &caller.email, &path.project_id, query.show_dm_count).await?;
    Ok(Json(clusters))
}

async fn create<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ProjectPath>,
    body: Body<CreateClusterSpec>,
) -> Result<(StatusCode, Json<Cluster>)> {
    let Json(body) = body?;
    let created = cluster::create(&ctx, &caller.email, &path.project_id, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_cluster<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
) -> Result<Json<Cluster>> {
    let cluster = cluster::get(&ctx, &caller.email, &path.project_id, &path.cluster_id).await?;
    Ok(Json(cluster))
}

async fn patch<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
    query: Query<PatchQuery>,
    body: Body<Value>,
) -> Result<Json<Cluster>> {
    let query = query?.0;
    let Json(patch) = body?;
    let patched = cluster::patch(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        &patch,
        query.skip_kubelet_version_validation,
    )
    .await?;
    Ok(Json(patched))
}

async fn delete<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
    headers: HeaderMap,
) -> Result<StatusCode> {
    let options = DeleteOptions {
        delete_volumes: header_flag(&headers, DELETE_VOLUMES_HEADER),
        delete_load_balancers: header_flag(&headers, DELETE_LOAD_BALANCERS_HEADER),
    };
    cluster::delete(&ctx, &caller.email, &path.project_id, &path.cluster_id, options).await?;
    Ok(StatusCode::OK)
}

async fn health<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
) -> Result<Json<ClusterHealth>> {
    let health = cluster::health(&ctx, &caller.email, &path.project_id, &path.cluster_id).await?;
    Ok(Json(health))
}

async fn metrics<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
) -> Result<Json<ClusterMetrics>> {
    let metrics = cluster::metrics(&ctx, &caller.email, &path.project_id, &path.cluster_id).await?;
    Ok(Json(metrics))
}

async fn namespaces<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
) -> Result<Json<Vec<Namespace>>> {
    let namespaces =
        cluster::namespaces(&ctx, &caller.email, &path.project_id, &path.cluster_id).await?;
    Ok(Json(namespaces))
}

async fn migrate_to_external_ccm<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
) -> Result<StatusCode> {
    cluster::migrate_to_external_ccm(&ctx, &caller.email, &path.project_id, &path.cluster_id)
        .await?;
    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use http::Method;
    use kubermatic_crd::constants::{
        IN_CLUSTER_LB_CLEANUP_FINALIZER, NODE_DELETION_FINALIZER,
    };
    use serde_json::json;

    use crate::{
        auth::tests::{OWNER, VIEWER},
        cluster::tests::{context, hetzner, stored_cluster},
        convert::cluster::tests::{aws, cluster},
        handlers::tests::{json, send},
        store::ObjectStore,
    };

    #[tokio::test]
    async fn get_and_list_redact_credentials() {
        let ctx = context().await;
        stored_cluster(&ctx, "aws1", aws()).await;

        let response = send(
            ctx.clone(),
            Method::GET,
            "/api/v2/projects/my-project/clusters/aws1",
            Some(OWNER),
            None,
        )
        .await;
        assert_eq!(response.status(), http::StatusCode::OK);
        let body = json(response).await;
        assert_eq!(body["id"], "aws1");
        assert!(!body.to_string().contains("super-secret-key"));

        let response = send(
            ctx,
            Method::GET,
            "/api/v2/projects/my-project/clusters",
            Some(VIEWER),
            None,
        )
        .await;
        let body = json(response).await;
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert!(!body.to_string().contains("super-secret-key"));
    }

    #[tokio::test]
    async fn patch_and_missing_clusters() {
        let ctx = context().await;
        stored_cluster(&ctx, "abcd1234", hetzner()).await;

        let response = send(
            ctx.clone(),
            Method::PATCH,
            "/api/v2/projects/my-project/clusters/abcd1234?skip_kubelet_version_validation=true",
            Some(OWNER),
            Some(json!({"name": "Staging"})),
        )
        .await;
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(json(response).await["name"], "Staging");

        let response = send(
            ctx,
            Method::GET,
            "/api/v2/projects/my-project/clusters/missing1",
            Some(OWNER),
            None,
        )
        .await;
        assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
        assert_eq!(json(response).await["error"]["code"], 404);
    }

    #[tokio::test]
    async fn delete_reads_cleanup_headers() {
        let ctx = context().await;
        let mut doomed = cluster("abcd1234", hetzner());
        doomed.metadata.finalizers = Some(vec![NODE_DELETION_FINALIZER.to_owned()]);
        ctx.store.insert(doomed).await.expect("cluster is stored");

        let request = http::Request::builder()
            .method(Method::DELETE)
            .uri("/api/v2/projects/my-project/clusters/abcd1234")
            .header(crate::auth::FORWARDED_EMAIL_HEADER, OWNER)
            .header(super::DELETE_LOAD_BALANCERS_HEADER, "true")
            .body(axum::body::Body::empty())
            .expect("request is valid");
        let response = tower::ServiceExt::oneshot(
            crate::handlers::router().with_state(ctx.clone()),
            request,
        )
        .await
        .expect("router is infallible");
        assert_eq!(response.status(), http::StatusCode::OK);

        let deleting: kubermatic_crd::cluster::Cluster =
            ctx.store.get(None, "abcd1234").await.expect("cluster");
        assert_eq!(
            deleting.metadata.finalizers.unwrap_or_default(),
            [NODE_DELETION_FINALIZER, IN_CLUSTER_LB_CLEANUP_FINALIZER]
        );
    }
}
