use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use kubermatic_apiv1::aws::AwsSize;
use serde::Deserialize;

use super::{ClusterPath, Query, Result};
use crate::{
    auth::Caller,
    aws::{self, Architecture},
    context::Context,
    store::ObjectStore,
};

pub(super) fn routes<S: ObjectStore>() -> Router<Context<S>> {
    Router::new().route(
        "/api/v2/projects/{project_id}/clusters/{cluster_id}/providers/aws/sizes",
        get(sizes::<S>),
    )
}

#[derive(Debug, Default, Deserialize)]
struct SizesQuery {
    architecture: Option<String>,
}

async fn sizes<S: ObjectStore>(
    State(ctx): State<Context<S>>,
    caller: Caller,
    Path(path): Path<ClusterPath>,
    query: Query<SizesQuery>,
) -> Result<Json<Vec<AwsSize>>> {
    let query = query?.0;
    let architecture = Architecture::parse_optional(query.architecture.as_deref())?;
    let sizes = aws::cluster_sizes(
        &ctx,
        &caller.email,
        &path.project_id,
        &path.cluster_id,
        architecture,
    )
    .await?;
    Ok(Json(sizes))
}
