//! Axum handlers of the REST API.
//!
//! Handlers only extract the caller, path, query and body of a request and hand them to the
//! operation of the matching domain module. Every failure, including malformed bodies and query
//! strings, is answered with an [`HttpError`].

use axum::{
    Json, Router,
    extract::rejection::{JsonRejection, QueryRejection},
};
use serde::Deserialize;

use crate::{context::Context, error::HttpError, store::ObjectStore};

mod addon;
mod aws;
mod cluster;
mod constraint;
mod datacenter;
mod rulegroup;
mod sshkey;

pub type Result<T, E = HttpError> = std::result::Result<T, E>;

/// A JSON body whose rejection is turned into an [`HttpError`] by the handler.
type Body<T> = std::result::Result<Json<T>, JsonRejection>;

type Query<T> = std::result::Result<axum::extract::Query<T>, QueryRejection>;

#[derive(Debug, Deserialize)]
struct ClusterPath {
    project_id: String,
    cluster_id: String,
}

/// A resource that belongs to a cluster, like an addon or a rule group.
#[derive(Debug, Deserialize)]
struct ClusterItemPath {
    project_id: String,
    cluster_id: String,
    name: String,
}

/// All routes of the API. `/health` is added by the server.
pub fn router<S: ObjectStore>() -> Router<Context<S>> {
    Router::new()
        .merge(cluster::routes())
        .merge(sshkey::routes())
        .merge(addon::routes())
        .merge(constraint::routes())
        .merge(rulegroup::routes())
        .merge(aws::routes())
        .merge(datacenter::routes())
}
