//! The Kubermatic dashboard API.
//!
//! An HTTP/JSON server in front of the Kubermatic custom resources: clusters with their SSH keys,
//! addons, constraints and rule groups, datacenters and AWS machine sizes. Every request is
//! performed with the identity of the calling user, see [`auth`].
//!
//! The binary wires a [`context::Context`] backed by the Kubernetes API into a [`server::Server`].
//! Tests use the same context backed by [`store::InMemoryStore`].
pub mod addon;
pub mod auth;
pub mod aws;
pub mod cli;
pub mod cluster;
pub mod constraint;
pub mod context;
pub mod convert;
pub mod datacenter;
pub mod defaulting;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod mutation;
pub mod options;
pub mod preset;
pub mod quantity;
pub mod rulegroup;
pub mod server;
pub mod store;
pub mod usercluster;
pub mod validation;
