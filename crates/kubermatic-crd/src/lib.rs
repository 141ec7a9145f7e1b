//! Internal resources persisted by the Kubermatic platform.
//!
//! Every type in this crate mirrors a custom resource stored in the Kubernetes API server. The
//! dashboard never exposes these directly; it converts them into the external `apiv1`
//! representation first. Sensitive fields (cloud credentials) live in [`cloud::CloudSpec`] and
//! can be cleared with [`cloud::CloudSpec::redact_credentials`].

pub mod addon;
pub mod cloud;
pub mod cluster;
pub mod configuration;
pub mod constants;
pub mod constraint;
pub mod machine;
pub mod preset;
pub mod project;
pub mod rulegroup;
pub mod seed;
pub mod sshkey;
pub mod template;
pub mod version;

pub use version::Semver;

/// API group of all Kubermatic custom resources.
pub const GROUP: &str = "kubermatic.k8c.io";
