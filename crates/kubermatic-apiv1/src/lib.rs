//! The external, versioned API representation returned to dashboard clients.
//!
//! These types are never persisted. They are derived from the internal resources in
//! `kubermatic-crd` and must never leak provider credentials through their default
//! [`serde::Serialize`] implementation. Code that needs the credentials (merge-patch diffing)
//! has to ask for them explicitly with [`SerializationMode::Unredacted`].

pub mod addon;
pub mod aws;
pub mod cluster;
pub mod constraint;
pub mod datacenter;
pub mod meta;
pub mod metrics;
pub mod node;
pub mod rulegroup;
pub mod sshkey;

pub use meta::ObjectMeta;

/// Selects how sensitive fields are written when serializing an external resource.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SerializationMode {
    /// Provider credentials are cleared. This is what clients get to see.
    #[default]
    Redacted,

    /// Provider credentials are kept. Only for server-internal round trips.
    Unredacted,
}
