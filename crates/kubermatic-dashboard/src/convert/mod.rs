//! Conversions between the stored resources and their external API shape.
//!
//! `to_external` functions never fail on missing optional fields. The only failures come from
//! embedded documents that do not decode.

pub mod addon;
pub mod cluster;
pub mod constraint;
pub mod datacenter;
pub mod rulegroup;
pub mod sshkey;
