use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// A public SSH key owned by a project, assignable to any of the project's clusters.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "UserSSHKey",
    plural = "usersshkeys",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct SshKeySpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub public_key: String,
    /// Names of the clusters this key is deployed to.
    #[serde(default)]
    pub clusters: Vec<String>,
}

impl UserSSHKey {
    pub fn is_used_by_cluster(&self, cluster_name: &str) -> bool {
        self.spec.clusters.iter().any(|c| c == cluster_name)
    }

    pub fn add_to_cluster(&mut self, cluster_name: &str) {
        if !self.is_used_by_cluster(cluster_name) {
            self.spec.clusters.push(cluster_name.to_owned());
        }
    }

    pub fn remove_from_cluster(&mut self, cluster_name: &str) {
        self.spec.clusters.retain(|c| c != cluster_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_assignment() {
        let mut key = UserSSHKey::new("key-1", SshKeySpec::default());
        key.add_to_cluster("c1");
        key.add_to_cluster("c1");
        key.add_to_cluster("c2");
        assert_eq!(key.spec.clusters, vec!["c1".to_owned(), "c2".to_owned()]);

        key.remove_from_cluster("c1");
        assert!(!key.is_used_by_cluster("c1"));
        assert!(key.is_used_by_cluster("c2"));
    }
}
