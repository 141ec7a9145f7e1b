//! Projects, users and their membership bindings.

use kube::CustomResource;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Roles a user can hold in a project. The RBAC group is `<role>-<projectID>`.
#[derive(Clone, Copy, Debug, Display, EnumString, Eq, Hash, PartialEq)]
#[strum(serialize_all = "lowercase")]
pub enum ProjectRole {
    Owners,
    Editors,
    Viewers,
    Projectmanagers,
}

impl ProjectRole {
    pub fn group_for(self, project_id: &str) -> String {
        format!("{self}-{project_id}")
    }

    /// Extracts the role from a group name such as `owners-abcd`.
    pub fn from_group(group: &str, project_id: &str) -> Option<Self> {
        group
            .strip_suffix(project_id)
            .and_then(|prefix| prefix.strip_suffix('-'))
            .and_then(|role| role.parse().ok())
    }
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "Project",
    status = "ProjectStatus",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSpec {
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    #[serde(default)]
    pub phase: String,
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "User",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    #[serde(default)]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[kube(
    group = "kubermatic.k8c.io",
    version = "v1",
    kind = "UserProjectBinding",
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct UserProjectBindingSpec {
    pub user_email: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    /// RBAC group, e.g. `owners-<projectID>`.
    pub group: String,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("owners-abc", "abc", Some(ProjectRole::Owners))]
    #[case("projectmanagers-abc", "abc", Some(ProjectRole::Projectmanagers))]
    #[case("viewers-xyz", "abc", None)]
    #[case("admins-abc", "abc", None)]
    fn role_from_group(
        #[case] group: &str,
        #[case] project_id: &str,
        #[case] expected: Option<ProjectRole>,
    ) {
        assert_eq!(ProjectRole::from_group(group, project_id), expected);
    }

    #[test]
    fn group_name() {
        assert_eq!(ProjectRole::Editors.group_for("p1"), "editors-p1");
    }
}
