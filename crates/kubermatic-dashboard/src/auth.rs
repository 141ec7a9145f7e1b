//! Caller identity and the choice between privileged and impersonated store access.
//!
//! Every request resolves the caller once through [`authorize`]. Admins get the privileged store,
//! everybody else gets a store impersonating them, so the API server enforces their RBAC rights.

use std::collections::BTreeSet;

use axum::extract::FromRequestParts;
use http::request::Parts;
use kubermatic_crd::project::{Project, ProjectRole, User, UserProjectBinding};
use snafu::{Snafu, ensure};

use crate::{
    error::HttpError,
    store::{self, Object, ObjectStore, Selector},
};

/// Header set by the authenticating proxy in front of the API.
pub const FORWARDED_EMAIL_HEADER: &str = "x-forwarded-email";

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("forbidden: the user {email:?} is not registered"))]
    UnknownUser { email: String },

    #[snafu(display("forbidden: The user {email:?} doesn't belong to the project {project_id}"))]
    NotAMember { email: String, project_id: String },

    #[snafu(display(
        "forbidden: {email:?} doesn't have privileges to perform this action. Please contact your administrator."
    ))]
    InsufficientPrivileges { email: String },

    #[snafu(display("forbidden: {email:?} doesn't have admin rights"))]
    NotAdmin { email: String },

    #[snafu(transparent)]
    Store { source: store::Error },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        match err {
            Error::Store { source } => source.into(),
            other => Self::forbidden(other.to_string()),
        }
    }
}

/// The resolved identity of a caller.
///
/// `groups` are the RBAC groups used for impersonation, `roles` the project roles derived from
/// them. Both are empty for unscoped lookups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub email: String,
    pub groups: Vec<String>,
    pub roles: BTreeSet<String>,
    pub is_admin: bool,
}

impl UserInfo {
    pub fn has_role(&self, role: ProjectRole) -> bool {
        self.roles.contains(&role.to_string())
    }
}

/// The authenticated caller, taken from the [`FORWARDED_EMAIL_HEADER`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(FORWARDED_EMAIL_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(|email| Self {
                email: email.to_owned(),
            })
            .ok_or_else(|| HttpError::unauthorized("the request is not authenticated"))
    }
}

async fn find_user<S: ObjectStore>(store: &S, email: &str) -> Result<User> {
    let users: Vec<User> = store.list(None, &Selector::default()).await?;
    users
        .into_iter()
        .find(|user| user.spec.email.eq_ignore_ascii_case(email))
        .ok_or_else(|| Error::UnknownUser {
            email: email.to_owned(),
        })
}

/// Resolves the identity of `email`.
///
/// With an empty `project_id` only the admin flag is looked up. Otherwise the groups of the
/// user's bindings in that project are collected. Admins without a binding act as owners, other
/// users without a binding are rejected.
pub async fn user_info<S: ObjectStore>(store: &S, email: &str, project_id: &str) -> Result<UserInfo> {
    let user = find_user(store, email).await?;
    let mut info = UserInfo {
        email: email.to_owned(),
        is_admin: user.spec.is_admin,
        ..Default::default()
    };
    if project_id.is_empty() {
        return Ok(info);
    }

    let bindings: Vec<UserProjectBinding> = store.list(None, &Selector::default()).await?;
    let mut groups: Vec<String> = bindings
        .into_iter()
        .filter(|binding| {
            binding.spec.project_id == project_id
                && binding.spec.user_email.eq_ignore_ascii_case(email)
        })
        .map(|binding| binding.spec.group)
        .collect();

    if groups.is_empty() {
        ensure!(info.is_admin, NotAMemberSnafu { email, project_id });
        groups.push(ProjectRole::Owners.group_for(project_id));
    }

    info.roles = groups
        .iter()
        .filter_map(|group| ProjectRole::from_group(group, project_id))
        .map(|role| role.to_string())
        .collect();
    info.groups = groups;
    Ok(info)
}

/// The store to use on behalf of `user`: the privileged one for admins, an impersonating one for
/// everybody else.
pub fn store_for<S: ObjectStore>(privileged: &S, user: &UserInfo) -> store::Result<S> {
    if user.is_admin {
        Ok(privileged.clone())
    } else {
        privileged.impersonate(user)
    }
}

/// A caller together with the store acting on their behalf.
#[derive(Clone, Debug)]
pub struct Authorized<S> {
    pub user: UserInfo,
    pub store: S,
}

/// Resolves the caller for an operation inside `project_id` and picks the store access path.
///
/// Admins are recognised by an unscoped lookup and keep the privileged store; for other users the
/// scoped lookup also proves their project membership.
pub async fn authorize<S: ObjectStore>(
    privileged: &S,
    email: &str,
    project_id: &str,
) -> Result<Authorized<S>> {
    let admin = user_info(privileged, email, "").await?;
    let user = if admin.is_admin {
        admin
    } else {
        user_info(privileged, email, project_id).await?
    };
    let store = store_for(privileged, &user)?;
    Ok(Authorized { user, store })
}

/// Reads an object through the caller's store.
///
/// A forbidden read is repeated with the privileged store. When that read fails too, its error
/// (usually "not found") is returned; otherwise the object exists and the caller gets the original
/// forbidden error.
pub async fn get_with_fallback<S: ObjectStore, K: Object>(
    authorized: &Authorized<S>,
    privileged: &S,
    namespace: Option<&str>,
    name: &str,
) -> store::Result<K> {
    match authorized.store.get::<K>(namespace, name).await {
        Err(err) if err.is_forbidden() => match privileged.get::<K>(namespace, name).await {
            Ok(_) => Err(err),
            Err(other) => Err(other),
        },
        result => result,
    }
}

/// Fetches a project the caller is allowed to see.
pub async fn get_project<S: ObjectStore>(
    privileged: &S,
    email: &str,
    project_id: &str,
) -> Result<Project> {
    let project: Project = privileged.get(None, project_id).await?;
    let admin = user_info(privileged, email, "").await?;
    if !admin.is_admin {
        user_info(privileged, email, project_id).await?;
    }
    Ok(project)
}

/// Admins, owners and editors may modify a project's resources.
pub fn validate_user_can_modify_project(user: &UserInfo) -> Result<()> {
    ensure!(
        user.is_admin || user.has_role(ProjectRole::Owners) || user.has_role(ProjectRole::Editors),
        InsufficientPrivilegesSnafu { email: &user.email }
    );
    Ok(())
}

pub fn ensure_admin(user: &UserInfo) -> Result<()> {
    ensure!(user.is_admin, NotAdminSnafu { email: &user.email });
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use kubermatic_crd::project::{ProjectSpec, UserProjectBindingSpec, UserSpec};
    use rstest::rstest;

    use super::*;
    use crate::store::InMemoryStore;

    pub(crate) const ADMIN: &str = "admin@example.com";
    pub(crate) const OWNER: &str = "owner@example.com";
    pub(crate) const VIEWER: &str = "viewer@example.com";
    pub(crate) const STRANGER: &str = "stranger@example.com";
    pub(crate) const PROJECT: &str = "my-project";

    /// A store with one project, an admin, an owner, a viewer and a user outside the project.
    pub(crate) async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert(Project::new(PROJECT, ProjectSpec {
                name: "My Project".to_owned(),
            }))
            .await
            .expect("project is stored");

        for (name, email, is_admin) in [
            ("admin", ADMIN, true),
            ("owner", OWNER, false),
            ("viewer", VIEWER, false),
            ("stranger", STRANGER, false),
        ] {
            store
                .insert(User::new(name, UserSpec {
                    name: name.to_owned(),
                    email: email.to_owned(),
                    is_admin,
                }))
                .await
                .expect("user is stored");
        }

        for (email, role) in [(OWNER, ProjectRole::Owners), (VIEWER, ProjectRole::Viewers)] {
            store
                .insert(UserProjectBinding::new(
                    &format!("{role}-{email}"),
                    UserProjectBindingSpec {
                        user_email: email.to_owned(),
                        project_id: PROJECT.to_owned(),
                        group: role.group_for(PROJECT),
                    },
                ))
                .await
                .expect("binding is stored");
        }
        store
    }

    #[tokio::test]
    async fn scoped_and_unscoped_lookups() {
        let store = seeded_store().await;

        let admin = user_info(&store, ADMIN, "").await.expect("admin exists");
        assert!(admin.is_admin);
        assert!(admin.groups.is_empty());

        let admin = user_info(&store, ADMIN, PROJECT).await.expect("admin exists");
        assert_eq!(admin.groups, vec!["owners-my-project"]);

        let owner = user_info(&store, "Owner@Example.com", PROJECT)
            .await
            .expect("owner exists");
        assert!(owner.has_role(ProjectRole::Owners));
        assert!(!owner.is_admin);

        let err = user_info(&store, STRANGER, PROJECT)
            .await
            .expect_err("stranger is not a member");
        assert_eq!(
            err.to_string(),
            "forbidden: The user \"stranger@example.com\" doesn't belong to the project my-project"
        );

        let err = user_info(&store, "nobody@example.com", "")
            .await
            .expect_err("unknown users are rejected");
        assert!(matches!(err, Error::UnknownUser { .. }));
    }

    #[rstest]
    #[case(ADMIN, true)]
    #[case(OWNER, true)]
    #[case(VIEWER, false)]
    #[tokio::test]
    async fn modify_rights(#[case] email: &str, #[case] allowed: bool) {
        let store = seeded_store().await;
        let authorized = authorize(&store, email, PROJECT).await.expect("member");
        assert_eq!(
            validate_user_can_modify_project(&authorized.user).is_ok(),
            allowed
        );
    }

    #[tokio::test]
    async fn forbidden_reads_fall_back_to_privileged_existence_check() {
        let store = seeded_store().await;
        let authorized = authorize(&store, VIEWER, PROJECT).await.expect("member");
        store.deny::<Project>(VIEWER, None).await;

        let err = get_with_fallback::<_, Project>(&authorized, &store, None, PROJECT)
            .await
            .expect_err("viewer may not read projects");
        assert!(err.is_forbidden());

        let err = get_with_fallback::<_, Project>(&authorized, &store, None, "missing")
            .await
            .expect_err("project does not exist");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn project_access() {
        let store = seeded_store().await;
        let project = get_project(&store, OWNER, PROJECT).await.expect("owner");
        assert_eq!(project.spec.name, "My Project");
        get_project(&store, ADMIN, PROJECT).await.expect("admin");
        get_project(&store, STRANGER, PROJECT)
            .await
            .expect_err("not a member");

        let http: HttpError = get_project(&store, OWNER, "missing")
            .await
            .expect_err("missing project")
            .into();
        assert_eq!(http.code(), http::StatusCode::NOT_FOUND);
    }
}
