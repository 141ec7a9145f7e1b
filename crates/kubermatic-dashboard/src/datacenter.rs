//! Datacenters are not resources of their own, they live inside the spec of their [`Seed`].
//!
//! Lookups operate on an already fetched list of seeds. Writes modify the owning seed and replace
//! it in the store, so concurrent edits of the same seed surface as conflicts.

use http::StatusCode;
use kubermatic_apiv1::datacenter::{CreateDatacenter, Datacenter, DatacenterMeta, DatacenterSpec};
use kubermatic_crd::{
    cloud::ProviderType,
    seed::{self, Seed},
};
use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::{
    auth::UserInfo,
    convert::datacenter::{to_external, to_internal},
    error::HttpError,
    store::{self, ObjectStore},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("datacenter {name:?} not found"))]
    DatacenterNotFound { name: String },

    #[snafu(display("seed {name:?} not found"))]
    SeedNotFound { name: String },

    #[snafu(display("cannot access {name} datacenter due to email requirements"))]
    EmailRequirements { name: String },

    #[snafu(display("did not find one but {count} datacenters for name {name:?}"))]
    Ambiguous { count: usize, name: String },

    #[snafu(display("seed {name:?} does not exist"))]
    UnknownSeed { name: String },

    #[snafu(display("datacenter {name:?} already exists"))]
    AlreadyExists { name: String },

    #[snafu(display("datacenter {name:?} does not exists"))]
    DoesNotExist { name: String },

    #[snafu(display("cannot change {from:?} datacenter name to {to:?} as it already exists"))]
    RenameConflict { from: String, to: String },

    #[snafu(display(
        "only one DC provider should be specified, got: [{}]",
        providers.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
    ))]
    ProviderCount { providers: Vec<ProviderType> },

    #[snafu(display("path seed {path:?} and request seed {body:?} not equal"))]
    SeedMismatch { path: String, body: String },

    #[snafu(display(
        "patched dc validation failed: path seed name {path:?} has to be equal to patch seed name {patch:?}"
    ))]
    PatchSeedMismatch { path: String, patch: String },

    #[snafu(display("patched dc validation failed: {source}"))]
    PatchedDatacenterInvalid { source: Box<Error> },

    #[snafu(display("failed to apply the patch to datacenter {name:?}"))]
    InvalidPatch {
        source: serde_json::Error,
        name: String,
    },

    #[snafu(transparent)]
    Store { source: store::Error },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::DatacenterNotFound { .. } | Error::SeedNotFound { .. } => StatusCode::NOT_FOUND,
            Error::EmailRequirements { .. } => StatusCode::FORBIDDEN,
            Error::Ambiguous { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidPatch { .. } => {
                return Self::bad_request(crate::error::error_chain(&err));
            }
            _ => StatusCode::BAD_REQUEST,
        };
        match err {
            Error::Store { source } => source.into(),
            other => Self::new(code, other.to_string()),
        }
    }
}

/// Whether `email` satisfies a datacenter's `requiredEmails`.
///
/// An entry matches either the full address or its domain. No entries means no restriction.
pub fn email_matches(email: &str, required: &[String]) -> bool {
    if required.is_empty() {
        return true;
    }
    let domain = email.rsplit_once('@').map_or("", |(_, domain)| domain);
    required
        .iter()
        .any(|entry| entry.eq_ignore_ascii_case(email) || entry.eq_ignore_ascii_case(domain))
}

fn seed_name(seed: &Seed) -> &str {
    seed.metadata.name.as_deref().unwrap_or_default()
}

/// Finds the datacenter `name` and its seed, checking the email requirements for non-admins.
pub fn datacenter_from_seed_map<'a>(
    user: &UserInfo,
    seeds: &'a [Seed],
    name: &str,
) -> Result<(&'a Seed, &'a seed::Datacenter)> {
    let (seed, datacenter) = seeds
        .iter()
        .find_map(|seed| {
            seed.spec
                .datacenters
                .get(name)
                .map(|datacenter| (seed, datacenter))
        })
        .context(DatacenterNotFoundSnafu { name })?;

    ensure!(
        user.is_admin || email_matches(&user.email, &datacenter.spec.required_emails),
        EmailRequirementsSnafu { name }
    );
    Ok((seed, datacenter))
}

fn external_datacenters<'a>(seeds: impl IntoIterator<Item = &'a Seed>) -> Vec<Datacenter> {
    seeds
        .into_iter()
        .flat_map(|seed| {
            seed.spec
                .datacenters
                .iter()
                .map(move |(name, datacenter)| to_external(name, seed_name(seed), datacenter))
        })
        .collect()
}

/// Drops the datacenters a non-admin may not use and sorts the rest by name.
fn visible(user: &UserInfo, mut datacenters: Vec<Datacenter>) -> Vec<Datacenter> {
    if !user.is_admin {
        datacenters.retain(|dc| email_matches(&user.email, &dc.spec.datacenter.required_emails));
    }
    datacenters.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
    datacenters
}

fn single(datacenters: Vec<Datacenter>, name: &str) -> Result<Datacenter> {
    let mut found: Vec<Datacenter> = datacenters
        .into_iter()
        .filter(|dc| dc.metadata.name == name)
        .collect();
    ensure!(found.len() <= 1, AmbiguousSnafu {
        count: found.len(),
        name
    });
    found.pop().context(DatacenterNotFoundSnafu { name })
}

fn find_seed<'a>(seeds: &'a [Seed], name: &str) -> Result<&'a Seed> {
    seeds
        .iter()
        .find(|seed| seed_name(seed) == name)
        .context(SeedNotFoundSnafu { name })
}

pub fn list(user: &UserInfo, seeds: &[Seed]) -> Vec<Datacenter> {
    visible(user, external_datacenters(seeds))
}

pub fn list_for_provider(user: &UserInfo, seeds: &[Seed], provider: &str) -> Vec<Datacenter> {
    let mut datacenters = list(user, seeds);
    datacenters.retain(|dc| dc.spec.provider == provider);
    datacenters
}

pub fn get(user: &UserInfo, seeds: &[Seed], name: &str) -> Result<Datacenter> {
    single(list(user, seeds), name)
}

pub fn get_for_provider(
    user: &UserInfo,
    seeds: &[Seed],
    provider: &str,
    name: &str,
) -> Result<Datacenter> {
    single(list_for_provider(user, seeds, provider), name)
}

pub fn list_for_seed(user: &UserInfo, seeds: &[Seed], seed: &str) -> Result<Vec<Datacenter>> {
    let seed = find_seed(seeds, seed)?;
    Ok(visible(user, external_datacenters([seed])))
}

pub fn get_for_seed(user: &UserInfo, seeds: &[Seed], seed: &str, name: &str) -> Result<Datacenter> {
    single(list_for_seed(user, seeds, seed)?, name)
}

fn validate_provider(spec: &DatacenterSpec) -> Result<ProviderType> {
    let providers = spec.datacenter.providers();
    if let [provider] = providers[..] {
        return Ok(provider);
    }
    ProviderCountSnafu { providers }.fail()
}

fn seed_for_write(seeds: &[Seed], name: &str) -> Result<Seed> {
    seeds
        .iter()
        .find(|seed| seed_name(seed) == name)
        .cloned()
        .context(UnknownSeedSnafu { name })
}

/// Adds a datacenter to the seed named in the path.
pub async fn create<S: ObjectStore>(
    store: &S,
    seeds: &[Seed],
    path_seed: &str,
    body: CreateDatacenter,
) -> Result<Datacenter> {
    let provider = validate_provider(&body.spec)?;
    ensure!(body.spec.seed.eq_ignore_ascii_case(path_seed), SeedMismatchSnafu {
        path: path_seed,
        body: &body.spec.seed,
    });

    let mut seed = seed_for_write(seeds, &body.spec.seed)?;
    ensure!(
        !seed.spec.datacenters.contains_key(&body.name),
        AlreadyExistsSnafu { name: &body.name }
    );
    seed.spec
        .datacenters
        .insert(body.name.clone(), to_internal(&body.spec));
    store.update(&seed).await?;

    tracing::info!(seed.name = seed_name(&seed), datacenter.name = %body.name, "created datacenter");
    let mut spec = body.spec;
    spec.provider = provider.to_string();
    Ok(Datacenter {
        metadata: DatacenterMeta { name: body.name },
        spec,
    })
}

/// Replaces datacenter `name`, renaming it when the body carries a different name.
pub async fn update<S: ObjectStore>(
    store: &S,
    seeds: &[Seed],
    path_seed: &str,
    name: &str,
    body: CreateDatacenter,
) -> Result<Datacenter> {
    let provider = validate_provider(&body.spec)?;
    ensure!(body.spec.seed.eq_ignore_ascii_case(path_seed), SeedMismatchSnafu {
        path: path_seed,
        body: &body.spec.seed,
    });

    let mut seed = seed_for_write(seeds, &body.spec.seed)?;
    ensure!(
        seed.spec.datacenters.contains_key(name),
        DoesNotExistSnafu { name }
    );
    rename(&mut seed, name, &body.name)?;
    seed.spec
        .datacenters
        .insert(body.name.clone(), to_internal(&body.spec));
    store.update(&seed).await?;

    tracing::info!(seed.name = seed_name(&seed), datacenter.name = %name, "updated datacenter");
    let mut spec = body.spec;
    spec.provider = provider.to_string();
    Ok(Datacenter {
        metadata: DatacenterMeta { name: body.name },
        spec,
    })
}

/// Removes the entry `from` when the datacenter is renamed to a different `to`.
///
/// Names differing only in case count as the same name.
fn rename(seed: &mut Seed, from: &str, to: &str) -> Result<()> {
    if from.eq_ignore_ascii_case(to) {
        return Ok(());
    }
    ensure!(
        !seed.spec.datacenters.contains_key(to),
        RenameConflictSnafu { from, to }
    );
    seed.spec.datacenters.remove(from);
    Ok(())
}

/// Applies a JSON merge patch to the external shape of datacenter `name`.
pub async fn patch<S: ObjectStore>(
    store: &S,
    seeds: &[Seed],
    path_seed: &str,
    name: &str,
    patch: &serde_json::Value,
) -> Result<Datacenter> {
    let patch_seed = patch
        .pointer("/spec/seed")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default();
    ensure!(
        patch_seed.is_empty() || patch_seed.eq_ignore_ascii_case(path_seed),
        PatchSeedMismatchSnafu {
            path: path_seed,
            patch: patch_seed,
        }
    );

    let mut seed = seed_for_write(seeds, path_seed)?;
    let current = seed
        .spec
        .datacenters
        .get(name)
        .context(DoesNotExistSnafu { name })?;

    let mut document = serde_json::to_value(to_external(name, path_seed, current))
        .context(InvalidPatchSnafu { name })?;
    json_patch::merge(&mut document, patch);
    let mut patched: Datacenter =
        serde_json::from_value(document).context(InvalidPatchSnafu { name })?;

    let provider = validate_provider(&patched.spec).map_err(|source| {
        Error::PatchedDatacenterInvalid {
            source: Box::new(source),
        }
    })?;
    patched.spec.provider = provider.to_string();

    rename(&mut seed, name, &patched.metadata.name)?;
    let target = if name.eq_ignore_ascii_case(&patched.metadata.name) {
        name.to_owned()
    } else {
        patched.metadata.name.clone()
    };
    seed.spec
        .datacenters
        .insert(target, to_internal(&patched.spec));
    store.update(&seed).await?;

    tracing::info!(seed.name = seed_name(&seed), datacenter.name = %name, "patched datacenter");
    Ok(patched)
}

pub async fn delete<S: ObjectStore>(
    store: &S,
    seeds: &[Seed],
    seed_name_in_path: &str,
    name: &str,
) -> Result<()> {
    let mut seed = seed_for_write(seeds, seed_name_in_path)?;
    seed.spec
        .datacenters
        .remove(name)
        .context(DoesNotExistSnafu { name })?;
    store.update(&seed).await?;

    tracing::info!(seed.name = seed_name_in_path, datacenter.name = %name, "deleted datacenter");
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::store::InMemoryStore;

    /// Two seeds. `europe` hosts an open Hetzner and a restricted AWS datacenter, `asia` hosts an
    /// open fake one.
    pub(crate) fn seeds() -> Vec<Seed> {
        let europe: Seed = serde_yaml::from_str(indoc! {"
            apiVersion: kubermatic.k8c.io/v1
            kind: Seed
            metadata:
              name: europe
              namespace: kubermatic
            spec:
              datacenters:
                hetzner-fsn1:
                  country: DE
                  location: Falkenstein
                  spec:
                    hetzner:
                      datacenter: fsn1-dc14
                aws-eu-central-1a:
                  country: DE
                  location: Frankfurt
                  spec:
                    aws:
                      region: eu-central-1
                    requiredEmails:
                      - example.com
        "})
        .expect("europe seed is valid");
        let asia: Seed = serde_yaml::from_str(indoc! {"
            apiVersion: kubermatic.k8c.io/v1
            kind: Seed
            metadata:
              name: asia
              namespace: kubermatic
            spec:
              datacenters:
                fake-dc:
                  country: JP
                  location: Tokyo
                  spec:
                    fake:
                      fakeProperty: x
        "})
        .expect("asia seed is valid");
        vec![europe, asia]
    }

    fn user(email: &str, is_admin: bool) -> UserInfo {
        UserInfo {
            email: email.to_owned(),
            is_admin,
            ..Default::default()
        }
    }

    fn names(datacenters: &[Datacenter]) -> Vec<&str> {
        datacenters
            .iter()
            .map(|dc| dc.metadata.name.as_str())
            .collect()
    }

    #[rstest]
    #[case("bob@example.com", &["example.com"], true)]
    #[case("bob@Example.COM", &["example.com"], true)]
    #[case("bob@example.org", &["example.com"], false)]
    #[case("bob@example.org", &["bob@example.org"], true)]
    #[case("bob@sub.example.com", &["example.com"], false)]
    #[case("bob@example.org", &[], true)]
    fn email_requirements(#[case] email: &str, #[case] required: &[&str], #[case] matches: bool) {
        let required: Vec<String> = required.iter().map(|s| (*s).to_owned()).collect();
        assert_eq!(email_matches(email, &required), matches);
    }

    #[test]
    fn listing_filters_by_email_and_sorts() {
        let seeds = seeds();
        assert_eq!(names(&list(&user("bob@example.org", false), &seeds)), [
            "fake-dc",
            "hetzner-fsn1"
        ]);
        assert_eq!(names(&list(&user("bob@example.org", true), &seeds)), [
            "aws-eu-central-1a",
            "fake-dc",
            "hetzner-fsn1"
        ]);
        assert_eq!(
            names(&list_for_provider(&user("bob@example.com", false), &seeds, "aws")),
            ["aws-eu-central-1a"]
        );

        let err = list_for_seed(&user("bob@example.com", false), &seeds, "africa")
            .expect_err("unknown seed");
        assert_eq!(HttpError::from(err).code(), http::StatusCode::NOT_FOUND);
    }

    #[test]
    fn lookups() {
        let seeds = seeds();
        let dc = get(&user("bob@example.com", false), &seeds, "aws-eu-central-1a")
            .expect("datacenter is visible");
        assert_eq!(dc.spec.seed, "europe");
        assert_eq!(dc.spec.provider, "aws");

        let err = get(&user("bob@example.org", false), &seeds, "aws-eu-central-1a")
            .expect_err("restricted datacenter");
        assert_eq!(err.to_string(), "datacenter \"aws-eu-central-1a\" not found");

        let (seed, _) = datacenter_from_seed_map(&user("bob@example.com", false), &seeds, "fake-dc")
            .expect("open datacenter");
        assert_eq!(seed.metadata.name.as_deref(), Some("asia"));

        let err =
            datacenter_from_seed_map(&user("bob@example.org", false), &seeds, "aws-eu-central-1a")
                .expect_err("email requirement");
        assert_eq!(HttpError::from(err).code(), http::StatusCode::FORBIDDEN);
        datacenter_from_seed_map(&user("bob@example.org", true), &seeds, "aws-eu-central-1a")
            .expect("admins ignore email requirements");

        let err = get_for_seed(&user("bob@example.com", true), &seeds, "asia", "hetzner-fsn1")
            .expect_err("datacenter lives in another seed");
        assert!(matches!(err, Error::DatacenterNotFound { .. }));
    }

    #[test]
    fn duplicate_names_are_ambiguous() {
        let mut seeds = seeds();
        let copy = seeds[0].spec.datacenters["hetzner-fsn1"].clone();
        seeds[1]
            .spec
            .datacenters
            .insert("hetzner-fsn1".to_owned(), copy);

        let err = get(&user("bob@example.com", true), &seeds, "hetzner-fsn1")
            .expect_err("two datacenters");
        assert_eq!(
            err.to_string(),
            "did not find one but 2 datacenters for name \"hetzner-fsn1\""
        );
    }

    async fn stored_seeds(store: &InMemoryStore) -> Vec<Seed> {
        let mut stored = Vec::new();
        for seed in seeds() {
            stored.push(store.insert(seed).await.expect("seed is stored"));
        }
        stored
    }

    fn hetzner_body(name: &str, seed: &str) -> CreateDatacenter {
        CreateDatacenter {
            name: name.to_owned(),
            spec: DatacenterSpec {
                seed: seed.to_owned(),
                country: "FI".to_owned(),
                location: "Helsinki".to_owned(),
                datacenter: seed::DatacenterSpec {
                    hetzner: Some(seed::DatacenterSpecHetzner {
                        datacenter: "hel1".to_owned(),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn create_update_and_delete() {
        let store = InMemoryStore::new();
        let seeds = stored_seeds(&store).await;

        let created = create(&store, &seeds, "europe", hetzner_body("hetzner-hel1", "europe"))
            .await
            .expect("datacenter is created");
        assert_eq!(created.spec.provider, "hetzner");
        let europe: Seed = store
            .get(Some("kubermatic"), "europe")
            .await
            .expect("seed exists");
        assert!(europe.spec.datacenters.contains_key("hetzner-hel1"));

        let err = create(&store, &seeds, "europe", hetzner_body("hetzner-fsn1", "europe"))
            .await
            .expect_err("name is taken");
        assert_eq!(err.to_string(), "datacenter \"hetzner-fsn1\" already exists");

        let err = create(&store, &seeds, "asia", hetzner_body("x", "europe"))
            .await
            .expect_err("seed mismatch");
        assert_eq!(
            err.to_string(),
            "path seed \"asia\" and request seed \"europe\" not equal"
        );

        let mut two_providers = hetzner_body("x", "europe");
        two_providers.spec.datacenter.fake = Some(seed::DatacenterSpecFake::default());
        let err = create(&store, &seeds, "europe", two_providers)
            .await
            .expect_err("two providers");
        assert_eq!(
            err.to_string(),
            "only one DC provider should be specified, got: [hetzner fake]"
        );

        let seeds = store
            .list(Some("kubermatic"), &store::Selector::default())
            .await
            .expect("seeds");
        let err = update(
            &store,
            &seeds,
            "europe",
            "hetzner-hel1",
            hetzner_body("hetzner-fsn1", "europe"),
        )
        .await
        .expect_err("rename onto an existing datacenter");
        assert_eq!(
            err.to_string(),
            "cannot change \"hetzner-hel1\" datacenter name to \"hetzner-fsn1\" as it already exists"
        );

        update(
            &store,
            &seeds,
            "europe",
            "hetzner-hel1",
            hetzner_body("hetzner-hel2", "europe"),
        )
        .await
        .expect("rename");
        let europe: Seed = store
            .get(Some("kubermatic"), "europe")
            .await
            .expect("seed exists");
        assert!(!europe.spec.datacenters.contains_key("hetzner-hel1"));
        assert_eq!(europe.spec.datacenters["hetzner-hel2"].location, "Helsinki");

        let seeds = vec![europe];
        delete(&store, &seeds, "europe", "hetzner-hel2")
            .await
            .expect("datacenter is deleted");
        let err = delete(&store, &seeds, "europe", "missing")
            .await
            .expect_err("unknown datacenter");
        assert_eq!(err.to_string(), "datacenter \"missing\" does not exists");
        let err = delete(&store, &seeds, "africa", "missing")
            .await
            .expect_err("unknown seed");
        assert_eq!(HttpError::from(err).code(), http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn patching() {
        let store = InMemoryStore::new();
        let seeds = stored_seeds(&store).await;

        let patched = patch(
            &store,
            &seeds,
            "europe",
            "hetzner-fsn1",
            &serde_json::json!({"spec": {"location": "Nuremberg", "requiredEmails": ["example.com"]}}),
        )
        .await
        .expect("patch applies");
        assert_eq!(patched.spec.location, "Nuremberg");
        assert_eq!(patched.spec.provider, "hetzner");
        let europe: Seed = store
            .get(Some("kubermatic"), "europe")
            .await
            .expect("seed exists");
        let stored = &europe.spec.datacenters["hetzner-fsn1"];
        assert_eq!(stored.spec.required_emails, vec!["example.com"]);
        assert_eq!(
            stored.spec.hetzner.as_ref().map(|h| h.datacenter.as_str()),
            Some("fsn1-dc14")
        );

        let err = patch(
            &store,
            &[europe.clone()],
            "europe",
            "hetzner-fsn1",
            &serde_json::json!({"spec": {"seed": "asia"}}),
        )
        .await
        .expect_err("seed cannot change");
        assert_eq!(
            err.to_string(),
            "patched dc validation failed: path seed name \"europe\" has to be equal to patch seed name \"asia\""
        );

        let err = patch(
            &store,
            &[europe.clone()],
            "europe",
            "hetzner-fsn1",
            &serde_json::json!({"spec": {"hetzner": null}}),
        )
        .await
        .expect_err("no provider left");
        assert_eq!(
            err.to_string(),
            "patched dc validation failed: only one DC provider should be specified, got: []"
        );

        patch(
            &store,
            &[europe],
            "europe",
            "hetzner-fsn1",
            &serde_json::json!({"metadata": {"name": "hetzner-nbg1"}}),
        )
        .await
        .expect("rename through patch");
        let europe: Seed = store
            .get(Some("kubermatic"), "europe")
            .await
            .expect("seed exists");
        assert!(europe.spec.datacenters.contains_key("hetzner-nbg1"));
        assert!(!europe.spec.datacenters.contains_key("hetzner-fsn1"));
    }
}
