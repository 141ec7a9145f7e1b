use kubermatic_apiv1::cluster::{Application, Cluster as ExternalCluster, CreateClusterSpec};
use kubermatic_crd::{
    cloud::ProviderType,
    cluster::Cluster,
    configuration::OperationType,
    constants::{
        APPLICATION_ENFORCED_ANNOTATION, INITIAL_APPLICATION_INSTALLATIONS_REQUEST_ANNOTATION,
        INITIAL_MACHINE_DEPLOYMENT_REQUEST_ANNOTATION, PROJECT_ID_LABEL,
    },
};
use rand::Rng;
use snafu::ResultExt;
use tokio::time::error::Elapsed;
use tracing::{debug, info, instrument, warn};

use super::{EncodeApplicationsSnafu, EncodeNodeDeploymentSnafu, Error, Result, configuration};
use crate::{
    auth::{authorize, get_project, validate_user_can_modify_project},
    context::Context,
    convert::cluster::{spec_to_internal, to_external},
    datacenter::datacenter_from_seed_map,
    defaulting::{apply_template, default_template},
    mutation::MutationContext,
    options::ReadinessPolicy,
    preset::{apply_preset, preset_linkage},
    store::{ObjectStore, Selector},
    validation::{self, validate_cluster, validate_create_body, validate_oidc},
};

/// Characters of generated cluster names. Vowels are left out so no words can form.
const NAME_CHARSET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
const NAME_LENGTH: usize = 10;
const WORKER_SUFFIX_LENGTH: usize = 6;

fn random_name(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(NAME_CHARSET[rng.random_range(0..NAME_CHARSET.len())]))
        .collect()
}

/// Creates a cluster in `project_id` and waits until its creator can read it.
///
/// The initial node deployment and applications are not created here. They are stored as request
/// annotations on the cluster and picked up by the seed controllers once the cluster is running.
#[instrument(skip(ctx, body))]
pub async fn create<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    mut body: CreateClusterSpec,
) -> Result<ExternalCluster> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    validate_user_can_modify_project(&authorized.user)?;
    get_project(&ctx.store, email, project_id).await?;
    let config = configuration(ctx).await?;

    let requested_provider = body.cluster.spec.cloud.provider_name().ok().flatten();
    validate_create_body(&body, requested_provider, &config)?;

    let seeds = ctx.seeds().await?;
    let (seed, datacenter) = datacenter_from_seed_map(
        &authorized.user,
        &seeds,
        &body.cluster.spec.cloud.datacenter_name,
    )?;

    let mut labels = std::mem::take(&mut body.cluster.labels);
    let mut annotations = std::mem::take(&mut body.cluster.metadata.annotations);
    let credential = std::mem::take(&mut body.cluster.credential);
    if !credential.is_empty() {
        let customized = apply_preset(
            &ctx.store,
            &authorized.user,
            project_id,
            &credential,
            &mut body.cluster.spec.cloud,
        )
        .await?;
        if !customized {
            let (preset_labels, preset_annotations) = preset_linkage(&credential);
            labels.extend(preset_labels);
            annotations.extend(preset_annotations);
        }
    }

    let Some(version) = body.cluster.spec.version.clone() else {
        return Err(validation::Error::MissingVersion.into());
    };
    let mut spec = spec_to_internal(&body.cluster.metadata.name, body.cluster.spec, version);
    if let Some(template) = default_template(&ctx.store, &ctx.kubermatic_namespace, seed).await? {
        apply_template(&mut spec, &template)?;
    }

    let mut cluster = Cluster::new(&random_name(NAME_LENGTH), spec);
    let mutation = MutationContext {
        seed,
        datacenter,
        config: &config,
    };
    ctx.mutations.mutate_create(&mut cluster, &mutation)?;
    validate_cluster(&cluster, datacenter, &config, OperationType::Create)?;
    validate_oidc(&cluster, ctx.share_kubeconfig)?;

    let name = cluster.metadata.name.clone().unwrap_or_default();
    if let Some(mut node_deployment) = body.node_deployment.take() {
        let bring_your_own = matches!(
            cluster.spec.cloud.provider_name(),
            Ok(Some(ProviderType::Bringyourown))
        );
        if !bring_your_own {
            if node_deployment.metadata.name.is_empty() {
                node_deployment.metadata.name =
                    format!("{name}-worker-{}", random_name(WORKER_SUFFIX_LENGTH));
            }
            node_deployment
                .spec
                .template
                .versions
                .kubelet
                .get_or_insert_with(|| cluster.spec.version.clone());
            let request =
                serde_json::to_string(&node_deployment).context(EncodeNodeDeploymentSnafu)?;
            annotations.insert(INITIAL_MACHINE_DEPLOYMENT_REQUEST_ANNOTATION.to_owned(), request);
        }
    }
    annotations.insert(
        INITIAL_APPLICATION_INSTALLATIONS_REQUEST_ANNOTATION.to_owned(),
        initial_applications(body.applications)?,
    );

    labels.insert(PROJECT_ID_LABEL.to_owned(), project_id.to_owned());
    cluster.metadata.labels = Some(labels);
    cluster.metadata.annotations = Some(annotations);
    cluster.spec.enable_user_ssh_key_agent.get_or_insert(true);

    let existing: Vec<Cluster> = authorized
        .store
        .list(None, &Selector::default().with(PROJECT_ID_LABEL, project_id))
        .await?;
    if existing
        .iter()
        .any(|c| c.spec.human_readable_name == cluster.spec.human_readable_name)
    {
        return Err(Error::DuplicateName {
            name: cluster.spec.human_readable_name.clone(),
        }
        .into());
    }

    let created = authorized.store.create(&cluster).await?;
    info!(cluster = name, "created cluster");
    let created = to_external(
        &created,
        &config.versions.provider_incompatibilities,
        true,
    );

    match wait_until_accessible(&authorized.store, ctx.readiness, &name).await {
        Ok(()) => Ok(created),
        Err(_) => Err(Error::NotReady {
            name,
            cluster: Box::new(created),
        }
        .into()),
    }
}

/// The applications to install once the cluster is up, as JSON.
///
/// Enforced applications are installed by the controllers anyway. An empty list is still written
/// so the controllers know that the caller chose no applications.
fn initial_applications(applications: Vec<Application>) -> Result<String, Error> {
    let applications: Vec<Application> = applications
        .into_iter()
        .map(|mut app| {
            if app.name.is_empty() {
                app.name = format!("{}-instance", app.spec.application_ref.name);
            }
            app
        })
        .filter(|app| {
            app.annotations
                .get(APPLICATION_ENFORCED_ANNOTATION)
                .is_none_or(|value| value != "true")
        })
        .collect();
    serde_json::to_string(&applications).context(EncodeApplicationsSnafu)
}

/// Polls until `store` can read the cluster, giving the RBAC controllers time to create the
/// bindings. Errors while polling are expected and only logged.
async fn wait_until_accessible<S: ObjectStore>(
    store: &S,
    readiness: ReadinessPolicy,
    name: &str,
) -> Result<(), Elapsed> {
    let poll = async {
        let mut interval = tokio::time::interval(readiness.interval);
        loop {
            interval.tick().await;
            match store.get::<Cluster>(None, name).await {
                Ok(_) => return,
                Err(error) => {
                    debug!(cluster = name, %error, "cluster is not accessible yet");
                }
            }
        }
    };
    tokio::time::timeout(readiness.timeout, poll)
        .await
        .inspect_err(|_| warn!(cluster = name, "timed out waiting for cluster to become ready"))
}
