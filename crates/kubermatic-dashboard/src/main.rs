use std::sync::Arc;

use clap::Parser;
use kubermatic_dashboard::{
    aws::{self, InstanceTypeCatalog},
    cli::{Command, RunArguments},
    context::Context,
    server::{self, Server},
    store::KubeStore,
    usercluster::KubeUserClusters,
};
use kubermatic_telemetry::tracing::{self as telemetry, Tracing};
use snafu::{ResultExt, Snafu};

const SERVICE_NAME: &str = "kubermatic-dashboard-api";

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize tracing"))]
    InitTracing { source: telemetry::Error },

    #[snafu(display("failed to infer the Kubernetes client configuration"))]
    InferKubeConfig { source: kube::config::InferConfigError },

    #[snafu(display("failed to create the Kubernetes client"))]
    CreateClient { source: kube::Error },

    #[snafu(display("failed to load the instance type inventory"))]
    LoadInventory { source: aws::Error },

    #[snafu(display("failed to run the API server"))]
    RunServer { source: server::Error },
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), Error> {
    let Command::Run(args) = Command::parse();
    run(args).await
}

async fn run(args: RunArguments) -> Result<(), Error> {
    let server_options = args.server_options();
    let RunArguments {
        kubermatic_namespace,
        share_kubeconfig,
        instance_type_inventory,
        telemetry,
        ..
    } = args;

    let _tracing_guard = Tracing::pre_configured(SERVICE_NAME, telemetry)
        .init()
        .context(InitTracingSnafu)?;

    let config = kube::Config::infer().await.context(InferKubeConfigSnafu)?;
    let store = KubeStore::new(config).context(CreateClientSnafu)?;
    let user_clusters = Arc::new(KubeUserClusters::new(store.client()));

    let instance_types = instance_type_inventory
        .map(|path| InstanceTypeCatalog::from_file(&path).map(Arc::new))
        .transpose()
        .context(LoadInventorySnafu)?;

    let mut ctx = Context::new(store, kubermatic_namespace, user_clusters);
    ctx.instance_types = instance_types;
    ctx.share_kubeconfig = share_kubeconfig;

    tracing::info!(
        namespace = %ctx.kubermatic_namespace,
        share_kubeconfig,
        aws_sizes = ctx.instance_types.is_some(),
        "starting the dashboard API"
    );
    Server::new(ctx, server_options)
        .run()
        .await
        .context(RunServerSnafu)
}
