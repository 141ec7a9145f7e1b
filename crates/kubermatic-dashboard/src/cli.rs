//! Command line arguments of the API server.
use std::{net::SocketAddr, path::PathBuf};

use clap::Parser;
use kubermatic_telemetry::tracing::TelemetryOptions;

use crate::options::{DEFAULT_SOCKET_ADDRESS, ReadinessPolicy, ServerOptions};

#[derive(Debug, PartialEq, Eq, Parser)]
#[command(version, about)]
pub enum Command {
    /// Run the API server.
    Run(RunArguments),
}

#[derive(Debug, PartialEq, Eq, Parser)]
#[command(long_about = "")]
pub struct RunArguments {
    /// The socket address the API listens on.
    #[arg(long, env, default_value_t = DEFAULT_SOCKET_ADDRESS)]
    pub bind_address: SocketAddr,

    /// The namespace holding the KubermaticConfiguration and the seeds.
    #[arg(long, env, default_value = "kubermatic")]
    pub kubermatic_namespace: String,

    /// Let project members download the admin kubeconfig of their clusters.
    #[arg(long, env)]
    pub share_kubeconfig: bool,

    /// JSON FILE with the EC2 instance type inventory used to compute AWS sizes.
    #[arg(long, env, value_name = "FILE")]
    pub instance_type_inventory: Option<PathBuf>,

    /// How often a newly created cluster is checked for accessibility.
    #[arg(long, env, default_value = "1s")]
    pub readiness_interval: humantime::Duration,

    /// How long cluster creation waits for the new cluster to become accessible.
    #[arg(long, env, default_value = "10s")]
    pub readiness_timeout: humantime::Duration,

    #[command(flatten)]
    pub telemetry: TelemetryOptions,
}

impl RunArguments {
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions::builder()
            .bind_address(self.bind_address.ip(), self.bind_address.port())
            .readiness(ReadinessPolicy {
                interval: *self.readiness_interval,
                timeout: *self.readiness_timeout,
            })
            .build()
    }
}
