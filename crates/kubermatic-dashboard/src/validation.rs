//! Checks run on cluster bodies and on the fully defaulted internal cluster before it is stored.
//!
//! The create body is checked field by field and fails on the first problem. The structural check
//! of the defaulted cluster ([`validate_cluster`]) collects every violation into [`Errors`].

use std::{fmt::Display, net::IpAddr, sync::LazyLock};

use kubermatic_apiv1::cluster::{CreateClusterSpec, KUBERNETES_CLUSTER_TYPE};
use kubermatic_crd::{
    Semver,
    cloud::{self, ProviderType},
    cluster::{Cluster, UpdateWindow},
    configuration::{ConditionType, KubermaticConfigurationSpec, OperationType},
    seed,
};
use regex::Regex;
use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::{convert::cluster::version_matches, error::HttpError};

/// Longest accepted human readable cluster name.
pub const MAX_CLUSTER_NAME_LENGTH: usize = 100;

/// How many minor versions kubelets may lag behind the control plane.
pub const MAX_KUBELET_MINOR_SKEW: u64 = 3;

const PROXY_MODES: [&str; 3] = ["ipvs", "iptables", "ebpf"];

static UPDATE_WINDOW_START_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((Mon|Tue|Wed|Thu|Fri|Sat|Sun) )?([01][0-9]|2[0-3]):[0-5][0-9]$")
        .expect("failed to compile update window regex")
});

type Result<T = (), E = Errors> = std::result::Result<T, E>;

/// A collection of errors discovered during validation.
#[derive(Debug)]
pub struct Errors(Vec<Error>);

impl Errors {
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.0.iter()
    }
}

impl Display for Errors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

impl From<Errors> for HttpError {
    fn from(errors: Errors) -> Self {
        Self::bad_request(format!("invalid cluster: {errors}"))
            .with_details(errors.iter().map(ToString::to_string))
    }
}

/// A single validation error.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cluster datacenter name is empty"))]
    EmptyDatacenter,

    #[snafu(display("cluster.ID is read-only"))]
    ReadOnlyId,

    #[snafu(display("invalid cluster type {type_}"))]
    InvalidType { type_: String },

    #[snafu(display(
        "invalid cluster: invalid cloud spec \"Version\" is required but was not specified"
    ))]
    MissingVersion,

    #[snafu(display("invalid cluster name: too long (greater than {MAX_CLUSTER_NAME_LENGTH} characters)"))]
    NameTooLong,

    #[snafu(display("invalid cluster: invalid cloud spec: unsupported version {version}"))]
    UnsupportedVersion { version: Semver },

    #[snafu(display("can not set OIDC for the cluster when share config feature is enabled"))]
    OidcWithSharedKubeconfig,

    #[snafu(display("invalid cloud spec"))]
    CloudProvider { source: cloud::Error },

    #[snafu(display("no cloud provider specified"))]
    NoCloudProvider,

    #[snafu(display("expected datacenter provider to be {expected}, but got {actual}"))]
    ProviderMismatch {
        expected: ProviderType,
        actual: ProviderType,
    },

    #[snafu(display("cluster name cannot be empty"))]
    EmptyName,

    #[snafu(display(
        "invalid update window start {start:?}, expected \"[Mon|Tue|..] HH:MM\""
    ))]
    InvalidUpdateWindowStart { start: String },

    #[snafu(display("invalid update window length {length:?}"))]
    InvalidUpdateWindowLength {
        source: humantime::DurationError,
        length: String,
    },

    #[snafu(display("update window start and length must be set together"))]
    IncompleteUpdateWindow,

    #[snafu(display("invalid CIDR {value:?} in {field}"))]
    InvalidCidr { field: &'static str, value: String },

    #[snafu(display("invalid proxy mode {mode:?}, expected one of {PROXY_MODES:?}"))]
    InvalidProxyMode { mode: String },

    #[snafu(display(
        "Cluster contains nodes running the following incompatible kubelet versions: [{}]. Upgrade your nodes before you upgrade the cluster.",
        versions.join(" ")
    ))]
    IncompatibleKubelets { versions: Vec<String> },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        Self::bad_request(crate::error::error_chain(&err))
    }
}

/// Returns [`Ok`] if *all* validations are [`Ok`], otherwise returns all errors.
fn validate_all(validations: impl IntoIterator<Item = Result<(), Error>>) -> Result {
    let errors = validations
        .into_iter()
        .filter_map(|res| res.err())
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Errors(errors))
    }
}

/// Checks the request body of a cluster creation, stopping at the first problem.
pub fn validate_create_body(
    body: &CreateClusterSpec,
    provider: Option<ProviderType>,
    config: &KubermaticConfigurationSpec,
) -> Result<(), Error> {
    let cluster = &body.cluster;
    ensure!(
        !cluster.spec.cloud.datacenter_name.is_empty(),
        EmptyDatacenterSnafu
    );
    ensure!(cluster.metadata.id.is_empty(), ReadOnlyIdSnafu);
    ensure!(
        cluster.type_.is_empty() || cluster.type_ == KUBERNETES_CLUSTER_TYPE,
        InvalidTypeSnafu {
            type_: &cluster.type_
        }
    );
    let version = cluster.spec.version.as_ref().context(MissingVersionSnafu)?;
    ensure!(
        cluster.metadata.name.chars().count() <= MAX_CLUSTER_NAME_LENGTH,
        NameTooLongSnafu
    );
    ensure!(
        version_supported(version, provider, config, OperationType::Create),
        UnsupportedVersionSnafu {
            version: version.clone()
        }
    );
    Ok(())
}

/// Whether `version` is offered by the configuration and not excluded for `provider`.
///
/// An empty version list in the configuration accepts every version.
pub fn version_supported(
    version: &Semver,
    provider: Option<ProviderType>,
    config: &KubermaticConfigurationSpec,
    operation: OperationType,
) -> bool {
    let versions = &config.versions;
    let offered = versions.versions.is_empty() || versions.versions.contains(version);
    let excluded = versions.provider_incompatibilities.iter().any(|incompatibility| {
        incompatibility.condition == ConditionType::Always
            && incompatibility.operation == operation
            && (incompatibility.provider.is_none() || incompatibility.provider == provider)
            && version_matches(&incompatibility.version, version)
    });
    offered && !excluded
}

pub fn validate_oidc(cluster: &Cluster, share_kubeconfig: bool) -> Result<(), Error> {
    let oidc_set = cluster.spec.oidc.as_ref().is_some_and(|oidc| oidc.is_set());
    ensure!(!(share_kubeconfig && oidc_set), OidcWithSharedKubeconfigSnafu);
    Ok(())
}

/// Structural validation of a defaulted cluster. Every violation is reported.
pub fn validate_cluster(
    cluster: &Cluster,
    datacenter: &seed::Datacenter,
    config: &KubermaticConfigurationSpec,
    operation: OperationType,
) -> Result {
    let spec = &cluster.spec;
    let network = &spec.cluster_network;
    let provider = spec.cloud.provider_name().ok().flatten();

    let mut validations = vec![
        validate_provider(cluster, datacenter),
        (!spec.human_readable_name.is_empty())
            .then_some(())
            .context(EmptyNameSnafu),
        version_supported(&spec.version, provider, config, operation)
            .then_some(())
            .context(UnsupportedVersionSnafu {
                version: spec.version.clone(),
            }),
        validate_proxy_mode(&network.proxy_mode),
    ];
    if let Some(window) = &spec.update_window {
        validations.push(validate_update_window(window));
    }
    for cidr in &network.pods.cidr_blocks {
        validations.push(validate_cidr("clusterNetwork.pods", cidr));
    }
    for cidr in &network.services.cidr_blocks {
        validations.push(validate_cidr("clusterNetwork.services", cidr));
    }
    for cidr in spec
        .api_server_allowed_ip_ranges
        .iter()
        .flat_map(|ranges| &ranges.cidr_blocks)
    {
        validations.push(validate_cidr("apiServerAllowedIPRanges", cidr));
    }
    validate_all(validations)
}

fn validate_provider(cluster: &Cluster, datacenter: &seed::Datacenter) -> Result<(), Error> {
    let actual = cluster
        .spec
        .cloud
        .provider_name()
        .context(CloudProviderSnafu)?
        .context(NoCloudProviderSnafu)?;
    if let Some(expected) = datacenter.spec.provider() {
        ensure!(expected == actual, ProviderMismatchSnafu { expected, actual });
    }
    Ok(())
}

fn validate_proxy_mode(mode: &str) -> Result<(), Error> {
    ensure!(
        mode.is_empty() || PROXY_MODES.contains(&mode),
        InvalidProxyModeSnafu { mode }
    );
    Ok(())
}

/// A maintenance window needs both a start (`[Weekday ]HH:MM`) and a length, or neither.
pub fn validate_update_window(window: &UpdateWindow) -> Result<(), Error> {
    match (window.start.is_empty(), window.length.is_empty()) {
        (true, true) => return Ok(()),
        (false, false) => {}
        _ => return IncompleteUpdateWindowSnafu.fail(),
    }
    ensure!(
        UPDATE_WINDOW_START_REGEX.is_match(&window.start),
        InvalidUpdateWindowStartSnafu {
            start: &window.start
        }
    );
    humantime::parse_duration(&window.length).context(InvalidUpdateWindowLengthSnafu {
        length: &window.length,
    })?;
    Ok(())
}

fn validate_cidr(field: &'static str, value: &str) -> Result<(), Error> {
    let valid = value.split_once('/').is_some_and(|(address, prefix)| {
        match (address.parse::<IpAddr>(), prefix.parse::<u8>()) {
            (Ok(IpAddr::V4(_)), Ok(prefix)) => prefix <= 32,
            (Ok(IpAddr::V6(_)), Ok(prefix)) => prefix <= 128,
            _ => false,
        }
    });
    ensure!(valid, InvalidCidrSnafu { field, value });
    Ok(())
}

/// Rejects a control plane version that kubelets of the cluster cannot follow.
///
/// Kubelets must have the same major version and may lag at most [`MAX_KUBELET_MINOR_SKEW`]
/// minor versions behind, never ahead.
pub fn validate_kubelet_versions(
    control_plane: &Semver,
    kubelets: impl IntoIterator<Item = Semver>,
) -> Result<(), Error> {
    let mut incompatible: Vec<String> = kubelets
        .into_iter()
        .filter(|kubelet| {
            kubelet.major() != control_plane.major()
                || kubelet.minor() > control_plane.minor()
                || control_plane.minor() - kubelet.minor() > MAX_KUBELET_MINOR_SKEW
        })
        .map(|kubelet| kubelet.to_string())
        .collect();
    incompatible.sort();
    incompatible.dedup();
    ensure!(
        incompatible.is_empty(),
        IncompatibleKubeletsSnafu {
            versions: incompatible
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use kubermatic_apiv1::{
        ObjectMeta,
        cluster::{Cluster as ExternalCluster, ClusterSpec as ExternalClusterSpec},
    };
    use kubermatic_crd::{
        cloud::{CloudSpec, FakeCloudSpec, HetznerCloudSpec},
        cluster::{NetworkRanges, OidcSettings},
        configuration::{Incompatibility, KubermaticVersioningConfiguration},
        seed::{DatacenterSpecFake, DatacenterSpecHetzner},
    };
    use rstest::rstest;

    use super::*;
    use crate::convert::cluster::tests::cluster;

    fn config() -> KubermaticConfigurationSpec {
        KubermaticConfigurationSpec {
            versions: KubermaticVersioningConfiguration {
                versions: vec![Semver::new(1, 29, 4), Semver::new(1, 30, 2)],
                default: Some(Semver::new(1, 30, 2)),
                provider_incompatibilities: vec![Incompatibility {
                    provider: Some(ProviderType::Hetzner),
                    version: "1.29.*".to_owned(),
                    condition: ConditionType::Always,
                    operation: OperationType::Create,
                }],
            },
            ..Default::default()
        }
    }

    fn body(edit: impl FnOnce(&mut ExternalCluster)) -> CreateClusterSpec {
        let mut cluster = ExternalCluster {
            metadata: ObjectMeta {
                name: "Production".to_owned(),
                ..Default::default()
            },
            spec: ExternalClusterSpec {
                cloud: CloudSpec {
                    datacenter_name: "hetzner-fsn1".to_owned(),
                    hetzner: Some(HetznerCloudSpec::default()),
                    ..Default::default()
                },
                version: Some(Semver::new(1, 30, 2)),
                ..Default::default()
            },
            ..Default::default()
        };
        edit(&mut cluster);
        CreateClusterSpec {
            cluster,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(|c: &mut ExternalCluster| c.spec.cloud.datacenter_name.clear(), "cluster datacenter name is empty")]
    #[case(|c: &mut ExternalCluster| c.metadata.id = "abc".to_owned(), "cluster.ID is read-only")]
    #[case(|c: &mut ExternalCluster| c.type_ = "openshift".to_owned(), "invalid cluster type openshift")]
    #[case(
        |c: &mut ExternalCluster| c.spec.version = None,
        "invalid cluster: invalid cloud spec \"Version\" is required but was not specified"
    )]
    #[case(
        |c: &mut ExternalCluster| c.metadata.name = "x".repeat(101),
        "invalid cluster name: too long (greater than 100 characters)"
    )]
    #[case(
        |c: &mut ExternalCluster| c.spec.version = Some(Semver::new(1, 28, 0)),
        "invalid cluster: invalid cloud spec: unsupported version 1.28.0"
    )]
    #[case(
        |c: &mut ExternalCluster| c.spec.version = Some(Semver::new(1, 29, 4)),
        "invalid cluster: invalid cloud spec: unsupported version 1.29.4"
    )]
    fn create_body_errors(#[case] edit: fn(&mut ExternalCluster), #[case] message: &str) {
        let err = validate_create_body(&body(edit), Some(ProviderType::Hetzner), &config())
            .expect_err("body is invalid");
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn valid_create_body() {
        validate_create_body(&body(|_| {}), Some(ProviderType::Hetzner), &config())
            .expect("body is valid");
        let fake = body(|c| c.spec.version = Some(Semver::new(1, 29, 4)));
        validate_create_body(&fake, Some(ProviderType::Fake), &config())
            .expect("only hetzner excludes 1.29");
    }

    #[test]
    fn oidc_and_shared_kubeconfig_exclude_each_other() {
        let mut internal = cluster("a", CloudSpec::default());
        validate_oidc(&internal, true).expect("no OIDC configured");
        internal.spec.oidc = Some(OidcSettings {
            issuer_url: "https://dex.example.com".to_owned(),
            ..Default::default()
        });
        validate_oidc(&internal, false).expect("feature disabled");
        assert_eq!(
            validate_oidc(&internal, true)
                .expect_err("both set")
                .to_string(),
            "can not set OIDC for the cluster when share config feature is enabled"
        );
    }

    #[test]
    fn structural_errors_are_aggregated() {
        let mut internal = cluster("a", CloudSpec {
            hetzner: Some(HetznerCloudSpec::default()),
            ..Default::default()
        });
        internal.spec.human_readable_name.clear();
        internal.spec.cluster_network.proxy_mode = "userspace".to_owned();
        internal.spec.cluster_network.pods = NetworkRanges {
            cidr_blocks: vec!["172.25.0.0/16".to_owned(), "172.25.0.0".to_owned()],
        };
        let datacenter = seed::Datacenter {
            spec: seed::DatacenterSpec {
                fake: Some(DatacenterSpecFake::default()),
                ..Default::default()
            },
            ..Default::default()
        };

        let errors =
            validate_cluster(&internal, &datacenter, &config(), OperationType::Upgrade)
                .expect_err("cluster is invalid");
        let http = HttpError::from(errors);
        assert_eq!(http.details(), [
            "expected datacenter provider to be fake, but got hetzner",
            "cluster name cannot be empty",
            "invalid proxy mode \"userspace\", expected one of [\"ipvs\", \"iptables\", \"ebpf\"]",
            "invalid CIDR \"172.25.0.0\" in clusterNetwork.pods",
        ]);
        assert!(http.message().starts_with("invalid cluster: expected datacenter"));
    }

    #[test]
    fn valid_cluster() {
        let internal = cluster("a", CloudSpec {
            fake: Some(FakeCloudSpec::default()),
            ..Default::default()
        });
        let datacenter = seed::Datacenter {
            spec: seed::DatacenterSpec {
                fake: Some(DatacenterSpecFake::default()),
                ..Default::default()
            },
            ..Default::default()
        };
        validate_cluster(&internal, &datacenter, &config(), OperationType::Create)
            .expect("cluster is valid");

        let hetzner_dc = seed::Datacenter {
            spec: seed::DatacenterSpec {
                hetzner: Some(DatacenterSpecHetzner::default()),
                ..Default::default()
            },
            ..Default::default()
        };
        let missing = cluster("b", CloudSpec::default());
        let errors = validate_cluster(&missing, &hetzner_dc, &config(), OperationType::Create)
            .expect_err("provider is missing");
        assert_eq!(errors.to_string(), "no cloud provider specified");
    }

    #[rstest]
    #[case("", "", true)]
    #[case("04:00", "2h", true)]
    #[case("Sat 22:30", "1h30m", true)]
    #[case("Someday 04:00", "2h", false)]
    #[case("25:00", "2h", false)]
    #[case("04:00", "", false)]
    #[case("04:00", "forever", false)]
    fn update_windows(#[case] start: &str, #[case] length: &str, #[case] valid: bool) {
        let window = UpdateWindow {
            start: start.to_owned(),
            length: length.to_owned(),
        };
        assert_eq!(validate_update_window(&window).is_ok(), valid);
    }

    #[rstest]
    #[case(vec!["1.30.1", "1.27.9"], None)]
    #[case(vec!["1.26.3"], Some("[1.26.3]"))]
    #[case(vec!["1.31.0", "1.29.1", "1.31.0"], Some("[1.31.0]"))]
    #[case(vec!["2.30.0"], Some("[2.30.0]"))]
    fn kubelet_skew(#[case] kubelets: Vec<&str>, #[case] rejected: Option<&str>) {
        let kubelets = kubelets
            .into_iter()
            .map(|v| v.parse::<Semver>().expect("valid version"));
        let result = validate_kubelet_versions(&Semver::new(1, 30, 2), kubelets);
        match rejected {
            None => result.expect("kubelets are compatible"),
            Some(list) => {
                let message = result.expect_err("kubelets are too old").to_string();
                assert_eq!(
                    message,
                    format!(
                        "Cluster contains nodes running the following incompatible kubelet versions: {list}. Upgrade your nodes before you upgrade the cluster."
                    )
                );
            }
        }
    }
}
