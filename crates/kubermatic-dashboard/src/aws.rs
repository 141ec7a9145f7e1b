//! AWS helpers: default subnet suggestion and the instance type catalog.

use std::{collections::BTreeMap, path::Path};

use kubermatic_apiv1::aws::{AwsSize, AwsSubnet};
use kubermatic_crd::{
    cloud::ProviderType,
    configuration::{GLOBAL_SETTINGS_NAME, KubermaticSetting},
    machine::{self, MachineDeployment},
    seed::MachineFlavorFilter,
};
use serde::Deserialize;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use strum::{Display, EnumString};

use crate::{
    auth::{authorize, user_info},
    cluster::{self, get_internal_cluster},
    context::Context,
    datacenter::datacenter_from_seed_map,
    error::HttpError,
    store::ObjectStore,
};

/// Instance types above this hourly price are only offered when GPUs are enabled.
const MAX_PRICE_WITHOUT_GPU: f64 = 1.0;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("the subnet list can not be empty"))]
    NoSubnets,

    #[snafu(display("failed to get node cloud spec from machine deployment {name:?}"))]
    ProviderConfig {
        source: machine::Error,
        name: String,
    },

    #[snafu(display("cloud spec missing"))]
    NotAws,

    #[snafu(display("failed to read the instance type inventory {path:?}"))]
    ReadCatalog {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("failed to parse the instance type inventory {path:?}"))]
    ParseCatalog {
        source: serde_json::Error,
        path: String,
    },

    #[snafu(display("AWS instance type data not initialized"))]
    CatalogUnavailable,

    #[snafu(display("unknown architecture {value:?}"))]
    UnknownArchitecture {
        source: strum::ParseError,
        value: String,
    },

    #[snafu(display("cloud spec for {cluster} not found"))]
    ClusterNotAws { cluster: String },

    #[snafu(display("cloud spec (dc) for {cluster} not found"))]
    DatacenterNotAws { cluster: String },
}

impl From<Error> for HttpError {
    fn from(err: Error) -> Self {
        match err {
            Error::NoSubnets | Error::NotAws | Error::UnknownArchitecture { .. } => {
                Self::bad_request(err.to_string())
            }
            Error::ClusterNotAws { .. } | Error::DatacenterNotAws { .. } => {
                Self::not_found(err.to_string())
            }
            Error::CatalogUnavailable => Self::service_unavailable(err.to_string()),
            Error::ProviderConfig { .. } | Error::ReadCatalog { .. } | Error::ParseCatalog { .. } => {
                Self::internal_from(&err)
            }
        }
    }
}

/// Marks exactly one subnet as the suggested subnet for the next machine deployment.
///
/// Without machines the first subnet wins. Otherwise the first subnet in an availability zone
/// without machines is picked, falling back to the first subnet when every zone has machines.
pub fn set_default_subnet(
    machine_deployments: &[MachineDeployment],
    mut subnets: Vec<AwsSubnet>,
) -> Result<Vec<AwsSubnet>> {
    ensure!(!subnets.is_empty(), NoSubnetsSnafu);

    let mut machines_per_zone: BTreeMap<String, i64> = subnets
        .iter()
        .map(|subnet| (subnet.availability_zone.clone(), 0))
        .collect();
    let mut machines = 0;
    for md in machine_deployments {
        let config = md.provider_config().context(ProviderConfigSnafu {
            name: md.metadata.name.clone().unwrap_or_default(),
        })?;
        ensure!(config.cloud_provider == ProviderType::Aws, NotAwsSnafu);

        let replicas = i64::from(md.replicas());
        let zone = config.string_field("availabilityZone").unwrap_or_default();
        *machines_per_zone.entry(zone.to_owned()).or_default() += replicas;
        machines += replicas;
    }

    for subnet in &mut subnets {
        subnet.is_default_subnet = false;
    }
    let default = if machines == 0 {
        0
    } else {
        subnets
            .iter()
            .position(|subnet| machines_per_zone.get(&subnet.availability_zone) == Some(&0))
            .unwrap_or(0)
    };
    if let Some(subnet) = subnets.get_mut(default) {
        subnet.is_default_subnet = true;
    }
    Ok(subnets)
}

#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Architecture {
    X64,
    Arm64,
}

impl Architecture {
    /// Parses the optional `architecture` query parameter.
    pub fn parse_optional(value: Option<&str>) -> Result<Option<Self>> {
        value
            .filter(|value| !value.is_empty())
            .map(|value| value.parse().context(UnknownArchitectureSnafu { value }))
            .transpose()
    }

    /// Graviton is the only Arm based processor family.
    fn of_processor(physical_processor: &str) -> Self {
        if physical_processor.contains("Graviton") {
            Self::Arm64
        } else {
            Self::X64
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceType {
    pub instance_type: String,
    #[serde(default)]
    pub pretty_name: String,
    /// GiB
    #[serde(default)]
    pub memory: f32,
    #[serde(default)]
    pub vcpu: i32,
    #[serde(default)]
    pub gpu: i32,
    #[serde(default)]
    pub physical_processor: String,
    /// Pricing keyed by region.
    #[serde(default)]
    pub pricing: BTreeMap<String, RegionPricing>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct RegionPricing {
    #[serde(default)]
    pub linux: OsPricing,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct OsPricing {
    #[serde(rename = "ondemand", default)]
    pub on_demand: f64,
}

/// The EC2 instance type inventory, loaded once at startup and shared read-only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceTypeCatalog {
    instance_types: Vec<InstanceType>,
}

impl InstanceTypeCatalog {
    pub fn new(instance_types: Vec<InstanceType>) -> Self {
        Self { instance_types }
    }

    /// Reads a JSON array of instance types.
    pub fn from_file(path: &Path) -> Result<Self> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).context(ReadCatalogSnafu { path: &display })?;
        let instance_types = serde_json::from_str(&contents).context(ParseCatalogSnafu { path: display })?;
        Ok(Self::new(instance_types))
    }

    /// Instance types available in `region`, optionally restricted to one architecture, that
    /// pass `filter`.
    pub fn sizes(
        &self,
        region: &str,
        architecture: Option<Architecture>,
        filter: &MachineFlavorFilter,
    ) -> Vec<AwsSize> {
        self.instance_types
            .iter()
            .filter_map(|instance| {
                let price = instance.pricing.get(region)?.linux.on_demand;
                if price <= 0.0 {
                    return None;
                }
                let machine_architecture = Architecture::of_processor(&instance.physical_processor);
                if architecture.is_some_and(|wanted| wanted != machine_architecture) {
                    return None;
                }
                Some(AwsSize {
                    name: instance.instance_type.clone(),
                    pretty_name: instance.pretty_name.clone(),
                    memory: instance.memory,
                    vcpus: instance.vcpu,
                    gpus: instance.gpu,
                    price,
                    architecture: machine_architecture.to_string(),
                })
            })
            .filter(|size| passes_filter(size, filter))
            .collect()
    }
}

/// Sizes offered by `catalog`, or an error when the server runs without an inventory.
pub fn sizes(
    catalog: Option<&InstanceTypeCatalog>,
    region: &str,
    architecture: Option<Architecture>,
    filter: &MachineFlavorFilter,
) -> Result<Vec<AwsSize>> {
    let catalog = catalog.ok_or(Error::CatalogUnavailable)?;
    Ok(catalog.sizes(region, architecture, filter))
}

fn passes_filter(size: &AwsSize, filter: &MachineFlavorFilter) -> bool {
    if !filter.enable_gpu && (size.price > MAX_PRICE_WITHOUT_GPU || size.gpus > 0) {
        return false;
    }
    #[allow(clippy::cast_possible_truncation)]
    let memory = size.memory as i32;
    within(size.vcpus, filter.min_cpu, filter.max_cpu) && within(memory, filter.min_ram, filter.max_ram)
}

/// A maximum of zero means unlimited.
fn within(value: i32, min: i32, max: i32) -> bool {
    let max = if max == 0 { i32::MAX } else { max };
    (min..=max).contains(&value)
}

/// The instance sizes offered for the nodes of an AWS cluster.
///
/// The region comes from the cluster's datacenter, whose machine flavor filter wins over the
/// global one from the `globalsettings`.
pub async fn cluster_sizes<S: ObjectStore>(
    ctx: &Context<S>,
    email: &str,
    project_id: &str,
    cluster_id: &str,
    architecture: Option<Architecture>,
) -> cluster::Result<Vec<AwsSize>> {
    let authorized = authorize(&ctx.store, email, project_id).await?;
    let cluster = get_internal_cluster(ctx, &authorized, project_id, cluster_id).await?;
    if cluster.spec.cloud.aws.is_none() {
        return Err(Error::ClusterNotAws {
            cluster: cluster_id.to_owned(),
        }
        .into());
    }

    let seeds = ctx.seeds().await?;
    let admin = user_info(&ctx.store, email, "").await?;
    let (_, datacenter) = datacenter_from_seed_map(&admin, &seeds, &cluster.spec.cloud.datacenter_name)?;
    let region = &datacenter
        .spec
        .aws
        .as_ref()
        .context(DatacenterNotAwsSnafu { cluster: cluster_id })?
        .region;

    let settings = match ctx.store.get::<KubermaticSetting>(None, GLOBAL_SETTINGS_NAME).await {
        Ok(settings) => Some(settings.spec),
        Err(err) if err.is_not_found() => None,
        Err(err) => return Err(err.into()),
    };
    let filter = determine_machine_flavor_filter(
        settings
            .as_ref()
            .and_then(|settings| settings.machine_deployment_vm_resource_quota.as_ref()),
        datacenter.spec.machine_flavor_filter.as_ref(),
    );
    Ok(sizes(ctx.instance_types.as_deref(), region, architecture, &filter)?)
}

/// The datacenter's filter wins over the global one.
pub fn determine_machine_flavor_filter(
    global: Option<&MachineFlavorFilter>,
    datacenter: Option<&MachineFlavorFilter>,
) -> MachineFlavorFilter {
    datacenter.or(global).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn subnet(id: &str, zone: &str) -> AwsSubnet {
        AwsSubnet {
            id: id.to_owned(),
            availability_zone: zone.to_owned(),
            ..Default::default()
        }
    }

    fn subnets() -> Vec<AwsSubnet> {
        vec![
            subnet("subnet-a", "eu-central-1a"),
            subnet("subnet-b", "eu-central-1b"),
            subnet("subnet-c", "eu-central-1c"),
        ]
    }

    fn machine_deployment(zone: &str, replicas: Option<i32>) -> MachineDeployment {
        serde_json::from_value(json!({
            "apiVersion": "cluster.k8s.io/v1alpha1",
            "kind": "MachineDeployment",
            "metadata": {"name": format!("workers-{zone}"), "namespace": "kube-system"},
            "spec": {
                "replicas": replicas,
                "template": {"spec": {"providerSpec": {"value": {
                    "cloudProvider": "aws",
                    "cloudProviderSpec": {"availabilityZone": zone, "instanceType": "t3.large"},
                }}}},
            },
        }))
        .expect("test machine deployment is valid")
    }

    fn defaults(subnets: &[AwsSubnet]) -> Vec<&str> {
        subnets
            .iter()
            .filter(|subnet| subnet.is_default_subnet)
            .map(|subnet| subnet.id.as_str())
            .collect()
    }

    #[rstest]
    #[case::no_machines(vec![], "subnet-a")]
    #[case::zero_replicas(vec![machine_deployment("eu-central-1a", Some(0))], "subnet-a")]
    #[case::unset_replicas(vec![machine_deployment("eu-central-1a", None)], "subnet-a")]
    #[case::first_empty_zone(vec![machine_deployment("eu-central-1a", Some(2))], "subnet-b")]
    #[case::skips_busy_zones(
        vec![machine_deployment("eu-central-1a", Some(2)), machine_deployment("eu-central-1b", Some(1))],
        "subnet-c"
    )]
    #[case::all_zones_busy(
        vec![
            machine_deployment("eu-central-1c", Some(1)),
            machine_deployment("eu-central-1b", Some(1)),
            machine_deployment("eu-central-1a", Some(1)),
        ],
        "subnet-a"
    )]
    fn default_subnet(#[case] machine_deployments: Vec<MachineDeployment>, #[case] expected: &str) {
        let mut input = subnets();
        input[2].is_default_subnet = true;
        let subnets = set_default_subnet(&machine_deployments, input).expect("subnets are given");
        assert_eq!(defaults(&subnets), [expected]);
    }

    #[test]
    fn default_subnet_errors() {
        let err = set_default_subnet(&[], Vec::new()).expect_err("no subnets");
        assert_eq!(HttpError::from(err).message(), "the subnet list can not be empty");

        let mut gcp = machine_deployment("eu-central-1a", Some(1));
        gcp.spec.template.spec.provider_spec.value = Some(json!({"cloudProvider": "gcp"}));
        let err = set_default_subnet(&[gcp], subnets()).expect_err("not an AWS machine");
        assert_eq!(HttpError::from(err).code(), http::StatusCode::BAD_REQUEST);
    }

    fn catalog() -> InstanceTypeCatalog {
        serde_json::from_value::<Vec<InstanceType>>(json!([
            {"instanceType": "t3.large", "prettyName": "T3 Large", "memory": 8.0, "vcpu": 2,
             "physicalProcessor": "Intel Skylake", "pricing": {"eu-central-1": {"linux": {"ondemand": 0.096}}}},
            {"instanceType": "m6g.xlarge", "prettyName": "M6G Extra Large", "memory": 16.0, "vcpu": 4,
             "physicalProcessor": "AWS Graviton2", "pricing": {"eu-central-1": {"linux": {"ondemand": 0.184}}}},
            {"instanceType": "m5.8xlarge", "memory": 128.0, "vcpu": 32,
             "physicalProcessor": "Intel Skylake", "pricing": {"eu-central-1": {"linux": {"ondemand": 1.84}}}},
            {"instanceType": "g4dn.xlarge", "memory": 16.0, "vcpu": 4, "gpu": 1,
             "physicalProcessor": "Intel Cascade Lake", "pricing": {"eu-central-1": {"linux": {"ondemand": 0.658}}}},
            {"instanceType": "us-only", "memory": 4.0, "vcpu": 2,
             "pricing": {"us-east-1": {"linux": {"ondemand": 0.05}}}},
            {"instanceType": "unpriced", "memory": 4.0, "vcpu": 2,
             "pricing": {"eu-central-1": {"linux": {"ondemand": 0.0}}}},
        ]))
        .map(InstanceTypeCatalog::new)
        .expect("test catalog is valid")
    }

    fn names(sizes: &[AwsSize]) -> Vec<&str> {
        sizes.iter().map(|size| size.name.as_str()).collect()
    }

    #[rstest]
    #[case::default_filter(None, MachineFlavorFilter::default(), &["t3.large", "m6g.xlarge"])]
    #[case::arm_only(Some(Architecture::Arm64), MachineFlavorFilter::default(), &["m6g.xlarge"])]
    #[case::x64_only(Some(Architecture::X64), MachineFlavorFilter::default(), &["t3.large"])]
    #[case::gpu(
        None,
        MachineFlavorFilter { enable_gpu: true, ..Default::default() },
        &["t3.large", "m6g.xlarge", "m5.8xlarge", "g4dn.xlarge"]
    )]
    #[case::cpu_bounds(
        None,
        MachineFlavorFilter { min_cpu: 3, max_cpu: 4, ..Default::default() },
        &["m6g.xlarge"]
    )]
    #[case::memory_bounds(
        None,
        MachineFlavorFilter { min_ram: 10, enable_gpu: true, ..Default::default() },
        &["m6g.xlarge", "m5.8xlarge", "g4dn.xlarge"]
    )]
    fn filtered_sizes(
        #[case] architecture: Option<Architecture>,
        #[case] filter: MachineFlavorFilter,
        #[case] expected: &[&str],
    ) {
        let catalog = catalog();
        let sizes = sizes(Some(&catalog), "eu-central-1", architecture, &filter).expect("catalog is loaded");
        assert_eq!(names(&sizes), expected);
    }

    #[test]
    fn sizes_carry_architecture_and_price() {
        let sizes = catalog().sizes("eu-central-1", Some(Architecture::Arm64), &MachineFlavorFilter::default());
        assert_eq!(sizes, [AwsSize {
            name: "m6g.xlarge".to_owned(),
            pretty_name: "M6G Extra Large".to_owned(),
            memory: 16.0,
            vcpus: 4,
            gpus: 0,
            price: 0.184,
            architecture: "arm64".to_owned(),
        }]);
    }

    #[test]
    fn missing_catalog_is_unavailable() {
        let err = sizes(None, "eu-central-1", None, &MachineFlavorFilter::default()).expect_err("no catalog");
        assert_eq!(HttpError::from(err).code(), http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn catalog_from_file() {
        let file = tempfile::NamedTempFile::new().expect("temp file is created");
        std::fs::write(
            file.path(),
            r#"[{"instanceType": "t3.large", "vcpu": 2, "memory": 8, "pricing": {"eu-central-1": {"linux": {"ondemand": 0.1}}}}]"#,
        )
        .expect("temp file is written");
        let catalog = InstanceTypeCatalog::from_file(file.path()).expect("inventory is valid");
        assert_eq!(names(&catalog.sizes("eu-central-1", None, &MachineFlavorFilter::default())), ["t3.large"]);

        std::fs::write(file.path(), "not json").expect("temp file is written");
        assert!(InstanceTypeCatalog::from_file(file.path()).is_err());
    }

    #[rstest]
    #[case(None, None, MachineFlavorFilter::default())]
    #[case(Some(2), None, MachineFlavorFilter { min_cpu: 2, ..Default::default() })]
    #[case(Some(2), Some(4), MachineFlavorFilter { min_cpu: 4, ..Default::default() })]
    #[case(None, Some(4), MachineFlavorFilter { min_cpu: 4, ..Default::default() })]
    fn flavor_filter_precedence(
        #[case] global: Option<i32>,
        #[case] datacenter: Option<i32>,
        #[case] expected: MachineFlavorFilter,
    ) {
        let filter = |min_cpu| MachineFlavorFilter { min_cpu, ..Default::default() };
        let global = global.map(filter);
        let datacenter = datacenter.map(filter);
        assert_eq!(
            determine_machine_flavor_filter(global.as_ref(), datacenter.as_ref()),
            expected
        );
    }

    #[tokio::test]
    async fn sizes_for_a_cluster() {
        use std::sync::Arc;

        use kubermatic_crd::configuration::SettingSpec;

        use crate::{
            auth::tests::{OWNER, PROJECT},
            cluster::tests::{context, hetzner, stored_cluster},
            convert::cluster::tests::aws,
        };

        let mut ctx = context().await;
        stored_cluster(&ctx, "aws1", aws()).await;
        stored_cluster(&ctx, "hetzner1", hetzner()).await;

        let err = cluster_sizes(&ctx, OWNER, PROJECT, "aws1", None)
            .await
            .expect_err("server runs without inventory");
        assert_eq!(err.code(), http::StatusCode::SERVICE_UNAVAILABLE);

        ctx.instance_types = Some(Arc::new(catalog()));
        let sizes = cluster_sizes(&ctx, OWNER, PROJECT, "aws1", None)
            .await
            .expect("sizes of the datacenter region");
        assert_eq!(names(&sizes), ["t3.large", "m6g.xlarge"]);

        ctx.store
            .insert(KubermaticSetting::new(GLOBAL_SETTINGS_NAME, SettingSpec {
                machine_deployment_vm_resource_quota: Some(MachineFlavorFilter {
                    min_cpu: 4,
                    ..Default::default()
                }),
            }))
            .await
            .expect("settings are stored");
        let arm = Architecture::parse_optional(Some("arm64")).expect("known architecture");
        let sizes = cluster_sizes(&ctx, OWNER, PROJECT, "aws1", arm)
            .await
            .expect("sizes of the datacenter region");
        assert_eq!(names(&sizes), ["m6g.xlarge"]);

        let err = cluster_sizes(&ctx, OWNER, PROJECT, "hetzner1", None)
            .await
            .expect_err("not an AWS cluster");
        assert_eq!(err.code(), http::StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "cloud spec for hetzner1 not found");

        let err = Architecture::parse_optional(Some("sparc")).expect_err("unknown architecture");
        assert_eq!(HttpError::from(err).code(), http::StatusCode::BAD_REQUEST);
        assert_eq!(Architecture::parse_optional(Some("")).expect("empty is unset"), None);
    }
}
