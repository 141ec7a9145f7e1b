use serde::{Deserialize, Serialize};

/// A VPC subnet offered for new machine deployments.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSubnet {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(rename = "availabilityZoneID", default)]
    pub availability_zone_id: String,
    #[serde(rename = "ipv4cidr", default)]
    pub ipv4_cidr: String,
    #[serde(rename = "ipv6cidr", default)]
    pub ipv6_cidr: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<AwsTag>,
    #[serde(default)]
    pub state: String,
    #[serde(rename = "availableIPAddressCount", default)]
    pub available_ip_address_count: i64,
    /// Whether this is the AWS default subnet of its availability zone.
    #[serde(default)]
    pub default: bool,
    /// Whether the dashboard suggests this subnet for the next machine deployment.
    #[serde(default)]
    pub is_default_subnet: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct AwsTag {
    pub key: String,
    pub value: String,
}

/// An EC2 instance type.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsSize {
    pub name: String,
    pub pretty_name: String,
    /// Memory in GiB.
    pub memory: f32,
    #[serde(rename = "vcpus")]
    pub vcpus: i32,
    #[serde(rename = "gpus")]
    pub gpus: i32,
    /// Hourly on-demand price in the requested region.
    pub price: f64,
    pub architecture: String,
}
