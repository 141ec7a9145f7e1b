use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Error, RequiredFields, TemplateConflictSnafu, guarded_serde};

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self")]
pub struct DigitaloceanNodeSpec {
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub backups: bool,
    #[serde(default)]
    pub ipv6: bool,
    #[serde(default)]
    pub monitoring: bool,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl DigitaloceanNodeSpec {
    pub fn validate(&self) -> Result<(), Error> {
        RequiredFields::default()
            .non_empty("size", &self.size)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self")]
pub struct HetznerNodeSpec {
    #[serde(default)]
    pub network: String,
    #[serde(rename = "type", default)]
    pub type_: String,
}

impl HetznerNodeSpec {
    pub fn validate(&self) -> Result<(), Error> {
        RequiredFields::default()
            .non_empty("type", &self.type_)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct AzureNodeSpec {
    #[serde(default)]
    pub size: String,
    #[serde(rename = "assignPublicIP", default)]
    pub assign_public_ip: bool,
    #[serde(default)]
    pub os_disk_size: i32,
    #[serde(default)]
    pub data_disk_size: i32,
    #[serde(default)]
    pub zones: Option<Vec<String>>,
    #[serde(rename = "imageID", default)]
    pub image_id: String,
    #[serde(default)]
    pub assign_availability_set: bool,
    #[serde(default)]
    pub enable_accelerated_networking: Option<bool>,
}

impl AzureNodeSpec {
    pub fn validate(&self) -> Result<(), Error> {
        RequiredFields::default()
            .non_empty("size", &self.size)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct VSphereNodeSpec {
    #[serde(default)]
    pub cpus: i32,
    #[serde(default)]
    pub memory: i32,
    #[serde(rename = "diskSizeGB", default)]
    pub disk_size_gb: Option<i64>,
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub vm_anti_affinity: Option<bool>,
}

impl VSphereNodeSpec {
    pub fn validate(&self) -> Result<(), Error> {
        RequiredFields::default()
            .positive("cpus", self.cpus.into())
            .positive("memory", self.memory.into())
            .positive("diskSizeGB", self.disk_size_gb.unwrap_or_default())
            .non_empty("template", &self.template)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct OpenstackNodeSpec {
    #[serde(default)]
    pub flavor: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub disk_size: Option<i32>,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default)]
    pub instance_ready_check_period: String,
    #[serde(default)]
    pub instance_ready_check_timeout: String,
    #[serde(default)]
    pub server_group: String,
    #[serde(default)]
    pub config_drive: bool,
}

impl OpenstackNodeSpec {
    pub fn validate(&self) -> Result<(), Error> {
        RequiredFields::default()
            .non_empty("flavor", &self.flavor)
            .non_empty("image", &self.image)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct AwsNodeSpec {
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub disk_size: i32,
    #[serde(default)]
    pub volume_type: String,
    #[serde(default)]
    pub ami: String,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(rename = "subnetID", default)]
    pub subnet_id: String,
    #[serde(rename = "assignPublicIP", default)]
    pub assign_public_ip: Option<bool>,
    #[serde(default)]
    pub is_spot_instance: Option<bool>,
    #[serde(default)]
    pub ebs_volume_encrypted: Option<bool>,
}

impl AwsNodeSpec {
    pub fn validate(&self) -> Result<(), Error> {
        RequiredFields::default()
            .non_empty("instanceType", &self.instance_type)
            .positive("diskSize", self.disk_size.into())
            .non_empty("volumeType", &self.volume_type)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct PacketNodeSpec {
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl PacketNodeSpec {
    pub fn validate(&self) -> Result<(), Error> {
        RequiredFields::default()
            .non_empty("instanceType", &self.instance_type)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct GcpNodeSpec {
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub machine_type: String,
    #[serde(default)]
    pub disk_size: i64,
    #[serde(default)]
    pub disk_type: String,
    #[serde(default)]
    pub preemptible: bool,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub custom_image: String,
}

impl GcpNodeSpec {
    pub fn validate(&self) -> Result<(), Error> {
        RequiredFields::default()
            .non_empty("zone", &self.zone)
            .positive("diskSize", self.disk_size)
            .non_empty("machineType", &self.machine_type)
            .non_empty("diskType", &self.disk_type)
            .finish()
    }
}

/// Reference to a KubeVirt `VirtualMachineInstancetype` or `VirtualMachinePreference`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct KubevirtTemplateMatcher {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecondaryDisk {
    pub size: String,
    pub storage_class_name: String,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NodeAffinityPreset {
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub values: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologySpreadConstraint {
    pub max_skew: i32,
    pub topology_key: String,
    pub when_unsatisfiable: String,
}

/// KubeVirt virtual machine nodes. CPUs and memory come either from the node spec itself or from
/// a flavor/instancetype, never from both.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct KubevirtNodeSpec {
    #[serde(default)]
    pub flavor_name: String,
    #[serde(default)]
    pub flavor_profile: String,
    #[serde(default)]
    pub instancetype: Option<KubevirtTemplateMatcher>,
    #[serde(default)]
    pub preference: Option<KubevirtTemplateMatcher>,
    #[serde(default)]
    pub cpus: String,
    #[serde(default)]
    pub memory: String,
    #[serde(rename = "primaryDiskOSImage", default)]
    pub primary_disk_os_image: String,
    #[serde(default)]
    pub primary_disk_storage_class_name: String,
    #[serde(default)]
    pub primary_disk_size: String,
    #[serde(default)]
    pub secondary_disks: Option<Vec<SecondaryDisk>>,
    #[serde(default)]
    pub pod_affinity_preset: String,
    #[serde(default)]
    pub pod_anti_affinity_preset: String,
    #[serde(default)]
    pub node_affinity_preset: NodeAffinityPreset,
    #[serde(default)]
    pub topology_spread_constraints: Option<Vec<TopologySpreadConstraint>>,
}

impl KubevirtNodeSpec {
    fn uses_template(&self) -> bool {
        !self.flavor_name.is_empty() || self.instancetype.is_some()
    }

    pub fn validate(&self) -> Result<(), Error> {
        let uses_template = self.uses_template();
        if uses_template {
            let conflicting: Vec<&'static str> = [("cpus", &self.cpus), ("memory", &self.memory)]
                .into_iter()
                .filter(|(_, value)| !value.is_empty())
                .map(|(field, _)| field)
                .collect();
            if !conflicting.is_empty() {
                return TemplateConflictSnafu {
                    fields: conflicting,
                }
                .fail();
            }
        }

        RequiredFields::default()
            .check("cpus", uses_template || !self.cpus.is_empty())
            .check("memory", uses_template || !self.memory.is_empty())
            .non_empty("primaryDiskOSImage", &self.primary_disk_os_image)
            .non_empty(
                "primaryDiskStorageClassName",
                &self.primary_disk_storage_class_name,
            )
            .non_empty("primaryDiskSize", &self.primary_disk_size)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct AlibabaNodeSpec {
    #[serde(default)]
    pub instance_type: String,
    #[serde(default)]
    pub disk_size: String,
    #[serde(default)]
    pub disk_type: String,
    #[serde(rename = "vSwitchID", default)]
    pub v_switch_id: String,
    #[serde(default)]
    pub internet_max_bandwidth_out: String,
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(rename = "zoneID", default)]
    pub zone_id: String,
}

impl AlibabaNodeSpec {
    pub fn validate(&self) -> Result<(), Error> {
        RequiredFields::default()
            .non_empty("instanceType", &self.instance_type)
            .non_empty("diskSize", &self.disk_size)
            .non_empty("diskType", &self.disk_type)
            .non_empty("vSwitchID", &self.v_switch_id)
            .non_empty("internetMaxBandwidthOut", &self.internet_max_bandwidth_out)
            .non_empty("zoneID", &self.zone_id)
            .finish()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnexiaDiskConfig {
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performance_type: Option<String>,
}

/// Anexia nodes take their disks either from the legacy `diskSize` or from `disks`.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct AnexiaNodeSpec {
    #[serde(rename = "vlanID", default)]
    pub vlan_id: String,
    #[serde(rename = "templateID", default)]
    pub template_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub template_build: String,
    #[serde(default)]
    pub cpus: i32,
    #[serde(default)]
    pub memory: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<AnexiaDiskConfig>,
}

impl AnexiaNodeSpec {
    pub fn validate(&self) -> Result<(), Error> {
        let has_disks = !self.disks.is_empty();
        let has_disk_size = self.disk_size.is_some();

        RequiredFields::default()
            .non_empty("vlanID missing", &self.vlan_id)
            .positive("cpus missing", self.cpus.into())
            .positive("memory missing", self.memory)
            .check(
                "neither templateID nor template is set",
                !self.template_id.is_empty() || !self.template.is_empty(),
            )
            .check("disks missing", has_disks || has_disk_size)
            .check(
                "both disks and diskSize configured but only one of those allowed",
                !(has_disks && has_disk_size),
            )
            .finish()
    }
}

guarded_serde!(
    DigitaloceanNodeSpec,
    HetznerNodeSpec,
    AzureNodeSpec,
    VSphereNodeSpec,
    OpenstackNodeSpec,
    AwsNodeSpec,
    PacketNodeSpec,
    GcpNodeSpec,
    KubevirtNodeSpec,
    AlibabaNodeSpec,
    AnexiaNodeSpec,
);
