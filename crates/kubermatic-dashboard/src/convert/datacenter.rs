use kubermatic_apiv1::datacenter::{Datacenter, DatacenterMeta, DatacenterSpec};
use kubermatic_crd::seed;

/// Flattens a datacenter of `seed_name` into its external shape.
pub fn to_external(name: &str, seed_name: &str, datacenter: &seed::Datacenter) -> Datacenter {
    Datacenter {
        metadata: DatacenterMeta {
            name: name.to_owned(),
        },
        spec: DatacenterSpec {
            seed: seed_name.to_owned(),
            country: datacenter.country.clone(),
            location: datacenter.location.clone(),
            provider: datacenter
                .spec
                .provider()
                .map(|provider| provider.to_string())
                .unwrap_or_default(),
            node: datacenter.node.clone(),
            datacenter: datacenter.spec.clone(),
        },
    }
}

/// The stored form of `spec`. The seed and provider fields are not part of it.
pub fn to_internal(spec: &DatacenterSpec) -> seed::Datacenter {
    seed::Datacenter {
        country: spec.country.clone(),
        location: spec.location.clone(),
        node: spec.node.clone(),
        spec: spec.datacenter.clone(),
    }
}

#[cfg(test)]
mod tests {
    use kubermatic_crd::seed::{DatacenterSpecAws, DatacenterSpecHetzner};

    use super::*;

    #[test]
    fn provider_is_derived() {
        let internal = seed::Datacenter {
            country: "DE".to_owned(),
            location: "Frankfurt".to_owned(),
            node: None,
            spec: seed::DatacenterSpec {
                aws: Some(DatacenterSpecAws {
                    region: "eu-central-1".to_owned(),
                    ..Default::default()
                }),
                ..Default::default()
            },
        };

        let external = to_external("aws-eu-central-1a", "europe", &internal);
        assert_eq!(external.metadata.name, "aws-eu-central-1a");
        assert_eq!(external.spec.seed, "europe");
        assert_eq!(external.spec.provider, "aws");
        assert_eq!(to_internal(&external.spec), internal);
    }

    #[test]
    fn provider_input_is_ignored() {
        let spec = DatacenterSpec {
            provider: "aws".to_owned(),
            datacenter: seed::DatacenterSpec {
                hetzner: Some(DatacenterSpecHetzner::default()),
                ..Default::default()
            },
            ..Default::default()
        };
        let external = to_external("dc", "seed", &to_internal(&spec));
        assert_eq!(external.spec.provider, "hetzner");
    }
}
