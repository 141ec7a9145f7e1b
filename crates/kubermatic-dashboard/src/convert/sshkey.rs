use kubermatic_apiv1::{
    ObjectMeta,
    sshkey::{SshKey, SshKeySpec},
};
use kubermatic_crd::sshkey::UserSSHKey;

pub fn to_external(key: &UserSSHKey) -> SshKey {
    SshKey {
        metadata: ObjectMeta {
            id: key.metadata.name.clone().unwrap_or_default(),
            name: key.spec.name.clone(),
            creation_timestamp: key.metadata.creation_timestamp.clone(),
            deletion_timestamp: key.metadata.deletion_timestamp.clone(),
            ..Default::default()
        },
        spec: SshKeySpec {
            fingerprint: key.spec.fingerprint.clone(),
            public_key: key.spec.public_key.clone(),
        },
    }
}
