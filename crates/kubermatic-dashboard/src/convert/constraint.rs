use kubermatic_apiv1::constraint::Constraint;
use kubermatic_crd::constraint as internal;

/// The audit status lives in the user cluster and is not read here.
pub fn to_external(constraint: &internal::Constraint) -> Constraint {
    Constraint {
        name: constraint.metadata.name.clone().unwrap_or_default(),
        labels: constraint.metadata.labels.clone().unwrap_or_default(),
        spec: constraint.spec.clone(),
        status: None,
    }
}

pub fn to_internal(constraint: &Constraint, namespace: &str) -> internal::Constraint {
    let mut internal = internal::Constraint::new(&constraint.name, constraint.spec.clone());
    internal.metadata.namespace = Some(namespace.to_owned());
    internal.metadata.labels = (!constraint.labels.is_empty()).then(|| constraint.labels.clone());
    internal
}
