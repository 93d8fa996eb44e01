//! # Value Resolution
//!
//! Values are layered key/value mappings (global, cluster, resource) that are
//! merged into the context a template is rendered against.
//!
//! The merge is shallow and right-biased: a later layer replaces an earlier
//! layer's top-level key entirely. Nested mappings are never merged, so a
//! `resources:` mapping in the resource layer fully replaces a `resources:`
//! mapping from the global layer.
//!
//! On top of the merged values the context carries reserved keys:
//!
//! - `Cluster`: `path`, `name`, `managed` and `annotations` of the cluster.
//! - `Resource`: `name`, `template` and `namespace` of the resource.
//! - `Secrets`: decrypted secret values, only while rendering a
//!   `kind: Secret` document.
//!
//! User values must not define these keys; [`check_reserved`] reports such a
//! collision during validation.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};

use crate::config::{Cluster, Resource};
use crate::error::{Error, Result};

/// Key/value mapping used for configuration values and template contexts.
pub type Values = BTreeMap<String, Value>;

/// Context key holding cluster metadata.
pub const CLUSTER_KEY: &str = "Cluster";
/// Context key holding resource metadata.
pub const RESOURCE_KEY: &str = "Resource";
/// Context key holding decrypted secrets for `kind: Secret` documents.
pub const SECRETS_KEY: &str = "Secrets";

/// Keys the template context reserves for itself.
pub const RESERVED_KEYS: [&str; 3] = [CLUSTER_KEY, RESOURCE_KEY, SECRETS_KEY];

/// Merge `layers` in order into a new mapping.
///
/// For every key present in more than one layer, the value from the last
/// layer containing it wins. Inputs are not modified.
pub fn resolve<'a, I>(layers: I) -> Values
where
    I: IntoIterator<Item = &'a Values>,
{
    let mut resolved = Values::new();
    for layer in layers {
        for (key, value) in layer {
            resolved.insert(key.clone(), value.clone());
        }
    }
    resolved
}

/// Build the template context for one resource of a cluster.
pub fn context(global: &Values, cluster: &Cluster, resource: &Resource) -> Values {
    let mut context = resolve([global, &cluster.values, &resource.values]);
    context.insert(CLUSTER_KEY.to_string(), cluster_metadata(cluster));
    context.insert(RESOURCE_KEY.to_string(), resource_metadata(resource));
    context
}

fn cluster_metadata(cluster: &Cluster) -> Value {
    let name = cluster.key.rsplit('/').next().unwrap_or(&cluster.key);
    let annotations: Mapping = cluster
        .annotations
        .iter()
        .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
        .collect();

    let mut metadata = Mapping::new();
    metadata.insert("path".into(), cluster.key.as_str().into());
    metadata.insert("name".into(), name.into());
    metadata.insert("managed".into(), cluster.managed.into());
    metadata.insert("annotations".into(), Value::Mapping(annotations));
    Value::Mapping(metadata)
}

fn resource_metadata(resource: &Resource) -> Value {
    let mut metadata = Mapping::new();
    metadata.insert("name".into(), resource.name.as_str().into());
    metadata.insert("template".into(), resource.template.as_str().into());
    metadata.insert("namespace".into(), resource.namespace.as_str().into());
    Value::Mapping(metadata)
}

/// Return a copy of `context` with `secrets` available under `Secrets`.
pub fn with_secrets(context: &Values, secrets: &Values) -> Values {
    let mut context = context.clone();
    let secrets: Mapping = secrets
        .iter()
        .map(|(k, v)| (Value::from(k.as_str()), v.clone()))
        .collect();
    context.insert(SECRETS_KEY.to_string(), Value::Mapping(secrets));
    context
}

/// Fail if `values` defines one of the reserved context keys.
pub fn check_reserved(values: &Values, scope: &str) -> Result<()> {
    match RESERVED_KEYS.iter().find(|key| values.contains_key(**key)) {
        Some(key) => Err(Error::ReservedKey {
            scope: scope.to_string(),
            key: key.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn values(yaml: &str) -> Values {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn cluster(key: &str) -> Cluster {
        Cluster {
            key: key.to_string(),
            path: crate::path::cluster_path(key).unwrap(),
            managed: true,
            annotations: BTreeMap::from([("team".to_string(), "platform".to_string())]),
            age_public_key: None,
            values: values("replicas: 2\nregion: us-east-1"),
            resources: IndexMap::new(),
        }
    }

    fn resource(name: &str) -> Resource {
        Resource {
            name: name.to_string(),
            managed: true,
            template: name.to_string(),
            namespace: name.to_string(),
            values: values("replicas: 3"),
        }
    }

    #[test]
    fn test_resolve_later_layers_win() {
        let a = values("x: 1\ny: a");
        let b = values("y: b\nz: true");
        let c = values("z: false");

        let resolved = resolve([&a, &b, &c]);
        assert_eq!(resolved["x"], Value::from(1));
        assert_eq!(resolved["y"], Value::from("b"));
        assert_eq!(resolved["z"], Value::from(false));
    }

    #[test]
    fn test_resolve_is_shallow() {
        let a = values("image:\n  repository: nginx\n  tag: '1.0'");
        let c = values("image:\n  tag: '2.0'");

        let resolved = resolve([&a, &c]);
        let image = resolved["image"].as_mapping().unwrap();
        assert_eq!(image.len(), 1);
        assert_eq!(image.get("tag"), Some(&Value::from("2.0")));
        assert!(image.get("repository").is_none());
    }

    #[test]
    fn test_resolve_empty_layers() {
        let empty = Values::new();
        assert!(resolve([&empty, &empty]).is_empty());
        assert!(resolve(std::iter::empty()).is_empty());
    }

    #[test]
    fn test_resolve_does_not_mutate_inputs() {
        let a = values("x: 1");
        let b = values("x: 2");
        let _ = resolve([&a, &b]);
        assert_eq!(a["x"], Value::from(1));
        assert_eq!(b["x"], Value::from(2));
    }

    #[test]
    fn test_context_layers_and_metadata() {
        let global = values("replicas: 1\ndomain: example.com");
        let cluster = cluster("aws/prod/main");
        let resource = resource("podinfo");

        let context = context(&global, &cluster, &resource);
        assert_eq!(context["replicas"], Value::from(3));
        assert_eq!(context["region"], Value::from("us-east-1"));
        assert_eq!(context["domain"], Value::from("example.com"));

        let meta = context[CLUSTER_KEY].as_mapping().unwrap();
        assert_eq!(meta.get("path"), Some(&Value::from("aws/prod/main")));
        assert_eq!(meta.get("name"), Some(&Value::from("main")));
        assert_eq!(meta.get("managed"), Some(&Value::from(true)));

        let meta = context[RESOURCE_KEY].as_mapping().unwrap();
        assert_eq!(meta.get("namespace"), Some(&Value::from("podinfo")));
        assert!(!context.contains_key(SECRETS_KEY));
    }

    #[test]
    fn test_with_secrets_copies_context() {
        let context = values("a: 1");
        let secrets = values("password: hunter2");

        let secret_context = with_secrets(&context, &secrets);
        assert!(!context.contains_key(SECRETS_KEY));
        let injected = secret_context[SECRETS_KEY].as_mapping().unwrap();
        assert_eq!(injected.get("password"), Some(&Value::from("hunter2")));
    }

    #[test]
    fn test_check_reserved() {
        assert!(check_reserved(&values("replicas: 1"), "global").is_ok());
        let err = check_reserved(&values("Secrets: {}"), "cluster dev").unwrap_err();
        assert!(err.to_string().contains("reserved key 'Secrets'"));
        assert!(err.to_string().contains("cluster dev"));
    }
}
