//! # Configuration Schema and Parsing
//!
//! This module defines the data model of the fkt configuration file and the
//! logic for decoding it.
//!
//! ## Two layers
//!
//! Decoding happens into *raw* structs whose optional fields mirror what a
//! user may leave out (`managed`, `namespace`, `template`, whole `null`
//! cluster or resource bodies). A single normalization pass then turns them
//! into fully-populated records ([`Config`], [`Cluster`], [`Resource`]) with
//! every default applied, so the rest of the engine never checks for absent
//! values.
//!
//! ## Example
//!
//! ```yaml
//! settings:
//!   directories:
//!     templates: templates
//!     target: clusters
//! values:
//!   domain: example.com
//! clusters:
//!   aws/production/main:
//!     age_public_key: age1qyqszqgpqyqszqgpqyqszqgpqyqszqgpqyqszqgpqyqszqgpqyqs3290gq
//!     resources:
//!       podinfo:
//!         values:
//!           replicas: 2
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};
use crate::path::{cluster_path, resource_segment};
use crate::values::Values;

/// Log verbosity selected in the configuration or on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    #[serde(alias = "none")]
    Off,
}

/// Log record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Console,
    Json,
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "off" | "none" => Ok(LogLevel::Off),
            other => Err(format!(
                "invalid log level '{}' (expected trace, debug, info, warn, error or off)",
                other
            )),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" | "text" => Ok(LogFormat::Console),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "invalid log format '{}' (expected console or json)",
                other
            )),
        }
    }
}

/// Logging configuration (`settings.log`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default)]
    pub level: LogLevel,
    #[serde(default)]
    pub format: LogFormat,
    /// Append log records to this file instead of stderr
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Template delimiter pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delimiters {
    pub left: String,
    pub right: String,
}

/// Resolved directory layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directories {
    /// Base directory all other directories are relative to
    pub base: PathBuf,
    /// Template root, relative to `base`
    pub templates: PathBuf,
    /// Target root, relative to `base`
    pub target: PathBuf,
}

/// Fully-populated settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub dry_run: bool,
    pub log: LogConfig,
    pub delimiters: Delimiters,
    pub directories: Directories,
    /// Secrets file name inside each cluster's target directory
    pub secrets: String,
    /// Worker pool size for cluster processing
    pub jobs: usize,
}

impl Settings {
    /// Absolute template root.
    pub fn templates_path(&self) -> PathBuf {
        self.directories.base.join(&self.directories.templates)
    }

    /// Absolute target root.
    pub fn target_path(&self) -> PathBuf {
        self.directories.base.join(&self.directories.target)
    }

    /// Target directory of a cluster.
    pub fn cluster_target(&self, cluster: &Cluster) -> PathBuf {
        self.target_path().join(&cluster.path)
    }

    /// Secrets file of a cluster.
    pub fn cluster_secrets(&self, cluster: &Cluster) -> PathBuf {
        self.cluster_target(cluster).join(&self.secrets)
    }

    /// Template origin of a resource.
    pub fn resource_template(&self, resource: &Resource) -> PathBuf {
        self.templates_path().join(&resource.template)
    }

    /// Target directory of a resource within a cluster.
    pub fn resource_target(&self, cluster: &Cluster, resource: &Resource) -> PathBuf {
        self.cluster_target(cluster).join(&resource.name)
    }
}

/// A deployment target owning a set of resources
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Path-shaped key from the configuration
    pub key: String,
    /// Relative target path derived from `key`
    pub path: PathBuf,
    pub managed: bool,
    /// Emitted as `commonAnnotations` of the cluster kustomization
    pub annotations: BTreeMap<String, String>,
    /// age recipient for this cluster's secrets
    pub age_public_key: Option<String>,
    pub values: Values,
    pub resources: IndexMap<String, Resource>,
}

impl Cluster {
    /// Names of managed resources, in declaration order.
    pub fn managed_resources(&self) -> Vec<String> {
        self.resources
            .values()
            .filter(|r| r.managed)
            .map(|r| r.name.clone())
            .collect()
    }
}

/// A templated unit rendered into a cluster's target tree
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub managed: bool,
    /// Template tree under the template root
    pub template: String,
    pub namespace: String,
    pub values: Values,
}

/// The loaded configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub settings: Settings,
    pub values: Values,
    pub clusters: IndexMap<String, Cluster>,
    /// Modification time of the configuration file
    pub modified: SystemTime,
}

/// Values supplied outside the file, typically from the command line
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_directory: Option<PathBuf>,
    pub dry_run: bool,
    pub jobs: Option<usize>,
}

////// RAW SCHEMA //////

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    settings: Option<RawSettings>,
    #[serde(default)]
    values: Option<Values>,
    #[serde(default)]
    clusters: Option<IndexMap<String, Option<RawCluster>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    #[serde(default)]
    dry_run: bool,
    #[serde(default)]
    log: Option<LogConfig>,
    #[serde(default)]
    delimiters: RawDelimiters,
    #[serde(default)]
    directories: RawDirectories,
    #[serde(default)]
    secrets: Option<String>,
    #[serde(default)]
    jobs: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDelimiters {
    left: Option<String>,
    right: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDirectories {
    base: Option<PathBuf>,
    templates: Option<PathBuf>,
    #[serde(alias = "clusters")]
    target: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCluster {
    managed: Option<bool>,
    #[serde(default)]
    annotations: BTreeMap<String, String>,
    #[serde(alias = "age")]
    age_public_key: Option<String>,
    #[serde(default)]
    values: Option<Values>,
    #[serde(default, alias = "sources")]
    resources: Option<IndexMap<String, Option<RawResource>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawResource {
    managed: Option<bool>,
    #[serde(alias = "origin")]
    template: Option<String>,
    namespace: Option<String>,
    #[serde(default)]
    values: Option<Values>,
}

////// NORMALIZATION //////

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn normalize_settings(raw: RawSettings, overrides: &Overrides) -> Result<Settings> {
    let base = match (&overrides.base_directory, raw.directories.base) {
        (Some(base), _) => base.clone(),
        (None, Some(base)) => base,
        (None, None) => std::env::current_dir().map_err(|e| Error::ConfigValidation {
            message: format!("cannot determine current working directory: {}", e),
        })?,
    };

    let left = non_empty(raw.delimiters.left).unwrap_or_else(|| defaults::DELIMITER_LEFT.into());
    let right = non_empty(raw.delimiters.right).unwrap_or_else(|| defaults::DELIMITER_RIGHT.into());

    let jobs = overrides
        .jobs
        .or(raw.jobs)
        .unwrap_or_else(defaults::default_jobs);
    if jobs == 0 {
        return Err(Error::ConfigValidation {
            message: "settings.jobs must be at least 1".to_string(),
        });
    }

    let secrets = non_empty(raw.secrets).unwrap_or_else(|| defaults::SECRETS_FILE.into());
    resource_segment(&secrets).map_err(|_| Error::ConfigValidation {
        message: format!("settings.secrets must be a file name: '{}'", secrets),
    })?;

    Ok(Settings {
        dry_run: raw.dry_run || overrides.dry_run,
        log: raw.log.unwrap_or_default(),
        delimiters: Delimiters { left, right },
        directories: Directories {
            base,
            templates: raw
                .directories
                .templates
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| defaults::TEMPLATES_DIRECTORY.into()),
            target: raw
                .directories
                .target
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| defaults::TARGET_DIRECTORY.into()),
        },
        secrets,
        jobs,
    })
}

fn normalize_resource(name: &str, raw: Option<RawResource>) -> Result<Resource> {
    let raw = raw.unwrap_or_default();
    resource_segment(name)?;
    if name == defaults::KUSTOMIZATION_FILE {
        return Err(Error::ConfigValidation {
            message: format!("resource name '{}' collides with the generated manifest", name),
        });
    }

    let template = non_empty(raw.template).unwrap_or_else(|| name.to_string());
    if Path::new(&template).is_absolute() || template.split('/').any(|s| s == "..") {
        return Err(Error::ConfigValidation {
            message: format!(
                "resource {} template must stay inside the template root: {}",
                name, template
            ),
        });
    }

    Ok(Resource {
        name: name.to_string(),
        managed: raw.managed.unwrap_or(true),
        template,
        namespace: non_empty(raw.namespace).unwrap_or_else(|| name.to_string()),
        values: raw.values.unwrap_or_default(),
    })
}

fn normalize_cluster(key: &str, raw: Option<RawCluster>) -> Result<Cluster> {
    let raw = raw.unwrap_or_default();
    let path = cluster_path(key)?;

    let mut resources = IndexMap::new();
    for (name, resource) in raw.resources.unwrap_or_default() {
        let resource = normalize_resource(&name, resource).map_err(|e| Error::ConfigValidation {
            message: format!("cluster {}: {}", key, e),
        })?;
        resources.insert(name, resource);
    }

    Ok(Cluster {
        key: key.to_string(),
        path,
        managed: raw.managed.unwrap_or(true),
        annotations: raw.annotations,
        age_public_key: non_empty(raw.age_public_key),
        values: raw.values.unwrap_or_default(),
        resources,
    })
}

fn normalize(raw: RawConfig, overrides: &Overrides, modified: SystemTime) -> Result<Config> {
    let settings = normalize_settings(raw.settings.unwrap_or_default(), overrides)?;

    let mut clusters = IndexMap::new();
    for (key, cluster) in raw.clusters.unwrap_or_default() {
        let cluster = normalize_cluster(&key, cluster)?;
        clusters.insert(key, cluster);
    }

    Ok(Config {
        settings,
        values: raw.values.unwrap_or_default(),
        clusters,
        modified,
    })
}

////// ENTRY POINTS //////

/// Parse a configuration from a YAML string
///
/// The modification time is set to "now", which makes every YAML target older
/// than the configuration and therefore forces a re-render. Use [`load`] to
/// pick up the real file timestamp.
pub fn parse(yaml_content: &str, overrides: &Overrides) -> Result<Config> {
    let raw: RawConfig = if yaml_content.trim().is_empty() {
        RawConfig::default()
    } else {
        serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            hint: parse_hint(&e),
        })?
    };
    normalize(raw, overrides, SystemTime::now())
}

fn parse_hint(error: &serde_yaml::Error) -> Option<String> {
    let message = error.to_string();
    if message.contains("unknown field") {
        Some("Check the spelling of the key; see the README for the accepted settings".to_string())
    } else if message.contains("invalid type") {
        Some("Clusters and resources are mappings keyed by name, not lists".to_string())
    } else {
        None
    }
}

/// Load a configuration file without command-line overrides
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    load(path, &Overrides::default())
}

/// Load a configuration file, recording its modification time
pub fn load<P: AsRef<Path>>(path: P, overrides: &Overrides) -> Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| Error::filesystem("read", path, e))?;
    let modified = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| Error::filesystem("stat", path, e))?;

    let mut config = parse(&content, overrides)?;
    config.modified = modified;
    log::info!("Loaded configuration: {}", crate::path::relative_display(path));
    Ok(config)
}
