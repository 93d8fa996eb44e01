//! # Reconciliation Driver
//!
//! Fans out over the configured clusters on a bounded rayon worker pool. Each
//! cluster is an independent task: it loads its secrets, synchronizes every
//! resource in declaration order, prunes undeclared resource directories and
//! writes the cluster kustomization. A failing cluster never cancels the
//! others; all failures are returned together in an [`Error::Aggregate`].
//!
//! Work inside a cluster is strictly sequential. Clusters own disjoint target
//! subtrees, so tasks never touch the same files.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::Component;
use std::sync::Arc;

use log::{debug, info, trace};
use rayon::prelude::*;

use crate::config::{Cluster, Config};
use crate::defaults::KUSTOMIZATION_FILE;
use crate::error::{Error, Failure, Result};
use crate::kustomization;
use crate::path::relative_display;
use crate::render::Renderer;
use crate::report::{Action, ClusterReport};
use crate::secrets::{self, Cipher, SopsCipher};
use crate::sync::{self, Synchronizer};
use crate::template::{DelimitedEngine, TemplateEngine};
use crate::values;

/// Outcome of processing every cluster
#[derive(Debug, Default)]
pub struct Summary {
    /// Reports of the clusters that succeeded, in declaration order
    pub reports: Vec<ClusterReport>,
    /// One entry per failed cluster
    pub failures: Vec<Failure>,
}

impl Summary {
    pub fn into_result(self) -> Result<Vec<ClusterReport>> {
        if self.failures.is_empty() {
            Ok(self.reports)
        } else {
            Err(Error::Aggregate {
                operation: "processing".to_string(),
                failures: self.failures,
            })
        }
    }
}

/// Drives validation and processing of a loaded configuration
pub struct Reconciler {
    config: Config,
    engine: Box<dyn TemplateEngine>,
    cipher: Arc<dyn Cipher>,
}

impl Reconciler {
    /// Reconciler with the built-in template engine and the sops cipher.
    pub fn new(config: Config) -> Self {
        let engine = DelimitedEngine::from_delimiters(&config.settings.delimiters);
        Self {
            config,
            engine: Box::new(engine),
            cipher: Arc::new(SopsCipher::new()),
        }
    }

    pub fn with_cipher(mut self, cipher: Arc<dyn Cipher>) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_engine(mut self, engine: Box<dyn TemplateEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check settings and every cluster/resource without mutating anything.
    ///
    /// All problems are collected before returning.
    pub fn validate(&self) -> Result<()> {
        let mut failures = Vec::new();
        self.validate_settings(&mut failures);

        if let Err(e) = values::check_reserved(&self.config.values, "global") {
            failures.push(Failure::new("values", e));
        }

        for cluster in self.config.clusters.values() {
            if let Err(e) = values::check_reserved(&cluster.values, &format!("cluster {}", cluster.key))
            {
                failures.push(Failure::new(&cluster.key, e));
            }

            for resource in cluster.resources.values() {
                let unit = format!("{}/{}", cluster.key, resource.name);
                let scope = format!("resource {}", unit);
                if let Err(e) = values::check_reserved(&resource.values, &scope) {
                    failures.push(Failure::new(&unit, e));
                }
                if cluster.managed && resource.managed {
                    let origin = self.config.settings.resource_template(resource);
                    if let Err(e) = sync::validate_origin(&origin) {
                        failures.push(Failure::new(&unit, e));
                    }
                }
            }
        }

        if failures.is_empty() {
            debug!("Validated {} cluster(s)", self.config.clusters.len());
            Ok(())
        } else {
            Err(Error::Aggregate {
                operation: "validation".to_string(),
                failures,
            })
        }
    }

    fn validate_settings(&self, failures: &mut Vec<Failure>) {
        let settings = &self.config.settings;
        let directories = [
            ("base", settings.directories.base.clone()),
            ("templates", settings.templates_path()),
        ];
        for (name, path) in directories {
            if !path.is_dir() {
                failures.push(Failure::new(
                    "settings",
                    Error::ConfigValidation {
                        message: format!(
                            "{} directory does not exist: {}",
                            name,
                            relative_display(&path)
                        ),
                    },
                ));
            }
        }

        let target = settings.target_path();
        if settings.dry_run && !target.is_dir() {
            failures.push(Failure::new(
                "settings",
                Error::dry_run(target, "would be created"),
            ));
        }
    }

    /// Process every cluster, failing if any cluster failed.
    pub fn process(&self) -> Result<Vec<ClusterReport>> {
        self.run()?.into_result()
    }

    /// Process every cluster concurrently and collect the results.
    pub fn run(&self) -> Result<Summary> {
        let jobs = self.config.settings.jobs;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("fkt-worker-{}", i))
            .build()
            .map_err(|e| Error::WorkerPool {
                message: e.to_string(),
            })?;

        let clusters: Vec<&Cluster> = self.config.clusters.values().collect();
        info!(
            "Processing {} cluster(s) with {} worker(s){}",
            clusters.len(),
            jobs,
            if self.config.settings.dry_run {
                " (dry-run)"
            } else {
                ""
            }
        );

        let results: Vec<(String, Result<ClusterReport>)> = pool.install(|| {
            clusters
                .par_iter()
                .map(|cluster| (cluster.key.clone(), self.process_cluster(cluster)))
                .collect()
        });

        let mut summary = Summary::default();
        for (key, result) in results {
            match result {
                Ok(report) => summary.reports.push(report),
                Err(e) => summary.failures.push(Failure::new(key, e)),
            }
        }
        Ok(summary)
    }

    /// Process one cluster.
    pub fn process_cluster(&self, cluster: &Cluster) -> Result<ClusterReport> {
        let settings = &self.config.settings;
        let dry_run = settings.dry_run;
        let cluster_dir = settings.cluster_target(cluster);
        let mut report = ClusterReport::new(&cluster.key);

        info!("Processing cluster: {}", cluster.key);
        sync::ensure_directory(&cluster_dir, dry_run, &mut report)?;

        let secrets = secrets::load(
            &settings.cluster_secrets(cluster),
            cluster.age_public_key.as_deref(),
            self.cipher.as_ref(),
        )?;

        let synchronizer = Synchronizer::new(
            Renderer::new(self.engine.as_ref(), self.cipher.as_ref(), dry_run),
            self.config.modified,
        );

        for resource in cluster.resources.values() {
            let managed = cluster.managed && resource.managed;
            if managed {
                info!(
                    "Processing resource: {}, into {}/{}",
                    resource.template, cluster.key, resource.name
                );
            } else {
                info!("Skipping unmanaged resource: {}/{}", cluster.key, resource.name);
            }

            let context = values::context(&self.config.values, cluster, resource);
            trace!("Values for {}/{}: {:?}", cluster.key, resource.name, context);

            synchronizer
                .sync(
                    &settings.resource_template(resource),
                    &settings.resource_target(cluster, resource),
                    &context,
                    &secrets,
                    managed,
                    &mut report,
                )
                .map_err(|e| e.in_resource(&resource.name))?;
        }

        if !cluster.managed {
            debug!("Unmanaged cluster, skipping pruning: {}", cluster.key);
            return Ok(report);
        }

        let nested = self.nested_segments(cluster);
        let mut keep: BTreeSet<OsString> = cluster.resources.keys().map(OsString::from).collect();
        keep.extend(nested.iter().cloned());
        let protected = [settings.secrets.clone(), KUSTOMIZATION_FILE.to_string()];
        sync::prune_orphans(&cluster_dir, &keep, &protected, true, dry_run, &mut report)?;

        // Nested clusters carry their own kustomization and are not resources of this one
        let managed = cluster.managed_resources();
        if let Some(path) = kustomization::generate(
            &cluster_dir,
            &managed,
            &nested,
            &cluster.annotations,
            dry_run,
        )? {
            report.record(if dry_run {
                Action::Unchanged(path)
            } else {
                Action::Kustomization(path)
            });
        }
        Ok(report)
    }

    /// First path segment of every cluster nested below `cluster`.
    fn nested_segments(&self, cluster: &Cluster) -> BTreeSet<OsString> {
        let mut nested = BTreeSet::new();
        for other in self.config.clusters.values() {
            if other.key == cluster.key {
                continue;
            }
            if let Ok(rest) = other.path.strip_prefix(&cluster.path) {
                if let Some(Component::Normal(first)) = rest.components().next() {
                    nested.insert(first.to_os_string());
                }
            }
        }
        nested
    }
}
