//! # fkt Library
//!
//! This library provides the reconciliation and rendering engine behind the
//! `fkt` command-line tool: it turns a declarative configuration of clusters,
//! resources and layered values into a target directory tree of Kubernetes
//! manifests that a GitOps controller (such as FluxCD) applies afterwards.
//!
//! ## Quick Example
//!
//! ```
//! use fkt::config::{self, Overrides};
//! use fkt::template::{DelimitedEngine, TemplateEngine};
//! use fkt::values;
//!
//! let yaml = r#"
//! values:
//!   domain: example.com
//! clusters:
//!   aws/production/main:
//!     values:
//!       replicas: 2
//!     resources:
//!       podinfo:
//! "#;
//! let overrides = Overrides {
//!     base_directory: Some("/srv/gitops".into()),
//!     ..Overrides::default()
//! };
//! let config = config::parse(yaml, &overrides).unwrap();
//!
//! let cluster = &config.clusters["aws/production/main"];
//! let resource = &cluster.resources["podinfo"];
//! let context = values::context(&config.values, cluster, resource);
//!
//! let out = DelimitedEngine::default()
//!     .render("deploy.yaml", "replicas: [[[ .replicas ]]] # [[[ .Cluster.name ]]]", &context)
//!     .unwrap();
//! assert_eq!(out, "replicas: 2 # main");
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: The data model of the `fkt.yaml` file, decoded
//!   and normalized once so every default is applied up front.
//! - **Values (`values`)**: Shallow, right-biased merging of global, cluster and
//!   resource values into a template context.
//! - **Templates (`template`)**: The swappable `TemplateEngine` trait and the
//!   built-in delimiter engine.
//! - **Secrets (`secrets`)**: Decryption of a cluster's secrets file and
//!   per-document encryption through the `Cipher` trait (sops + age).
//! - **Rendering (`render`)**: One template file to one target file, with
//!   multi-document YAML, secret encryption and incremental skipping.
//! - **Synchronization (`sync`)**: Recursive mirroring of template trees with
//!   orphan pruning and dry-run detection.
//! - **Kustomization (`kustomization`)**: Marker detection and the per-cluster
//!   aggregation manifest.
//! - **Reconciliation (`reconcile`)**: Validation and the concurrent per-cluster
//!   processing driver.
//!
//! ## Execution Flow
//!
//! 1.  **Load**: Decode the configuration and record its modification time.
//! 2.  **Validate**: Check directories, reserved keys and template markers for
//!     every cluster, collecting all problems.
//! 3.  **Process**: For each cluster (concurrently), load secrets, synchronize
//!     each resource, prune undeclared resource directories and write the
//!     kustomization.
//! 4.  **Report**: Return one report per cluster, or every failure together.

pub mod config;
pub mod defaults;
pub mod error;
pub mod filesystem;
pub mod kustomization;
pub mod logging;
pub mod output;
pub mod path;
pub mod reconcile;
pub mod render;
pub mod report;
pub mod secrets;
pub mod suggestions;
pub mod sync;
pub mod template;
pub mod values;

#[cfg(test)]
mod path_proptest;
