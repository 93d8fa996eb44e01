//! Shared test utilities for integration and E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new()
//!         .with_template("podinfo")
//!         .with_config(configs::SINGLE_CLUSTER);
//!     fixture.command().arg("apply").assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    #[allow(unused_imports)]
    pub use super::{epoch, set_mtime};
    pub use super::TestFixture;
}

/// Common configuration YAML snippets for testing.
#[allow(dead_code)]
pub mod configs {
    /// One cluster with one resource rendered from `templates/podinfo`.
    pub const SINGLE_CLUSTER: &str = r#"
values:
  replicas: 1
clusters:
  dev:
    resources:
      podinfo:
"#;

    /// Two clusters, one of which is unmanaged.
    pub const WITH_UNMANAGED: &str = r#"
clusters:
  dev:
    resources:
      podinfo:
  legacy:
    managed: false
    resources:
      podinfo:
"#;

    /// Values defining a reserved key.
    pub const RESERVED_KEY: &str = r#"
values:
  Cluster: nope
clusters:
  dev:
    resources:
      podinfo:
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "clusters: [unclosed";

    /// Configuration with a misspelled settings field.
    pub const UNKNOWN_FIELD: &str = "settings:\n  dryrun: true\n";
}

/// Deployment template used by [`TestFixture::with_template`].
pub const DEPLOYMENT: &str = "apiVersion: apps/v1
kind: Deployment
metadata:
  name: [[[ .Resource.name ]]]
  namespace: [[[ .Resource.namespace ]]]
spec:
  replicas: [[[ .replicas ]]]
";

/// Timestamp `seconds` after the Unix epoch.
#[allow(dead_code)]
pub fn epoch(seconds: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(seconds)
}

/// Set both access and modification time of `path`.
#[allow(dead_code)]
pub fn set_mtime(path: &Path, time: SystemTime) {
    let time = filetime::FileTime::from_system_time(time);
    filetime::set_file_times(path, time, time).expect("Failed to set file times");
}

/// A temporary base directory holding `fkt.yaml`, `templates/` and `clusters/`.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add an `fkt.yaml` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child("fkt.yaml")
            .write_str(content)
            .expect("Failed to write config file");
        self
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Add a template tree with a kustomization marker and one deployment.
    pub fn with_template(self, name: &str) -> Self {
        self.with_file(
            &format!("templates/{}/kustomization.yaml", name),
            "resources:\n- deployment.yaml\n",
        )
        .with_file(&format!("templates/{}/deployment.yaml", name), DEPLOYMENT)
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    #[allow(dead_code)]
    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("fkt.yaml")
    }

    /// Path inside the target root.
    #[allow(dead_code)]
    pub fn target(&self, relative: &str) -> PathBuf {
        self.temp_dir.path().join("clusters").join(relative)
    }

    /// Read a file inside the target root.
    #[allow(dead_code)]
    pub fn read_target(&self, relative: &str) -> String {
        std::fs::read_to_string(self.target(relative)).expect("Failed to read target file")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixture {
    /// Create a command configured to run in this fixture's directory.
    ///
    /// Colors are disabled so output can be matched as plain text.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("fkt");
        cmd.current_dir(self.path())
            .env_remove("CONFIG_FILE")
            .env_remove("BASE_DIRECTORY")
            .env_remove("DRY_RUN")
            .env_remove("LOG_LEVEL")
            .env_remove("LOG_FORMAT")
            .env_remove("LOG_FILE")
            .env("NO_COLOR", "1");
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_with_template() {
        let fixture = TestFixture::new().with_template("podinfo");
        assert!(fixture.path().join("templates/podinfo/kustomization.yaml").exists());
        assert!(fixture.path().join("templates/podinfo/deployment.yaml").exists());
    }

    #[test]
    fn test_configs_are_valid_yaml() {
        let configs = [
            configs::SINGLE_CLUSTER,
            configs::WITH_UNMANAGED,
            configs::RESERVED_KEY,
            configs::UNKNOWN_FIELD,
        ];
        for config in configs {
            let result: Result<serde_yaml::Value, _> = serde_yaml::from_str(config);
            assert!(result.is_ok(), "Config should be valid YAML: {}", config);
        }
    }
}
