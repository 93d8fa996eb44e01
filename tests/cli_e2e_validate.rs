//! End-to-end tests for the `validate` command.
//!
//! These tests invoke the actual CLI binary and validate the behavior of the
//! `validate` subcommand from a user's perspective.

mod common;
use common::prelude::*;

#[test]
fn test_validate_valid_config() {
    let fixture = TestFixture::new()
        .with_template("podinfo")
        .with_config(configs::WITH_UNMANAGED);

    fixture
        .command()
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration file parsed successfully"))
        .stdout(predicate::str::contains("Clusters: 2"))
        .stdout(predicate::str::contains("Resources: 2"))
        .stdout(predicate::str::contains("Unmanaged clusters: 1"))
        .stdout(predicate::str::contains("Configuration is valid"));

    // Validation is read-only
    assert!(!fixture.target("").exists());
}

#[test]
fn test_validate_invalid_yaml() {
    let fixture = TestFixture::new().with_config(configs::INVALID_YAML);

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration parsing error"));
}

#[test]
fn test_validate_unknown_field_has_hint() {
    let fixture = TestFixture::new()
        .with_template("podinfo")
        .with_config(configs::UNKNOWN_FIELD);

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("dryrun"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_validate_reserved_key() {
    let fixture = TestFixture::new()
        .with_template("podinfo")
        .with_config(configs::RESERVED_KEY);

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Validation failed"))
        .stderr(predicate::str::contains("reserved key 'Cluster'"));
}

#[test]
fn test_validate_missing_marker_and_template() {
    let fixture = TestFixture::new()
        .with_template("podinfo")
        .with_file("templates/nomarker/deployment.yaml", "kind: Deployment\n")
        .with_config(
            r#"
clusters:
  dev:
    resources:
      podinfo:
      nomarker:
      absent:
      manual:
        managed: false
"#,
        );

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("validation failed for 2 unit(s)"))
        .stderr(predicate::str::contains("dev/nomarker"))
        .stderr(predicate::str::contains("dev/absent"))
        .stderr(predicate::str::contains("kustomization file does not exist"))
        .stderr(predicate::str::contains("dev/manual").not());
}

#[test]
fn test_validate_missing_templates_directory() {
    let fixture = TestFixture::new().with_config(configs::SINGLE_CLUSTER);

    fixture
        .command()
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("templates directory does not exist"));
}
