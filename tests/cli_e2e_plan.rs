//! End-to-end tests for the `plan` command.
//!
//! `plan` must never modify the target tree; any difference from what
//! `apply` would produce fails with exit code 1.

mod common;
use common::prelude::*;
use walkdir::WalkDir;

fn applied_fixture() -> TestFixture {
    let fixture = TestFixture::new()
        .with_template("podinfo")
        .with_file("templates/podinfo/README.md", "Deployed to [[[ .Cluster.name ]]]\n")
        .with_config(configs::SINGLE_CLUSTER);
    let old = epoch(1_000_000);
    for file in [
        "fkt.yaml",
        "templates/podinfo/kustomization.yaml",
        "templates/podinfo/deployment.yaml",
        "templates/podinfo/README.md",
    ] {
        set_mtime(&fixture.path().join(file), old);
    }
    fixture.command().arg("apply").assert().success();
    fixture
}

/// Every path and file content below the target root.
fn snapshot(fixture: &TestFixture) -> Vec<(String, Vec<u8>)> {
    let root = fixture.target("");
    WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| {
            let entry = entry.unwrap();
            let relative = entry.path().strip_prefix(&root).unwrap().display().to_string();
            let content = if entry.file_type().is_file() {
                std::fs::read(entry.path()).unwrap()
            } else {
                Vec::new()
            };
            (relative, content)
        })
        .collect()
}

#[test]
fn test_plan_up_to_date_tree_succeeds() {
    let fixture = applied_fixture();

    fixture
        .command()
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN MODE"))
        .stdout(predicate::str::contains("0 rendered, 2 skipped, 0 pruned"));
}

#[test]
fn test_plan_detects_orphan_without_removing_it() {
    let fixture = applied_fixture().with_file("clusters/dev/orphan/file.yaml", "kind: ConfigMap\n");
    let before = snapshot(&fixture);

    fixture
        .command()
        .arg("plan")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Dry-run violation"))
        .stderr(predicate::str::contains("orphan"))
        .stderr(predicate::str::contains("would be pruned"))
        .stderr(predicate::str::contains("hint: The target tree is out of date"));

    assert_eq!(snapshot(&fixture), before);
}

#[test]
fn test_plan_detects_modified_text_file() {
    let fixture =
        applied_fixture().with_file("clusters/dev/podinfo/README.md", "edited by hand\n");
    let before = snapshot(&fixture);

    fixture
        .command()
        .arg("plan")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("README.md would be modified"));

    assert_eq!(snapshot(&fixture), before);
}

#[test]
fn test_plan_detects_stale_kustomization() {
    let fixture =
        applied_fixture().with_file("clusters/dev/kustomization.yaml", "resources: []\n");

    fixture
        .command()
        .arg("plan")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("kustomization.yaml would be modified"));

    assert_eq!(fixture.read_target("dev/kustomization.yaml"), "resources: []\n");
}

#[test]
fn test_plan_missing_target_root() {
    let fixture = TestFixture::new()
        .with_template("podinfo")
        .with_config(configs::SINGLE_CLUSTER);

    fixture
        .command()
        .arg("plan")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("would be created"));

    assert!(!fixture.target("").exists());
}
