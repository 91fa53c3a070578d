//! End-to-end tests for the `leasehold` binary.
//!
//! Every test runs against its own temporary database and an explicit config
//! file, so neither the user's global config nor the project directory leak in.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

use std::{path::Path, process::Command};

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

const CATALOG: &str = r#"
[[publishers]]
id = "1689467"
name = "SMB"
metadata = { type = "smb" }

[[publishers]]
id = "1791194"
name = "iOS"
metadata = { type = "mobile", platform = "ios" }

[[environments]]
id = "prime-staging"
name = "Prime"

[[environments]]
id = "tropit-staging"
name = "Tropit"
"#;

struct Harness {
    dir: TempDir,
}

impl Harness {
    fn new() -> Self {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("leasehold.toml"), CATALOG).expect("write config");
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn db(&self) -> std::path::PathBuf {
        self.path().join("state.db")
    }

    /// Make the database reject every write while reads keep working.
    fn block_writes(&self) {
        let db = self.db();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        runtime.block_on(async {
            let store = leasehold_core::LeaseStore::open(&db).await.expect("open store");
            for (name, event, table) in [
                ("block_state_insert", "INSERT", "resource_state"),
                ("block_state_update", "UPDATE", "resource_state"),
                ("block_history_insert", "INSERT", "usage_history"),
            ] {
                sqlx::query(&format!(
                    "CREATE TRIGGER {name} BEFORE {event} ON {table}
                     BEGIN SELECT RAISE(ABORT, 'writes disabled'); END"
                ))
                .execute(store.pool())
                .await
                .expect("create trigger");
            }
            store.close().await;
        });
    }

    fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("leasehold").expect("binary");
        cmd.current_dir(self.path())
            .env_remove("LEASEHOLD_DB")
            .env_remove("LEASEHOLD_PERSIST_HISTORY")
            .env_remove("RUST_LOG")
            .env("LEASEHOLD_HOLDER", "alice")
            .arg("--config")
            .arg(self.path().join("leasehold.toml"))
            .arg("--db")
            .arg(self.db())
            .args(args);
        cmd
    }
}

#[test]
fn take_uses_resolved_identity() {
    let h = Harness::new();
    h.cmd(&["take", "env", "prime-staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Environment prime-staging successfully taken by alice",
        ));
}

#[test]
fn second_take_is_refused_with_current_holder() {
    let h = Harness::new();
    h.cmd(&["take", "env", "prime-staging"]).assert().success();
    h.cmd(&["take", "env", "prime-staging", "--holder", "bob"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Environment prime-staging is already taken by alice",
        ));
}

#[test]
fn lease_survives_between_invocations() {
    let h = Harness::new();
    h.cmd(&["take", "publisher", "1689467"]).assert().success();
    h.cmd(&["info", "publisher", "1689467"])
        .assert()
        .success()
        .stdout(predicate::str::contains("taken by alice"));
}

#[test]
fn steal_reports_previous_holder_and_history() {
    let h = Harness::new();
    h.cmd(&["take", "env", "prime-staging"]).assert().success();
    h.cmd(&["steal", "env", "prime-staging", "--holder", "bob"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Environment prime-staging stolen by bob from alice",
        ));
    h.cmd(&["release", "env", "prime-staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Environment prime-staging successfully released",
        ));

    h.cmd(&["history", "env", "prime-staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bob").and(predicate::str::contains("(stolen by bob)")));

    let output = h
        .cmd(&["history", "env", "prime-staging", "--json", "--limit", "1"])
        .output()
        .expect("run history");
    assert!(output.status.success());
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let history = body["history"].as_array().expect("history array");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["holder"], "bob");
    assert_eq!(history[0]["reason"]["kind"], "normal");
}

#[test]
fn release_by_other_holder_changes_nothing() {
    let h = Harness::new();
    h.cmd(&["take", "env", "tropit-staging", "--holder", "bob"])
        .assert()
        .success();
    h.cmd(&["release", "env", "tropit-staging", "--holder", "alice"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(
            "Environment tropit-staging is held by bob, not alice",
        ));
    h.cmd(&["info", "env", "tropit-staging"])
        .assert()
        .stdout(predicate::str::contains("taken by bob"));
}

#[test]
fn release_of_free_resource_is_refused() {
    let h = Harness::new();
    h.cmd(&["release", "env", "prime-staging"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Environment prime-staging was not taken"));
}

#[test]
fn unknown_resource_exits_with_not_found_code() {
    let h = Harness::new();
    h.cmd(&["take", "env", "ghost-staging"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Environment not found: ghost-staging"));
}

#[test]
fn blank_holder_is_rejected() {
    let h = Harness::new();
    h.cmd(&["take", "env", "prime-staging", "--holder", "   "])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid holder"));
}

#[test]
fn unknown_category_is_a_usage_error() {
    let h = Harness::new();
    h.cmd(&["take", "database", "prime-staging"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown category"));
}

#[test]
fn list_filters() {
    let h = Harness::new();
    h.cmd(&["take", "publisher", "1689467"]).assert().success();

    h.cmd(&["list", "publishers", "--available"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1791194").and(predicate::str::contains("1689467").not()));

    h.cmd(&["list", "publishers", "--where", "type=smb"])
        .assert()
        .success()
        .stdout(predicate::str::contains("SMB").and(predicate::str::contains("iOS").not()));

    h.cmd(&["list", "publishers", "--kind", "ios"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1791194"));

    h.cmd(&["list", "env", "--kind", "ios"]).assert().failure();
}

#[test]
fn status_json_lists_every_resource() {
    let h = Harness::new();
    h.cmd(&["take", "env", "prime-staging"]).assert().success();

    let output = h.cmd(&["status", "--json"]).output().expect("run status");
    assert!(output.status.success());
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(body["environments"]["prime-staging"]["holder"], "alice");
    assert_eq!(body["environments"]["tropit-staging"]["is_taken"], false);
    assert_eq!(body["publishers"].as_object().map(serde_json::Map::len), Some(2));
}

#[test]
fn take_json_carries_message_and_status() {
    let h = Harness::new();
    let output = h
        .cmd(&["--json", "take", "env", "prime-staging"])
        .output()
        .expect("run take");
    assert!(output.status.success());
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(body["success"], true);
    assert_eq!(body["status"]["holder"], "alice");
    assert_eq!(
        body["message"],
        "Environment prime-staging successfully taken by alice"
    );
}

#[test]
fn whoami_prefers_explicit_holder_variable() {
    let h = Harness::new();
    h.cmd(&["whoami"])
        .env("LEASEHOLD_HOLDER", "ci-runner")
        .assert()
        .success()
        .stdout(predicate::str::diff("ci-runner\n"));
}

#[test]
fn unknown_resource_json_error_carries_code() {
    let h = Harness::new();
    let output = h
        .cmd(&["take", "env", "ghost-staging", "--json"])
        .output()
        .expect("run take");
    assert_eq!(output.status.code(), Some(3));
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["exit_code"], 3);
}

#[test]
fn read_only_commands_keep_a_lease_taken_meanwhile() {
    let h = Harness::new();
    h.cmd(&["status"]).assert().success();
    h.cmd(&["take", "env", "prime-staging"]).assert().success();
    h.cmd(&["status"]).assert().success();
    h.cmd(&["health"]).assert().success();
    h.cmd(&["info", "env", "prime-staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("taken by alice"));
}

#[test]
fn health_writes_to_the_store() {
    let h = Harness::new();
    h.cmd(&["health"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Persistence: ok")
                .and(predicate::str::contains("Last successful write")),
        );
}

#[test]
fn health_reports_an_unwritable_store() {
    let h = Harness::new();
    h.cmd(&["status"]).assert().success();
    h.block_writes();

    h.cmd(&["health"])
        .assert()
        .code(4)
        .stdout(
            predicate::str::contains("Persistence: degraded")
                .and(predicate::str::contains("writes disabled")),
        );
}

#[test]
fn unsaved_take_is_reported_and_exits_with_store_code() {
    let h = Harness::new();
    h.cmd(&["status"]).assert().success();
    h.block_writes();

    h.cmd(&["take", "env", "prime-staging"])
        .assert()
        .code(4)
        .stdout(
            predicate::str::contains("Environment prime-staging successfully taken by alice")
                .and(predicate::str::contains("(not saved:"))
                .and(predicate::str::contains("writes disabled")),
        );

    let output = h
        .cmd(&["--json", "steal", "env", "tropit-staging"])
        .output()
        .expect("run steal");
    assert_eq!(output.status.code(), Some(4));
    let body: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(body["success"], true);
    assert_eq!(body["persistence"]["degraded"], true);
    assert!(body["message"]
        .as_str()
        .is_some_and(|m| m.contains("not saved")));

    h.cmd(&["info", "env", "prime-staging"])
        .assert()
        .success()
        .stdout(predicate::str::contains("available"));
}

#[test]
fn reset_requires_confirmation_and_clears_state() {
    let h = Harness::new();
    h.cmd(&["take", "env", "prime-staging"]).assert().success();

    h.cmd(&["reset"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
    h.cmd(&["info", "env", "prime-staging"])
        .assert()
        .stdout(predicate::str::contains("taken by alice"));

    h.cmd(&["reset", "--yes"]).assert().success();
    h.cmd(&["info", "env", "prime-staging"])
        .assert()
        .stdout(predicate::str::contains("available"));
}

#[test]
fn invalid_config_file_exits_with_config_code() {
    let h = Harness::new();
    let bad = h.path().join("bad.toml");
    std::fs::write(&bad, "[[environments]]\nid = \"\"\nname = \"Blank\"\n").expect("write");
    let mut cmd = Command::cargo_bin("leasehold").expect("binary");
    cmd.current_dir(h.path())
        .arg("--config")
        .arg(&bad)
        .arg("--db")
        .arg(h.path().join("state.db"))
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid configuration"));
}
