//! CLI integration tests for sakip admin commands.
//!
//! Each test uses an isolated temp directory for the database, ensuring tests
//! can run in parallel safely.

#![allow(deprecated)] // Command::cargo_bin deprecation only affects custom build dirs

use std::path::Path;

use assert_cmd::Command;
use assert_fs::TempDir;
use predicates::prelude::*;
use sakip::auth::{PasswordHasher, effective_permissions, parse_token};
use sakip::store::{SqliteStore, Store};
use sakip::types::Permission;

const ADMIN_EMAIL: &str = "admin@example.go.id";
const ADMIN_PASSWORD: &str = "rahasia-sekali";

struct TestContext {
    temp_dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    fn data_dir_str(&self) -> String {
        self.data_dir().to_string_lossy().to_string()
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("sakip").expect("failed to find binary");
        cmd.env("NO_COLOR", "1").env_remove("SAKIP_ADMIN_PASSWORD");
        cmd
    }

    fn init(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args([
                "admin",
                "init",
                "--data-dir",
                &self.data_dir_str(),
                "--admin-email",
                ADMIN_EMAIL,
                "--admin-password",
                ADMIN_PASSWORD,
                "--non-interactive",
            ])
            .assert()
    }

    fn store(&self) -> SqliteStore {
        SqliteStore::new(self.data_dir().join("sakip.db")).expect("open store")
    }
}

#[test]
fn test_init_creates_admin_and_token() {
    let ctx = TestContext::new();

    ctx.init()
        .success()
        .stdout(predicate::str::contains("Admin token"))
        .stdout(predicate::str::contains(ADMIN_EMAIL));

    let token_path = ctx.data_dir().join(".admin_token");
    let raw = std::fs::read_to_string(&token_path).expect("read token");
    assert!(raw.starts_with("sakip_"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&token_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let store = ctx.store();
    let user = store.get_user_by_email(ADMIN_EMAIL).unwrap().unwrap();
    assert!(user.is_active);
    assert!(user.institution_id.is_none());
    assert!(
        PasswordHasher::new()
            .verify(ADMIN_PASSWORD, &user.password_hash)
            .unwrap()
    );

    let permissions = effective_permissions(&store, &user.id).unwrap();
    assert!(permissions.has(Permission::all()));

    let (lookup, _) = parse_token(raw.trim()).unwrap();
    let token = store.get_token_by_lookup(lookup).unwrap().unwrap();
    assert_eq!(token.user_id, user.id);
    assert!(token.expires_at.is_none());
}

#[test]
fn test_init_seeds_roles_and_settings() {
    let ctx = TestContext::new();
    ctx.init().success();

    let store = ctx.store();
    let roles = store.list_roles().unwrap();
    assert_eq!(roles.len(), sakip::store::DEFAULT_ROLES.len());
    assert!(store.get_role_by_name("data_collector").unwrap().is_some());

    let setting = store
        .get_setting(sakip::settings::MAX_EVIDENCE_BYTES)
        .unwrap()
        .unwrap();
    assert_eq!(setting.value, "5242880");
}

#[test]
fn test_init_twice_fails() {
    let ctx = TestContext::new();
    ctx.init().success();

    ctx.init()
        .failure()
        .stderr(predicate::str::contains("already initialized"));
}

#[test]
fn test_init_non_interactive_requires_credentials() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args([
            "admin",
            "init",
            "--data-dir",
            &ctx.data_dir_str(),
            "--non-interactive",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--admin-email"));

    assert_eq!(ctx.store().count_users().unwrap(), 0);
}

#[test]
fn test_init_rejects_short_password() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args([
            "admin",
            "init",
            "--data-dir",
            &ctx.data_dir_str(),
            "--admin-email",
            ADMIN_EMAIL,
            "--admin-password",
            "short",
            "--non-interactive",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least"));
}

#[test]
fn test_init_password_from_env() {
    let ctx = TestContext::new();

    ctx.cmd()
        .env("SAKIP_ADMIN_PASSWORD", ADMIN_PASSWORD)
        .args([
            "admin",
            "init",
            "--data-dir",
            &ctx.data_dir_str(),
            "--admin-email",
            ADMIN_EMAIL,
            "--non-interactive",
        ])
        .assert()
        .success();
}

#[test]
fn test_serve_without_init_fails() {
    let ctx = TestContext::new();

    ctx.cmd()
        .args(["serve", "--data-dir", &ctx.data_dir_str(), "--port", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn test_serve_rejects_bad_config_file() {
    let ctx = TestContext::new();
    ctx.init().success();

    let config = ctx.data_dir().join("sakip.toml");
    std::fs::write(&config, "prot = 1\n").unwrap();

    ctx.cmd()
        .args(["serve", "--config"])
        .arg(&config)
        .args(["--data-dir", &ctx.data_dir_str()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse"));
}
