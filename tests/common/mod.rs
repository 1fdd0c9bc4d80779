//! Shared fixtures for the integration tests.
//!
//! A [`Fixture`] is a temporary served root; repositories are created
//! inside it with the git CLI so the gateway sees ordinary on-disk
//! repositories.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use gitgate::core::address::ResourceAddress;
use gitgate::core::config::Config;
use gitgate::engine::{Gateway, Repo};

/// A served root holding any number of test repositories.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Create repository `name` on `master` with one commit of `README.md`.
    pub fn repo(&self, name: &str) -> TestRepo {
        let repo = self.empty_repo(name);
        repo.commit_file("README.md", "# Test Repo\n", "Initial commit");
        repo
    }

    /// Create repository `name` on `master` with no commits.
    pub fn empty_repo(&self, name: &str) -> TestRepo {
        let path = self.root().join(name);
        std::fs::create_dir_all(&path).unwrap();
        init_repo(&path);
        TestRepo { path }
    }

    pub fn gateway(&self) -> Gateway {
        self.gateway_with(Config::default())
    }

    pub fn gateway_with(&self, config: Config) -> Gateway {
        Gateway::new(self.root().to_path_buf(), config)
    }

    pub fn shared_gateway(&self) -> Arc<Gateway> {
        Arc::new(self.gateway())
    }
}

/// A working repository below a fixture root.
pub struct TestRepo {
    path: PathBuf,
}

impl TestRepo {
    /// Wrap a repository created some other way (for example by a clone).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        let repo = Self { path: path.into() };
        repo.git(&["config", "user.email", "test@example.com"]);
        repo.git(&["config", "user.name", "Test User"]);
        repo
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, path: &str, content: &str) {
        let full = self.path.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.path.join(path)).unwrap()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.path.join(path).exists()
    }

    /// Write, stage and commit one file, returning the new HEAD.
    pub fn commit_file(&self, path: &str, content: &str, message: &str) -> String {
        self.write(path, content);
        self.git(&["add", path]);
        self.git(&["commit", "-m", message]);
        self.head()
    }

    pub fn head(&self) -> String {
        self.rev_parse("HEAD")
    }

    pub fn rev_parse(&self, rev: &str) -> String {
        git_output(&self.path, &["rev-parse", rev])
    }

    pub fn git(&self, args: &[&str]) {
        run_git(&self.path, args);
    }
}

/// Open `address` (a raw resource path) against `gateway`.
pub fn open(gateway: &Gateway, address: &str) -> (Repo, ResourceAddress) {
    let address = ResourceAddress::parse(address).expect("bad test address");
    let repo = gateway.open(&address).expect("failed to open test repo");
    (repo, address)
}

pub fn address(raw: &str) -> ResourceAddress {
    ResourceAddress::parse(raw).expect("bad test address")
}

fn init_repo(path: &Path) {
    run_git(path, &["init"]);
    run_git(path, &["symbolic-ref", "HEAD", "refs/heads/master"]);
    run_git(path, &["config", "user.email", "test@example.com"]);
    run_git(path, &["config", "user.name", "Test User"]);
    run_git(path, &["config", "commit.gpgsign", "false"]);
}

/// Run a git command in the given directory.
pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Run a git command and return its trimmed stdout.
pub fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}
