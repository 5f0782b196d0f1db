//! Test support utilities for si integration tests.
//!
//! Provides an isolated environment per test: temporary HOME and working
//! directory, and a fake Sun server the binary talks to over HTTP.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;
pub mod sun;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::path::PathBuf;

use serde_json::Value;
use tempfile::TempDir;

use sun::FakeSun;

/// Test environment with isolated temp directories and its own Sun.
///
/// No process-global state is mutated: child processes get `HOME`, the
/// Sun URL and token through their environment and run in `dir`, so tests
/// can run in parallel.
pub struct Test {
    /// Working directory of the child process
    pub dir: TempDir,
    /// Temporary home directory
    pub home: TempDir,
    /// Fake Sun server backing this test
    pub sun: FakeSun,
}

impl Test {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let home = TempDir::new().expect("failed to create temp home");
        Self {
            dir,
            home,
            sun: FakeSun::start(),
        }
    }

    /// Environment with the identity created and `scope` trusted.
    pub fn init(scope: &str) -> Self {
        let t = Self::new();
        let output = t.init_cmd(scope);
        assert!(
            output.status.success(),
            "Failed to initialize vault: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        t
    }

    /// Environment with `scope` initialized and `values` set.
    pub fn with_values(scope: &str, values: &[(&str, &str)]) -> Self {
        let t = Self::init(scope);
        for (k, v) in values {
            let output = t.set(scope, k, v);
            assert!(
                output.status.success(),
                "Failed to set {}: {}",
                k,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        t
    }

    pub fn vault_dir(&self) -> PathBuf {
        self.home.path().join(".si").join("vault")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.home.path().join(".si").join("settings.toml")
    }

    /// Parsed audit records, oldest first.
    pub fn audit(&self) -> Vec<Value> {
        std::fs::read_to_string(self.vault_dir().join("audit.log"))
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).expect("audit line is JSON"))
            .collect()
    }

    /// Write a file into the working directory.
    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("failed to write file");
        path
    }
}
