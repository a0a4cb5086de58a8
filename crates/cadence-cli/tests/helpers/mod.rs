#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test harness for running CLI commands with temporary databases
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    /// Create a new test harness with a temporary database
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("Failed to find cadence binary");

        // Run inside the temp dir so no stray cadence.toml is picked up
        cmd.current_dir(self.temp_dir.path());
        cmd.env("CADENCE_DATABASE_PATH", &self.db_path);
        cmd.env_remove("RUST_LOG");

        cmd
    }

    /// Get the database path for this test instance
    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Run a command and return its stdout with colour codes removed
    pub fn stdout_of(&self, args: &[&str]) -> String {
        let output = self.run_success(args).get_output().stdout.clone();
        strip_ansi(&String::from_utf8_lossy(&output))
    }

    /// Add a task and return its short id
    pub fn add_task(&self, args: &[&str]) -> String {
        let mut full = vec!["task", "add"];
        full.extend_from_slice(args);
        let out = self.stdout_of(&full);
        let line = out
            .lines()
            .find(|l| l.contains("Created task"))
            .expect("no creation line");
        let start = line.rfind('(').expect("no id") + 1;
        let end = line.rfind(')').expect("no id");
        line[start..end].to_string()
    }

    /// Add a rule and return its short id
    pub fn add_rule(&self, args: &[&str]) -> String {
        let mut full = vec!["rule", "add"];
        full.extend_from_slice(args);
        let out = self.stdout_of(&full);
        out.lines()
            .find(|l| l.contains("Created recurrence rule"))
            .and_then(|l| l.split_whitespace().last())
            .expect("no rule id")
            .to_string()
    }

    /// `run --json` parsed into a JSON value
    pub fn run_json(&self, as_of: &str) -> serde_json::Value {
        let out = self.stdout_of(&["run", "--as-of", as_of, "--json"]);
        serde_json::from_str(&out).expect("run --json did not print JSON")
    }
}

/// Removes ANSI escape sequences such as `\x1b[32m`.
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Utility functions for test assertions
pub mod assertions {
    use predicates::prelude::*;

    /// Predicate to check for error messages
    pub fn has_error() -> impl Predicate<str> {
        predicate::str::contains("Error").or(predicate::str::contains("error"))
    }
}
