// src/installer/selftest.rs

//! Post-install self-test
//!
//! Runs the recipe's test command against the installed prefix and checks
//! that its combined output contains the expected text (the recipe version
//! unless the recipe says otherwise). The binary's self-reported version is
//! trusted; installed files are not re-hashed.

use super::Installer;
use super::process::run_bounded;
use crate::error::{Error, Result};
use crate::recipe::Recipe;
use tracing::{debug, info};

/// Outcome of a passing self-test
#[derive(Debug, Clone)]
pub struct TestReport {
    pub name: String,
    pub version: String,
    pub command: String,
    pub expected: String,
    pub output: String,
}

impl Installer {
    /// Run a recipe's self-test against its recorded install
    ///
    /// Fails with `NotInstalled` unless a receipt for this name and version
    /// exists under the configured prefix.
    pub fn test(&self, recipe: &Recipe) -> Result<TestReport> {
        let name = &recipe.package.name;
        let version = &recipe.package.version;

        let Some(test) = &recipe.test else {
            return Err(Error::InvalidRecipe {
                name: name.clone(),
                problems: vec!["recipe has no [test] section".to_string()],
            });
        };

        let installed = self
            .receipts
            .get(name)?
            .is_some_and(|r| r.matches(version, &self.config.prefix));
        if !installed {
            return Err(Error::NotInstalled {
                name: name.clone(),
                version: version.clone(),
            });
        }

        let layout = self.config.layout();
        let argv: Vec<String> = test
            .command
            .iter()
            .map(|arg| recipe.substitute(arg, &layout))
            .collect();
        let expected = recipe
            .expected_test_output(&layout)
            .unwrap_or_else(|| version.clone());
        let command = argv.join(" ");
        let timeout = self.config.test_timeout();

        info!("[{}] Testing: {}", name, command);
        let failed = |status: String, output: String| Error::TestFailed {
            name: name.clone(),
            command: command.clone(),
            expected: expected.clone(),
            status,
            output,
        };

        let out = run_bounded(&argv, &layout.bin_dir(), timeout)
            .map_err(|e| failed(format!("failed to run: {}", e), String::new()))?;
        debug!("[{}] test output: {}", name, out.output.trim());

        if !out.success() {
            return Err(failed(out.describe_status(timeout), out.output));
        }
        if !out.output.contains(&expected) {
            return Err(failed("output mismatch".to_string(), out.output));
        }

        info!("[{}] Test passed", name);
        Ok(TestReport {
            name: name.clone(),
            version: version.clone(),
            command,
            expected,
            output: out.output,
        })
    }
}
