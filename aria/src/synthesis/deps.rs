//! Dependency resolution for generated programs
//!
//! Scans the normalized code for top-level import names, filters the ones the
//! interpreter already ships, probes the rest for importability and installs
//! whatever is missing, one module at a time with a bounded timeout per
//! install. The first failure aborts the whole request; modules installed
//! before the failure are left in place (no rollback).

use std::collections::BTreeSet;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

use super::SynthesisError;

/// Module names bundled with the interpreter; never worth a pip run.
const STDLIB_MODULES: &[&str] = &[
    "abc", "argparse", "array", "ast", "asyncio", "base64", "bisect", "calendar", "collections",
    "concurrent", "contextlib", "copy", "csv", "ctypes", "dataclasses", "datetime", "decimal",
    "difflib", "email", "enum", "fnmatch", "fractions", "functools", "getpass", "glob", "gzip",
    "hashlib", "heapq", "html", "http", "imaplib", "io", "itertools", "json", "logging", "math",
    "multiprocessing", "operator", "os", "pathlib", "pickle", "platform", "pprint", "queue",
    "random", "re", "secrets", "select", "shlex", "shutil", "signal", "smtplib", "socket",
    "sqlite3", "ssl", "stat", "statistics", "string", "struct", "subprocess", "sys", "tarfile",
    "tempfile", "textwrap", "threading", "time", "tkinter", "traceback", "turtle", "types",
    "typing", "unicodedata", "unittest", "urllib", "uuid", "warnings", "wave", "webbrowser",
    "xml", "zipfile", "zlib",
];

/// Extract top-level module names from `import X` / `from X import ...` lines.
///
/// Only the part before the first dot counts; relative imports are skipped.
/// The set is ordered so install order (and log output) is deterministic.
pub fn scan_imports(code: &str) -> BTreeSet<String> {
    let mut modules = BTreeSet::new();

    for raw_line in code.lines() {
        let line = raw_line.trim();
        if let Some(rest) = line.strip_prefix("import ") {
            // `import a.b as c, d` -> a, d
            for spec in rest.split(',') {
                let name = spec.trim().split_whitespace().next().unwrap_or("");
                if let Some(top) = top_level_name(name) {
                    modules.insert(top);
                }
            }
        } else if let Some(rest) = line.strip_prefix("from ") {
            let name = rest.split_whitespace().next().unwrap_or("");
            if let Some(top) = top_level_name(name) {
                modules.insert(top);
            }
        }
    }

    modules
}

fn top_level_name(spec: &str) -> Option<String> {
    let top = spec.split('.').next().unwrap_or("").trim();
    if top.is_empty() {
        // Relative import (`from . import x`)
        return None;
    }
    if !top.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }
    // Case is preserved: module names matter to the interpreter even though
    // the package index is case-insensitive.
    Some(top.to_string())
}

/// True for modules that ship with the interpreter
pub fn is_stdlib(module: &str) -> bool {
    STDLIB_MODULES.contains(&module)
}

/// Installs missing modules through the package manager
pub struct DependencyResolver {
    interpreter: String,
    install_timeout: Duration,
}

impl DependencyResolver {
    pub fn new(interpreter: impl Into<String>, install_timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            install_timeout,
        }
    }

    /// Imports that are neither stdlib nor currently importable
    pub async fn missing_modules(
        &self,
        imports: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, SynthesisError> {
        let mut missing = BTreeSet::new();
        for module in imports {
            if is_stdlib(module) {
                continue;
            }
            if self.is_importable(module).await? {
                debug!(%module, "Module already available");
            } else {
                missing.insert(module.clone());
            }
        }
        Ok(missing)
    }

    /// Check whether a module imports cleanly in the current environment
    async fn is_importable(&self, module: &str) -> Result<bool, SynthesisError> {
        let output = Command::new(&self.interpreter)
            .arg("-c")
            .arg(format!("import {}", module))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| SynthesisError::PackageManager(e.to_string()))?;
        Ok(output.status.success())
    }

    /// Install every module in the set, one at a time.
    ///
    /// A single failure (or per-install timeout) aborts with the failing
    /// module named. Already-installed modules stay installed.
    pub async fn ensure_installed(
        &self,
        modules: &BTreeSet<String>,
    ) -> Result<(), SynthesisError> {
        for module in modules {
            info!(%module, "Installing missing module");
            let mut cmd = Command::new(&self.interpreter);
            cmd.arg("-m")
                .arg("pip")
                .arg("install")
                .arg("--quiet")
                .arg("--disable-pip-version-check")
                .arg(module)
                .env("PIP_NO_WARN_SCRIPT_LOCATION", "0")
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());

            let result = tokio::time::timeout(self.install_timeout, cmd.output()).await;
            let output = match result {
                Err(_) => {
                    warn!(%module, "Module install timed out");
                    return Err(SynthesisError::InstallTimeout {
                        module: module.clone(),
                    });
                }
                Ok(Err(e)) => return Err(SynthesisError::PackageManager(e.to_string())),
                Ok(Ok(output)) => output,
            };

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(%module, "Module install failed: {}", stderr.trim());
                return Err(SynthesisError::DependencyInstall {
                    module: module.clone(),
                    detail: stderr.trim().to_string(),
                });
            }
            debug!(%module, "Module installed");
        }
        Ok(())
    }
}
