// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The external bundler seam.
//!
//! A [`Bundler`] receives both build graphs and runs them as one
//! multi-compilation, reporting per-compilation diagnostics as
//! [`MultiStats`]. An `Err` from [`Bundler::run`] is a hard failure: the
//! bundler could not run at all.
//!
//! [`CommandBundler`] drives an external program:
//!
//! ```text
//! <program> <args..> <output>/bundle-graphs.json
//! ```
//!
//! The graphs file holds `{ "client": .., "server": .. }`. The program
//! prints MultiStats JSON on stdout:
//!
//! ```json
//! { "stats": [ { "name": "client", "errors": [], "warnings": [] } ] }
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command as TokioCommand;

use crate::error::{Result, SsrError};
use crate::options::BundleConfigPair;

/// File the command bundler writes the graphs to.
pub const GRAPHS_FILE: &str = "bundle-graphs.json";

/// A single compiler diagnostic.
///
/// Accepts both `{ "message": "..." }` objects and bare strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Diagnostic {
    /// Structured diagnostic.
    Detailed {
        /// Human-readable message.
        message: String,
    },
    /// Bare message.
    Text(String),
}

impl Diagnostic {
    /// The diagnostic text.
    pub fn message(&self) -> &str {
        match self {
            Diagnostic::Detailed { message } => message,
            Diagnostic::Text(message) => message,
        }
    }
}

/// Result of one compilation inside a multi-compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilationStats {
    /// Graph name (`client` or `server`).
    #[serde(default)]
    pub name: String,
    /// Errors reported by this compilation.
    #[serde(default)]
    pub errors: Vec<Diagnostic>,
    /// Warnings reported by this compilation.
    #[serde(default)]
    pub warnings: Vec<Diagnostic>,
}

impl CompilationStats {
    /// True when this compilation reported errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Result of a multi-compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiStats {
    /// One entry per compilation.
    #[serde(default)]
    pub stats: Vec<CompilationStats>,
}

impl MultiStats {
    /// Every error message of every compilation that reported errors, in
    /// compilation order.
    pub fn error_messages(&self) -> Vec<String> {
        self.stats
            .iter()
            .filter(|stat| stat.has_errors())
            .flat_map(|stat| stat.errors.iter().map(|d| d.message().to_string()))
            .collect()
    }

    /// `(compilation name, message)` for every warning.
    pub fn warnings(&self) -> Vec<(&str, &str)> {
        self.stats
            .iter()
            .flat_map(|stat| {
                stat.warnings
                    .iter()
                    .map(move |d| (stat.name.as_str(), d.message()))
            })
            .collect()
    }
}

/// Runs both build graphs as one multi-compilation.
#[async_trait]
pub trait Bundler: Send + Sync + std::fmt::Debug {
    /// Compiles `graphs`, emitting into `output_folder`.
    async fn run(&self, graphs: &BundleConfigPair, output_folder: &Path) -> Result<MultiStats>;
}

/// Bundler backed by an external program.
#[derive(Debug, Clone)]
pub struct CommandBundler {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandBundler {
    /// Creates a bundler that runs `program`.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    /// Arguments placed before the graphs file.
    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Directory the program runs in (usually the project root).
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The program name.
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    async fn run(&self, graphs: &BundleConfigPair, output_folder: &Path) -> Result<MultiStats> {
        let graphs_file = output_folder.join(GRAPHS_FILE);
        tokio::fs::write(&graphs_file, serde_json::to_string_pretty(graphs)?).await?;

        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args)
            .arg(&graphs_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(program = %self.program, graphs = %graphs_file.display(), "running bundler");
        let output = cmd.output().await.map_err(|e| {
            SsrError::Configuration(format!("Failed to run bundler '{}': {}", self.program, e))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if stdout.trim().is_empty() {
            if output.status.success() {
                return Ok(MultiStats::default());
            }
            return Err(hard_failure(&self.program, output.status.code(), &stderr));
        }

        match serde_json::from_str::<MultiStats>(stdout.trim()) {
            Ok(stats) => Ok(stats),
            Err(_) if !output.status.success() => {
                Err(hard_failure(&self.program, output.status.code(), &stderr))
            }
            Err(e) => Err(SsrError::Render(format!(
                "Bundler '{}' printed invalid stats: {}",
                self.program, e
            ))),
        }
    }
}

fn hard_failure(program: &str, code: Option<i32>, stderr: &str) -> SsrError {
    let status = code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "signal".to_string());
    SsrError::Render(format!(
        "Bundler '{}' exited with status {}: {}",
        program,
        status,
        stderr.trim()
    ))
}
