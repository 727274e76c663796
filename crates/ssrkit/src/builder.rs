// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build orchestration: output folder, entry files, bundler run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value as JsonValue};

use crate::bundle_config::BundleConfigBuilder;
use crate::bundler::Bundler;
use crate::error::{Result, SsrError};
use crate::merge::MergeRules;
use crate::options::{BuildDescriptor, BundleConfigPair};

/// Placeholder in the app bootstrap replaced with the input file path.
pub const RENDER_FILE_TOKEN: &str = "'{{ssr-render-file}}'";
/// Placeholder in the app bootstrap replaced with the project root.
pub const ROOT_TOKEN: &str = "{{root}}";
/// Name of the materialized app bootstrap.
pub const APP_ENTRY_FILE: &str = "app.js";

/// Entry files written into an output folder.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedEntries {
    /// `<output>/app.js`
    pub app: PathBuf,
    /// `<output>/<client entry basename>`
    pub client: PathBuf,
    /// `<output>/<server entry basename>`
    pub server: PathBuf,
}

/// Runs one build per [`BuildDescriptor`].
#[derive(Debug, Clone)]
pub struct BuildOrchestrator {
    bundler: Arc<dyn Bundler>,
    configs: BundleConfigBuilder,
}

impl BuildOrchestrator {
    /// Creates an orchestrator that compiles with `bundler`.
    pub fn new(bundler: Arc<dyn Bundler>) -> Self {
        Self {
            bundler,
            configs: BundleConfigBuilder::new(),
        }
    }

    /// Prepares the output folder and runs the bundler.
    ///
    /// # Errors
    ///
    /// [`SsrError::Build`] with every compiler error message, or with the
    /// single hard-failure message when the bundler could not run.
    pub async fn build(&self, descriptor: &BuildDescriptor) -> Result<()> {
        let started = Instant::now();
        let graphs = self.prepare(descriptor)?;

        let messages = match self.bundler.run(&graphs, &descriptor.output_folder).await {
            Err(hard) => vec![hard.to_string()],
            Ok(stats) => {
                for (name, warning) in stats.warnings() {
                    tracing::warn!(compilation = name, "{}", warning);
                }
                stats.error_messages()
            }
        };

        if !messages.is_empty() {
            tracing::error!(
                input = %descriptor.input_file.display(),
                errors = messages.len(),
                "bundler failed to compile"
            );
            return Err(SsrError::Build { messages });
        }

        tracing::info!(
            input = %descriptor.input_file.display(),
            output = %descriptor.output_folder.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build complete"
        );
        Ok(())
    }

    /// Resets the output folder, writes the entry files and returns the
    /// patched graph pair. Does not run the bundler.
    pub fn prepare(&self, descriptor: &BuildDescriptor) -> Result<BundleConfigPair> {
        let fs = &descriptor.fs;
        let output = &descriptor.output_folder;

        if !descriptor.production_mode && fs.exists(output) {
            tracing::debug!(output = %output.display(), "removing previous build output");
            fs.rm(output)?;
        }
        fs.mkdir(output)?;

        let entries = materialize_entries(descriptor)?;
        let pair = self.configs.build(descriptor);

        Ok(BundleConfigPair {
            client: patch_graph(&pair.client, &entries.client, output),
            server: patch_graph(&pair.server, &entries.server, output),
        })
    }
}

/// Writes the app bootstrap and copies the client and server entries.
///
/// Sources are read from disk; output goes through the descriptor's
/// filesystem.
pub fn materialize_entries(descriptor: &BuildDescriptor) -> Result<MaterializedEntries> {
    let fs = &descriptor.fs;
    let output = &descriptor.output_folder;
    let sources = &descriptor.entry_files;

    let entries = MaterializedEntries {
        app: output.join(APP_ENTRY_FILE),
        client: output.join(basename(&sources.client)?),
        server: output.join(basename(&sources.server)?),
    };

    let app = read_source(&sources.app)?;
    fs.write(
        &entries.app,
        &render_app_entry(&app, &descriptor.input_file, &descriptor.project_directory)?,
    )?;
    fs.write(&entries.client, &read_source(&sources.client)?)?;
    fs.write(&entries.server, &read_source(&sources.server)?)?;

    Ok(entries)
}

/// Substitutes the input file (JSON-encoded, quotes included) and the
/// project root (quotes stripped) into the app bootstrap. Each token is
/// replaced once.
pub fn render_app_entry(template: &str, input_file: &Path, project_directory: &Path) -> Result<String> {
    let input = serde_json::to_string(&input_file.to_string_lossy())?;
    let root = serde_json::to_string(&project_directory.to_string_lossy())?
        .replace(['\'', '"'], "");
    Ok(template
        .replacen(RENDER_FILE_TOKEN, &input, 1)
        .replacen(ROOT_TOKEN, &root, 1))
}

fn patch_graph(graph: &JsonValue, entry: &Path, output: &Path) -> JsonValue {
    let patch = json!({
        "entry": entry.to_string_lossy(),
        "output": { "path": output.to_string_lossy() },
    });
    MergeRules::new().merge(graph, &patch)
}

fn basename(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| {
        SsrError::Configuration(format!("Entry file {} has no file name", path.display()))
    })
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        SsrError::NotFound(format!("Entry file {} could not be read: {}", path.display(), e))
    })
}
