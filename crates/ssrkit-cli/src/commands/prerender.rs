// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Prerender command: compiles every configured page without serving.

use std::path::{Path, PathBuf};
use std::time::Instant;

use console::style;

use crate::config::Config;
use crate::site;

/// Compiles every page and returns the output folders.
pub async fn run(dir: &Path, handler_dir: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
    let config = Config::load(dir)?;
    let renderer = site::renderer(&config, dir, false)?;
    let router = site::router(&config, renderer.clone());

    println!(
        "{} {} page(s)",
        style("Prerendering").cyan().bold(),
        config.pages.len()
    );

    let started = Instant::now();
    let outputs = router.prerender(handler_dir).await?;

    let root = &renderer.options().project_directory;
    for output in &outputs {
        let shown = output.strip_prefix(root).unwrap_or(output);
        println!("  {} {}", style("✓").green(), shown.display());
    }
    println!(
        "{} {} view(s) in {}",
        style("Done:").green().bold(),
        outputs.len(),
        style(format!("{}ms", started.elapsed().as_millis())).dim()
    );

    Ok(outputs)
}
