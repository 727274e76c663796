// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Inspect command: shows how a view would be compiled.

use std::path::Path;

use serde_json::{json, Value as JsonValue};
use ssrkit::{RenderOverrides, Renderer};

use crate::config::Config;
use crate::site;

/// Compilation options, output folder and public prefix of `view`.
///
/// Nothing is built.
pub fn describe(renderer: &Renderer, view: &str, overrides: &RenderOverrides) -> anyhow::Result<JsonValue> {
    let request = renderer.get_compilation_options(overrides, view, json!({}))?;
    let descriptor = renderer.validate_compilation_options(&request)?;

    Ok(json!({
        "request": request,
        "output_folder": descriptor.output_folder,
        "public_prefix": descriptor.public_prefix,
        "production_mode": descriptor.production_mode,
    }))
}

/// Prints [`describe`] for `view` as pretty JSON.
pub async fn run(dir: &Path, view: &str, title: Option<String>) -> anyhow::Result<()> {
    let config = Config::load(dir)?;
    let renderer = site::renderer(&config, dir, false)?;
    let overrides = RenderOverrides {
        title,
        ..RenderOverrides::default()
    };

    let description = describe(&renderer, view, &overrides)?;
    println!("{}", serde_json::to_string_pretty(&description)?);
    Ok(())
}
