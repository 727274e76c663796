// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Assembles a renderer and a router from a [`Config`].

use std::path::Path;
use std::sync::Arc;

use ssrkit::{CommandBundler, RenderSite, Renderer, SsrRouter};

use crate::config::Config;

/// Creates the renderer for the project configured in `dir`.
///
/// `production` forces production mode on; otherwise the configured value
/// (or `SSRKIT_ENV`) decides.
pub fn renderer(config: &Config, dir: &Path, production: bool) -> anyhow::Result<Arc<Renderer>> {
    let mut options = config.renderer_options(dir);
    if production {
        options.production_mode = Some(true);
    }

    let bundler = CommandBundler::new(&config.bundler.command)
        .with_args(config.bundler.args.iter().cloned())
        .in_dir(config.project_root(dir));

    Ok(Renderer::new(Some(options), Arc::new(bundler))?)
}

/// A router with one page per `[[pages]]` entry.
pub fn router(config: &Config, renderer: Arc<Renderer>) -> SsrRouter {
    config.pages.iter().fold(SsrRouter::new(renderer), |router, page| {
        router.page(
            &page.path,
            RenderSite::view(&page.view)
                .with_context(page.context.clone())
                .with_overrides(page.overrides()),
        )
    })
}
