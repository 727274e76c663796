// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Server command.
//!
//! Serves every configured page. In development mode each request
//! rebuilds its view; in production mode a view is built once.

use std::path::Path;

use axum::Router;
use console::style;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::Config;
use crate::site;

/// Builds the application router for the project configured in `dir`.
pub fn app(config: &Config, dir: &Path, production: bool) -> anyhow::Result<Router> {
    let renderer = site::renderer(config, dir, production)?;
    let mut router = site::router(config, renderer).into_router();

    if let Some(static_dir) = &config.server.static_dir {
        let static_path = config.project_root(dir).join(static_dir);
        router = router.fallback_service(ServeDir::new(static_path));
    }

    Ok(router.layer(TraceLayer::new_for_http()))
}

/// Runs the server until interrupted.
pub async fn run(
    dir: &Path,
    host: Option<String>,
    port: Option<u16>,
    production: bool,
) -> anyhow::Result<()> {
    let config = Config::load(dir)?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    if config.pages.is_empty() {
        println!(
            "{}",
            style("Warning: no [[pages]] configured in ssrkit.toml").yellow()
        );
    }

    let app = app(&config, dir, production)?;

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let mode = if production { "production" } else { "development" };
    println!(
        "{} {} {}",
        style("Serving").cyan().bold(),
        style(&config.project.name).bold(),
        style(format!("({})", mode)).dim()
    );
    for page in &config.pages {
        println!("  {} {}", style(&page.path).cyan(), style(&page.view).dim());
    }
    println!();
    println!("  {} http://{}", style("Local:").green(), addr);
    println!();

    axum::serve(listener, app).await?;
    Ok(())
}
