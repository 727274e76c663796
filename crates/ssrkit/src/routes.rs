// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Route registration with render call-sites, and prerendering.
//!
//! [`SsrRouter`] wraps an axum [`Router`] and records, for every route, the
//! views its handler renders. The recorded [`RouteTable`] is what
//! [`Renderer::prerender`] walks to compile every view ahead of time.
//!
//! ```rust,ignore
//! let blog = SsrRouter::new(renderer.clone())
//!     .page("/", RenderSite::view("blog/Index.vue"))
//!     .page("/about", RenderSite::handler_dir("About.vue"));
//!
//! let app = SsrRouter::new(renderer.clone())
//!     .page("/", RenderSite::view("Index.vue").with_context(json!({ "n": 1 })))
//!     .nest("/blog", blog);
//!
//! app.prerender(None).await?;
//! let router = app.into_router();
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{
    response::Html,
    routing::{get, MethodRouter},
    Router,
};
use futures_util::future::try_join_all;
use serde_json::Value as JsonValue;

use crate::error::{Result, SsrError};
use crate::options::RenderOverrides;
use crate::renderer::{Delivery, Renderer};

/// Where a call-site's file is looked up.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewFile {
    /// Relative to the views folder (or absolute).
    Views(String),
    /// Relative to the directory of the handler's source: the base directory
    /// of the router it was registered on, or the project root.
    HandlerDir(String),
}

impl ViewFile {
    /// The file argument to hand to the renderer.
    pub fn resolve(&self, handler_dir: &Path) -> String {
        match self {
            ViewFile::Views(file) => file.clone(),
            ViewFile::HandlerDir(file) => handler_dir.join(file).to_string_lossy().to_string(),
        }
    }
}

/// One render call a handler makes.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSite {
    /// File to render.
    pub file: ViewFile,
    /// Context passed to the view.
    pub context: JsonValue,
    /// Per-call overrides.
    pub overrides: RenderOverrides,
    /// Handler directory recorded at registration.
    pub base_dir: Option<PathBuf>,
}

impl RenderSite {
    /// A view under the views folder.
    pub fn view(file: impl Into<String>) -> Self {
        Self::new(ViewFile::Views(file.into()))
    }

    /// A view next to the handler.
    pub fn handler_dir(file: impl Into<String>) -> Self {
        Self::new(ViewFile::HandlerDir(file.into()))
    }

    fn new(file: ViewFile) -> Self {
        Self {
            file,
            context: JsonValue::Object(Default::default()),
            overrides: RenderOverrides::default(),
            base_dir: None,
        }
    }

    /// Sets the context.
    pub fn with_context(mut self, context: JsonValue) -> Self {
        self.context = context;
        self
    }

    /// Sets the overrides.
    pub fn with_overrides(mut self, overrides: RenderOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Pins the directory [`ViewFile::HandlerDir`] files resolve against.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// The renderer's file argument for this site, with `fallback` used when
    /// no handler directory was recorded.
    pub fn file_in(&self, fallback: &Path) -> String {
        self.file.resolve(self.base_dir.as_deref().unwrap_or(fallback))
    }
}

/// A registered route or nested table.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteNode {
    /// A route and the call-sites its handler renders.
    Route {
        /// Route path as registered.
        path: String,
        /// Render call-sites.
        sites: Vec<RenderSite>,
    },
    /// A nested router.
    Nested {
        /// Mount prefix.
        prefix: String,
        /// The nested router's table.
        table: RouteTable,
    },
}

/// Side table of render call-sites, keyed by route.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteTable {
    nodes: Vec<RouteNode>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a route.
    pub fn add_route(&mut self, path: impl Into<String>, sites: Vec<RenderSite>) {
        self.nodes.push(RouteNode::Route {
            path: path.into(),
            sites,
        });
    }

    /// Records a nested table.
    pub fn nest(&mut self, prefix: impl Into<String>, table: RouteTable) {
        self.nodes.push(RouteNode::Nested {
            prefix: prefix.into(),
            table,
        });
    }

    /// Direct children.
    pub fn nodes(&self) -> &[RouteNode] {
        &self.nodes
    }

    /// Every call-site with the full path of its route, depth first in
    /// registration order.
    pub fn sites(&self) -> Vec<(String, &RenderSite)> {
        let mut out = Vec::new();
        self.collect("", &mut out);
        out
    }

    fn collect<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a RenderSite)>) {
        for node in &self.nodes {
            match node {
                RouteNode::Route { path, sites } => {
                    let full = join_route(prefix, path);
                    out.extend(sites.iter().map(|site| (full.clone(), site)));
                }
                RouteNode::Nested { prefix: nested, table } => {
                    table.collect(&join_route(prefix, nested), out);
                }
            }
        }
    }
}

fn join_route(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match path.trim_start_matches('/') {
        "" if prefix.is_empty() => "/".to_string(),
        "" => prefix.to_string(),
        rest => format!("{}/{}", prefix, rest),
    }
}

/// An axum router that remembers what its handlers render.
pub struct SsrRouter<S = ()> {
    router: Router<S>,
    table: RouteTable,
    renderer: Arc<Renderer>,
    base_dir: Option<PathBuf>,
}

impl<S> std::fmt::Debug for SsrRouter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SsrRouter")
            .field("table", &self.table)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

impl<S> SsrRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    /// Creates an empty router rendering through `renderer`.
    pub fn new(renderer: Arc<Renderer>) -> Self {
        Self {
            router: Router::new(),
            table: RouteTable::new(),
            renderer,
            base_dir: None,
        }
    }

    /// Directory [`ViewFile::HandlerDir`] files resolve against, recorded
    /// on every site registered afterwards. Defaults to the project root.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// `GET path` renders `site`.
    pub fn page(mut self, path: &str, site: RenderSite) -> Self {
        let site = self.anchor(site);
        let renderer = self.renderer.clone();
        let file = site.file_in(&renderer.options().project_directory);
        let context = site.context.clone();
        let overrides = site.overrides.clone();

        let handler = move || {
            let renderer = renderer.clone();
            let file = file.clone();
            let context = context.clone();
            let overrides = overrides.clone();
            async move {
                let html = renderer
                    .template_engine(&file, context, &overrides, Delivery::Respond)
                    .await?
                    .ok_or_else(|| SsrError::Render(format!("Rendering {} produced no HTML", file)))?;
                Ok::<_, SsrError>(Html(html))
            }
        };

        self.router = self.router.route(path, get(handler));
        self.table.add_route(path, vec![site]);
        self
    }

    /// Registers a custom handler together with the call-sites it renders.
    pub fn route_with(mut self, path: &str, method_router: MethodRouter<S>, sites: Vec<RenderSite>) -> Self {
        self.router = self.router.route(path, method_router);
        let sites = sites.into_iter().map(|site| self.anchor(site)).collect();
        self.table.add_route(path, sites);
        self
    }

    fn anchor(&self, mut site: RenderSite) -> RenderSite {
        if site.base_dir.is_none() {
            site.base_dir = self.base_dir.clone();
        }
        site
    }

    /// Registers a handler that renders nothing.
    pub fn route(self, path: &str, method_router: MethodRouter<S>) -> Self {
        self.route_with(path, method_router, Vec::new())
    }

    /// Mounts `child` under `prefix`.
    pub fn nest(mut self, prefix: &str, child: SsrRouter<S>) -> Self {
        self.router = self.router.nest(prefix, child.router);
        self.table.nest(prefix, child.table);
        self
    }

    /// The recorded call-sites.
    pub fn route_table(&self) -> &RouteTable {
        &self.table
    }

    /// Compiles every recorded call-site. See [`Renderer::prerender`].
    pub async fn prerender(&self, dir: Option<&Path>) -> Result<Vec<PathBuf>> {
        self.renderer.prerender(&self.table, dir).await
    }

    /// The router with the renderer injected.
    pub fn into_router(self) -> Router<S> {
        self.renderer.inject(self.router)
    }

    /// The raw router (nothing injected) and the table.
    pub fn into_parts(self) -> (Router<S>, RouteTable) {
        (self.router, self.table)
    }
}

impl Renderer {
    /// Compiles every call-site in `table` without rendering anything.
    ///
    /// Routes under the public prefix are skipped. [`ViewFile::HandlerDir`]
    /// files resolve against `dir` when given, else the directory recorded
    /// on the site, else the project root. All builds start
    /// at once; the first failure is returned. On success, returns the
    /// output folders in call-site order, without duplicates.
    pub async fn prerender(&self, table: &RouteTable, dir: Option<&Path>) -> Result<Vec<PathBuf>> {
        let project = self.options().project_directory.as_path();
        let prefix = self.public_prefix();

        let compilations = table
            .sites()
            .into_iter()
            .filter(|(path, _)| !path.starts_with(prefix))
            .map(|(path, site)| {
                let file = match dir {
                    Some(dir) => site.file.resolve(dir),
                    None => site.file_in(project),
                };
                async move {
                    tracing::debug!(route = %path, file = %file, "prerendering");
                    let (_, descriptor) = self
                        .ensure_compiled(&file, site.context.clone(), &site.overrides)
                        .await?;
                    Ok::<_, SsrError>(descriptor.output_folder)
                }
            });

        let mut outputs: Vec<PathBuf> = Vec::new();
        for output in try_join_all(compilations).await? {
            if !outputs.contains(&output) {
                outputs.push(output);
            }
        }

        tracing::info!(views = outputs.len(), "prerender complete");
        Ok(outputs)
    }
}
