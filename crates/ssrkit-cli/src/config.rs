// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! ssrkit project configuration.
//!
//! Configuration is loaded from `ssrkit.toml` at the project root.
//!
//! # Example Configuration
//!
//! ```toml
//! [project]
//! name = "my-app"
//! root = "."
//!
//! [renderer]
//! views_folder = "views"
//! output_folder = "dist"
//! public_prefix = "/public/ssr"
//!
//! [renderer.html]
//! title = "My App"
//!
//! [bundler]
//! command = "node"
//! args = ["scripts/bundle.mjs"]
//!
//! [server]
//! port = 3000
//! static_dir = "public"
//!
//! [[pages]]
//! path = "/"
//! view = "Index.vue"
//! context = { message = "hi" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use ssrkit::{
    BundlerOverrides, EntryFileOptions, HtmlOptions, RenderOverrides, RendererOptions, Title,
};

/// File name looked up in the configuration directory.
pub const CONFIG_FILE: &str = "ssrkit.toml";

/// Main configuration structure loaded from `ssrkit.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Project metadata.
    #[serde(default)]
    pub project: ProjectConfig,
    /// Renderer settings.
    #[serde(default)]
    pub renderer: RendererConfig,
    /// External bundler settings.
    #[serde(default)]
    pub bundler: BundlerConfig,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Pages to serve and prerender.
    #[serde(default)]
    pub pages: Vec<PageConfig>,
}

/// Project metadata configuration.
#[derive(Debug, Deserialize)]
pub struct ProjectConfig {
    /// Project name (default: "unnamed").
    #[serde(default = "default_name")]
    pub name: String,
    /// Project root, relative to the configuration file (default: ".").
    #[serde(default = "default_root")]
    pub root: String,
}

/// Renderer configuration. Unset values fall back to the renderer defaults.
#[derive(Debug, Default, Deserialize)]
pub struct RendererConfig {
    /// Component folder.
    pub views_folder: Option<String>,
    /// Build output folder.
    pub output_folder: Option<String>,
    /// URL prefix for bundle assets.
    pub public_prefix: Option<String>,
    /// HTML template.
    pub template_file: Option<String>,
    /// Production mode; `SSRKIT_ENV` decides when unset.
    pub production: Option<bool>,
    /// Key material for bundle URL obfuscation.
    pub obfuscation_key: Option<String>,
    /// Entry file overrides.
    #[serde(default)]
    pub entry_files: EntryFileOptions,
    /// HTML options.
    #[serde(default)]
    pub html: HtmlConfig,
}

/// HTML shell options.
#[derive(Debug, Default, Deserialize)]
pub struct HtmlConfig {
    /// Title used for every page.
    pub title: Option<String>,
    /// Any other value is handed to the HTML plugin as-is.
    #[serde(flatten)]
    pub metadata: Map<String, JsonValue>,
}

/// External bundler configuration.
#[derive(Debug, Deserialize)]
pub struct BundlerConfig {
    /// Program to run (default: "node").
    #[serde(default = "default_command")]
    pub command: String,
    /// Arguments placed before the graphs file.
    #[serde(default)]
    pub args: Vec<String>,
    /// Raw client graph merged over the baseline.
    #[serde(default)]
    pub client: JsonValue,
    /// Raw server graph merged over the baseline.
    #[serde(default)]
    pub server: JsonValue,
}

/// HTTP server configuration.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Server host (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
    /// Server port (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory served for requests no page matches.
    pub static_dir: Option<String>,
}

/// A page: a route and the view it renders.
#[derive(Debug, Clone, Deserialize)]
pub struct PageConfig {
    /// Route path.
    pub path: String,
    /// View file, relative to the views folder.
    pub view: String,
    /// Requested title.
    pub title: Option<String>,
    /// Context handed to the view.
    #[serde(default = "empty_context")]
    pub context: JsonValue,
}

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_root() -> String {
    ".".to_string()
}

fn default_command() -> String {
    "node".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn empty_context() -> JsonValue {
    JsonValue::Object(Map::new())
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            root: default_root(),
        }
    }
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            client: JsonValue::Null,
            server: JsonValue::Null,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
        }
    }
}

impl Config {
    /// Loads `ssrkit.toml` from `dir`.
    ///
    /// If no configuration file exists, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be parsed.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let config_path = dir.join(CONFIG_FILE);

        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)?;
        Self::parse(&content)
    }

    /// Parses configuration text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Project root for a configuration read from `dir`.
    pub fn project_root(&self, dir: &Path) -> PathBuf {
        dir.join(&self.project.root)
    }

    /// Renderer options rooted at the project root.
    pub fn renderer_options(&self, dir: &Path) -> RendererOptions {
        let renderer = &self.renderer;
        RendererOptions {
            project_directory: Some(self.project_root(dir)),
            views_folder: renderer.views_folder.clone(),
            output_folder: renderer.output_folder.clone(),
            public_prefix: renderer.public_prefix.clone(),
            template_file: renderer.template_file.clone(),
            entry_files: renderer.entry_files.clone(),
            bundler_overrides: BundlerOverrides::merge(
                self.bundler.client.clone(),
                self.bundler.server.clone(),
            ),
            production_mode: renderer.production,
            html: HtmlOptions {
                title: renderer.html.title.clone().map(Title::Literal),
                metadata: renderer.html.metadata.clone(),
            },
            fs: None,
            obfuscation_key: renderer.obfuscation_key.clone(),
        }
    }
}

impl PageConfig {
    /// Per-render overrides for this page.
    pub fn overrides(&self) -> RenderOverrides {
        RenderOverrides {
            title: self.title.clone(),
            ..RenderOverrides::default()
        }
    }
}
