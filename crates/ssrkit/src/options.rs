// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Renderer options and the per-render data derived from them.
//!
//! [`RendererOptions`] is what users pass to [`crate::Renderer::new`]. It is
//! resolved once into [`ResolvedOptions`]. Each render call then produces a
//! [`CompilationRequest`] (request-scoped options, input file, context) and
//! from that a [`BuildDescriptor`] that drives exactly one build.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::fs::SharedFs;

/// Default views folder, relative to the project directory.
pub const DEFAULT_VIEWS_FOLDER: &str = "views";
/// Default output folder, relative to the project directory.
pub const DEFAULT_OUTPUT_FOLDER: &str = "dist";
/// Default URL prefix for bundle assets.
pub const DEFAULT_PUBLIC_PREFIX: &str = "/public/ssr";
/// Environment variable consulted when `production_mode` is unset.
pub const PRODUCTION_ENV_VAR: &str = "SSRKIT_ENV";

/// Computes a page title from the title requested by a render call.
pub type TitleFn = Arc<dyn Fn(Option<&str>) -> String + Send + Sync>;

/// Produces a complete build graph, bypassing the baseline.
pub type GraphFn = Arc<dyn Fn(&BuildDescriptor, &PageHtml) -> JsonValue + Send + Sync>;

/// Configured page title.
#[derive(Clone)]
pub enum Title {
    /// Used for every page.
    Literal(String),
    /// Called with the title a render call asked for, if any.
    Generator(TitleFn),
}

impl Title {
    /// Wraps a closure as a title generator.
    pub fn generator<F>(f: F) -> Self
    where
        F: Fn(Option<&str>) -> String + Send + Sync + 'static,
    {
        Title::Generator(Arc::new(f))
    }
}

impl fmt::Debug for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Title::Literal(title) => f.debug_tuple("Literal").field(title).finish(),
            Title::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// HTML options configured on the renderer.
#[derive(Clone, Debug, Default)]
pub struct HtmlOptions {
    /// Page title policy.
    pub title: Option<Title>,
    /// Extra values handed to the HTML plugin (`meta`, `lang`, ...).
    pub metadata: Map<String, JsonValue>,
}

/// HTML values resolved for a single page.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PageHtml {
    /// Final page title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Extra values handed to the HTML plugin.
    #[serde(flatten)]
    pub metadata: Map<String, JsonValue>,
}

impl PageHtml {
    /// The HTML plugin options this page contributes.
    pub fn to_json(&self) -> JsonValue {
        let mut map = self.metadata.clone();
        if let Some(title) = &self.title {
            map.insert("title".to_string(), JsonValue::String(title.clone()));
        }
        JsonValue::Object(map)
    }
}

/// Optional entry-file locations, relative to the project directory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryFileOptions {
    /// App bootstrap that imports the rendered component.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    /// Client entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Server entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
}

/// Resolved, absolute entry-file paths.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntryFiles {
    /// App bootstrap.
    pub app: PathBuf,
    /// Client entry.
    pub client: PathBuf,
    /// Server entry.
    pub server: PathBuf,
}

/// User adjustments to the generated build graphs.
#[derive(Clone)]
pub enum BundlerOverrides {
    /// Graphs merged over the baseline with the graph merge rules.
    Merge {
        /// Client override graph (`null` for none).
        client: JsonValue,
        /// Server override graph (`null` for none).
        server: JsonValue,
    },
    /// Functions that produce the graphs on their own; nothing is merged.
    Replace {
        /// Client graph factory.
        client: GraphFn,
        /// Server graph factory.
        server: GraphFn,
    },
}

impl BundlerOverrides {
    /// Raw graphs to merge over the baseline.
    pub fn merge(client: JsonValue, server: JsonValue) -> Self {
        BundlerOverrides::Merge { client, server }
    }

    /// Replacement graph factories.
    pub fn replace<C, S>(client: C, server: S) -> Self
    where
        C: Fn(&BuildDescriptor, &PageHtml) -> JsonValue + Send + Sync + 'static,
        S: Fn(&BuildDescriptor, &PageHtml) -> JsonValue + Send + Sync + 'static,
    {
        BundlerOverrides::Replace {
            client: Arc::new(client),
            server: Arc::new(server),
        }
    }

    /// True when the graphs come from replacement functions.
    pub fn is_replacement(&self) -> bool {
        matches!(self, BundlerOverrides::Replace { .. })
    }
}

impl Default for BundlerOverrides {
    fn default() -> Self {
        BundlerOverrides::Merge {
            client: JsonValue::Null,
            server: JsonValue::Null,
        }
    }
}

impl fmt::Debug for BundlerOverrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundlerOverrides::Merge { client, server } => f
                .debug_struct("Merge")
                .field("client", client)
                .field("server", server)
                .finish(),
            BundlerOverrides::Replace { .. } => f.write_str("Replace(..)"),
        }
    }
}

/// Options accepted by [`crate::Renderer::new`].
///
/// Every field has a default; see the field docs.
#[derive(Clone, Debug, Default)]
pub struct RendererOptions {
    /// Project root. Defaults to the current directory and must exist.
    pub project_directory: Option<PathBuf>,
    /// Component folder (default `views`).
    pub views_folder: Option<String>,
    /// Build output folder (default `dist`, created when missing).
    pub output_folder: Option<String>,
    /// URL prefix for bundle assets (default `/public/ssr`).
    pub public_prefix: Option<String>,
    /// HTML template (default: the packaged `build-files/template.html`).
    pub template_file: Option<String>,
    /// Entry files (defaults: the packaged `build-files/*`).
    pub entry_files: EntryFileOptions,
    /// Build graph overrides.
    pub bundler_overrides: BundlerOverrides,
    /// Production mode; when unset, `SSRKIT_ENV=production` enables it.
    pub production_mode: Option<bool>,
    /// HTML options.
    pub html: HtmlOptions,
    /// Filesystem used for build output. Defaults to the real filesystem.
    pub fs: Option<SharedFs>,
    /// Obfuscation key material. Defaults to the project directory path.
    pub obfuscation_key: Option<String>,
}

impl RendererOptions {
    /// Options rooted at `project_directory`, everything else defaulted.
    pub fn new(project_directory: impl Into<PathBuf>) -> Self {
        Self {
            project_directory: Some(project_directory.into()),
            ..Self::default()
        }
    }
}

/// Per-render adjustments passed alongside the file to render.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderOverrides {
    /// Views folder for this render.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views_folder: Option<String>,
    /// Template for this render.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_file: Option<String>,
    /// Entry files for this render.
    #[serde(default)]
    pub entry_files: EntryFileOptions,
    /// Requested title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Extra HTML plugin values, layered over the configured metadata.
    #[serde(default)]
    pub html: Map<String, JsonValue>,
}

impl RenderOverrides {
    /// Overrides that only set a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }
}

/// Resolved options: every path is absolute and exists.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedOptions {
    /// Project root.
    pub project_directory: PathBuf,
    /// Component folder.
    pub views_folder: PathBuf,
    /// Build output root.
    pub output_folder: PathBuf,
    /// URL prefix for bundle assets, without a trailing slash.
    pub public_prefix: String,
    /// HTML template.
    pub template_file: PathBuf,
    /// Entry files.
    pub entry_files: EntryFiles,
}

/// Everything one render call resolved to.
#[derive(Clone, Debug, Serialize)]
pub struct CompilationRequest {
    /// Request-scoped options (instance options with overrides applied).
    pub options: ResolvedOptions,
    /// Component to compile.
    pub input_file: Option<PathBuf>,
    /// HTML values for the page.
    pub html: PageHtml,
    /// Context handed to the application and serialized for hydration.
    pub context: JsonValue,
}

/// Parameters of a single build.
#[derive(Clone, Debug)]
pub struct BuildDescriptor {
    /// Absolute output folder for this input.
    pub output_folder: PathBuf,
    /// Component to compile.
    pub input_file: PathBuf,
    /// Entry files to materialize.
    pub entry_files: EntryFiles,
    /// Graph overrides.
    pub overrides: BundlerOverrides,
    /// Public prefix including the obfuscated segment.
    pub public_prefix: String,
    /// HTML template.
    pub template_file: PathBuf,
    /// HTML values for the page.
    pub html: PageHtml,
    /// Production mode at the time of the call.
    pub production_mode: bool,
    /// Project root.
    pub project_directory: PathBuf,
    /// Filesystem for build output.
    pub fs: SharedFs,
}

/// Client and server build graphs for one build.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleConfigPair {
    /// Browser bundle graph.
    pub client: JsonValue,
    /// Server bundle graph.
    pub server: JsonValue,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_html_folds_the_title_into_plugin_options() {
        let mut metadata = Map::new();
        metadata.insert("lang".into(), json!("en"));
        let html = PageHtml {
            title: Some("Home".into()),
            metadata,
        };
        assert_eq!(html.to_json(), json!({ "lang": "en", "title": "Home" }));
        assert_eq!(PageHtml::default().to_json(), json!({}));
    }

    #[test]
    fn render_overrides_deserialize_from_partial_input() {
        let overrides: RenderOverrides =
            serde_json::from_value(json!({ "title": "About", "entry_files": { "app": "app.js" } }))
                .unwrap();
        assert_eq!(overrides.title.as_deref(), Some("About"));
        assert_eq!(overrides.entry_files.app.as_deref(), Some("app.js"));
        assert!(overrides.views_folder.is_none());
    }

    #[test]
    fn default_overrides_merge_nothing() {
        let overrides = BundlerOverrides::default();
        assert!(!overrides.is_replacement());
        let replaced = BundlerOverrides::replace(|_, _| json!({}), |_, _| json!({}));
        assert!(replaced.is_replacement());
        assert_eq!(format!("{:?}", replaced), "Replace(..)");
    }
}
