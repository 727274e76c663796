// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Client and server build graphs.
//!
//! Graphs are plain JSON in the shape the bundler consumes. Regular
//! expressions (`test`, `exclude`) are encoded as strings, and plugins as
//! `{ "plugin": <name>, "options": {..} }` objects so that
//! [`graph_merge_rules`] can match them by name.
//!
//! Graphs are rebuilt for every build, since entry and output differ per
//! input file.

use serde_json::{json, Value as JsonValue};

use crate::merge::{MergeRule, MergeRules};
use crate::options::{BuildDescriptor, BundleConfigPair, BundlerOverrides};

/// Package name of the rendering library; never externalized on the server.
pub const RENDERING_LIBRARY: &str = "vue";

/// File the HTML plugin emits into every output folder.
pub const HTML_SHELL_FILE: &str = "index.html";

/// File the manifest plugin emits into every output folder.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Merge rules applied when raw override graphs are layered over a baseline.
pub fn graph_merge_rules() -> MergeRules {
    let use_rules = MergeRules::new().rule("options", MergeRule::Replace);
    let rule_rules = MergeRules::new().rule("use", MergeRule::match_by_with("loader", use_rules));

    MergeRules::new()
        .rule("module.rules", MergeRule::match_by_with("test", rule_rules))
        .rule("resolve", MergeRule::Union)
        .rule("externals", MergeRule::Replace)
        .rule("plugins", MergeRule::match_by("plugin"))
}

fn mode(production: bool) -> &'static str {
    if production {
        "production"
    } else {
        "development"
    }
}

fn module_rules() -> JsonValue {
    json!([
        { "test": "\\.vue$", "use": [{ "loader": "vue-loader" }] },
        {
            "test": "\\.js$",
            "loader": "babel-loader",
            "exclude": "node_modules",
            "options": { "presets": ["@babel/preset-env"] }
        },
        { "test": "\\.css$", "use": ["vue-style-loader", "css-loader", "postcss-loader"] }
    ])
}

fn resolve_section(descriptor: &BuildDescriptor) -> JsonValue {
    json!({
        "alias": {
            "$$": descriptor.project_directory.to_string_lossy(),
            (RENDERING_LIBRARY): "vue/dist/vue.runtime.esm-bundler.js",
        },
        "extensions": [".js", ".vue", ".json", ".css", ".less", ".lua"],
        "modules": ["node_modules"],
    })
}

fn shared_plugins(production: bool) -> Vec<JsonValue> {
    vec![
        json!({ "plugin": "VueLoaderPlugin" }),
        json!({
            "plugin": "DefinePlugin",
            "options": {
                "__VUE_OPTIONS_API__": true,
                "__VUE_PROD_DEVTOOLS__": !production,
            }
        }),
        json!({ "plugin": "LimitChunkCountPlugin", "options": { "maxChunks": 1 } }),
    ]
}

/// Baseline browser graph for `descriptor`.
pub fn baseline_client_graph(descriptor: &BuildDescriptor) -> JsonValue {
    let production = descriptor.production_mode;

    let mut html_options = match descriptor.html.to_json() {
        JsonValue::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    html_options.insert("filename".into(), json!(HTML_SHELL_FILE));
    html_options.insert("publicPath".into(), json!(descriptor.public_prefix));
    html_options.insert(
        "template".into(),
        json!(descriptor.template_file.to_string_lossy()),
    );
    // Comments must survive minification: both SSR markers are comments.
    html_options.insert(
        "minify".into(),
        json!({
            "removeComments": false,
            "collapseWhitespace": production,
            "keepClosingSlash": production,
            "removeRedundantAttributes": production,
            "removeScriptTypeAttributes": production,
            "removeStyleLinkTypeAttributes": production,
            "useShortDoctype": production,
        }),
    );

    let mut plugins = shared_plugins(production);
    plugins.push(json!({ "plugin": "HtmlWebpackPlugin", "options": html_options }));

    let devtool = if production {
        JsonValue::Bool(false)
    } else {
        json!("source-map")
    };

    json!({
        "name": "client",
        "entry": "entry-client.js",
        "mode": mode(production),
        "devtool": devtool,
        "output": {
            "filename": "bundle-client.[contenthash].js",
            "publicPath": "/",
        },
        "module": { "rules": module_rules() },
        "resolve": resolve_section(descriptor),
        "externals": [],
        "plugins": plugins,
    })
}

/// Baseline server graph for `descriptor`.
pub fn baseline_server_graph(descriptor: &BuildDescriptor) -> JsonValue {
    let production = descriptor.production_mode;

    let mut plugins = shared_plugins(production);
    plugins.push(json!({ "plugin": "ManifestPlugin", "options": { "fileName": MANIFEST_FILE } }));

    json!({
        "name": "server",
        "entry": "entry-server.lua",
        "mode": mode(production),
        "target": "server",
        "output": {
            "filename": "bundle-server.[contenthash].lua",
            "library": { "type": "module-table" },
        },
        "module": { "rules": module_rules() },
        "resolve": resolve_section(descriptor),
        "externals": [{ "type": "dependencies", "except": [RENDERING_LIBRARY] }],
        "plugins": plugins,
    })
}

/// Layers the raw `defaults` graph over the client baseline.
pub fn build_client_config(defaults: &JsonValue, descriptor: &BuildDescriptor) -> JsonValue {
    graph_merge_rules().merge(&baseline_client_graph(descriptor), defaults)
}

/// Layers the raw `defaults` graph over the server baseline.
pub fn build_server_config(defaults: &JsonValue, descriptor: &BuildDescriptor) -> JsonValue {
    graph_merge_rules().merge(&baseline_server_graph(descriptor), defaults)
}

/// Produces the graph pair for a build according to its override mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleConfigBuilder;

impl BundleConfigBuilder {
    /// Creates a builder.
    pub fn new() -> Self {
        Self
    }

    /// Builds both graphs. Replacement functions are used as-is.
    pub fn build(&self, descriptor: &BuildDescriptor) -> BundleConfigPair {
        match &descriptor.overrides {
            BundlerOverrides::Replace { client, server } => BundleConfigPair {
                client: client(descriptor, &descriptor.html),
                server: server(descriptor, &descriptor.html),
            },
            BundlerOverrides::Merge { client, server } => BundleConfigPair {
                client: build_client_config(client, descriptor),
                server: build_server_config(server, descriptor),
            },
        }
    }
}
