// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Shared fixtures: a scratch project and a scripted in-process bundler.
//!
//! The scripted bundler understands a tiny component format:
//!
//! ```text
//! <script>
//! import Child from './Child.vue'
//! </script>
//! <template><div id="parent">{{ greeting }}<Child /></div></template>
//! ```
//!
//! It inlines imported children, turns `{{ key }}` into context lookups and
//! emits a Lua server bundle, a client bundle, `manifest.json` and
//! `index.html`, the same layout a real bundler produces.

#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use ssrkit::{
    BundleConfigPair, Bundler, CompilationStats, Diagnostic, MultiStats, Renderer,
    RendererOptions, SsrError,
};
use tempfile::TempDir;

/// Bundler that compiles the toy component format in-process.
#[derive(Debug, Default)]
pub struct ScriptedBundler {
    builds: AtomicUsize,
    delay: Option<Duration>,
    seen: Mutex<Vec<BundleConfigPair>>,
}

impl ScriptedBundler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<BundleConfigPair> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Bundler for ScriptedBundler {
    async fn run(&self, graphs: &BundleConfigPair, output: &Path) -> ssrkit::Result<MultiStats> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(graphs.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let input = read_input_file(&output.join("app.js"))?;
        let markup = match compile_component(&input) {
            Ok(markup) => markup,
            Err(message) => {
                return Ok(MultiStats {
                    stats: vec![
                        CompilationStats {
                            name: "server".into(),
                            errors: vec![Diagnostic::Text(message.clone())],
                            warnings: vec![],
                        },
                        CompilationStats {
                            name: "client".into(),
                            errors: vec![Diagnostic::Detailed { message }],
                            warnings: vec![],
                        },
                    ],
                })
            }
        };

        let hash = short_hash(&markup);
        let chunk = format!("chunk-{}", hash);
        fs::write(output.join(format!("{}.lua", chunk)), lua_render_chunk(&markup))?;
        fs::write(
            output.join(format!("bundle-server.{}.lua", hash)),
            format!(
                "local render = require(\"./{}\")\n\
                 return {{\n  default = function(ctx)\n    return {{ render = function(self) return render(ctx) end }}\n  end,\n}}\n",
                chunk
            ),
        )?;
        fs::write(
            output.join("manifest.json"),
            json!({ "main.lua": format!("bundle-server.{}.lua", hash) }).to_string(),
        )?;

        let client = format!("bundle-client.{}", hash);
        fs::write(output.join(format!("{}.js", client)), "console.log('hydrate');")?;
        fs::write(output.join(format!("{}.css", client)), "#app { color: red; }")?;
        if graphs.client["devtool"] == "source-map" {
            fs::write(output.join(format!("{}.js.map", client)), "{\"version\":3}")?;
        }

        let html = html_plugin_options(&graphs.client);
        let template = fs::read_to_string(html["template"].as_str().unwrap_or_default())?;
        let prefix = html["publicPath"].as_str().unwrap_or_default();
        let title = html["title"].as_str().unwrap_or_default();
        let shell = template
            .replace("<%= htmlWebpackPlugin.options.title %>", title)
            .replace(
                "</head>",
                &format!(
                    "<link href=\"{0}/{1}.css\" rel=\"stylesheet\"><script defer src=\"{0}/{1}.js\"></script></head>",
                    prefix, client
                ),
            );
        fs::write(output.join("index.html"), shell)?;

        Ok(MultiStats {
            stats: vec![
                CompilationStats {
                    name: "server".into(),
                    ..CompilationStats::default()
                },
                CompilationStats {
                    name: "client".into(),
                    ..CompilationStats::default()
                },
            ],
        })
    }
}

fn read_input_file(app: &Path) -> ssrkit::Result<PathBuf> {
    let source = fs::read_to_string(app)?;
    let literal = source
        .lines()
        .find_map(|line| line.trim().strip_prefix("import App from "))
        .map(|rest| rest.trim_end_matches(';').trim())
        .ok_or_else(|| SsrError::Render("app.js does not import App".into()))?;
    let path: String = serde_json::from_str(literal)?;
    Ok(PathBuf::from(path))
}

fn html_plugin_options(client: &JsonValue) -> JsonValue {
    client["plugins"]
        .as_array()
        .and_then(|plugins| plugins.iter().find(|p| p["plugin"] == "HtmlWebpackPlugin"))
        .map(|p| p["options"].clone())
        .unwrap_or(JsonValue::Null)
}

/// Template markup of `file` with imported children inlined.
fn compile_component(file: &Path) -> std::result::Result<String, String> {
    let source = fs::read_to_string(file)
        .map_err(|e| format!("Module not found: {}: {}", file.display(), e))?;
    if source.contains("<error") {
        return Err(format!("Syntax error in {}", file.display()));
    }

    let start = source
        .find("<template>")
        .ok_or_else(|| format!("{} has no <template>", file.display()))?;
    let end = source
        .rfind("</template>")
        .ok_or_else(|| format!("{} has no </template>", file.display()))?;
    let mut markup = source[start + "<template>".len()..end].trim().to_string();

    let dir = file.parent().unwrap_or(Path::new("."));
    for line in source.lines() {
        let Some(rest) = line.trim().strip_prefix("import ") else {
            continue;
        };
        let Some((name, import_path)) = rest.split_once(" from ") else {
            continue;
        };
        let import_path = import_path.trim().trim_end_matches(';').trim_matches(|c| c == '\'' || c == '"');
        let child = compile_component(&dir.join(import_path))?;
        markup = markup
            .replace(&format!("<{} />", name.trim()), &child)
            .replace(&format!("<{}/>", name.trim()), &child);
    }
    Ok(markup)
}

/// `return function(ctx) return <concatenation> end` with `{{ key }}`
/// becoming `tostring(ctx.key)`.
fn lua_render_chunk(markup: &str) -> String {
    let mut parts = Vec::new();
    let mut rest = markup;
    while let Some(open) = rest.find("{{") {
        let Some(close) = rest[open..].find("}}") else {
            break;
        };
        parts.push(format!("[===[{}]===]", &rest[..open]));
        let key = rest[open + 2..open + close].trim();
        parts.push(format!("tostring(ctx[\"{}\"] or \"\")", key));
        rest = &rest[open + close + 2..];
    }
    parts.push(format!("[===[{}]===]", rest));
    format!("return function(ctx)\n  return {}\nend\n", parts.join(" .. "))
}

fn short_hash(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

/// A project directory with a `views` folder.
pub struct Project {
    pub temp: TempDir,
}

impl Project {
    pub fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("views")).unwrap();
        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn view(self, name: &str, source: &str) -> Self {
        let path = self.root().join("views").join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, source).unwrap();
        self
    }

    pub fn file(self, name: &str, source: &str) -> Self {
        let path = self.root().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, source).unwrap();
        self
    }

    pub fn options(&self, production: bool) -> RendererOptions {
        let mut options = RendererOptions::new(self.root());
        options.production_mode = Some(production);
        options
    }

    pub fn renderer(&self, production: bool, bundler: Arc<ScriptedBundler>) -> Arc<Renderer> {
        Renderer::new(Some(self.options(production)), bundler).unwrap()
    }
}

/// Text between `<div id='app'>` and its matching end, for assertions.
pub fn outlet(html: &str) -> &str {
    let start = html.find("<div id='app'>").expect("outlet present") + "<div id='app'>".len();
    let end = html.rfind("</div>").expect("outlet closed");
    &html[start..end]
}
