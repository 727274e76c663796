// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The render orchestrator.
//!
//! A [`Renderer`] owns the resolved configuration, the module cache, the
//! obfuscator and the in-flight build map. Each render call goes through:
//!
//! 1. [`Renderer::get_compilation_options`]: merge call overrides, resolve
//!    the title and the input file
//! 2. [`Renderer::validate_compilation_options`]: derive the
//!    [`BuildDescriptor`] (output folder, obfuscated public prefix)
//! 3. build, unless production mode is on and the output folder exists
//! 4. [`Renderer::render_file`]: execute the server bundle and fill the
//!    HTML shell
//!
//! ```rust,ignore
//! let renderer = Renderer::new(Some(RendererOptions::new("./app")), bundler)?;
//! let html = renderer
//!     .template_engine("Index.vue", json!({ "user": "ada" }), &RenderOverrides::default(), Delivery::Respond)
//!     .await?;
//! ```

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::FutureExt;
use serde_json::Value as JsonValue;

use crate::builder::BuildOrchestrator;
use crate::bundle_config::{HTML_SHELL_FILE, MANIFEST_FILE};
use crate::bundler::Bundler;
use crate::error::{Result, SsrError};
use crate::fs::{absolutize, normalize, FileSystem, RealFileSystem, SharedFs};
use crate::inflight::InFlight;
use crate::markup::render_to_string;
use crate::module_cache::ModuleCache;
use crate::obfuscate::PathObfuscator;
use crate::options::{
    BuildDescriptor, BundlerOverrides, CompilationRequest, EntryFileOptions, EntryFiles,
    HtmlOptions, PageHtml, RenderOverrides, RendererOptions, ResolvedOptions, Title,
    DEFAULT_OUTPUT_FOLDER, DEFAULT_PUBLIC_PREFIX, DEFAULT_VIEWS_FOLDER, PRODUCTION_ENV_VAR,
};
use crate::paths::{resolve_file, resolve_folder, resolve_package_file};

/// Marker in the HTML shell replaced with the hydration state.
pub const STATE_MARKER: &str = "/** ssr-initial-state **/";
/// Marker in the HTML shell replaced with the rendered markup.
pub const OUTLET_MARKER: &str = "<!--ssr-outlet-->";
/// Manifest keys tried, in order, for the server bundle.
pub const SERVER_MANIFEST_KEYS: [&str; 3] = ["main.lua", "main.js", "main"];

/// What a render call should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Render and return the final HTML.
    Respond,
    /// Only make sure the build output exists.
    CompileOnly,
}

/// Compiles views on demand and renders them to HTML.
pub struct Renderer {
    options: ResolvedOptions,
    html: HtmlOptions,
    overrides: BundlerOverrides,
    production_mode: AtomicBool,
    fs: SharedFs,
    obfuscator: PathObfuscator,
    modules: ModuleCache,
    builder: BuildOrchestrator,
    inflight: InFlight,
    outputs: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("options", &self.options)
            .field("production_mode", &self.production_mode())
            .finish_non_exhaustive()
    }
}

impl Renderer {
    /// Resolves `options` and creates a renderer that builds with `bundler`.
    ///
    /// # Errors
    ///
    /// [`SsrError::Configuration`] when `options` is `None`, the project
    /// directory does not exist, or a configured path is blank;
    /// [`SsrError::NotFound`] when a configured file or the views folder is
    /// missing.
    pub fn new(options: Option<RendererOptions>, bundler: Arc<dyn Bundler>) -> Result<Arc<Self>> {
        let options = options.ok_or_else(|| {
            SsrError::Configuration("Missing options for the renderer.".to_string())
        })?;

        let real = RealFileSystem;
        let project_directory = resolve_project_directory(options.project_directory.as_deref())?;
        let project = Some(project_directory.as_path());

        let views_folder = resolve_folder(
            &real,
            options.views_folder.as_deref().unwrap_or(DEFAULT_VIEWS_FOLDER),
            project,
            false,
        )?;
        let output_folder = resolve_folder(
            &real,
            options.output_folder.as_deref().unwrap_or(DEFAULT_OUTPUT_FOLDER),
            project,
            true,
        )?;
        let template_file = match options.template_file.as_deref() {
            Some(file) => resolve_file(&real, file, project)?,
            None => resolve_package_file(&real, "build-files/template.html", &output_folder)?,
        };
        let entry_files = resolve_entry_files(
            &real,
            &options.entry_files,
            &project_directory,
            &output_folder,
            None,
        )?;
        let public_prefix = normalize_prefix(
            options.public_prefix.as_deref().unwrap_or(DEFAULT_PUBLIC_PREFIX),
        )?;

        let production_mode = options.production_mode.unwrap_or_else(production_from_env);
        let key_material = options
            .obfuscation_key
            .clone()
            .unwrap_or_else(|| project_directory.to_string_lossy().to_string());
        let obfuscator = PathObfuscator::new(&key_material)?;

        tracing::debug!(
            project = %project_directory.display(),
            views = %views_folder.display(),
            output = %output_folder.display(),
            prefix = %public_prefix,
            production_mode,
            "renderer configured"
        );

        Ok(Arc::new(Self {
            options: ResolvedOptions {
                project_directory,
                views_folder,
                output_folder,
                public_prefix,
                template_file,
                entry_files,
            },
            html: options.html,
            overrides: options.bundler_overrides,
            production_mode: AtomicBool::new(production_mode),
            fs: options.fs.unwrap_or_else(RealFileSystem::shared),
            obfuscator,
            modules: ModuleCache::new(),
            builder: BuildOrchestrator::new(bundler),
            inflight: InFlight::new(),
            outputs: Mutex::new(HashMap::new()),
        }))
    }

    /// The resolved instance options.
    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    /// URL prefix of the bundle asset routes.
    pub fn public_prefix(&self) -> &str {
        &self.options.public_prefix
    }

    /// Filesystem used for build output.
    pub fn fs(&self) -> &SharedFs {
        &self.fs
    }

    /// Whether builds are reused once their output folder exists.
    pub fn production_mode(&self) -> bool {
        self.production_mode.load(Ordering::SeqCst)
    }

    /// Switches production mode. Asset routes registered earlier keep the
    /// source-map policy they were registered with.
    pub fn set_production_mode(&self, production: bool) {
        self.production_mode.store(production, Ordering::SeqCst);
    }

    /// Cache of executed server bundles.
    pub fn module_cache(&self) -> &ModuleCache {
        &self.modules
    }

    /// Encrypts an output-folder segment for use in a URL.
    pub fn obfuscate(&self, segment: &str) -> Result<String> {
        self.obfuscator.obfuscate(segment)
    }

    /// Reverses [`obfuscate`](Self::obfuscate).
    pub fn clarify(&self, token: &str) -> Result<String> {
        self.obfuscator.clarify(token)
    }

    /// Merges `overrides` over the instance options and resolves the page
    /// title and the file to render.
    ///
    /// A blank `file` leaves `input_file` empty, which
    /// [`validate_compilation_options`](Self::validate_compilation_options)
    /// rejects.
    pub fn get_compilation_options(
        &self,
        overrides: &RenderOverrides,
        file: &str,
        context: JsonValue,
    ) -> Result<CompilationRequest> {
        let options = self.request_options(overrides)?;

        let mut metadata = self.html.metadata.clone();
        metadata.extend(overrides.html.clone());
        let title = self.title_for(overrides).or_else(|| {
            Path::new(file)
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
        });

        let input_file = if file.trim().is_empty() {
            None
        } else {
            Some(resolve_file(&RealFileSystem, file, Some(&options.views_folder))?)
        };

        let context = if context.is_null() {
            JsonValue::Object(Default::default())
        } else {
            context
        };

        Ok(CompilationRequest {
            options,
            input_file,
            html: PageHtml { title, metadata },
            context,
        })
    }

    fn request_options(&self, overrides: &RenderOverrides) -> Result<ResolvedOptions> {
        let real = RealFileSystem;
        let project = self.options.project_directory.as_path();

        let mut options = self.options.clone();
        if let Some(views) = overrides.views_folder.as_deref() {
            options.views_folder = resolve_folder(&real, views, Some(project), false)?;
        }
        if let Some(template) = overrides.template_file.as_deref() {
            options.template_file = resolve_file(&real, template, Some(project))?;
        }
        options.entry_files = resolve_entry_files(
            &real,
            &overrides.entry_files,
            project,
            &self.options.output_folder,
            Some(&self.options.entry_files),
        )?;
        Ok(options)
    }

    /// Configured generator (called with the requested title), else the
    /// configured literal, else the requested title.
    fn title_for(&self, overrides: &RenderOverrides) -> Option<String> {
        match &self.html.title {
            Some(Title::Generator(generate)) => Some(generate(overrides.title.as_deref())),
            Some(Title::Literal(title)) => Some(title.clone()),
            None => overrides.title.clone(),
        }
    }

    /// Derives the build parameters for `request`.
    ///
    /// # Errors
    ///
    /// [`SsrError::Configuration`] when the request has no input file, or
    /// when another input file already compiles into the same output folder.
    pub fn validate_compilation_options(&self, request: &CompilationRequest) -> Result<BuildDescriptor> {
        let input_file = request.input_file.clone().ok_or_else(|| {
            SsrError::Configuration("Invalid input file to compile".to_string())
        })?;

        let stem = Self::output_path(&request.options.views_folder, &input_file, false);
        if stem.as_os_str().is_empty() {
            return Err(SsrError::Configuration(format!(
                "Input file {} does not name a view",
                input_file.display()
            )));
        }
        let output_folder = self.options.output_folder.join(&stem);
        self.claim_output(&output_folder, &input_file)?;

        let public_prefix = format!(
            "{}/{}",
            self.options.public_prefix,
            self.obfuscate(&url_segment(&stem))?
        );

        Ok(BuildDescriptor {
            output_folder,
            input_file,
            entry_files: request.options.entry_files.clone(),
            overrides: self.overrides.clone(),
            public_prefix,
            template_file: request.options.template_file.clone(),
            html: request.html.clone(),
            production_mode: self.production_mode(),
            project_directory: self.options.project_directory.clone(),
            fs: self.fs.clone(),
        })
    }

    fn claim_output(&self, output_folder: &Path, input_file: &Path) -> Result<()> {
        let mut outputs = self
            .outputs
            .lock()
            .map_err(|_| SsrError::Cache("Failed to acquire output registry lock".to_string()))?;
        match outputs.get(output_folder) {
            Some(owner) if owner != input_file => Err(SsrError::Configuration(format!(
                "Views {} and {} both compile to {}",
                owner.display(),
                input_file.display(),
                output_folder.display()
            ))),
            Some(_) => Ok(()),
            None => {
                outputs.insert(output_folder.to_path_buf(), input_file.to_path_buf());
                Ok(())
            }
        }
    }

    /// Maps `input_file` to its output stem relative to `root`: parent and
    /// current-directory segments are dropped, as is the extension. With
    /// `absolute`, the stem is joined onto `root`.
    pub fn output_path(root: &Path, input_file: &Path, absolute: bool) -> PathBuf {
        let relative = relative_path(root, input_file);
        let mut stem: PathBuf = relative
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();
        if stem.extension().is_some() {
            stem.set_extension("");
        }

        if absolute {
            root.join(stem)
        } else {
            stem
        }
    }

    /// Renders `file`, building first when needed.
    ///
    /// Development mode always rebuilds. Production mode builds only when
    /// the output folder is missing. Concurrent builds of one output
    /// folder are coalesced.
    pub async fn template_engine(
        &self,
        file: &str,
        context: JsonValue,
        overrides: &RenderOverrides,
        delivery: Delivery,
    ) -> Result<Option<String>> {
        let (request, descriptor) = self.ensure_compiled(file, context, overrides).await?;
        match delivery {
            Delivery::Respond => Ok(Some(self.render_file(&descriptor, &request).await?)),
            Delivery::CompileOnly => Ok(None),
        }
    }

    /// The compile half of [`template_engine`](Self::template_engine):
    /// resolves and validates the call, then builds unless a production
    /// build already exists.
    pub async fn ensure_compiled(
        &self,
        file: &str,
        context: JsonValue,
        overrides: &RenderOverrides,
    ) -> Result<(CompilationRequest, BuildDescriptor)> {
        let request = self.get_compilation_options(overrides, file, context)?;
        let descriptor = self.validate_compilation_options(&request)?;

        let should_compile =
            !self.production_mode() || !self.fs.exists(&descriptor.output_folder);
        if should_compile {
            self.compile(&descriptor).await?;
        } else {
            tracing::debug!(output = %descriptor.output_folder.display(), "reusing production build");
        }
        Ok((request, descriptor))
    }

    /// Runs the build for `descriptor` through the in-flight map.
    pub async fn compile(&self, descriptor: &BuildDescriptor) -> Result<()> {
        let builder = self.builder.clone();
        let owned = descriptor.clone();
        self.inflight
            .run(&descriptor.output_folder, move || {
                async move { builder.build(&owned).await }.boxed()
            })
            .await
    }

    /// Executes the built server bundle with the request context and fills
    /// the HTML shell.
    pub async fn render_file(
        &self,
        descriptor: &BuildDescriptor,
        request: &CompilationRequest,
    ) -> Result<String> {
        let output = &descriptor.output_folder;
        let manifest_path = output.join(MANIFEST_FILE);
        let manifest: HashMap<String, JsonValue> =
            serde_json::from_str(&self.fs.read(&manifest_path)?)?;

        let server_file = SERVER_MANIFEST_KEYS
            .iter()
            .find_map(|key| manifest.get(*key).and_then(JsonValue::as_str))
            .ok_or_else(|| {
                SsrError::Render(format!(
                    "Manifest {} has no server bundle entry",
                    manifest_path.display()
                ))
            })?;
        let app_path = output.join(server_file.trim_start_matches('/'));

        let module = self.modules.load(&self.fs.read(&app_path)?, &app_path)?;
        let app = module.create_app(&request.context).await?;
        let markup = render_to_string(app).await?;

        let shell = self.fs.read(&output.join(HTML_SHELL_FILE))?;
        compose_html(&shell, &request.context, &markup)
    }

    /// Maps an asset request path (`{prefix}/{segment}/{file}`) to the file
    /// in the output folder.
    ///
    /// # Errors
    ///
    /// [`SsrError::NotFound`] for paths outside the prefix or escaping the
    /// output folder; [`SsrError::Decryption`] for forged segments.
    pub fn asset_path(&self, request_path: &str) -> Result<PathBuf> {
        let rest = request_path
            .strip_prefix(self.options.public_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| SsrError::NotFound(format!("{} is not a bundle path", request_path)))?;
        let (segment, file) = rest
            .split_once('/')
            .ok_or_else(|| SsrError::NotFound(format!("{} is not a bundle path", request_path)))?;
        self.bundle_file(segment, file)
    }

    /// Resolves an obfuscated segment and a file name to a bundle path.
    pub fn bundle_file(&self, segment: &str, file: &str) -> Result<PathBuf> {
        let stem = PathBuf::from(self.clarify(segment)?);
        let file = Path::new(file);
        let escapes = |p: &Path| p.components().any(|c| !matches!(c, Component::Normal(_)));
        if escapes(stem.as_path()) || escapes(file) {
            return Err(SsrError::NotFound(format!(
                "Bundle path {} escapes the output folder",
                stem.join(file).display()
            )));
        }
        Ok(self.options.output_folder.join(stem).join(file))
    }
}

/// Replaces the first state marker with the serialized context and the
/// first outlet marker with the markup wrapped in the mount element.
pub fn compose_html(shell: &str, context: &JsonValue, markup: &str) -> Result<String> {
    let state = format!("window.__INITIAL_STATE__ = {}", serialize_state(context)?);
    Ok(shell
        .replacen(STATE_MARKER, &state, 1)
        .replacen(OUTLET_MARKER, &format!("<div id='app'>{}</div>", markup), 1))
}

/// JSON literal safe to embed in an inline `<script>`.
pub fn serialize_state(context: &JsonValue) -> Result<String> {
    Ok(serde_json::to_string(context)?
        .replace('<', "\\u003c")
        .replace('\u{2028}', "\\u2028")
        .replace('\u{2029}', "\\u2029"))
}

fn resolve_project_directory(dir: Option<&Path>) -> Result<PathBuf> {
    match dir {
        Some(dir) => {
            if !dir.exists() {
                return Err(SsrError::Configuration(format!(
                    "Project directory at path {} does not exist.",
                    dir.display()
                )));
            }
            absolutize(dir)
        }
        None => Ok(normalize(&std::env::current_dir()?)),
    }
}

fn resolve_entry_files(
    fs: &dyn FileSystem,
    entries: &EntryFileOptions,
    project: &Path,
    output: &Path,
    fallback: Option<&EntryFiles>,
) -> Result<EntryFiles> {
    let resolve = |configured: Option<&String>, current: Option<&PathBuf>, package: &str| {
        match (configured, current) {
            (Some(file), _) => resolve_file(fs, file, Some(project)),
            (None, Some(current)) => Ok(current.clone()),
            (None, None) => resolve_package_file(fs, package, output),
        }
    };

    Ok(EntryFiles {
        app: resolve(
            entries.app.as_ref(),
            fallback.map(|f| &f.app),
            "build-files/app.js",
        )?,
        client: resolve(
            entries.client.as_ref(),
            fallback.map(|f| &f.client),
            "build-files/entry-client.js",
        )?,
        server: resolve(
            entries.server.as_ref(),
            fallback.map(|f| &f.server),
            "build-files/entry-server.lua",
        )?,
    })
}

fn normalize_prefix(prefix: &str) -> Result<String> {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(SsrError::Configuration(
            "The public prefix must not be empty or '/'.".to_string(),
        ));
    }
    if trimmed.starts_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("/{}", trimmed))
    }
}

fn production_from_env() -> bool {
    std::env::var(PRODUCTION_ENV_VAR)
        .map(|value| value == "production")
        .unwrap_or(false)
}

/// Lexical `target` relative to `base`, with `..` for every base component
/// not shared.
fn relative_path(base: &Path, target: &Path) -> PathBuf {
    let base = normalize(base);
    let target = normalize(target);
    let base_parts: Vec<_> = base.components().collect();
    let target_parts: Vec<_> = target.components().collect();

    let shared = base_parts
        .iter()
        .zip(&target_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in shared..base_parts.len() {
        relative.push("..");
    }
    for part in &target_parts[shared..] {
        relative.push(part.as_os_str());
    }
    relative
}

/// Stem with `/` separators on every platform.
fn url_segment(stem: &Path) -> String {
    stem.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
