// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! axum integration.
//!
//! [`Renderer::inject`] adds the bundle asset route and attaches the
//! renderer to every request; handlers then take the [`Ssr`] extractor:
//!
//! ```rust,ignore
//! async fn index(ssr: Ssr) -> Result<Html<String>, SsrError> {
//!     ssr.render("Index.vue", json!({ "user": "ada" }), &RenderOverrides::default()).await
//! }
//!
//! let app = renderer.inject(Router::new().route("/", get(index)));
//! ```
//!
//! The extension layer only covers routes registered before `inject`.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path},
    http::{header, request::Parts, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use regex::Regex;
use serde_json::Value as JsonValue;

use crate::error::{Result, SsrError};
use crate::options::{CompilationRequest, RenderOverrides};
use crate::renderer::{Delivery, Renderer};

const MISSING_BUNDLE: &str =
    "Couldn't find the bundle file. Is the output folder correct? Is everything compiling?";
const MISSING_SOURCE_MAP: &str =
    "Couldn't find the source map file. Is the output folder correct? Is everything compiling?";
const MISSING_VIEW: &str = "Couldn't find the requested view. Is the views folder correct?";
const RENDER_FAILED: &str = "Failed to render this page. Check the server log for details.";

fn bundle_file_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^bundle-client\.[^/]+\.(js|css)(\.map)?$").ok())
        .as_ref()
}

impl Renderer {
    /// Registers `GET {prefix}/:segment/:file` for client bundles and
    /// attaches this renderer to every route registered so far.
    ///
    /// Source maps are served only if production mode is off at the time
    /// of this call.
    pub fn inject<S>(self: &Arc<Self>, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let renderer = self.clone();
        let serve_source_maps = !self.production_mode();
        let route = format!("{}/:segment/:file", self.public_prefix());

        router
            .route(
                &route,
                get(move |Path((segment, file)): Path<(String, String)>| {
                    let renderer = renderer.clone();
                    async move { serve_bundle(&renderer, &segment, &file, serve_source_maps) }
                }),
            )
            .layer(Extension(self.clone()))
    }
}

fn serve_bundle(renderer: &Renderer, segment: &str, file: &str, serve_source_maps: bool) -> Response {
    let Some(captures) = bundle_file_pattern().and_then(|pattern| pattern.captures(file)) else {
        return not_found(MISSING_BUNDLE);
    };
    let is_map = captures.get(2).is_some();
    if is_map && !serve_source_maps {
        return not_found(MISSING_SOURCE_MAP);
    }
    let missing = if is_map { MISSING_SOURCE_MAP } else { MISSING_BUNDLE };

    let path = match renderer.bundle_file(segment, file) {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!(file, error = %e, "rejected bundle request");
            return not_found(missing);
        }
    };

    let fs = renderer.fs();
    if !fs.exists(&path) {
        tracing::warn!(path = %path.display(), "bundle file not found");
        return not_found(missing);
    }

    let content_type = match (is_map, captures.get(1).map(|m| m.as_str())) {
        (true, _) => "application/json",
        (false, Some("css")) => "text/css",
        _ => "application/javascript",
    };

    match fs.read(&path) {
        Ok(body) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "failed to read bundle file");
            not_found(missing)
        }
    }
}

fn not_found(message: &'static str) -> Response {
    (StatusCode::NOT_FOUND, message).into_response()
}

/// Render capabilities attached to a request by [`Renderer::inject`].
#[derive(Debug, Clone)]
pub struct Ssr {
    renderer: Arc<Renderer>,
}

impl Ssr {
    /// Wraps a renderer directly, without the request extension.
    pub fn new(renderer: Arc<Renderer>) -> Self {
        Self { renderer }
    }

    /// The attached renderer.
    pub fn renderer(&self) -> &Arc<Renderer> {
        &self.renderer
    }

    /// Compiles (when needed) and renders `file` to an HTML response.
    pub async fn render(
        &self,
        file: &str,
        context: JsonValue,
        overrides: &RenderOverrides,
    ) -> Result<Html<String>> {
        let html = self
            .renderer
            .template_engine(file, context, overrides, Delivery::Respond)
            .await?
            .ok_or_else(|| SsrError::Render(format!("Rendering {} produced no HTML", file)))?;
        Ok(Html(html))
    }

    /// The compilation options a render of `file` would use.
    pub fn config(
        &self,
        file: &str,
        context: JsonValue,
        overrides: &RenderOverrides,
    ) -> Result<CompilationRequest> {
        self.renderer.get_compilation_options(overrides, file, context)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Ssr
where
    S: Send + Sync,
{
    type Rejection = SsrError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<Arc<Renderer>>()
            .cloned()
            .map(Ssr::new)
            .ok_or_else(|| {
                SsrError::Configuration(
                    "No renderer is attached to this route. Register it before calling Renderer::inject."
                        .to_string(),
                )
            })
    }
}

impl IntoResponse for SsrError {
    fn into_response(self) -> Response {
        let status = if self.is_not_found() || self.is_decryption() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        // Messages carry absolute paths; they stay in the log.
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            (status, RENDER_FAILED).into_response()
        } else {
            tracing::warn!(error = %self, "request failed");
            not_found(MISSING_VIEW)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundle_pattern_accepts_client_bundles_only() {
        let pattern = bundle_file_pattern().unwrap();
        for ok in [
            "bundle-client.1a2b.js",
            "bundle-client.1a2b.css",
            "bundle-client.1a2b.js.map",
            "bundle-client.1a2b.css.map",
        ] {
            assert!(pattern.is_match(ok), "{}", ok);
        }
        for bad in [
            "bundle-server.1a2b.lua",
            "bundle-client.js",
            "manifest.json",
            "index.html",
            "bundle-client.1a2b.html",
        ] {
            assert!(!pattern.is_match(bad), "{}", bad);
        }
    }

    #[test]
    fn error_statuses() {
        let not_found = SsrError::NotFound("x".into()).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        let forged = SsrError::Decryption("x".into()).into_response();
        assert_eq!(forged.status(), StatusCode::NOT_FOUND);
        let build = SsrError::Build { messages: vec!["x".into()] }.into_response();
        assert_eq!(build.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    async fn body_of(err: SsrError) -> String {
        let body = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn error_bodies_do_not_reveal_paths() {
        let missing = body_of(SsrError::NotFound(
            "File at path /srv/app/views/Secret.vue does not exist.".into(),
        ))
        .await;
        assert_eq!(missing, MISSING_VIEW);

        let broken = body_of(SsrError::Build {
            messages: vec!["Syntax error in /srv/app/views/Broken.vue".into()],
        })
        .await;
        assert_eq!(broken, RENDER_FAILED);
        assert!(!broken.contains("/srv/app"));
    }
}
