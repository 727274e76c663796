// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # ssrkit
//!
//! Server-side rendering integration layer for axum.
//!
//! ssrkit compiles a component file and its dependency graph into a client
//! bundle and a server bundle with an external bundler, executes the server
//! bundle in an embedded Lua runtime to produce markup, and serves the
//! composed HTML.
//!
//! ## Features
//!
//! - On-demand builds (always in development, once per view in production)
//! - One concurrent build per output folder
//! - Obfuscated, authenticated bundle URLs
//! - Rule-driven merging of user build graph overrides
//! - Prerendering of every view a router renders
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ssrkit::{CommandBundler, RenderSite, Renderer, RendererOptions, SsrRouter};
//!
//! let bundler = Arc::new(CommandBundler::new("node").with_args(["bundle.mjs"]));
//! let renderer = Renderer::new(Some(RendererOptions::new(".")), bundler)?;
//!
//! let app = SsrRouter::new(renderer)
//!     .page("/", RenderSite::view("Index.vue"))
//!     .into_router();
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, app).await?;
//! ```

/// Build graph construction.
pub mod bundle_config;
/// External bundler seam.
pub mod bundler;
/// Build orchestration.
pub mod builder;
/// Error types.
pub mod error;
/// Filesystem capability.
pub mod fs;
/// Build de-duplication.
pub mod inflight;
/// Application root to markup.
pub mod markup;
/// Declarative deep merge.
pub mod merge;
/// Server bundle loading and caching.
pub mod module_cache;
/// URL segment obfuscation.
pub mod obfuscate;
/// Renderer options and per-render data.
pub mod options;
/// Path resolution.
pub mod paths;
/// The render orchestrator.
pub mod renderer;
/// Route registration and prerendering.
pub mod routes;
/// axum integration.
pub mod server;

pub use bundle_config::{graph_merge_rules, BundleConfigBuilder};
pub use bundler::{Bundler, CommandBundler, CompilationStats, Diagnostic, MultiStats};
pub use builder::BuildOrchestrator;
pub use error::{Result, SsrError};
pub use fs::{FileSystem, MemoryFileSystem, RealFileSystem, SharedFs};
pub use merge::{MergeRule, MergeRules};
pub use module_cache::{ModuleCache, ServerModule};
pub use obfuscate::PathObfuscator;
pub use options::*;
pub use renderer::{Delivery, Renderer};
pub use routes::{RenderSite, RouteNode, RouteTable, SsrRouter, ViewFile};
pub use server::Ssr;

// Re-export mlua value
pub use mlua::Value;
