// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the SSR pipeline.
//!
//! This module defines [`SsrError`], the single error enum returned by every
//! fallible operation in the crate.
//!
//! # Error Categories
//!
//! - **Configuration errors**: missing or blank options, absent input files
//! - **Not-found errors**: a resolved path does not exist and cannot be created
//! - **Build errors**: aggregated bundler diagnostics or a hard bundler failure
//! - **Decryption errors**: an obfuscated path segment does not decrypt
//! - **Render/Lua errors**: the server bundle failed to load or render
//!
//! Nothing in the pipeline retries. Errors propagate to whoever started the
//! render; the HTTP layer turns them into responses (see [`crate::server`]).

use std::sync::Arc;

use thiserror::Error;

/// The main error type for ssrkit operations.
#[derive(Error, Debug)]
pub enum SsrError {
    /// A required option is missing, blank or inconsistent.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A path was resolved but does not exist and may not be created.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The bundler reported one or more diagnostics, or failed outright.
    #[error("Bundler failed to compile:\n{}", format_messages(.messages))]
    Build {
        /// One entry per compiler diagnostic (or the hard failure message).
        messages: Vec<String>,
    },

    /// An obfuscated path segment could not be decrypted with this key.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// The server bundle did not produce a renderable application.
    #[error("Render error: {0}")]
    Render(String),

    /// Lua runtime error raised while loading or running a server bundle.
    #[error("Lua execution error: {0}")]
    Lua(#[from] mlua::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error, e.g. a malformed manifest.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Cache bookkeeping failed (poisoned lock).
    #[error("Cache error: {0}")]
    Cache(String),

    /// Error produced by a build another caller was already running.
    #[error(transparent)]
    Shared(Arc<SsrError>),
}

impl SsrError {
    /// Returns the innermost error, looking through [`SsrError::Shared`].
    pub fn root(&self) -> &SsrError {
        match self {
            SsrError::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// True for [`SsrError::Configuration`], including shared ones.
    pub fn is_configuration(&self) -> bool {
        matches!(self.root(), SsrError::Configuration(_))
    }

    /// True for [`SsrError::NotFound`], including shared ones.
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), SsrError::NotFound(_))
    }

    /// True for [`SsrError::Build`], including shared ones.
    pub fn is_build(&self) -> bool {
        matches!(self.root(), SsrError::Build { .. })
    }

    /// True for [`SsrError::Decryption`], including shared ones.
    pub fn is_decryption(&self) -> bool {
        matches!(self.root(), SsrError::Decryption(_))
    }
}

fn format_messages(messages: &[String]) -> String {
    messages
        .iter()
        .map(|m| format!("  - {}", m))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Convenience type alias for Results with [`SsrError`].
pub type Result<T> = std::result::Result<T, SsrError>;
