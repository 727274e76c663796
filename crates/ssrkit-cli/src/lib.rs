// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! ssrkit CLI library.
//!
//! Drives the [`ssrkit`] renderer from a project configuration file.
//!
//! # Usage
//!
//! ```bash
//! ssrkit serve              # Serve pages, compiling on demand
//! ssrkit serve --production # Build each view once
//! ssrkit prerender          # Compile every page up front
//! ssrkit inspect Index.vue  # Show how a view would be compiled
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `ssrkit.toml` at the project root.

/// CLI commands (serve, prerender, inspect).
pub mod commands;
/// Project configuration from `ssrkit.toml`.
pub mod config;
/// Renderer and router assembly from configuration.
pub mod site;
