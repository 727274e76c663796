// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `serve`: Serve configured pages
//! - `prerender`: Compile every configured page
//! - `inspect`: Print the compilation options of one view

/// View inspection command.
pub mod inspect;
/// Prerender command.
pub mod prerender;
/// Server command.
pub mod serve;
