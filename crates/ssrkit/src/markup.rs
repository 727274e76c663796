// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Converts an application root created by a server bundle into markup.
//!
//! Accepted roots:
//! - a string, which already is the markup
//! - a table with a `render(self)` method
//! - a function taking no arguments
//!
//! `render` may yield (it runs as an async Lua call), so roots that await
//! data inside Lua coroutines are supported.

use mlua::{Function, Value};

use crate::error::{Result, SsrError};

/// Renders an application root to a markup string.
pub async fn render_to_string(app: Value) -> Result<String> {
    match app {
        Value::String(markup) => Ok(markup.to_string_lossy().to_string()),
        Value::Table(root) => {
            let render: Option<Function> = root.get("render")?;
            let Some(render) = render else {
                return Err(SsrError::Render(
                    "Application root has no 'render' method".to_string(),
                ));
            };
            let rendered: Value = render.call_async(root).await?;
            expect_markup(rendered)
        }
        Value::Function(render) => {
            let rendered: Value = render.call_async(()).await?;
            expect_markup(rendered)
        }
        other => Err(SsrError::Render(format!(
            "Cannot render an application root of type {}",
            other.type_name()
        ))),
    }
}

fn expect_markup(value: Value) -> Result<String> {
    match value {
        Value::String(markup) => Ok(markup.to_string_lossy().to_string()),
        Value::Nil => Ok(String::new()),
        other => Err(SsrError::Render(format!(
            "render() must return a string, got {}",
            other.type_name()
        ))),
    }
}
