// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Loading and caching of compiled server bundles.
//!
//! The bundler's server target emits a Lua chunk. [`ModuleCache::load`]
//! executes that chunk once per absolute path and memoizes the resulting
//! [`ServerModule`], so module-level initialization of an unchanged bundle
//! never runs twice.
//!
//! # Isolation
//!
//! Every module gets its own Lua state. `require` inside the bundle resolves
//! relative specifiers (`./chunk`, `../shared/util`) against the directory
//! of the bundle file, and bare names through a `package.path` rooted at
//! the same directory.
//!
//! # Invalidation
//!
//! Entries live as long as the cache. Call [`ModuleCache::invalidate`] or
//! [`ModuleCache::clear`] to force a reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use mlua::{Function, Lua, LuaSerdeExt, Table, Value};
use serde_json::Value as JsonValue;

use crate::error::{Result, SsrError};

/// A server bundle that has been executed and is ready to create apps.
pub struct ServerModule {
    lua: Lua,
    exports: Table,
    path: PathBuf,
}

impl std::fmt::Debug for ServerModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerModule").field("path", &self.path).finish()
    }
}

impl ServerModule {
    /// Executes `source` as the module at `path`.
    fn compile(source: &str, path: &Path) -> Result<Self> {
        let lua = Lua::new();
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        install_module_paths(&lua, &dir)?;

        let globals = lua.globals();
        globals.set("__filename", path.to_string_lossy().to_string())?;
        globals.set("__dirname", dir.to_string_lossy().to_string())?;

        let returned: Value = lua
            .load(source)
            .set_name(format!("@{}", path.display()))
            .eval()?;

        let exports = match returned {
            Value::Table(table) => table,
            Value::Function(default) => {
                let table = lua.create_table()?;
                table.set("default", default)?;
                table
            }
            other => {
                return Err(SsrError::Render(format!(
                    "Server bundle {} must return a module table, got {}",
                    path.display(),
                    other.type_name()
                )))
            }
        };

        Ok(Self {
            lua,
            exports,
            path: path.to_path_buf(),
        })
    }

    /// Path this module was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Calls the module's default export with `context` and returns the
    /// application root it creates.
    pub async fn create_app(&self, context: &JsonValue) -> Result<Value> {
        let default: Option<Function> = self.exports.get("default")?;
        let Some(default) = default else {
            return Err(SsrError::Render(format!(
                "Server bundle {} has no 'default' export",
                self.path.display()
            )));
        };

        let context = self.lua.to_value(context)?;
        let app: Value = default.call_async(context).await?;
        Ok(app)
    }

    /// Reads a named export, mainly for diagnostics and tests.
    pub fn export<T: mlua::FromLua>(&self, name: &str) -> Result<T> {
        Ok(self.exports.get(name)?)
    }
}

/// Points `package.path` at the module directory and installs a searcher
/// for relative specifiers.
fn install_module_paths(lua: &Lua, dir: &Path) -> Result<()> {
    let package: Table = lua.globals().get("package")?;
    let existing: String = package.get("path")?;
    let dir_str = dir.to_string_lossy();
    package.set(
        "path",
        format!("{0}/?.lua;{0}/?/init.lua;{1}", dir_str, existing),
    )?;

    let base = dir.to_path_buf();
    let relative_searcher = lua.create_function(move |lua, name: String| {
        if !(name.starts_with("./") || name.starts_with("../")) {
            let message = lua.create_string(format!("\n\tnot a relative module '{}'", name))?;
            return Ok((Value::Nil, Value::String(message)));
        }

        let mut candidate = crate::fs::normalize(&base.join(&name));
        if candidate.extension().is_none() {
            candidate.set_extension("lua");
        }

        match std::fs::read_to_string(&candidate) {
            Ok(source) => {
                let loader = lua
                    .load(source)
                    .set_name(format!("@{}", candidate.display()))
                    .into_function()?;
                let origin = lua.create_string(candidate.to_string_lossy().as_bytes())?;
                Ok((Value::Function(loader), Value::String(origin)))
            }
            Err(_) => {
                let message = lua.create_string(format!(
                    "\n\tno file '{}'",
                    candidate.display()
                ))?;
                Ok((Value::Nil, Value::String(message)))
            }
        }
    })?;

    let searchers: Table = package.get("searchers")?;
    let len = searchers.raw_len();
    searchers.raw_set(len + 1, relative_searcher)?;
    Ok(())
}

/// Path-keyed cache of executed server bundles.
///
/// Loading happens while the cache lock is held, so two concurrent loads of
/// the same path execute the module text once.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: Mutex<HashMap<PathBuf, Arc<ServerModule>>>,
}

impl ModuleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<ServerModule>>>> {
        self.modules
            .lock()
            .map_err(|_| SsrError::Cache("Failed to acquire module cache lock".to_string()))
    }

    /// Returns the module for `path`, executing `source` only if the path
    /// has not been loaded yet.
    pub fn load(&self, source: &str, path: &Path) -> Result<Arc<ServerModule>> {
        let mut modules = self.lock()?;
        if let Some(module) = modules.get(path) {
            tracing::debug!(path = %path.display(), "server module cache hit");
            return Ok(module.clone());
        }

        tracing::debug!(path = %path.display(), "loading server module");
        let module = Arc::new(ServerModule::compile(source, path)?);
        modules.insert(path.to_path_buf(), module.clone());
        Ok(module)
    }

    /// Returns a cached module without loading.
    pub fn get(&self, path: &Path) -> Result<Option<Arc<ServerModule>>> {
        Ok(self.lock()?.get(path).cloned())
    }

    /// Checks whether `path` has been loaded.
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().map(|m| m.contains_key(path)).unwrap_or(false)
    }

    /// Drops the entry for `path` so the next load re-executes it.
    pub fn invalidate(&self, path: &Path) -> Result<bool> {
        Ok(self.lock()?.remove(path).is_some())
    }

    /// Drops every entry.
    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }

    /// Number of loaded modules.
    pub fn len(&self) -> usize {
        self.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// True when nothing has been loaded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const COUNTER_MODULE: &str = r#"
        loads = (loads or 0) + 1
        return {
            loads = loads,
            default = function(ctx) return "hello " .. ctx.name end,
        }
    "#;

    #[tokio::test]
    async fn loads_once_per_path() {
        let cache = ModuleCache::new();
        let path = Path::new("/virtual/bundle-server.abc.lua");

        let first = cache.load(COUNTER_MODULE, path).unwrap();
        let second = cache.load("error('must not run')", path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        let app = first.create_app(&json!({ "name": "world" })).await.unwrap();
        match app {
            Value::String(s) => assert_eq!(s.to_string_lossy(), "hello world"),
            other => panic!("unexpected app value: {:?}", other),
        }
    }

    #[test]
    fn invalidate_forces_a_reload() {
        let cache = ModuleCache::new();
        let path = Path::new("/virtual/bundle-server.abc.lua");

        cache.load("return { version = 1 }", path).unwrap();
        assert!(cache.invalidate(path).unwrap());
        assert!(!cache.contains(path));

        let reloaded = cache.load("return { version = 2 }", path).unwrap();
        assert_eq!(reloaded.export::<i64>("version").unwrap(), 2);

        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn function_chunks_become_the_default_export() {
        let cache = ModuleCache::new();
        let module = cache
            .load("return function(ctx) return 'ok' end", Path::new("/virtual/fn.lua"))
            .unwrap();
        let default: Option<Function> = module.export("default").unwrap();
        assert!(default.is_some());
    }

    #[test]
    fn non_module_chunks_are_rejected() {
        let cache = ModuleCache::new();
        let err = cache.load("return 42", Path::new("/virtual/bad.lua")).unwrap_err();
        assert!(matches!(err, SsrError::Render(_)));
        assert!(!cache.contains(Path::new("/virtual/bad.lua")));
    }

    #[tokio::test]
    async fn relative_requires_resolve_against_the_bundle_directory() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("dist/views/Index");
        std::fs::create_dir_all(out.join("chunks")).unwrap();
        std::fs::create_dir_all(temp.path().join("dist/shared")).unwrap();
        std::fs::write(
            out.join("chunks/greeting.lua"),
            "return { greet = function(n) return 'Hi ' .. n end }",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("dist/shared/punct.lua"),
            "return { bang = '!' }",
        )
        .unwrap();

        let bundle_path = out.join("bundle-server.123.lua");
        let source = r#"
            local greeting = require("./chunks/greeting")
            local punct = require("../../shared/punct")
            return { default = function(ctx) return greeting.greet(ctx.name) .. punct.bang end }
        "#;

        let cache = ModuleCache::new();
        let module = cache.load(source, &bundle_path).unwrap();
        let app = module.create_app(&json!({ "name": "Ada" })).await.unwrap();
        match app {
            Value::String(s) => assert_eq!(s.to_string_lossy(), "Hi Ada!"),
            other => panic!("unexpected app value: {:?}", other),
        }
    }
}
