// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Rule-driven deep merge for build graphs.
//!
//! A [`MergeRules`] table maps dotted field paths (relative to the object
//! being merged) to a [`MergeRule`]. Fields without a rule fall back to the
//! default policy: objects merge recursively, arrays are concatenated and
//! scalars are replaced by the override.
//!
//! ```rust,ignore
//! let rules = MergeRules::new()
//!     .rule("externals", MergeRule::Replace)
//!     .rule("plugins", MergeRule::match_by("plugin"));
//! let merged = rules.merge(&baseline, &user_override);
//! ```

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// How one field of two graphs is combined.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeRule {
    /// Concatenate arrays (base first).
    Append,
    /// Merge array items whose `key` field is equal, append the others.
    /// Matched items are merged with the nested rules. String items match
    /// when the strings are equal.
    MatchBy {
        /// Selector field.
        key: String,
        /// Rules applied inside matched items.
        nested: MergeRules,
    },
    /// Union map keys recursively and array values without duplicates.
    Union,
    /// The override replaces the base value wholesale.
    Replace,
}

impl MergeRule {
    /// Shorthand for [`MergeRule::MatchBy`] without nested rules.
    pub fn match_by(key: &str) -> Self {
        MergeRule::MatchBy {
            key: key.to_string(),
            nested: MergeRules::new(),
        }
    }

    /// Shorthand for [`MergeRule::MatchBy`] with nested rules.
    pub fn match_by_with(key: &str, nested: MergeRules) -> Self {
        MergeRule::MatchBy {
            key: key.to_string(),
            nested,
        }
    }
}

/// Declarative per-field merge policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeRules {
    rules: BTreeMap<String, MergeRule>,
}

impl MergeRules {
    /// Creates an empty rule table (default policy everywhere).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule for a dotted field path such as `module.rules`.
    pub fn rule(mut self, path: &str, rule: MergeRule) -> Self {
        self.rules.insert(path.to_string(), rule);
        self
    }

    /// Returns the rule registered for `path`, if any.
    pub fn get(&self, path: &str) -> Option<&MergeRule> {
        self.rules.get(path)
    }

    /// Merges `overlay` over `base`. Neither input is modified.
    pub fn merge(&self, base: &Value, overlay: &Value) -> Value {
        if overlay.is_null() {
            return base.clone();
        }
        self.merge_at("", base, overlay)
    }

    fn merge_at(&self, prefix: &str, base: &Value, overlay: &Value) -> Value {
        match (base, overlay) {
            (Value::Object(base_map), Value::Object(overlay_map)) => {
                let mut merged = base_map.clone();
                for (key, value) in overlay_map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    let combined = match base_map.get(key) {
                        Some(existing) => self.merge_field(&path, existing, value),
                        None => value.clone(),
                    };
                    merged.insert(key.clone(), combined);
                }
                Value::Object(merged)
            }
            _ => overlay.clone(),
        }
    }

    fn merge_field(&self, path: &str, base: &Value, overlay: &Value) -> Value {
        match self.rules.get(path) {
            Some(MergeRule::Replace) => overlay.clone(),
            Some(MergeRule::Append) => append(base, overlay),
            Some(MergeRule::Union) => union(base, overlay),
            Some(MergeRule::MatchBy { key, nested }) => match_by(key, nested, base, overlay),
            None => match (base, overlay) {
                (Value::Object(_), Value::Object(_)) => self.merge_at(path, base, overlay),
                (Value::Array(_), Value::Array(_)) => append(base, overlay),
                _ => overlay.clone(),
            },
        }
    }
}

fn append(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Array(a), Value::Array(b)) => Value::Array(a.iter().chain(b).cloned().collect()),
        _ => overlay.clone(),
    }
}

fn union(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(a), Value::Object(b)) => {
            let mut merged: Map<String, Value> = a.clone();
            for (key, value) in b {
                let combined = match a.get(key) {
                    Some(existing) => union(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), combined);
            }
            Value::Object(merged)
        }
        (Value::Array(a), Value::Array(b)) => {
            let mut merged = a.clone();
            for item in b {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            Value::Array(merged)
        }
        _ => overlay.clone(),
    }
}

fn selector<'a>(item: &'a Value, key: &str) -> Option<&'a Value> {
    match item {
        Value::Object(map) => map.get(key),
        Value::String(_) => Some(item),
        _ => None,
    }
}

fn match_by(key: &str, nested: &MergeRules, base: &Value, overlay: &Value) -> Value {
    let (Value::Array(base_items), Value::Array(overlay_items)) = (base, overlay) else {
        return overlay.clone();
    };

    let mut merged = base_items.clone();
    let mut appended = Vec::new();
    for item in overlay_items {
        let target = selector(item, key).and_then(|wanted| {
            merged
                .iter()
                .position(|existing| selector(existing, key) == Some(wanted))
        });
        match target {
            Some(index) => merged[index] = nested.merge(&merged[index], item),
            None => appended.push(item.clone()),
        }
    }
    merged.extend(appended);
    Value::Array(merged)
}
