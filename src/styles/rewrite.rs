// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Scoped `styles` list replacement.
//!
//! A patcher holds boxes, and a box may hold a whole subpatcher. Each patcher
//! that owns a `styles` list gets that list replaced by the definitions its
//! own level actually references: the patcher's own `style`, plus the `style`
//! of each of its direct boxes. Subpatchers are handled independently, so a
//! style used three levels down never leaks into the root's list.

use crate::styles::scan::StyleDefinition;

use serde_json::{Map, Value};
use std::{
    collections::HashSet,
    ops::{Add, AddAssign},
};
use tracing::{debug, instrument};

/// Deepest patcher nesting followed before giving up.
pub const MAX_DEPTH: usize = 512;

/// Tally of one rewrite pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RewriteStats {
    /// Number of `styles` lists replaced.
    pub styles_replaced: usize,

    /// Number of nested patchers descended into.
    pub patchers_visited: usize,
}

impl Add for RewriteStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            styles_replaced: self.styles_replaced + rhs.styles_replaced,
            patchers_visited: self.patchers_visited + rhs.patchers_visited,
        }
    }
}

impl AddAssign for RewriteStats {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Replace every `styles` list in document with definitions used at its level.
///
/// Definitions come from `pool`, in pool order. Names that are used but have
/// no definition in the pool are skipped.
///
/// # Errors
///
/// - Return [`RewriteError::TooDeep`] if patchers nest deeper than
///   [`MAX_DEPTH`].
#[instrument(skip(document, pool), level = "debug")]
pub fn rewrite_styles(document: &mut Value, pool: &[StyleDefinition]) -> Result<RewriteStats> {
    let stats = rewrite_node(document, pool, 0)?;
    debug!(
        "replaced {} styles lists across {} subpatchers",
        stats.styles_replaced, stats.patchers_visited
    );

    Ok(stats)
}

fn rewrite_node(node: &mut Value, pool: &[StyleDefinition], depth: usize) -> Result<RewriteStats> {
    if depth > MAX_DEPTH {
        return Err(RewriteError::TooDeep { limit: MAX_DEPTH });
    }

    let Some(node) = node.as_object_mut() else {
        return Ok(RewriteStats::default());
    };

    let mut stats = RewriteStats::default();
    let mut used = HashSet::new();

    if let Some(Value::Array(boxes)) = node.get_mut("boxes") {
        for entry in boxes.iter_mut() {
            let Some(inner) = entry.get_mut("box").and_then(Value::as_object_mut) else {
                continue;
            };

            if let Some(name) = style_name(inner) {
                used.insert(name);
            }

            if let Some(patcher) = inner.get_mut("patcher") {
                stats.patchers_visited += 1;
                stats += rewrite_node(patcher, pool, depth + 1)?;
            }
        }
    }

    if node.contains_key("styles") {
        if let Some(name) = style_name(node) {
            used.insert(name);
        }

        // INVARIANT: Replacement keeps the key in its original position.
        let replacement = pool
            .iter()
            .filter(|definition| used.contains(&definition.name))
            .map(|definition| definition.payload.clone())
            .collect::<Vec<_>>();
        node.insert("styles".into(), Value::Array(replacement));
        stats.styles_replaced += 1;
    }

    if let Some(patcher) = node.get_mut("patcher") {
        stats.patchers_visited += 1;
        stats += rewrite_node(patcher, pool, depth + 1)?;
    }

    Ok(stats)
}

fn style_name(object: &Map<String, Value>) -> Option<String> {
    object
        .get("style")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
}

/// Style rewriting error types.
#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    /// Patchers nest deeper than the walk allows.
    #[error("patcher nesting exceeds {limit} levels")]
    TooDeep { limit: usize },
}

/// Friendly result alias :3
pub type Result<T, E = RewriteError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn definition(name: &str) -> StyleDefinition {
        StyleDefinition {
            name: name.into(),
            payload: json!({ "name": name, "multi": 0 }),
        }
    }

    #[test]
    fn replacement_is_scoped_per_patcher() -> anyhow::Result<()> {
        let mut document = json!({
            "patcher": {
                "boxes": [
                    { "box": { "id": "obj-1", "style": "A" } },
                    {
                        "box": {
                            "id": "obj-2",
                            "patcher": {
                                "boxes": [{ "box": { "id": "obj-3", "style": "B" } }],
                                "styles": [{ "name": "B", "multi": 0 }]
                            }
                        }
                    }
                ],
                "styles": [
                    { "name": "A", "multi": 0 },
                    { "name": "B", "multi": 0 }
                ]
            }
        });

        let stats = rewrite_styles(&mut document, &[definition("A"), definition("B")])?;

        assert_eq!(
            document["patcher"]["styles"],
            json!([{ "name": "A", "multi": 0 }])
        );
        assert_eq!(
            document["patcher"]["boxes"][1]["box"]["patcher"]["styles"],
            json!([{ "name": "B", "multi": 0 }])
        );
        assert_eq!(
            stats,
            RewriteStats {
                styles_replaced: 2,
                patchers_visited: 2,
            }
        );

        Ok(())
    }

    #[test]
    fn own_style_counts_as_usage() -> anyhow::Result<()> {
        let mut document = json!({
            "style": "A",
            "boxes": [],
            "styles": [{ "name": "A", "multi": 0 }, { "name": "B", "multi": 0 }]
        });

        rewrite_styles(&mut document, &[definition("A"), definition("B")])?;
        assert_eq!(document["styles"], json!([{ "name": "A", "multi": 0 }]));

        Ok(())
    }

    #[test]
    fn deeper_usage_does_not_leak_upward() -> anyhow::Result<()> {
        let mut document = json!({
            "patcher": {
                "boxes": [{
                    "box": {
                        "patcher": {
                            "boxes": [{ "box": { "style": "A" } }]
                        }
                    }
                }],
                "styles": [{ "name": "A", "multi": 0 }]
            }
        });

        rewrite_styles(&mut document, &[definition("A")])?;
        assert_eq!(document["patcher"]["styles"], json!([]));

        Ok(())
    }

    #[test]
    fn other_keys_survive() -> anyhow::Result<()> {
        let mut document = json!({
            "patcher": {
                "fileversion": 1,
                "rect": [34.0, 94.0, 640.0, 480.0],
                "styles": [{ "name": "A", "multi": 0 }],
                "dependency_cache": []
            }
        });

        rewrite_styles(&mut document, &[])?;
        assert_eq!(
            document,
            json!({
                "patcher": {
                    "fileversion": 1,
                    "rect": [34.0, 94.0, 640.0, 480.0],
                    "styles": [],
                    "dependency_cache": []
                }
            })
        );
        let keys = document["patcher"]
            .as_object()
            .map(|object| object.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        assert_eq!(keys, vec!["fileversion", "rect", "styles", "dependency_cache"]);

        Ok(())
    }

    #[test]
    fn malformed_boxes_are_skipped() -> anyhow::Result<()> {
        let mut document = json!({
            "boxes": [1, { "nope": {} }, { "box": "text" }, { "box": { "style": "A" } }],
            "styles": []
        });

        let stats = rewrite_styles(&mut document, &[definition("A")])?;
        assert_eq!(document["styles"], json!([{ "name": "A", "multi": 0 }]));
        assert_eq!(stats.styles_replaced, 1);

        Ok(())
    }

    #[test]
    fn nesting_limit_is_enforced() {
        let mut document = json!({});
        for _ in 0..=MAX_DEPTH + 1 {
            document = json!({ "patcher": document });
        }

        let result = rewrite_styles(&mut document, &[]);
        assert!(matches!(result, Err(RewriteError::TooDeep { limit: MAX_DEPTH })));
    }
}
