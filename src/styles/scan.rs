// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Style usage inventory.
//!
//! Figure out which named styles a patcher document defines, which of them
//! are referenced, and which are dead weight.
//!
//! # Text Scanning
//!
//! The default strategy works on the raw file text, the way Max writes it.
//! Usage is collected line by line from `"style" : "<name>"` entries.
//! Definitions are found by pattern: an object that opens a line after a
//! leading `,` or right after an array's `[`, whose first key is `"name"`, and
//! which ends in `"multi" : 0`.
//!
//! Anything lacking the trailing `"multi" : 0` marker is invisible to the
//! text scanner. It is neither counted as used nor as unused, and it will not
//! be part of any rewritten `styles` list.
//!
//! # Structural Scanning
//!
//! The alternative strategy walks the parsed document instead. Every `style`
//! string value counts as usage, and every object with a string `name` inside
//! a `styles` array counts as a definition. No marker is needed.
//!
//! # Duplicate Definitions
//!
//! When a used name is defined more than once, the last definition wins but
//! keeps the position of the first one.

use regex::Regex;
use serde_json::Value;
use std::{collections::HashSet, sync::OnceLock};
use tracing::{debug, instrument};

/// Named style definition.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleDefinition {
    /// Style name.
    pub name: String,

    /// Complete definition object, name included.
    pub payload: Value,
}

impl StyleDefinition {
    /// Parse raw definition text.
    ///
    /// # Errors
    ///
    /// - Return [`ScanError::Definition`] if the text is not valid JSON.
    /// - Return [`ScanError::InvalidDefinition`] if the text is not an object
    ///   with a string `name`.
    pub fn parse(name: &str, raw: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(raw).map_err(|err| ScanError::Definition {
            source: err,
            name: name.to_string(),
        })?;

        Self::try_from(payload)
    }
}

impl TryFrom<Value> for StyleDefinition {
    type Error = ScanError;

    fn try_from(payload: Value) -> Result<Self, Self::Error> {
        let name = payload
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ScanError::InvalidDefinition {
                payload: payload.to_string(),
            })?;

        Ok(Self { name, payload })
    }
}

/// Which styles a document uses, and which it defines without using.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StyleInventory {
    /// Referenced style names, in first-seen order.
    pub used_names: Vec<String>,

    /// Definitions of referenced styles. Serves as replacement pool.
    pub definitions: Vec<StyleDefinition>,

    /// Defined but never referenced style names, in first-seen order.
    pub unused_names: Vec<String>,
}

impl StyleInventory {
    /// Take inventory from raw document text.
    ///
    /// # Errors
    ///
    /// - Return [`ScanError::Definition`] if a used definition block does not
    ///   parse as JSON.
    #[instrument(skip(text), level = "debug")]
    pub fn scan_text(text: &str) -> Result<Self> {
        let used_names = used_style_names(text);
        debug!("found {} style references", used_names.len());

        let mut inventory = Self {
            used_names,
            ..Default::default()
        };
        for (name, raw) in definition_blocks(text) {
            if inventory.is_used(name) {
                inventory.upsert(StyleDefinition::parse(name, raw)?);
            } else {
                inventory.mark_unused(name);
            }
        }

        Ok(inventory)
    }

    /// Take inventory from parsed document tree.
    #[instrument(skip(document), level = "debug")]
    pub fn scan_document(document: &Value) -> Self {
        let mut used_names = Vec::new();
        let mut candidates = Vec::new();
        collect_structural(document, &mut used_names, &mut candidates);
        debug!("found {} style references", used_names.len());

        let mut inventory = Self {
            used_names,
            ..Default::default()
        };
        for definition in candidates {
            if inventory.is_used(&definition.name) {
                inventory.upsert(definition);
            } else {
                inventory.mark_unused(&definition.name);
            }
        }

        inventory
    }

    /// Check if any defined style goes unreferenced.
    pub fn has_unused(&self) -> bool {
        !self.unused_names.is_empty()
    }

    /// Look up a used style's definition by name.
    pub fn definition(&self, name: &str) -> Option<&StyleDefinition> {
        self.definitions.iter().find(|definition| definition.name == name)
    }

    fn is_used(&self, name: &str) -> bool {
        self.used_names.iter().any(|used| used == name)
    }

    fn upsert(&mut self, definition: StyleDefinition) {
        match self
            .definitions
            .iter_mut()
            .find(|known| known.name == definition.name)
        {
            Some(known) => {
                debug!("style {:?} defined more than once, last one wins", known.name);
                *known = definition;
            }
            None => self.definitions.push(definition),
        }
    }

    fn mark_unused(&mut self, name: &str) {
        if !self.unused_names.iter().any(|unused| unused == name) {
            self.unused_names.push(name.to_string());
        }
    }
}

/// Collect distinct style names referenced by `"style"` keys, line by line.
///
/// Empty names do not count.
pub fn used_style_names(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.lines()
        .filter_map(|line| usage_regex().captures(line))
        .filter_map(|captures| captures.get(1))
        .map(|name| name.as_str().to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Find style definition blocks in raw text.
///
/// Yields `(name, raw_object_text)` pairs in document order.
pub fn definition_blocks(text: &str) -> impl Iterator<Item = (&str, &str)> {
    definition_regex().captures_iter(text).filter_map(|captures| {
        let raw = captures.get(1)?.as_str();
        let name = captures.get(2)?.as_str();
        Some((name, raw))
    })
}

fn usage_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*"style"\s*:\s*"([^"]+)""#).expect("valid regex literal")
    })
}

fn definition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?m)(?:^,|\[)\s{3,}(\{\s^\s+"name" : "([^"]+)"[^}]+[^{]+"multi" : 0\s+\})"#,
        )
        .expect("valid regex literal")
    })
}

fn collect_structural(
    value: &Value,
    used: &mut Vec<String>,
    candidates: &mut Vec<StyleDefinition>,
) {
    match value {
        Value::Object(object) => {
            for (key, child) in object {
                match (key.as_str(), child) {
                    ("style", Value::String(name)) => {
                        if !name.is_empty() && !used.contains(name) {
                            used.push(name.clone());
                        }
                    }
                    ("styles", Value::Array(definitions)) => {
                        for definition in definitions {
                            if let Ok(definition) = StyleDefinition::try_from(definition.clone()) {
                                candidates.push(definition);
                            }
                        }
                    }
                    _ => collect_structural(child, used, candidates),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_structural(item, used, candidates);
            }
        }
        _ => {}
    }
}

/// Style inventory error types.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// Definition block is not valid JSON.
    #[error("failed to parse definition of style {name:?}")]
    Definition {
        #[source]
        source: serde_json::Error,
        name: String,
    },

    /// Definition is not an object with a name.
    #[error("style definition lacks a name: {payload}")]
    InvalidDefinition { payload: String },
}

/// Friendly result alias :3
pub type Result<T, E = ScanError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    // Layout as written by Max itself.
    const MAX_DOCUMENT: &str = indoc! {r#"
        {
        	"patcher" : 	{
        		"fileversion" : 1,
        		"boxes" : [ 			{
        				"box" : 				{
        					"id" : "obj-1",
        					"maxclass" : "comment",
        					"style" : "sand",
        					"text" : "hello"
        				}

        			}
        , 			{
        				"box" : 				{
        					"id" : "obj-2",
        					"style" : "steel"
        				}

        			}
         ],
        		"styles" : [ 			{
        				"name" : "camo",
        				"default" : 				{
        					"bgcolor" : [ 0.1, 0.2, 0.3, 1.0 ]
        				}
        ,
        				"parentstyle" : "",
        				"multi" : 0
        			}
        , 			{
        				"name" : "sand",
        				"default" : 				{
        					"fontsize" : [ 10.0 ]
        				}
        ,
        				"parentstyle" : "",
        				"multi" : 0
        			}
        , 			{
        				"name" : "steel",
        				"parentstyle" : "",
        				"multi" : 1
        			}
         ]
        	}

        }
    "#};

    #[test]
    fn used_style_names_in_first_seen_order() {
        let text = indoc! {r#"
            "style" : "b",
            "style" : "a",
            "style" : "b",
            "style" : "",
            "parentstyle" : "c",
            "style" : "d"
        "#};

        assert_eq!(used_style_names(text), vec!["b", "a", "d"]);
    }

    #[test]
    fn definition_blocks_need_multi_marker() {
        let result = definition_blocks(MAX_DOCUMENT)
            .map(|(name, _)| name)
            .collect::<Vec<_>>();

        // "steel" ends in `"multi" : 1`, so the scanner never sees it.
        assert_eq!(result, vec!["camo", "sand"]);
    }

    #[test]
    fn definition_block_text_parses() -> anyhow::Result<()> {
        let (name, raw) = definition_blocks(MAX_DOCUMENT)
            .nth(1)
            .ok_or_else(|| anyhow::anyhow!("missing definition"))?;
        let definition = StyleDefinition::parse(name, raw)?;

        assert_eq!(
            definition.payload,
            json!({
                "name": "sand",
                "default": { "fontsize": [10.0] },
                "parentstyle": "",
                "multi": 0
            })
        );

        Ok(())
    }

    #[test]
    fn scan_text_partitions_styles() -> anyhow::Result<()> {
        let inventory = StyleInventory::scan_text(MAX_DOCUMENT)?;

        assert_eq!(inventory.used_names, vec!["sand", "steel"]);
        assert_eq!(inventory.unused_names, vec!["camo"]);
        assert_eq!(
            inventory
                .definitions
                .iter()
                .map(|definition| definition.name.as_str())
                .collect::<Vec<_>>(),
            vec!["sand"]
        );
        assert!(inventory.has_unused());

        Ok(())
    }

    #[test]
    fn scan_document_sees_every_definition() -> anyhow::Result<()> {
        let document: Value = serde_json::from_str(MAX_DOCUMENT)?;
        let inventory = StyleInventory::scan_document(&document);

        assert_eq!(inventory.used_names, vec!["sand", "steel"]);
        assert_eq!(inventory.unused_names, vec!["camo"]);
        assert!(inventory.definition("sand").is_some());
        assert!(inventory.definition("steel").is_some());

        Ok(())
    }

    #[test]
    fn last_definition_wins_in_first_position() {
        let document = json!({
            "patcher": {
                "boxes": [
                    { "box": { "style": "a" } },
                    { "box": { "style": "b" } }
                ],
                "styles": [
                    { "name": "a", "version": 1 },
                    { "name": "b", "version": 1 },
                    { "name": "a", "version": 2 }
                ]
            }
        });
        let inventory = StyleInventory::scan_document(&document);

        assert_eq!(
            inventory.definitions,
            vec![
                StyleDefinition {
                    name: "a".into(),
                    payload: json!({ "name": "a", "version": 2 }),
                },
                StyleDefinition {
                    name: "b".into(),
                    payload: json!({ "name": "b", "version": 1 }),
                },
            ]
        );
        assert!(!inventory.has_unused());
    }

    #[test]
    fn nameless_definition_is_rejected() {
        let result = StyleDefinition::try_from(json!({ "multi": 0 }));
        assert!(matches!(result, Err(ScanError::InvalidDefinition { .. })));
    }
}
