// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Unused style cleanup for Max patcher documents.
//!
//! A patcher document carries `styles` lists of named style definitions. Over
//! time those lists collect definitions that nothing references anymore. The
//! cleanup pipeline takes an inventory of used and unused styles, then rewrites
//! every `styles` list so it holds only the definitions referenced at its own
//! nesting level.
//!
//! # Pipeline
//!
//! 1. Load document with [`Document::load`].
//! 2. Take inventory with [`StyleInventory::scan_text`] or
//!    [`StyleInventory::scan_document`].
//! 3. Rewrite `styles` lists with [`rewrite_styles`].
//! 4. Write document in place, or into a scratch directory.
//!
//! If the inventory turns up no unused styles, the pipeline stops after step
//! two and nothing gets written.

pub mod document;
pub mod rewrite;
pub mod scan;

use document::{scratch_path, Document, DocumentError, OutputLayout};
use rewrite::{rewrite_styles, RewriteError, RewriteStats};
use scan::{ScanError, StyleInventory};

use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// How style inventory is taken.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum InventoryMode {
    /// Scan raw document text for usages and marked definitions.
    #[default]
    Text,

    /// Walk parsed document tree.
    Structural,
}

/// Settings for one cleanup run.
#[derive(Debug, Clone)]
pub struct CleanupOptions {
    /// Overwrite original document instead of writing to scratch directory.
    pub in_place: bool,

    /// Where output goes when not cleaning in place.
    pub scratch_dir: PathBuf,

    /// Inventory strategy.
    pub inventory: InventoryMode,

    /// Output layout.
    pub layout: OutputLayout,
}

/// Outcome of one cleanup run.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanupReport {
    /// Document that was inspected.
    pub path: PathBuf,

    /// Style inventory of the original document.
    pub inventory: StyleInventory,

    /// Rewrite tally, absent if nothing needed rewriting.
    pub stats: Option<RewriteStats>,

    /// Where the rewritten document went, absent if nothing was written.
    pub written_to: Option<PathBuf>,
}

/// Remove unused styles from patcher document at target path.
///
/// # Errors
///
/// - Return [`StyleError::Document`] if the document cannot be loaded or
///   written.
/// - Return [`StyleError::Scan`] if a used definition cannot be parsed.
/// - Return [`StyleError::Rewrite`] if patchers nest too deep.
#[instrument(skip(path, options), level = "debug")]
pub fn clean_file(path: impl AsRef<Path>, options: &CleanupOptions) -> Result<CleanupReport> {
    let mut document = Document::load(path)?;
    let inventory = match options.inventory {
        InventoryMode::Text => StyleInventory::scan_text(&document.text)?,
        InventoryMode::Structural => StyleInventory::scan_document(&document.root),
    };

    if !inventory.has_unused() {
        info!("no unused styles in {:?}", document.path.display());
        return Ok(CleanupReport {
            path: document.path,
            inventory,
            stats: None,
            written_to: None,
        });
    }

    let stats = rewrite_styles(&mut document.root, &inventory.definitions)?;
    let target = if options.in_place {
        document.path.clone()
    } else {
        scratch_path(&options.scratch_dir, &document.path)?
    };

    info!("write cleaned document to {:?}", target.display());
    document.write_to(&target, options.layout)?;

    Ok(CleanupReport {
        path: document.path,
        inventory,
        stats: Some(stats),
        written_to: Some(target),
    })
}

/// Style cleanup error types.
#[derive(Debug, thiserror::Error)]
pub enum StyleError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),
}

/// Friendly result alias :3
pub type Result<T, E = StyleError> = std::result::Result<T, E>;
