// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use m4lkit::{
    config::ToolConfig,
    path::{default_config_path, default_scratch_dir},
    styles::{
        clean_file, document::OutputLayout, CleanupOptions, CleanupReport, InventoryMode,
    },
};

use anyhow::Result;
use clap::Parser;
use std::{path::PathBuf, process::exit};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Remove unused style definitions from Max patcher documents.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "max-styles-cleanup [options] --file-name <path>",
    version
)]
struct Cli {
    /// Patcher document to clean.
    #[arg(short, long, required = true, value_name = "path")]
    pub file_name: PathBuf,

    /// Overwrite document instead of writing to scratch directory.
    #[arg(short, long)]
    pub in_place: bool,

    /// Print every used style definition.
    #[arg(short, long)]
    pub verbose: bool,

    /// Directory to write cleaned document to when not in place.
    #[arg(short = 'o', long, value_name = "dir")]
    pub scratch_dir: Option<PathBuf>,

    /// Take style inventory from parsed document instead of raw text.
    #[arg(long)]
    pub structural: bool,

    /// Write single-line JSON.
    #[arg(long)]
    pub compact: bool,
}

impl Cli {
    fn run(self, config: &ToolConfig) -> Result<()> {
        let scratch_dir = match self.scratch_dir {
            Some(path) => path,
            None => config
                .styles
                .scratch_dir
                .as_ref()
                .map(|path| path.as_path().to_path_buf())
                .unwrap_or_else(default_scratch_dir),
        };
        let options = CleanupOptions {
            in_place: self.in_place,
            scratch_dir,
            inventory: if self.structural {
                InventoryMode::Structural
            } else {
                InventoryMode::Text
            },
            layout: if self.compact {
                OutputLayout::Compact
            } else {
                OutputLayout::Max
            },
        };

        let report = clean_file(&self.file_name, &options)?;
        print_report(&report, self.verbose)?;

        Ok(())
    }
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn run() -> Result<()> {
    let config = ToolConfig::load(default_config_path()?)?;
    Cli::parse().run(&config)
}

fn print_report(report: &CleanupReport, verbose: bool) -> Result<()> {
    let inventory = &report.inventory;
    println!("{}", report.path.display());
    println!(
        "\nUnused styles ({}): {}",
        inventory.unused_names.len(),
        inventory.unused_names.join(", ")
    );
    println!(
        "Used styles ({}): {}",
        inventory.used_names.len(),
        inventory.used_names.join(", ")
    );

    if verbose {
        for definition in &inventory.definitions {
            println!(
                "\n{}:\n{}",
                definition.name,
                serde_json::to_string_pretty(&definition.payload)?
            );
        }
    }

    match (&report.stats, &report.written_to) {
        (Some(stats), Some(path)) => {
            println!(
                "\nReplaced {} styles dictionaries in {} subpatchers.",
                stats.styles_replaced, stats.patchers_visited
            );
            println!("Wrote {}", path.display());
        }
        _ => println!("\nNo unused styles."),
    }

    Ok(())
}
