// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use m4lkit::{
    config::{DeploySettings, ToolConfig},
    deploy::{
        history::{render_table, HistoryLog},
        locate::Locator,
        require_directories,
        tags::TagCleaner,
        DeployLayout, DeployOutcome, DeployRequest, DeployTarget, Deployer, InquirePrompt,
    },
    path::default_config_path,
};

use anyhow::{anyhow, Result};
use clap::{ArgGroup, Parser};
use std::{path::PathBuf, process::exit};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Deploy versioned Max for Live device builds.
#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  deploy-amxd [options] --name <trunk> (--latest | --file-name <file>)\n  deploy-amxd [options] --history",
    version
)]
#[command(group(ArgGroup::new("action").required(true)))]
#[command(group(ArgGroup::new("source")))]
struct Cli {
    /// Trunk name of device to deploy, i.e., file name without version.
    #[arg(short, long, group = "action", requires = "source", value_name = "trunk")]
    pub name: Option<String>,

    /// Deploy most recently modified build matching trunk name.
    #[arg(short, long, group = "source", requires = "name")]
    pub latest: bool,

    /// Deploy this build file from the source directory.
    #[arg(short, long, group = "source", requires = "name", value_name = "file")]
    pub file_name: Option<PathBuf>,

    /// Deploy to development directory.
    #[arg(short, long, conflicts_with = "production")]
    pub development: bool,

    /// Deploy to production directory (default).
    #[arg(short, long)]
    pub production: bool,

    /// Replace existing production device without asking.
    #[arg(long)]
    pub no_prompt: bool,

    /// Show deployment history instead of deploying.
    #[arg(long, group = "action")]
    pub history: bool,

    /// Show full paths in deployment history.
    #[arg(short, long)]
    pub verbose: bool,

    /// Number of history lines to show.
    #[arg(long, value_name = "N")]
    pub lines: Option<usize>,

    /// Print effective configuration and exit.
    #[arg(long, group = "action")]
    pub show_config: bool,
}

impl Cli {
    fn target(&self) -> DeployTarget {
        if self.development {
            DeployTarget::Development
        } else {
            DeployTarget::Production
        }
    }

    fn run(self, config: &ToolConfig) -> Result<i32> {
        if self.show_config {
            print!("{config}");
            Ok(0)
        } else if self.history {
            run_history(self, &config.deploy)
        } else {
            run_deploy(self, &config.deploy)
        }
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

    match run() {
        Ok(code) => exit(code),
        Err(error) => {
            error!("{error:?}");
            exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let config = ToolConfig::load(default_config_path()?)?;

    // INVARIANT: Verify required directories before parsing any arguments.
    require_directories(&config.deploy)?;

    Cli::parse().run(&config)
}

fn run_history(opts: Cli, settings: &DeploySettings) -> Result<i32> {
    let history = HistoryLog::open(settings.history_file.as_path())?;
    let lines = history.tail(opts.lines.unwrap_or(settings.history_lines))?;
    print!("{}", render_table(&lines, opts.verbose));

    Ok(0)
}

fn run_deploy(opts: Cli, settings: &DeploySettings) -> Result<i32> {
    let target = opts.target();
    let trunk = opts
        .name
        .ok_or_else(|| anyhow!("no device trunk name given"))?;

    // INVARIANT: Fail on a missing history log before touching anything.
    let history = HistoryLog::open(settings.history_file.as_path())?;

    let locator = Locator::new(settings.source_dir.as_path());
    let source = match opts.file_name {
        Some(file_name) => locator.explicit(file_name),
        None => locator.latest(&trunk)?,
    };
    println!("{}", source.display());

    let deployer = Deployer::new(DeployLayout::from(settings), InquirePrompt)
        .with_tag_cleaner(TagCleaner::from(&settings.tag_cleanup));
    let request = DeployRequest {
        source,
        trunk,
        target,
        assume_yes: opts.no_prompt,
    };

    match deployer.deploy(&request)? {
        DeployOutcome::Deployed(record) => {
            history.append(&record)?;
            Ok(0)
        }
        DeployOutcome::Declined { destination } => {
            info!("kept existing device at {:?}", destination.display());
            println!("Cancelled by user. Exiting.");
            Ok(1)
        }
    }
}
