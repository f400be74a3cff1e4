//! Full CLI library for Warden
//!

#![deny(missing_docs)]

mod apply;
mod cmd;
mod diff;
mod plan;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use warden_core::{
    config::{self, WardenConfig},
    log_runtime,
    logging::{self, debug},
    pair_entries, project,
    state::LocalCollection,
    Entry,
};

use cmd::{WardenArgs, WardenCommand};

/// Everything a command needs: the config, the local collection, and the
/// paired desired/live entries.
pub(crate) struct Project {
    pub(crate) config: WardenConfig,
    pub(crate) collection: LocalCollection,
    pub(crate) entries: Vec<Entry>,
}

/// Main CLI entrypoint.
pub async fn cli() -> Result<()> {
    let args = WardenArgs::parse();
    logging::setup(args.log_level);

    let project = load_project(&args).await?;

    match &args.command {
        WardenCommand::Diff => diff::diff(&project)?,
        WardenCommand::Plan => plan::plan(&project)?,
        WardenCommand::Apply { dry_run } => apply::apply(&project, *dry_run).await?,
    }

    Ok(())
}

async fn load_project(args: &WardenArgs) -> Result<Project> {
    let config_path = args
        .config
        .to_owned()
        .unwrap_or_else(|| project::warden_cfg_path("."));
    let desired_path = args
        .desired
        .to_owned()
        .unwrap_or_else(|| project::desired_cfg_path("."));
    let state_path: PathBuf = args
        .state
        .to_owned()
        .unwrap_or_else(|| project::state_path("."));

    let config = WardenConfig::read_from_file(&config_path).map_err(|_| {
        anyhow!(
            "unable to find {} - make sure you are in a warden project directory, \
            or pass the config path with --config",
            config_path.display()
        )
    })?;
    debug!("using owner {}", config.owner_id);

    let desired = config::read_desired(&desired_path)
        .with_context(|| format!("reading {}", desired_path.display()))?;

    let name = state_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "state".to_owned());
    let collection = LocalCollection::open(&name, &state_path)?;

    let entries = log_runtime!(
        "pairing permissions",
        pair_entries(&desired, &collection.permissions().await)?
    );

    Ok(Project {
        config,
        collection,
        entries,
    })
}
