//! Apply the planned changes to the local state

use anyhow::Result;
use colored::Colorize;

use warden_core::{logging::info, pair_entries, reconcile::ReconcileOptions, Reconciler};

use crate::Project;

pub(super) async fn apply(project: &Project, dry_run: bool) -> Result<()> {
    let ctx = project.config.context();
    let options = ReconcileOptions {
        dry_run: dry_run || project.config.options().dry_run,
    };
    let reconciler = Reconciler::new(&project.collection, &ctx).with_options(options);

    if reconciler.all_match(&project.entries)? {
        println!("No changes found");
        return Ok(());
    }

    reconciler
        .reconcile_all(&project.entries, project.config.concurrency)
        .await?;

    if options.dry_run {
        println!("{}", "Dry run: no changes were made".yellow());
        return Ok(());
    }

    // check the result against a fresh read of the state
    let desired = project
        .entries
        .iter()
        .filter_map(|e| e.desired.to_owned())
        .collect::<Vec<_>>();
    let refreshed = pair_entries(&desired, &project.collection.permissions().await)?;
    if reconciler.all_match(&refreshed)? {
        info!("state converged");
        println!("{}", "Changes applied".green());
    } else {
        println!(
            "{}",
            "Changes applied, but the state still differs - run `warden plan` to see what's left"
                .yellow()
        );
    }
    Ok(())
}
