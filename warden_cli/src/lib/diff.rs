//! Diff command execution

use anyhow::Result;

use warden_core::Reconciler;

use crate::Project;

pub(super) fn diff(project: &Project) -> Result<()> {
    let ctx = project.config.context();
    let diffs = Reconciler::new(&project.collection, &ctx).diff_all(&project.entries)?;

    println!("\nPERMISSIONS\n──────────────────");
    if !diffs.is_empty() {
        diffs.iter().for_each(|diff| println!("{diff}"));
    } else {
        println!("No changes found");
    };

    Ok(())
}
