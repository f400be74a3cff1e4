//! plan the grant and revoke calls for each permission

use anyhow::Result;

use warden_core::Reconciler;

use crate::Project;

pub(super) fn plan(project: &Project) -> Result<()> {
    let ctx = project.config.context();
    let plans = Reconciler::new(&project.collection, &ctx).plan_all(&project.entries)?;

    // Exit early if there haven't been any changes
    if plans.is_empty() {
        println!("No changes found");
        return Ok(());
    }

    for (key, changes) in plans {
        println!("{key}:");
        changes
            .iter()
            .for_each(|c| println!("{}", textwrap::indent(&c.to_string(), "  ")));
        println!();
    }
    Ok(())
}
