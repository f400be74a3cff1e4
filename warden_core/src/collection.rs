//! Reconcile every permission of a security group at once.
//!
//! Desired and live entries are paired by protocol + port range. Entries
//! only in the config are created, entries only in the env are removed.

use std::collections::BTreeMap;

use anyhow::Result;
use futures::{stream, TryStreamExt};
use tracing::debug;

use crate::{
    diff::PermissionDiff,
    permission::{DesiredPermission, Permission, PermissionKey, ValidationError},
    reconcile::{Change, Collection, Reconciler},
};

/// A live permission and what it should become. `desired: None` means the
/// permission should be removed entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The live side (empty if the permission doesn't exist yet)
    pub live: Permission,
    /// The desired side
    pub desired: Option<DesiredPermission>,
}

impl Entry {
    /// The key both sides share
    pub fn key(&self) -> PermissionKey {
        self.live.key()
    }
}

/// Pair up desired and live permissions. Every desired entry is validated
/// here, so a bad declaration fails before anything is sent to the provider.
pub fn pair_entries(desired: &[DesiredPermission], live: &[Permission]) -> Result<Vec<Entry>> {
    let mut desired_map = BTreeMap::new();
    for d in desired {
        d.validate()?;
        if desired_map.insert(d.key(), d).is_some() {
            return Err(ValidationError::new(&d.key(), "declared more than once").into());
        }
    }

    let mut live_map: BTreeMap<PermissionKey, Permission> = BTreeMap::new();
    for l in live {
        match live_map.get_mut(&l.key()) {
            Some(existing) => existing.absorb(l.to_owned()),
            None => {
                live_map.insert(l.key(), l.to_owned());
            }
        }
    }

    let mut res = Vec::new();
    for (key, d) in &desired_map {
        let live = live_map
            .remove(key)
            .unwrap_or_else(|| Permission::empty(&key.protocol, key.port_range));
        res.push(Entry {
            live,
            desired: Some((*d).to_owned()),
        });
    }
    res.extend(live_map.into_values().map(|live| Entry {
        live,
        desired: None,
    }));
    res.sort_by_key(|e| e.key());
    Ok(res)
}

impl<'a, C: Collection + ?Sized> Reconciler<'a, C> {
    /// Diff every entry. Entries without changes are left out.
    pub fn diff_all(&self, entries: &[Entry]) -> Result<Vec<PermissionDiff>> {
        let mut res = Vec::new();
        for entry in entries {
            // Removal is a diff against an empty declaration
            let desired = entry.desired.clone().unwrap_or_else(|| {
                DesiredPermission::new(&entry.live.protocol, entry.live.port_range)
            });
            let diff = self.diff(&entry.live, &desired)?;
            if !diff.is_empty() {
                res.push(diff);
            }
        }
        Ok(res)
    }

    /// Plan every entry. Entries without changes are left out.
    pub fn plan_all(&self, entries: &[Entry]) -> Result<Vec<(PermissionKey, Vec<Change>)>> {
        let mut res = Vec::new();
        for entry in entries {
            let changes = match &entry.desired {
                Some(desired) => self.plan(&entry.live, desired)?,
                None => self.plan_removal(&entry.live),
            };
            if !changes.is_empty() {
                res.push((entry.key(), changes));
            }
        }
        Ok(res)
    }

    /// Reconcile every entry, at most `concurrency` at a time. Each entry
    /// still grants before it revokes. Stops at the first failure.
    pub async fn reconcile_all(&self, entries: &[Entry], concurrency: usize) -> Result<()> {
        debug!(
            "reconciling {} permissions ({} at a time)",
            entries.len(),
            concurrency
        );
        stream::iter(entries.iter().map(Ok::<_, anyhow::Error>))
            .try_for_each_concurrent(concurrency.max(1), |entry| async move {
                match &entry.desired {
                    Some(desired) => {
                        if self.matches(&entry.live, desired)? {
                            return Ok(());
                        }
                        self.reconcile(&entry.live, desired).await
                    }
                    None => self.remove(&entry.live).await,
                }
            })
            .await
    }

    /// Check every entry without making changes
    pub fn all_match(&self, entries: &[Entry]) -> Result<bool> {
        for entry in entries {
            let matches = match &entry.desired {
                Some(desired) => self.matches(&entry.live, desired)?,
                None => self.plan_removal(&entry.live).is_empty(),
            };
            if !matches {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
