//! Normalize desired and live permissions into comparable, sorted sets.
//!
//! The desired side has to be normalized first: which identifier (id or
//! name) a live group is compared by depends on how the desired side named
//! it.

use std::{collections::BTreeSet, sync::Arc};

use crate::{
    peer::{canonicalize, canonicalize_live, CanonicalPeer, ManagedPeers, NoManagedPeers},
    permission::{DesiredPermission, Permission, ValidationError},
};

/// What the normalizer needs to know about the caller.
#[derive(Clone)]
pub struct ReconciliationContext {
    /// The caller's own account. Bare group names are assumed to belong here.
    pub owner_id: String,
    /// Strategy for recognising provider-managed groups
    pub managed: Arc<dyn ManagedPeers>,
}

impl ReconciliationContext {
    /// Context with no managed peer groups
    pub fn new(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_owned(),
            managed: Arc::new(NoManagedPeers),
        }
    }

    /// Swap in a managed-peer strategy
    pub fn with_managed<M: ManagedPeers + 'static>(mut self, managed: M) -> Self {
        self.managed = Arc::new(managed);
        self
    }
}

impl std::fmt::Debug for ReconciliationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconciliationContext")
            .field("owner_id", &self.owner_id)
            .field("managed", &self.managed.canonical())
            .finish()
    }
}

/// Sorted, deduplicated ip ranges and peers for one side of a comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedAttrs {
    /// CIDR ranges
    pub ip_ranges: Vec<String>,
    /// Canonical peers
    pub peers: Vec<CanonicalPeer>,
}

impl NormalizedAttrs {
    /// No ip ranges and no peers
    pub fn is_empty(&self) -> bool {
        self.ip_ranges.is_empty() && self.peers.is_empty()
    }
}

fn sorted_unique<T: Ord>(mut items: Vec<T>) -> Vec<T> {
    items.sort();
    items.dedup();
    items
}

/// Normalize the desired side. Fails if the declaration is malformed.
pub fn normalize_desired(
    desired: &DesiredPermission,
    context: &ReconciliationContext,
) -> Result<NormalizedAttrs, ValidationError> {
    desired.validate()?;

    let ip_ranges = sorted_unique(desired.ip_ranges.clone().unwrap_or_default());
    let peers = sorted_unique(
        desired
            .peers
            .iter()
            .flatten()
            .map(|p| canonicalize(p, context))
            .collect(),
    );
    Ok(NormalizedAttrs { ip_ranges, peers })
}

/// The identifiers the desired side used. A live group whose id is in this
/// set gets compared by id rather than by name.
pub fn identifier_hints(desired: &NormalizedAttrs) -> BTreeSet<String> {
    desired
        .peers
        .iter()
        .map(|p| p.identifier.to_owned())
        .collect()
}

/// Normalize the live side, using the hints from the desired side.
pub fn normalize_live(
    live: &Permission,
    hints: &BTreeSet<String>,
    context: &ReconciliationContext,
) -> NormalizedAttrs {
    let ip_ranges = sorted_unique(live.ip_ranges.clone().unwrap_or_default());
    let peers = sorted_unique(
        live.groups
            .iter()
            .flatten()
            .map(|g| canonicalize_live(g, hints, context))
            .collect(),
    );
    NormalizedAttrs { ip_ranges, peers }
}

/// Normalize both sides of a comparison, desired first.
pub fn normalize_pair(
    live: &Permission,
    desired: &DesiredPermission,
    context: &ReconciliationContext,
) -> Result<(NormalizedAttrs, NormalizedAttrs), ValidationError> {
    let desired_attrs = normalize_desired(desired, context)?;
    let hints = identifier_hints(&desired_attrs);
    let live_attrs = normalize_live(live, &hints, context);
    Ok((desired_attrs, live_attrs))
}
