//! Canonical peer form
//!
//! Peer groups show up in several shapes: a bare name from the operator's
//! config, an explicit `[owner, id]` pair, or an owner + id + name triple
//! reported by the provider. Everything is reduced to a [`CanonicalPeer`]
//! before comparison.

use std::{collections::BTreeSet, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::{
    normalize::ReconciliationContext,
    permission::{LiveGroupRef, PeerReference},
};

/// The comparable (owner, identifier) form of a peer group.
#[derive(Clone, Deserialize, Serialize, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonicalPeer {
    /// The account that owns the group
    pub owner: String,
    /// The group id or name
    pub identifier: String,
}

impl CanonicalPeer {
    /// Basic constructor
    pub fn new(owner: &str, identifier: &str) -> Self {
        Self {
            owner: owner.to_owned(),
            identifier: identifier.to_owned(),
        }
    }
}

impl Display for CanonicalPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.identifier)
    }
}

/// Recognises peer groups that belong to the provider itself (for example the
/// group a load balancer places its nodes in). All of them collapse to a
/// single canonical value.
pub trait ManagedPeers: Send + Sync {
    /// Is this reference a provider-managed group?
    fn is_managed(&self, reference: &str) -> bool;
    /// The canonical value every managed reference collapses to, if the
    /// provider has managed groups at all
    fn canonical(&self) -> Option<CanonicalPeer>;
}

/// No provider-managed groups exist.
#[derive(Debug, Default, Clone)]
pub struct NoManagedPeers;

impl ManagedPeers for NoManagedPeers {
    fn is_managed(&self, _reference: &str) -> bool {
        false
    }

    fn canonical(&self) -> Option<CanonicalPeer> {
        None
    }
}

/// A managed group identified by a fixed owner and name, plus any aliases
/// the provider uses for it.
#[derive(Clone, Deserialize, Serialize, Debug, Default, PartialEq, Eq)]
pub struct ManagedPeerGroup {
    /// Owner the managed group is reported under
    pub owner: String,
    /// Name of the managed group
    pub name: String,
    /// Other spellings that refer to the same group
    #[serde(default)]
    pub aliases: BTreeSet<String>,
}

impl ManagedPeerGroup {
    /// Basic constructor
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            owner: owner.to_owned(),
            name: name.to_owned(),
            aliases: Default::default(),
        }
    }
}

impl ManagedPeers for ManagedPeerGroup {
    fn is_managed(&self, reference: &str) -> bool {
        reference == self.name
            || reference.split_once('/') == Some((self.owner.as_str(), self.name.as_str()))
            || self.aliases.contains(reference)
    }

    fn canonical(&self) -> Option<CanonicalPeer> {
        Some(CanonicalPeer::new(&self.owner, &self.name))
    }
}

/// Reduce a desired-side reference to canonical form.
///
/// Explicit pairs are kept as-is, managed references collapse to the managed
/// constant, and bare names are assumed to live in the caller's account.
pub fn canonicalize(reference: &PeerReference, context: &ReconciliationContext) -> CanonicalPeer {
    match reference {
        PeerReference::Resolved(owner, identifier) => CanonicalPeer::new(owner, identifier),
        PeerReference::Name(name) => match context.managed.canonical() {
            Some(managed) if context.managed.is_managed(name) => managed,
            _ => CanonicalPeer::new(&context.owner_id, name),
        },
    }
}

/// Reduce a live-side group to canonical form.
///
/// The id is used when the desired side named this group by id (it is in
/// `hints`), even for a managed group. Otherwise managed groups collapse to
/// the managed constant, and everything else goes by name, falling back to
/// the id when the provider didn't report a name.
pub fn canonicalize_live(
    group: &LiveGroupRef,
    hints: &BTreeSet<String>,
    context: &ReconciliationContext,
) -> CanonicalPeer {
    let id = group.group_id.as_deref();
    let name = group.group_name.as_deref();

    if let Some(i) = id.filter(|i| hints.contains(*i)) {
        return CanonicalPeer::new(&group.owner_id, i);
    }

    if let Some(managed) = context.managed.canonical() {
        if group.managed
            || id.map_or(false, |i| context.managed.is_managed(i))
            || name.map_or(false, |n| context.managed.is_managed(n))
        {
            return managed;
        }
    }

    CanonicalPeer::new(&group.owner_id, name.or(id).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{context, elb_context};

    #[test]
    fn resolved_reference_is_unchanged() {
        let ctx = context("ownerA");
        assert_eq!(
            canonicalize(&PeerReference::resolved("ownerB", "sg-1"), &ctx),
            CanonicalPeer::new("ownerB", "sg-1")
        );
    }

    #[test]
    fn bare_name_defaults_to_caller_owner() {
        let ctx = context("ownerA");
        assert_eq!(
            canonicalize(&PeerReference::name("web"), &ctx),
            CanonicalPeer::new("ownerA", "web")
        );
    }

    #[test]
    fn managed_name_collapses() {
        let ctx = elb_context("ownerA");
        assert_eq!(
            canonicalize(&PeerReference::name("amazon-elb-sg"), &ctx),
            CanonicalPeer::new("amazon-elb", "amazon-elb-sg")
        );
        assert_eq!(
            canonicalize(&PeerReference::name("amazon-elb/amazon-elb-sg"), &ctx),
            CanonicalPeer::new("amazon-elb", "amazon-elb-sg")
        );
    }

    #[test]
    fn live_uses_id_only_when_hinted() {
        let ctx = context("ownerA");
        let group = LiveGroupRef::new("ownerA", "sg-1", "alpha");
        assert_eq!(
            canonicalize_live(&group, &BTreeSet::new(), &ctx),
            CanonicalPeer::new("ownerA", "alpha")
        );
        assert_eq!(
            canonicalize_live(&group, &["sg-1".to_owned()].into(), &ctx),
            CanonicalPeer::new("ownerA", "sg-1")
        );
    }

    #[test]
    fn live_without_name_falls_back_to_id() {
        let ctx = context("ownerA");
        let group = LiveGroupRef {
            owner_id: "ownerB".to_owned(),
            group_id: Some("sg-9".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            canonicalize_live(&group, &BTreeSet::new(), &ctx),
            CanonicalPeer::new("ownerB", "sg-9")
        );
    }

    #[test]
    fn managed_live_groups_collapse() {
        let ctx = elb_context("ownerA");
        let flagged = LiveGroupRef::new("elsewhere", "sg-77", "whatever").managed();
        let named = LiveGroupRef::new("amazon-elb", "sg-88", "amazon-elb-sg");
        let hints = BTreeSet::new();
        assert_eq!(
            canonicalize_live(&flagged, &hints, &ctx),
            canonicalize_live(&named, &hints, &ctx)
        );
    }

    #[test]
    fn hinted_id_wins_over_managed_collapse() {
        let ctx = elb_context("ownerA");
        let group = LiveGroupRef::new("amazon-elb", "sg-843f59ed", "amazon-elb-sg").managed();
        assert_eq!(
            canonicalize_live(&group, &["sg-843f59ed".to_owned()].into(), &ctx),
            CanonicalPeer::new("amazon-elb", "sg-843f59ed")
        );
    }

    #[test]
    fn flagged_group_without_strategy_keeps_its_name() {
        let ctx = context("ownerA");
        let group = LiveGroupRef::new("amazon-elb", "sg-843f59ed", "amazon-elb-sg").managed();
        assert_eq!(
            canonicalize_live(&group, &BTreeSet::new(), &ctx),
            CanonicalPeer::new("amazon-elb", "amazon-elb-sg")
        );
        assert_eq!(
            canonicalize(&PeerReference::name("amazon-elb-sg"), &ctx),
            CanonicalPeer::new("ownerA", "amazon-elb-sg")
        );
    }

    #[test]
    fn owner_slash_name_must_match_both_parts() {
        let managed = ManagedPeerGroup::new("amazon-elb", "amazon-elb-sg");
        assert!(managed.is_managed("amazon-elb/amazon-elb-sg"));
        assert!(!managed.is_managed("ownerA/amazon-elb-sg"));
        assert!(!managed.is_managed("amazon-elb/other"));
    }
}
