//! Diffing of desired vs live permissions

use std::{cmp::Ordering, fmt::Display};

use colored::Colorize;

use crate::{
    normalize::NormalizedAttrs,
    peer::CanonicalPeer,
    permission::{Grantee, PermissionKey},
};

/// Elements of `a` that are not in `b`. Both inputs must be sorted and
/// deduplicated; the output is too.
pub fn sorted_difference<T: Ord + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let mut res = Vec::new();
    let mut b_iter = b.iter().peekable();

    for item in a {
        loop {
            match b_iter.peek() {
                Some(other) if *other < item => {
                    b_iter.next();
                }
                _ => break,
            }
        }
        match b_iter.peek().map(|other| (*other).cmp(item)) {
            Some(Ordering::Equal) => {
                b_iter.next();
            }
            _ => res.push(item.to_owned()),
        }
    }
    res
}

/// The changes needed to bring one live permission in line with the desired one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionDiff {
    /// The permission being diffed
    pub key: Option<PermissionKey>,
    /// ip ranges in the config, not in the env
    pub add_ip_ranges: Vec<String>,
    /// ip ranges in the env, not in the config
    pub remove_ip_ranges: Vec<String>,
    /// peers in the config, not in the env
    pub add_peers: Vec<CanonicalPeer>,
    /// peers in the env, not in the config
    pub remove_peers: Vec<CanonicalPeer>,
}

impl PermissionDiff {
    /// Compute the four set differences between normalized sides
    pub fn between(desired: &NormalizedAttrs, live: &NormalizedAttrs) -> Self {
        Self {
            key: None,
            add_ip_ranges: sorted_difference(&desired.ip_ranges, &live.ip_ranges),
            remove_ip_ranges: sorted_difference(&live.ip_ranges, &desired.ip_ranges),
            add_peers: sorted_difference(&desired.peers, &live.peers),
            remove_peers: sorted_difference(&live.peers, &desired.peers),
        }
    }

    /// Label the diff with the entry it belongs to
    pub fn for_key(mut self, key: PermissionKey) -> Self {
        self.key = Some(key);
        self
    }

    /// True when live already matches desired
    pub fn is_empty(&self) -> bool {
        self.add_ip_ranges.is_empty()
            && self.remove_ip_ranges.is_empty()
            && self.add_peers.is_empty()
            && self.remove_peers.is_empty()
    }

    /// Everything that has to be granted, ip ranges first
    pub fn additions(&self) -> Vec<Grantee> {
        union(&self.add_ip_ranges, &self.add_peers)
    }

    /// Everything that has to be revoked, ip ranges first
    pub fn removals(&self) -> Vec<Grantee> {
        union(&self.remove_ip_ranges, &self.remove_peers)
    }
}

fn union(ip_ranges: &[String], peers: &[CanonicalPeer]) -> Vec<Grantee> {
    ip_ranges
        .iter()
        .cloned()
        .map(Grantee::IpRange)
        .chain(peers.iter().cloned().map(Grantee::Peer))
        .collect()
}

impl Display for PermissionDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut text = "".to_owned();
        let label = self
            .key
            .as_ref()
            .map(|k| k.to_string())
            .unwrap_or_default();
        if self.is_empty() {
            return writeln!(f, "  permission: {label} (no changes)");
        }
        text += format!("{}{}\n", "~ permission: ".yellow(), label.yellow()).as_str();
        if !self.add_ip_ranges.is_empty() || !self.remove_ip_ranges.is_empty() {
            text += "  ip ranges:\n";
        }
        for range in &self.add_ip_ranges {
            text += format!("{}", format!("    + {range}\n").green()).as_str();
        }
        for range in &self.remove_ip_ranges {
            text += format!("{}", format!("    - {range}\n").red()).as_str();
        }
        if !self.add_peers.is_empty() || !self.remove_peers.is_empty() {
            text += "  groups:\n";
        }
        for peer in &self.add_peers {
            text += format!("{}", format!("    + {peer}\n").green()).as_str();
        }
        for peer in &self.remove_peers {
            text += format!("{}", format!("    - {peer}\n").red()).as_str();
        }
        write!(f, "{text}")
    }
}
