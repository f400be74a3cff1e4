//! Desired and live permission types
//!

use std::fmt::Display;

use anyhow::Result;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::peer::CanonicalPeer;

/// An inclusive port range. ICMP rules use `-1` for "any".
#[derive(
    Clone, Copy, Deserialize, Serialize, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct PortRange {
    /// First port in the range
    pub from: i32,
    /// Last port in the range (inclusive)
    pub to: i32,
}

impl PortRange {
    /// Basic constructor
    pub fn new(from: i32, to: i32) -> Self {
        Self { from, to }
    }

    /// A range covering exactly one port
    pub fn single(port: i32) -> Self {
        Self::new(port, port)
    }
}

impl Display for PortRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// The key a permission is identified by within a security group.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PermissionKey {
    /// Protocol token, e.g. "tcp"
    pub protocol: String,
    /// The port range
    pub port_range: PortRange,
}

impl Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.protocol, self.port_range)
    }
}

/// A peer group as the provider reports it. The provider may hand back
/// an id, a name, or both.
#[derive(Clone, Deserialize, Serialize, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct LiveGroupRef {
    /// Account that owns the group
    #[serde(deserialize_with = "crate::config::string_or_number")]
    pub owner_id: String,
    /// Group id (e.g. "sg-0123")
    #[serde(default)]
    pub group_id: Option<String>,
    /// Group name
    #[serde(default)]
    pub group_name: Option<String>,
    /// Whether the group is owned by the provider itself (load balancers etc.)
    #[serde(default)]
    pub managed: bool,
}

impl LiveGroupRef {
    /// Convenience constructor for a group that reports both its id and name.
    pub fn new(owner_id: &str, group_id: &str, group_name: &str) -> Self {
        Self {
            owner_id: owner_id.to_owned(),
            group_id: Some(group_id.to_owned()),
            group_name: Some(group_name.to_owned()),
            managed: false,
        }
    }

    /// Mark the group as provider-managed
    pub fn managed(mut self) -> Self {
        self.managed = true;
        self
    }
}

/// A live permission (one protocol + port range entry of a security group)
#[derive(Clone, Deserialize, Serialize, Debug, Default, PartialEq, Eq)]
pub struct Permission {
    /// Protocol token
    pub protocol: String,
    /// Port range
    pub port_range: PortRange,
    /// Optional free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// CIDR ranges
    #[serde(default)]
    pub ip_ranges: Option<Vec<String>>,
    /// Peer groups
    #[serde(default)]
    pub groups: Option<Vec<LiveGroupRef>>,
}

impl Permission {
    /// An empty permission for the given key. Used when a desired entry has
    /// no live counterpart yet.
    pub fn empty(protocol: &str, port_range: PortRange) -> Self {
        Self {
            protocol: protocol.to_owned(),
            port_range,
            ..Default::default()
        }
    }

    /// The (protocol, port range) key
    pub fn key(&self) -> PermissionKey {
        PermissionKey {
            protocol: self.protocol.to_owned(),
            port_range: self.port_range,
        }
    }

    /// Fold another live permission with the same key into this one.
    pub(crate) fn absorb(&mut self, other: Permission) {
        if let Some(ips) = other.ip_ranges {
            self.ip_ranges.get_or_insert_with(Vec::new).extend(ips);
        }
        if let Some(groups) = other.groups {
            self.groups.get_or_insert_with(Vec::new).extend(groups);
        }
        if self.description.is_none() {
            self.description = other.description;
        }
    }
}

/// A reference to a peer group in a desired permission.
///
/// In yaml, a bare string is a group name (or id) in the caller's account,
/// and a two-element list is an explicit `[owner, id]` pair.
#[derive(Clone, Deserialize, Serialize, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(untagged)]
pub enum PeerReference {
    /// A bare group name or id
    Name(String),
    /// An explicit (owner, identifier) pair
    Resolved(String, String),
}

impl PeerReference {
    /// Bare reference
    pub fn name(name: &str) -> Self {
        PeerReference::Name(name.to_owned())
    }

    /// Explicit (owner, identifier) reference
    pub fn resolved(owner: &str, identifier: &str) -> Self {
        PeerReference::Resolved(owner.to_owned(), identifier.to_owned())
    }
}

impl Display for PeerReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerReference::Name(n) => write!(f, "{n}"),
            PeerReference::Resolved(o, i) => write!(f, "{o}/{i}"),
        }
    }
}

/// A permission as declared by the operator
#[derive(Clone, Deserialize, Serialize, Debug, Default, PartialEq, Eq)]
pub struct DesiredPermission {
    /// Protocol token
    pub protocol: String,
    /// Port range
    pub port_range: PortRange,
    /// CIDR ranges
    #[serde(default)]
    pub ip_ranges: Option<Vec<String>>,
    /// Peer references
    #[serde(default)]
    pub peers: Option<Vec<PeerReference>>,
}

impl DesiredPermission {
    /// Create an empty desired permission for the key
    pub fn new(protocol: &str, port_range: PortRange) -> Self {
        Self {
            protocol: protocol.to_owned(),
            port_range,
            ..Default::default()
        }
    }

    /// Builder-style setter for the ip ranges
    pub fn with_ip_ranges(mut self, ranges: &[&str]) -> Self {
        self.ip_ranges = Some(ranges.iter().map(|r| (*r).to_owned()).collect());
        self
    }

    /// Builder-style setter for the peers
    pub fn with_peers(mut self, peers: Vec<PeerReference>) -> Self {
        self.peers = Some(peers);
        self
    }

    /// The (protocol, port range) key
    pub fn key(&self) -> PermissionKey {
        PermissionKey {
            protocol: self.protocol.to_owned(),
            port_range: self.port_range,
        }
    }

    /// Check the declaration before anything is sent to the provider.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let key = self.key();
        if self.protocol.trim().is_empty() {
            return Err(ValidationError::new(&key, "protocol is empty"));
        }
        if self.port_range.from > self.port_range.to {
            return Err(ValidationError::new(
                &key,
                &format!("port range {} is inverted", self.port_range),
            ));
        }
        for range in self.ip_ranges.iter().flatten() {
            if range.parse::<IpNetwork>().is_err() {
                return Err(ValidationError::new(
                    &key,
                    &format!("\"{range}\" is not a valid CIDR range"),
                ));
            }
        }
        for peer in self.peers.iter().flatten() {
            let bad = match peer {
                PeerReference::Name(n) => n.trim().is_empty(),
                PeerReference::Resolved(o, i) => o.trim().is_empty() || i.trim().is_empty(),
            };
            if bad {
                return Err(ValidationError::new(
                    &key,
                    &format!("peer reference \"{peer}\" is incomplete"),
                ));
            }
        }
        Ok(())
    }
}

/// A malformed desired permission. Raised before any provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The entry that failed validation
    pub key: String,
    /// What is wrong with it
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(key: &PermissionKey, message: &str) -> Self {
        Self {
            key: key.to_string(),
            message: message.to_owned(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid permission [{}]: {}", self.key, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// A single element of a grant or revoke call: an ip range or a peer group.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Grantee {
    /// CIDR range
    IpRange(String),
    /// Canonical peer group
    Peer(CanonicalPeer),
}

impl Display for Grantee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grantee::IpRange(r) => write!(f, "{r}"),
            Grantee::Peer(p) => write!(f, "{p}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_permission_passes() {
        let desired = DesiredPermission::new("tcp", PortRange::single(22))
            .with_ip_ranges(&["10.0.0.0/8", "2001:db8::/32"])
            .with_peers(vec![
                PeerReference::name("web"),
                PeerReference::resolved("111122223333", "sg-1"),
            ]);
        assert_eq!(desired.validate(), Ok(()));
    }

    #[test]
    fn inverted_port_range_is_rejected() {
        let desired = DesiredPermission::new("tcp", PortRange::new(90, 80));
        let err = desired.validate().unwrap_err();
        assert_eq!(err.key, "tcp 90..80");
    }

    #[test]
    fn bad_cidr_is_rejected() {
        let desired =
            DesiredPermission::new("tcp", PortRange::single(80)).with_ip_ranges(&["10.0.0.300/8"]);
        assert!(desired.validate().is_err());
    }

    #[test]
    fn empty_peer_is_rejected() {
        let desired = DesiredPermission::new("udp", PortRange::single(53))
            .with_peers(vec![PeerReference::resolved("", "sg-1")]);
        assert!(desired.validate().is_err());
        let desired = DesiredPermission::new("udp", PortRange::single(53))
            .with_peers(vec![PeerReference::name(" ")]);
        assert!(desired.validate().is_err());
    }

    #[test]
    fn empty_protocol_is_rejected() {
        let desired = DesiredPermission::new("", PortRange::single(53));
        assert!(desired.validate().is_err());
    }

    #[test]
    fn absorb_merges_entries() {
        let mut a = Permission::empty("tcp", PortRange::single(80));
        a.ip_ranges = Some(vec!["10.0.0.0/8".to_owned()]);
        let mut b = Permission::empty("tcp", PortRange::single(80));
        b.ip_ranges = Some(vec!["192.168.0.0/16".to_owned()]);
        b.groups = Some(vec![LiveGroupRef::new("o", "sg-1", "web")]);
        a.absorb(b);
        assert_eq!(a.ip_ranges.unwrap().len(), 2);
        assert_eq!(a.groups.unwrap().len(), 1);
    }
}
