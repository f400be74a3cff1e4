//! A security group kept in a local yaml file.
//!
//! Stands in for a provider when simulating changes. The file holds a
//! catalog of known peer groups and the current permissions; grants and
//! revokes are applied to it the way a provider would apply them.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use yaml_peg::serde as yaml;

use crate::{
    peer::CanonicalPeer,
    permission::{Grantee, LiveGroupRef, Permission, PortRange},
    reconcile::Collection,
};

/// Contents of the local state file
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct StateFile {
    /// Peer groups that can be granted access
    #[serde(default)]
    pub groups: Vec<LiveGroupRef>,
    /// The permissions currently in effect
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl StateFile {
    /// Read a state file from disk
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(&path).context("Reading state file")?;
        Self::from_yaml(&raw)
    }

    /// Parse state from yaml. An empty document is an empty state.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut docs = yaml::from_str::<StateFile>(raw).context("Deserializing state")?;
        docs.pop().ok_or_else(|| anyhow!["no state found"])
    }

    /// Serialize the state to yaml
    pub fn to_yaml(&self) -> Result<String> {
        yaml::to_string(self).map_err(anyhow::Error::from)
    }

    fn lookup_group(&self, peer: &CanonicalPeer) -> Result<LiveGroupRef> {
        self.groups
            .iter()
            .find(|g| {
                g.owner_id == peer.owner
                    && (g.group_id.as_deref() == Some(peer.identifier.as_str())
                        || g.group_name.as_deref() == Some(peer.identifier.as_str()))
            })
            .cloned()
            .ok_or_else(|| anyhow!("InvalidGroup.NotFound: {peer}"))
    }

    fn grant(&mut self, protocol: &str, port_range: PortRange, grantees: &[Grantee]) -> Result<()> {
        // resolve every group first so a bad reference leaves the state untouched
        let groups = grantees
            .iter()
            .filter_map(|g| match g {
                Grantee::Peer(p) => Some(self.lookup_group(p)),
                Grantee::IpRange(_) => None,
            })
            .collect::<Result<Vec<_>>>()?;

        let permission = match self
            .permissions
            .iter()
            .position(|p| p.protocol == protocol && p.port_range == port_range)
        {
            Some(idx) => &mut self.permissions[idx],
            None => {
                self.permissions.push(Permission::empty(protocol, port_range));
                self.permissions
                    .last_mut()
                    .ok_or_else(|| anyhow!("permission vanished"))?
            }
        };

        let ip_ranges = permission.ip_ranges.get_or_insert_with(Vec::new);
        for grantee in grantees {
            if let Grantee::IpRange(r) = grantee {
                if ip_ranges.contains(r) {
                    bail!("InvalidPermission.Duplicate: {r}");
                }
                ip_ranges.push(r.to_owned());
            }
        }
        let live_groups = permission.groups.get_or_insert_with(Vec::new);
        for group in groups {
            if live_groups.contains(&group) {
                bail!(
                    "InvalidPermission.Duplicate: {}",
                    group.group_id.unwrap_or_default()
                );
            }
            live_groups.push(group);
        }
        Ok(())
    }

    fn revoke(
        &mut self,
        protocol: &str,
        port_range: PortRange,
        grantees: &[Grantee],
    ) -> Result<()> {
        let idx = self
            .permissions
            .iter()
            .position(|p| p.protocol == protocol && p.port_range == port_range)
            .ok_or_else(|| anyhow!("InvalidPermission.NotFound: {protocol} {port_range}"))?;
        let mut permission = self.permissions[idx].clone();

        for grantee in grantees {
            match grantee {
                Grantee::IpRange(r) => {
                    let ranges = permission.ip_ranges.get_or_insert_with(Vec::new);
                    let before = ranges.len();
                    ranges.retain(|x| x != r);
                    if ranges.len() == before {
                        bail!("InvalidPermission.NotFound: {r}");
                    }
                }
                Grantee::Peer(p) => {
                    let groups = permission.groups.get_or_insert_with(Vec::new);
                    let before = groups.len();
                    groups.retain(|g| {
                        !(g.owner_id == p.owner
                            && (g.group_id.as_deref() == Some(p.identifier.as_str())
                                || g.group_name.as_deref() == Some(p.identifier.as_str())))
                    });
                    if groups.len() == before {
                        bail!("InvalidPermission.NotFound: {p}");
                    }
                }
            }
        }

        let now_empty = permission.ip_ranges.iter().flatten().next().is_none()
            && permission.groups.iter().flatten().next().is_none();
        if now_empty {
            self.permissions.remove(idx);
        } else {
            self.permissions[idx] = permission;
        }
        Ok(())
    }
}

/// A [`Collection`] backed by a [`StateFile`], optionally persisted to disk
/// after every change.
pub struct LocalCollection {
    name: String,
    path: Option<PathBuf>,
    state: Mutex<StateFile>,
}

impl LocalCollection {
    /// Keep the state in memory only
    pub fn in_memory(name: &str, state: StateFile) -> Self {
        Self {
            name: name.to_owned(),
            path: None,
            state: Mutex::new(state),
        }
    }

    /// Load the state from `path` and write it back after each change
    pub fn open<P: AsRef<Path>>(name: &str, path: P) -> Result<Self> {
        let state = StateFile::read_from_file(&path)
            .with_context(|| format!("opening {}", path.as_ref().display()))?;
        Ok(Self {
            name: name.to_owned(),
            path: Some(path.as_ref().to_owned()),
            state: Mutex::new(state),
        })
    }

    /// A copy of the current state
    pub async fn snapshot(&self) -> StateFile {
        self.state.lock().await.clone()
    }

    /// The permissions currently in effect
    pub async fn permissions(&self) -> Vec<Permission> {
        self.state.lock().await.permissions.clone()
    }

    fn persist(&self, state: &StateFile) -> Result<()> {
        if let Some(path) = &self.path {
            debug!("writing state to {}", path.display());
            fs::write(path, state.to_yaml()?).context("Writing state file")?;
        }
        Ok(())
    }
}

#[async_trait]
impl Collection for LocalCollection {
    fn log_id(&self) -> String {
        self.name.to_owned()
    }

    async fn grant(
        &self,
        protocol: &str,
        port_range: PortRange,
        grantees: &[Grantee],
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.grant(protocol, port_range, grantees)?;
        self.persist(&next)?;
        *state = next;
        Ok(())
    }

    async fn revoke(
        &self,
        protocol: &str,
        port_range: PortRange,
        grantees: &[Grantee],
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.revoke(protocol, port_range, grantees)?;
        self.persist(&next)?;
        *state = next;
        Ok(())
    }
}
