//! Drive one live permission toward its desired state.

use std::fmt::Display;

use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use tracing::{debug, info};

use crate::{
    diff::PermissionDiff,
    normalize::{normalize_live, normalize_pair, ReconciliationContext},
    permission::{DesiredPermission, Grantee, Permission, PortRange},
};

/// The provider side of a security group: the only place changes are made.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Label used in log output
    fn log_id(&self) -> String;
    /// Allow the grantees on the given protocol and port range
    async fn grant(&self, protocol: &str, port_range: PortRange, grantees: &[Grantee])
        -> Result<()>;
    /// Remove the grantees from the given protocol and port range
    async fn revoke(
        &self,
        protocol: &str,
        port_range: PortRange,
        grantees: &[Grantee],
    ) -> Result<()>;
}

/// Whether a change adds or removes access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Add access
    Grant,
    /// Remove access
    Revoke,
}

/// One call to make against the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Grant or revoke
    pub kind: ChangeKind,
    /// Protocol token
    pub protocol: String,
    /// Port range
    pub port_range: PortRange,
    /// Who the change applies to
    pub grantees: Vec<Grantee>,
}

impl Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let grantees = self
            .grantees
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match self.kind {
            ChangeKind::Grant => write!(
                f,
                "{}",
                format!("GRANT {} {} TO {}", self.protocol, self.port_range, grantees).green()
            ),
            ChangeKind::Revoke => write!(
                f,
                "{}",
                format!("REVOKE {} {} FROM {}", self.protocol, self.port_range, grantees).red()
            ),
        }
    }
}

/// Knobs for applying changes
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    /// Log the planned changes instead of making them
    pub dry_run: bool,
}

/// Computes and applies the minimal grant/revoke calls for a permission.
pub struct Reconciler<'a, C: Collection + ?Sized> {
    collection: &'a C,
    context: &'a ReconciliationContext,
    options: ReconcileOptions,
}

impl<'a, C: Collection + ?Sized> Reconciler<'a, C> {
    /// Basic constructor
    pub fn new(collection: &'a C, context: &'a ReconciliationContext) -> Self {
        Self {
            collection,
            context,
            options: Default::default(),
        }
    }

    /// Use the given options
    pub fn with_options(mut self, options: ReconcileOptions) -> Self {
        self.options = options;
        self
    }

    fn log_id(&self, live: &Permission) -> String {
        format!(
            "{} > {} {}",
            self.collection.log_id(),
            live.protocol,
            live.port_range
        )
    }

    /// The diff between live and desired, after normalization
    pub fn diff(&self, live: &Permission, desired: &DesiredPermission) -> Result<PermissionDiff> {
        let (desired_attrs, live_attrs) = normalize_pair(live, desired, self.context)?;
        Ok(PermissionDiff::between(&desired_attrs, &live_attrs).for_key(live.key()))
    }

    /// Does the live permission already match the desired one?
    pub fn matches(&self, live: &Permission, desired: &DesiredPermission) -> Result<bool> {
        Ok(self.diff(live, desired)?.is_empty())
    }

    /// The calls `reconcile` would make, in order: grant first, then revoke.
    pub fn plan(&self, live: &Permission, desired: &DesiredPermission) -> Result<Vec<Change>> {
        let diff = self.diff(live, desired)?;
        let mut changes = vec![];
        let additions = diff.additions();
        if !additions.is_empty() {
            changes.push(Change {
                kind: ChangeKind::Grant,
                protocol: live.protocol.to_owned(),
                port_range: live.port_range,
                grantees: additions,
            });
        }
        let removals = diff.removals();
        if !removals.is_empty() {
            changes.push(Change {
                kind: ChangeKind::Revoke,
                protocol: live.protocol.to_owned(),
                port_range: live.port_range,
                grantees: removals,
            });
        }
        Ok(changes)
    }

    /// The single revoke `remove` would make, if any
    pub fn plan_removal(&self, live: &Permission) -> Vec<Change> {
        let attrs = normalize_live(live, &Default::default(), self.context);
        if attrs.is_empty() {
            return vec![];
        }
        let grantees = attrs
            .ip_ranges
            .into_iter()
            .map(Grantee::IpRange)
            .chain(attrs.peers.into_iter().map(Grantee::Peer))
            .collect();
        vec![Change {
            kind: ChangeKind::Revoke,
            protocol: live.protocol.to_owned(),
            port_range: live.port_range,
            grantees,
        }]
    }

    /// Bring the live permission in line with the desired one.
    pub async fn reconcile(&self, live: &Permission, desired: &DesiredPermission) -> Result<()> {
        let changes = self.plan(live, desired)?;
        if changes.is_empty() {
            debug!("{}: no changes", self.log_id(live));
            return Ok(());
        }
        info!("Update Permission: {}", self.log_id(live));
        self.apply(live, &changes).await
    }

    /// Revoke everything the live permission currently allows.
    pub async fn remove(&self, live: &Permission) -> Result<()> {
        info!("Delete Permission: {}", self.log_id(live));
        let changes = self.plan_removal(live);
        self.apply(live, &changes).await
    }

    /// Changes are applied strictly in order so grants land before revokes.
    async fn apply(&self, live: &Permission, changes: &[Change]) -> Result<()> {
        for change in changes {
            if self.options.dry_run {
                info!("(dry run) {}: {}", self.log_id(live), change);
                continue;
            }
            debug!("{}: {}", self.log_id(live), change);
            match change.kind {
                ChangeKind::Grant => self
                    .collection
                    .grant(&change.protocol, change.port_range, &change.grantees)
                    .await
                    .with_context(|| format!("granting on {}", self.log_id(live)))?,
                ChangeKind::Revoke => self
                    .collection
                    .revoke(&change.protocol, change.port_range, &change.grantees)
                    .await
                    .with_context(|| format!("revoking on {}", self.log_id(live)))?,
            }
        }
        Ok(())
    }
}
