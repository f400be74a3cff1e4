//! Shared helpers for unit tests

use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::{
    normalize::ReconciliationContext,
    peer::ManagedPeerGroup,
    permission::{Grantee, LiveGroupRef, Permission, PortRange},
    reconcile::Collection,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Grant(String, PortRange, Vec<Grantee>),
    Revoke(String, PortRange, Vec<Grantee>),
}

/// Collection that records every call it receives
#[derive(Default)]
pub(crate) struct RecordingCollection {
    calls: Mutex<Vec<Call>>,
    fail_grants: bool,
}

impl RecordingCollection {
    pub(crate) fn failing_grants() -> Self {
        Self {
            fail_grants: true,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Collection for RecordingCollection {
    fn log_id(&self) -> String {
        "test-group".to_owned()
    }

    async fn grant(
        &self,
        protocol: &str,
        port_range: PortRange,
        grantees: &[Grantee],
    ) -> Result<()> {
        if self.fail_grants {
            bail!("RequestLimitExceeded");
        }
        self.calls.lock().unwrap().push(Call::Grant(
            protocol.to_owned(),
            port_range,
            grantees.to_vec(),
        ));
        Ok(())
    }

    async fn revoke(
        &self,
        protocol: &str,
        port_range: PortRange,
        grantees: &[Grantee],
    ) -> Result<()> {
        self.calls.lock().unwrap().push(Call::Revoke(
            protocol.to_owned(),
            port_range,
            grantees.to_vec(),
        ));
        Ok(())
    }
}

pub(crate) fn context(owner: &str) -> ReconciliationContext {
    ReconciliationContext::new(owner)
}

pub(crate) fn elb_context(owner: &str) -> ReconciliationContext {
    ReconciliationContext::new(owner).with_managed(ManagedPeerGroup::new("amazon-elb", "amazon-elb-sg"))
}

pub(crate) fn live_permission(
    protocol: &str,
    port_range: PortRange,
    ip_ranges: &[&str],
    groups: Vec<LiveGroupRef>,
) -> Permission {
    Permission {
        protocol: protocol.to_owned(),
        port_range,
        description: None,
        ip_ranges: Some(ip_ranges.iter().map(|r| (*r).to_owned()).collect()),
        groups: Some(groups),
    }
}
