//! Configuration files: `warden.yaml` and the desired-state declaration.
//!
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{de, Deserialize, Deserializer, Serialize};
use tracing::debug;
use yaml_peg::serde as yaml;

use crate::{
    normalize::ReconciliationContext, peer::ManagedPeerGroup, permission::DesiredPermission,
    reconcile::ReconcileOptions,
};

/// Struct representing the warden.yaml file.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct WardenConfig {
    /// The account the managed security group lives in
    #[serde(deserialize_with = "string_or_number")]
    pub owner_id: String,
    /// The provider-managed peer group, if the provider has one
    #[serde(default)]
    pub managed_peer: Option<ManagedPeerGroup>,
    /// How many permissions to reconcile at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Log the planned changes instead of making them
    #[serde(default)]
    pub dry_run: bool,
}

fn default_concurrency() -> usize {
    4
}

impl WardenConfig {
    /// Basic constructor with defaults for everything but the owner
    pub fn new(owner_id: &str) -> Self {
        Self {
            owner_id: owner_id.to_owned(),
            managed_peer: None,
            concurrency: default_concurrency(),
            dry_run: false,
        }
    }

    /// Read the config from a file
    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!("Trying to read config from {:?}", path.as_ref());
        let raw = fs::read_to_string(&path).context("Reading file")?;
        Self::from_yaml(&raw)
    }

    /// Parse the config from a yaml string
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let mut config = yaml::from_str::<WardenConfig>(raw).context("Deserializing config")?;
        config.pop().ok_or_else(|| anyhow!["failed to read config"])
    }

    /// Convert this config to a yaml string.
    pub fn to_yaml(&self) -> Result<String> {
        yaml::to_string(self).map_err(anyhow::Error::from)
    }

    /// The normalization context this config describes
    pub fn context(&self) -> ReconciliationContext {
        let ctx = ReconciliationContext::new(&self.owner_id);
        match &self.managed_peer {
            Some(managed) => ctx.with_managed(managed.to_owned()),
            None => ctx,
        }
    }

    /// Options for the reconciler
    pub fn options(&self) -> ReconcileOptions {
        ReconcileOptions {
            dry_run: self.dry_run,
        }
    }
}

/// Read the desired permissions from a yaml file
pub fn read_desired<P: AsRef<Path>>(path: P) -> Result<Vec<DesiredPermission>> {
    debug!("Trying to read desired permissions from {:?}", path.as_ref());
    let raw = fs::read_to_string(&path).context("Reading file")?;
    parse_desired(&raw)
}

/// Parse the desired permissions. An empty document declares nothing.
pub fn parse_desired(raw: &str) -> Result<Vec<DesiredPermission>> {
    if raw.trim().is_empty() {
        return Ok(vec![]);
    }
    let mut docs = yaml::from_str::<Vec<DesiredPermission>>(raw)
        .context("Deserializing desired permissions")?;
    Ok(docs.pop().unwrap_or_default())
}

/// Account ids are numeric, and yaml is happy to read them as numbers.
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> de::Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or an integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_owned())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}
