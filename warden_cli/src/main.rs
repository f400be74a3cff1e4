//! Warden CLI
//!

#![deny(missing_docs)]

use anyhow::Result;
use warden_lib::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli().await
}
