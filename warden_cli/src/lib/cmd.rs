//! Commands for the Warden CLI
//!

use std::path::PathBuf;

use clap::{self, Parser, Subcommand};

use warden_core::logging::LevelFilter;

/// Warden: converge security group permissions to what's declared
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None, arg_required_else_help = true)]
pub(crate) struct WardenArgs {
    #[clap(subcommand)]
    pub(crate) command: WardenCommand,
    #[clap(global = true, short = 'v', long)]
    pub(crate) log_level: Option<LevelFilter>,
    /// Path to warden.yaml
    #[clap(global = true, short, long)]
    pub(crate) config: Option<PathBuf>,
    /// Path to the desired permissions
    #[clap(global = true, short, long)]
    pub(crate) desired: Option<PathBuf>,
    /// Path to the local state file
    #[clap(global = true, short, long)]
    pub(crate) state: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum WardenCommand {
    /// Diff the declared permissions with the current state
    Diff,

    /// Plan the grant and revoke calls needed to apply the diff
    Plan,

    /// Apply the planned changes
    Apply {
        /// Only log what would change
        #[clap(long, value_parser, default_value = "false")]
        dry_run: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_with_paths_and_dry_run() -> Result<(), clap::Error> {
        let args = WardenArgs::try_parse_from([
            "warden", "apply", "--dry-run", "-d", "x.yaml", "-s", "y.yaml", "-v", "debug",
        ])?;
        assert!(matches!(args.command, WardenCommand::Apply { dry_run: true }));
        assert_eq!(args.desired, Some(PathBuf::from("x.yaml")));
        assert_eq!(args.state, Some(PathBuf::from("y.yaml")));
        assert_eq!(args.config, None);
        assert_eq!(args.log_level, Some(LevelFilter::DEBUG));
        Ok(())
    }

    #[test]
    fn apply_defaults_to_a_real_run() -> Result<(), clap::Error> {
        let args = WardenArgs::try_parse_from(["warden", "-c", "w.yaml", "apply"])?;
        assert!(matches!(args.command, WardenCommand::Apply { dry_run: false }));
        assert_eq!(args.config, Some(PathBuf::from("w.yaml")));
        Ok(())
    }

    #[test]
    fn a_command_is_required() {
        assert!(WardenArgs::try_parse_from(["warden"]).is_err());
        assert!(WardenArgs::try_parse_from(["warden", "destroy"]).is_err());
    }
}
