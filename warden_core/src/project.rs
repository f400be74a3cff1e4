//! Default file locations for a warden project.
//!
//! ```text
//! pwd
//!  ├── warden.yaml     owner id, managed peer group, concurrency
//!  ├── desired.yaml    the declared permissions
//!  └── state.yaml      the live security group (local simulation)
//! ```

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;

lazy_static! {
    static ref WARDEN_CFG: PathBuf = PathBuf::from("warden.yaml");
    static ref DESIRED_CFG: PathBuf = PathBuf::from("desired.yaml");
    static ref STATE_FILE: PathBuf = PathBuf::from("state.yaml");
}

/// The main config file, relative to the project
pub fn warden_cfg_path_local() -> PathBuf {
    WARDEN_CFG.to_owned()
}

/// The main config file
pub fn warden_cfg_path<P: AsRef<Path>>(project_path: P) -> PathBuf {
    project_path.as_ref().join(warden_cfg_path_local())
}

/// The desired permissions, relative to the project
pub fn desired_cfg_path_local() -> PathBuf {
    DESIRED_CFG.to_owned()
}

/// The desired permissions
pub fn desired_cfg_path<P: AsRef<Path>>(project_path: P) -> PathBuf {
    project_path.as_ref().join(desired_cfg_path_local())
}

/// The local state file, relative to the project
pub fn state_path_local() -> PathBuf {
    STATE_FILE.to_owned()
}

/// The local state file
pub fn state_path<P: AsRef<Path>>(project_path: P) -> PathBuf {
    project_path.as_ref().join(state_path_local())
}
