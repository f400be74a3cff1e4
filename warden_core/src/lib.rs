//!
//! Reconcile declared firewall permissions with a live security group.
//!
//! Both sides are normalized into canonical, sorted sets, diffed, and the
//! minimal grant/revoke calls are issued against a [`Collection`].
#![deny(missing_docs)]

pub use collection::{pair_entries, Entry};
pub use config::WardenConfig;
pub use normalize::ReconciliationContext;
pub use reconcile::{Collection, Reconciler};

pub mod collection;
pub mod config;
pub mod diff;
pub mod logging;
pub mod normalize;
pub mod peer;
pub mod permission;
pub mod project;
pub mod reconcile;
pub mod state;

#[cfg(test)]
mod test_util;

#[macro_export]
/// Time the code inside the macro. Write the elapsed time to debug logs.
/// Derived from https://notes.iveselov.info/programming/time_it-a-case-study-in-rust-macros
macro_rules! log_runtime {
    ($context:literal, $($tt:tt)+) => {
        {
            $crate::logging::debug!("{}: starting", $context);
            let timer = std::time::Instant::now();
            let x =
            $(
                $tt
            )+;
            $crate::logging::debug!("{}: {:?}", $context, timer.elapsed());
            x
        }
    }
}
