//! External process supervision
//!
//! This module provides the `ProcessSupervisor` that:
//! - Launches external engine processes with piped stdio
//! - Tracks at most one live process per role (archive encode, normalize, recognize)
//! - Exposes a single cancellation switch that terminates everything live
//!
//! Processes are tracked as pid + kill capability, not as owned child objects:
//! the component that launched a process keeps the `Child` and exclusively
//! drives its I/O and exit, while the supervisor only needs to answer
//! "does role X have something live to kill".

mod supervisor;

pub use supervisor::{ProcessRole, ProcessSupervisor};
