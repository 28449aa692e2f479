//! Device control adapters.

pub mod command;
pub mod dry_run;

pub use command::CommandDeviceControl;
pub use dry_run::DryRunDeviceControl;
