//! CLI commands module.

mod calibrate;
#[cfg(feature = "mic")]
mod listen;
mod replay;
mod snapshots;
mod util;

pub use calibrate::CalibrateCommand;
#[cfg(feature = "mic")]
pub use listen::ListenCommand;
pub use replay::ReplayCommand;
pub use snapshots::SnapshotsCommand;

pub(crate) use util::*;
