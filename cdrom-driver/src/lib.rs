//! A Classic Mac OS Device Manager driver for CD-ROM devices, built on
//! top of the `cdrom` bin/cue container crate.

pub mod audio;
pub mod dispatcher;
pub mod error;
pub mod position;
pub mod registry;
pub mod toc;

pub use audio::{AudioStatus, CdPlayer, MixerSink, NullSink};
pub use dispatcher::{Dispatcher, GuestOps, ParamBlock, RecordingGuestOps};
pub use error::{DriverError, DriverStatus};
pub use position::PosType;
pub use registry::{DriveInfo, DriveRegistry, UnitTable, MAX_UNIT_ENTRIES, MIN_UNIT_ENTRY};
