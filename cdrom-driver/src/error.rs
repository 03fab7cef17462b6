//! Guest-facing status codes and driver-internal errors.
//!
//! The dispatcher never panics and never propagates a Rust `Result` to the
//! guest: every Device Manager entry point returns one of these `OSErr`
//! values, exactly as the original driver does. [`DriverError`] exists
//! only for failures that happen before a drive is registered (e.g.
//! failing to open a disc image from the host side), which the embedding
//! application surfaces however it likes.

use thiserror::Error;

/// Classic Mac OS `OSErr` values this driver can return. Named per the
/// Device Manager convention rather than spec-internal shorthand.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(i16)]
pub enum DriverStatus {
    NoErr = 0,
    NsDrvErr = -1305,
    OffLinErr = -1302,
    ParamErr = -50,
    WritErr = -20,
    WPrErr = -44,
    ReadErr = -19,
    ControlErr = -17,
    StatusErr = -18,
    IoErr = -36,
}

impl DriverStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, DriverStatus::NoErr)
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("disc image error: {0}")]
    Disc(#[from] cdrom::CdRomError),

    #[error("no free drive number available")]
    NoFreeDriveNumber,

    #[error("unit table is full (127 entries)")]
    UnitTableFull,
}
