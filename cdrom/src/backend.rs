//! The container-format-agnostic interface the driver crate builds on.
//!
//! Only one implementation ships in this crate (bin/cue), but keeping the
//! boundary as a trait means `cdrom-driver` never has to know whether the
//! bytes it's reading came from a `.bin`/`.cue` pair or something else.

use crate::cue::{CueSheet, Track};
use crate::error::CdRomResult;
use crate::msf::Frames;

/// A mounted disc image capable of producing cooked sector data and a
/// table of contents.
pub trait DiscBackend {
    /// The cue sheet (track layout) for this disc.
    fn cue(&self) -> &CueSheet;

    /// Reads `buf.len()` cooked bytes starting at absolute cooked byte
    /// offset `offset`, returning the number of bytes actually read.
    fn read_cooked(&mut self, offset: u64, buf: &mut [u8]) -> CdRomResult<usize>;

    /// Reads `buf.len()` raw bytes starting at absolute raw byte offset
    /// `offset`, with no cooked/header translation. Audio playback uses
    /// this instead of `read_cooked`, matching the original's direct
    /// `lseek`+`read` for CD-DA sectors.
    fn read_raw(&mut self, offset: u64, buf: &mut [u8]) -> CdRomResult<usize>;

    /// The track containing `position`, if any.
    fn track_at(&self, position: Frames) -> Option<&Track> {
        self.cue().track_at(position)
    }

    /// Total disc length in frames.
    fn length(&self) -> Frames {
        self.cue().length
    }
}

/// A bin/cue disc image: one `.bin` data file described by a `.cue` sheet.
pub struct CdRom {
    cue: CueSheet,
    bin_file: std::fs::File,
}

impl CdRom {
    pub fn open(cue_path: &std::path::Path) -> CdRomResult<CdRom> {
        let cue = crate::cue::open(cue_path)?;
        let bin_file = std::fs::File::open(&cue.binfile).map_err(|source| {
            crate::error::CdRomError::OpenBinFile {
                path: cue.binfile.clone(),
                source,
            }
        })?;
        Ok(CdRom { cue, bin_file })
    }
}

impl DiscBackend for CdRom {
    fn cue(&self) -> &CueSheet {
        &self.cue
    }

    fn read_cooked(&mut self, offset: u64, buf: &mut [u8]) -> CdRomResult<usize> {
        crate::sector::read_cooked(&mut self.bin_file, &self.cue, offset, buf)
    }

    fn read_raw(&mut self, offset: u64, buf: &mut [u8]) -> CdRomResult<usize> {
        crate::sector::read_raw(&mut self.bin_file, offset, buf)
    }
}
