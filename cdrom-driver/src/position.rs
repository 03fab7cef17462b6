//! Position-type decoding: the guest addresses a playback position one of
//! three ways, and every audio/TOC command goes through this decoder.
//! Matches `position2msf` in the original driver.

use cdrom::bcd::BCD2BIN;
use cdrom::msf::{Frames, Msf};

const RECORD_LEN: usize = 8;
const HEADER_LEN: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PosType {
    /// postype 0: `pos` is an absolute frame count.
    AbsoluteFrame,
    /// postype 1: `pos` packs three BCD bytes as `(m << 16) | (s << 8) | f`.
    BcdMsf,
    /// postype 2: the low byte of `pos`, in BCD, names a track number.
    TrackNumber,
}

/// Decodes `(pos, postype)` into an MSF, consulting `base_toc` (as built
/// by [`crate::toc::build_base_toc`]) for postype 2. `stopping` advances
/// the track number by one before lookup, since a "stop at" address
/// names the start of the *next* track rather than the current one.
pub fn position2msf(base_toc: &[u8], base_len: usize, pos: u32, postype: PosType, stopping: bool) -> Option<Msf> {
    match postype {
        PosType::AbsoluteFrame => Some(Msf::from_frames(Frames(pos))),
        PosType::BcdMsf => {
            let m = BCD2BIN[((pos >> 16) & 0xff) as usize];
            let s = BCD2BIN[((pos >> 8) & 0xff) as usize];
            let f = BCD2BIN[(pos & 0xff) as usize];
            if m == 0xff || s == 0xff || f == 0xff {
                return None;
            }
            Msf::new(m, s, f)
        }
        PosType::TrackNumber => {
            let raw_track = BCD2BIN[(pos & 0xff) as usize];
            if raw_track == 0xff {
                return None;
            }
            let target = if stopping { raw_track.wrapping_add(1) } else { raw_track };

            let mut offset = HEADER_LEN;
            while offset + RECORD_LEN <= base_len {
                let tracknum = base_toc[offset + 2];
                if tracknum == target || tracknum == 0xaa {
                    return Msf::new(
                        base_toc[offset + 5],
                        base_toc[offset + 6],
                        base_toc[offset + 7],
                    );
                }
                offset += RECORD_LEN;
            }
            // Walked off the end without finding the track or the
            // lead-out sentinel: fall back to the lead-out entry (the
            // last record in the base TOC), matching the original's
            // "return the lead-out" behavior.
            if base_len >= HEADER_LEN + RECORD_LEN {
                let last = base_len - RECORD_LEN;
                return Msf::new(base_toc[last + 5], base_toc[last + 6], base_toc[last + 7]);
            }
            None
        }
    }
}
