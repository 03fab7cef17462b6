//! Cooked-sector reads out of a bin/cue image.
//!
//! Mirrors `read_bincue` in the original reader: a "cooked" read strips
//! the sync pattern/header/EDC wrapper a raw sector carries and returns
//! only the payload bytes, translating a cooked byte offset into the
//! underlying raw sector stream one sector at a time so that a read can
//! span a partial sector at either end.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crc::{Crc, CRC_32_CD_ROM_EDC};

use crate::cue::CueSheet;
use crate::error::CdRomResult;

/// CRC-32 used to validate the EDC field of MODE1/MODE2-Form1 sectors.
static CD_ROM_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_CD_ROM_EDC);

/// Reads `buf.len()` cooked bytes starting at cooked byte `offset` from
/// `bin_file`/`cue`, returning the number of bytes actually read (less
/// than `buf.len()` only at end of file).
pub fn read_cooked(
    bin_file: &mut File,
    cue: &CueSheet,
    offset: u64,
    buf: &mut [u8],
) -> CdRomResult<usize> {
    let cooked = cue.cooked_sector_size as u64;
    let raw = cue.raw_sector_size as u64;
    let header = cue.header_size as u64;

    let mut bytes_read = 0usize;
    let mut offset = offset;
    let mut remaining = buf.len();
    let mut raw_sector = vec![0u8; cue.raw_sector_size as usize];

    while remaining > 0 {
        let sector_index = offset / cooked;
        let sector_offset = (offset % cooked) as usize;
        let raw_byte_offset = sector_index * raw;

        bin_file.seek(SeekFrom::Start(raw_byte_offset))?;
        let got = read_best_effort(bin_file, &mut raw_sector)?;
        if got == 0 {
            break;
        }

        let available_in_sector = if (got as u64) < raw {
            // Short read at EOF: only the bytes actually on disk past the
            // header are real payload.
            got.saturating_sub(header as usize + sector_offset)
        } else {
            (cooked as usize).saturating_sub(sector_offset)
        };
        let to_copy = available_in_sector.min(remaining);
        if to_copy == 0 {
            break;
        }

        let src_start = header as usize + sector_offset;
        buf[bytes_read..bytes_read + to_copy]
            .copy_from_slice(&raw_sector[src_start..src_start + to_copy]);

        bytes_read += to_copy;
        offset += to_copy as u64;
        remaining -= to_copy;

        if (got as u64) < raw {
            break;
        }
    }

    Ok(bytes_read)
}

/// Reads `buf.len()` raw bytes starting at absolute raw byte `offset`,
/// with no cooked/header translation. Used for audio sector playback,
/// which the original reads with a plain `lseek`+`read` regardless of
/// whatever data track precedes it on a mixed-mode disc.
pub fn read_raw(bin_file: &mut File, offset: u64, buf: &mut [u8]) -> CdRomResult<usize> {
    bin_file.seek(SeekFrom::Start(offset))?;
    Ok(read_best_effort(bin_file, buf)?)
}

fn read_best_effort(f: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    loop {
        match f.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                if total == buf.len() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

/// Validates the EDC (error detection code) field of a MODE1 sector. Only
/// MODE1 is checked, matching the scope of the original's `validate_edc`
/// for the common case; MODE2 Form 2 sectors have no reliable EDC.
pub fn validate_mode1_edc(raw_sector: &[u8; 2352]) -> bool {
    if raw_sector.len() < 2072 {
        return false;
    }
    let digest = CD_ROM_CRC.checksum(&raw_sector[0..2064]);
    let stored = u32::from_le_bytes(raw_sector[2064..2068].try_into().unwrap());
    digest == stored
}
