//! End-to-end cue-parsing/cooked-read scenarios, each grounded on a
//! specific literal input rather than a property check.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use cdrom::backend::DiscBackend;
use cdrom::cue::{parse, TrackMode};
use cdrom::CdRom;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_zeroed_bin(path: &Path, frames: u32, sector_size: u32) {
    let mut f = fs::File::create(path).unwrap();
    let buf = vec![0u8; (frames as u64 * sector_size as u64) as usize];
    f.write_all(&buf).unwrap();
}

/// Two-track audio cue, track 2 carrying a two-second pregap.
#[test]
fn two_track_audio_cue_start_and_length() {
    let dir = scratch_dir("cdrom_scenario_two_track_audio");
    let bin_path = dir.join("x.bin");
    // (3*60+2) seconds * 75 frames/sec of raw audio data.
    let file_frames = (3 * 60 + 2) * 75;
    write_zeroed_bin(&bin_path, file_frames, 2352);

    let cue_text = concat!(
        "FILE \"x.bin\" BINARY\n",
        "TRACK 01 AUDIO\n",
        "INDEX 01 00:00:00\n",
        "TRACK 02 AUDIO\n",
        "PREGAP 00:02:00\n",
        "INDEX 01 03:00:00\n",
    );
    let cue = parse(cue_text, Path::new("x.cue"), &dir).unwrap();

    assert_eq!(cue.tracks.len(), 2);
    assert_eq!(cue.tracks[0].start.0, 0);
    assert_eq!(cue.tracks[0].length.0, 13350);
    assert_eq!(cue.tracks[1].pregap.0, 150);
    assert_eq!(cue.tracks[1].start.0, 13500);

    let total_pregap_after_track2 = 150;
    assert_eq!(
        cue.tracks[1].length.0,
        file_frames - cue.tracks[1].start.0 + total_pregap_after_track2
    );
}

/// A data track followed by an audio track: sector geometry is sheet-wide
/// (set by the first data track), and a cooked read of the data track's
/// first sector skips its 16-byte header.
#[test]
fn mixed_mode_cue_cooked_read_skips_header() {
    let dir = scratch_dir("cdrom_scenario_mixed_mode");
    let bin_path = dir.join("x.bin");

    let sector_count = 4u32;
    let mut raw = Vec::new();
    for s in 0..sector_count {
        let mut sector = vec![0u8; 2352];
        // Fill the payload (past the 16-byte header) with a distinct value.
        for b in sector[16..].iter_mut() {
            *b = (s + 1) as u8;
        }
        raw.append(&mut sector);
    }
    fs::File::create(&bin_path).unwrap().write_all(&raw).unwrap();

    let cue_text = concat!(
        "FILE \"x.bin\" BINARY\n",
        "TRACK 01 MODE1/2352\n",
        "INDEX 01 00:00:00\n",
        "TRACK 02 AUDIO\n",
        "INDEX 01 00:00:02\n",
    );
    let cue = parse(cue_text, Path::new("x.cue"), &dir).unwrap();
    assert_eq!(cue.tracks[0].mode, TrackMode::Mode1);
    assert_eq!(cue.raw_sector_size, 2352);
    assert_eq!(cue.cooked_sector_size, 2048);
    assert_eq!(cue.header_size, 16);

    let cue_path = dir.join("x.cue");
    fs::File::create(&cue_path).unwrap().write_all(cue_text.as_bytes()).unwrap();
    let mut backend = CdRom::open(&cue_path).unwrap();

    let mut out = vec![0u8; 2048];
    let n = backend.read_cooked(0, &mut out).unwrap();
    assert_eq!(n, 2048);
    assert_eq!(out, raw[16..16 + 2048]);
}
