//! Cue sheet parsing.
//!
//! Implements the same subset of the CDRWIN `.cue` grammar the original
//! bin/cue reader understood: `FILE`, `TRACK`, `INDEX`, `PREGAP`,
//! `POSTGAP`, `FLAGS`, and a handful of metadata commands (`TITLE`,
//! `PERFORMER`, `SONGWRITER`, `ISRC`, `REM`) that are recognized but
//! discarded. Unlike the original C++ parser, which kept `totalPregap`/
//! `prestart` as file-scope globals, all of that bookkeeping lives in a
//! [`ParserState`] local to one `parse` call.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CdRomError, CdRomResult};
use crate::msf::{Frames, Msf};

/// Track control field bits, matching the Q subchannel control nibble.
pub mod tcf {
    pub const AUDIO: u8 = 0x0;
    pub const PREMPHASIS: u8 = 0x1;
    pub const COPY: u8 = 0x2;
    pub const DATA: u8 = 0x4;
    pub const FOURTRACK: u8 = 0x8;
}

/// The sector format of a track, determining raw/cooked sector sizes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrackMode {
    Audio,
    Mode1,
    Mode2,
}

impl TrackMode {
    fn from_keyword(kw: &str) -> Option<TrackMode> {
        match kw {
            "AUDIO" => Some(TrackMode::Audio),
            "MODE1/2352" | "MODE1/2048" => Some(TrackMode::Mode1),
            "MODE2/2352" | "MODE2/2336" => Some(TrackMode::Mode2),
            _ => None,
        }
    }

    /// `(raw_sector_size, cooked_sector_size, header_size)`.
    fn sizes(self, keyword: &str) -> (u32, u32, u32) {
        match (self, keyword) {
            (TrackMode::Audio, _) => (2352, 2352, 0),
            (TrackMode::Mode1, "MODE1/2048") => (2048, 2048, 0),
            (TrackMode::Mode1, _) => (2352, 2048, 16),
            (TrackMode::Mode2, _) => (2352, 2336, 16),
        }
    }

    pub fn is_data(self) -> bool {
        !matches!(self, TrackMode::Audio)
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub number: u8,
    pub start: Frames,
    pub length: Frames,
    pub fileoffset: u64,
    pub pregap: Frames,
    pub postgap: Frames,
    pub tcf: u8,
    pub mode: TrackMode,
}

impl Track {
    pub fn end(&self) -> Frames {
        Frames(self.start.0 + self.length.0)
    }

    pub fn contains(&self, position: Frames) -> bool {
        position.0 >= self.start.0 && position.0 < self.start.0 + self.length.0
    }
}

#[derive(Debug, Clone)]
pub struct CueSheet {
    pub binfile: PathBuf,
    pub length: Frames,
    pub tracks: Vec<Track>,
    pub raw_sector_size: u32,
    pub cooked_sector_size: u32,
    pub header_size: u32,
}

impl CueSheet {
    /// Finds the track whose range contains `position`, if any.
    pub fn track_at(&self, position: Frames) -> Option<&Track> {
        self.tracks.iter().find(|t| t.contains(position))
    }

    pub fn track(&self, number: u8) -> Option<&Track> {
        self.tracks.iter().find(|t| t.number == number)
    }

    pub fn first_track_number(&self) -> u8 {
        self.tracks.first().map_or(1, |t| t.number)
    }

    pub fn last_track_number(&self) -> u8 {
        self.tracks.last().map_or(1, |t| t.number)
    }
}

/// Parser bookkeeping that the original kept as file-scope statics.
#[derive(Default)]
struct ParserState {
    total_pregap: u32,
    prestart: Option<u32>,
    pending_pregap: Frames,
    pending_postgap: Frames,
    pending_flags: u8,
    seen_index01: bool,
}

impl Default for Frames {
    fn default() -> Self {
        Frames(0)
    }
}

struct Parser<'a> {
    path: &'a Path,
    base_dir: &'a Path,
    state: ParserState,
    binfile: Option<PathBuf>,
    raw_sector_size: u32,
    cooked_sector_size: u32,
    header_size: u32,
    tracks: Vec<Track>,
}

/// Parse a cue sheet's text. `path` is used only for error messages;
/// `base_dir` resolves the `FILE` line's relative path.
pub fn parse(text: &str, path: &Path, base_dir: &Path) -> CdRomResult<CueSheet> {
    let mut parser = Parser {
        path,
        base_dir,
        state: ParserState::default(),
        binfile: None,
        raw_sector_size: 2352,
        cooked_sector_size: 2352,
        header_size: 0,
        tracks: Vec::new(),
    };

    let mut seen_any_line = false;
    for (line_no, raw_line) in text.lines().enumerate() {
        let line_no = line_no as u32 + 1;
        let trimmed = raw_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !seen_any_line {
            if !trimmed.starts_with("FILE") {
                return Err(parser.error(line_no, "cue sheet must begin with a FILE line"));
            }
            seen_any_line = true;
        }
        parser.handle_line(line_no, trimmed)?;
    }

    parser.finish(line_count(text))
}

fn line_count(text: &str) -> u32 {
    text.lines().count() as u32
}

fn tokenize(line: &str) -> Vec<String> {
    // Quoted strings (used by FILE and the metadata commands) are kept as
    // a single token; everything else is whitespace separated, matching
    // the original's `strtok` based tokenizer.
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut current = String::new();
    let mut in_quotes = false;
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

impl<'a> Parser<'a> {
    fn error(&self, line: u32, desc: impl Into<String>) -> CdRomError {
        CdRomError::ParseError {
            path: self.path.to_path_buf(),
            line,
            desc: desc.into(),
        }
    }

    fn handle_line(&mut self, line_no: u32, line: &str) -> CdRomResult<()> {
        let tokens = tokenize(line);
        let Some(keyword) = tokens.first() else {
            return Ok(());
        };
        match keyword.as_str() {
            "FILE" => self.handle_file(line_no, &tokens),
            "TRACK" => self.handle_track(line_no, &tokens),
            "INDEX" => self.handle_index(line_no, &tokens),
            "PREGAP" => self.handle_pregap(line_no, &tokens),
            "POSTGAP" => self.handle_postgap(line_no, &tokens),
            "FLAGS" => self.handle_flags(&tokens),
            "TITLE" | "PERFORMER" | "SONGWRITER" | "ISRC" | "REM" | "CATALOG" => Ok(()),
            other => {
                log::warn!("{}:{}: ignoring unrecognized cue command {other}", self.path.display(), line_no);
                Ok(())
            }
        }
    }

    fn handle_file(&mut self, line_no: u32, tokens: &[String]) -> CdRomResult<()> {
        let name = tokens
            .get(1)
            .ok_or_else(|| self.error(line_no, "FILE requires a filename"))?;
        self.binfile = Some(self.base_dir.join(name));
        Ok(())
    }

    fn handle_track(&mut self, line_no: u32, tokens: &[String]) -> CdRomResult<()> {
        let number: u8 = tokens
            .get(1)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error(line_no, "TRACK requires a track number"))?;
        let mode_kw = tokens
            .get(2)
            .ok_or_else(|| self.error(line_no, "TRACK requires a mode"))?;
        let mode = TrackMode::from_keyword(mode_kw)
            .ok_or_else(|| self.error(line_no, format!("unknown track mode {mode_kw}")))?;

        // AUDIO tracks don't carry their own sector geometry; only a data
        // track's MODEn/xxxx keyword updates the sheet-wide raw/cooked/
        // header sizes, matching the original parser exactly.
        if mode.is_data() {
            let (raw, cooked, header) = mode.sizes(mode_kw);
            self.raw_sector_size = raw;
            self.cooked_sector_size = cooked;
            self.header_size = header;
        }

        let tcf = if mode.is_data() { tcf::DATA } else { tcf::AUDIO } | self.state.pending_flags;
        self.state.pending_flags = 0;
        self.state.seen_index01 = false;

        self.tracks.push(Track {
            number,
            start: Frames(0),
            length: Frames(0),
            fileoffset: 0,
            pregap: std::mem::take(&mut self.state.pending_pregap),
            postgap: std::mem::take(&mut self.state.pending_postgap),
            tcf,
            mode,
        });
        Ok(())
    }

    fn handle_index(&mut self, line_no: u32, tokens: &[String]) -> CdRomResult<()> {
        let index: u8 = tokens
            .get(1)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error(line_no, "INDEX requires an index number"))?;
        let msf = self.parse_msf(line_no, tokens.get(2))?;
        let frames = msf.to_frames().0;

        match index {
            0 => {
                self.state.prestart = Some(frames);
                Ok(())
            }
            1 => {
                if self.state.seen_index01 {
                    return Err(self.error(line_no, "duplicate INDEX 01 for this track"));
                }
                self.state.seen_index01 = true;
                self.add_track(line_no, frames)
            }
            _ => Ok(()),
        }
    }

    fn handle_pregap(&mut self, line_no: u32, tokens: &[String]) -> CdRomResult<()> {
        let msf = self.parse_msf(line_no, tokens.get(1))?;
        if let Some(track) = self.tracks.last_mut() {
            track.pregap = Frames(msf.to_frames().0);
        } else {
            self.state.pending_pregap = Frames(msf.to_frames().0);
        }
        Ok(())
    }

    fn handle_postgap(&mut self, line_no: u32, tokens: &[String]) -> CdRomResult<()> {
        let msf = self.parse_msf(line_no, tokens.get(1))?;
        if let Some(track) = self.tracks.last_mut() {
            track.postgap = Frames(msf.to_frames().0);
        } else {
            self.state.pending_postgap = Frames(msf.to_frames().0);
        }
        Ok(())
    }

    fn handle_flags(&mut self, tokens: &[String]) -> CdRomResult<()> {
        let mut bits = 0u8;
        for flag in &tokens[1..] {
            bits |= match flag.as_str() {
                "DCP" => tcf::COPY,
                "4CH" => tcf::FOURTRACK,
                "PRE" => tcf::PREMPHASIS,
                _ => 0,
            };
        }
        if let Some(track) = self.tracks.last_mut() {
            track.tcf |= bits;
        } else {
            self.state.pending_flags |= bits;
        }
        Ok(())
    }

    fn parse_msf(&self, line_no: u32, token: Option<&String>) -> CdRomResult<Msf> {
        let token = token.ok_or_else(|| self.error(line_no, "missing MM:SS:FF field"))?;
        let mut parts = token.splitn(3, ':');
        let (Some(m), Some(s), Some(f)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(self.error(line_no, format!("malformed MM:SS:FF field {token}")));
        };
        let (m, s, f) = (
            m.parse::<u8>().ok(),
            s.parse::<u8>().ok(),
            f.parse::<u8>().ok(),
        );
        let (Some(m), Some(s), Some(f)) = (m, s, f) else {
            return Err(self.error(line_no, format!("malformed MM:SS:FF field {token}")));
        };
        Msf::new(m, s, f).ok_or_else(|| self.error(line_no, format!("MM:SS:FF field {token} out of range")))
    }

    /// Equivalent of `AddTrack` in the original: promotes the current
    /// track's start by the accumulated pregap, then back-patches the
    /// previous track's length now that its end is known.
    ///
    /// A preceding `INDEX 00` line (`skip`) names a pregap-start frame
    /// that must fall at or before this track's `INDEX 01`; when present
    /// it is what bounds the *previous* track's length instead of this
    /// track's (patched) start, matching the original's `skip`-vs-`start`
    /// branch exactly.
    fn add_track(&mut self, line_no: u32, index01_frames: u32) -> CdRomResult<()> {
        let skip = self.state.prestart.take();
        if let Some(skip) = skip {
            if skip > index01_frames {
                return Err(self.error(line_no, "INDEX 00 prestart is after INDEX 01"));
            }
        }

        let raw_sector_size = self.raw_sector_size;
        let track_count = self.tracks.len();
        let Some(curr) = self.tracks.last_mut() else {
            return Err(self.error(line_no, "INDEX seen before any TRACK"));
        };

        curr.fileoffset = index01_frames as u64 * raw_sector_size as u64;
        curr.start = Frames(index01_frames + self.state.total_pregap);
        self.state.total_pregap += curr.pregap.0;
        let curr_pregap = curr.pregap.0;
        let curr_start = curr.start.0;
        let curr_number = curr.number;

        if track_count == 1 {
            if curr_number != 1 {
                return Err(self.error(line_no, "first track must be track number 1"));
            }
        } else {
            let prev_idx = track_count - 2;
            let (prev_number, prev_start) = {
                let prev = &self.tracks[prev_idx];
                (prev.number, prev.start.0)
            };
            if curr_number != prev_number + 1 && curr_number != 0xaa {
                return Err(self.error(line_no, "track numbers must be consecutive"));
            }
            if curr_start < prev_start + curr_pregap {
                return Err(self.error(line_no, "track overlaps the previous track"));
            }
            let prev = &mut self.tracks[prev_idx];
            prev.length = match skip {
                Some(skip) if prev_start < skip => Frames(skip - prev_start - curr_pregap),
                _ => Frames(curr_start - prev_start - curr_pregap),
            };
        }
        Ok(())
    }

    fn finish(mut self, _line_count: u32) -> CdRomResult<CueSheet> {
        let binfile = self
            .binfile
            .ok_or_else(|| self.error(0, "cue sheet has no FILE line"))?;
        if self.tracks.is_empty() {
            return Err(self.error(0, "cue sheet defines no tracks"));
        }

        let metadata = fs::metadata(&binfile).map_err(|source| CdRomError::OpenBinFile {
            path: binfile.clone(),
            source,
        })?;
        let file_len_frames = (metadata.len() / self.raw_sector_size as u64) as u32;

        let total_pregap = self.state.total_pregap;
        let last = self.tracks.last_mut().unwrap();
        last.length = Frames(file_len_frames.wrapping_sub(last.start.0).wrapping_add(total_pregap));

        let total_length = self
            .tracks
            .last()
            .map(|t| t.end())
            .unwrap_or(Frames(0));

        Ok(CueSheet {
            binfile,
            length: total_length,
            tracks: self.tracks,
            raw_sector_size: self.raw_sector_size,
            cooked_sector_size: self.cooked_sector_size,
            header_size: self.header_size,
        })
    }
}

/// Load and parse a cue sheet from disk.
pub fn open(cue_path: &Path) -> CdRomResult<CueSheet> {
    let text = fs::read_to_string(cue_path).map_err(|source| CdRomError::OpenBinFile {
        path: cue_path.to_path_buf(),
        source,
    })?;
    let base_dir = cue_path.parent().unwrap_or_else(|| Path::new("."));
    parse(&text, cue_path, base_dir)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    fn write_bin(dir: &Path, name: &str, sectors: u32, sector_size: u32) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        let buf = vec![0u8; (sectors * sector_size) as usize];
        f.write_all(&buf).unwrap();
        path
    }

    #[test]
    fn single_data_track() {
        let dir = std::env::temp_dir().join("cdrom_test_single_data_track");
        fs::create_dir_all(&dir).unwrap();
        write_bin(&dir, "disc.bin", 10, 2048);
        let cue_text = "FILE \"disc.bin\" BINARY\n  TRACK 01 MODE1/2048\n    INDEX 01 00:00:00\n";
        let cue = parse(cue_text, Path::new("disc.cue"), &dir).unwrap();
        assert_eq!(cue.tracks.len(), 1);
        assert_eq!(cue.tracks[0].number, 1);
        assert_eq!(cue.tracks[0].start.0, 0);
        assert_eq!(cue.tracks[0].length.0, 10);
        assert_eq!(cue.raw_sector_size, 2048);
    }

    #[test]
    fn two_tracks_with_pregap() {
        let dir = std::env::temp_dir().join("cdrom_test_two_tracks_pregap");
        fs::create_dir_all(&dir).unwrap();
        write_bin(&dir, "disc.bin", 20, 2352);
        let cue_text = concat!(
            "FILE \"disc.bin\" BINARY\n",
            "  TRACK 01 AUDIO\n",
            "    INDEX 01 00:00:00\n",
            "  TRACK 02 AUDIO\n",
            "    PREGAP 00:02:00\n",
            "    INDEX 01 00:10:00\n",
        );
        let cue = parse(cue_text, Path::new("disc.cue"), &dir).unwrap();
        assert_eq!(cue.tracks.len(), 2);
        // Track 2's pregap (150 frames) is folded into track 1's length.
        let track1 = &cue.tracks[0];
        let track2 = &cue.tracks[1];
        assert_eq!(track2.pregap.0, 150);
        assert_eq!(track1.start.0, 0);
        assert_eq!(track2.start.0, 10 * 75 + 150);
        assert_eq!(track1.length.0, track2.start.0 - track1.start.0 - track2.pregap.0);
    }

    #[test]
    fn rejects_non_file_first_line() {
        let dir = std::env::temp_dir();
        let err = parse("TRACK 01 AUDIO\n", Path::new("bad.cue"), &dir);
        assert!(err.is_err());
    }

    #[test]
    fn first_track_must_be_one() {
        let dir = std::env::temp_dir().join("cdrom_test_first_track_must_be_one");
        fs::create_dir_all(&dir).unwrap();
        write_bin(&dir, "disc.bin", 5, 2048);
        let cue_text = "FILE \"disc.bin\" BINARY\n  TRACK 02 MODE1/2048\n    INDEX 01 00:00:00\n";
        let err = parse(cue_text, Path::new("disc.cue"), &dir);
        assert!(err.is_err());
    }
}
