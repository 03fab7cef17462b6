use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while parsing a cue sheet or reading sectors out of the
/// disc image it describes.
#[derive(Debug, Error)]
pub enum CdRomError {
    #[error("{path}:{line}: {desc}")]
    ParseError {
        path: PathBuf,
        line: u32,
        desc: String,
    },

    #[error("failed to open bin file {path}: {source}")]
    OpenBinFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error reading sector: {0}")]
    Io(#[from] io::Error),

    #[error("no track contains sector {0}")]
    NoSuchTrack(u32),

    #[error("track number {0} is out of range")]
    InvalidTrackNumber(u8),
}

pub type CdRomResult<T> = Result<T, CdRomError>;
