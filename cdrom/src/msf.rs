//! Minute:second:frame timecodes.
//!
//! There are 75 frames (sectors) per second and 60 seconds per minute.
//! Internally this crate works in binary frame counts (`Frames`); BCD
//! packing only happens at the boundary with cue sheets and the guest
//! device driver, via [`crate::bcd`].

use std::{cmp, fmt, ops};

/// Frames per second of CD audio/data.
pub const FRAMES_PER_SECOND: u32 = 75;
const SECONDS_PER_MINUTE: u32 = 60;
const FRAMES_PER_MINUTE: u32 = FRAMES_PER_SECOND * SECONDS_PER_MINUTE;

/// An absolute or relative position expressed as a binary frame count.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Frames(pub u32);

impl Frames {
    pub fn to_msf(self) -> Msf {
        Msf::from_frames(self)
    }
}

impl ops::Add for Frames {
    type Output = Frames;
    fn add(self, rhs: Frames) -> Frames {
        Frames(self.0 + rhs.0)
    }
}

impl ops::Sub for Frames {
    type Output = Frames;
    fn sub(self, rhs: Frames) -> Frames {
        Frames(self.0 - rhs.0)
    }
}

/// A decoded minute/second/frame timecode (binary, not BCD).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Msf {
    pub minute: u8,
    pub second: u8,
    pub frame: u8,
}

impl Msf {
    pub fn new(minute: u8, second: u8, frame: u8) -> Option<Msf> {
        if second < 60 && frame < FRAMES_PER_SECOND as u8 {
            Some(Msf { minute, second, frame })
        } else {
            None
        }
    }

    pub fn zero() -> Msf {
        Msf { minute: 0, second: 0, frame: 0 }
    }

    /// Matches `FramesToMSF` in the original bin/cue reader exactly.
    pub fn from_frames(frames: Frames) -> Msf {
        let total = frames.0;
        let minute = total / FRAMES_PER_MINUTE;
        let rem = total % FRAMES_PER_MINUTE;
        let second = rem / FRAMES_PER_SECOND;
        let frame = rem % FRAMES_PER_SECOND;
        Msf {
            minute: minute as u8,
            second: second as u8,
            frame: frame as u8,
        }
    }

    /// Matches `MSFToFrames` in the original bin/cue reader exactly.
    pub fn to_frames(self) -> Frames {
        Frames(
            self.minute as u32 * FRAMES_PER_MINUTE
                + self.second as u32 * FRAMES_PER_SECOND
                + self.frame as u32,
        )
    }
}

impl fmt::Display for Msf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.minute, self.second, self.frame)
    }
}

impl cmp::PartialOrd for Msf {
    fn partial_cmp(&self, other: &Msf) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl cmp::Ord for Msf {
    fn cmp(&self, other: &Msf) -> cmp::Ordering {
        self.to_frames().0.cmp(&other.to_frames().0)
    }
}
