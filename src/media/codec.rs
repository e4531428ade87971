// SPDX-License-Identifier: GPL-3.0-only

//! Codec identities and the candidate table for output selection

use std::fmt;
use std::str::FromStr;

/// Four-character codec tag requested from an encoder backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fourcc(pub [u8; 4]);

impl Fourcc {
    pub const fn new(tag: &[u8; 4]) -> Self {
        Self(*tag)
    }

    /// Printable form of the tag
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("????")
    }
}

impl fmt::Display for Fourcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Fourcc {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            return Err(format!("fourcc '{}' must be exactly 4 characters", s));
        }
        Ok(Fourcc([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// One entry in the codec candidate table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecCandidate {
    /// Display name shown to the user
    pub name: &'static str,
    /// Codec tag passed to the encoder backend
    pub fourcc: Fourcc,
    /// Container extension for the output file
    pub extension: &'static str,
}

/// Codec candidates in fallback order
///
/// Selection starts with the user-preferred candidate and then walks the
/// rest of this table in order, accepting the first one whose encoder opens.
pub const CODEC_CANDIDATES: [CodecCandidate; 5] = [
    CodecCandidate {
        name: "H.264 (.mp4)",
        fourcc: Fourcc::new(b"avc1"),
        extension: "mp4",
    },
    CodecCandidate {
        name: "MPEG-4 (.mp4)",
        fourcc: Fourcc::new(b"mp4v"),
        extension: "mp4",
    },
    CodecCandidate {
        name: "X264 (.mp4)",
        fourcc: Fourcc::new(b"X264"),
        extension: "mp4",
    },
    CodecCandidate {
        name: "MJPG (.avi)",
        fourcc: Fourcc::new(b"MJPG"),
        extension: "avi",
    },
    CodecCandidate {
        name: "XVID (.avi)",
        fourcc: Fourcc::new(b"XVID"),
        extension: "avi",
    },
];

/// Look up a candidate by codec tag
pub fn find_candidate(fourcc: Fourcc) -> Option<&'static CodecCandidate> {
    CODEC_CANDIDATES.iter().find(|c| c.fourcc == fourcc)
}

/// Candidates ordered with the preferred one first, the rest keeping their
/// configured fallback order. An unknown preference degrades to the plain
/// table order.
pub fn ordered_candidates(preferred: Fourcc) -> Vec<CodecCandidate> {
    let mut ordered: Vec<CodecCandidate> = Vec::with_capacity(CODEC_CANDIDATES.len());
    if let Some(first) = find_candidate(preferred) {
        ordered.push(*first);
    }
    ordered.extend(CODEC_CANDIDATES.iter().filter(|c| c.fourcc != preferred));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_parse_and_display() {
        let tag: Fourcc = "MJPG".parse().unwrap();
        assert_eq!(tag, Fourcc::new(b"MJPG"));
        assert_eq!(tag.to_string(), "MJPG");
        assert!("MJPEG".parse::<Fourcc>().is_err());
    }

    #[test]
    fn ordered_puts_preference_first_without_duplicates() {
        let ordered = ordered_candidates(Fourcc::new(b"MJPG"));
        assert_eq!(ordered.len(), CODEC_CANDIDATES.len());
        assert_eq!(ordered[0].fourcc, Fourcc::new(b"MJPG"));
        let mjpg_count = ordered
            .iter()
            .filter(|c| c.fourcc == Fourcc::new(b"MJPG"))
            .count();
        assert_eq!(mjpg_count, 1);
    }

    #[test]
    fn unknown_preference_degrades_to_table_order() {
        let ordered = ordered_candidates(Fourcc::new(b"ZZZZ"));
        assert_eq!(ordered.len(), CODEC_CANDIDATES.len());
        assert_eq!(ordered[0].fourcc, CODEC_CANDIDATES[0].fourcc);
    }
}
