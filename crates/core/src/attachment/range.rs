//! `Content-Range` parsing for chunk requests.

use std::fmt;
use std::str::FromStr;

use super::error::UploadError;

/// Inclusive byte range `[start, end]` of a `total`-byte upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    /// First byte offset.
    pub start: u64,
    /// Last byte offset, inclusive.
    pub end: u64,
    /// Total upload size.
    pub total: u64,
}

impl ContentRange {
    /// Number of bytes the range covers.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges are never empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Whether the range ends at the final byte of the upload.
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.end + 1 == self.total
    }
}

impl FromStr for ContentRange {
    type Err = UploadError;

    /// Parse `bytes START-END/TOTAL` with `START <= END < TOTAL`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let spec = s
            .trim()
            .strip_prefix("bytes")
            .ok_or(UploadError::InvalidContentRange)?
            .trim_start();
        let (range, total) = spec
            .split_once('/')
            .ok_or(UploadError::InvalidContentRange)?;
        let (start, end) = range
            .split_once('-')
            .ok_or(UploadError::InvalidContentRange)?;

        let start = parse_offset(start)?;
        let end = parse_offset(end)?;
        let total = parse_offset(total)?;

        if start > end || end >= total {
            return Err(UploadError::InvalidContentRange);
        }

        Ok(Self { start, end, total })
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.start, self.end, self.total)
    }
}

fn parse_offset(s: &str) -> Result<u64, UploadError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UploadError::InvalidContentRange);
    }
    s.parse().map_err(|_| UploadError::InvalidContentRange)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Any well-ordered range survives display and parse unchanged.
        #[test]
        fn prop_display_parse(start in 0u64..1_000_000, len in 1u64..1_000_000, tail in 0u64..1_000_000) {
            let range = ContentRange { start, end: start + len - 1, total: start + len + tail };
            let parsed: ContentRange = range.to_string().parse().expect("valid");
            prop_assert_eq!(parsed, range);
            prop_assert_eq!(parsed.len(), len);
            prop_assert_eq!(parsed.is_last(), tail == 0);
        }

        // Arbitrary input never panics and only yields ordered ranges.
        #[test]
        fn prop_parse_never_panics(input in ".*") {
            if let Ok(range) = input.parse::<ContentRange>() {
                prop_assert!(range.start <= range.end);
                prop_assert!(range.end < range.total);
            }
        }
    }
}
