//! Hash allocation and content-addressed naming.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::types::DraftDescriptor;
use crate::sniff;

const RADIX32_DIGITS: &[u8; 32] = b"0123456789abcdefghijklmnopqrstuv";

/// Longest extension carried into a storage key.
const MAX_EXTENSION_LEN: usize = 16;

/// Derive a candidate attachment hash from the descriptor, time and a nonce.
#[must_use]
pub fn candidate_hash(descriptor: &DraftDescriptor, now: DateTime<Utc>, nonce: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(descriptor.name.as_bytes());
    hasher.update([0u8]);
    hasher.update(descriptor.size.to_be_bytes());
    hasher.update(now.timestamp_micros().to_be_bytes());
    hasher.update(nonce.to_be_bytes());
    format!("{:x}", hasher.finalize())
}

/// Month bucket (`YYYYMM`) for a registration time.
#[must_use]
pub fn bucket_for(reg_date: DateTime<Utc>) -> String {
    reg_date.format("%Y%m").to_string()
}

/// Extension of a filename: lower-cased text after the last dot.
///
/// Returns `None` when there is no dot or the suffix is not a short
/// alphanumeric token, so it can never smuggle path syntax into a key.
#[must_use]
pub fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let valid = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.bytes().all(|b| b.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// Extension for a published file: from its name, else implied by its MIME type.
#[must_use]
pub fn resolve_extension(name: &str, mime: &str) -> String {
    extension_of(name)
        .or_else(|| sniff::extension_for(mime).map(str::to_string))
        .unwrap_or_default()
}

/// Storage key of a published file.
#[must_use]
pub fn published_key(bucket: &str, digest: &str, uniqueifier: &str, extension: &str) -> String {
    if extension.is_empty() {
        format!("{bucket}/{digest}.{uniqueifier}")
    } else {
        format!("{bucket}/{digest}.{uniqueifier}.{extension}")
    }
}

/// Encode a value in base 32 with digits `0-9a-v`.
#[must_use]
pub fn to_radix32(mut value: u64) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::with_capacity(13);
    while value > 0 {
        digits.push(RADIX32_DIGITS[(value % 32) as usize]);
        value /= 32;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// Strictly increasing microsecond stamps, rendered in base 32.
///
/// Two calls within the same microsecond still produce distinct values.
#[derive(Debug, Default)]
pub struct Uniqueifier {
    last: AtomicU64,
}

impl Uniqueifier {
    /// Create a new generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next stamp at or after `now`.
    pub fn next(&self, now: DateTime<Utc>) -> String {
        let micros = u64::try_from(now.timestamp_micros()).unwrap_or(0);
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = micros.max(last + 1);
            match self
                .last
                .compare_exchange_weak(last, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return to_radix32(candidate),
                Err(actual) => last = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).single().expect("valid date")
    }

    #[test]
    fn test_candidate_hash_depends_on_inputs() {
        let descriptor = DraftDescriptor {
            name: "a.txt".to_string(),
            size: 10,
        };
        let now = at(2026, 1, 15);

        let base = candidate_hash(&descriptor, now, 1);
        assert_eq!(base.len(), 64);
        assert_eq!(base, candidate_hash(&descriptor, now, 1));
        assert_ne!(base, candidate_hash(&descriptor, now, 2));
        assert_ne!(base, candidate_hash(&descriptor, at(2026, 1, 16), 1));

        let other = DraftDescriptor {
            name: "b.txt".to_string(),
            size: 10,
        };
        assert_ne!(base, candidate_hash(&other, now, 1));
    }

    #[test]
    fn test_bucket_for() {
        assert_eq!(bucket_for(at(2026, 1, 31)), "202601");
        assert_eq!(bucket_for(at(2025, 12, 1)), "202512");
    }

    #[rstest]
    #[case("a.txt", Some("txt"))]
    #[case("Photo.JPG", Some("jpg"))]
    #[case("archive.tar.gz", Some("gz"))]
    #[case(".bashrc", Some("bashrc"))]
    #[case("noext", None)]
    #[case("trailing.", None)]
    #[case("evil.txt/../../x", None)]
    #[case("name.pdf ", None)]
    #[case("long.abcdefghijklmnopq", None)]
    fn test_extension_of(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(extension_of(name).as_deref(), expected);
    }

    #[test]
    fn test_resolve_extension_falls_back_to_mime() {
        assert_eq!(resolve_extension("a.txt", "image/png"), "txt");
        assert_eq!(resolve_extension("screenshot", "image/png"), "png");
        assert_eq!(resolve_extension("blob", "application/octet-stream"), "");
    }

    #[test]
    fn test_published_key() {
        assert_eq!(published_key("202601", "ab", "x1", "txt"), "202601/ab.x1.txt");
        assert_eq!(published_key("202601", "ab", "x1", ""), "202601/ab.x1");
    }

    #[rstest]
    #[case(0, "0")]
    #[case(31, "v")]
    #[case(32, "10")]
    #[case(1024, "100")]
    #[case(u64::MAX, "fvvvvvvvvvvvv")]
    fn test_to_radix32(#[case] value: u64, #[case] expected: &str) {
        assert_eq!(to_radix32(value), expected);
    }

    #[test]
    fn test_uniqueifier_is_strictly_increasing_for_same_instant() {
        let uniq = Uniqueifier::new();
        let now = at(2026, 1, 15);
        let a = uniq.next(now);
        let b = uniq.next(now);
        let c = uniq.next(now);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(a, to_radix32(u64::try_from(now.timestamp_micros()).expect("positive")));
    }

    #[test]
    fn test_uniqueifier_unique_across_threads() {
        let uniq = Arc::new(Uniqueifier::new());
        let now = at(2026, 1, 15);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let uniq = Arc::clone(&uniq);
                std::thread::spawn(move || (0..500).map(|_| uniq.next(now)).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().expect("thread") {
                assert!(seen.insert(value), "duplicate uniqueifier");
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn from_radix32(s: &str) -> u64 {
        s.bytes().fold(0u64, |acc, b| {
            let digit = RADIX32_DIGITS.iter().position(|d| *d == b).expect("radix digit");
            acc * 32 + digit as u64
        })
    }

    proptest! {
        #[test]
        fn prop_radix32_roundtrip(value in any::<u64>()) {
            prop_assert_eq!(from_radix32(&to_radix32(value)), value);
        }

        // Extensions never contain path separators or dots.
        #[test]
        fn prop_extension_is_path_safe(name in ".*") {
            if let Some(ext) = extension_of(&name) {
                prop_assert!(ext.bytes().all(|b| b.is_ascii_alphanumeric()));
            }
        }
    }
}
