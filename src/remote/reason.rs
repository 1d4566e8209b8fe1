//! Grouping key extraction for remote aggregation.
//!
//! Error entries usually end with a stable cause ("connection refused") behind
//! a varying prefix (call site, addresses, ids). The aggregation service groups
//! on the `message` field, so only the tail of the entry goes there.

/// The aggregation service does not group fields longer than this.
pub const MAX_REASON_LEN: usize = 100;

/// Number of trailing colon separated segments kept by [`extract`].
pub const DEFAULT_SEGMENTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reason {
    /// Text before the first colon; empty when the entry has none.
    pub location_info: String,
    /// Trimmed tail of the entry, at most [`MAX_REASON_LEN`] bytes.
    pub message: String,
}

/// Extracts the location prefix and the last (at most) two segments.
pub fn extract(entry: &[u8]) -> Reason {
    extract_with(entry, DEFAULT_SEGMENTS)
}

/// Like [`extract`], keeping at most `segments` trailing segments.
pub fn extract_with(entry: &[u8], segments: usize) -> Reason {
    let full = String::from_utf8_lossy(entry);
    Reason {
        location_info: location_info(&full).to_string(),
        message: truncate(reason_message(&full, segments), MAX_REASON_LEN).to_string(),
    }
}

fn location_info(full: &str) -> &str {
    // No colon yields an empty prefix, not the whole entry.
    let end = full.find(':').unwrap_or(0);
    &full[..end]
}

fn reason_message(full: &str, segments: usize) -> &str {
    let bytes = full.as_bytes();
    let mut cut = 0;
    let mut seen = 0;

    // The last byte is skipped: a colon there has nothing after it.
    for p in (0..bytes.len().saturating_sub(1)).rev() {
        if seen >= segments {
            break;
        }
        if bytes[p] != b':' {
            continue;
        }
        // Keep "http://" and "1.2.3.4:80" intact.
        let next = bytes[p + 1];
        if next == b'/' || next.is_ascii_digit() {
            continue;
        }
        cut = p + 1;
        seen += 1;
    }

    full[cut..].trim()
}

/// Cuts at `max` bytes, backing off to the previous char boundary.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_keeps_last_two_segments() {
        let reason = extract(b"ERROR flashlight: proxy.go:42 dial failed: connection refused\n");
        assert_eq!(reason.location_info, "ERROR flashlight");
        // "go:42" is a line number, not a separator.
        assert_eq!(reason.message, "proxy.go:42 dial failed: connection refused");
    }

    #[test]
    fn test_skips_colon_before_port() {
        let reason = extract(b"ERROR: dial tcp 1.2.3.4:80: connection refused");
        assert_eq!(reason.message, "dial tcp 1.2.3.4:80: connection refused");
        assert_eq!(reason.location_info, "ERROR");

        let single = extract_with(b"ERROR: dial tcp 1.2.3.4:80: connection refused", 1);
        assert_eq!(single.message, "connection refused");
    }

    #[test]
    fn test_skips_colon_in_scheme() {
        let reason = extract(b"GET http://example.com: request failed: timeout");
        assert_eq!(reason.message, "request failed: timeout");
        // The first colon is the scheme's, so that is where the prefix ends.
        assert_eq!(reason.location_info, "GET http");

        let single = extract_with(b"GET http://example.com: request failed: timeout", 1);
        assert_eq!(single.message, "timeout");
    }

    #[test]
    fn test_no_colon_gives_whole_message_and_empty_location() {
        let reason = extract(b"no colons here");
        assert_eq!(reason.message, "no colons here");
        assert_eq!(reason.location_info, "");
    }

    #[test]
    fn test_single_colon() {
        let reason = extract(b"main:   something broke  \n");
        assert_eq!(reason.location_info, "main");
        assert_eq!(reason.message, "something broke");
    }

    #[test]
    fn test_trailing_colon_is_ignored() {
        let reason = extract(b"a: b:");
        assert_eq!(reason.message, "b:");
    }

    #[test]
    fn test_only_skipped_colons_keep_whole_entry() {
        let reason = extract(b"see http://host:8080/path");
        assert_eq!(reason.message, "see http://host:8080/path");
        assert_eq!(reason.location_info, "see http");
    }

    #[test]
    fn test_truncates_to_100_bytes_without_word_awareness() {
        let tail = "word ".repeat(30); // 150 characters
        let entry = format!("prefix: {tail}");
        let reason = extract(entry.as_bytes());

        assert_eq!(reason.message.len(), 100);
        assert_eq!(reason.message, tail.trim()[..100]);
    }

    #[test]
    fn test_truncation_respects_utf8_boundaries() {
        let tail = "é".repeat(60); // 120 bytes
        let entry = format!("x: {tail}");
        let reason = extract(entry.as_bytes());

        assert_eq!(reason.message.len(), 100);
        assert!(reason.message.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_short_entries() {
        assert_eq!(extract(b"").message, "");
        assert_eq!(extract(b":").message, ":");
        assert_eq!(extract(b":").location_info, "");
        assert_eq!(extract(b"x").message, "x");
    }

    #[test]
    fn test_multiline_entry_scans_whole_buffer() {
        let reason = extract(b"ERROR app: request failed\ncaused by: io: broken pipe\n");
        assert_eq!(reason.message, "io: broken pipe");
        assert_eq!(reason.location_info, "ERROR app");
    }

    proptest! {
        #[test]
        fn prop_message_never_exceeds_limit(entry in ".{0,400}") {
            let reason = extract(entry.as_bytes());
            prop_assert!(reason.message.len() <= MAX_REASON_LEN);
        }

        #[test]
        fn prop_location_never_contains_colon(entry in ".{0,200}") {
            let reason = extract(entry.as_bytes());
            prop_assert!(!reason.location_info.contains(':'));
        }
    }
}
