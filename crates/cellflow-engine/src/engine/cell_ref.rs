//! Cell reference parsing and formatting.
//!
//! Provides bidirectional conversion between spreadsheet-style cell references
//! (e.g., "A1", "B2", "AA100") and zero-indexed column/row coordinates, plus
//! the column-label codec used to name columns.
//!
//! # Examples
//!
//! ```
//! use cellflow_engine::engine::CellRef;
//!
//! let cell = CellRef::from_str("B3").unwrap();
//! assert_eq!(cell.col, 1); // 0-indexed
//! assert_eq!(cell.row, 2);
//! assert_eq!(cell.to_string(), "B3");
//! ```

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// A reference to a cell by column and row indices (0-indexed).
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(col: usize, row: usize) -> CellRef {
        CellRef { row, col }
    }

    /// Parse a cell reference from spreadsheet notation (e.g., "A1", "B2", "AA10").
    /// Returns None if the input is invalid.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(name: &str) -> Option<CellRef> {
        Self::parse_a1(name)
    }

    fn parse_a1(name: &str) -> Option<CellRef> {
        let caps = a1_re().captures(name)?;
        let col = decode_column(&caps["letters"].to_ascii_uppercase())?;
        let row = caps["numbers"].parse::<usize>().ok()?.checked_sub(1)?;
        Some(CellRef::new(col, row))
    }
}

fn a1_re() -> &'static Regex {
    static A1_RE: OnceLock<Regex> = OnceLock::new();
    A1_RE.get_or_init(|| {
        Regex::new(r"^(?<letters>[A-Za-z]+)(?<numbers>[0-9]+)$")
            .expect("A1 reference regex must compile")
    })
}

/// Encode a zero-based column index as a bijective base-26 label.
///
/// `A` stands for zero in the last position only when it is the sole letter,
/// so the sequence runs `A..Z, AA..AZ, BA..`, like spreadsheet column headers.
pub fn encode_column(index: usize) -> String {
    let mut result = String::new();
    let mut n = index as u128 + 1;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

/// Decode a column label produced by [`encode_column`].
///
/// Returns None for an empty label, anything outside `A`-`Z`, or a label
/// whose index does not fit in `usize`.
pub fn decode_column(label: &str) -> Option<usize> {
    if label.is_empty() {
        return None;
    }
    let mut acc = 0usize;
    for c in label.bytes() {
        if !c.is_ascii_uppercase() {
            return None;
        }
        let digit = (c - b'A') as usize + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    acc.checked_sub(1)
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", encode_column(self.col), self.row + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::{CellRef, decode_column, encode_column};
    use proptest::prelude::*;

    #[test]
    fn test_parse_a1_overflow_returns_none() {
        let huge = format!("{}1", "Z".repeat(40));
        assert!(CellRef::from_str(&huge).is_none());
    }

    #[test]
    fn test_encode_column_handles_max_usize() {
        let letters = encode_column(usize::MAX);
        assert!(!letters.is_empty());
        assert!(letters.chars().all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_encode_column_landmarks() {
        assert_eq!(encode_column(0), "A");
        assert_eq!(encode_column(25), "Z");
        assert_eq!(encode_column(26), "AA");
        assert_eq!(encode_column(27), "AB");
        assert_eq!(encode_column(51), "AZ");
        assert_eq!(encode_column(52), "BA");
        assert_eq!(encode_column(701), "ZZ");
        assert_eq!(encode_column(702), "AAA");
    }

    #[test]
    fn test_column_codec_round_trips_first_hundred_thousand() {
        for n in 0..=100_000usize {
            assert_eq!(decode_column(&encode_column(n)), Some(n), "index {n}");
        }
    }

    #[test]
    fn test_decode_column_rejects_bad_labels() {
        assert_eq!(decode_column(""), None);
        assert_eq!(decode_column("a"), None);
        assert_eq!(decode_column("A1"), None);
        assert_eq!(decode_column(&"Z".repeat(40)), None);
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        let cell = CellRef::new(27, 11);
        assert_eq!(cell.to_string(), "AB12");
        assert_eq!(CellRef::from_str("AB12"), Some(cell));
    }

    proptest! {
        #[test]
        fn prop_column_codec_round_trips(n in 0usize..10_000_000) {
            prop_assert_eq!(decode_column(&encode_column(n)), Some(n));
        }

        #[test]
        fn prop_labels_are_uppercase(n in any::<u32>()) {
            let label = encode_column(n as usize);
            prop_assert!(label.bytes().all(|b| b.is_ascii_uppercase()));
        }
    }
}
